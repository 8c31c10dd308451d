use chrono::NaiveDateTime;
use diesel::prelude::*;
use famquest_shared::auth::Role;

use crate::storage::schema::{
    child_app_settings, family_connections, parent_settings, profiles, sessions,
};

#[derive(Debug, Clone, Queryable, Identifiable, Selectable)]
#[diesel(table_name = profiles)]
pub struct Profile {
    pub id: String,
    pub username: String,
    pub role: String,
    pub age_group: Option<String>,
    pub avatar_url: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Profile {
    /// Role stored as text; anything unrecognized resolves to the least
    /// privileged role.
    pub fn role(&self) -> Role {
        match self.role.as_str() {
            "parent" => Role::Parent,
            _ => Role::Child,
        }
    }
}

#[derive(Insertable)]
#[diesel(table_name = profiles)]
pub struct NewProfile<'a> {
    pub id: &'a str,
    pub username: &'a str,
    pub role: &'a str,
    pub age_group: Option<&'a str>,
}

/// Partial profile update; `None` leaves the column unchanged.
#[derive(Debug, Default, AsChangeset)]
#[diesel(table_name = profiles)]
pub struct ProfileChanges {
    pub username: Option<String>,
    pub age_group: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Selectable)]
#[diesel(table_name = family_connections)]
pub struct FamilyConnection {
    pub id: i32,
    pub parent_id: String,
    pub child_id: String,
    pub created_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = family_connections)]
pub struct NewFamilyConnection<'a> {
    pub parent_id: &'a str,
    pub child_id: &'a str,
}

#[derive(Debug, Clone, Queryable, Identifiable, Selectable)]
#[diesel(table_name = child_app_settings)]
#[diesel(primary_key(child_id))]
pub struct AccessSettings {
    pub child_id: String,
    pub tutors_enabled: bool,
    pub habit_tracker_enabled: bool,
    pub journal_enabled: bool,
    pub tasks_enabled: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = child_app_settings)]
pub struct NewAccessSettings<'a> {
    pub child_id: &'a str,
    pub tutors_enabled: bool,
    pub habit_tracker_enabled: bool,
    pub journal_enabled: bool,
    pub tasks_enabled: bool,
}

#[derive(Debug, Clone, Queryable, Identifiable, Selectable)]
#[diesel(table_name = parent_settings)]
#[diesel(primary_key(parent_id))]
pub struct ParentSettings {
    pub parent_id: String,
    pub provider_api_key: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = parent_settings)]
pub struct NewParentSettings<'a> {
    pub parent_id: &'a str,
    pub provider_api_key: Option<&'a str>,
}

#[derive(Insertable)]
#[diesel(table_name = sessions)]
pub struct NewSession<'a> {
    pub jti: &'a str,
    pub identity_id: &'a str,
}
