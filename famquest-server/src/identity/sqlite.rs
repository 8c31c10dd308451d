//! SQLite-backed identity provider. Lives in its own database file with its
//! own pool and migrations; nothing here may touch the profile store.

use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use famquest_shared::auth::Role;
use uuid::Uuid;

use super::{Identity, IdentityError, IdentityStore, IdentityUpdate, NewIdentity};
use crate::storage::configure_sqlite_conn;

diesel::table! {
    identities (id) {
        id -> Text,
        email -> Text,
        password_hash -> Text,
        display_name -> Text,
        role -> Text,
        age_group -> Nullable<Text>,
        email_verified -> Bool,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

#[derive(Debug, Clone, Queryable, Identifiable, Selectable)]
#[diesel(table_name = identities)]
struct IdentityRow {
    id: String,
    email: String,
    password_hash: String,
    display_name: String,
    role: String,
    age_group: Option<String>,
    email_verified: bool,
    #[allow(dead_code)]
    created_at: NaiveDateTime,
    #[allow(dead_code)]
    updated_at: NaiveDateTime,
}

impl From<IdentityRow> for Identity {
    fn from(row: IdentityRow) -> Self {
        let role = match row.role.as_str() {
            "parent" => Role::Parent,
            _ => Role::Child,
        };
        Identity {
            id: row.id,
            email: row.email,
            password_hash: row.password_hash,
            display_name: row.display_name,
            role,
            age_group: row.age_group,
            email_verified: row.email_verified,
        }
    }
}

#[derive(Insertable)]
#[diesel(table_name = identities)]
struct NewIdentityRow<'a> {
    id: &'a str,
    email: &'a str,
    password_hash: &'a str,
    display_name: &'a str,
    role: &'a str,
    age_group: Option<&'a str>,
    email_verified: bool,
}

#[derive(Debug, Default, AsChangeset)]
#[diesel(table_name = identities)]
struct IdentityRowChanges {
    password_hash: Option<String>,
    display_name: Option<String>,
    age_group: Option<String>,
}

impl From<diesel::result::Error> for IdentityError {
    fn from(e: diesel::result::Error) -> Self {
        match e {
            diesel::result::Error::NotFound => IdentityError::NotFound,
            diesel::result::Error::DatabaseError(
                diesel::result::DatabaseErrorKind::UniqueViolation,
                _,
            ) => IdentityError::EmailTaken,
            other => IdentityError::Unavailable(other.to_string()),
        }
    }
}

impl From<diesel::r2d2::PoolError> for IdentityError {
    fn from(e: diesel::r2d2::PoolError) -> Self {
        IdentityError::Unavailable(e.to_string())
    }
}

impl From<tokio::task::JoinError> for IdentityError {
    fn from(e: tokio::task::JoinError) -> Self {
        IdentityError::Unavailable(e.to_string())
    }
}

#[derive(Clone)]
pub struct SqliteIdentityStore {
    pool: Pool<ConnectionManager<SqliteConnection>>,
}

impl SqliteIdentityStore {
    pub async fn connect_sqlite(path: &str) -> Result<Self, IdentityError> {
        let url = path.to_string();
        let manager = ConnectionManager::<SqliteConnection>::new(url);
        let pool = Pool::builder().max_size(4).build(manager)?;

        {
            let pool_clone = pool.clone();
            tokio::task::spawn_blocking(move || -> Result<(), IdentityError> {
                const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations-identity");
                let mut conn = pool_clone.get()?;
                configure_sqlite_conn(&mut conn)?;
                conn.run_pending_migrations(MIGRATIONS)
                    .map_err(|e| IdentityError::Unavailable(e.to_string()))?;
                Ok(())
            })
            .await??;
        }

        Ok(SqliteIdentityStore { pool })
    }
}

#[async_trait]
impl IdentityStore for SqliteIdentityStore {
    async fn create_identity(&self, new: NewIdentity<'_>) -> Result<Identity, IdentityError> {
        use self::identities::dsl as ident;
        let pool = self.pool.clone();
        let email_owned = new.email.to_string();
        let password_owned = new.password.to_string();
        let display_name_owned = new.display_name.to_string();
        let role_owned = new.role.as_str().to_string();
        let age_group_owned = new.age_group.map(|s| s.to_string());
        let verified = new.email_verified;
        tokio::task::spawn_blocking(move || -> Result<Identity, IdentityError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            let id = Uuid::new_v4().to_string();
            let hash = bcrypt::hash(&password_owned, bcrypt::DEFAULT_COST)
                .map_err(|e| IdentityError::Unavailable(e.to_string()))?;
            let new_row = NewIdentityRow {
                id: &id,
                email: &email_owned,
                password_hash: &hash,
                display_name: &display_name_owned,
                role: &role_owned,
                age_group: age_group_owned.as_deref(),
                email_verified: verified,
            };
            diesel::insert_into(ident::identities)
                .values(&new_row)
                .execute(&mut conn)?;
            let row = ident::identities
                .filter(ident::id.eq(&id))
                .first::<IdentityRow>(&mut conn)?;
            Ok(row.into())
        })
        .await?
    }

    async fn get_identity(&self, id_: &str) -> Result<Option<Identity>, IdentityError> {
        use self::identities::dsl as ident;
        let pool = self.pool.clone();
        let id_owned = id_.to_string();
        tokio::task::spawn_blocking(move || -> Result<Option<Identity>, IdentityError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            Ok(ident::identities
                .filter(ident::id.eq(&id_owned))
                .first::<IdentityRow>(&mut conn)
                .optional()?
                .map(Identity::from))
        })
        .await?
    }

    async fn get_identity_by_email(&self, email_: &str) -> Result<Option<Identity>, IdentityError> {
        use self::identities::dsl as ident;
        let pool = self.pool.clone();
        let email_owned = email_.to_string();
        tokio::task::spawn_blocking(move || -> Result<Option<Identity>, IdentityError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            Ok(ident::identities
                .filter(ident::email.eq(&email_owned))
                .first::<IdentityRow>(&mut conn)
                .optional()?
                .map(Identity::from))
        })
        .await?
    }

    async fn update_identity(
        &self,
        id_: &str,
        changes: IdentityUpdate,
    ) -> Result<Identity, IdentityError> {
        use self::identities::dsl as ident;
        let pool = self.pool.clone();
        let id_owned = id_.to_string();
        tokio::task::spawn_blocking(move || -> Result<Identity, IdentityError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            let password_hash = match &changes.password {
                Some(pw) => Some(
                    bcrypt::hash(pw, bcrypt::DEFAULT_COST)
                        .map_err(|e| IdentityError::Unavailable(e.to_string()))?,
                ),
                None => None,
            };
            let row_changes = IdentityRowChanges {
                password_hash,
                display_name: changes.display_name,
                age_group: changes.age_group,
            };
            let now = Utc::now().naive_utc();
            let updated = diesel::update(ident::identities.filter(ident::id.eq(&id_owned)))
                .set((&row_changes, ident::updated_at.eq(now)))
                .execute(&mut conn)?;
            if updated == 0 {
                return Err(IdentityError::NotFound);
            }
            let row = ident::identities
                .filter(ident::id.eq(&id_owned))
                .first::<IdentityRow>(&mut conn)?;
            Ok(row.into())
        })
        .await?
    }

    async fn delete_identity(&self, id_: &str) -> Result<bool, IdentityError> {
        use self::identities::dsl as ident;
        let pool = self.pool.clone();
        let id_owned = id_.to_string();
        tokio::task::spawn_blocking(move || -> Result<bool, IdentityError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            let deleted = diesel::delete(ident::identities.filter(ident::id.eq(&id_owned)))
                .execute(&mut conn)?;
            Ok(deleted > 0)
        })
        .await?
    }
}
