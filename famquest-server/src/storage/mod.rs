pub mod models;
pub mod schema;

use chrono::Utc;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use famquest_shared::domain::Feature;
use models::{
    AccessSettings, FamilyConnection, NewAccessSettings, NewFamilyConnection, NewParentSettings,
    NewProfile, NewSession, ParentSettings, Profile, ProfileChanges,
};

/// Structured error type for all storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A Diesel ORM error (query failure, constraint violation, etc.)
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),

    /// Failed to acquire or build a connection from the pool.
    #[error("pool error: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),

    /// A `spawn_blocking` task panicked or was cancelled.
    #[error("task error: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// A database migration failed to apply.
    #[error("migration error: {0}")]
    Migration(String),

    /// An idempotent write found conflicting existing state.
    #[error("conflict: {0}")]
    Conflict(String),
}

#[derive(Clone)]
pub struct Store {
    pool: Pool<ConnectionManager<SqliteConnection>>,
}

impl Store {
    pub async fn connect_sqlite(path: &str) -> Result<Self, StorageError> {
        let url = path.to_string();
        let manager = ConnectionManager::<SqliteConnection>::new(url);
        let pool = Pool::builder().max_size(8).build(manager)?;

        // Run pending Diesel migrations on startup (auto-init empty DBs)
        {
            let pool_clone = pool.clone();
            tokio::task::spawn_blocking(move || -> Result<(), StorageError> {
                const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");
                let mut conn = pool_clone.get()?;
                configure_sqlite_conn(&mut conn)?;
                conn.run_pending_migrations(MIGRATIONS)
                    .map_err(|e| StorageError::Migration(e.to_string()))?;
                Ok(())
            })
            .await??;
        }

        Ok(Store { pool })
    }

    // Profiles

    /// Insert-or-ignore-on-conflict: a row that already exists (created by
    /// first login or a racing provisioning retry) counts as success.
    pub async fn insert_profile_if_absent(
        &self,
        id: &str,
        username: &str,
        role: &str,
        age_group: Option<&str>,
    ) -> Result<(), StorageError> {
        use schema::profiles;
        let pool = self.pool.clone();
        let id_owned = id.to_string();
        let username_owned = username.to_string();
        let role_owned = role.to_string();
        let age_group_owned = age_group.map(|s| s.to_string());
        tokio::task::spawn_blocking(move || -> Result<(), StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            let new_profile = NewProfile {
                id: &id_owned,
                username: &username_owned,
                role: &role_owned,
                age_group: age_group_owned.as_deref(),
            };
            diesel::insert_into(profiles::table)
                .values(&new_profile)
                .on_conflict_do_nothing()
                .execute(&mut conn)?;
            Ok(())
        })
        .await?
    }

    pub async fn get_profile(&self, id_: &str) -> Result<Option<Profile>, StorageError> {
        use schema::profiles::dsl::*;
        let pool = self.pool.clone();
        let pid = id_.to_string();
        tokio::task::spawn_blocking(move || -> Result<Option<Profile>, StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            Ok(profiles
                .filter(id.eq(&pid))
                .first::<Profile>(&mut conn)
                .optional()?)
        })
        .await?
    }

    pub async fn update_profile(
        &self,
        id_: &str,
        changes: ProfileChanges,
    ) -> Result<Option<Profile>, StorageError> {
        use schema::profiles::dsl::*;
        let pool = self.pool.clone();
        let pid = id_.to_string();
        tokio::task::spawn_blocking(move || -> Result<Option<Profile>, StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            let now = Utc::now().naive_utc();
            diesel::update(profiles.filter(id.eq(&pid)))
                .set((&changes, updated_at.eq(now)))
                .execute(&mut conn)?;
            Ok(profiles
                .filter(id.eq(&pid))
                .first::<Profile>(&mut conn)
                .optional()?)
        })
        .await?
    }

    pub async fn delete_profile(&self, id_: &str) -> Result<bool, StorageError> {
        use schema::profiles::dsl::*;
        let pool = self.pool.clone();
        let pid = id_.to_string();
        tokio::task::spawn_blocking(move || -> Result<bool, StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            let deleted = diesel::delete(profiles.filter(id.eq(&pid))).execute(&mut conn)?;
            Ok(deleted > 0)
        })
        .await?
    }

    // Family connections

    /// Create the supervision link, enforcing one parent per child.
    ///
    /// An identical existing link is returned as success (retried request);
    /// a link to a different parent is a `Conflict`. The check-then-write
    /// runs inside an immediate transaction and is backed by a unique index
    /// on `child_id`, so a racing writer loses cleanly instead of creating
    /// a second row.
    pub async fn create_family_link(
        &self,
        parent: &str,
        child: &str,
    ) -> Result<FamilyConnection, StorageError> {
        use schema::family_connections::dsl as fc;
        let pool = self.pool.clone();
        let parent_owned = parent.to_string();
        let child_owned = child.to_string();
        tokio::task::spawn_blocking(move || -> Result<FamilyConnection, StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            conn.immediate_transaction(|conn| -> Result<FamilyConnection, StorageError> {
                let existing = fc::family_connections
                    .filter(fc::child_id.eq(&child_owned))
                    .first::<FamilyConnection>(conn)
                    .optional()?;
                if let Some(link) = existing {
                    if link.parent_id == parent_owned {
                        return Ok(link);
                    }
                    return Err(StorageError::Conflict(format!(
                        "child {} is already linked to another parent",
                        child_owned
                    )));
                }
                let new_link = NewFamilyConnection {
                    parent_id: &parent_owned,
                    child_id: &child_owned,
                };
                match diesel::insert_into(fc::family_connections)
                    .values(&new_link)
                    .execute(conn)
                {
                    Ok(_) => {}
                    Err(diesel::result::Error::DatabaseError(
                        diesel::result::DatabaseErrorKind::UniqueViolation,
                        _,
                    )) => {
                        return Err(StorageError::Conflict(format!(
                            "child {} is already linked to another parent",
                            child_owned
                        )));
                    }
                    Err(e) => return Err(e.into()),
                }
                Ok(fc::family_connections
                    .filter(fc::child_id.eq(&child_owned))
                    .first::<FamilyConnection>(conn)?)
            })
        })
        .await?
    }

    pub async fn get_link_by_child(
        &self,
        child: &str,
    ) -> Result<Option<FamilyConnection>, StorageError> {
        use schema::family_connections::dsl as fc;
        let pool = self.pool.clone();
        let child_owned = child.to_string();
        tokio::task::spawn_blocking(move || -> Result<Option<FamilyConnection>, StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            Ok(fc::family_connections
                .filter(fc::child_id.eq(&child_owned))
                .first::<FamilyConnection>(&mut conn)
                .optional()?)
        })
        .await?
    }

    pub async fn is_linked(&self, parent: &str, child: &str) -> Result<bool, StorageError> {
        use schema::family_connections::dsl as fc;
        let pool = self.pool.clone();
        let parent_owned = parent.to_string();
        let child_owned = child.to_string();
        tokio::task::spawn_blocking(move || -> Result<bool, StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            let count: i64 = fc::family_connections
                .filter(fc::parent_id.eq(&parent_owned))
                .filter(fc::child_id.eq(&child_owned))
                .count()
                .get_result(&mut conn)?;
            Ok(count > 0)
        })
        .await?
    }

    pub async fn list_children(&self, parent: &str) -> Result<Vec<Profile>, StorageError> {
        let pool = self.pool.clone();
        let parent_owned = parent.to_string();
        tokio::task::spawn_blocking(move || -> Result<Vec<Profile>, StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            use schema::{family_connections, profiles};
            let rows = family_connections::table
                .inner_join(profiles::table.on(profiles::id.eq(family_connections::child_id)))
                .filter(family_connections::parent_id.eq(&parent_owned))
                .order(profiles::username.asc())
                .select(Profile::as_select())
                .load::<Profile>(&mut conn)?;
            Ok(rows)
        })
        .await?
    }

    /// Remove a supervision link. Pure detach: the child's profile, access
    /// settings and productivity data are untouched.
    pub async fn delete_link(&self, link_id: i32) -> Result<bool, StorageError> {
        use schema::family_connections::dsl as fc;
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || -> Result<bool, StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            let deleted = diesel::delete(fc::family_connections.filter(fc::id.eq(link_id)))
                .execute(&mut conn)?;
            Ok(deleted > 0)
        })
        .await?
    }

    // Per-child feature access

    pub async fn get_access_settings(
        &self,
        child: &str,
    ) -> Result<Option<AccessSettings>, StorageError> {
        use schema::child_app_settings::dsl as cas;
        let pool = self.pool.clone();
        let child_owned = child.to_string();
        tokio::task::spawn_blocking(move || -> Result<Option<AccessSettings>, StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            Ok(cas::child_app_settings
                .filter(cas::child_id.eq(&child_owned))
                .first::<AccessSettings>(&mut conn)
                .optional()?)
        })
        .await?
    }

    /// Upsert one feature toggle. The settings row is created lazily on the
    /// first toggle, with every other feature left enabled.
    pub async fn set_access(
        &self,
        child: &str,
        feature: Feature,
        allowed: bool,
    ) -> Result<AccessSettings, StorageError> {
        use schema::child_app_settings::dsl as cas;
        let pool = self.pool.clone();
        let child_owned = child.to_string();
        tokio::task::spawn_blocking(move || -> Result<AccessSettings, StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            let now = Utc::now().naive_utc();
            let mut new_row = NewAccessSettings {
                child_id: &child_owned,
                tutors_enabled: true,
                habit_tracker_enabled: true,
                journal_enabled: true,
                tasks_enabled: true,
            };
            match feature {
                Feature::Tutors => new_row.tutors_enabled = allowed,
                Feature::HabitTracker => new_row.habit_tracker_enabled = allowed,
                Feature::Journal => new_row.journal_enabled = allowed,
                Feature::Tasks => new_row.tasks_enabled = allowed,
            }
            let insert = diesel::insert_into(cas::child_app_settings).values(&new_row);
            match feature {
                Feature::Tutors => insert
                    .on_conflict(cas::child_id)
                    .do_update()
                    .set((cas::tutors_enabled.eq(allowed), cas::updated_at.eq(now)))
                    .execute(&mut conn)?,
                Feature::HabitTracker => insert
                    .on_conflict(cas::child_id)
                    .do_update()
                    .set((cas::habit_tracker_enabled.eq(allowed), cas::updated_at.eq(now)))
                    .execute(&mut conn)?,
                Feature::Journal => insert
                    .on_conflict(cas::child_id)
                    .do_update()
                    .set((cas::journal_enabled.eq(allowed), cas::updated_at.eq(now)))
                    .execute(&mut conn)?,
                Feature::Tasks => insert
                    .on_conflict(cas::child_id)
                    .do_update()
                    .set((cas::tasks_enabled.eq(allowed), cas::updated_at.eq(now)))
                    .execute(&mut conn)?,
            };
            Ok(cas::child_app_settings
                .filter(cas::child_id.eq(&child_owned))
                .first::<AccessSettings>(&mut conn)?)
        })
        .await?
    }

    // Parent settings

    pub async fn get_parent_settings(
        &self,
        parent: &str,
    ) -> Result<Option<ParentSettings>, StorageError> {
        use schema::parent_settings::dsl as ps;
        let pool = self.pool.clone();
        let parent_owned = parent.to_string();
        tokio::task::spawn_blocking(move || -> Result<Option<ParentSettings>, StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            Ok(ps::parent_settings
                .filter(ps::parent_id.eq(&parent_owned))
                .first::<ParentSettings>(&mut conn)
                .optional()?)
        })
        .await?
    }

    pub async fn set_provider_key(&self, parent: &str, key: &str) -> Result<(), StorageError> {
        use schema::parent_settings::dsl as ps;
        let pool = self.pool.clone();
        let parent_owned = parent.to_string();
        let key_owned = key.to_string();
        tokio::task::spawn_blocking(move || -> Result<(), StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            let now = Utc::now().naive_utc();
            let new_row = NewParentSettings {
                parent_id: &parent_owned,
                provider_api_key: Some(&key_owned),
            };
            diesel::insert_into(ps::parent_settings)
                .values(&new_row)
                .on_conflict(ps::parent_id)
                .do_update()
                .set((
                    ps::provider_api_key.eq(Some(key_owned.as_str())),
                    ps::updated_at.eq(now),
                ))
                .execute(&mut conn)?;
            Ok(())
        })
        .await?
    }

    // Session helpers for JWT inactivity windows

    pub async fn create_session(&self, jti_: &str, identity: &str) -> Result<(), StorageError> {
        use schema::sessions;
        let pool = self.pool.clone();
        let j = jti_.to_string();
        let ident = identity.to_string();
        tokio::task::spawn_blocking(move || -> Result<(), StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            let new = NewSession {
                jti: &j,
                identity_id: &ident,
            };
            diesel::insert_into(sessions::table)
                .values(&new)
                .on_conflict_do_nothing()
                .execute(&mut conn)?;
            Ok(())
        })
        .await?
    }

    pub async fn delete_session(&self, jti_: &str) -> Result<bool, StorageError> {
        use schema::sessions::dsl::*;
        let pool = self.pool.clone();
        let j = jti_.to_string();
        tokio::task::spawn_blocking(move || -> Result<bool, StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            let deleted = diesel::delete(sessions.filter(jti.eq(&j))).execute(&mut conn)?;
            Ok(deleted > 0)
        })
        .await?
    }

    /// Touch session atomically, but only if it hasn't expired.
    /// Returns `true` if the session was found and updated, `false` otherwise.
    ///
    /// This combines the idle timeout check and the `last_used_at` update into
    /// a single atomic UPDATE, eliminating the race condition between checking
    /// and updating the session.
    pub async fn touch_session_with_cutoff(
        &self,
        jti_: &str,
        cutoff: chrono::NaiveDateTime,
    ) -> Result<bool, StorageError> {
        use schema::sessions::dsl::*;
        let pool = self.pool.clone();
        let j = jti_.to_string();
        tokio::task::spawn_blocking(move || -> Result<bool, StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            let now = Utc::now().naive_utc();
            let updated =
                diesel::update(sessions.filter(jti.eq(&j)).filter(last_used_at.ge(cutoff)))
                    .set(last_used_at.eq(now))
                    .execute(&mut conn)?;
            Ok(updated > 0)
        })
        .await?
    }
}

pub(crate) fn configure_sqlite_conn(
    conn: &mut SqliteConnection,
) -> Result<(), diesel::result::Error> {
    // Enable WAL for better read/write concurrency and set a busy timeout
    // Ignore the result rows; Diesel's execute is fine for PRAGMAs
    diesel::sql_query("PRAGMA journal_mode=WAL;").execute(conn)?;
    diesel::sql_query("PRAGMA synchronous=NORMAL;").execute(conn)?;
    diesel::sql_query("PRAGMA busy_timeout=5000;").execute(conn)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn temp_store() -> (Store, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.db");
        let store = Store::connect_sqlite(path.to_str().unwrap()).await.unwrap();
        (store, dir)
    }

    #[tokio::test]
    async fn family_link_is_unique_per_child() {
        let (store, _dir) = temp_store().await;

        let first = store.create_family_link("parent-a", "child-1").await.unwrap();
        // Retried request with the same pair is the same link, not a duplicate.
        let again = store.create_family_link("parent-a", "child-1").await.unwrap();
        assert_eq!(first.id, again.id);

        // A second parent loses the race.
        let err = store.create_family_link("parent-b", "child-1").await;
        assert!(matches!(err, Err(StorageError::Conflict(_))));

        let link = store.get_link_by_child("child-1").await.unwrap().unwrap();
        assert_eq!(link.parent_id, "parent-a");
    }

    #[tokio::test]
    async fn detach_preserves_profile_and_settings() {
        let (store, _dir) = temp_store().await;
        store
            .insert_profile_if_absent("child-1", "kiddo", "child", Some("8-10"))
            .await
            .unwrap();
        let link = store.create_family_link("parent-a", "child-1").await.unwrap();
        store
            .set_access("child-1", Feature::Journal, false)
            .await
            .unwrap();

        assert!(store.delete_link(link.id).await.unwrap());

        assert!(store.get_link_by_child("child-1").await.unwrap().is_none());
        assert!(store.get_profile("child-1").await.unwrap().is_some());
        let settings = store.get_access_settings("child-1").await.unwrap().unwrap();
        assert!(!settings.journal_enabled);
        assert!(settings.tutors_enabled);
    }

    #[tokio::test]
    async fn set_access_upserts_one_feature_at_a_time() {
        let (store, _dir) = temp_store().await;
        assert!(store.get_access_settings("child-1").await.unwrap().is_none());

        let row = store
            .set_access("child-1", Feature::Tutors, false)
            .await
            .unwrap();
        assert!(!row.tutors_enabled);
        assert!(row.habit_tracker_enabled && row.journal_enabled && row.tasks_enabled);

        let row = store
            .set_access("child-1", Feature::Tasks, false)
            .await
            .unwrap();
        assert!(!row.tutors_enabled, "earlier toggle must persist");
        assert!(!row.tasks_enabled);
        assert!(row.habit_tracker_enabled && row.journal_enabled);
    }

    #[tokio::test]
    async fn profile_update_changes_only_given_fields() {
        let (store, _dir) = temp_store().await;
        store
            .insert_profile_if_absent("child-1", "kiddo", "child", None)
            .await
            .unwrap();
        let updated = store
            .update_profile(
                "child-1",
                ProfileChanges {
                    age_group: Some("10-12".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.username, "kiddo");
        assert_eq!(updated.age_group.as_deref(), Some("10-12"));
    }
}
