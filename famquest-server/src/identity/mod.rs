//! Contract for the external authentication provider holding login
//! identities. The rest of the system only ever talks to this trait; the
//! shipped implementation keeps identities in a SQLite database of its own,
//! deliberately separate from the profile store so no shared transaction can
//! exist between the two.

pub mod sqlite;

pub use sqlite::SqliteIdentityStore;

use async_trait::async_trait;
use famquest_shared::auth::Role;

/// A login-capable account held by the authentication provider.
#[derive(Debug, Clone)]
pub struct Identity {
    /// Opaque stable identifier; the profile table is keyed by the same id.
    pub id: String,
    pub email: String,
    pub password_hash: String,
    pub display_name: String,
    pub role: Role,
    pub age_group: Option<String>,
    pub email_verified: bool,
}

#[derive(Debug, Clone)]
pub struct NewIdentity<'a> {
    pub email: &'a str,
    /// Plaintext; the store hashes it and never persists the original.
    pub password: &'a str,
    pub display_name: &'a str,
    pub role: Role,
    pub age_group: Option<&'a str>,
    pub email_verified: bool,
}

/// Partial identity update; `None` leaves the field unchanged.
#[derive(Debug, Default)]
pub struct IdentityUpdate {
    pub password: Option<String>,
    pub display_name: Option<String>,
    pub age_group: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("identity not found")]
    NotFound,
    #[error("email already registered")]
    EmailTaken,
    /// Store-level failure; safe to retry with backoff.
    #[error("identity store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn create_identity(&self, new: NewIdentity<'_>) -> Result<Identity, IdentityError>;

    async fn get_identity(&self, id: &str) -> Result<Option<Identity>, IdentityError>;

    async fn get_identity_by_email(&self, email: &str) -> Result<Option<Identity>, IdentityError>;

    /// The password field is updated atomically by the underlying store;
    /// overlapping updates resolve to last-write-wins.
    async fn update_identity(
        &self,
        id: &str,
        changes: IdentityUpdate,
    ) -> Result<Identity, IdentityError>;

    async fn delete_identity(&self, id: &str) -> Result<bool, IdentityError>;
}
