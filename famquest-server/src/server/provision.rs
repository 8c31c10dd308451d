//! Child provisioning and credential rotation.
//!
//! Provisioning spans two independent stores (identity provider, profile
//! database) with no shared transaction, so it runs as a three-step saga:
//! identity, then profile, then family link. Each step is idempotent or
//! compensable; a failure after the identity exists triggers a compensating
//! delete rather than leaving an unsupervised child identity behind.

use std::time::Duration;

use tracing::{info, warn};
use uuid::Uuid;

use crate::identity::{Identity, IdentityError, IdentityStore, IdentityUpdate, NewIdentity};
use crate::storage::{Store, StorageError, models::Profile};
use famquest_shared::auth::Role;
use famquest_shared::domain::AgeGroup;

/// The profile row may be populated asynchronously in reaction to identity
/// creation; reads get a short bounded retry before the step counts as
/// failed.
const PROFILE_READ_ATTEMPTS: u32 = 3;
const PROFILE_READ_BACKOFF: Duration = Duration::from_millis(50);

const CHILD_EMAIL_DOMAIN: &str = "child.famquest.local";

#[derive(Debug)]
pub struct ProvisionRequest {
    pub parent_id: String,
    pub display_name: String,
    pub age_group: AgeGroup,
    /// Identity id from a previous, partially completed attempt. When set,
    /// step 1 is skipped and the saga resumes with the idempotent steps.
    pub existing_child_id: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    #[error("identity creation failed: {0}")]
    IdentityCreation(#[source] IdentityError),

    #[error("child identity created but profile provisioning failed, id={identity_id}: {detail}")]
    ProfileProvisioning { identity_id: String, detail: String },

    #[error("child identity created but family link failed, id={identity_id}: {source}")]
    FamilyLink {
        identity_id: String,
        #[source]
        source: StorageError,
    },

    /// Compensation itself failed; an operator or retry path must finish the
    /// cleanup for the orphaned identity.
    #[error("cleanup failed, orphaned child identity id={orphan_id}: {detail}")]
    OrphanRisk { orphan_id: String, detail: String },
}

/// Run the provisioning saga. Returns the canonical child profile; the
/// one-time password minted in step 1 is never returned from this flow —
/// credential rotation is the explicit way to obtain usable credentials.
pub async fn provision_child(
    identity_store: &dyn IdentityStore,
    store: &Store,
    req: ProvisionRequest,
) -> Result<Profile, ProvisionError> {
    // Step 1: the login identity. Throwaway email-shaped identifier, random
    // password, pre-verified so no confirmation step blocks usage. A resumed
    // saga reuses the identity from the prior attempt; only identities this
    // invocation creates are ever compensated away.
    let (child, created_here) = match &req.existing_child_id {
        Some(id) => {
            let identity = identity_store
                .get_identity(id)
                .await
                .map_err(ProvisionError::IdentityCreation)?
                .ok_or(ProvisionError::IdentityCreation(IdentityError::NotFound))?;
            // Resume tokens must denote a child identity.
            if identity.role != Role::Child {
                return Err(ProvisionError::IdentityCreation(IdentityError::NotFound));
            }
            (identity, false)
        }
        None => {
            let email = child_login_email(&req.display_name);
            let password = generate_one_time_password();
            let identity = identity_store
                .create_identity(NewIdentity {
                    email: &email,
                    password: &password,
                    display_name: &req.display_name,
                    role: Role::Child,
                    age_group: Some(req.age_group.as_str()),
                    email_verified: true,
                })
                .await
                .map_err(ProvisionError::IdentityCreation)?;
            (identity, true)
        }
    };

    // Step 2: the profile row, insert-or-ignore plus bounded retry-read.
    let profile = match ensure_profile(store, &child, req.age_group).await {
        Ok(p) => p,
        Err(detail) => {
            if created_here && let Err(comp) = identity_store.delete_identity(&child.id).await {
                return Err(ProvisionError::OrphanRisk {
                    orphan_id: child.id,
                    detail: format!("{detail}; identity cleanup failed: {comp}"),
                });
            }
            return Err(ProvisionError::ProfileProvisioning {
                identity_id: child.id,
                detail,
            });
        }
    };

    // Step 3: the supervision link. An identical existing link is success
    // (retried request); anything else compensates steps 2 and 1 first —
    // but only for state this invocation created, so a failed resume can
    // never delete a pre-existing child.
    if let Err(err) = store.create_family_link(&req.parent_id, &child.id).await {
        if created_here {
            warn!(child_id = %child.id, error = %err, "provision: family link failed, compensating");
            if let Err(comp) = compensate(identity_store, store, &child.id).await {
                return Err(ProvisionError::OrphanRisk {
                    orphan_id: child.id,
                    detail: format!("{err}; {comp}"),
                });
            }
        }
        return Err(ProvisionError::FamilyLink {
            identity_id: child.id,
            source: err,
        });
    }

    info!(child_id = %profile.id, parent_id = %req.parent_id, "provision: child provisioned");
    Ok(profile)
}

async fn ensure_profile(
    store: &Store,
    child: &Identity,
    age_group: AgeGroup,
) -> Result<Profile, String> {
    let mut last_err = String::from("profile row never became readable");
    for attempt in 0..PROFILE_READ_ATTEMPTS {
        if attempt > 0 {
            tokio::time::sleep(PROFILE_READ_BACKOFF).await;
        }
        if let Err(e) = store
            .insert_profile_if_absent(
                &child.id,
                &child.display_name,
                Role::Child.as_str(),
                Some(age_group.as_str()),
            )
            .await
        {
            last_err = e.to_string();
            continue;
        }
        match store.get_profile(&child.id).await {
            Ok(Some(p)) => return Ok(p),
            Ok(None) => last_err = "profile row not yet visible".to_string(),
            Err(e) => last_err = e.to_string(),
        }
    }
    Err(last_err)
}

async fn compensate(
    identity_store: &dyn IdentityStore,
    store: &Store,
    child_id: &str,
) -> Result<(), String> {
    if let Err(e) = store.delete_profile(child_id).await {
        return Err(format!("profile cleanup failed: {e}"));
    }
    if let Err(e) = identity_store.delete_identity(child_id).await {
        return Err(format!("identity cleanup failed: {e}"));
    }
    Ok(())
}

/// Credentials minted by rotation; returned to the linked parent exactly
/// once, never persisted in plaintext.
#[derive(Debug)]
pub struct Credentials {
    pub email: String,
    pub password: String,
    pub username: String,
}

#[derive(Debug, thiserror::Error)]
pub enum RotationError {
    #[error("caller is not the linked parent")]
    NotAuthorized,

    #[error("child identity not found")]
    IdentityNotFound,

    /// Store-level failure; safe to retry. Whether the previous password is
    /// still valid after a failed write is store-defined.
    #[error("rotation failed: {0}")]
    Failed(String),
}

/// Mint a fresh one-time password for a linked child. Every call invalidates
/// the previous password; sessions the child already holds stay valid.
pub async fn rotate_credentials(
    identity_store: &dyn IdentityStore,
    store: &Store,
    parent_id: &str,
    child_id: &str,
    username_override: Option<String>,
) -> Result<Credentials, RotationError> {
    let linked = store
        .is_linked(parent_id, child_id)
        .await
        .map_err(|e| RotationError::Failed(e.to_string()))?;
    if !linked {
        return Err(RotationError::NotAuthorized);
    }

    let identity = identity_store
        .get_identity(child_id)
        .await
        .map_err(|e| match e {
            IdentityError::NotFound => RotationError::IdentityNotFound,
            other => RotationError::Failed(other.to_string()),
        })?
        .ok_or(RotationError::IdentityNotFound)?;

    let password = generate_one_time_password();
    identity_store
        .update_identity(
            child_id,
            IdentityUpdate {
                password: Some(password.clone()),
                ..Default::default()
            },
        )
        .await
        .map_err(|e| match e {
            IdentityError::NotFound => RotationError::IdentityNotFound,
            other => RotationError::Failed(other.to_string()),
        })?;

    info!(child_id, "rotation: child password rotated");
    Ok(Credentials {
        email: identity.email,
        password,
        username: username_override.unwrap_or(identity.display_name),
    })
}

/// Never communicated to anyone; exists only because the identity provider
/// requires an email-shaped login identifier.
fn child_login_email(display_name: &str) -> String {
    let mut slug = slug::slugify(display_name);
    if slug.is_empty() {
        slug = "child".to_string();
    }
    let tag = Uuid::new_v4().simple().to_string();
    format!("{}-{}@{}", slug, &tag[..8], CHILD_EMAIL_DOMAIN)
}

/// 122 bits from the OS RNG, hex-encoded. Treated as opaque by callers.
fn generate_one_time_password() -> String {
    Uuid::new_v4().simple().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-memory stand-in for the external identity provider. `fixed_id`
    /// makes the generated id predictable; `fail_deletes` simulates a
    /// provider outage during compensation.
    struct MemIdentityStore {
        identities: Mutex<HashMap<String, Identity>>,
        fixed_id: Option<String>,
        fail_deletes: bool,
    }

    impl MemIdentityStore {
        fn new() -> Self {
            MemIdentityStore {
                identities: Mutex::new(HashMap::new()),
                fixed_id: None,
                fail_deletes: false,
            }
        }

        fn with_fixed_id(id: &str) -> Self {
            MemIdentityStore {
                fixed_id: Some(id.to_string()),
                ..Self::new()
            }
        }
    }

    #[async_trait]
    impl IdentityStore for MemIdentityStore {
        async fn create_identity(&self, new: NewIdentity<'_>) -> Result<Identity, IdentityError> {
            let id = self
                .fixed_id
                .clone()
                .unwrap_or_else(|| Uuid::new_v4().to_string());
            let identity = Identity {
                id: id.clone(),
                email: new.email.to_string(),
                password_hash: format!("hashed:{}", new.password),
                display_name: new.display_name.to_string(),
                role: new.role,
                age_group: new.age_group.map(|s| s.to_string()),
                email_verified: new.email_verified,
            };
            self.identities.lock().unwrap().insert(id, identity.clone());
            Ok(identity)
        }

        async fn get_identity(&self, id: &str) -> Result<Option<Identity>, IdentityError> {
            Ok(self.identities.lock().unwrap().get(id).cloned())
        }

        async fn get_identity_by_email(
            &self,
            email: &str,
        ) -> Result<Option<Identity>, IdentityError> {
            Ok(self
                .identities
                .lock()
                .unwrap()
                .values()
                .find(|i| i.email == email)
                .cloned())
        }

        async fn update_identity(
            &self,
            id: &str,
            changes: IdentityUpdate,
        ) -> Result<Identity, IdentityError> {
            let mut map = self.identities.lock().unwrap();
            let identity = map.get_mut(id).ok_or(IdentityError::NotFound)?;
            if let Some(pw) = changes.password {
                identity.password_hash = format!("hashed:{}", pw);
            }
            if let Some(name) = changes.display_name {
                identity.display_name = name;
            }
            if let Some(group) = changes.age_group {
                identity.age_group = Some(group);
            }
            Ok(identity.clone())
        }

        async fn delete_identity(&self, id: &str) -> Result<bool, IdentityError> {
            if self.fail_deletes {
                return Err(IdentityError::Unavailable("provider outage".into()));
            }
            Ok(self.identities.lock().unwrap().remove(id).is_some())
        }
    }

    async fn temp_store() -> (Store, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.db");
        let store = Store::connect_sqlite(path.to_str().unwrap()).await.unwrap();
        (store, dir)
    }

    fn request(parent: &str) -> ProvisionRequest {
        ProvisionRequest {
            parent_id: parent.to_string(),
            display_name: "Alice Kid".to_string(),
            age_group: AgeGroup::EightToTen,
            existing_child_id: None,
        }
    }

    #[tokio::test]
    async fn provisioning_creates_identity_profile_and_link() {
        let identity_store = MemIdentityStore::new();
        let (store, _dir) = temp_store().await;

        let profile = provision_child(&identity_store, &store, request("parent-a"))
            .await
            .unwrap();

        assert_eq!(profile.username, "Alice Kid");
        assert_eq!(profile.role(), Role::Child);
        assert_eq!(profile.age_group.as_deref(), Some("8-10"));

        let identity = identity_store
            .get_identity(&profile.id)
            .await
            .unwrap()
            .unwrap();
        assert!(identity.email.ends_with(CHILD_EMAIL_DOMAIN));
        assert!(identity.email_verified);

        let link = store.get_link_by_child(&profile.id).await.unwrap().unwrap();
        assert_eq!(link.parent_id, "parent-a");
    }

    #[tokio::test]
    async fn retried_provisioning_is_idempotent() {
        let identity_store = MemIdentityStore::new();
        let (store, _dir) = temp_store().await;

        let first = provision_child(&identity_store, &store, request("parent-a"))
            .await
            .unwrap();

        // Simulate a retried request that carries the already-created id.
        let retry = ProvisionRequest {
            existing_child_id: Some(first.id.clone()),
            ..request("parent-a")
        };
        let second = provision_child(&identity_store, &store, retry).await.unwrap();

        assert_eq!(first.id, second.id);
        let children = store.list_children("parent-a").await.unwrap();
        assert_eq!(children.len(), 1, "exactly one profile row");
        let link = store.get_link_by_child(&first.id).await.unwrap().unwrap();
        assert_eq!(link.parent_id, "parent-a", "exactly one link row");
    }

    #[tokio::test]
    async fn link_conflict_compensates_profile_and_identity() {
        let identity_store = MemIdentityStore::with_fixed_id("child-x");
        let (store, _dir) = temp_store().await;

        // Another parent won the race for this child id.
        store
            .create_family_link("parent-b", "child-x")
            .await
            .unwrap();

        let err = provision_child(&identity_store, &store, request("parent-a"))
            .await
            .unwrap_err();
        match &err {
            ProvisionError::FamilyLink { identity_id, .. } => assert_eq!(identity_id, "child-x"),
            other => panic!("expected FamilyLink, got {other:?}"),
        }

        // Compensation removed both the profile and the identity.
        assert!(store.get_profile("child-x").await.unwrap().is_none());
        assert!(
            identity_store
                .get_identity("child-x")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn failed_resume_never_deletes_existing_child() {
        let identity_store = MemIdentityStore::new();
        let (store, _dir) = temp_store().await;

        // Fully provisioned child of another parent.
        let victim = provision_child(
            &identity_store,
            &store,
            ProvisionRequest {
                parent_id: "parent-b".to_string(),
                display_name: "Bob Kid".to_string(),
                age_group: AgeGroup::TenToTwelve,
                existing_child_id: None,
            },
        )
        .await
        .unwrap();

        // A hostile "resume" onto that id fails at the link step and must
        // not compensate away state it never created.
        let err = provision_child(
            &identity_store,
            &store,
            ProvisionRequest {
                existing_child_id: Some(victim.id.clone()),
                ..request("parent-a")
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ProvisionError::FamilyLink { .. }));

        assert!(store.get_profile(&victim.id).await.unwrap().is_some());
        assert!(
            identity_store
                .get_identity(&victim.id)
                .await
                .unwrap()
                .is_some()
        );
        let link = store.get_link_by_child(&victim.id).await.unwrap().unwrap();
        assert_eq!(link.parent_id, "parent-b");
    }

    #[tokio::test]
    async fn failed_compensation_surfaces_orphan_id() {
        let mut identity_store = MemIdentityStore::with_fixed_id("child-x");
        identity_store.fail_deletes = true;
        let (store, _dir) = temp_store().await;

        store
            .create_family_link("parent-b", "child-x")
            .await
            .unwrap();

        let err = provision_child(&identity_store, &store, request("parent-a"))
            .await
            .unwrap_err();
        match err {
            ProvisionError::OrphanRisk { orphan_id, .. } => assert_eq!(orphan_id, "child-x"),
            other => panic!("expected OrphanRisk, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn rotation_requires_linked_parent() {
        let identity_store = MemIdentityStore::new();
        let (store, _dir) = temp_store().await;
        let profile = provision_child(&identity_store, &store, request("parent-a"))
            .await
            .unwrap();

        let err = rotate_credentials(&identity_store, &store, "parent-b", &profile.id, None)
            .await
            .unwrap_err();
        assert!(matches!(err, RotationError::NotAuthorized));
    }

    #[tokio::test]
    async fn rotation_replaces_password_and_keeps_email() {
        let identity_store = MemIdentityStore::new();
        let (store, _dir) = temp_store().await;
        let profile = provision_child(&identity_store, &store, request("parent-a"))
            .await
            .unwrap();
        let before = identity_store
            .get_identity(&profile.id)
            .await
            .unwrap()
            .unwrap();

        let creds = rotate_credentials(&identity_store, &store, "parent-a", &profile.id, None)
            .await
            .unwrap();

        assert_eq!(creds.email, before.email);
        assert_eq!(creds.username, "Alice Kid");
        assert_eq!(creds.password.len(), 32);

        let after = identity_store
            .get_identity(&profile.id)
            .await
            .unwrap()
            .unwrap();
        assert_ne!(after.password_hash, before.password_hash);

        // A second rotation invalidates the first password again.
        let creds2 = rotate_credentials(&identity_store, &store, "parent-a", &profile.id, None)
            .await
            .unwrap();
        assert_ne!(creds2.password, creds.password);
    }
}
