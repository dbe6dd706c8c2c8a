//! Ownership Policy
//!
//! Ownership is the only authorization axis. The check takes a loaded resource, not an
//! id, so a missing resource has already surfaced as `NotFound` before `Forbidden` can.

use crate::{
    auth::models::Identity,
    error::{AppError, AppResult},
};
use tracing::debug;

/// A stored record with a single owning identity.
pub trait Owned {
    fn owner_id(&self) -> &str;
}

pub fn can_mutate(identity: &Identity, owner_id: &str) -> bool {
    identity.id == owner_id
}

/// `Forbidden` unless `identity` owns `resource`.
pub fn authorize_mutation<R: Owned>(identity: &Identity, resource: &R) -> AppResult<()> {
    if can_mutate(identity, resource.owner_id()) {
        Ok(())
    } else {
        debug!(
            user_id = %identity.id,
            owner_id = %resource.owner_id(),
            "User is not the owner of the resource"
        );
        Err(AppError::Forbidden)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::models::AccountStatus;
    use chrono::Utc;

    struct Doc {
        owner: String,
    }

    impl Owned for Doc {
        fn owner_id(&self) -> &str {
            &self.owner
        }
    }

    fn identity(id: &str) -> Identity {
        Identity {
            id: id.to_string(),
            email: format!("{id}@x.com"),
            username: id.to_string(),
            first_name: String::new(),
            last_name: String::new(),
            bio: None,
            password_hash: String::new(),
            status: AccountStatus::Active,
            last_login_at: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_owner_may_mutate() {
        let doc = Doc {
            owner: "usr_j".into(),
        };
        assert!(authorize_mutation(&identity("usr_j"), &doc).is_ok());
    }

    #[test]
    fn test_non_owner_is_forbidden() {
        let doc = Doc {
            owner: "usr_j".into(),
        };
        assert!(matches!(
            authorize_mutation(&identity("usr_i"), &doc),
            Err(AppError::Forbidden)
        ));
        assert!(!can_mutate(&identity("usr_i"), "usr_j"));
    }
}
