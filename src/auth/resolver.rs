//! Identity Resolver
//! Mission: Turn a username into a normalized Principal

use std::sync::Arc;

use tracing::debug;

use crate::auth::models::Principal;
use crate::auth::user_store::UserStore;

/// Resolves usernames into [`Principal`]s against the identity store.
///
/// Performs no credential verification; password comparison belongs to the
/// login collaborator. Safe to share across concurrent requests: holds no
/// mutable state, only read access to the store.
pub struct PrincipalResolver {
    store: Arc<UserStore>,
}

impl PrincipalResolver {
    pub fn new(store: Arc<UserStore>) -> Self {
        Self { store }
    }

    /// Fetch the user and its roles, and derive the authority set.
    ///
    /// `IdentityNotFound` is a distinct signal so the login collaborator can
    /// collapse it into the same generic response as a bad password; it must
    /// never be surfaced to an external caller as-is.
    pub fn resolve(&self, username: &str) -> Result<Principal, ResolveError> {
        let user = self
            .store
            .find_user_by_username(username)?
            .ok_or_else(|| ResolveError::IdentityNotFound {
                username: username.to_string(),
            })?;

        let roles = self.store.roles_for_user(user.id)?;
        let principal = Principal::from_user(&user, &roles);

        debug!(
            username = %principal.username,
            authorities = principal.authorities.len(),
            "Resolved principal"
        );

        Ok(principal)
    }
}

/// Resolution failures
#[derive(Debug)]
pub enum ResolveError {
    /// No user record exists for the username.
    IdentityNotFound { username: String },
    /// The identity store itself failed.
    Store(anyhow::Error),
}

impl std::fmt::Display for ResolveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResolveError::IdentityNotFound { username } => {
                write!(f, "No user found with name: {username}")
            }
            ResolveError::Store(err) => write!(f, "Identity store error: {err}"),
        }
    }
}

impl std::error::Error for ResolveError {}

impl From<anyhow::Error> for ResolveError {
    fn from(err: anyhow::Error) -> Self {
        ResolveError::Store(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use tempfile::NamedTempFile;

    fn create_test_resolver() -> (Arc<UserStore>, PrincipalResolver, NamedTempFile) {
        let temp_file = NamedTempFile::new().unwrap();
        let store = Arc::new(UserStore::new(temp_file.path().to_str().unwrap()).unwrap());
        (store.clone(), PrincipalResolver::new(store), temp_file)
    }

    #[test]
    fn test_resolve_unknown_user_is_identity_not_found() {
        let (_store, resolver, _temp) = create_test_resolver();

        match resolver.resolve("nobody") {
            Err(ResolveError::IdentityNotFound { username }) => assert_eq!(username, "nobody"),
            other => panic!("Expected IdentityNotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_resolve_derives_exact_authority_set() {
        let (_store, resolver, _temp) = create_test_resolver();

        let principal = resolver.resolve("admin").unwrap();
        let expected: HashSet<String> = ["ROLE_ADMIN".to_string()].into_iter().collect();
        assert_eq!(principal.authorities, expected);
        assert!(principal.is_active());
        assert!(!principal.password_hash.is_empty());
    }

    #[test]
    fn test_resolve_is_case_sensitive() {
        let (_store, resolver, _temp) = create_test_resolver();

        assert!(resolver.resolve("admin").is_ok());
        assert!(matches!(
            resolver.resolve("Admin"),
            Err(ResolveError::IdentityNotFound { .. })
        ));
    }

    #[test]
    fn test_resolution_reflects_administrative_flag_changes() {
        let (store, resolver, _temp) = create_test_resolver();

        assert!(resolver.resolve("student").unwrap().is_active());

        // Lock the account, then resolve again: flags are read fresh,
        // never cached on the principal between attempts.
        store.set_locked("student", true).unwrap();
        let locked = resolver.resolve("student").unwrap();
        assert!(!locked.account_non_locked);
        assert!(!locked.is_active());
    }
}
