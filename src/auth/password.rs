//! Classic username and password authentication.

use std::sync::Arc;

use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use async_trait::async_trait;
use password_hash::{PasswordHash, SaltString};
use tracing::{debug, warn};

use crate::directory::LockDirectory;
use crate::error::{AuthError, AuthResult, LockError};
use crate::store::{SharedRootStore, SharedUserStore};

use super::checker::{CredentialKind, Credentials, CredentialsChecker};
use super::identity::Identity;

/// Hashes a password into a PHC string with a fresh random salt. Runs on
/// the blocking pool: argon2 is CPU-bound by design.
pub async fn hash_password(password: &str) -> AuthResult<String> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || {
        let mut salt_bytes = [0u8; 16];
        getrandom::getrandom(&mut salt_bytes).map_err(|e| AuthError::backend(e.to_string()))?;
        let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| AuthError::backend(e.to_string()))?;
        let argon2 = Argon2::default();
        let phc = argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AuthError::backend(e.to_string()))?
            .to_string();
        Ok(phc)
    })
    .await
    .map_err(|e| AuthError::backend(e.to_string()))?
}

/// Verifies a candidate password against a stored PHC string. An unparsable
/// hash verifies as false rather than erroring: the caller only loses the
/// attempt.
pub async fn verify_password(phc: &str, candidate: &str) -> bool {
    let phc = phc.to_string();
    let candidate = candidate.to_string();
    tokio::task::spawn_blocking(move || match PasswordHash::new(&phc) {
        Ok(parsed) => Argon2::default()
            .verify_password(candidate.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    })
    .await
    .unwrap_or(false)
}

/// Checks a username (or raw opaque identifier) and password against the
/// hash capability stored in the identity's locked private store.
pub struct PasswordChecker {
    root: SharedRootStore,
    directory: Arc<dyn LockDirectory>,
}

impl PasswordChecker {
    pub fn new(root: SharedRootStore, directory: Arc<dyn LockDirectory>) -> Self {
        PasswordChecker { root, directory }
    }

    /// Resolves a username through the global reference table, falling back
    /// to treating the string as an opaque identifier directly (the lock
    /// directory rejects identifiers with no backing store).
    fn resolve_reference(&self, username_or_uid: &str) -> Option<Identity> {
        let root = self.root.read();
        if let Some(identity) = root.resolve_name(username_or_uid) {
            return Some(identity);
        }
        let direct = Identity::new(username_or_uid);
        root.contains_user(&direct).then_some(direct)
    }

    /// Registers a new user: checks username uniqueness, mints a fresh
    /// opaque identity, persists the reference and installs the password
    /// hash in the new private store. All-or-nothing: a duplicate username
    /// leaves no partial state behind.
    pub async fn register(&self, username: &str, password: &str) -> AuthResult<Identity> {
        if self.root.read().resolve_name(username).is_some() {
            return Err(AuthError::DuplicateCredentials);
        }
        // hash outside the store guard; re-check under it
        let phc = hash_password(password).await?;
        let mut root = self.root.write();
        if root.resolve_name(username).is_some() {
            return Err(AuthError::DuplicateCredentials);
        }
        let (identity, store) = root.create_user()?;
        root.register_name(username, identity.clone())?;
        store.write().set_password_hash(phc);
        debug!(target: "portcullis::auth", "registered username={} identity={}", username, identity);
        Ok(identity)
    }

    /// Sets the password for an already-authenticated identity, under the
    /// identity's write lock.
    pub async fn set_password(&self, identity: &Identity, password: &str) -> AuthResult<()> {
        let phc = hash_password(password).await?;
        let mut lock = self.directory.acquire(&["users", identity.as_str()]).await?;
        lock.store().write().set_password_hash(phc);
        lock.write().await?;
        lock.release().await?;
        Ok(())
    }

    async fn check(&self, store: &SharedUserStore, identity: &Identity, password: &str) -> AuthResult<Identity> {
        let stored = store.read().password_hash().map(str::to_string);
        let Some(phc) = stored else {
            warn!(target: "portcullis::auth", "no password installed for identity {}", identity);
            return Err(AuthError::unauthorized("missing password"));
        };
        if verify_password(&phc, password).await {
            Ok(identity.clone())
        } else {
            warn!(target: "portcullis::auth", "wrong password for identity {}", identity);
            Err(AuthError::unauthorized("wrong password"))
        }
    }
}

#[async_trait]
impl CredentialsChecker for PasswordChecker {
    fn accepts(&self) -> CredentialKind {
        CredentialKind::UsernamePassword
    }

    async fn resolve_identity(&self, credentials: &Credentials) -> AuthResult<Identity> {
        let Credentials::UsernamePassword { username, password } = credentials else {
            return Err(AuthError::unauthorized("unsupported credential type"));
        };

        let Some(identity) = self.resolve_reference(username) else {
            warn!(target: "portcullis::auth", "unknown user reference: {}", username);
            return Err(AuthError::unauthorized("unknown user"));
        };

        // Exclusive access for the whole compare; a concurrent attempt on
        // the same identity fails fast and loses its attempt.
        let mut lock = match self.directory.acquire(&["users", identity.as_str()]).await {
            Ok(lock) => lock,
            Err(err @ (LockError::NoSuchStore | LockError::AlreadyAcquired)) => {
                warn!(target: "portcullis::auth", "lock acquire failed for {}: {}", identity, err);
                return Err(err.into());
            }
            Err(err) => return Err(err.into()),
        };

        let result = self.check(lock.store(), &identity, password).await;
        lock.release().await?;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::LocalLockDirectory;
    use crate::store::RootStore;

    struct Fixture {
        root: SharedRootStore,
        directory: Arc<LocalLockDirectory>,
        checker: PasswordChecker,
    }

    fn fixture() -> Fixture {
        let root = RootStore::new();
        let directory = LocalLockDirectory::new(root.clone());
        let checker = PasswordChecker::new(root.clone(), directory.clone());
        Fixture { root, directory, checker }
    }

    fn password_credentials(username: &str, password: &str) -> Credentials {
        Credentials::UsernamePassword { username: username.into(), password: password.into() }
    }

    #[tokio::test]
    async fn resolves_with_correct_username_and_password() {
        let fx = fixture();
        let identity = fx.checker.register("alice", "s3cret").await.unwrap();
        let resolved = fx
            .checker
            .resolve_identity(&password_credentials("alice", "s3cret"))
            .await
            .unwrap();
        assert_eq!(resolved, identity);
    }

    #[tokio::test]
    async fn resolves_with_raw_identifier() {
        let fx = fixture();
        let identity = fx.checker.register("alice", "s3cret").await.unwrap();
        let resolved = fx
            .checker
            .resolve_identity(&password_credentials(identity.as_str(), "s3cret"))
            .await
            .unwrap();
        assert_eq!(resolved, identity);
    }

    #[tokio::test]
    async fn wrong_password_is_unauthorized() {
        let fx = fixture();
        fx.checker.register("alice", "s3cret").await.unwrap();
        let err = fx
            .checker
            .resolve_identity(&password_credentials("alice", "BOGUS"))
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::unauthorized("wrong password"));
    }

    #[tokio::test]
    async fn unknown_user_is_unauthorized_with_a_distinct_reason() {
        let fx = fixture();
        let err = fx
            .checker
            .resolve_identity(&password_credentials("BOGUS", "BOGUS"))
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::unauthorized("unknown user"));
    }

    #[tokio::test]
    async fn missing_password_capability_is_unauthorized() {
        let fx = fixture();
        let (identity, _) = fx.root.write().create_user().unwrap();
        let err = fx
            .checker
            .resolve_identity(&password_credentials(identity.as_str(), "anything"))
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::unauthorized("missing password"));
    }

    #[tokio::test]
    async fn concurrent_attempt_on_a_held_identity_loses() {
        let fx = fixture();
        let identity = fx.checker.register("alice", "s3cret").await.unwrap();
        let _held = fx.directory.acquire(&["users", identity.as_str()]).await.unwrap();
        let err = fx
            .checker
            .resolve_identity(&password_credentials("alice", "s3cret"))
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::unauthorized("login already in progress"));
    }

    #[tokio::test]
    async fn failed_resolution_releases_the_lock() {
        let fx = fixture();
        let identity = fx.checker.register("alice", "s3cret").await.unwrap();
        let _ = fx
            .checker
            .resolve_identity(&password_credentials("alice", "BOGUS"))
            .await
            .unwrap_err();
        // the identity is lockable again
        fx.directory.acquire(&["users", identity.as_str()]).await.unwrap();
    }

    #[tokio::test]
    async fn duplicate_username_fails_second_registration() {
        let fx = fixture();
        fx.checker.register("alice", "one").await.unwrap();
        let err = fx.checker.register("alice", "two").await.unwrap_err();
        assert_eq!(err, AuthError::DuplicateCredentials);
    }

    #[tokio::test]
    async fn distinct_usernames_yield_distinct_identities() {
        let fx = fixture();
        let a = fx.checker.register("alice", "pw").await.unwrap();
        let b = fx.checker.register("bob", "pw").await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn set_password_replaces_the_stored_hash() {
        let fx = fixture();
        let identity = fx.checker.register("alice", "old").await.unwrap();
        fx.checker.set_password(&identity, "new").await.unwrap();

        let err = fx
            .checker
            .resolve_identity(&password_credentials("alice", "old"))
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::unauthorized("wrong password"));
        fx.checker
            .resolve_identity(&password_credentials("alice", "new"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn hash_and_verify_roundtrip() {
        let phc = hash_password("hunter2").await.unwrap();
        assert!(phc.starts_with("$argon2"));
        assert!(verify_password(&phc, "hunter2").await);
        assert!(!verify_password(&phc, "hunter3").await);
        assert!(!verify_password("not-a-phc-string", "hunter2").await);
    }
}
