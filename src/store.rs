//!
//! portcullis store module
//! -----------------------
//! In-memory reference implementation of the persistent keyed object store
//! the core authenticates against. The real storage engine is an external
//! collaborator; this module pins down the interface the core relies on:
//! a root store holding the global username reference table plus the
//! identifier -> private-store map, and per-identity private stores each
//! holding a password-hash capability, zero-or-more tokens and zero-or-one
//! active session.
//!
//! Mutation discipline: a private store is only read-modify-written while
//! holding its write guard (or, across suspension points, the directory
//! lock from `crate::directory`). Handles are `Arc<RwLock<_>>` so shared
//! ownership mirrors how the rest of the codebase passes store handles
//! around.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::auth::identity::{create_identifier, Identity};
use crate::auth::token::Token;
use crate::error::{AuthError, AuthResult};

/// The single active session for an identity. At most one valid use: login
/// deletes it and installs a replacement atomically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub identifier: String,
}

/// One identity's isolated private resource store.
#[derive(Debug)]
pub struct UserStore {
    identity: Identity,
    password_hash: Option<String>,
    tokens: HashMap<String, Token>,
    session: Option<SessionRecord>,
}

pub type SharedUserStore = Arc<RwLock<UserStore>>;

impl UserStore {
    pub fn new(identity: Identity) -> SharedUserStore {
        Arc::new(RwLock::new(UserStore {
            identity,
            password_hash: None,
            tokens: HashMap::new(),
            session: None,
        }))
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn password_hash(&self) -> Option<&str> {
        self.password_hash.as_deref()
    }

    pub fn set_password_hash(&mut self, phc: String) {
        self.password_hash = Some(phc);
    }

    pub fn insert_token(&mut self, token: Token) {
        self.tokens.insert(token.identifier.clone(), token);
    }

    /// Removes a token by identifier. Idempotent: removal of an absent token
    /// is a no-op, because consumption and scheduled expiry race by design.
    pub fn remove_token(&mut self, identifier: &str) -> bool {
        self.tokens.remove(identifier).is_some()
    }

    pub fn clear_tokens(&mut self) -> usize {
        let count = self.tokens.len();
        self.tokens.clear();
        count
    }

    pub fn tokens(&self) -> impl Iterator<Item = &Token> {
        self.tokens.values()
    }

    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }

    pub fn has_token(&self, identifier: &str) -> bool {
        self.tokens.contains_key(identifier)
    }

    pub fn session_identifier(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.identifier.as_str())
    }

    /// Installs a session, replacing any previous one. Callers rotating a
    /// session do the verify-delete-replace sequence under a single write
    /// guard so the rotation is one logical transaction.
    pub fn replace_session(&mut self, session: SessionRecord) {
        self.session = Some(session);
    }
}

/// The root store: global username references plus the map from opaque
/// identifier to private-store handle. Explicit ownership, no ambient
/// registry: components that need it take a `SharedRootStore` at
/// construction.
#[derive(Debug, Default)]
pub struct RootStore {
    names: HashMap<String, Identity>,
    users: HashMap<Identity, SharedUserStore>,
}

pub type SharedRootStore = Arc<RwLock<RootStore>>;

/// Entropy width for freshly minted opaque user identifiers.
const IDENTIFIER_BITS: usize = 320;

impl RootStore {
    pub fn new() -> SharedRootStore {
        Arc::new(RwLock::new(RootStore::default()))
    }

    /// Mints a fresh opaque identity and creates its empty private store.
    pub fn create_user(&mut self) -> AuthResult<(Identity, SharedUserStore)> {
        let identity = Identity::new(create_identifier(IDENTIFIER_BITS)?);
        let store = UserStore::new(identity.clone());
        self.users.insert(identity.clone(), store.clone());
        debug!(target: "portcullis::store", "create_user: identity={}", identity);
        Ok((identity, store))
    }

    /// Inserts a username reference. At most one reference per username;
    /// a conflicting insert fails and leaves the table untouched.
    pub fn register_name(&mut self, name: &str, identity: Identity) -> Result<(), AuthError> {
        if self.names.contains_key(name) {
            return Err(AuthError::DuplicateCredentials);
        }
        self.names.insert(name.to_string(), identity);
        Ok(())
    }

    pub fn resolve_name(&self, name: &str) -> Option<Identity> {
        self.names.get(name).cloned()
    }

    pub fn user_store(&self, identity: &Identity) -> Option<SharedUserStore> {
        self.users.get(identity).cloned()
    }

    pub fn contains_user(&self, identity: &Identity) -> bool {
        self.users.contains_key(identity)
    }

    /// Snapshot of all private-store handles, for components that scan
    /// across identities (the token-counting checker).
    pub fn user_stores(&self) -> Vec<SharedUserStore> {
        self.users.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_user_yields_distinct_identities() {
        let root = RootStore::new();
        let (a, _) = root.write().create_user().unwrap();
        let (b, _) = root.write().create_user().unwrap();
        assert_ne!(a, b);
        assert!(root.read().contains_user(&a));
        assert!(root.read().contains_user(&b));
    }

    #[test]
    fn name_references_are_unique() {
        let root = RootStore::new();
        let (a, _) = root.write().create_user().unwrap();
        let (b, _) = root.write().create_user().unwrap();
        root.write().register_name("alice", a.clone()).unwrap();
        let err = root.write().register_name("alice", b).unwrap_err();
        assert_eq!(err, AuthError::DuplicateCredentials);
        // the original mapping survives the failed insert
        assert_eq!(root.read().resolve_name("alice"), Some(a));
    }

    #[test]
    fn token_removal_is_idempotent() {
        let (_, store) = RootStore::new().write().create_user().unwrap();
        let token = Token::with_identifier("t1", "test");
        store.write().insert_token(token);
        assert!(store.write().remove_token("t1"));
        assert!(!store.write().remove_token("t1"));
    }

    #[test]
    fn session_replace_overwrites() {
        let (_, store) = RootStore::new().write().create_user().unwrap();
        store.write().replace_session(SessionRecord { identifier: "sid".into() });
        assert_eq!(store.read().session_identifier(), Some("sid"));
        store.write().replace_session(SessionRecord { identifier: "sid2".into() });
        assert_eq!(store.read().session_identifier(), Some("sid2"));
    }
}
