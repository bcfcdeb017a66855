//! Session-based reauthentication: single-use identifiers rotated on every
//! successful login.

use tracing::{debug, warn};

use crate::error::{AuthError, AuthResult};
use crate::store::{SessionRecord, SharedRootStore};

use super::identity::{create_identifier, Identity};

/// Entropy width for session identifiers.
const SESSION_BITS: usize = 320;

/// Issues and rotates the single active session per identity.
pub struct SessionManager {
    root: SharedRootStore,
}

impl SessionManager {
    pub fn new(root: SharedRootStore) -> Self {
        SessionManager { root }
    }

    /// Creates a fresh session for an already-authenticated identity,
    /// replacing any previous one, and returns its identifier.
    pub fn request_session(&self, identity: &Identity) -> AuthResult<String> {
        let store = self
            .root
            .read()
            .user_store(identity)
            .ok_or_else(|| AuthError::unauthorized("unknown user"))?;
        let identifier = create_identifier(SESSION_BITS)?;
        store.write().replace_session(SessionRecord { identifier: identifier.clone() });
        debug!(target: "portcullis::auth", "session issued for {}", identity);
        Ok(identifier)
    }

    /// Verifies the presented session identifier, invalidates it and
    /// installs a replacement, returning the replacement's identifier.
    ///
    /// Verify, delete and create happen under one store write guard: the
    /// rotation is a single logical transaction, so a replayed identifier
    /// fails identically to an unknown one.
    pub fn login(&self, identity: &Identity, session_identifier: &str) -> AuthResult<String> {
        let store = self.root.read().user_store(identity).ok_or_else(|| {
            warn!(target: "portcullis::auth", "session login for unknown identity {}", identity);
            AuthError::unauthorized("unknown user")
        })?;

        let mut guard = store.write();
        match guard.session_identifier() {
            Some(current) if current == session_identifier => {}
            _ => {
                warn!(target: "portcullis::auth", "invalid session identifier for {}", identity);
                return Err(AuthError::unauthorized("unknown session identifier"));
            }
        }
        let replacement = create_identifier(SESSION_BITS)?;
        guard.replace_session(SessionRecord { identifier: replacement.clone() });
        debug!(target: "portcullis::auth", "session rotated for {}", identity);
        Ok(replacement)
    }
}
