//! Unified error model for the authentication core.
//! Internal checker-level rejections (`AuthError`) carry a reason for the
//! logs; at the command boundary they collapse into the coarse user-visible
//! `CommandError` so callers never see lock states or token bookkeeping.

use thiserror::Error;

/// Faults raised by the lock directory while brokering exclusive access to a
/// per-identity store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LockError {
    /// No private store exists at the requested path.
    #[error("no store at the requested path")]
    NoSuchStore,
    /// The requested path is already locked by another caller.
    #[error("lock already acquired")]
    AlreadyAcquired,
    /// The lock was released twice. This is a resource-management bug in the
    /// calling code, not a recoverable authentication failure.
    #[error("lock already released")]
    AlreadyReleased,
}

/// Checker-level authentication failures. Recoverable at the request level:
/// the caller simply loses that login attempt, no persistent state is left
/// behind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// The presented credentials did not resolve to an identity. The reason
    /// string is for internal logging only and must never reach a caller.
    #[error("unauthorized login: {0}")]
    UnauthorizedLogin(String),
    /// A registration conflicted with an existing credential reference.
    #[error("credentials already registered")]
    DuplicateCredentials,
    /// The credential backend itself failed (entropy exhaustion, hasher
    /// error). Surfaces to the caller as a failed attempt.
    #[error("credential backend failure: {0}")]
    Backend(String),
}

impl AuthError {
    pub fn unauthorized<S: Into<String>>(reason: S) -> Self {
        AuthError::UnauthorizedLogin(reason.into())
    }

    pub fn backend<S: Into<String>>(reason: S) -> Self {
        AuthError::Backend(reason.into())
    }
}

impl From<LockError> for AuthError {
    fn from(err: LockError) -> Self {
        // Double release never originates from an acquire path; folding it
        // into an auth failure would mask a lock-handling bug.
        debug_assert!(
            !matches!(err, LockError::AlreadyReleased),
            "double lock release folded into an auth error"
        );
        match err {
            LockError::NoSuchStore => AuthError::unauthorized("unknown user identifier"),
            LockError::AlreadyAcquired => AuthError::unauthorized("login already in progress"),
            LockError::AlreadyReleased => AuthError::backend("lock released twice"),
        }
    }
}

/// The only error variants visible at the RPC command boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("bad credentials")]
    BadCredentials,
    #[error("duplicate credentials")]
    DuplicateCredentials,
    #[error("requested capability is not supported")]
    UnsupportedCapability,
}

impl CommandError {
    /// Stable wire code for serializing error responses.
    pub fn wire_code(&self) -> &'static str {
        match self {
            CommandError::BadCredentials => "BAD_CREDENTIALS",
            CommandError::DuplicateCredentials => "DUPLICATE_CREDENTIALS",
            CommandError::UnsupportedCapability => "UNSUPPORTED_CAPABILITY",
        }
    }
}

impl From<AuthError> for CommandError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::UnauthorizedLogin(_) | AuthError::Backend(_) => CommandError::BadCredentials,
            AuthError::DuplicateCredentials => CommandError::DuplicateCredentials,
        }
    }
}

pub type AuthResult<T> = Result<T, AuthError>;
pub type CommandResult<T> = Result<T, CommandError>;
