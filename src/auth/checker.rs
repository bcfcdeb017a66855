//! The credential-checker seam: each checker is a strategy resolving one
//! credential variant to an opaque identity.

use async_trait::async_trait;

use crate::error::AuthResult;

use super::identity::Identity;
use super::token::TokenSet;

/// Typed credential payloads accepted by the portal. A tagged union rather
/// than runtime type inspection: the portal keys its dispatch table on
/// [`CredentialKind`] once at construction.
#[derive(Debug, Clone)]
pub enum Credentials {
    UsernamePassword { username: String, password: String },
    Tokens(TokenSet),
}

/// The variant tag used for checker dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CredentialKind {
    UsernamePassword,
    Tokens,
}

impl Credentials {
    pub fn kind(&self) -> CredentialKind {
        match self {
            Credentials::UsernamePassword { .. } => CredentialKind::UsernamePassword,
            Credentials::Tokens(_) => CredentialKind::Tokens,
        }
    }
}

/// A strategy implementing one authentication capability.
#[async_trait]
pub trait CredentialsChecker: Send + Sync {
    /// The single credential variant this checker accepts.
    fn accepts(&self) -> CredentialKind;

    /// Resolves the presented credentials to the owning identity, or fails
    /// with an `UnauthorizedLogin` carrying the internal reason.
    async fn resolve_identity(&self, credentials: &Credentials) -> AuthResult<Identity>;
}
