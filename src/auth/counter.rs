//! The token-counting checker: k-factor authentication over short-lived
//! tokens minted by other mechanisms.

use async_trait::async_trait;
use tracing::warn;

use crate::error::{AuthError, AuthResult};
use crate::store::{SharedRootStore, SharedUserStore};

use super::checker::{CredentialKind, Credentials, CredentialsChecker};
use super::identity::Identity;
use super::token::TokenSet;

/// Counts presented token identifiers against the tokens registered in the
/// owning identity's store. Requires `required_tokens` matches from tokens
/// of pairwise-distinct sources.
pub struct TokenCounter {
    root: SharedRootStore,
    required_tokens: usize,
}

impl TokenCounter {
    /// By default one token is required.
    pub fn new(root: SharedRootStore) -> Self {
        TokenCounter { root, required_tokens: 1 }
    }

    /// `required_tokens == 0` disables the threshold: any caller that can
    /// address the store authenticates. Explicitly dangerous; see
    /// [`crate::config::AuthConfig::required_tokens`].
    pub fn with_required_tokens(root: SharedRootStore, required_tokens: usize) -> Self {
        TokenCounter { root, required_tokens }
    }

    pub fn required_tokens(&self) -> usize {
        self.required_tokens
    }

    /// Runs the counting algorithm against one store. On success the
    /// matched tokens are consumed (single-use proof material); a rejection
    /// consumes nothing.
    pub fn count_against(&self, store: &SharedUserStore, presented: &TokenSet) -> AuthResult<Identity> {
        let mut guard = store.write();
        let identity = guard.identity().clone();

        // One factor split into many tokens must not satisfy a k-factor
        // threshold: two registered tokens sharing a source reject the
        // attempt outright.
        let mut seen_sources = Vec::new();
        for token in guard.tokens() {
            if seen_sources.contains(&token.source) {
                warn!(
                    target: "portcullis::auth",
                    "duplicate token source '{}' registered for {}", token.source, identity
                );
                return Err(AuthError::unauthorized("duplicate token source"));
            }
            seen_sources.push(token.source.clone());
        }

        // Intersection of presented and registered identifiers. Unknown
        // presented identifiers are excluded, not flagged; superfluous
        // matches beyond the threshold carry no penalty.
        let matched: Vec<String> = guard
            .tokens()
            .filter(|token| presented.contains(&token.identifier))
            .map(|token| token.identifier.clone())
            .collect();

        if matched.len() < self.required_tokens {
            warn!(
                target: "portcullis::auth",
                "insufficient tokens for {}: {} of {}", identity, matched.len(), self.required_tokens
            );
            return Err(AuthError::unauthorized("insufficient tokens"));
        }

        for identifier in &matched {
            guard.remove_token(identifier);
        }
        Ok(identity)
    }

    /// Locates the store holding any of the presented identifiers.
    /// Identifiers carry enough entropy to be globally unique, so the first
    /// store with an intersection is the target.
    fn locate(&self, presented: &TokenSet) -> Option<SharedUserStore> {
        let stores = self.root.read().user_stores();
        stores
            .into_iter()
            .find(|store| presented.identifiers().any(|id| store.read().has_token(id)))
    }
}

#[async_trait]
impl CredentialsChecker for TokenCounter {
    fn accepts(&self) -> CredentialKind {
        CredentialKind::Tokens
    }

    async fn resolve_identity(&self, credentials: &Credentials) -> AuthResult<Identity> {
        let Credentials::Tokens(presented) = credentials else {
            return Err(AuthError::unauthorized("unsupported credential type"));
        };
        let Some(store) = self.locate(presented) else {
            warn!(target: "portcullis::auth", "no registered token matches the presented set");
            return Err(AuthError::unauthorized("no matching tokens"));
        };
        self.count_against(&store, presented)
    }
}
