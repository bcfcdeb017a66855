//! Short-lived proof-of-possession tokens and the transient credential
//! payload that presents them.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::config::AuthConfig;
use crate::error::{AuthError, AuthResult};
use crate::scheduler::Scheduler;
use crate::store::SharedUserStore;

use super::identity::create_identifier;

/// Source label for tokens minted by password authentication.
pub const TOKEN_SOURCE_PASSWORD: &str = "password";

/// A token registered in one identity's private store. One of possibly
/// several factors required by the counting checker; the `source` records
/// which mechanism minted it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub identifier: String,
    pub source: String,
    pub issued_at: Instant,
    pub validity: Duration,
}

impl Token {
    /// Test/fixture constructor with a caller-chosen identifier and the
    /// default validity.
    pub fn with_identifier<S: Into<String>>(identifier: S, source: S) -> Self {
        Token {
            identifier: identifier.into(),
            source: source.into(),
            issued_at: Instant::now(),
            validity: AuthConfig::default().token_validity,
        }
    }
}

/// Issues a token into `store` and schedules its invalidation at
/// `now + validity`. Returns the freshly minted token.
pub fn issue(
    store: &SharedUserStore,
    source: &str,
    config: &AuthConfig,
    scheduler: &Arc<dyn Scheduler>,
) -> AuthResult<Token> {
    let token = Token {
        identifier: create_identifier(config.token_bits)?,
        source: source.to_string(),
        issued_at: Instant::now(),
        validity: config.token_validity,
    };
    store.write().insert_token(token.clone());
    schedule_invalidation(store, &token.identifier, config.token_validity, scheduler);
    debug!(
        target: "portcullis::auth",
        "issued token source={} validity_secs={}", source, config.token_validity.as_secs()
    );
    Ok(token)
}

/// Schedules removal of the token once its validity has passed. The
/// invalidator is a no-op when the token is already gone: consumption and
/// expiry race against each other by design.
pub fn schedule_invalidation(
    store: &SharedUserStore,
    identifier: &str,
    validity: Duration,
    scheduler: &Arc<dyn Scheduler>,
) {
    let weak = Arc::downgrade(store);
    let identifier = identifier.to_string();
    scheduler.schedule(
        validity,
        Box::new(move || {
            if let Some(store) = weak.upgrade() {
                store.write().remove_token(&identifier);
            }
        }),
    );
}

/// A set of presented token identifiers. Never persisted; construction
/// fails if the same identifier appears twice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSet {
    identifiers: HashSet<String>,
}

impl TokenSet {
    pub fn new<I, S>(identifiers: I) -> AuthResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set = HashSet::new();
        for identifier in identifiers {
            if !set.insert(identifier.into()) {
                return Err(AuthError::unauthorized("duplicate token identifiers presented"));
            }
        }
        Ok(TokenSet { identifiers: set })
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.identifiers.contains(identifier)
    }

    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.identifiers.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.identifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identifiers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::ManualScheduler;
    use crate::store::RootStore;

    fn fixture() -> (SharedUserStore, Arc<ManualScheduler>, AuthConfig) {
        let (_, store) = RootStore::new().write().create_user().unwrap();
        (store, ManualScheduler::new(), AuthConfig::default())
    }

    #[test]
    fn issue_registers_a_hex_identifier_of_configured_width() {
        let (store, scheduler, config) = fixture();
        let scheduler: Arc<dyn Scheduler> = scheduler;
        let token = issue(&store, "test", &config, &scheduler).unwrap();
        assert_eq!(token.identifier.len(), config.token_bits / 4);
        assert_eq!(token.validity, Duration::from_secs(60));
        assert!(store.read().has_token(&token.identifier));
    }

    #[test]
    fn issue_stamps_the_creation_time() {
        let (store, scheduler, config) = fixture();
        let scheduler: Arc<dyn Scheduler> = scheduler;
        let before = Instant::now();
        let token = issue(&store, "test", &config, &scheduler).unwrap();
        assert!(token.issued_at >= before);
        assert!(token.issued_at <= Instant::now());
    }

    #[test]
    fn token_expires_when_validity_passes() {
        let (store, manual, config) = fixture();
        let scheduler: Arc<dyn Scheduler> = manual.clone();
        let token = issue(&store, "test", &config, &scheduler).unwrap();

        manual.advance(Duration::from_secs(59));
        assert!(store.read().has_token(&token.identifier));

        manual.advance(Duration::from_secs(1));
        assert!(!store.read().has_token(&token.identifier));
    }

    #[test]
    fn invalidation_is_a_noop_when_already_consumed() {
        let (store, manual, config) = fixture();
        let scheduler: Arc<dyn Scheduler> = manual.clone();
        let token = issue(&store, "test", &config, &scheduler).unwrap();

        // consumed before expiry
        assert!(store.write().remove_token(&token.identifier));
        manual.advance(config.token_validity);
        assert_eq!(store.read().token_count(), 0);
    }

    #[test]
    fn invalidation_survives_a_dropped_store() {
        let (store, manual, config) = fixture();
        let scheduler: Arc<dyn Scheduler> = manual.clone();
        issue(&store, "test", &config, &scheduler).unwrap();
        drop(store);
        // no panic; the weak handle simply fails to upgrade
        manual.advance(config.token_validity);
    }

    #[test]
    fn token_set_accepts_distinct_identifiers() {
        let set = TokenSet::new(["1", "2", "3"]).unwrap();
        assert_eq!(set.len(), 3);
        assert!(set.contains("2"));
        assert!(!set.contains("4"));
    }

    #[test]
    fn token_set_rejects_duplicates() {
        let err = TokenSet::new(["1", "1", "1"]).unwrap_err();
        assert!(matches!(err, AuthError::UnauthorizedLogin(_)));
    }
}
