//! Tunables for the authentication core, passed by value at assembly time.

use std::time::Duration;

/// Configuration for token issuance and the counting checker.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Entropy drawn for each token identifier, in bits. Identifiers are hex
    /// encoded, so the resulting string is `token_bits / 4` characters long.
    pub token_bits: usize,
    /// How long an issued token remains registered before the scheduled
    /// invalidator removes it.
    pub token_validity: Duration,
    /// How many distinct-source tokens the counting checker requires.
    /// Zero disables the threshold entirely, meaning "no authentication
    /// required" for any caller that can address the store. Deliberately
    /// dangerous; only for stores that are public by design.
    pub required_tokens: usize,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_bits: 320,
            token_validity: Duration::from_secs(60),
            required_tokens: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = AuthConfig::default();
        assert_eq!(config.token_bits, 320);
        assert_eq!(config.token_validity, Duration::from_secs(60));
        assert_eq!(config.required_tokens, 1);
    }
}
