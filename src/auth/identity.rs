//! Opaque identities and random identifier generation.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{AuthError, AuthResult};

/// The opaque, stable result of successful authentication. Created at
/// registration and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    pub fn new<S: Into<String>>(identifier: S) -> Self {
        Identity(identifier.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Identity {
    fn from(s: &str) -> Self {
        Identity(s.to_string())
    }
}

/// Creates a random identifier with `bits` worth of entropy, hex encoded.
/// The resulting string is `bits / 4` characters long. Entropy exhaustion
/// leaves no safe fallback for credential material, so it surfaces as a
/// backend failure.
pub fn create_identifier(bits: usize) -> AuthResult<String> {
    debug_assert!(bits % 8 == 0, "identifier entropy must be a whole number of bytes");
    let mut buf = vec![0u8; bits / 8];
    getrandom::getrandom(&mut buf).map_err(|e| AuthError::backend(e.to_string()))?;
    Ok(hex::encode(buf))
}

/// Like [`create_identifier`], with an injected entropy source. The filler is
/// the only source of randomness used.
pub fn create_identifier_from<F>(bits: usize, fill: F) -> String
where
    F: FnOnce(&mut [u8]),
{
    debug_assert!(bits % 8 == 0, "identifier entropy must be a whole number of bytes");
    let mut buf = vec![0u8; bits / 8];
    fill(&mut buf);
    hex::encode(buf)
}
