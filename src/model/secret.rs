use std::fmt::{Debug, Formatter};

use data_encoding::HEXLOWER;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

/// Number of random bytes in a generated secret.
const SECRET_LEN: usize = 32;

/// Per-vote key material for ballot ID derivation. Held only by the index.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VoteSecret(String);

impl VoteSecret {
    /// Generate a fresh secret from a cryptographically secure RNG.
    pub fn generate(mut rng: impl RngCore + CryptoRng) -> Self {
        let mut bytes = [0u8; SECRET_LEN];
        rng.fill_bytes(&mut bytes);
        Self(HEXLOWER.encode(&bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// A secret is usable only if it is non-empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for VoteSecret {
    fn from(secret: String) -> Self {
        Self(secret)
    }
}

impl From<&str> for VoteSecret {
    fn from(secret: &str) -> Self {
        Self(secret.to_string())
    }
}

// Never print the key material.
impl Debug for VoteSecret {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("VoteSecret(<redacted>)")
    }
}
