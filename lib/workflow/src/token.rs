//! Resume tokens.
//!
//! A resume token is the opaque credential that correlates a suspended
//! approval run with its single authorized resume call. Tokens are 32 random
//! bytes; the wire form is standard base64 with padding, so tokens routinely
//! contain `+`, `/`, and `=` and must be percent-encoded when embedded in
//! callback URLs.

use base64::Engine as _;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of random bytes backing a token.
const TOKEN_BYTES: usize = 32;

/// An opaque, single-use credential for resuming a suspended approval run.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResumeToken(String);

impl ResumeToken {
    /// Generates a fresh token from 32 bytes of OS randomness.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; TOKEN_BYTES];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(STANDARD.encode(bytes))
    }

    /// Returns the wire form of the token (padded standard base64).
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the substrate key form of the token.
    ///
    /// KV keys are restricted to `[A-Za-z0-9/_=.-]`, which excludes the `+`
    /// of the wire alphabet, so the same bytes are re-encoded URL-safe
    /// without padding.
    #[must_use]
    pub fn storage_key(&self) -> String {
        let bytes = STANDARD
            .decode(&self.0)
            .expect("token holds base64 by construction");
        URL_SAFE_NO_PAD.encode(bytes)
    }
}

impl fmt::Display for ResumeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// Debug omits the value so tokens stay out of logs.
impl fmt::Debug for ResumeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResumeToken(..{} chars)", self.0.len())
    }
}

/// Error returned when parsing a token from its wire form fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseTokenError {
    /// The reason for the parse failure.
    pub reason: String,
}

impl fmt::Display for ParseTokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to parse resume token: {}", self.reason)
    }
}

impl std::error::Error for ParseTokenError {}

impl FromStr for ResumeToken {
    type Err = ParseTokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = STANDARD.decode(s).map_err(|e| ParseTokenError {
            reason: e.to_string(),
        })?;
        if bytes.len() != TOKEN_BYTES {
            return Err(ParseTokenError {
                reason: format!("expected {TOKEN_BYTES} bytes, got {}", bytes.len()),
            });
        }
        Ok(Self(s.to_string()))
    }
}
