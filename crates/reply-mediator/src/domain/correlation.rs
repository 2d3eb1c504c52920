//! Correlation token for request/reply matching.
//!
//! Uses UUID v4: 128 random bits, collision probability among concurrently
//! pending entries is negligible.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Token tying a reply back to the call that is waiting for it.
///
/// Minted per outstanding call, carried on the wire as the stringified
/// value of the correlation header, and used as the key into the pending
/// table on the receiving side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationToken(Uuid);

impl CorrelationToken {
    /// Mint a fresh random token (UUID v4).
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Parse from the wire representation.
    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Uuid::parse_str(s).map(Self)
    }

    /// Get the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for CorrelationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CorrelationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for CorrelationToken {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<CorrelationToken> for Uuid {
    fn from(token: CorrelationToken) -> Self {
        token.0
    }
}

impl AsRef<Uuid> for CorrelationToken {
    fn as_ref(&self) -> &Uuid {
        &self.0
    }
}
