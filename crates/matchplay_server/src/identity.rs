//! Opaque handles supplied by the transport and by the registry.

use serde::{Deserialize, Serialize};

/// Stable identity of a remote participant, as given by the transport.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    derive_more::Display,
    derive_more::From,
)]
#[serde(transparent)]
pub struct ParticipantId(String);

impl ParticipantId {
    /// The handle as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ParticipantId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<i64> for ParticipantId {
    fn from(value: i64) -> Self {
        Self(value.to_string())
    }
}

/// Join token of a human-vs-human session.
///
/// Tokens carry no structure callers may rely on beyond uniqueness among
/// the sessions active at any instant.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    derive_more::Display,
    derive_more::From,
)]
#[serde(transparent)]
pub struct SessionToken(String);

impl SessionToken {
    /// The token as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SessionToken {
    fn from(value: &str) -> Self {
        Self(value.trim().to_string())
    }
}
