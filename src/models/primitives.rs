//! Primitive types and newtypes for type-safe API interactions.
//!
//! The provider hands out several opaque string identifiers. Wrapping each
//! of them keeps a session id from ever being passed where a depot id is
//! expected.

use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Length of generated request identifiers.
pub const REQUEST_ID_LEN: usize = 25;

/// Server-issued session identifier.
///
/// # Example
///
/// ```
/// use comdirect_rs::SessionId;
///
/// let id = SessionId::new("F1E2D3C4");
/// assert_eq!(id.as_str(), "F1E2D3C4");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Create a new session id.
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Generate a client-side session id.
    ///
    /// Used for request tracing before the provider has issued one.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Get the session id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for SessionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Per-request identifier, fresh for every outgoing call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    /// Generate a random alphanumeric request id.
    pub fn generate() -> Self {
        let id = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(REQUEST_ID_LEN)
            .map(char::from)
            .collect();
        Self(id)
    }

    /// Get the request id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of an outstanding TAN challenge.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChallengeId(String);

impl ChallengeId {
    /// Create a new challenge id.
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the challenge id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if the provider sent an empty id.
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for ChallengeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A strongly-typed depot identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DepotId(String);

impl DepotId {
    /// Create a new depot id.
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the depot id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DepotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for DepotId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}
