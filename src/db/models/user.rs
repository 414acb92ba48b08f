//! User identity.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of the user whose progress is being tracked.
///
/// Every store path is scoped by this value, so two users ingesting into the
/// same database never touch each other's documents. Callers pass it
/// explicitly; there is no ambient "current user".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}
