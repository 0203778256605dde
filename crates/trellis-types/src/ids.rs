//! Identity key types.

use serde::{Deserialize, Serialize};

/// The system-wide identity key: a Twitch user id.
///
/// All economy state (`bal:<id>`, `boxes:<id>`, ...) is keyed by this value
/// regardless of which platform an operation originated from. Twitch ids
/// are numeric, but Twitch delivers them as strings and the persisted
/// document stores them as strings, so this is a string newtype.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalId(pub String);

impl CanonicalId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CanonicalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CanonicalId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for CanonicalId {
    fn from(id: String) -> Self {
        Self(id)
    }
}
