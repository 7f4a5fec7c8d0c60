//! Trigger keys: deduplication keys for periodic registrations.
//!
//! A key is either supplied by the caller or derived from the callback type,
//! the source location that registered it, and the recurrence. Registering
//! twice from the same call site yields the same key, while two call sites
//! with identical closures never collide.

use std::fmt;
use std::panic::Location;

use sha2::{Digest, Sha256};

use crate::recurrence::Recurrence;

/// Deduplication key of a periodic trigger.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TriggerKey(String);

impl TriggerKey {
    /// Derive a key from the registration's identity.
    #[must_use]
    pub fn derive(callback_type: &str, call_site: &Location<'_>, recurrence: &Recurrence) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(callback_type.as_bytes());
        hasher.update(b"\0");
        hasher.update(call_site.file().as_bytes());
        hasher.update(call_site.line().to_le_bytes());
        hasher.update(call_site.column().to_le_bytes());
        hasher.update(b"\0");
        hasher.update(recurrence.to_string().as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TriggerKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for TriggerKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for TriggerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
