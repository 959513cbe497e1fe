use std::collections::HashSet;

use serde::Serialize;

/// Keys accepted when `VALID_API_KEYS` is not set.
pub const DEFAULT_API_KEYS: &str = "test-key-123,dev-key-456,prod-key-789";

/// Creation time reported for every key by `/keys/{key_id}/info`.
pub const KEY_CREATED_AT: &str = "2024-01-01T00:00:00Z";

/// How long a rotated-out key keeps working, in seconds.
pub const ROTATION_GRACE_SECS: u64 = 3600;

/// Tier of an API key, derived purely from its spelling.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyTier {
    Test,
    Development,
    Production,
}

impl KeyTier {
    pub fn classify(key: &str) -> Self {
        if key.contains("test") {
            KeyTier::Test
        } else if key.contains("dev") {
            KeyTier::Development
        } else {
            KeyTier::Production
        }
    }

    /// Requests allowed per one-minute window.
    pub fn quota_per_minute(self) -> u32 {
        match self {
            KeyTier::Test => 100,
            KeyTier::Development => 500,
            KeyTier::Production => 1000,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Permissions {
    pub read: bool,
    pub write: bool,
    pub delete: bool,
}

impl Permissions {
    // `delete` keys off the literal "prod", not the tier: "my-key" is production-tier but can't delete.
    pub fn for_key(key: &str) -> Self {
        Self {
            read: true,
            write: true,
            delete: key.contains("prod"),
        }
    }
}

/// The static set of keys the gate accepts.
#[derive(Debug, Default)]
pub struct ApiKeyAllowList {
    keys: HashSet<String>,
    // Entries as configured, duplicates included. Reported by `/health`.
    configured: usize,
}

impl ApiKeyAllowList {
    pub fn new(keys: impl IntoIterator<Item = String>) -> Self {
        let mut configured = 0;
        let keys = keys
            .into_iter()
            .inspect(|_| configured += 1)
            .collect();
        Self { keys, configured }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    /// Number of configured entries, counting a repeated key once per occurrence.
    pub fn len(&self) -> usize {
        self.configured
    }

    pub fn is_empty(&self) -> bool {
        self.configured == 0
    }
}
