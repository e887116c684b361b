//! Player authentication records
//!
//! ## Shapes
//!
//! Two shapes can be found in a backing store:
//!
//! - **Current**: structured fields serialized as a JSON object
//!   (`password`, `is_authenticated`, `last_ip`, `valid_until`, `last_kicked`)
//! - **Legacy**: an opaque blob written by the deprecated single-record path
//!
//! [`StoredRecord`] tells them apart and [`StoredRecord::into_current`] is the
//! one-way migration from the legacy blob to the structured record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Keys that only exist in the current record shape
const CURRENT_SHAPE_KEYS: [&str; 5] = [
    "is_authenticated",
    "last_ip",
    "valid_until",
    "last_kicked",
    "UUID",
];

/// Authentication state of one player
///
/// Timestamps are Unix epoch milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerRecord {
    /// Hashed credential (`None` for players that never registered)
    pub password: Option<String>,

    /// Whether the player currently holds an authenticated session
    pub is_authenticated: bool,

    /// Address of the last login (may be empty)
    pub last_ip: String,

    /// Session expiry
    pub valid_until: i64,

    /// Last time the player was kicked (anti-abuse marker)
    pub last_kicked: i64,
}

impl PlayerRecord {
    /// Create a record that only carries a password hash
    pub fn with_password(password: impl Into<String>) -> Self {
        Self {
            password: Some(password.into()),
            ..Default::default()
        }
    }

    pub fn is_registered(&self) -> bool {
        self.password.is_some()
    }

    /// Session expiry as a timestamp, if it is representable
    pub fn valid_until_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.valid_until)
    }

    /// Whether the session is still usable at `now`
    pub fn session_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.is_authenticated && self.valid_until >= now.timestamp_millis()
    }

    /// Serialize to the JSON stored by the relational backend
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// A record in the deprecated single-blob shape
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyRecord {
    pub uuid: String,
    pub data: String,
}

impl LegacyRecord {
    /// Best-effort password recovery from the blob
    ///
    /// A JSON object contributes its `password` key; any other non-empty
    /// blob is taken as a bare password hash.
    fn password(&self) -> Option<String> {
        match serde_json::from_str::<Value>(&self.data) {
            Ok(Value::Object(map)) => map
                .get("password")
                .and_then(Value::as_str)
                .map(str::to_string),
            Ok(Value::String(hash)) if !hash.is_empty() => Some(hash),
            Ok(_) => None,
            Err(_) => {
                let trimmed = self.data.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            }
        }
    }
}

/// A record as read back from a backing store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredRecord {
    Current(PlayerRecord),
    Legacy(LegacyRecord),
}

impl StoredRecord {
    /// Classify the serialized data stored for `uuid`
    pub fn parse(uuid: &str, data: &str) -> Self {
        if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(data)
            && CURRENT_SHAPE_KEYS.iter().any(|key| map.contains_key(*key))
        {
            if let Ok(record) = serde_json::from_value::<PlayerRecord>(Value::Object(map)) {
                return StoredRecord::Current(record);
            }
        }

        StoredRecord::Legacy(LegacyRecord {
            uuid: uuid.to_string(),
            data: data.to_string(),
        })
    }

    pub fn is_legacy(&self) -> bool {
        matches!(self, StoredRecord::Legacy(_))
    }

    /// Migrate to the current shape
    ///
    /// Legacy blobs keep at most their password; session state starts fresh.
    pub fn into_current(self) -> PlayerRecord {
        match self {
            StoredRecord::Current(record) => record,
            StoredRecord::Legacy(legacy) => PlayerRecord {
                password: legacy.password(),
                ..Default::default()
            },
        }
    }
}
