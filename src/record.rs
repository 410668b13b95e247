use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The universal record carried at every layer of the tree: memtable,
/// WAL, and SSTable all store `Entry` values, in-memory or serialized.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Entry {
    pub key: String,
    /// Arbitrary JSON-shaped payload. Meaningless when `deleted` is true.
    pub value: serde_json::Value,
    pub timestamp: DateTime<Utc>,
    /// WAL sequence number that produced this entry. Strictly monotone,
    /// used as the merge tiebreaker when two entries share `timestamp`
    /// (see the Design Notes' timestamp-collision recommendation).
    pub seq: u64,
    pub deleted: bool,
}

impl Entry {
    pub fn put(key: String, value: serde_json::Value, timestamp: DateTime<Utc>, seq: u64) -> Self {
        Self {
            key,
            value,
            timestamp,
            seq,
            deleted: false,
        }
    }

    pub fn tombstone(key: String, timestamp: DateTime<Utc>, seq: u64) -> Self {
        Self {
            key,
            value: serde_json::Value::Null,
            timestamp,
            seq,
            deleted: true,
        }
    }

    /// Ordering key for merge: `(key asc, timestamp asc, seq asc)`. The
    /// survivor of a duplicate-key group is the one sorting last.
    pub fn merge_key(&self) -> (&str, DateTime<Utc>, u64) {
        (&self.key, self.timestamp, self.seq)
    }
}

/// The operation a WAL line records.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum WalOperation {
    Put,
    Delete,
}

/// Superset of `Entry`: adds the operation discriminant and sequence
/// number that make up one line of the write-ahead log.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WalEntry {
    pub operation: WalOperation,
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
    pub timestamp: DateTime<Utc>,
    pub sequence_number: u64,
}
