//! Export envelope and the delivery seam for it.

use std::error::Error as StdError;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entry::TimeEntry;

/// Envelope format version written by this crate.
pub const SNAPSHOT_VERSION: u32 = 1;

/// A versioned copy of every entry, ready for external serialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportSnapshot {
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub entries: Vec<TimeEntry>,
}

impl ExportSnapshot {
    /// Builds a current-version envelope. Entries are ordered by id.
    pub fn new(created_at: DateTime<Utc>, mut entries: Vec<TimeEntry>) -> Self {
        entries.sort_by_key(|entry| entry.id);
        Self {
            version: SNAPSHOT_VERSION,
            created_at,
            entries,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Error type returned by sinks.
pub type SinkError = Box<dyn StdError + Send + Sync>;

/// Downstream destination for a snapshot (mail attachment, archive file, ...).
#[async_trait]
pub trait SnapshotSink: Send + Sync {
    async fn deliver(&self, snapshot: &ExportSnapshot) -> Result<(), SinkError>;
}
