//! Storage seams used by the session manager.
//!
//! [`EntryStore`] is the record store adapter: a transactional collection of
//! [`TimeEntry`] records keyed by a store-issued id and indexed by project,
//! start time and end time. [`ActivityLog`] holds the single "last active"
//! marker used to close entries left open by an ungraceful shutdown.
//!
//! All operations are asynchronous and report failures as [`StoreError`].

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::entry::{EntryUpdate, NewTimeEntry, TimeEntry};
use crate::export::ExportSnapshot;
use crate::types::{EntryId, ProjectName};

/// Storage errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store could not be opened or is no longer reachable.
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    /// The entry targeted by an update does not exist.
    #[error("time entry {0} not found")]
    NotFound(EntryId),
    /// Any other failed read or write.
    #[error("storage operation failed: {0}")]
    Operation(String),
}

/// Record store adapter for time entries.
#[async_trait]
pub trait EntryStore: Send + Sync {
    /// Opens the store, creating it on first use. Idempotent.
    async fn initialize(&self) -> Result<(), StoreError>;

    /// Inserts a new entry and returns the id the store assigned.
    async fn create(&self, entry: NewTimeEntry) -> Result<EntryId, StoreError>;

    /// Fetches a single entry.
    async fn get(&self, id: EntryId) -> Result<Option<TimeEntry>, StoreError>;

    /// Atomically fetches, shallow-merges `update` over, and writes back the
    /// entry. Returns the merged record.
    async fn update(&self, id: EntryId, update: &EntryUpdate) -> Result<TimeEntry, StoreError>;

    /// Every entry, in no particular order.
    async fn get_all(&self) -> Result<Vec<TimeEntry>, StoreError>;

    /// Entries whose project matches exactly.
    async fn get_by_project(&self, project: &ProjectName) -> Result<Vec<TimeEntry>, StoreError>;

    /// Entries with no end time.
    async fn get_open(&self) -> Result<Vec<TimeEntry>, StoreError> {
        let mut entries = self.get_all().await?;
        entries.retain(TimeEntry::is_running);
        Ok(entries)
    }

    /// Removes an entry. Removing a missing entry succeeds.
    async fn delete(&self, id: EntryId) -> Result<(), StoreError>;

    /// Removes every entry.
    async fn clear(&self) -> Result<(), StoreError>;

    /// Wraps every entry in a versioned export envelope.
    async fn export_snapshot(
        &self,
        created_at: DateTime<Utc>,
    ) -> Result<ExportSnapshot, StoreError> {
        let entries = self.get_all().await?;
        Ok(ExportSnapshot::new(created_at, entries))
    }
}

/// Persisted "last active" marker.
#[async_trait]
pub trait ActivityLog: Send + Sync {
    async fn last_active(&self) -> Result<Option<DateTime<Utc>>, StoreError>;

    async fn record_last_active(&self, at: DateTime<Utc>) -> Result<(), StoreError>;
}

#[async_trait]
impl<T: EntryStore + ?Sized> EntryStore for Arc<T> {
    async fn initialize(&self) -> Result<(), StoreError> {
        (**self).initialize().await
    }

    async fn create(&self, entry: NewTimeEntry) -> Result<EntryId, StoreError> {
        (**self).create(entry).await
    }

    async fn get(&self, id: EntryId) -> Result<Option<TimeEntry>, StoreError> {
        (**self).get(id).await
    }

    async fn update(&self, id: EntryId, update: &EntryUpdate) -> Result<TimeEntry, StoreError> {
        (**self).update(id, update).await
    }

    async fn get_all(&self) -> Result<Vec<TimeEntry>, StoreError> {
        (**self).get_all().await
    }

    async fn get_by_project(&self, project: &ProjectName) -> Result<Vec<TimeEntry>, StoreError> {
        (**self).get_by_project(project).await
    }

    async fn get_open(&self) -> Result<Vec<TimeEntry>, StoreError> {
        (**self).get_open().await
    }

    async fn delete(&self, id: EntryId) -> Result<(), StoreError> {
        (**self).delete(id).await
    }

    async fn clear(&self) -> Result<(), StoreError> {
        (**self).clear().await
    }

    async fn export_snapshot(
        &self,
        created_at: DateTime<Utc>,
    ) -> Result<ExportSnapshot, StoreError> {
        (**self).export_snapshot(created_at).await
    }
}

#[async_trait]
impl<T: ActivityLog + ?Sized> ActivityLog for Arc<T> {
    async fn last_active(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        (**self).last_active().await
    }

    async fn record_last_active(&self, at: DateTime<Utc>) -> Result<(), StoreError> {
        (**self).record_last_active(at).await
    }
}
