//! Timer session manager.
//!
//! Owns the "at most one running timer" invariant. Every lifecycle transition
//! is written through the [`EntryStore`] first; the held state
//! (`current_timer`, the sorted `entries` view) only changes after the store
//! call succeeded, so a failed operation leaves the manager as it was and the
//! caller can retry.
//!
//! Each manager instance holds its own state. Two managers over the same store
//! do not share a running timer.

use std::sync::Arc;

use thiserror::Error;

use crate::clock::{Clock, SystemClock};
use crate::entry::{EntryUpdate, NewTimeEntry, TimeEntry, sort_by_recency};
use crate::export::{ExportSnapshot, SnapshotSink};
use crate::reconcile::{ReconcileReport, reconcile_orphans};
use crate::rounding::{ROUNDING_UNIT_MINUTES, billable_minutes};
use crate::store::{ActivityLog, EntryStore, StoreError};
use crate::types::{EntryId, ProjectName, ValidationError};

/// Errors surfaced by the session manager.
#[derive(Debug, Error)]
pub enum TrackerError {
    /// A store operation failed.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Caller-supplied input was rejected before touching the store.
    #[error("invalid input: {0}")]
    InvalidInput(#[from] ValidationError),
    /// The snapshot was built but could not be delivered.
    #[error("export failed: {0}")]
    ExportFailed(String),
    /// `initialize` has not completed yet.
    #[error("time tracker is not initialized")]
    NotReady,
}

/// Drives timer lifecycle transitions against a store.
pub struct SessionManager<S> {
    store: S,
    clock: Arc<dyn Clock>,
    current_timer: Option<TimeEntry>,
    entries: Vec<TimeEntry>,
    is_ready: bool,
}

impl<S> std::fmt::Debug for SessionManager<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("current_timer", &self.current_timer)
            .field("entries", &self.entries.len())
            .field("is_ready", &self.is_ready)
            .finish_non_exhaustive()
    }
}

impl<S> SessionManager<S>
where
    S: EntryStore + ActivityLog,
{
    /// Creates a manager using wall-clock time.
    pub fn new(store: S) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    pub fn with_clock(store: S, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            current_timer: None,
            entries: Vec::new(),
            is_ready: false,
        }
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    /// The running timer, if any.
    pub const fn current_timer(&self) -> Option<&TimeEntry> {
        self.current_timer.as_ref()
    }

    /// The last refreshed view, newest start time first.
    pub fn entries(&self) -> &[TimeEntry] {
        &self.entries
    }

    /// True once `initialize` has reconciled orphans.
    pub const fn is_ready(&self) -> bool {
        self.is_ready
    }

    /// Opens the store, closes orphaned timers, loads the view and marks the
    /// session active.
    ///
    /// Calling this again on a ready manager only refreshes the view.
    pub async fn initialize(&mut self) -> Result<ReconcileReport, TrackerError> {
        if self.is_ready {
            self.refresh_entries().await?;
            return Ok(ReconcileReport::default());
        }

        self.store.initialize().await?;
        let report = reconcile_orphans(&self.store, self.clock.now()).await?;
        if !report.is_empty() {
            tracing::info!(
                closed = report.closed.len(),
                failed = report.failed.len(),
                "reconciled orphaned timers"
            );
        }

        self.is_ready = true;
        self.refresh_entries().await?;
        self.record_last_active().await;
        Ok(report)
    }

    /// Starts a new timer on `project`, stopping any running one first.
    pub async fn start_timer(&mut self, project: &str) -> Result<TimeEntry, TrackerError> {
        let project = ProjectName::new(project)?;
        self.ensure_ready()?;

        if self.current_timer.is_some() {
            self.stop_timer().await?;
        }

        let new_entry = NewTimeEntry::running(project, self.clock.now());
        let id = self.store.create(new_entry.clone()).await?;
        let entry = new_entry.with_id(id);
        tracing::info!(id = %entry.id, project = %entry.project, "started timer");

        self.current_timer = Some(entry.clone());
        self.refresh_entries().await?;
        Ok(entry)
    }

    /// Stops the running timer. Returns the closed entry, or `None` when
    /// nothing was running.
    pub async fn stop_timer(&mut self) -> Result<Option<TimeEntry>, TrackerError> {
        self.ensure_ready()?;
        let Some(current) = self.current_timer.as_ref() else {
            return Ok(None);
        };

        let end_time = self.clock.now();
        // A resumed timer still carries its prior minutes and bills at least
        // one new unit on top of them.
        let duration = billable_minutes(current.start_time, end_time)
            .max(current.duration.saturating_add(ROUNDING_UNIT_MINUTES));
        let closed = self
            .store
            .update(current.id, &EntryUpdate::close(end_time, duration))
            .await?;
        tracing::info!(id = %closed.id, project = %closed.project, duration, "stopped timer");

        self.current_timer = None;
        self.refresh_entries().await?;
        Ok(Some(closed))
    }

    /// Re-opens an entry so new time accrues on top of its billed minutes.
    ///
    /// The start time is shifted back by the entry's current duration. Any
    /// other running timer is stopped first, but only once the target is
    /// known to exist; resuming the running entry is a no-op.
    pub async fn resume_entry(&mut self, id: EntryId) -> Result<TimeEntry, TrackerError> {
        self.ensure_ready()?;
        if let Some(current) = self.current_timer.as_ref().filter(|current| current.id == id) {
            return Ok(current.clone());
        }

        let entry = self.store.get(id).await?.ok_or(StoreError::NotFound(id))?;
        if self.current_timer.is_some() {
            self.stop_timer().await?;
        }
        let start_time = self.clock.now() - chrono::TimeDelta::minutes(i64::from(entry.duration));
        let resumed = self
            .store
            .update(id, &EntryUpdate::reopen(start_time))
            .await?;
        tracing::info!(
            id = %resumed.id,
            project = %resumed.project,
            prior_minutes = resumed.duration,
            "resumed timer"
        );

        self.current_timer = Some(resumed.clone());
        self.refresh_entries().await?;
        Ok(resumed)
    }

    /// Writes arbitrary field updates through to the store.
    ///
    /// Durations are written as given; rounding manual edits is the caller's
    /// job.
    pub async fn edit_entry(
        &mut self,
        id: EntryId,
        update: EntryUpdate,
    ) -> Result<TimeEntry, TrackerError> {
        self.ensure_ready()?;
        let edited = self.store.update(id, &update).await?;
        tracing::debug!(id = %edited.id, "edited entry");

        if self.current_timer.as_ref().is_some_and(|current| current.id == id) {
            self.current_timer = edited.is_running().then(|| edited.clone());
        }
        self.refresh_entries().await?;
        Ok(edited)
    }

    /// Removes an entry. Deleting the running entry drops the timer without
    /// closing it.
    pub async fn delete_entry(&mut self, id: EntryId) -> Result<(), TrackerError> {
        self.ensure_ready()?;
        self.store.delete(id).await?;
        tracing::info!(%id, "deleted entry");

        if self.current_timer.as_ref().is_some_and(|current| current.id == id) {
            self.current_timer = None;
        }
        self.refresh_entries().await?;
        Ok(())
    }

    /// Re-reads every entry and publishes them newest first.
    pub async fn refresh_entries(&mut self) -> Result<&[TimeEntry], TrackerError> {
        let mut entries = self.store.get_all().await?;
        sort_by_recency(&mut entries);
        tracing::debug!(count = entries.len(), "refreshed entries");
        self.entries = entries;
        Ok(&self.entries)
    }

    /// Sum of billed minutes for `project`. Zero for unknown or empty names.
    pub async fn project_total(&self, project: &str) -> Result<u64, TrackerError> {
        let Ok(project) = ProjectName::new(project) else {
            return Ok(0);
        };
        let entries = self.store.get_by_project(&project).await?;
        Ok(entries.iter().map(|entry| u64::from(entry.duration)).sum())
    }

    /// Versioned envelope of every entry.
    pub async fn export_snapshot(&self) -> Result<ExportSnapshot, TrackerError> {
        Ok(self.store.export_snapshot(self.clock.now()).await?)
    }

    /// Delivers a snapshot to `sink` and clears the store once it succeeded.
    ///
    /// An empty store is refused. A failed delivery leaves every entry in
    /// place.
    pub async fn export_and_clear(
        &mut self,
        sink: &dyn SnapshotSink,
    ) -> Result<ExportSnapshot, TrackerError> {
        self.ensure_ready()?;
        let snapshot = self.export_snapshot().await?;
        if snapshot.is_empty() {
            return Err(TrackerError::ExportFailed("no time entries found".to_string()));
        }

        sink.deliver(&snapshot)
            .await
            .map_err(|err| TrackerError::ExportFailed(err.to_string()))?;
        tracing::info!(entries = snapshot.entries.len(), "delivered export");

        self.clear().await?;
        Ok(snapshot)
    }

    /// Removes every entry, including a running one.
    pub async fn clear(&mut self) -> Result<(), TrackerError> {
        self.ensure_ready()?;
        self.store.clear().await?;
        tracing::info!("cleared all entries");

        self.current_timer = None;
        self.refresh_entries().await?;
        Ok(())
    }

    /// Persists "now" as the last moment the session was known alive.
    ///
    /// Best-effort: a failed write is logged and otherwise ignored.
    pub async fn record_last_active(&self) {
        let now = self.clock.now();
        if let Err(err) = self.store.record_last_active(now).await {
            tracing::warn!(error = %err, "failed to record last-active time");
        }
    }

    const fn ensure_ready(&self) -> Result<(), TrackerError> {
        if self.is_ready {
            Ok(())
        } else {
            Err(TrackerError::NotReady)
        }
    }
}
