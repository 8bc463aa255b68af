//! Orphaned timer recovery.
//!
//! An entry is orphaned when the session that started it ended without
//! stopping it. On startup every orphan is closed at the persisted
//! "last active" instant, or at `now` when no marker was ever written.

use chrono::{DateTime, Utc};

use crate::entry::EntryUpdate;
use crate::rounding::round_up_to_unit;
use crate::store::{ActivityLog, EntryStore, StoreError};
use crate::types::EntryId;

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// The instant orphans were closed at. `None` when there were no orphans.
    pub resolved_end: Option<DateTime<Utc>>,
    pub closed: Vec<ClosedOrphan>,
    pub failed: Vec<FailedOrphan>,
}

impl ReconcileReport {
    pub fn is_empty(&self) -> bool {
        self.closed.is_empty() && self.failed.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosedOrphan {
    pub id: EntryId,
    pub duration: u32,
    /// The start time was after the resolved end, so one unit was billed.
    pub clamped: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedOrphan {
    pub id: EntryId,
    pub error: StoreError,
}

/// Closes every entry that has no end time.
///
/// A failure on one entry is recorded in the report and does not stop the
/// others. Only failing to list the open entries aborts the pass.
pub async fn reconcile_orphans<S>(store: &S, now: DateTime<Utc>) -> Result<ReconcileReport, StoreError>
where
    S: EntryStore + ActivityLog + ?Sized,
{
    let orphans = store.get_open().await?;
    if orphans.is_empty() {
        return Ok(ReconcileReport::default());
    }

    let end_time = match store.last_active().await {
        Ok(Some(last_active)) => last_active,
        Ok(None) => now,
        Err(err) => {
            tracing::warn!(error = %err, "failed to read last-active marker; closing orphans at now");
            now
        }
    };

    let mut report = ReconcileReport {
        resolved_end: Some(end_time),
        ..ReconcileReport::default()
    };

    for orphan in orphans {
        let elapsed = end_time.signed_duration_since(orphan.start_time);
        let clamped = elapsed < chrono::TimeDelta::zero();
        let duration = round_up_to_unit(elapsed);

        match store
            .update(orphan.id, &EntryUpdate::close(end_time, duration))
            .await
        {
            Ok(_) => {
                tracing::info!(
                    id = %orphan.id,
                    project = %orphan.project,
                    duration,
                    clamped,
                    "closed orphaned timer"
                );
                report.closed.push(ClosedOrphan {
                    id: orphan.id,
                    duration,
                    clamped,
                });
            }
            Err(error) => {
                tracing::warn!(id = %orphan.id, %error, "failed to close orphaned timer");
                report.failed.push(FailedOrphan {
                    id: orphan.id,
                    error,
                });
            }
        }
    }

    Ok(report)
}
