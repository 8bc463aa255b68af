//! Core domain logic for the time tracker.
//!
//! This crate contains the fundamental types and logic for:
//! - Time entries and the partial updates applied to them
//! - The 15-minute billing rounding policy
//! - Storage seams and an in-memory store
//! - Orphaned timer recovery after an ungraceful shutdown
//! - The timer session manager that owns the single running timer

pub mod clock;
pub mod entry;
pub mod export;
pub mod memory;
pub mod reconcile;
pub mod rounding;
pub mod session;
pub mod store;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use entry::{EntryUpdate, NewTimeEntry, TimeEntry, sort_by_recency};
pub use export::{ExportSnapshot, SNAPSHOT_VERSION, SinkError, SnapshotSink};
pub use memory::InMemoryStore;
pub use reconcile::{ClosedOrphan, FailedOrphan, ReconcileReport, reconcile_orphans};
pub use rounding::{ROUNDING_UNIT_MINUTES, billable_minutes, round_up_to_unit};
pub use session::{SessionManager, TrackerError};
pub use store::{ActivityLog, EntryStore, StoreError};
pub use types::{EntryId, ProjectName, ValidationError};
