//! Map-backed store for tests and embedding.
//!
//! Behaves like the durable store (monotonic ids that survive `clear`,
//! idempotent delete, merge-on-update) and adds failure injection so callers
//! can exercise error paths.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::entry::{EntryUpdate, NewTimeEntry, TimeEntry};
use crate::store::{ActivityLog, EntryStore, StoreError};
use crate::types::{EntryId, ProjectName};

#[derive(Debug, Default)]
struct MemoryState {
    last_id: i64,
    entries: BTreeMap<EntryId, TimeEntry>,
    last_active: Option<DateTime<Utc>>,
    unavailable: bool,
    failing_updates: HashSet<EntryId>,
}

/// In-memory [`EntryStore`] and [`ActivityLog`].
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: Mutex<MemoryState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent operation fail with [`StoreError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.lock().unavailable = unavailable;
    }

    /// Makes updates to `id` fail with [`StoreError::Operation`].
    pub fn fail_updates_for(&self, id: EntryId) {
        self.lock().failing_updates.insert(id);
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn available(&self) -> Result<MutexGuard<'_, MemoryState>, StoreError> {
        let state = self.lock();
        if state.unavailable {
            return Err(StoreError::Unavailable("in-memory store offline".to_string()));
        }
        Ok(state)
    }
}

#[async_trait]
impl EntryStore for InMemoryStore {
    async fn initialize(&self) -> Result<(), StoreError> {
        self.available().map(drop)
    }

    async fn create(&self, entry: NewTimeEntry) -> Result<EntryId, StoreError> {
        let mut state = self.available()?;
        state.last_id += 1;
        let id = EntryId::new(state.last_id);
        state.entries.insert(id, entry.with_id(id));
        Ok(id)
    }

    async fn get(&self, id: EntryId) -> Result<Option<TimeEntry>, StoreError> {
        let state = self.available()?;
        Ok(state.entries.get(&id).cloned())
    }

    async fn update(&self, id: EntryId, update: &EntryUpdate) -> Result<TimeEntry, StoreError> {
        let mut state = self.available()?;
        if state.failing_updates.contains(&id) {
            return Err(StoreError::Operation(format!("injected failure updating {id}")));
        }
        let entry = state.entries.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        update.apply_to(entry);
        Ok(entry.clone())
    }

    async fn get_all(&self) -> Result<Vec<TimeEntry>, StoreError> {
        let state = self.available()?;
        Ok(state.entries.values().cloned().collect())
    }

    async fn get_by_project(&self, project: &ProjectName) -> Result<Vec<TimeEntry>, StoreError> {
        let state = self.available()?;
        Ok(state
            .entries
            .values()
            .filter(|entry| &entry.project == project)
            .cloned()
            .collect())
    }

    async fn delete(&self, id: EntryId) -> Result<(), StoreError> {
        let mut state = self.available()?;
        state.entries.remove(&id);
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        let mut state = self.available()?;
        state.entries.clear();
        Ok(())
    }
}

#[async_trait]
impl ActivityLog for InMemoryStore {
    async fn last_active(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        Ok(self.available()?.last_active)
    }

    async fn record_last_active(&self, at: DateTime<Utc>) -> Result<(), StoreError> {
        self.available()?.last_active = Some(at);
        Ok(())
    }
}
