//! Time entries - the only persisted record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{EntryId, ProjectName};

/// A tracked span of work on one project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeEntry {
    /// Store-assigned identifier.
    pub id: EntryId,

    /// Project the time is billed to.
    pub project: ProjectName,

    /// When the timer was started (or the shifted start after a resume).
    pub start_time: DateTime<Utc>,

    /// When the timer was stopped. `None` while the timer is running.
    pub end_time: Option<DateTime<Utc>>,

    /// Billed minutes, rounded to the billing unit. Zero while running.
    #[serde(default)]
    pub duration: u32,
}

impl TimeEntry {
    /// Returns true while the entry has no end time.
    pub const fn is_running(&self) -> bool {
        self.end_time.is_none()
    }
}

/// Insert payload for a new entry; the store assigns the id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTimeEntry {
    pub project: ProjectName,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub duration: u32,
}

impl NewTimeEntry {
    /// A running entry starting at `start_time`.
    pub const fn running(project: ProjectName, start_time: DateTime<Utc>) -> Self {
        Self {
            project,
            start_time,
            end_time: None,
            duration: 0,
        }
    }

    /// Attaches the store-assigned id.
    pub fn with_id(self, id: EntryId) -> TimeEntry {
        TimeEntry {
            id,
            project: self.project,
            start_time: self.start_time,
            end_time: self.end_time,
            duration: self.duration,
        }
    }
}

/// Partial field overwrite applied by `update`.
///
/// `None` leaves a field untouched. `end_time` is doubly optional so an
/// update can distinguish "keep" from "set to null".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryUpdate {
    pub project: Option<ProjectName>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<Option<DateTime<Utc>>>,
    pub duration: Option<u32>,
}

impl EntryUpdate {
    /// Closes an entry at `end_time` with the given billed minutes.
    pub const fn close(end_time: DateTime<Utc>, duration: u32) -> Self {
        Self {
            project: None,
            start_time: None,
            end_time: Some(Some(end_time)),
            duration: Some(duration),
        }
    }

    /// Re-opens an entry with a new start time.
    pub const fn reopen(start_time: DateTime<Utc>) -> Self {
        Self {
            project: None,
            start_time: Some(start_time),
            end_time: Some(None),
            duration: None,
        }
    }

    #[must_use]
    pub fn with_project(mut self, project: ProjectName) -> Self {
        self.project = Some(project);
        self
    }

    #[must_use]
    pub fn with_start_time(mut self, start_time: DateTime<Utc>) -> Self {
        self.start_time = Some(start_time);
        self
    }

    #[must_use]
    pub fn with_end_time(mut self, end_time: Option<DateTime<Utc>>) -> Self {
        self.end_time = Some(end_time);
        self
    }

    #[must_use]
    pub fn with_duration(mut self, duration: u32) -> Self {
        self.duration = Some(duration);
        self
    }

    /// Shallow-merges the set fields over `entry`.
    pub fn apply_to(&self, entry: &mut TimeEntry) {
        if let Some(project) = &self.project {
            entry.project.clone_from(project);
        }
        if let Some(start_time) = self.start_time {
            entry.start_time = start_time;
        }
        if let Some(end_time) = self.end_time {
            entry.end_time = end_time;
        }
        if let Some(duration) = self.duration {
            entry.duration = duration;
        }
    }
}

/// Sorts entries newest-first by start time, breaking ties by id.
pub fn sort_by_recency(entries: &mut [TimeEntry]) {
    entries.sort_by(|a, b| {
        b.start_time
            .cmp(&a.start_time)
            .then_with(|| b.id.cmp(&a.id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn entry(id: i64, start: &str) -> TimeEntry {
        TimeEntry {
            id: EntryId::new(id),
            project: ProjectName::new("Alpha").unwrap(),
            start_time: ts(start),
            end_time: None,
            duration: 0,
        }
    }

    #[test]
    fn entry_serializes_with_camel_case_and_null_end() {
        let entry = entry(3, "2025-01-01T09:00:00Z");
        let json = serde_json::to_value(&entry).unwrap();

        assert_eq!(json["id"], 3);
        assert_eq!(json["project"], "Alpha");
        assert_eq!(json["startTime"], "2025-01-01T09:00:00Z");
        assert!(json["endTime"].is_null());
        assert_eq!(json["duration"], 0);
    }

    #[test]
    fn entry_rejects_empty_project() {
        let json = r#"{
            "id": 1,
            "project": "",
            "startTime": "2025-01-01T09:00:00Z",
            "endTime": null,
            "duration": 0
        }"#;
        let result: Result<TimeEntry, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }

    #[test]
    fn close_update_sets_end_and_duration_only() {
        let mut entry = entry(1, "2025-01-01T09:00:00Z");
        let end = ts("2025-01-01T09:07:00Z");

        EntryUpdate::close(end, 15).apply_to(&mut entry);

        assert_eq!(entry.end_time, Some(end));
        assert_eq!(entry.duration, 15);
        assert_eq!(entry.start_time, ts("2025-01-01T09:00:00Z"));
        assert_eq!(entry.project.as_str(), "Alpha");
    }

    #[test]
    fn reopen_update_clears_end_and_keeps_duration() {
        let mut entry = entry(1, "2025-01-01T09:00:00Z");
        entry.end_time = Some(ts("2025-01-01T09:30:00Z"));
        entry.duration = 30;
        let start = ts("2025-01-01T11:30:00Z");

        EntryUpdate::reopen(start).apply_to(&mut entry);

        assert!(entry.is_running());
        assert_eq!(entry.start_time, start);
        assert_eq!(entry.duration, 30);
    }

    #[test]
    fn empty_update_changes_nothing() {
        let original = entry(1, "2025-01-01T09:00:00Z");
        let mut merged = original.clone();
        let update = EntryUpdate::default();

        update.apply_to(&mut merged);
        assert_eq!(merged, original);
    }

    #[test]
    fn sort_by_recency_orders_newest_first() {
        let mut entries = vec![
            entry(1, "2025-01-01T09:00:00Z"),
            entry(2, "2025-01-03T09:00:00Z"),
            entry(3, "2025-01-02T09:00:00Z"),
        ];
        sort_by_recency(&mut entries);
        let ids: Vec<i64> = entries.iter().map(|e| e.id.get()).collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }
}
