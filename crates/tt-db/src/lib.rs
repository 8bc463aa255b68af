//! Storage layer for the time tracker.
//!
//! Provides durable persistence for time entries and the session's
//! last-active marker using `rusqlite`.
//!
//! # Thread Safety
//!
//! The [`Database`] type keeps its `rusqlite::Connection` behind a `Mutex`, so a
//! single instance can be shared between tasks. Each operation holds the lock
//! for its whole duration; `update` additionally runs inside one SQLite
//! transaction so the fetch-merge-write sequence is atomic.
//!
//! The [`EntryStore`] and [`ActivityLog`] impls call rusqlite synchronously
//! inside their `async fn` bodies, blocking the calling runtime thread for the
//! duration of each query. That suits the CLI, where one task owns the store;
//! a server sharing the store across tasks should move these calls onto
//! `tokio::task::spawn_blocking`.
//!
//! # Opening
//!
//! The connection is opened lazily on first use and the schema is created if
//! missing. [`EntryStore::initialize`] forces the open; calling it on an open
//! database does nothing.
//!
//! # Schema
//!
//! ## Timestamp Format
//!
//! Timestamps are stored as TEXT in ISO 8601 format (e.g., `2024-01-15T10:30:00.000Z`).
//! This format ensures:
//! - Lexicographic ordering matches chronological ordering
//! - Human-readable values in the database
//! - Timezone-aware (always UTC)
//!
//! ## Identifiers
//!
//! `time_entries.id` is `AUTOINCREMENT`, so ids are issued monotonically and
//! are never reused, even after [`EntryStore::clear`].

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use thiserror::Error;

use tt_core::{
    ActivityLog, EntryId, EntryStore, EntryUpdate, NewTimeEntry, ProjectName, StoreError,
    TimeEntry,
};

const LAST_ACTIVE_KEY: &str = "last_active";

const SELECT_ENTRIES: &str = "SELECT id, project, start_time, end_time, duration FROM time_entries";

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// The database file could not be opened.
    #[error("failed to open database at {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: rusqlite::Error,
    },
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// The entry targeted by an update does not exist.
    #[error("time entry {0} not found")]
    NotFound(EntryId),
    /// Failed to parse a stored timestamp.
    #[error("invalid timestamp for entry {entry_id}: {timestamp}")]
    TimestampParse {
        entry_id: i64,
        timestamp: String,
        #[source]
        source: chrono::ParseError,
    },
    /// Failed to parse a stored session marker.
    #[error("invalid {key} marker: {value}")]
    MarkerParse {
        key: &'static str,
        value: String,
        #[source]
        source: chrono::ParseError,
    },
    /// A stored column holds a value the domain types reject.
    #[error("invalid entry data for {entry_id}: {message}")]
    InvalidEntryData { entry_id: i64, message: String },
    /// A previous holder of the connection lock panicked.
    #[error("database connection lock poisoned")]
    Poisoned,
}

impl From<DbError> for StoreError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound(id) => Self::NotFound(id),
            DbError::Open { .. } | DbError::Poisoned => Self::Unavailable(err.to_string()),
            other => Self::Operation(other.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
enum Location {
    File(PathBuf),
    Memory,
}

/// Database connection wrapper.
///
/// See the [module documentation](self) for thread safety considerations.
#[derive(Debug)]
pub struct Database {
    location: Location,
    conn: Mutex<Option<Connection>>,
}

/// A `time_entries` row before domain validation.
#[derive(Debug)]
struct EntryRow {
    id: i64,
    project: String,
    start_time: String,
    end_time: Option<String>,
    duration: i64,
}

impl EntryRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            project: row.get(1)?,
            start_time: row.get(2)?,
            end_time: row.get(3)?,
            duration: row.get(4)?,
        })
    }

    fn into_entry(self) -> Result<TimeEntry, DbError> {
        let project = ProjectName::new(self.project).map_err(|err| DbError::InvalidEntryData {
            entry_id: self.id,
            message: err.to_string(),
        })?;
        let duration = u32::try_from(self.duration).map_err(|_| DbError::InvalidEntryData {
            entry_id: self.id,
            message: format!("duration out of range: {}", self.duration),
        })?;
        let start_time = parse_timestamp(&self.start_time, self.id)?;
        let end_time = self
            .end_time
            .as_deref()
            .map(|end| parse_timestamp(end, self.id))
            .transpose()?;
        Ok(TimeEntry {
            id: EntryId::new(self.id),
            project,
            start_time,
            end_time,
            duration,
        })
    }
}

impl Database {
    /// Creates a handle for the database at `path` without opening it.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            location: Location::File(path.into()),
            conn: Mutex::new(None),
        }
    }

    /// Creates a handle for a private in-memory database without opening it.
    pub fn in_memory() -> Self {
        Self {
            location: Location::Memory,
            conn: Mutex::new(None),
        }
    }

    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The database schema is automatically initialized on first open.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let db = Self::new(path);
        db.with_conn(|_| Ok(()))?;
        Ok(db)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the handle is dropped.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let db = Self::in_memory();
        db.with_conn(|_| Ok(()))?;
        Ok(db)
    }

    /// Path of the backing file, or `None` for an in-memory database.
    pub fn path(&self) -> Option<&Path> {
        match &self.location {
            Location::File(path) => Some(path),
            Location::Memory => None,
        }
    }

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&mut Connection) -> Result<T, DbError>,
    ) -> Result<T, DbError> {
        let mut guard = self.conn.lock().map_err(|_| DbError::Poisoned)?;
        let conn = match &mut *guard {
            Some(conn) => conn,
            slot @ None => slot.insert(self.connect()?),
        };
        f(conn)
    }

    fn connect(&self) -> Result<Connection, DbError> {
        let conn = match &self.location {
            Location::File(path) => Connection::open(path).map_err(|source| DbError::Open {
                path: path.display().to_string(),
                source,
            })?,
            Location::Memory => {
                Connection::open_in_memory().map_err(|source| DbError::Open {
                    path: ":memory:".to_string(),
                    source,
                })?
            }
        };
        init(&conn)?;
        tracing::debug!(location = ?self.location, "opened database");
        Ok(conn)
    }

    /// Inserts a new entry and returns its assigned id.
    pub fn insert_entry(&self, entry: &NewTimeEntry) -> Result<EntryId, DbError> {
        self.with_conn(|conn| {
            conn.execute(
                "
                INSERT INTO time_entries (project, start_time, end_time, duration)
                VALUES (?, ?, ?, ?)
                ",
                params![
                    entry.project.as_str(),
                    format_timestamp(entry.start_time),
                    entry.end_time.map(format_timestamp),
                    entry.duration,
                ],
            )?;
            Ok(EntryId::new(conn.last_insert_rowid()))
        })
    }

    /// Fetches one entry by id.
    pub fn get_entry(&self, id: EntryId) -> Result<Option<TimeEntry>, DbError> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("{SELECT_ENTRIES} WHERE id = ?"),
                [id.get()],
                EntryRow::from_row,
            )
            .optional()?
            .map(EntryRow::into_entry)
            .transpose()
        })
    }

    /// Merges `update` over the stored entry inside one transaction.
    pub fn update_entry(&self, id: EntryId, update: &EntryUpdate) -> Result<TimeEntry, DbError> {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            let mut entry = tx
                .query_row(
                    &format!("{SELECT_ENTRIES} WHERE id = ?"),
                    [id.get()],
                    EntryRow::from_row,
                )
                .optional()?
                .ok_or(DbError::NotFound(id))?
                .into_entry()?;

            update.apply_to(&mut entry);
            tx.execute(
                "
                UPDATE time_entries
                SET project = ?, start_time = ?, end_time = ?, duration = ?
                WHERE id = ?
                ",
                params![
                    entry.project.as_str(),
                    format_timestamp(entry.start_time),
                    entry.end_time.map(format_timestamp),
                    entry.duration,
                    id.get(),
                ],
            )?;
            tx.commit()?;
            Ok(entry)
        })
    }

    /// Lists all entries ordered by id.
    pub fn list_entries(&self) -> Result<Vec<TimeEntry>, DbError> {
        self.with_conn(|conn| query_entries(conn, &format!("{SELECT_ENTRIES} ORDER BY id ASC"), []))
    }

    /// Lists entries for one project using the project index.
    pub fn list_entries_by_project(&self, project: &ProjectName) -> Result<Vec<TimeEntry>, DbError> {
        self.with_conn(|conn| {
            query_entries(
                conn,
                &format!("{SELECT_ENTRIES} WHERE project = ? ORDER BY id ASC"),
                [project.as_str()],
            )
        })
    }

    /// Lists entries with no end time using the end time index.
    pub fn list_open_entries(&self) -> Result<Vec<TimeEntry>, DbError> {
        self.with_conn(|conn| {
            query_entries(
                conn,
                &format!("{SELECT_ENTRIES} WHERE end_time IS NULL ORDER BY id ASC"),
                [],
            )
        })
    }

    /// Deletes an entry. Missing entries are ignored.
    pub fn delete_entry(&self, id: EntryId) -> Result<(), DbError> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM time_entries WHERE id = ?", [id.get()])?;
            Ok(())
        })
    }

    /// Deletes every entry. The id sequence is kept.
    pub fn clear_entries(&self) -> Result<usize, DbError> {
        self.with_conn(|conn| Ok(conn.execute("DELETE FROM time_entries", [])?))
    }

    /// Reads the persisted last-active marker.
    pub fn get_last_active(&self) -> Result<Option<DateTime<Utc>>, DbError> {
        self.with_conn(|conn| {
            let value: Option<String> = conn
                .query_row(
                    "SELECT value FROM session_meta WHERE key = ?",
                    [LAST_ACTIVE_KEY],
                    |row| row.get(0),
                )
                .optional()?;
            value
                .map(|value| {
                    DateTime::parse_from_rfc3339(&value)
                        .map(|parsed| parsed.with_timezone(&Utc))
                        .map_err(|source| DbError::MarkerParse {
                            key: LAST_ACTIVE_KEY,
                            value: value.clone(),
                            source,
                        })
                })
                .transpose()
        })
    }

    /// Overwrites the last-active marker.
    pub fn set_last_active(&self, at: DateTime<Utc>) -> Result<(), DbError> {
        self.with_conn(|conn| {
            conn.execute(
                "
                INSERT INTO session_meta (key, value) VALUES (?, ?)
                ON CONFLICT(key) DO UPDATE SET value = excluded.value
                ",
                params![LAST_ACTIVE_KEY, format_timestamp(at)],
            )?;
            Ok(())
        })
    }
}

/// Initializes the database schema.
///
/// This is idempotent - safe to call on an already-initialized database.
fn init(conn: &Connection) -> Result<(), DbError> {
    conn.execute_batch(
        "
        -- start_time/end_time: ISO 8601 UTC (e.g., '2024-01-15T10:30:00.000Z')
        -- end_time IS NULL while the timer is running
        -- duration: billed minutes, a multiple of 15 once closed
        CREATE TABLE IF NOT EXISTS time_entries (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            project TEXT NOT NULL,
            start_time TEXT NOT NULL,
            end_time TEXT,
            duration INTEGER NOT NULL DEFAULT 0
        );

        CREATE INDEX IF NOT EXISTS idx_time_entries_project ON time_entries(project);
        CREATE INDEX IF NOT EXISTS idx_time_entries_start_time ON time_entries(start_time);
        CREATE INDEX IF NOT EXISTS idx_time_entries_end_time ON time_entries(end_time);

        CREATE TABLE IF NOT EXISTS session_meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );
        ",
    )?;
    Ok(())
}

fn query_entries<P: rusqlite::Params>(
    conn: &Connection,
    sql: &str,
    params: P,
) -> Result<Vec<TimeEntry>, DbError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, EntryRow::from_row)?;
    let mut entries = Vec::new();
    for row in rows {
        entries.push(row?.into_entry()?);
    }
    Ok(entries)
}

fn parse_timestamp(timestamp: &str, entry_id: i64) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|source| DbError::TimestampParse {
            entry_id,
            timestamp: timestamp.to_string(),
            source,
        })
}

fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[async_trait]
impl EntryStore for Database {
    async fn initialize(&self) -> Result<(), StoreError> {
        Ok(self.with_conn(|_| Ok(()))?)
    }

    async fn create(&self, entry: NewTimeEntry) -> Result<EntryId, StoreError> {
        Ok(self.insert_entry(&entry)?)
    }

    async fn get(&self, id: EntryId) -> Result<Option<TimeEntry>, StoreError> {
        Ok(self.get_entry(id)?)
    }

    async fn update(&self, id: EntryId, update: &EntryUpdate) -> Result<TimeEntry, StoreError> {
        Ok(self.update_entry(id, update)?)
    }

    async fn get_all(&self) -> Result<Vec<TimeEntry>, StoreError> {
        Ok(self.list_entries()?)
    }

    async fn get_by_project(&self, project: &ProjectName) -> Result<Vec<TimeEntry>, StoreError> {
        Ok(self.list_entries_by_project(project)?)
    }

    async fn get_open(&self) -> Result<Vec<TimeEntry>, StoreError> {
        Ok(self.list_open_entries()?)
    }

    async fn delete(&self, id: EntryId) -> Result<(), StoreError> {
        Ok(self.delete_entry(id)?)
    }

    async fn clear(&self) -> Result<(), StoreError> {
        let removed = self.clear_entries()?;
        tracing::debug!(removed, "cleared time entries");
        Ok(())
    }
}

#[async_trait]
impl ActivityLog for Database {
    async fn last_active(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        Ok(self.get_last_active()?)
    }

    async fn record_last_active(&self, at: DateTime<Utc>) -> Result<(), StoreError> {
        Ok(self.set_last_active(at)?)
    }
}
