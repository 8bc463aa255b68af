//! Export command and the archive file sink.
//!
//! The archive is the versioned snapshot envelope, pretty-printed as JSON.
//! With `--clear` the export goes through the session manager so the store is
//! only emptied after the file was written.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use chrono::NaiveDate;

use tt_core::{ActivityLog, Clock, EntryStore, ExportSnapshot, SessionManager, SinkError, SnapshotSink};

/// Writes snapshots to a JSON file.
#[derive(Debug, Clone)]
pub struct ArchiveFile {
    path: PathBuf,
}

impl ArchiveFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `time-tracker-export-YYYY-MM-DD.json` inside `dir`.
    pub fn dated(dir: &Path, date: NaiveDate) -> Self {
        Self::new(dir.join(format!(
            "time-tracker-export-{}.json",
            date.format("%Y-%m-%d")
        )))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SnapshotSink for ArchiveFile {
    async fn deliver(&self, snapshot: &ExportSnapshot) -> Result<(), SinkError> {
        let mut json = serde_json::to_string_pretty(snapshot)?;
        json.push('\n');
        std::fs::write(&self.path, json)?;
        tracing::debug!(path = %self.path.display(), entries = snapshot.entries.len(), "wrote archive");
        Ok(())
    }
}

pub async fn run<W, S>(
    writer: &mut W,
    store: S,
    clock: Arc<dyn Clock>,
    sink: &ArchiveFile,
    clear: bool,
) -> Result<()>
where
    W: Write,
    S: EntryStore + ActivityLog,
{
    let snapshot = if clear {
        let mut manager = SessionManager::with_clock(store, clock);
        manager
            .initialize()
            .await
            .context("failed to initialize time tracker")?;
        manager.export_and_clear(sink).await?
    } else {
        let snapshot = store
            .export_snapshot(clock.now())
            .await
            .context("failed to read time entries")?;
        if snapshot.is_empty() {
            bail!("no time entries found");
        }
        sink.deliver(&snapshot)
            .await
            .map_err(|err| anyhow!("export failed: {err}"))?;
        snapshot
    };

    writeln!(
        writer,
        "Exported {} entries to {}",
        snapshot.entries.len(),
        sink.path().display()
    )?;
    if clear {
        writeln!(writer, "Cleared all time entries.")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::{DateTime, Utc};
    use tt_core::{InMemoryStore, ManualClock, NewTimeEntry, ProjectName, TrackerError};

    fn ts(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn clock() -> Arc<dyn Clock> {
        Arc::new(ManualClock::new(ts("2025-01-02T08:00:00Z")))
    }

    async fn store_with_entry() -> Arc<InMemoryStore> {
        let store = Arc::new(InMemoryStore::new());
        store
            .create(NewTimeEntry {
                end_time: Some(ts("2025-01-01T09:10:00Z")),
                duration: 15,
                ..NewTimeEntry::running(ProjectName::new("Alpha").unwrap(), ts("2025-01-01T09:00:00Z"))
            })
            .await
            .unwrap();
        store
    }

    #[test]
    fn dated_archive_name() {
        let sink = ArchiveFile::dated(Path::new("/exports"), NaiveDate::from_ymd_opt(2025, 3, 7).unwrap());
        assert_eq!(
            sink.path(),
            Path::new("/exports/time-tracker-export-2025-03-07.json")
        );
    }

    #[tokio::test]
    async fn writes_envelope_and_keeps_entries() {
        let temp = tempfile::tempdir().unwrap();
        let sink = ArchiveFile::new(temp.path().join("out.json"));
        let store = store_with_entry().await;

        let mut output = Vec::new();
        run(&mut output, Arc::clone(&store), clock(), &sink, false)
            .await
            .unwrap();

        let written: ExportSnapshot =
            serde_json::from_str(&std::fs::read_to_string(sink.path()).unwrap()).unwrap();
        assert_eq!(written.version, 1);
        assert_eq!(written.created_at, ts("2025-01-02T08:00:00Z"));
        assert_eq!(written.entries.len(), 1);
        assert_eq!(store.get_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn clear_empties_store_after_writing() {
        let temp = tempfile::tempdir().unwrap();
        let sink = ArchiveFile::new(temp.path().join("out.json"));
        let store = store_with_entry().await;

        let mut output = Vec::new();
        run(&mut output, Arc::clone(&store), clock(), &sink, true)
            .await
            .unwrap();

        assert!(sink.path().exists());
        assert!(store.get_all().await.unwrap().is_empty());
        let output = String::from_utf8(output).unwrap();
        assert!(output.contains("Cleared all time entries."));
    }

    #[tokio::test]
    async fn failed_write_keeps_entries() {
        let temp = tempfile::tempdir().unwrap();
        let sink = ArchiveFile::new(temp.path().join("missing").join("out.json"));
        let store = store_with_entry().await;

        let mut output = Vec::new();
        let err = run(&mut output, Arc::clone(&store), clock(), &sink, true)
            .await
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<TrackerError>(),
            Some(TrackerError::ExportFailed(_))
        ));
        assert_eq!(store.get_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn empty_store_is_refused() {
        let temp = tempfile::tempdir().unwrap();
        let sink = ArchiveFile::new(temp.path().join("out.json"));

        let mut output = Vec::new();
        let err = run(&mut output, InMemoryStore::new(), clock(), &sink, false)
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "no time entries found");
        assert!(!sink.path().exists());
    }
}
