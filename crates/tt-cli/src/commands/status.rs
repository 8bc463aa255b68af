//! Status command: store location, entry count and open timers.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};

use tt_core::{ActivityLog, EntryStore};

use super::util::format_time;

/// Writes the status report. Open entries are listed as they are stored;
/// orphans are only closed when a session starts.
pub async fn run<W, S>(writer: &mut W, store: &S, database_path: &Path) -> Result<()>
where
    W: Write,
    S: EntryStore + ActivityLog + ?Sized,
{
    let entries = store.get_all().await.context("failed to read time entries")?;
    let open = store.get_open().await.context("failed to read open entries")?;
    let last_active = store
        .last_active()
        .await
        .context("failed to read last-active marker")?;

    writeln!(writer, "Time tracker status")?;
    writeln!(writer, "Database: {}", database_path.display())?;
    writeln!(writer, "Entries: {}", entries.len())?;

    if open.is_empty() {
        writeln!(writer, "Running: none")?;
    }
    for entry in &open {
        writeln!(
            writer,
            "Running: #{} {} since {}",
            entry.id,
            entry.project,
            format_time(entry.start_time)
        )?;
    }

    match last_active {
        Some(at) => writeln!(writer, "Last active: {}", format_time(at))?,
        None => writeln!(writer, "Last active: never")?,
    }

    Ok(())
}
