//! Clear command: delete every entry.

use std::io::Write;

use anyhow::{Context, Result, bail};

use tt_core::{ActivityLog, EntryStore, SessionManager};

pub async fn run<W, S>(writer: &mut W, manager: &mut SessionManager<S>, yes: bool) -> Result<()>
where
    W: Write,
    S: EntryStore + ActivityLog,
{
    if !yes {
        bail!("refusing to delete all time entries without --yes");
    }

    manager
        .initialize()
        .await
        .context("failed to initialize time tracker")?;
    let count = manager.entries().len();
    manager.clear().await.context("failed to clear time entries")?;

    writeln!(writer, "Deleted {count} time entries.")?;
    Ok(())
}
