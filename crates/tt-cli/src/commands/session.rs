//! Interactive timer session.
//!
//! Reads one command per line and drives a [`SessionManager`]. The manager is
//! initialized before the first command, so timers orphaned by an earlier
//! session are closed at its last recorded activity. Every processed command
//! and the end of input refresh the last-active marker.

use std::io::Write;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use tt_core::rounding::validate_manual_duration;
use tt_core::{
    ActivityLog, EntryId, EntryStore, EntryUpdate, ProjectName, ReconcileReport, SessionManager,
};

use super::util::{format_entries, format_entry, format_minutes, format_time, parse_datetime_at};

const HELP: &str = "\
Commands:
  start <project>                              start a timer, stopping any running one
  stop                                         stop the running timer
  resume <id>                                  continue an entry on top of its billed time
  edit <id> project|duration|start|end <value> change one field of an entry
  delete <id>                                  remove an entry
  list                                         show entries, newest first
  total <project>                              billed minutes for a project
  status                                       show the running timer
  help                                         show this message
  quit                                         leave the session";

/// A field change requested by `edit`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryEdit {
    Project(ProjectName),
    Duration(u32),
    Start(DateTime<Utc>),
    End(DateTime<Utc>),
}

impl EntryEdit {
    fn into_update(self) -> EntryUpdate {
        match self {
            Self::Project(project) => EntryUpdate::default().with_project(project),
            Self::Duration(minutes) => EntryUpdate::default().with_duration(minutes),
            Self::Start(at) => EntryUpdate::default().with_start_time(at),
            Self::End(at) => EntryUpdate::default().with_end_time(Some(at)),
        }
    }
}

/// One parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    Start(String),
    Stop,
    Resume(EntryId),
    Edit(EntryId, EntryEdit),
    Delete(EntryId),
    List,
    Total(String),
    Status,
    Help,
    Quit,
}

impl SessionCommand {
    /// Parses a line. Blank lines yield `None`; relative times resolve
    /// against `now`.
    pub fn parse(line: &str, now: DateTime<Utc>) -> Result<Option<Self>> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        let (verb, rest) = line
            .split_once(char::is_whitespace)
            .map_or((line, ""), |(verb, rest)| (verb, rest.trim()));

        let command = match verb {
            "start" => {
                if rest.is_empty() {
                    bail!("usage: start <project>");
                }
                Self::Start(rest.to_string())
            }
            "stop" => Self::Stop,
            "resume" => Self::Resume(parse_id(rest)?),
            "edit" => {
                let mut parts = rest.splitn(3, char::is_whitespace);
                let (Some(id), Some(field), Some(value)) = (parts.next(), parts.next(), parts.next())
                else {
                    bail!("usage: edit <id> project|duration|start|end <value>");
                };
                Self::Edit(parse_id(id)?, parse_edit(field, value.trim(), now)?)
            }
            "delete" => Self::Delete(parse_id(rest)?),
            "list" => Self::List,
            "total" => Self::Total(rest.to_string()),
            "status" => Self::Status,
            "help" => Self::Help,
            "quit" | "exit" => Self::Quit,
            other => bail!("unknown command: {other} (type 'help')"),
        };
        Ok(Some(command))
    }
}

fn parse_id(s: &str) -> Result<EntryId> {
    s.parse()
        .with_context(|| format!("invalid entry id: {s:?}"))
}

fn parse_edit(field: &str, value: &str, now: DateTime<Utc>) -> Result<EntryEdit> {
    let edit = match field {
        "project" => EntryEdit::Project(ProjectName::new(value)?),
        "duration" => {
            let minutes: u32 = value
                .parse()
                .with_context(|| format!("invalid duration: {value:?}"))?;
            EntryEdit::Duration(validate_manual_duration(minutes)?)
        }
        "start" => EntryEdit::Start(parse_datetime_at(value, now)?),
        "end" => EntryEdit::End(parse_datetime_at(value, now)?),
        other => bail!("unknown field: {other} (expected project, duration, start or end)"),
    };
    Ok(edit)
}

/// Runs the session until `quit` or end of input.
pub async fn run<S, R, W>(manager: &mut SessionManager<S>, input: R, writer: &mut W) -> Result<()>
where
    S: EntryStore + ActivityLog,
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let report = manager
        .initialize()
        .await
        .context("failed to initialize time tracker")?;
    write_report(writer, &report)?;
    writeln!(writer, "Type 'help' for commands.")?;

    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await.context("failed to read input")? {
        let command = match SessionCommand::parse(&line, Utc::now()) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(err) => {
                writeln!(writer, "error: {err:#}")?;
                continue;
            }
        };
        if command == SessionCommand::Quit {
            break;
        }

        if let Err(err) = execute(manager, command, writer).await {
            writeln!(writer, "error: {err:#}")?;
        }
        manager.record_last_active().await;
    }

    manager.record_last_active().await;
    if let Some(current) = manager.current_timer() {
        writeln!(
            writer,
            "#{} {} is still running; it will be closed at the last recorded activity",
            current.id, current.project
        )?;
    }
    Ok(())
}

async fn execute<S, W>(
    manager: &mut SessionManager<S>,
    command: SessionCommand,
    writer: &mut W,
) -> Result<()>
where
    S: EntryStore + ActivityLog,
    W: Write,
{
    match command {
        SessionCommand::Start(project) => {
            let entry = manager.start_timer(&project).await?;
            writeln!(writer, "started #{} {}", entry.id, entry.project)?;
        }
        SessionCommand::Stop => match manager.stop_timer().await? {
            Some(entry) => writeln!(
                writer,
                "stopped #{} {} ({})",
                entry.id,
                entry.project,
                format_minutes(u64::from(entry.duration))
            )?,
            None => writeln!(writer, "no timer running")?,
        },
        SessionCommand::Resume(id) => {
            let entry = manager.resume_entry(id).await?;
            writeln!(
                writer,
                "resumed #{} {} ({} already billed)",
                entry.id,
                entry.project,
                format_minutes(u64::from(entry.duration))
            )?;
        }
        SessionCommand::Edit(id, edit) => {
            let entry = manager.edit_entry(id, edit.into_update()).await?;
            writeln!(writer, "updated {}", format_entry(&entry))?;
        }
        SessionCommand::Delete(id) => {
            manager.delete_entry(id).await?;
            writeln!(writer, "deleted #{id}")?;
        }
        SessionCommand::List => {
            write!(writer, "{}", format_entries(manager.entries()))?;
        }
        SessionCommand::Total(project) => {
            let total = manager.project_total(&project).await?;
            writeln!(writer, "{}: {}", project.trim(), format_minutes(total))?;
        }
        SessionCommand::Status => match manager.current_timer() {
            Some(current) => writeln!(
                writer,
                "running #{} {} since {}",
                current.id,
                current.project,
                format_time(current.start_time)
            )?,
            None => writeln!(writer, "no timer running")?,
        },
        SessionCommand::Help => writeln!(writer, "{HELP}")?,
        SessionCommand::Quit => {}
    }
    Ok(())
}

fn write_report<W: Write>(writer: &mut W, report: &ReconcileReport) -> Result<()> {
    for closed in &report.closed {
        writeln!(
            writer,
            "recovered orphaned timer #{} ({})",
            closed.id,
            format_minutes(u64::from(closed.duration))
        )?;
    }
    for failed in &report.failed {
        writeln!(
            writer,
            "could not close orphaned timer #{}: {}",
            failed.id, failed.error
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use chrono::TimeDelta;
    use insta::assert_snapshot;
    use tt_core::{InMemoryStore, ManualClock, NewTimeEntry, ValidationError};

    fn ts(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn manager_at(store: InMemoryStore, now: DateTime<Utc>) -> SessionManager<InMemoryStore> {
        SessionManager::with_clock(store, Arc::new(ManualClock::new(now)))
    }

    async fn run_script(manager: &mut SessionManager<InMemoryStore>, script: &str) -> String {
        let mut output = Vec::new();
        run(manager, script.as_bytes(), &mut output).await.unwrap();
        String::from_utf8(output).unwrap()
    }

    #[test]
    fn parses_commands() {
        let now = ts("2025-01-01T12:00:00Z");
        assert_eq!(SessionCommand::parse("   ", now).unwrap(), None);
        assert_eq!(
            SessionCommand::parse("start Client Work", now).unwrap(),
            Some(SessionCommand::Start("Client Work".to_string()))
        );
        assert_eq!(
            SessionCommand::parse("resume #4", now).unwrap(),
            Some(SessionCommand::Resume(EntryId::new(4)))
        );
        assert_eq!(
            SessionCommand::parse("edit 2 start 30 minutes ago", now).unwrap(),
            Some(SessionCommand::Edit(
                EntryId::new(2),
                EntryEdit::Start(ts("2025-01-01T11:30:00Z"))
            ))
        );
        assert_eq!(
            SessionCommand::parse("edit 2 project Beta Corp", now).unwrap(),
            Some(SessionCommand::Edit(
                EntryId::new(2),
                EntryEdit::Project(ProjectName::new("Beta Corp").unwrap())
            ))
        );
        assert_eq!(
            SessionCommand::parse("exit", now).unwrap(),
            Some(SessionCommand::Quit)
        );
    }

    #[test]
    fn rejects_bad_input() {
        let now = ts("2025-01-01T12:00:00Z");
        assert!(SessionCommand::parse("start", now).is_err());
        assert!(SessionCommand::parse("resume abc", now).is_err());
        assert!(SessionCommand::parse("edit 1 colour red", now).is_err());
        assert!(SessionCommand::parse("dance", now).is_err());

        let err = SessionCommand::parse("edit 1 duration 20", now).unwrap_err();
        assert_eq!(
            err.downcast_ref::<ValidationError>(),
            Some(&ValidationError::UnroundedDuration { value: 20, unit: 15 })
        );
    }

    #[tokio::test]
    async fn start_stop_list_and_total() {
        let mut manager = manager_at(InMemoryStore::new(), ts("2025-01-01T09:00:00Z"));

        let output = run_script(
            &mut manager,
            "start Alpha\nstop\nstop\nlist\ntotal Alpha\ntotal Nobody\nquit\nstart Ignored\n",
        )
        .await;

        assert_snapshot!(output, @r"
        Type 'help' for commands.
        started #1 Alpha
        stopped #1 Alpha (15m)
        no timer running
        #1 Alpha 2025-01-01 09:00 -> 09:00 (15m)
        Alpha: 15m
        Nobody: 0m
        ");
        assert_eq!(manager.store().get_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn errors_are_reported_and_the_loop_continues() {
        let mut manager = manager_at(InMemoryStore::new(), ts("2025-01-01T09:00:00Z"));

        let output = run_script(
            &mut manager,
            "start Alpha\nedit 1 duration 20\nresume 99\nbogus\nedit 1 duration 45\nstatus\n",
        )
        .await;

        assert_snapshot!(output, @r"
        Type 'help' for commands.
        started #1 Alpha
        error: duration must be a multiple of 15 minutes, got 20
        error: time entry 99 not found
        error: unknown command: bogus (type 'help')
        updated #1 Alpha 2025-01-01 09:00 -> running (45m)
        running #1 Alpha since 2025-01-01 09:00
        #1 Alpha is still running; it will be closed at the last recorded activity
        ");
    }

    #[tokio::test]
    async fn startup_reports_recovered_orphans() {
        let t0 = ts("2025-01-01T09:00:00Z");
        let store = InMemoryStore::new();
        store
            .create(NewTimeEntry::running(ProjectName::new("Alpha").unwrap(), t0))
            .await
            .unwrap();
        store
            .record_last_active(t0 + TimeDelta::minutes(40))
            .await
            .unwrap();
        let mut manager = manager_at(store, t0 + TimeDelta::hours(6));

        let output = run_script(&mut manager, "list\n").await;

        assert_snapshot!(output, @r"
        recovered orphaned timer #1 (45m)
        Type 'help' for commands.
        #1 Alpha 2025-01-01 09:00 -> 09:40 (45m)
        ");
    }

    #[tokio::test]
    async fn records_last_active_after_commands() {
        let now = ts("2025-01-01T09:00:00Z");
        let mut manager = manager_at(InMemoryStore::new(), now);

        run_script(&mut manager, "status\n").await;

        assert_eq!(manager.store().last_active().await.unwrap(), Some(now));
    }

    #[tokio::test]
    async fn unavailable_store_fails_startup() {
        let store = InMemoryStore::new();
        store.set_unavailable(true);
        let mut manager = manager_at(store, ts("2025-01-01T09:00:00Z"));

        let mut output = Vec::new();
        let err = run(&mut manager, "start Alpha\n".as_bytes(), &mut output)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("failed to initialize"));
    }
}
