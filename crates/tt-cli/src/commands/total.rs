//! Total command: billed minutes for one project.

use std::io::Write;

use anyhow::{Context, Result};

use tt_core::{EntryStore, ProjectName};

use super::util::format_minutes;

pub async fn run<W: Write, S: EntryStore + ?Sized>(
    writer: &mut W,
    store: &S,
    project: &str,
) -> Result<()> {
    let (total, count) = match ProjectName::new(project) {
        Ok(project) => {
            let entries = store
                .get_by_project(&project)
                .await
                .context("failed to read time entries")?;
            let total: u64 = entries.iter().map(|entry| u64::from(entry.duration)).sum();
            (total, entries.len())
        }
        Err(_) => (0, 0),
    };

    let noun = if count == 1 { "entry" } else { "entries" };
    writeln!(
        writer,
        "{}: {} ({count} {noun})",
        project.trim(),
        format_minutes(total)
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::{DateTime, Utc};
    use insta::assert_snapshot;
    use tt_core::{InMemoryStore, NewTimeEntry};

    async fn add(store: &InMemoryStore, project: &str, duration: u32) {
        let start = DateTime::parse_from_rfc3339("2025-01-01T09:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        store
            .create(NewTimeEntry {
                end_time: Some(start),
                duration,
                ..NewTimeEntry::running(ProjectName::new(project).unwrap(), start)
            })
            .await
            .unwrap();
    }

    async fn total_of(store: &InMemoryStore, project: &str) -> String {
        let mut output = Vec::new();
        run(&mut output, store, project).await.unwrap();
        String::from_utf8(output).unwrap()
    }

    #[tokio::test]
    async fn sums_exact_project_matches() {
        let store = InMemoryStore::new();
        add(&store, "Alpha", 45).await;
        add(&store, "Alpha", 30).await;
        add(&store, "alpha", 15).await;

        assert_snapshot!(total_of(&store, "Alpha").await, @"Alpha: 1h 15m (2 entries)");
        assert_snapshot!(total_of(&store, "alpha").await, @"alpha: 15m (1 entry)");
    }

    #[tokio::test]
    async fn unknown_or_blank_project_is_zero() {
        let store = InMemoryStore::new();
        add(&store, "Alpha", 45).await;

        assert_snapshot!(total_of(&store, "Gamma").await, @"Gamma: 0m (0 entries)");
        assert_snapshot!(total_of(&store, "  ").await, @": 0m (0 entries)");
    }
}
