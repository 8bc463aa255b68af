//! List command: every entry, newest first.

use std::io::Write;

use anyhow::{Context, Result};

use tt_core::{EntryStore, sort_by_recency};

use super::util::format_entries;

pub async fn run<W: Write, S: EntryStore + ?Sized>(writer: &mut W, store: &S, json: bool) -> Result<()> {
    let mut entries = store.get_all().await.context("failed to read time entries")?;
    sort_by_recency(&mut entries);

    if json {
        let json = serde_json::to_string_pretty(&entries).context("failed to serialize entries")?;
        writeln!(writer, "{json}")?;
    } else {
        write!(writer, "{}", format_entries(&entries))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::{DateTime, Utc};
    use insta::assert_snapshot;
    use tt_core::{InMemoryStore, NewTimeEntry, ProjectName};

    fn ts(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    async fn seeded_store() -> InMemoryStore {
        let store = InMemoryStore::new();
        store
            .create(NewTimeEntry {
                end_time: Some(ts("2025-01-01T09:20:00Z")),
                duration: 30,
                ..NewTimeEntry::running(ProjectName::new("Alpha").unwrap(), ts("2025-01-01T09:00:00Z"))
            })
            .await
            .unwrap();
        store
            .create(NewTimeEntry::running(
                ProjectName::new("Beta").unwrap(),
                ts("2025-01-01T10:00:00Z"),
            ))
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn lists_newest_first() {
        let store = seeded_store().await;
        let mut output = Vec::new();
        run(&mut output, &store, false).await.unwrap();

        assert_snapshot!(String::from_utf8(output).unwrap(), @r"
        #2 Beta 2025-01-01 10:00 -> running (0m)
        #1 Alpha 2025-01-01 09:00 -> 09:20 (30m)
        ");
    }

    #[tokio::test]
    async fn json_uses_camel_case_and_null_end() {
        let store = seeded_store().await;
        let mut output = Vec::new();
        run(&mut output, &store, true).await.unwrap();

        assert_snapshot!(String::from_utf8(output).unwrap(), @r#"
        [
          {
            "id": 2,
            "project": "Beta",
            "startTime": "2025-01-01T10:00:00Z",
            "endTime": null,
            "duration": 0
          },
          {
            "id": 1,
            "project": "Alpha",
            "startTime": "2025-01-01T09:00:00Z",
            "endTime": "2025-01-01T09:20:00Z",
            "duration": 30
          }
        ]
        "#);
    }
}
