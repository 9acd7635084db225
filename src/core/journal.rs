//! Append-only sync journal (`sync.events.jsonl`).
//!
//! Every mutation attempt, queue transition, and drain outcome is recorded as
//! one JSON line. The journal is the observability surface for the engine:
//! `lexisync events` renders it, and persistent propagation failures show up
//! here as repeated `queued` entries without a matching `acked`.

use crate::core::error::SyncError;
use crate::core::time;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

pub const JOURNAL_FILE_NAME: &str = "sync.events.jsonl";

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SyncEvent {
    pub ts: String,
    pub event_id: String,
    /// Logical operation, e.g. `booster.purchase`, `queue.drain`.
    pub op: String,
    /// Logical key the operation touched (booster key, quest key, "daily").
    pub key: String,
    /// `applied` | `queued` | `acked` | `dropped` | `failed` | `completed` | `noop`
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

pub struct SyncJournal {
    log_path: PathBuf,
}

impl SyncJournal {
    pub fn new(root: &Path) -> Self {
        Self {
            log_path: root.join(JOURNAL_FILE_NAME),
        }
    }

    pub fn record(
        &self,
        op: &str,
        key: &str,
        status: &str,
        detail: Option<&str>,
    ) -> Result<(), SyncError> {
        let ev = SyncEvent {
            ts: time::now_epoch_z(),
            event_id: time::new_event_id(),
            op: op.to_string(),
            key: key.to_string(),
            status: status.to_string(),
            detail: detail.map(|s| s.to_string()),
        };
        let line =
            serde_json::to_string(&ev)?;
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .map_err(SyncError::IoError)?;
        writeln!(f, "{}", line).map_err(SyncError::IoError)?;
        Ok(())
    }

    /// Read the full journal. Lines that fail to parse are skipped; a torn
    /// final line after a crash must not poison the whole log.
    pub fn read_all(&self) -> Result<Vec<SyncEvent>, SyncError> {
        if !self.log_path.exists() {
            return Ok(vec![]);
        }
        let f = std::fs::File::open(&self.log_path).map_err(SyncError::IoError)?;
        let reader = BufReader::new(f);
        let mut events = Vec::new();
        for line in reader.lines() {
            let line = line.map_err(SyncError::IoError)?;
            if line.trim().is_empty() {
                continue;
            }
            if let Ok(ev) = serde_json::from_str::<SyncEvent>(&line) {
                events.push(ev);
            }
        }
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_journal_appends_and_reads_back_in_order() {
        let tmp = TempDir::new().expect("tempdir");
        let journal = SyncJournal::new(tmp.path());
        journal
            .record("booster.purchase", "double_xp", "applied", None)
            .expect("record");
        journal
            .record("booster.purchase", "double_xp", "queued", Some("offline"))
            .expect("record");

        let events = journal.read_all().expect("read");
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].status, "applied");
        assert_eq!(events[1].status, "queued");
        assert_eq!(events[1].detail.as_deref(), Some("offline"));
    }

    #[test]
    fn test_missing_journal_reads_empty() {
        let tmp = TempDir::new().expect("tempdir");
        let journal = SyncJournal::new(tmp.path());
        assert!(journal.read_all().expect("read").is_empty());
    }

    #[test]
    fn test_torn_trailing_line_is_skipped() {
        let tmp = TempDir::new().expect("tempdir");
        let journal = SyncJournal::new(tmp.path());
        journal
            .record("quest.claim", "q1", "acked", None)
            .expect("record");
        std::fs::write(
            tmp.path().join(JOURNAL_FILE_NAME),
            format!(
                "{}\n{{\"ts\":\"123",
                std::fs::read_to_string(tmp.path().join(JOURNAL_FILE_NAME))
                    .expect("read raw")
                    .trim_end()
            ),
        )
        .expect("write torn");

        let events = journal.read_all().expect("read");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].op, "quest.claim");
    }
}
