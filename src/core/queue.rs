//! Durable FIFO of economy mutations awaiting remote acknowledgment.
//!
//! A mutation lands here only after its optimistic local apply succeeded and
//! the remote push exhausted its retries. Entries survive process restarts
//! and are replayed in enqueue order until the remote acknowledges them; the
//! server's idempotent upserts make replays safe.

use crate::core::db;
use crate::core::error::SyncError;
use crate::core::state::DailyStatus;
use crate::core::time;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, TryLockError};

/// One mutation kind per remote endpoint. Dispatch is a pattern match, never
/// string plumbing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum MutationPayload {
    #[serde(rename = "BOOSTER")]
    Booster { booster_key: String, owned: bool },
    #[serde(rename = "QUEST")]
    Quest { quest_key: String, claimed: bool },
    #[serde(rename = "DAILY")]
    Daily {
        status: DailyStatus,
        progress: i64,
        target: i64,
    },
}

impl MutationPayload {
    pub fn kind(&self) -> &'static str {
        match self {
            MutationPayload::Booster { .. } => "BOOSTER",
            MutationPayload::Quest { .. } => "QUEST",
            MutationPayload::Daily { .. } => "DAILY",
        }
    }

    /// Logical key for journaling and dedup-minded reads.
    pub fn key(&self) -> &str {
        match self {
            MutationPayload::Booster { booster_key, .. } => booster_key,
            MutationPayload::Quest { quest_key, .. } => quest_key,
            MutationPayload::Daily { .. } => "daily",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingMutation {
    pub mutation_id: String,
    pub payload: MutationPayload,
    pub enqueued_at: String,
}

/// What the drain handler decided for one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainDisposition {
    /// Remote acknowledged (or the entry is permanently unsendable): delete.
    Remove,
    /// Still unsendable for transient reasons: keep for the next drain.
    Keep,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    Completed { drained: usize, remaining: usize },
    /// Another drain holds the lock; this trigger was a no-op.
    AlreadyRunning,
}

pub struct PendingMutationQueue {
    db_path: PathBuf,
    drain_lock: Mutex<()>,
}

impl PendingMutationQueue {
    pub fn open(root: &Path) -> Result<Self, SyncError> {
        db::initialize_device_db(root)?;
        Ok(Self {
            db_path: db::device_db_path(root),
            drain_lock: Mutex::new(()),
        })
    }

    fn connect(&self) -> Result<Connection, SyncError> {
        db::db_connect(&self.db_path.to_string_lossy())
    }

    /// Append durably; the row is on disk when this returns.
    pub fn enqueue(&self, payload: MutationPayload) -> Result<PendingMutation, SyncError> {
        let mutation = PendingMutation {
            mutation_id: time::new_event_id(),
            payload,
            enqueued_at: time::now_epoch_z(),
        };
        let payload_json = serde_json::to_string(&mutation.payload)?;
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO pending_mutations (mutation_id, kind, payload, enqueued_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                mutation.mutation_id,
                mutation.payload.kind(),
                payload_json,
                mutation.enqueued_at
            ],
        )?;
        Ok(mutation)
    }

    pub fn len(&self) -> Result<usize, SyncError> {
        let conn = self.connect()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM pending_mutations", [], |row| {
            row.get(0)
        })?;
        Ok(count as usize)
    }

    pub fn is_empty(&self) -> Result<bool, SyncError> {
        Ok(self.len()? == 0)
    }

    fn raw_entries(&self) -> Result<Vec<(String, String, String)>, SyncError> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT mutation_id, payload, enqueued_at FROM pending_mutations ORDER BY seq ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(SyncError::RusqliteError)
    }

    fn remove(&self, mutation_id: &str) -> Result<(), SyncError> {
        let conn = self.connect()?;
        conn.execute(
            "DELETE FROM pending_mutations WHERE mutation_id = ?1",
            params![mutation_id],
        )?;
        Ok(())
    }

    /// FIFO view of the queue. Rows whose payload no longer decodes are
    /// skipped here; the next drain evicts them.
    pub fn entries(&self) -> Result<Vec<PendingMutation>, SyncError> {
        let mut entries = Vec::new();
        for (mutation_id, payload_json, enqueued_at) in self.raw_entries()? {
            if let Ok(payload) = serde_json::from_str(&payload_json) {
                entries.push(PendingMutation {
                    mutation_id,
                    payload,
                    enqueued_at,
                });
            }
        }
        Ok(entries)
    }

    /// Replay entries in FIFO order. Entries are removed only when the handler
    /// returns [`DrainDisposition::Remove`]; `Keep` leaves the entry in place
    /// for the next drain. An empty queue is a no-op. At most one drain runs
    /// at a time; concurrent triggers return `AlreadyRunning` and do nothing.
    pub fn drain<F>(&self, mut handler: F) -> Result<DrainOutcome, SyncError>
    where
        F: FnMut(&PendingMutation) -> DrainDisposition,
    {
        let _guard = match self.drain_lock.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::WouldBlock) => return Ok(DrainOutcome::AlreadyRunning),
            // The lock guards no data; a handler panic in an earlier drain
            // must not leave the queue permanently undrainable.
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
        };

        let mut drained = 0usize;
        for (mutation_id, payload_json, enqueued_at) in self.raw_entries()? {
            let Ok(payload) = serde_json::from_str::<MutationPayload>(&payload_json) else {
                // Undeliverable forever; evict instead of wedging the queue.
                self.remove(&mutation_id)?;
                continue;
            };
            let entry = PendingMutation {
                mutation_id,
                payload,
                enqueued_at,
            };
            match handler(&entry) {
                DrainDisposition::Remove => {
                    self.remove(&entry.mutation_id)?;
                    drained += 1;
                }
                DrainDisposition::Keep => {}
            }
        }

        Ok(DrainOutcome::Completed {
            drained,
            remaining: self.len()?,
        })
    }
}
