//! Device-local durable game state (the `LocalStateStore`).
//!
//! Source of truth for immediate UI feedback. Every read is served from
//! SQLite without touching the network; every write is durable before the
//! call returns. Booster/quest flags are monotonic at the SQL level: a flag
//! that reached `1` can never be written back to `0` through this store.

use crate::core::db;
use crate::core::error::SyncError;
use crate::core::time;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Daily challenge lifecycle. The derive order is the total order used by
/// reconciliation: READY < IN_PROGRESS < COMPLETED < CLAIMED.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DailyStatus {
    Ready,
    InProgress,
    Completed,
    Claimed,
}

impl DailyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DailyStatus::Ready => "READY",
            DailyStatus::InProgress => "IN_PROGRESS",
            DailyStatus::Completed => "COMPLETED",
            DailyStatus::Claimed => "CLAIMED",
        }
    }

    pub fn parse(s: &str) -> Result<Self, SyncError> {
        match s {
            "READY" => Ok(DailyStatus::Ready),
            "IN_PROGRESS" => Ok(DailyStatus::InProgress),
            "COMPLETED" => Ok(DailyStatus::Completed),
            "CLAIMED" => Ok(DailyStatus::Claimed),
            other => Err(SyncError::ValidationError(format!(
                "unknown daily status: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoosterOwnership {
    pub booster_key: String,
    pub owned: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestState {
    pub quest_key: String,
    /// Set by the lesson flow; read by the claim guard.
    pub completed: bool,
    pub claimed: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DailyChallengeState {
    pub status: DailyStatus,
    pub progress: i64,
    pub target: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wallet {
    pub user_id: String,
    pub display_name: String,
    pub coins: i64,
    pub total_xp: i64,
    pub streak_days: i64,
}

/// Full device-local view, cheap enough to materialize per operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameStateSnapshot {
    pub boosters: Vec<BoosterOwnership>,
    pub quests: Vec<QuestState>,
    pub daily: Option<DailyChallengeState>,
    pub wallet: Wallet,
}

impl GameStateSnapshot {
    pub fn booster_owned(&self, key: &str) -> bool {
        self.boosters
            .iter()
            .any(|b| b.booster_key == key && b.owned)
    }

    pub fn quest(&self, key: &str) -> Option<&QuestState> {
        self.quests.iter().find(|q| q.quest_key == key)
    }
}

pub struct LocalStateStore {
    db_path: PathBuf,
}

impl LocalStateStore {
    /// Open the store rooted at `root`, creating tables on first use.
    pub fn open(root: &Path) -> Result<Self, SyncError> {
        db::initialize_device_db(root)?;
        Ok(Self {
            db_path: db::device_db_path(root),
        })
    }

    fn connect(&self) -> Result<Connection, SyncError> {
        db::db_connect(&self.db_path.to_string_lossy())
    }

    /// Seed the wallet row if absent. Idempotent; existing balances survive.
    pub fn ensure_wallet(&self, user_id: &str, display_name: &str) -> Result<(), SyncError> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO wallet (id, user_id, display_name, updated_at)
             VALUES (1, ?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET user_id = excluded.user_id,
                                           display_name = excluded.display_name,
                                           updated_at = excluded.updated_at",
            params![user_id, display_name, time::now_epoch_z()],
        )?;
        Ok(())
    }

    pub fn wallet(&self) -> Result<Wallet, SyncError> {
        let conn = self.connect()?;
        conn.query_row(
            "SELECT user_id, display_name, coins, total_xp, streak_days FROM wallet WHERE id = 1",
            [],
            |row| {
                Ok(Wallet {
                    user_id: row.get(0)?,
                    display_name: row.get(1)?,
                    coins: row.get(2)?,
                    total_xp: row.get(3)?,
                    streak_days: row.get(4)?,
                })
            },
        )
        .optional()?
        .ok_or_else(|| SyncError::NotFound("wallet not initialized".to_string()))
    }

    /// Full local snapshot; never blocks on the network.
    pub fn snapshot(&self) -> Result<GameStateSnapshot, SyncError> {
        let conn = self.connect()?;

        let mut stmt = conn.prepare("SELECT booster_key, owned FROM boosters ORDER BY booster_key")?;
        let boosters = stmt
            .query_map([], |row| {
                Ok(BoosterOwnership {
                    booster_key: row.get(0)?,
                    owned: row.get::<_, i64>(1)? != 0,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut stmt =
            conn.prepare("SELECT quest_key, completed, claimed FROM quests ORDER BY quest_key")?;
        let quests = stmt
            .query_map([], |row| {
                Ok(QuestState {
                    quest_key: row.get(0)?,
                    completed: row.get::<_, i64>(1)? != 0,
                    claimed: row.get::<_, i64>(2)? != 0,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let daily = conn
            .query_row(
                "SELECT status, progress, target FROM daily_challenge WHERE id = 1",
                [],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, i64>(2)?,
                    ))
                },
            )
            .optional()?
            .map(|(status, progress, target)| {
                Ok::<_, SyncError>(DailyChallengeState {
                    status: DailyStatus::parse(&status)?,
                    progress,
                    target,
                })
            })
            .transpose()?;

        let wallet = conn
            .query_row(
                "SELECT user_id, display_name, coins, total_xp, streak_days FROM wallet WHERE id = 1",
                [],
                |row| {
                    Ok(Wallet {
                        user_id: row.get(0)?,
                        display_name: row.get(1)?,
                        coins: row.get(2)?,
                        total_xp: row.get(3)?,
                        streak_days: row.get(4)?,
                    })
                },
            )
            .optional()?
            .ok_or_else(|| SyncError::NotFound("wallet not initialized".to_string()))?;

        Ok(GameStateSnapshot {
            boosters,
            quests,
            daily,
            wallet,
        })
    }

    /// Monotonic: writes OR of the stored flag and `owned`.
    pub fn set_booster_owned(&self, booster_key: &str, owned: bool) -> Result<(), SyncError> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO boosters (booster_key, owned, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(booster_key) DO UPDATE SET
                 owned = MAX(boosters.owned, excluded.owned),
                 updated_at = excluded.updated_at",
            params![booster_key, owned as i64, time::now_epoch_z()],
        )?;
        Ok(())
    }

    /// Monotonic on both flags. `None` leaves a flag untouched.
    pub fn set_quest(
        &self,
        quest_key: &str,
        completed: Option<bool>,
        claimed: Option<bool>,
    ) -> Result<(), SyncError> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO quests (quest_key, completed, claimed, updated_at)
             VALUES (?1, COALESCE(?2, 0), COALESCE(?3, 0), ?4)
             ON CONFLICT(quest_key) DO UPDATE SET
                 completed = MAX(quests.completed, COALESCE(?2, quests.completed)),
                 claimed = MAX(quests.claimed, COALESCE(?3, quests.claimed)),
                 updated_at = ?4",
            params![
                quest_key,
                completed.map(|b| b as i64),
                claimed.map(|b| b as i64),
                time::now_epoch_z()
            ],
        )?;
        Ok(())
    }

    pub fn daily(&self) -> Result<Option<DailyChallengeState>, SyncError> {
        Ok(self.snapshot()?.daily)
    }

    /// Overwrites the single daily row. Ordering discipline lives in the
    /// coordinator (guards + monotonic merge), not here.
    pub fn set_daily(&self, state: DailyChallengeState) -> Result<(), SyncError> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO daily_challenge (id, status, progress, target, updated_at)
             VALUES (1, ?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET
                 status = excluded.status,
                 progress = excluded.progress,
                 target = excluded.target,
                 updated_at = excluded.updated_at",
            params![
                state.status.as_str(),
                state.progress,
                state.target,
                time::now_epoch_z()
            ],
        )?;
        Ok(())
    }

    /// Debit coins. The SQL CHECK backs the coordinator's balance guard; a
    /// violating debit fails here instead of going negative.
    pub fn debit_coins(&self, amount: i64) -> Result<(), SyncError> {
        let conn = self.connect()?;
        let changed = conn.execute(
            "UPDATE wallet SET coins = coins - ?1, updated_at = ?2 WHERE id = 1",
            params![amount, time::now_epoch_z()],
        )?;
        if changed == 0 {
            return Err(SyncError::NotFound("wallet not initialized".to_string()));
        }
        Ok(())
    }

    pub fn credit_wallet(&self, coins: i64, xp: i64) -> Result<(), SyncError> {
        let conn = self.connect()?;
        let changed = conn.execute(
            "UPDATE wallet SET coins = coins + ?1, total_xp = total_xp + ?2, updated_at = ?3
             WHERE id = 1",
            params![coins, xp, time::now_epoch_z()],
        )?;
        if changed == 0 {
            return Err(SyncError::NotFound("wallet not initialized".to_string()));
        }
        Ok(())
    }

    pub fn set_streak_days(&self, streak_days: i64) -> Result<(), SyncError> {
        let conn = self.connect()?;
        conn.execute(
            "UPDATE wallet SET streak_days = ?1, updated_at = ?2 WHERE id = 1",
            params![streak_days, time::now_epoch_z()],
        )?;
        Ok(())
    }

    pub(crate) fn db_path(&self) -> &Path {
        &self.db_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, LocalStateStore) {
        let tmp = TempDir::new().expect("tempdir");
        let store = LocalStateStore::open(tmp.path()).expect("open");
        store.ensure_wallet("user-1", "Ada").expect("wallet");
        (tmp, store)
    }

    #[test]
    fn test_booster_flag_is_monotonic() {
        let (_tmp, store) = store();
        store.set_booster_owned("double_xp", true).expect("set");
        store.set_booster_owned("double_xp", false).expect("set");
        assert!(store.snapshot().expect("snapshot").booster_owned("double_xp"));
    }

    #[test]
    fn test_quest_flags_are_monotonic() {
        let (_tmp, store) = store();
        store.set_quest("q1", Some(true), Some(true)).expect("set");
        store.set_quest("q1", Some(false), Some(false)).expect("set");
        let snap = store.snapshot().expect("snapshot");
        let q = snap.quest("q1").expect("quest");
        assert!(q.completed);
        assert!(q.claimed);
    }

    #[test]
    fn test_debit_below_zero_is_rejected_by_check() {
        let (_tmp, store) = store();
        store.credit_wallet(50, 0).expect("credit");
        let err = store.debit_coins(80).expect_err("must violate CHECK");
        assert!(matches!(err, SyncError::RusqliteError(_)));
        assert_eq!(store.wallet().expect("wallet").coins, 50);
    }

    #[test]
    fn test_daily_round_trip() {
        let (_tmp, store) = store();
        assert!(store.daily().expect("daily").is_none());
        store
            .set_daily(DailyChallengeState {
                status: DailyStatus::InProgress,
                progress: 2,
                target: 5,
            })
            .expect("set");
        let daily = store.daily().expect("daily").expect("present");
        assert_eq!(daily.status, DailyStatus::InProgress);
        assert_eq!(daily.progress, 2);
        assert_eq!(daily.target, 5);
    }

    #[test]
    fn test_status_total_order() {
        assert!(DailyStatus::Ready < DailyStatus::InProgress);
        assert!(DailyStatus::InProgress < DailyStatus::Completed);
        assert!(DailyStatus::Completed < DailyStatus::Claimed);
    }
}
