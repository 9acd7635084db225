//! Lesson progress and achievement snapshots, plus their sync coordinator.
//!
//! These tables are append-mostly: the device appends records as lessons
//! finish, and a successful sync replaces both lists wholesale with the
//! remote's canonical copies (last-sync-wins). There is deliberately no
//! partial merge here; the all-or-nothing replace is what keeps the two
//! copies convergent without version bookkeeping.

use crate::core::client::RemoteSyncClient;
use crate::core::db;
use crate::core::error::SyncError;
use crate::core::journal::SyncJournal;
use crate::core::state::LocalStateStore;
use crate::core::time;
use rusqlite::params;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRecord {
    /// Server-assigned on first upsert; device-generated ULID before that.
    pub id: String,
    pub user_id: String,
    pub lesson_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub word_id: Option<String>,
    pub is_completed: bool,
    pub score: i64,
    pub accuracy: f64,
    pub time_spent: i64,
    pub attempts: i64,
    pub correct_answers: i64,
    pub wrong_answers: i64,
    pub xp_earned: i64,
    pub coins_earned: i64,
    pub review_count: i64,
    pub ease_factor: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AchievementRecord {
    pub achievement_key: String,
    pub unlocked_at: String,
}

/// Append a locally produced lesson result.
pub fn record_progress(store: &LocalStateStore, rec: &ProgressRecord) -> Result<(), SyncError> {
    let conn = db::db_connect(&store.db_path().to_string_lossy())?;
    conn.execute(
        "INSERT OR REPLACE INTO progress_records
             (record_id, user_id, lesson_id, word_id, is_completed, score, accuracy,
              time_spent, attempts, correct_answers, wrong_answers, xp_earned,
              coins_earned, review_count, ease_factor)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
        params![
            rec.id,
            rec.user_id,
            rec.lesson_id,
            rec.word_id,
            rec.is_completed as i64,
            rec.score,
            rec.accuracy,
            rec.time_spent,
            rec.attempts,
            rec.correct_answers,
            rec.wrong_answers,
            rec.xp_earned,
            rec.coins_earned,
            rec.review_count,
            rec.ease_factor
        ],
    )?;
    Ok(())
}

pub fn list_progress(store: &LocalStateStore) -> Result<Vec<ProgressRecord>, SyncError> {
    let conn = db::db_connect(&store.db_path().to_string_lossy())?;
    let mut stmt = conn.prepare(
        "SELECT record_id, user_id, lesson_id, word_id, is_completed, score, accuracy,
                time_spent, attempts, correct_answers, wrong_answers, xp_earned,
                coins_earned, review_count, ease_factor
         FROM progress_records ORDER BY record_id",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(ProgressRecord {
            id: row.get(0)?,
            user_id: row.get(1)?,
            lesson_id: row.get(2)?,
            word_id: row.get(3)?,
            is_completed: row.get::<_, i64>(4)? != 0,
            score: row.get(5)?,
            accuracy: row.get(6)?,
            time_spent: row.get(7)?,
            attempts: row.get(8)?,
            correct_answers: row.get(9)?,
            wrong_answers: row.get(10)?,
            xp_earned: row.get(11)?,
            coins_earned: row.get(12)?,
            review_count: row.get(13)?,
            ease_factor: row.get(14)?,
        })
    })?;
    rows.collect::<Result<Vec<_>, _>>()
        .map_err(SyncError::RusqliteError)
}

pub fn unlock_achievement(store: &LocalStateStore, achievement_key: &str) -> Result<(), SyncError> {
    let conn = db::db_connect(&store.db_path().to_string_lossy())?;
    conn.execute(
        "INSERT OR IGNORE INTO achievements (achievement_key, unlocked_at) VALUES (?1, ?2)",
        params![achievement_key, time::now_epoch_z()],
    )?;
    Ok(())
}

pub fn list_achievements(store: &LocalStateStore) -> Result<Vec<AchievementRecord>, SyncError> {
    let conn = db::db_connect(&store.db_path().to_string_lossy())?;
    let mut stmt = conn
        .prepare("SELECT achievement_key, unlocked_at FROM achievements ORDER BY achievement_key")?;
    let rows = stmt.query_map([], |row| {
        Ok(AchievementRecord {
            achievement_key: row.get(0)?,
            unlocked_at: row.get(1)?,
        })
    })?;
    rows.collect::<Result<Vec<_>, _>>()
        .map_err(SyncError::RusqliteError)
}

/// Replace both snapshot tables in one transaction so a crash between the
/// two replaces cannot leave them skewed.
fn replace_snapshots(
    store: &LocalStateStore,
    progress: &[ProgressRecord],
    achievements: &[AchievementRecord],
) -> Result<(), SyncError> {
    let mut conn = db::db_connect(&store.db_path().to_string_lossy())?;
    let tx = conn.transaction()?;
    tx.execute("DELETE FROM progress_records", [])?;
    for rec in progress {
        tx.execute(
            "INSERT INTO progress_records
                 (record_id, user_id, lesson_id, word_id, is_completed, score, accuracy,
                  time_spent, attempts, correct_answers, wrong_answers, xp_earned,
                  coins_earned, review_count, ease_factor)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                rec.id,
                rec.user_id,
                rec.lesson_id,
                rec.word_id,
                rec.is_completed as i64,
                rec.score,
                rec.accuracy,
                rec.time_spent,
                rec.attempts,
                rec.correct_answers,
                rec.wrong_answers,
                rec.xp_earned,
                rec.coins_earned,
                rec.review_count,
                rec.ease_factor
            ],
        )?;
    }
    tx.execute("DELETE FROM achievements", [])?;
    for rec in achievements {
        tx.execute(
            "INSERT INTO achievements (achievement_key, unlocked_at) VALUES (?1, ?2)",
            params![rec.achievement_key, rec.unlocked_at],
        )?;
    }
    tx.commit()?;
    Ok(())
}

/// Bidirectional snapshot sync of profile, progress, and achievements.
pub struct ProgressSyncCoordinator {
    store: LocalStateStore,
    client: RemoteSyncClient,
    journal: SyncJournal,
}

impl ProgressSyncCoordinator {
    pub fn new(store: LocalStateStore, client: RemoteSyncClient, journal: SyncJournal) -> Self {
        Self {
            store,
            client,
            journal,
        }
    }

    /// Push the local profile/progress/achievement snapshot, then replace the
    /// local lists with the remote's canonical response. All-or-nothing: any
    /// failure propagates before the local replace happens, leaving local
    /// state untouched.
    pub fn sync_now(&mut self) -> Result<(), SyncError> {
        let wallet = self.store.wallet()?;
        self.client.push_profile(&wallet)?;

        for rec in list_progress(&self.store)? {
            self.client.push_progress(&rec)?;
        }
        for rec in list_achievements(&self.store)? {
            self.client.push_achievement(&rec)?;
        }

        let remote_progress = self.client.fetch_progress()?;
        let remote_achievements = self.client.fetch_achievements()?;
        replace_snapshots(&self.store, &remote_progress, &remote_achievements)?;

        self.journal.record(
            "progress.sync",
            &wallet.user_id,
            "acked",
            Some(&format!(
                "progress={} achievements={}",
                remote_progress.len(),
                remote_achievements.len()
            )),
        )?;
        Ok(())
    }
}
