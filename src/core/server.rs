//! Authoritative game-state service (the remote side of the wire boundary).
//!
//! Every mutation endpoint is an insert-if-absent followed by an
//! unconditional update keyed by `(user_id, item_key)`, inside one
//! transaction. Replaying the same mutation any number of times lands on the
//! same stored state, which is what lets the device queue retry at-least-once
//! without server-side dedup bookkeeping. No version token: the last write
//! for a key wins.
//!
//! In this crate the service is an in-process [`Transport`] binding over its
//! own SQLite database; a deployment would mount the same routing behind a
//! socket listener.

use crate::core::db;
use crate::core::error::SyncError;
use crate::core::time;
use crate::core::transport::{Method, Transport, WireRequest, WireResponse};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::{json, Value as JsonValue};
use std::path::{Path, PathBuf};

pub struct RemoteGameStateService {
    db_path: PathBuf,
}

impl RemoteGameStateService {
    pub fn open(root: &Path) -> Result<Self, SyncError> {
        db::initialize_service_db(root)?;
        Ok(Self {
            db_path: db::service_db_path(root),
        })
    }

    fn connect(&self) -> Result<Connection, SyncError> {
        db::db_connect(&self.db_path.to_string_lossy())
    }

    fn route(&self, req: &WireRequest) -> WireResponse {
        match self.route_inner(req) {
            Ok(resp) => resp,
            Err(SyncError::AuthorizationError(msg)) => WireResponse::error(401, &msg),
            Err(SyncError::ValidationError(msg)) => WireResponse::error(400, &msg),
            Err(SyncError::NotFound(msg)) => WireResponse::error(404, &msg),
            Err(e) => WireResponse::error(500, &e.to_string()),
        }
    }

    fn route_inner(&self, req: &WireRequest) -> Result<WireResponse, SyncError> {
        let (path, query) = match req.path.split_once('?') {
            Some((p, q)) => (p, Some(q)),
            None => (req.path.as_str(), None),
        };
        let segments: Vec<&str> = path.trim_matches('/').split('/').collect();

        match (req.method, segments.as_slice()) {
            (Method::Get, ["gamestate", user]) => {
                authorize(req, user)?;
                self.get_game_state(user)
            }
            (Method::Post, ["gamestate", user, "booster"]) => {
                authorize(req, user)?;
                let body = require_body(req)?;
                self.upsert_booster(user, &body)
            }
            (Method::Post, ["gamestate", user, "quest"]) => {
                authorize(req, user)?;
                let body = require_body(req)?;
                self.upsert_quest(user, &body)
            }
            (Method::Post, ["gamestate", user, "daily"]) => {
                authorize(req, user)?;
                let body = require_body(req)?;
                self.upsert_daily(user, &body)
            }
            (Method::Get, ["leaderboard"]) => {
                let limit = query
                    .and_then(|q| {
                        q.split('&')
                            .find_map(|kv| kv.strip_prefix("limit="))
                            .and_then(|v| v.parse::<i64>().ok())
                    })
                    .unwrap_or(10);
                self.leaderboard(limit)
            }
            (Method::Post, ["progress"]) => {
                let body = require_body(req)?;
                let user = require_str(&body, "userId")?;
                authorize(req, &user)?;
                self.upsert_progress(&user, &body)
            }
            (Method::Get, ["progress", user]) => {
                authorize(req, user)?;
                self.get_progress(user)
            }
            (Method::Post, ["profile", user]) => {
                authorize(req, user)?;
                let body = require_body(req)?;
                self.upsert_profile(user, &body)
            }
            (Method::Get, ["achievements", user]) => {
                authorize(req, user)?;
                self.get_achievements(user)
            }
            (Method::Post, ["achievements", user]) => {
                authorize(req, user)?;
                let body = require_body(req)?;
                self.upsert_achievement(user, &body)
            }
            _ => Ok(WireResponse::error(404, "no such route")),
        }
    }

    fn get_game_state(&self, user: &str) -> Result<WireResponse, SyncError> {
        let conn = self.connect()?;

        let mut stmt = conn.prepare(
            "SELECT booster_key, is_owned FROM booster_state WHERE user_id = ?1 ORDER BY booster_key",
        )?;
        let boosters = stmt
            .query_map(params![user], |row| {
                Ok(json!({
                    "boosterKey": row.get::<_, String>(0)?,
                    "isOwned": row.get::<_, i64>(1)? != 0
                }))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut stmt = conn.prepare(
            "SELECT quest_key, is_claimed FROM quest_state WHERE user_id = ?1 ORDER BY quest_key",
        )?;
        let quests = stmt
            .query_map(params![user], |row| {
                Ok(json!({
                    "questKey": row.get::<_, String>(0)?,
                    "isClaimed": row.get::<_, i64>(1)? != 0
                }))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let daily = conn
            .query_row(
                "SELECT status, progress, target FROM daily_state WHERE user_id = ?1",
                params![user],
                |row| {
                    Ok(json!({
                        "status": row.get::<_, String>(0)?,
                        "progress": row.get::<_, i64>(1)?,
                        "target": row.get::<_, i64>(2)?
                    }))
                },
            )
            .optional()?;

        Ok(WireResponse::ok(json!({
            "boosters": boosters,
            "quests": quests,
            "daily": daily
        })))
    }

    fn upsert_booster(&self, user: &str, body: &JsonValue) -> Result<WireResponse, SyncError> {
        let key = require_str(body, "boosterKey")?;
        let owned = require_bool(body, "owned")?;
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT OR IGNORE INTO booster_state (user_id, booster_key, is_owned, updated_at)
             VALUES (?1, ?2, 0, ?3)",
            params![user, key, time::now_epoch_z()],
        )?;
        tx.execute(
            "UPDATE booster_state SET is_owned = ?3, updated_at = ?4
             WHERE user_id = ?1 AND booster_key = ?2",
            params![user, key, owned as i64, time::now_epoch_z()],
        )?;
        tx.commit()?;
        Ok(WireResponse::ok(json!({ "status": "ok" })))
    }

    fn upsert_quest(&self, user: &str, body: &JsonValue) -> Result<WireResponse, SyncError> {
        let key = require_str(body, "questKey")?;
        let claimed = require_bool(body, "claimed")?;
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT OR IGNORE INTO quest_state (user_id, quest_key, is_claimed, updated_at)
             VALUES (?1, ?2, 0, ?3)",
            params![user, key, time::now_epoch_z()],
        )?;
        tx.execute(
            "UPDATE quest_state SET is_claimed = ?3, updated_at = ?4
             WHERE user_id = ?1 AND quest_key = ?2",
            params![user, key, claimed as i64, time::now_epoch_z()],
        )?;
        tx.commit()?;
        Ok(WireResponse::ok(json!({ "status": "ok" })))
    }

    fn upsert_daily(&self, user: &str, body: &JsonValue) -> Result<WireResponse, SyncError> {
        let status = require_str(body, "status")?;
        let progress = require_i64(body, "progress")?;
        let target = require_i64(body, "target")?;
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT OR IGNORE INTO daily_state (user_id, status, progress, target, updated_at)
             VALUES (?1, 'READY', 0, 0, ?2)",
            params![user, time::now_epoch_z()],
        )?;
        tx.execute(
            "UPDATE daily_state SET status = ?2, progress = ?3, target = ?4, updated_at = ?5
             WHERE user_id = ?1",
            params![user, status, progress, target, time::now_epoch_z()],
        )?;
        tx.commit()?;
        Ok(WireResponse::ok(json!({ "status": "ok" })))
    }

    fn leaderboard(&self, limit: i64) -> Result<WireResponse, SyncError> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT user_id, display_name, total_xp, coins, streak_days
             FROM profiles ORDER BY total_xp DESC, user_id ASC LIMIT ?1",
        )?;
        let rows = stmt
            .query_map(params![limit.max(0)], |row| {
                Ok(json!({
                    "userId": row.get::<_, String>(0)?,
                    "displayName": row.get::<_, String>(1)?,
                    "totalXp": row.get::<_, i64>(2)?,
                    "coins": row.get::<_, i64>(3)?,
                    "streakDays": row.get::<_, i64>(4)?
                }))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(WireResponse::ok(JsonValue::Array(rows)))
    }

    fn upsert_profile(&self, user: &str, body: &JsonValue) -> Result<WireResponse, SyncError> {
        let display_name = require_str(body, "displayName")?;
        let coins = require_i64(body, "coins")?;
        let total_xp = require_i64(body, "totalXp")?;
        let streak_days = require_i64(body, "streakDays")?;
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT OR IGNORE INTO profiles (user_id, updated_at) VALUES (?1, ?2)",
            params![user, time::now_epoch_z()],
        )?;
        tx.execute(
            "UPDATE profiles SET display_name = ?2, coins = ?3, total_xp = ?4,
                    streak_days = ?5, updated_at = ?6
             WHERE user_id = ?1",
            params![
                user,
                display_name,
                coins,
                total_xp,
                streak_days,
                time::now_epoch_z()
            ],
        )?;
        tx.commit()?;
        Ok(WireResponse::ok(json!({ "status": "ok" })))
    }

    /// Progress rows are keyed `(user, lesson, word)`. A replayed push
    /// updates the existing row and returns its id instead of inserting a
    /// duplicate.
    fn upsert_progress(&self, user: &str, body: &JsonValue) -> Result<WireResponse, SyncError> {
        let lesson_id = require_str(body, "lessonId")?;
        let word_id = body
            .get("wordId")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;

        let existing_id: Option<String> = tx
            .query_row(
                "SELECT id FROM progress_rows WHERE user_id = ?1 AND lesson_id = ?2 AND word_id = ?3",
                params![user, lesson_id, word_id],
                |row| row.get(0),
            )
            .optional()?;
        let id = existing_id.unwrap_or_else(time::new_event_id);

        tx.execute(
            "INSERT OR IGNORE INTO progress_rows (id, user_id, lesson_id, word_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![id, user, lesson_id, word_id, time::now_epoch_z()],
        )?;
        tx.execute(
            "UPDATE progress_rows SET
                 is_completed = ?4, score = ?5, accuracy = ?6, time_spent = ?7,
                 attempts = ?8, correct_answers = ?9, wrong_answers = ?10,
                 xp_earned = ?11, coins_earned = ?12, review_count = ?13, ease_factor = ?14
             WHERE user_id = ?1 AND lesson_id = ?2 AND word_id = ?3",
            params![
                user,
                lesson_id,
                word_id,
                body.get("isCompleted").and_then(|v| v.as_bool()).unwrap_or(false) as i64,
                body.get("score").and_then(|v| v.as_i64()).unwrap_or(0),
                body.get("accuracy").and_then(|v| v.as_f64()).unwrap_or(0.0),
                body.get("timeSpent").and_then(|v| v.as_i64()).unwrap_or(0),
                body.get("attempts").and_then(|v| v.as_i64()).unwrap_or(0),
                body.get("correctAnswers").and_then(|v| v.as_i64()).unwrap_or(0),
                body.get("wrongAnswers").and_then(|v| v.as_i64()).unwrap_or(0),
                body.get("xpEarned").and_then(|v| v.as_i64()).unwrap_or(0),
                body.get("coinsEarned").and_then(|v| v.as_i64()).unwrap_or(0),
                body.get("reviewCount").and_then(|v| v.as_i64()).unwrap_or(0),
                body.get("easeFactor").and_then(|v| v.as_f64()).unwrap_or(2.5)
            ],
        )?;
        tx.commit()?;
        Ok(WireResponse::ok(json!({ "id": id })))
    }

    fn get_progress(&self, user: &str) -> Result<WireResponse, SyncError> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT id, lesson_id, word_id, is_completed, score, accuracy, time_spent,
                    attempts, correct_answers, wrong_answers, xp_earned, coins_earned,
                    review_count, ease_factor
             FROM progress_rows WHERE user_id = ?1 ORDER BY id",
        )?;
        let rows = stmt
            .query_map(params![user], |row| {
                let word_id: String = row.get(2)?;
                Ok(json!({
                    "id": row.get::<_, String>(0)?,
                    "userId": user,
                    "lessonId": row.get::<_, String>(1)?,
                    "wordId": if word_id.is_empty() { JsonValue::Null } else { json!(word_id) },
                    "isCompleted": row.get::<_, i64>(3)? != 0,
                    "score": row.get::<_, i64>(4)?,
                    "accuracy": row.get::<_, f64>(5)?,
                    "timeSpent": row.get::<_, i64>(6)?,
                    "attempts": row.get::<_, i64>(7)?,
                    "correctAnswers": row.get::<_, i64>(8)?,
                    "wrongAnswers": row.get::<_, i64>(9)?,
                    "xpEarned": row.get::<_, i64>(10)?,
                    "coinsEarned": row.get::<_, i64>(11)?,
                    "reviewCount": row.get::<_, i64>(12)?,
                    "easeFactor": row.get::<_, f64>(13)?
                }))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(WireResponse::ok(JsonValue::Array(rows)))
    }

    fn upsert_achievement(&self, user: &str, body: &JsonValue) -> Result<WireResponse, SyncError> {
        let key = require_str(body, "achievementKey")?;
        let unlocked_at = require_str(body, "unlockedAt")?;
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT OR IGNORE INTO achievement_rows (user_id, achievement_key, unlocked_at)
             VALUES (?1, ?2, ?3)",
            params![user, key, unlocked_at],
        )?;
        tx.execute(
            "UPDATE achievement_rows SET unlocked_at = ?3
             WHERE user_id = ?1 AND achievement_key = ?2",
            params![user, key, unlocked_at],
        )?;
        tx.commit()?;
        Ok(WireResponse::ok(json!({ "status": "ok" })))
    }

    fn get_achievements(&self, user: &str) -> Result<WireResponse, SyncError> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT achievement_key, unlocked_at FROM achievement_rows
             WHERE user_id = ?1 ORDER BY achievement_key",
        )?;
        let rows = stmt
            .query_map(params![user], |row| {
                Ok(json!({
                    "achievementKey": row.get::<_, String>(0)?,
                    "unlockedAt": row.get::<_, String>(1)?
                }))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(WireResponse::ok(JsonValue::Array(rows)))
    }
}

impl Transport for RemoteGameStateService {
    /// Loopback binding: every request reaches the service, so `send` never
    /// reports an I/O failure. Protocol outcomes travel as status codes.
    fn send(&self, req: &WireRequest) -> Result<WireResponse, SyncError> {
        Ok(self.route(req))
    }
}

/// Bearer token must equal the user id path segment in the current scheme.
fn authorize(req: &WireRequest, user: &str) -> Result<(), SyncError> {
    if req.token != user {
        return Err(SyncError::AuthorizationError(format!(
            "token does not match user {}",
            user
        )));
    }
    Ok(())
}

fn require_body(req: &WireRequest) -> Result<JsonValue, SyncError> {
    req.body
        .clone()
        .ok_or_else(|| SyncError::ValidationError("missing request body".to_string()))
}

fn require_str(body: &JsonValue, key: &str) -> Result<String, SyncError> {
    body.get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| SyncError::ValidationError(format!("missing field: {}", key)))
}

fn require_bool(body: &JsonValue, key: &str) -> Result<bool, SyncError> {
    body.get(key)
        .and_then(|v| v.as_bool())
        .ok_or_else(|| SyncError::ValidationError(format!("missing field: {}", key)))
}

fn require_i64(body: &JsonValue, key: &str) -> Result<i64, SyncError> {
    body.get(key)
        .and_then(|v| v.as_i64())
        .ok_or_else(|| SyncError::ValidationError(format!("missing field: {}", key)))
}
