//! Typed client over the wire boundary (the `RemoteSyncClient`).
//!
//! Thin layer: builds the §6-shaped envelopes, sends them through whatever
//! [`Transport`] it was constructed with (usually a [`RetryingTransport`]
//! around the service binding), and maps status codes into the error
//! taxonomy. No retry or queue logic lives here.

use crate::core::error::SyncError;
use crate::core::progress::{AchievementRecord, ProgressRecord};
use crate::core::queue::MutationPayload;
use crate::core::state::{DailyChallengeState, DailyStatus, Wallet};
use crate::core::transport::{Transport, WireRequest, WireResponse};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteBooster {
    pub booster_key: String,
    pub is_owned: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteQuest {
    pub quest_key: String,
    pub is_claimed: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteDaily {
    pub status: DailyStatus,
    pub progress: i64,
    pub target: i64,
}

/// Authoritative per-user rows as served by `GET /gamestate/{userId}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteGameState {
    pub boosters: Vec<RemoteBooster>,
    pub quests: Vec<RemoteQuest>,
    pub daily: Option<RemoteDaily>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardRow {
    pub user_id: String,
    pub display_name: String,
    pub total_xp: i64,
    pub coins: i64,
    pub streak_days: i64,
}

pub struct RemoteSyncClient {
    transport: Box<dyn Transport>,
    user_id: String,
    /// Bearer token; equals the user id in the current scheme.
    token: String,
}

impl RemoteSyncClient {
    pub fn new(transport: Box<dyn Transport>, user_id: &str, token: &str) -> Self {
        Self {
            transport,
            user_id: user_id.to_string(),
            token: token.to_string(),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    fn send_ok(&self, req: WireRequest, what: &str) -> Result<JsonValue, SyncError> {
        let resp = self.transport.send(&req)?;
        map_status(resp, what)
    }

    pub fn fetch_game_state(&self) -> Result<RemoteGameState, SyncError> {
        let body = self.send_ok(
            WireRequest::get(format!("/gamestate/{}", self.user_id), &self.token),
            "fetch game state",
        )?;
        serde_json::from_value(body).map_err(SyncError::SerdeJsonError)
    }

    pub fn push_booster(&self, booster_key: &str, owned: bool) -> Result<(), SyncError> {
        self.send_ok(
            WireRequest::post(
                format!("/gamestate/{}/booster", self.user_id),
                &self.token,
                serde_json::json!({ "boosterKey": booster_key, "owned": owned }),
            ),
            "push booster",
        )?;
        Ok(())
    }

    pub fn push_quest(&self, quest_key: &str, claimed: bool) -> Result<(), SyncError> {
        self.send_ok(
            WireRequest::post(
                format!("/gamestate/{}/quest", self.user_id),
                &self.token,
                serde_json::json!({ "questKey": quest_key, "claimed": claimed }),
            ),
            "push quest",
        )?;
        Ok(())
    }

    pub fn push_daily(&self, state: DailyChallengeState) -> Result<(), SyncError> {
        self.send_ok(
            WireRequest::post(
                format!("/gamestate/{}/daily", self.user_id),
                &self.token,
                serde_json::json!({
                    "status": state.status.as_str(),
                    "progress": state.progress,
                    "target": state.target
                }),
            ),
            "push daily",
        )?;
        Ok(())
    }

    /// Dispatch a queued mutation to its endpoint.
    pub fn push_mutation(&self, payload: &MutationPayload) -> Result<(), SyncError> {
        match payload {
            MutationPayload::Booster { booster_key, owned } => {
                self.push_booster(booster_key, *owned)
            }
            MutationPayload::Quest { quest_key, claimed } => self.push_quest(quest_key, *claimed),
            MutationPayload::Daily {
                status,
                progress,
                target,
            } => self.push_daily(DailyChallengeState {
                status: *status,
                progress: *progress,
                target: *target,
            }),
        }
    }

    pub fn fetch_leaderboard(&self, limit: usize) -> Result<Vec<LeaderboardRow>, SyncError> {
        let body = self.send_ok(
            WireRequest::get(format!("/leaderboard?limit={}", limit), &self.token),
            "fetch leaderboard",
        )?;
        serde_json::from_value(body).map_err(SyncError::SerdeJsonError)
    }

    pub fn push_profile(&self, wallet: &Wallet) -> Result<(), SyncError> {
        self.send_ok(
            WireRequest::post(
                format!("/profile/{}", self.user_id),
                &self.token,
                serde_json::json!({
                    "displayName": wallet.display_name,
                    "coins": wallet.coins,
                    "totalXp": wallet.total_xp,
                    "streakDays": wallet.streak_days
                }),
            ),
            "push profile",
        )?;
        Ok(())
    }

    /// Returns the server-side row id.
    pub fn push_progress(&self, rec: &ProgressRecord) -> Result<String, SyncError> {
        let body = serde_json::to_value(rec)?;
        let resp = self.send_ok(
            WireRequest::post("/progress", &self.token, body),
            "push progress",
        )?;
        resp.get("id")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| SyncError::ValidationError("progress response missing id".to_string()))
    }

    pub fn fetch_progress(&self) -> Result<Vec<ProgressRecord>, SyncError> {
        let body = self.send_ok(
            WireRequest::get(format!("/progress/{}", self.user_id), &self.token),
            "fetch progress",
        )?;
        serde_json::from_value(body).map_err(SyncError::SerdeJsonError)
    }

    pub fn push_achievement(&self, rec: &AchievementRecord) -> Result<(), SyncError> {
        self.send_ok(
            WireRequest::post(
                format!("/achievements/{}", self.user_id),
                &self.token,
                serde_json::json!({
                    "achievementKey": rec.achievement_key,
                    "unlockedAt": rec.unlocked_at
                }),
            ),
            "push achievement",
        )?;
        Ok(())
    }

    pub fn fetch_achievements(&self) -> Result<Vec<AchievementRecord>, SyncError> {
        let body = self.send_ok(
            WireRequest::get(format!("/achievements/{}", self.user_id), &self.token),
            "fetch achievements",
        )?;
        serde_json::from_value(body).map_err(SyncError::SerdeJsonError)
    }
}

/// Map a wire status into the error taxonomy. 401/403 never retry or queue;
/// other 4xx are terminal protocol errors; 5xx is transient (normally already
/// converted by the retrying transport, mapped here again for unwrapped
/// transports).
fn map_status(resp: WireResponse, what: &str) -> Result<JsonValue, SyncError> {
    let message = resp
        .body
        .get("error")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();
    match resp.status {
        200 | 201 => Ok(resp.body),
        401 | 403 => Err(SyncError::AuthorizationError(format!(
            "{}: {}",
            what, message
        ))),
        404 => Err(SyncError::NotFound(format!("{}: {}", what, message))),
        s if s >= 500 => Err(SyncError::ServerError(format!(
            "{} returned {}: {}",
            what, s, message
        ))),
        s => Err(SyncError::ProtocolError {
            status: s,
            message: format!("{}: {}", what, message),
        }),
    }
}
