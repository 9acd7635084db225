//! The economy coordinator: guard-checked optimistic mutations with
//! queue-on-failure propagation and monotonic reconciliation.
//!
//! Every economy action follows the same machine:
//! guard against the local snapshot → apply locally (durable) → attempt the
//! remote push → on transient failure, enqueue for replay. Guard failures are
//! terminal and touch nothing. A failed push after a successful local apply
//! never rolls local state back; once the device is online again, local state
//! is the eventual truth.
//!
//! All mutation entry points take `&mut self`: one coordinator per user
//! session is the single sequential execution context, so two in-flight
//! purchases can never read the same stale balance.

use crate::core::client::RemoteSyncClient;
use crate::core::error::SyncError;
use crate::core::journal::SyncJournal;
use crate::core::queue::{DrainDisposition, DrainOutcome, MutationPayload, PendingMutationQueue};
use crate::core::state::{DailyChallengeState, DailyStatus, LocalStateStore};

/// How a guard-passing action left the remote side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// Remote acknowledged during the call.
    Synced,
    /// Remote unreachable; the mutation is durably queued for replay.
    Queued,
}

pub struct GameEconomyCoordinator {
    store: LocalStateStore,
    queue: PendingMutationQueue,
    client: RemoteSyncClient,
    journal: SyncJournal,
}

impl GameEconomyCoordinator {
    pub fn new(
        store: LocalStateStore,
        queue: PendingMutationQueue,
        client: RemoteSyncClient,
        journal: SyncJournal,
    ) -> Self {
        Self {
            store,
            queue,
            client,
            journal,
        }
    }

    pub fn store(&self) -> &LocalStateStore {
        &self.store
    }

    pub fn queue(&self) -> &PendingMutationQueue {
        &self.queue
    }

    /// Push a locally applied mutation; queue it if the transport gave up.
    /// Authorization and protocol failures surface to the caller without
    /// queueing (they will not self-heal by retrying), but the optimistic
    /// local state stays.
    fn propagate(&mut self, op: &str, payload: MutationPayload) -> Result<PushOutcome, SyncError> {
        let key = payload.key().to_string();
        match self.client.push_mutation(&payload) {
            Ok(()) => {
                self.journal.record(op, &key, "acked", None)?;
                Ok(PushOutcome::Synced)
            }
            Err(e) if e.is_transient() => {
                self.queue.enqueue(payload)?;
                self.journal.record(op, &key, "queued", Some(&e.to_string()))?;
                Ok(PushOutcome::Queued)
            }
            Err(e) => {
                self.journal.record(op, &key, "dropped", Some(&e.to_string()))?;
                Err(e)
            }
        }
    }

    /// Guard: not already owned, and the wallet covers the cost.
    pub fn purchase_booster(
        &mut self,
        booster_key: &str,
        cost: i64,
    ) -> Result<PushOutcome, SyncError> {
        if cost < 0 {
            return Err(SyncError::ValidationError(
                "booster cost must be non-negative".to_string(),
            ));
        }
        let snap = self.store.snapshot()?;
        if snap.booster_owned(booster_key) {
            return Err(SyncError::ValidationError(format!(
                "booster already owned: {}",
                booster_key
            )));
        }
        if snap.wallet.coins < cost {
            return Err(SyncError::ValidationError(format!(
                "insufficient coins: have {}, need {}",
                snap.wallet.coins, cost
            )));
        }

        self.store.debit_coins(cost)?;
        self.store.set_booster_owned(booster_key, true)?;
        self.journal.record(
            "booster.purchase",
            booster_key,
            "applied",
            Some(&format!("cost={}", cost)),
        )?;

        self.propagate(
            "booster.purchase",
            MutationPayload::Booster {
                booster_key: booster_key.to_string(),
                owned: true,
            },
        )
    }

    /// Guard: quest completed and not yet claimed.
    pub fn claim_quest(&mut self, quest_key: &str, reward: i64) -> Result<PushOutcome, SyncError> {
        let snap = self.store.snapshot()?;
        let quest = snap.quest(quest_key);
        match quest {
            Some(q) if q.claimed => {
                return Err(SyncError::ValidationError(format!(
                    "quest already claimed: {}",
                    quest_key
                )));
            }
            Some(q) if q.completed => {}
            _ => {
                return Err(SyncError::ValidationError(format!(
                    "quest not completed: {}",
                    quest_key
                )));
            }
        }

        self.store.credit_wallet(reward, 0)?;
        self.store.set_quest(quest_key, None, Some(true))?;
        self.journal.record(
            "quest.claim",
            quest_key,
            "applied",
            Some(&format!("reward={}", reward)),
        )?;

        self.propagate(
            "quest.claim",
            MutationPayload::Quest {
                quest_key: quest_key.to_string(),
                claimed: true,
            },
        )
    }

    /// Local-only: the lesson flow reports quest completion; claiming is a
    /// separate user action with its own push.
    pub fn mark_quest_completed(&mut self, quest_key: &str) -> Result<(), SyncError> {
        self.store.set_quest(quest_key, Some(true), None)?;
        self.journal
            .record("quest.complete", quest_key, "applied", None)?;
        Ok(())
    }

    /// Guard: no daily challenge currently in progress.
    pub fn start_daily(&mut self, target: i64) -> Result<PushOutcome, SyncError> {
        if let Some(daily) = self.store.daily()? {
            if daily.status == DailyStatus::InProgress {
                return Err(SyncError::ValidationError(
                    "daily challenge already in progress".to_string(),
                ));
            }
        }

        let state = DailyChallengeState {
            status: DailyStatus::InProgress,
            progress: 0,
            target,
        };
        self.store.set_daily(state)?;
        self.journal.record(
            "daily.start",
            "daily",
            "applied",
            Some(&format!("target={}", target)),
        )?;

        self.propagate(
            "daily.start",
            MutationPayload::Daily {
                status: state.status,
                progress: state.progress,
                target: state.target,
            },
        )
    }

    /// Guard: a daily challenge is in progress. Credits the reward and jumps
    /// the cycle to CLAIMED with progress = target.
    pub fn submit_daily(&mut self, reward: i64) -> Result<PushOutcome, SyncError> {
        let daily = self.store.daily()?.ok_or_else(|| {
            SyncError::ValidationError("no daily challenge started".to_string())
        })?;
        if daily.status != DailyStatus::InProgress {
            return Err(SyncError::ValidationError(format!(
                "daily challenge not in progress (status {})",
                daily.status.as_str()
            )));
        }

        self.store.credit_wallet(reward, 0)?;
        let state = DailyChallengeState {
            status: DailyStatus::Claimed,
            progress: daily.target,
            target: daily.target,
        };
        self.store.set_daily(state)?;
        self.journal.record(
            "daily.submit",
            "daily",
            "applied",
            Some(&format!("reward={}", reward)),
        )?;

        self.propagate(
            "daily.submit",
            MutationPayload::Daily {
                status: state.status,
                progress: state.progress,
                target: state.target,
            },
        )
    }

    /// Credit XP/coins earned by a finished lesson into the wallet.
    pub fn record_lesson_result(&mut self, xp: i64, coins: i64) -> Result<(), SyncError> {
        self.store.credit_wallet(coins, xp)?;
        self.journal.record(
            "lesson.result",
            "wallet",
            "applied",
            Some(&format!("xp={} coins={}", xp, coins)),
        )?;
        Ok(())
    }

    /// Pull the remote snapshot and merge it into local state with monotonic
    /// rules: flags OR, daily status by total order, progress by max. Local
    /// progress is never regressed by a stale remote read. Must run before
    /// new user actions on load so guards do not act on stale state.
    pub fn reconcile(&mut self) -> Result<(), SyncError> {
        let remote = self.client.fetch_game_state()?;

        for booster in &remote.boosters {
            // Store-level OR: a remote false never clears a local true, and
            // unseen keys get created on first observation.
            self.store
                .set_booster_owned(&booster.booster_key, booster.is_owned)?;
        }
        for quest in &remote.quests {
            self.store
                .set_quest(&quest.quest_key, None, Some(quest.is_claimed))?;
        }

        if let Some(remote_daily) = remote.daily {
            let merged = match self.store.daily()? {
                None => DailyChallengeState {
                    status: remote_daily.status,
                    progress: remote_daily.progress,
                    target: remote_daily.target,
                },
                Some(local) => DailyChallengeState {
                    status: local.status.max(remote_daily.status),
                    progress: local.progress.max(remote_daily.progress),
                    target: local.target.max(remote_daily.target),
                },
            };
            self.store.set_daily(merged)?;
        }

        self.journal.record(
            "reconcile",
            self.client.user_id(),
            "acked",
            Some(&format!(
                "boosters={} quests={}",
                remote.boosters.len(),
                remote.quests.len()
            )),
        )?;
        Ok(())
    }

    /// Reconcile, treating an unreachable remote as a no-op instead of an
    /// error so offline cold starts still accept actions. Returns whether a
    /// merge happened.
    pub fn reconcile_if_reachable(&mut self) -> Result<bool, SyncError> {
        match self.reconcile() {
            Ok(()) => Ok(true),
            Err(e) if e.is_transient() => {
                self.journal
                    .record("reconcile", self.client.user_id(), "noop", Some(&e.to_string()))?;
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Replay queued mutations in FIFO order. Acknowledged entries are
    /// removed; transient failures stay for the next drain; authorization
    /// failures are dropped (a stale identity will not self-heal by
    /// retrying). Serialized by the queue's drain lock.
    pub fn drain_pending(&mut self) -> Result<DrainOutcome, SyncError> {
        let client = &self.client;
        let mut events: Vec<(String, &'static str, Option<String>)> = Vec::new();

        let outcome = self.queue.drain(|m| {
            let key = m.payload.key().to_string();
            match client.push_mutation(&m.payload) {
                Ok(()) => {
                    events.push((key, "acked", None));
                    DrainDisposition::Remove
                }
                Err(e @ SyncError::AuthorizationError(_)) => {
                    events.push((key, "dropped", Some(e.to_string())));
                    DrainDisposition::Remove
                }
                Err(e) => {
                    events.push((key, "failed", Some(e.to_string())));
                    DrainDisposition::Keep
                }
            }
        })?;

        for (key, status, detail) in &events {
            self.journal
                .record("queue.drain", key, status, detail.as_deref())?;
        }
        if let DrainOutcome::Completed { drained, remaining } = outcome {
            self.journal.record(
                "queue.drain",
                self.client.user_id(),
                "completed",
                Some(&format!("drained={} remaining={}", drained, remaining)),
            )?;
        }
        Ok(outcome)
    }
}
