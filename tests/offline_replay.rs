//! End-to-end offline purchase → queue → replay scenarios.

use lexisync::core::client::RemoteSyncClient;
use lexisync::core::economy::{GameEconomyCoordinator, PushOutcome};
use lexisync::core::error::SyncError;
use lexisync::core::journal::SyncJournal;
use lexisync::core::queue::{DrainOutcome, PendingMutationQueue};
use lexisync::core::server::RemoteGameStateService;
use lexisync::core::state::LocalStateStore;
use lexisync::core::transport::{
    RetryPolicy, RetryingTransport, Transport, WireRequest, WireResponse,
};
use std::path::Path;
use tempfile::TempDir;

const USER: &str = "user-1";

/// Simulates a device with no connectivity.
struct OfflineTransport;

impl Transport for OfflineTransport {
    fn send(&self, _req: &WireRequest) -> Result<WireResponse, SyncError> {
        Err(SyncError::TransientNetwork("connection refused".to_string()))
    }
}

fn fast_policy() -> RetryPolicy {
    RetryPolicy {
        max_retries: 3,
        base_ms: 0,
        cap_ms: 0,
    }
}

fn device(root: &Path, starting_coins: i64) -> (LocalStateStore, PendingMutationQueue) {
    let store = LocalStateStore::open(root).expect("open store");
    store.ensure_wallet(USER, "Ada").expect("wallet");
    if starting_coins > 0 {
        store.credit_wallet(starting_coins, 0).expect("credit");
    }
    let queue = PendingMutationQueue::open(root).expect("open queue");
    (store, queue)
}

fn offline_coordinator(root: &Path, starting_coins: i64) -> GameEconomyCoordinator {
    let (store, queue) = device(root, starting_coins);
    let client = RemoteSyncClient::new(
        Box::new(RetryingTransport::with_policy(OfflineTransport, fast_policy())),
        USER,
        USER,
    );
    GameEconomyCoordinator::new(store, queue, client, SyncJournal::new(root))
}

fn online_coordinator(root: &Path) -> GameEconomyCoordinator {
    let store = LocalStateStore::open(root).expect("open store");
    let queue = PendingMutationQueue::open(root).expect("open queue");
    let service = RemoteGameStateService::open(root).expect("open service");
    let client = RemoteSyncClient::new(
        Box::new(RetryingTransport::with_policy(service, fast_policy())),
        USER,
        USER,
    );
    GameEconomyCoordinator::new(store, queue, client, SyncJournal::new(root))
}

#[test]
fn offline_purchase_queues_then_replays_to_the_remote() {
    let tmp = TempDir::new().expect("tempdir");
    let root = tmp.path();

    // Offline: the optimistic apply succeeds, the push lands in the queue.
    let mut coordinator = offline_coordinator(root, 150);
    let outcome = coordinator
        .purchase_booster("DoubleXP", 120)
        .expect("guard passes");
    assert_eq!(outcome, PushOutcome::Queued);

    let snap = coordinator.store().snapshot().expect("snapshot");
    assert_eq!(snap.wallet.coins, 30);
    assert!(snap.booster_owned("DoubleXP"));
    assert_eq!(coordinator.queue().len().expect("len"), 1);
    drop(coordinator);

    // Connectivity returns (fresh process): the drain empties the queue.
    let mut coordinator = online_coordinator(root);
    let outcome = coordinator.drain_pending().expect("drain");
    assert_eq!(
        outcome,
        DrainOutcome::Completed {
            drained: 1,
            remaining: 0
        }
    );

    // The remote now reports ownership.
    let remote = coordinator.reconcile();
    assert!(remote.is_ok());
    let service = RemoteGameStateService::open(root).expect("open service");
    let resp = service
        .send(&WireRequest::get(format!("/gamestate/{}", USER), USER))
        .expect("loopback");
    assert_eq!(resp.status, 200);
    let boosters = resp.body["boosters"].as_array().expect("boosters");
    assert_eq!(boosters.len(), 1);
    assert_eq!(boosters[0]["boosterKey"], "DoubleXP");
    assert_eq!(boosters[0]["isOwned"], true);
}

#[test]
fn insufficient_coins_fails_validation_and_mutates_nothing() {
    let tmp = TempDir::new().expect("tempdir");
    let mut coordinator = offline_coordinator(tmp.path(), 50);

    let err = coordinator
        .purchase_booster("MegaBoost", 200)
        .expect_err("guard must fail");
    assert!(matches!(err, SyncError::ValidationError(_)));

    let snap = coordinator.store().snapshot().expect("snapshot");
    assert_eq!(snap.wallet.coins, 50);
    assert!(!snap.booster_owned("MegaBoost"));
    assert_eq!(coordinator.queue().len().expect("len"), 0);
}

#[test]
fn double_purchase_fails_validation_without_queueing() {
    let tmp = TempDir::new().expect("tempdir");
    let mut coordinator = online_coordinator(tmp.path());
    coordinator.store().ensure_wallet(USER, "Ada").expect("wallet");
    coordinator.store().credit_wallet(300, 0).expect("credit");

    coordinator
        .purchase_booster("DoubleXP", 100)
        .expect("first purchase");
    let err = coordinator
        .purchase_booster("DoubleXP", 100)
        .expect_err("already owned");
    assert!(matches!(err, SyncError::ValidationError(_)));

    let snap = coordinator.store().snapshot().expect("snapshot");
    assert_eq!(snap.wallet.coins, 200, "only one debit happened");
    assert_eq!(coordinator.queue().len().expect("len"), 0);
}

#[test]
fn offline_quest_and_daily_flows_queue_in_order_and_replay() {
    let tmp = TempDir::new().expect("tempdir");
    let root = tmp.path();

    let mut coordinator = offline_coordinator(root, 0);
    coordinator.mark_quest_completed("first_week").expect("complete");
    assert_eq!(
        coordinator.claim_quest("first_week", 40).expect("claim"),
        PushOutcome::Queued
    );
    assert_eq!(coordinator.start_daily(5).expect("start"), PushOutcome::Queued);
    assert_eq!(coordinator.submit_daily(25).expect("submit"), PushOutcome::Queued);
    assert_eq!(coordinator.queue().len().expect("len"), 3);
    assert_eq!(coordinator.store().wallet().expect("wallet").coins, 65);

    // Replay preserves issue order: quest claim, daily start, daily submit.
    let entries = coordinator.queue().entries().expect("entries");
    assert_eq!(entries[0].payload.key(), "first_week");
    assert_eq!(entries[1].payload.key(), "daily");
    assert_eq!(entries[2].payload.key(), "daily");
    drop(coordinator);

    let mut coordinator = online_coordinator(root);
    let outcome = coordinator.drain_pending().expect("drain");
    assert_eq!(
        outcome,
        DrainOutcome::Completed {
            drained: 3,
            remaining: 0
        }
    );

    let service = RemoteGameStateService::open(root).expect("open service");
    let resp = service
        .send(&WireRequest::get(format!("/gamestate/{}", USER), USER))
        .expect("loopback");
    assert_eq!(resp.body["quests"][0]["questKey"], "first_week");
    assert_eq!(resp.body["quests"][0]["isClaimed"], true);
    assert_eq!(resp.body["daily"]["status"], "CLAIMED");
    assert_eq!(resp.body["daily"]["progress"], 5);
}

#[test]
fn quest_claim_requires_completion() {
    let tmp = TempDir::new().expect("tempdir");
    let mut coordinator = offline_coordinator(tmp.path(), 0);

    let err = coordinator
        .claim_quest("untouched", 40)
        .expect_err("not completed");
    assert!(matches!(err, SyncError::ValidationError(_)));
    assert_eq!(coordinator.store().wallet().expect("wallet").coins, 0);
    assert_eq!(coordinator.queue().len().expect("len"), 0);
}

#[test]
fn authorization_failure_is_surfaced_and_never_queued() {
    let tmp = TempDir::new().expect("tempdir");
    let root = tmp.path();
    let (store, queue) = device(root, 200);

    // Token does not match the user id: the service answers 401.
    let service = RemoteGameStateService::open(root).expect("open service");
    let client = RemoteSyncClient::new(
        Box::new(RetryingTransport::with_policy(service, fast_policy())),
        USER,
        "someone-else",
    );
    let mut coordinator =
        GameEconomyCoordinator::new(store, queue, client, SyncJournal::new(root));

    let err = coordinator
        .purchase_booster("DoubleXP", 100)
        .expect_err("401 surfaces");
    assert!(matches!(err, SyncError::AuthorizationError(_)));
    // Optimistic local state stays; nothing is queued.
    let snap = coordinator.store().snapshot().expect("snapshot");
    assert!(snap.booster_owned("DoubleXP"));
    assert_eq!(coordinator.queue().len().expect("len"), 0);
}

#[test]
fn drain_drops_entries_a_stale_identity_can_never_deliver() {
    let tmp = TempDir::new().expect("tempdir");
    let root = tmp.path();

    let mut coordinator = offline_coordinator(root, 150);
    coordinator.purchase_booster("DoubleXP", 120).expect("queued");
    assert_eq!(coordinator.queue().len().expect("len"), 1);
    drop(coordinator);

    let store = LocalStateStore::open(root).expect("open store");
    let queue = PendingMutationQueue::open(root).expect("open queue");
    let service = RemoteGameStateService::open(root).expect("open service");
    let client = RemoteSyncClient::new(
        Box::new(RetryingTransport::with_policy(service, fast_policy())),
        USER,
        "stale-token",
    );
    let mut coordinator =
        GameEconomyCoordinator::new(store, queue, client, SyncJournal::new(root));

    let outcome = coordinator.drain_pending().expect("drain");
    assert_eq!(
        outcome,
        DrainOutcome::Completed {
            drained: 1,
            remaining: 0
        },
        "unauthorized entries are dropped, not retried forever"
    );
}

#[test]
fn transient_drain_failure_keeps_entries_for_the_next_drain() {
    let tmp = TempDir::new().expect("tempdir");
    let root = tmp.path();

    let mut coordinator = offline_coordinator(root, 150);
    coordinator.purchase_booster("DoubleXP", 120).expect("queued");
    drop(coordinator);

    // Still offline: the drain runs but removes nothing.
    let mut coordinator = offline_coordinator(root, 0);
    let outcome = coordinator.drain_pending().expect("drain");
    assert_eq!(
        outcome,
        DrainOutcome::Completed {
            drained: 0,
            remaining: 1
        }
    );
}
