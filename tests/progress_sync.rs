//! All-or-nothing progress/achievement snapshot sync.

use lexisync::core::client::RemoteSyncClient;
use lexisync::core::error::SyncError;
use lexisync::core::journal::SyncJournal;
use lexisync::core::progress::{
    self, ProgressRecord, ProgressSyncCoordinator,
};
use lexisync::core::server::RemoteGameStateService;
use lexisync::core::state::LocalStateStore;
use lexisync::core::time;
use lexisync::core::transport::{
    RetryPolicy, RetryingTransport, Transport, WireRequest, WireResponse,
};
use std::path::Path;
use tempfile::TempDir;

const USER: &str = "user-1";

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

fn store(root: &Path) -> LocalStateStore {
    let store = LocalStateStore::open(root).expect("open store");
    store.ensure_wallet(USER, "Ada").expect("wallet");
    store
}

fn record(lesson: &str, word: Option<&str>, score: i64) -> ProgressRecord {
    ProgressRecord {
        id: time::new_event_id(),
        user_id: USER.to_string(),
        lesson_id: lesson.to_string(),
        word_id: word.map(|w| w.to_string()),
        is_completed: true,
        score,
        accuracy: 0.9,
        time_spent: 30,
        attempts: 1,
        correct_answers: 9,
        wrong_answers: 1,
        xp_earned: 20,
        coins_earned: 5,
        review_count: 0,
        ease_factor: 2.5,
    }
}

fn online_coordinator(root: &Path) -> ProgressSyncCoordinator {
    let service = RemoteGameStateService::open(root).expect("open service");
    let client = RemoteSyncClient::new(
        Box::new(RetryingTransport::with_policy(service, fast_policy())),
        USER,
        USER,
    );
    ProgressSyncCoordinator::new(store(root), client, SyncJournal::new(root))
}

fn offline_coordinator(root: &Path) -> ProgressSyncCoordinator {
    let client = RemoteSyncClient::new(
        Box::new(RetryingTransport::with_policy(OfflineTransport, fast_policy())),
        USER,
        USER,
    );
    ProgressSyncCoordinator::new(store(root), client, SyncJournal::new(root))
}

#[test]
fn offline_sync_fails_and_leaves_local_records_untouched() {
    let tmp = TempDir::new().expect("tempdir");
    let root = tmp.path();

    let local = store(root);
    let rec = record("lesson-1", Some("hola"), 80);
    progress::record_progress(&local, &rec).expect("record");
    progress::unlock_achievement(&local, "first_lesson").expect("unlock");

    let mut coordinator = offline_coordinator(root);
    let err = coordinator.sync_now().expect_err("offline must fail");
    assert!(matches!(err, SyncError::TransientNetwork(_)));

    // Nothing was replaced: the pre-sync rows survive with their ids.
    let rows = progress::list_progress(&local).expect("list");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, rec.id);
    assert_eq!(progress::list_achievements(&local).expect("list").len(), 1);
}

#[test]
fn sync_replaces_local_rows_with_the_canonical_remote_copy() {
    let tmp = TempDir::new().expect("tempdir");
    let root = tmp.path();

    let local = store(root);
    progress::record_progress(&local, &record("lesson-1", Some("hola"), 80)).expect("record");
    progress::record_progress(&local, &record("lesson-1", Some("adios"), 95)).expect("record");
    progress::unlock_achievement(&local, "first_lesson").expect("unlock");

    let mut coordinator = online_coordinator(root);
    coordinator.sync_now().expect("sync");

    let rows = progress::list_progress(&local).expect("list");
    assert_eq!(rows.len(), 2);
    // Ids are now the server-assigned ones and stay stable on the next sync.
    let ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
    coordinator.sync_now().expect("second sync");
    let rows = progress::list_progress(&local).expect("list");
    assert_eq!(rows.len(), 2, "a replayed sync must not multiply rows");
    let ids_after: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
    assert_eq!(ids, ids_after);

    let achievements = progress::list_achievements(&local).expect("list");
    assert_eq!(achievements.len(), 1);
    assert_eq!(achievements[0].achievement_key, "first_lesson");
}

#[test]
fn sync_pushes_the_profile_onto_the_leaderboard() {
    let tmp = TempDir::new().expect("tempdir");
    let root = tmp.path();

    let local = store(root);
    local.credit_wallet(40, 350).expect("credit");

    let mut coordinator = online_coordinator(root);
    coordinator.sync_now().expect("sync");

    let service = RemoteGameStateService::open(root).expect("open service");
    let resp = service
        .send(&WireRequest::get("/leaderboard", USER))
        .expect("loopback");
    let rows = resp.body.as_array().expect("rows");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["userId"], USER);
    assert_eq!(rows[0]["displayName"], "Ada");
    assert_eq!(rows[0]["totalXp"], 350);
    assert_eq!(rows[0]["coins"], 40);
}

#[test]
fn sync_pulls_rows_pushed_by_another_device() {
    let tmp = TempDir::new().expect("tempdir");
    let root = tmp.path();

    // Another device already synced one lesson for this user.
    let service = RemoteGameStateService::open(root).expect("open service");
    let resp = service
        .send(&WireRequest::post(
            "/progress",
            USER,
            serde_json::json!({ "userId": USER, "lessonId": "lesson-9", "score": 70 }),
        ))
        .expect("loopback");
    assert_eq!(resp.status, 200);

    let local = store(root);
    let mut coordinator = online_coordinator(root);
    coordinator.sync_now().expect("sync");

    let rows = progress::list_progress(&local).expect("list");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].lesson_id, "lesson-9");
    assert_eq!(rows[0].score, 70);
    assert_eq!(rows[0].word_id, None);
}
