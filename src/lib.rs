//! lexisync: offline-first sync for gamified language-learning state.
//!
//! The engine keeps a device-local copy of a user's gamification state
//! (boosters, quest claims, daily challenge, XP/coin wallet, lesson progress,
//! achievements) consistent with an authoritative remote service under
//! unreliable network conditions.
//!
//! # Core principles
//!
//! - **Local-first**: every user action lands durably in SQLite before any
//!   network round trip; reads never block on the network
//! - **Optimistic**: guard-passing actions succeed immediately; remote
//!   propagation happens after, with bounded retry
//! - **No lost mutation**: pushes that exhaust their retries become durable
//!   queue entries, replayed in order until the remote acknowledges them
//! - **Monotonic**: unlock flags never revert, daily-challenge state never
//!   regresses, coins never go negative
//! - **At-least-once**: the service absorbs replays with idempotent upserts
//!
//! # Architecture
//!
//! [`core::state::LocalStateStore`] and [`core::queue::PendingMutationQueue`]
//! own the device tier. [`core::economy::GameEconomyCoordinator`] is the
//! primary state machine: guard → optimistic apply → push → queue-on-failure,
//! plus monotonic reconciliation on load. [`core::progress`] syncs the
//! profile/progress/achievement snapshot all-or-nothing.
//! [`core::server::RemoteGameStateService`] is the authoritative side,
//! reached through [`core::transport::RetryingTransport`].
//!
//! Every mutation attempt and queue transition is recorded in an append-only
//! JSONL journal (`sync.events.jsonl`); `lexisync events` renders it.

pub mod core;

use core::client::RemoteSyncClient;
use core::config::{self, DeviceConfig, RetryConfig};
use core::economy::{GameEconomyCoordinator, PushOutcome};
use core::error::SyncError;
use core::journal::SyncJournal;
use core::progress::{self, ProgressRecord, ProgressSyncCoordinator};
use core::queue::{DrainOutcome, PendingMutationQueue};
use core::server::RemoteGameStateService;
use core::state::LocalStateStore;
use core::time;
use core::transport::RetryingTransport;

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[clap(
    name = "lexisync",
    version = env!("CARGO_PKG_VERSION"),
    about = "Offline-first sync engine for gamified language-learning state"
)]
struct Cli {
    /// Store root directory (device db, service db, config, journal).
    #[clap(long, global = true, default_value = ".lexisync")]
    root: PathBuf,
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Initialize the store root and device identity.
    Init {
        /// User id; doubles as the bearer token in the current scheme.
        #[clap(long)]
        user: String,
        #[clap(long, default_value = "")]
        name: String,
    },
    /// Show the local snapshot and queue depth.
    Status {
        /// Output format: 'text' or 'json'.
        #[clap(long, default_value = "text")]
        format: String,
    },
    /// Booster economy actions.
    Booster {
        #[clap(subcommand)]
        command: BoosterCommand,
    },
    /// Quest completion and claims.
    Quest {
        #[clap(subcommand)]
        command: QuestCommand,
    },
    /// Daily challenge lifecycle.
    Daily {
        #[clap(subcommand)]
        command: DailyCommand,
    },
    /// Record a finished lesson (progress row + wallet credit).
    Lesson {
        #[clap(subcommand)]
        command: LessonCommand,
    },
    /// Unlock an achievement locally.
    Achievement {
        #[clap(subcommand)]
        command: AchievementCommand,
    },
    /// Reconcile, drain the pending queue, and sync progress snapshots.
    Sync,
    /// Show the leaderboard.
    Leaderboard {
        #[clap(long, default_value = "10")]
        limit: usize,
    },
    /// Show recent sync journal events.
    Events {
        #[clap(long, default_value = "20")]
        tail: usize,
    },
}

#[derive(Subcommand, Debug)]
enum BoosterCommand {
    /// Purchase a booster (guard: not owned, coins >= cost).
    Buy {
        #[clap(value_name = "KEY")]
        key: String,
        #[clap(long)]
        cost: i64,
    },
}

#[derive(Subcommand, Debug)]
enum QuestCommand {
    /// Mark a quest completed (local flag set by the lesson flow).
    Complete {
        #[clap(value_name = "KEY")]
        key: String,
    },
    /// Claim a completed quest's reward.
    Claim {
        #[clap(value_name = "KEY")]
        key: String,
        #[clap(long)]
        reward: i64,
    },
}

#[derive(Subcommand, Debug)]
enum DailyCommand {
    /// Start today's challenge.
    Start {
        #[clap(long)]
        target: i64,
    },
    /// Submit the running challenge and claim its reward.
    Submit {
        #[clap(long)]
        reward: i64,
    },
}

#[derive(Subcommand, Debug)]
enum LessonCommand {
    /// Record one finished lesson.
    Record {
        #[clap(long)]
        lesson: String,
        #[clap(long)]
        word: Option<String>,
        #[clap(long, default_value = "0")]
        score: i64,
        #[clap(long, default_value = "0")]
        accuracy: f64,
        #[clap(long, default_value = "0")]
        time_spent: i64,
        #[clap(long, default_value = "1")]
        attempts: i64,
        #[clap(long, default_value = "0")]
        correct: i64,
        #[clap(long, default_value = "0")]
        wrong: i64,
        #[clap(long, default_value = "0")]
        xp: i64,
        #[clap(long, default_value = "0")]
        coins: i64,
    },
}

#[derive(Subcommand, Debug)]
enum AchievementCommand {
    Unlock {
        #[clap(value_name = "KEY")]
        key: String,
    },
}

/// Wire the full device stack for one invocation: store, queue, retrying
/// loopback transport to the service tier, typed client, journal. No ambient
/// globals; everything is constructed here and passed by value.
fn build_coordinator(root: &Path) -> Result<(DeviceConfig, GameEconomyCoordinator), SyncError> {
    let config = config::load_config(root)?;
    let store = LocalStateStore::open(root)?;
    store.ensure_wallet(&config.user_id, &config.display_name)?;
    let queue = PendingMutationQueue::open(root)?;
    let client = build_client(root, &config)?;
    let journal = SyncJournal::new(root);
    Ok((
        config,
        GameEconomyCoordinator::new(store, queue, client, journal),
    ))
}

fn build_client(root: &Path, config: &DeviceConfig) -> Result<RemoteSyncClient, SyncError> {
    let service = RemoteGameStateService::open(root)?;
    let transport = RetryingTransport::with_policy(service, config.retry.policy());
    Ok(RemoteSyncClient::new(
        Box::new(transport),
        &config.user_id,
        &config.user_id,
    ))
}

fn describe_outcome(outcome: PushOutcome) -> String {
    match outcome {
        PushOutcome::Synced => "synced".green().to_string(),
        PushOutcome::Queued => "queued (will replay on next sync)".yellow().to_string(),
    }
}

pub fn run() -> Result<(), SyncError> {
    let cli = Cli::parse();
    let root = cli.root.clone();

    match cli.command {
        Command::Init { user, name } => {
            let config = DeviceConfig {
                user_id: user.clone(),
                display_name: name,
                retry: RetryConfig::default(),
            };
            config::write_config(&root, &config)?;
            let store = LocalStateStore::open(&root)?;
            store.ensure_wallet(&config.user_id, &config.display_name)?;
            RemoteGameStateService::open(&root)?;
            println!("Initialized lexisync store for {} at {}", user, root.display());
            Ok(())
        }
        Command::Status { format } => {
            let (_config, coordinator) = build_coordinator(&root)?;
            let snap = coordinator.store().snapshot()?;
            let pending = coordinator.queue().len()?;
            if format == "json" {
                let envelope = time::command_envelope(
                    "status",
                    "ok",
                    serde_json::json!({
                        "snapshot": snap,
                        "pending": pending
                    }),
                );
                println!("{}", serde_json::to_string_pretty(&envelope).unwrap_or_default());
                return Ok(());
            }
            println!(
                "{} {} ({} coins, {} xp, {} day streak)",
                "user".bold(),
                snap.wallet.user_id,
                snap.wallet.coins,
                snap.wallet.total_xp,
                snap.wallet.streak_days
            );
            for b in &snap.boosters {
                let mark = if b.owned { "owned".green() } else { "-".normal() };
                println!("  booster {:20} {}", b.booster_key, mark);
            }
            for q in &snap.quests {
                let mark = if q.claimed {
                    "claimed".green()
                } else if q.completed {
                    "completed".cyan()
                } else {
                    "in progress".normal()
                };
                println!("  quest   {:20} {}", q.quest_key, mark);
            }
            if let Some(daily) = snap.daily {
                println!(
                    "  daily   {} {}/{}",
                    daily.status.as_str(),
                    daily.progress,
                    daily.target
                );
            }
            if pending > 0 {
                println!("{}", format!("  {} pending mutation(s) awaiting sync", pending).yellow());
            }
            Ok(())
        }
        Command::Booster { command } => {
            let (_config, mut coordinator) = build_coordinator(&root)?;
            coordinator.reconcile_if_reachable()?;
            match command {
                BoosterCommand::Buy { key, cost } => {
                    let outcome = coordinator.purchase_booster(&key, cost)?;
                    println!("Purchased {}: {}", key, describe_outcome(outcome));
                }
            }
            Ok(())
        }
        Command::Quest { command } => {
            let (_config, mut coordinator) = build_coordinator(&root)?;
            match command {
                QuestCommand::Complete { key } => {
                    coordinator.mark_quest_completed(&key)?;
                    println!("Quest {} marked completed", key);
                }
                QuestCommand::Claim { key, reward } => {
                    coordinator.reconcile_if_reachable()?;
                    let outcome = coordinator.claim_quest(&key, reward)?;
                    println!("Claimed {}: {}", key, describe_outcome(outcome));
                }
            }
            Ok(())
        }
        Command::Daily { command } => {
            let (_config, mut coordinator) = build_coordinator(&root)?;
            coordinator.reconcile_if_reachable()?;
            match command {
                DailyCommand::Start { target } => {
                    let outcome = coordinator.start_daily(target)?;
                    println!("Daily challenge started: {}", describe_outcome(outcome));
                }
                DailyCommand::Submit { reward } => {
                    let outcome = coordinator.submit_daily(reward)?;
                    println!("Daily challenge claimed: {}", describe_outcome(outcome));
                }
            }
            Ok(())
        }
        Command::Lesson { command } => {
            let (config, mut coordinator) = build_coordinator(&root)?;
            match command {
                LessonCommand::Record {
                    lesson,
                    word,
                    score,
                    accuracy,
                    time_spent,
                    attempts,
                    correct,
                    wrong,
                    xp,
                    coins,
                } => {
                    let rec = ProgressRecord {
                        id: time::new_event_id(),
                        user_id: config.user_id.clone(),
                        lesson_id: lesson.clone(),
                        word_id: word,
                        is_completed: true,
                        score,
                        accuracy,
                        time_spent,
                        attempts,
                        correct_answers: correct,
                        wrong_answers: wrong,
                        xp_earned: xp,
                        coins_earned: coins,
                        review_count: 0,
                        ease_factor: 2.5,
                    };
                    progress::record_progress(coordinator.store(), &rec)?;
                    coordinator.record_lesson_result(xp, coins)?;
                    println!("Recorded lesson {} (+{} xp, +{} coins)", lesson, xp, coins);
                }
            }
            Ok(())
        }
        Command::Achievement { command } => {
            let (_config, coordinator) = build_coordinator(&root)?;
            match command {
                AchievementCommand::Unlock { key } => {
                    progress::unlock_achievement(coordinator.store(), &key)?;
                    println!("Achievement unlocked: {}", key);
                }
            }
            Ok(())
        }
        Command::Sync => {
            let (config, mut coordinator) = build_coordinator(&root)?;
            let merged = coordinator.reconcile_if_reachable()?;
            let outcome = coordinator.drain_pending()?;
            match outcome {
                DrainOutcome::Completed { drained, remaining } => {
                    println!(
                        "Reconciled: {}. Drained {} pending mutation(s), {} remaining.",
                        if merged { "yes" } else { "remote unreachable" },
                        drained,
                        remaining
                    );
                    if remaining > 0 {
                        println!(
                            "{}",
                            "Some mutations could not be propagated; they stay queued.".yellow()
                        );
                    }
                }
                DrainOutcome::AlreadyRunning => {
                    println!("Another drain is already in flight; skipped.");
                }
            }

            let store = LocalStateStore::open(&root)?;
            let client = build_client(&root, &config)?;
            let journal = SyncJournal::new(&root);
            let mut progress_sync = ProgressSyncCoordinator::new(store, client, journal);
            match progress_sync.sync_now() {
                Ok(()) => println!("Progress snapshot synced."),
                Err(e) if e.is_transient() => {
                    // Soft warning: local state is untouched, next sync retries.
                    println!("{}", format!("Progress sync deferred: {}", e).yellow());
                }
                Err(e) => return Err(e),
            }
            Ok(())
        }
        Command::Leaderboard { limit } => {
            let config = config::load_config(&root)?;
            let client = build_client(&root, &config)?;
            let rows = client.fetch_leaderboard(limit)?;
            for (i, row) in rows.iter().enumerate() {
                println!(
                    "{:3}. {:20} {:>8} xp {:>7} coins {:>4}d",
                    i + 1,
                    if row.display_name.is_empty() {
                        &row.user_id
                    } else {
                        &row.display_name
                    },
                    row.total_xp,
                    row.coins,
                    row.streak_days
                );
            }
            Ok(())
        }
        Command::Events { tail } => {
            let journal = SyncJournal::new(&root);
            let events = journal.read_all()?;
            let start = events.len().saturating_sub(tail);
            for ev in &events[start..] {
                let status = match ev.status.as_str() {
                    "acked" | "completed" => ev.status.green(),
                    "queued" | "failed" => ev.status.yellow(),
                    "dropped" => ev.status.red(),
                    _ => ev.status.normal(),
                };
                println!(
                    "{} {:18} {:20} {} {}",
                    ev.ts,
                    ev.op,
                    ev.key,
                    status,
                    ev.detail.as_deref().unwrap_or("")
                );
            }
            Ok(())
        }
    }
}
