//! Centralized database schema definitions for both storage tiers.
//!
//! Two SQLite databases exist:
//! 1. device.db: the device-local tier (game state, wallet, pending mutations,
//!    progress/achievement snapshots). Exclusively owned by the device process.
//! 2. service.db: the authoritative tier, rows keyed by user id. Exclusively
//!    owned by the service side of the wire boundary.

// --- 1. Device tier ---
pub const DEVICE_DB_NAME: &str = "device.db";

pub const DEVICE_DB_SCHEMA_BOOSTERS: &str = "
    CREATE TABLE IF NOT EXISTS boosters (
        booster_key TEXT PRIMARY KEY,
        owned INTEGER NOT NULL DEFAULT 0,
        updated_at TEXT NOT NULL
    )
";

pub const DEVICE_DB_SCHEMA_QUESTS: &str = "
    CREATE TABLE IF NOT EXISTS quests (
        quest_key TEXT PRIMARY KEY,
        completed INTEGER NOT NULL DEFAULT 0,
        claimed INTEGER NOT NULL DEFAULT 0,
        updated_at TEXT NOT NULL
    )
";

/// Single-row table: one daily challenge cycle at a time.
pub const DEVICE_DB_SCHEMA_DAILY: &str = "
    CREATE TABLE IF NOT EXISTS daily_challenge (
        id INTEGER PRIMARY KEY CHECK (id = 1),
        status TEXT NOT NULL,
        progress INTEGER NOT NULL DEFAULT 0,
        target INTEGER NOT NULL DEFAULT 0,
        updated_at TEXT NOT NULL
    )
";

/// Single-row wallet. The CHECK is the last line of defense behind the
/// coordinator's debit guard.
pub const DEVICE_DB_SCHEMA_WALLET: &str = "
    CREATE TABLE IF NOT EXISTS wallet (
        id INTEGER PRIMARY KEY CHECK (id = 1),
        user_id TEXT NOT NULL,
        display_name TEXT NOT NULL DEFAULT '',
        coins INTEGER NOT NULL DEFAULT 0 CHECK (coins >= 0),
        total_xp INTEGER NOT NULL DEFAULT 0,
        streak_days INTEGER NOT NULL DEFAULT 0,
        updated_at TEXT NOT NULL
    )
";

/// Durable FIFO of mutations awaiting remote acknowledgment. `seq` carries the
/// enqueue order across process restarts.
pub const DEVICE_DB_SCHEMA_PENDING: &str = "
    CREATE TABLE IF NOT EXISTS pending_mutations (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        mutation_id TEXT NOT NULL UNIQUE,
        kind TEXT NOT NULL,
        payload TEXT NOT NULL,
        enqueued_at TEXT NOT NULL
    )
";

pub const DEVICE_DB_SCHEMA_PROGRESS: &str = "
    CREATE TABLE IF NOT EXISTS progress_records (
        record_id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        lesson_id TEXT NOT NULL,
        word_id TEXT,
        is_completed INTEGER NOT NULL DEFAULT 0,
        score INTEGER NOT NULL DEFAULT 0,
        accuracy REAL NOT NULL DEFAULT 0,
        time_spent INTEGER NOT NULL DEFAULT 0,
        attempts INTEGER NOT NULL DEFAULT 0,
        correct_answers INTEGER NOT NULL DEFAULT 0,
        wrong_answers INTEGER NOT NULL DEFAULT 0,
        xp_earned INTEGER NOT NULL DEFAULT 0,
        coins_earned INTEGER NOT NULL DEFAULT 0,
        review_count INTEGER NOT NULL DEFAULT 0,
        ease_factor REAL NOT NULL DEFAULT 2.5
    )
";

pub const DEVICE_DB_SCHEMA_ACHIEVEMENTS: &str = "
    CREATE TABLE IF NOT EXISTS achievements (
        achievement_key TEXT PRIMARY KEY,
        unlocked_at TEXT NOT NULL
    )
";

// --- 2. Service tier ---
pub const SERVICE_DB_NAME: &str = "service.db";

pub const SERVICE_DB_SCHEMA_BOOSTERS: &str = "
    CREATE TABLE IF NOT EXISTS booster_state (
        user_id TEXT NOT NULL,
        booster_key TEXT NOT NULL,
        is_owned INTEGER NOT NULL DEFAULT 0,
        updated_at TEXT NOT NULL,
        PRIMARY KEY (user_id, booster_key)
    )
";

pub const SERVICE_DB_SCHEMA_QUESTS: &str = "
    CREATE TABLE IF NOT EXISTS quest_state (
        user_id TEXT NOT NULL,
        quest_key TEXT NOT NULL,
        is_claimed INTEGER NOT NULL DEFAULT 0,
        updated_at TEXT NOT NULL,
        PRIMARY KEY (user_id, quest_key)
    )
";

pub const SERVICE_DB_SCHEMA_DAILY: &str = "
    CREATE TABLE IF NOT EXISTS daily_state (
        user_id TEXT PRIMARY KEY,
        status TEXT NOT NULL,
        progress INTEGER NOT NULL DEFAULT 0,
        target INTEGER NOT NULL DEFAULT 0,
        updated_at TEXT NOT NULL
    )
";

pub const SERVICE_DB_SCHEMA_PROFILES: &str = "
    CREATE TABLE IF NOT EXISTS profiles (
        user_id TEXT PRIMARY KEY,
        display_name TEXT NOT NULL DEFAULT '',
        coins INTEGER NOT NULL DEFAULT 0,
        total_xp INTEGER NOT NULL DEFAULT 0,
        streak_days INTEGER NOT NULL DEFAULT 0,
        updated_at TEXT NOT NULL
    )
";

/// Progress rows are deduplicated on (user, lesson, word) so that snapshot
/// replays upsert instead of multiplying rows.
pub const SERVICE_DB_SCHEMA_PROGRESS: &str = "
    CREATE TABLE IF NOT EXISTS progress_rows (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        lesson_id TEXT NOT NULL,
        word_id TEXT NOT NULL DEFAULT '',
        is_completed INTEGER NOT NULL DEFAULT 0,
        score INTEGER NOT NULL DEFAULT 0,
        accuracy REAL NOT NULL DEFAULT 0,
        time_spent INTEGER NOT NULL DEFAULT 0,
        attempts INTEGER NOT NULL DEFAULT 0,
        correct_answers INTEGER NOT NULL DEFAULT 0,
        wrong_answers INTEGER NOT NULL DEFAULT 0,
        xp_earned INTEGER NOT NULL DEFAULT 0,
        coins_earned INTEGER NOT NULL DEFAULT 0,
        review_count INTEGER NOT NULL DEFAULT 0,
        ease_factor REAL NOT NULL DEFAULT 2.5,
        created_at TEXT NOT NULL,
        UNIQUE (user_id, lesson_id, word_id)
    )
";
pub const SERVICE_DB_SCHEMA_PROGRESS_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_progress_rows_user ON progress_rows(user_id)";

pub const SERVICE_DB_SCHEMA_ACHIEVEMENTS: &str = "
    CREATE TABLE IF NOT EXISTS achievement_rows (
        user_id TEXT NOT NULL,
        achievement_key TEXT NOT NULL,
        unlocked_at TEXT NOT NULL,
        PRIMARY KEY (user_id, achievement_key)
    )
";
