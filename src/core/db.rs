use crate::core::error::SyncError;
use crate::core::schemas;
use rusqlite::Connection;
use std::fs;
use std::path::{Path, PathBuf};

pub fn db_connect(db_path: &str) -> Result<Connection, SyncError> {
    let conn = Connection::open(db_path)?;
    conn.busy_timeout(std::time::Duration::from_secs(5))
        .map_err(SyncError::RusqliteError)?;
    conn.query_row("PRAGMA journal_mode=WAL;", [], |_| Ok(()))
        .map_err(SyncError::RusqliteError)?;
    conn.execute("PRAGMA foreign_keys=ON;", [])
        .map_err(SyncError::RusqliteError)?;
    Ok(conn)
}

pub fn device_db_path(root: &Path) -> PathBuf {
    root.join(schemas::DEVICE_DB_NAME)
}

pub fn service_db_path(root: &Path) -> PathBuf {
    root.join(schemas::SERVICE_DB_NAME)
}

/// Create the device tier tables. Idempotent; safe to call on every start.
pub fn initialize_device_db(root: &Path) -> Result<(), SyncError> {
    let db_path = device_db_path(root);
    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent).map_err(SyncError::IoError)?;
    }
    let conn = db_connect(&db_path.to_string_lossy())?;
    conn.execute(schemas::DEVICE_DB_SCHEMA_BOOSTERS, [])?;
    conn.execute(schemas::DEVICE_DB_SCHEMA_QUESTS, [])?;
    conn.execute(schemas::DEVICE_DB_SCHEMA_DAILY, [])?;
    conn.execute(schemas::DEVICE_DB_SCHEMA_WALLET, [])?;
    conn.execute(schemas::DEVICE_DB_SCHEMA_PENDING, [])?;
    conn.execute(schemas::DEVICE_DB_SCHEMA_PROGRESS, [])?;
    conn.execute(schemas::DEVICE_DB_SCHEMA_ACHIEVEMENTS, [])?;
    Ok(())
}

/// Create the service tier tables. Idempotent.
pub fn initialize_service_db(root: &Path) -> Result<(), SyncError> {
    let db_path = service_db_path(root);
    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent).map_err(SyncError::IoError)?;
    }
    let conn = db_connect(&db_path.to_string_lossy())?;
    conn.execute(schemas::SERVICE_DB_SCHEMA_BOOSTERS, [])?;
    conn.execute(schemas::SERVICE_DB_SCHEMA_QUESTS, [])?;
    conn.execute(schemas::SERVICE_DB_SCHEMA_DAILY, [])?;
    conn.execute(schemas::SERVICE_DB_SCHEMA_PROFILES, [])?;
    conn.execute(schemas::SERVICE_DB_SCHEMA_PROGRESS, [])?;
    conn.execute(schemas::SERVICE_DB_SCHEMA_PROGRESS_INDEX, [])?;
    conn.execute(schemas::SERVICE_DB_SCHEMA_ACHIEVEMENTS, [])?;
    Ok(())
}
