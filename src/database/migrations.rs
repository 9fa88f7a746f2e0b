// Database migrations for interview-assist
// Creates and updates the database schema

use anyhow::{Context, Result};
use rusqlite::Connection;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 3;

/// Run all necessary migrations to bring the database up to date
pub fn run_migrations(conn: &Connection) -> Result<()> {
    let current_version = get_schema_version(conn)?;

    if current_version < 1 {
        migrate_v1(conn)?;
    }

    if current_version < 2 {
        migrate_v2(conn)?;
    }

    if current_version < 3 {
        migrate_v3(conn)?;
    }

    Ok(())
}

/// Get the current schema version from the database
fn get_schema_version(conn: &Connection) -> Result<i32> {
    let table_exists: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='schema_version'",
        [],
        |row| row.get(0),
    ).context("Failed to inspect sqlite_master")?;

    if !table_exists {
        return Ok(0);
    }

    let version: Option<i32> = conn.query_row(
        "SELECT MAX(version) FROM schema_version",
        [],
        |row| row.get(0),
    ).context("Failed to read schema version")?;

    Ok(version.unwrap_or(0))
}

fn record_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [version],
    ).with_context(|| format!("Failed to record schema version {}", version))?;
    Ok(())
}

/// Version tracking and the settings table (version 1)
fn migrate_v1(conn: &Connection) -> Result<()> {
    log::info!("Running database migration v1");

    conn.execute_batch(r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- Settings table: typed key-value store for application settings
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY NOT NULL,
            value TEXT NOT NULL,
            value_type TEXT NOT NULL DEFAULT 'string',
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
    "#).context("Failed to run migration v1")?;

    record_version(conn, 1)
}

/// Generic key-value store for serialized session state (version 2)
fn migrate_v2(conn: &Connection) -> Result<()> {
    log::info!("Running database migration v2");

    conn.execute_batch(r#"
        CREATE TABLE IF NOT EXISTS kv_store (
            key TEXT PRIMARY KEY NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
    "#).context("Failed to run migration v2")?;

    record_version(conn, 2)
}

/// Saved interview profiles (version 3)
fn migrate_v3(conn: &Connection) -> Result<()> {
    log::info!("Running database migration v3");

    conn.execute_batch(r#"
        CREATE TABLE IF NOT EXISTS interview_profiles (
            id TEXT PRIMARY KEY NOT NULL,
            name TEXT NOT NULL,
            context_json TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_interview_profiles_updated
        ON interview_profiles(updated_at);
    "#).context("Failed to run migration v3")?;

    record_version(conn, 3)
}
