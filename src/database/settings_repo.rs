// Settings repository for interview-assist
// Typed key-value application settings (capture strategy, assistant config, account flags)

use anyhow::{Context, Result};
use rusqlite::{Connection, params};

use super::models::Setting;
use super::DatabaseManager;

impl DatabaseManager {
    /// Get a single setting by key
    pub fn get_setting(&self, key: &str) -> Result<Option<String>> {
        self.with_connection(|conn| {
            get_setting_impl(conn, key)
        })
    }

    /// Insert or replace a single setting
    pub fn set_setting(&self, key: &str, value: &str, value_type: &str) -> Result<()> {
        self.with_connection(|conn| {
            set_setting_impl(conn, key, value, value_type)
        })
    }

    /// All settings ordered by key
    pub fn list_settings(&self) -> Result<Vec<Setting>> {
        self.with_connection(list_settings_impl)
    }

    pub fn set_bool_setting(&self, key: &str, value: bool) -> Result<()> {
        self.set_setting(key, if value { "true" } else { "false" }, "boolean")
    }

    pub fn get_bool_setting(&self, key: &str, default: bool) -> Result<bool> {
        match self.get_setting(key)? {
            Some(v) => Ok(v == "true"),
            None => Ok(default),
        }
    }

    /// Delete a setting by key. Deleting a missing key is not an error.
    pub fn delete_setting(&self, key: &str) -> Result<()> {
        self.with_connection(|conn| {
            delete_setting_impl(conn, key)
        })
    }
}

fn get_setting_impl(conn: &Connection, key: &str) -> Result<Option<String>> {
    let mut stmt = conn.prepare(
        "SELECT value FROM settings WHERE key = ?"
    ).context("Failed to prepare get_setting query")?;

    match stmt.query_row(params![key], |row| row.get(0)) {
        Ok(value) => Ok(Some(value)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e).context("Failed to get setting"),
    }
}

fn set_setting_impl(conn: &Connection, key: &str, value: &str, value_type: &str) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO settings (key, value, value_type, updated_at)
        VALUES (?1, ?2, ?3, datetime('now'))
        ON CONFLICT(key) DO UPDATE SET
            value = excluded.value,
            value_type = excluded.value_type,
            updated_at = datetime('now')
        "#,
        params![key, value, value_type],
    ).with_context(|| format!("Failed to set setting '{}'", key))?;

    Ok(())
}

fn list_settings_impl(conn: &Connection) -> Result<Vec<Setting>> {
    let mut stmt = conn.prepare(
        "SELECT key, value, value_type, updated_at FROM settings ORDER BY key"
    ).context("Failed to prepare list_settings query")?;

    let settings = stmt.query_map([], |row| {
        Ok(Setting {
            key: row.get(0)?,
            value: row.get(1)?,
            value_type: row.get(2)?,
            updated_at: row.get(3)?,
        })
    }).context("Failed to query settings")?;

    settings.collect::<std::result::Result<Vec<_>, _>>()
        .context("Failed to collect settings")
}

fn delete_setting_impl(conn: &Connection, key: &str) -> Result<()> {
    conn.execute(
        "DELETE FROM settings WHERE key = ?",
        params![key],
    ).context("Failed to delete setting")?;

    Ok(())
}
