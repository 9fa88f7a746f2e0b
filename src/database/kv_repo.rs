// Key-value repository for interview-assist
// Opaque string values under namespaced keys (e.g. `live_session:<id>`)

use anyhow::{Context, Result};
use rusqlite::{Connection, params};

use super::DatabaseManager;

impl DatabaseManager {
    pub fn kv_get(&self, key: &str) -> Result<Option<String>> {
        self.with_connection(|conn| kv_get_impl(conn, key))
    }

    /// Insert or overwrite. Last write wins.
    pub fn kv_put(&self, key: &str, value: &str) -> Result<()> {
        self.with_connection(|conn| kv_put_impl(conn, key, value))
    }

    /// Returns true when a row was removed
    pub fn kv_delete(&self, key: &str) -> Result<bool> {
        self.with_connection(|conn| kv_delete_impl(conn, key))
    }

    /// Keys starting with `prefix`, sorted
    pub fn kv_keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        self.with_connection(|conn| kv_keys_with_prefix_impl(conn, prefix))
    }
}

fn kv_get_impl(conn: &Connection, key: &str) -> Result<Option<String>> {
    match conn.query_row(
        "SELECT value FROM kv_store WHERE key = ?1",
        params![key],
        |row| row.get(0),
    ) {
        Ok(value) => Ok(Some(value)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e).with_context(|| format!("Failed to read key '{}'", key)),
    }
}

fn kv_put_impl(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO kv_store (key, value, updated_at)
        VALUES (?1, ?2, datetime('now'))
        ON CONFLICT(key) DO UPDATE SET
            value = excluded.value,
            updated_at = datetime('now')
        "#,
        params![key, value],
    ).with_context(|| format!("Failed to write key '{}'", key))?;
    Ok(())
}

fn kv_delete_impl(conn: &Connection, key: &str) -> Result<bool> {
    let removed = conn.execute("DELETE FROM kv_store WHERE key = ?1", params![key])
        .with_context(|| format!("Failed to delete key '{}'", key))?;
    Ok(removed > 0)
}

fn kv_keys_with_prefix_impl(conn: &Connection, prefix: &str) -> Result<Vec<String>> {
    // substr comparison instead of LIKE so '_' and '%' in prefixes stay literal
    let mut stmt = conn.prepare(
        "SELECT key FROM kv_store WHERE substr(key, 1, length(?1)) = ?1 ORDER BY key"
    ).context("Failed to prepare key listing query")?;

    let keys = stmt.query_map(params![prefix], |row| row.get(0))
        .context("Failed to list keys")?;

    keys.collect::<std::result::Result<Vec<String>, _>>()
        .context("Failed to collect keys")
}
