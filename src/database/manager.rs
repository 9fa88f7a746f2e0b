// Database Manager for interview-assist
// Owns the SQLite connection; repositories are impl blocks in sibling modules

use anyhow::{Context, Result};
use rusqlite::Connection;
use std::path::PathBuf;
use std::sync::Mutex;

use super::migrations;

const APP_DIR_NAME: &str = "interview-assist";
const DB_FILE_NAME: &str = "assist.db";

/// Database manager that owns the SQLite connection
pub struct DatabaseManager {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl DatabaseManager {
    /// Create a new DatabaseManager with the database at the specified path
    pub fn new(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .context("Failed to create database directory")?;
        }

        let conn = Connection::open(&db_path)
            .context("Failed to open database")?;

        Self::from_connection(conn, db_path)
    }

    /// Open the database in the per-user data directory
    pub fn open_default() -> Result<Self> {
        Self::new(Self::default_path()?)
    }

    /// `<data_dir>/interview-assist/assist.db`
    pub fn default_path() -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .context("Failed to resolve the user data directory")?;
        Ok(data_dir.join(APP_DIR_NAME).join(DB_FILE_NAME))
    }

    /// Throwaway database, used by demos
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .context("Failed to open in-memory database")?;
        Self::from_connection(conn, PathBuf::from(":memory:"))
    }

    fn from_connection(conn: Connection, db_path: PathBuf) -> Result<Self> {
        conn.execute("PRAGMA foreign_keys = ON", [])
            .context("Failed to enable foreign keys")?;

        migrations::run_migrations(&conn)
            .context("Failed to run database migrations")?;

        log::info!("Database initialized at: {:?}", db_path);

        Ok(Self {
            conn: Mutex::new(conn),
            db_path,
        })
    }

    /// Execute a function with access to the database connection
    pub fn with_connection<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.conn.lock()
            .map_err(|e| anyhow::anyhow!("Failed to lock database connection: {}", e))?;
        f(&conn)
    }

    pub fn db_path(&self) -> &PathBuf {
        &self.db_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_database_creation() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("nested").join("test.db");

        let manager = DatabaseManager::new(db_path.clone()).unwrap();
        assert!(db_path.exists());

        manager.with_connection(|conn| {
            let count: i32 = conn.query_row(
                "SELECT COUNT(*) FROM settings",
                [],
                |row| row.get(0),
            )?;
            assert_eq!(count, 0);
            Ok(())
        }).unwrap();
    }

    #[test]
    fn test_default_path_layout() {
        if let Ok(path) = DatabaseManager::default_path() {
            assert!(path.ends_with("interview-assist/assist.db"));
        }
    }

    #[test]
    fn test_in_memory_database_is_migrated() {
        let manager = DatabaseManager::open_in_memory().unwrap();
        manager.set_setting("k", "v", "string").unwrap();
        assert_eq!(manager.get_setting("k").unwrap(), Some("v".to_string()));
    }
}
