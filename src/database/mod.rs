// Database module for interview-assist
// SQLite persistence for settings, key-value session state and saved interview profiles

pub mod manager;
pub mod migrations;
pub mod models;
pub mod settings_repo;
pub mod kv_repo;
pub mod profiles_repo;

pub use manager::DatabaseManager;
pub use models::*;
