// Database models - Settings
use serde::{Deserialize, Serialize};

/// A single setting stored in the database
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Setting {
    pub key: String,
    pub value: String,
    /// `string`, `boolean`, `json` or `secret`
    pub value_type: String,
    pub updated_at: String,
}
