// Interview profile repository for interview-assist
// CRUD for saved meeting contexts; the context itself is stored as JSON

use anyhow::{Context, Result};
use rusqlite::{Connection, params};

use super::models::{InterviewProfile, SaveInterviewProfile};
use super::DatabaseManager;

impl DatabaseManager {
    /// Most recently updated first
    pub fn list_profiles(&self) -> Result<Vec<InterviewProfile>> {
        self.with_connection(list_profiles_impl)
    }

    pub fn get_profile(&self, id: &str) -> Result<Option<InterviewProfile>> {
        self.with_connection(|conn| get_profile_impl(conn, id))
    }

    pub fn create_profile(&self, input: &SaveInterviewProfile) -> Result<String> {
        self.with_connection(|conn| create_profile_impl(conn, input))
    }

    pub fn update_profile(&self, id: &str, input: &SaveInterviewProfile) -> Result<()> {
        self.with_connection(|conn| update_profile_impl(conn, id, input))
    }

    /// Returns false when no such profile existed
    pub fn delete_profile(&self, id: &str) -> Result<bool> {
        self.with_connection(|conn| delete_profile_impl(conn, id))
    }
}

type ProfileRow = (String, String, String, String, String);

fn row_to_profile(row: ProfileRow) -> Result<InterviewProfile> {
    let (id, name, context_json, created_at, updated_at) = row;
    let context = serde_json::from_str(&context_json)
        .with_context(|| format!("Corrupt context for profile {}", id))?;
    Ok(InterviewProfile { id, name, context, created_at, updated_at })
}

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ProfileRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
}

fn list_profiles_impl(conn: &Connection) -> Result<Vec<InterviewProfile>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT id, name, context_json, created_at, updated_at
        FROM interview_profiles
        ORDER BY updated_at DESC, name ASC
        "#
    ).context("Failed to prepare list_profiles query")?;

    let rows = stmt.query_map([], read_row)
        .context("Failed to query profiles")?
        .collect::<std::result::Result<Vec<_>, _>>()
        .context("Failed to collect profiles")?;

    rows.into_iter().map(row_to_profile).collect()
}

fn get_profile_impl(conn: &Connection, id: &str) -> Result<Option<InterviewProfile>> {
    let row = conn.query_row(
        r#"
        SELECT id, name, context_json, created_at, updated_at
        FROM interview_profiles WHERE id = ?1
        "#,
        params![id],
        read_row,
    );

    match row {
        Ok(row) => row_to_profile(row).map(Some),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e).context("Failed to get profile"),
    }
}

fn create_profile_impl(conn: &Connection, input: &SaveInterviewProfile) -> Result<String> {
    let name = input.name.trim();
    if name.is_empty() {
        return Err(anyhow::anyhow!("Profile name must not be empty"));
    }

    let id = format!("profile_{}", uuid::Uuid::new_v4());
    let now = chrono::Utc::now().to_rfc3339();
    let context_json = serde_json::to_string(&input.context)
        .context("Failed to serialize meeting context")?;

    conn.execute(
        r#"
        INSERT INTO interview_profiles (id, name, context_json, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?4)
        "#,
        params![id, name, context_json, now],
    ).context("Failed to create profile")?;

    Ok(id)
}

fn update_profile_impl(conn: &Connection, id: &str, input: &SaveInterviewProfile) -> Result<()> {
    let context_json = serde_json::to_string(&input.context)
        .context("Failed to serialize meeting context")?;
    let now = chrono::Utc::now().to_rfc3339();

    let updated = conn.execute(
        r#"
        UPDATE interview_profiles
        SET name = ?2, context_json = ?3, updated_at = ?4
        WHERE id = ?1
        "#,
        params![id, input.name.trim(), context_json, now],
    ).context("Failed to update profile")?;

    if updated == 0 {
        return Err(anyhow::anyhow!("Profile not found: {}", id));
    }
    Ok(())
}

fn delete_profile_impl(conn: &Connection, id: &str) -> Result<bool> {
    let removed = conn.execute(
        "DELETE FROM interview_profiles WHERE id = ?1",
        params![id],
    ).context("Failed to delete profile")?;
    Ok(removed > 0)
}
