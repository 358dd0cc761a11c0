use std::path::Path;

use chrono::Utc;
use rusqlite::{params, Connection};

use crate::error::ViewlogError;
use crate::models::ViewedRecord;

const SCHEMA_V1: &str = include_str!("../../../migrations/001_viewed_records.sql");

/// SQLite-backed storage for per-user viewed records.
pub struct Storage {
    conn: Connection,
}

impl Storage {
    /// Open (or create) the database at the given path and run migrations.
    pub fn open(path: &Path) -> Result<Self, ViewlogError> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        run_migrations(&conn)?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (for tests).
    pub fn open_memory() -> Result<Self, ViewlogError> {
        let conn = Connection::open_in_memory()?;
        run_migrations(&conn)?;
        Ok(Self { conn })
    }

    /// Every record stored for `user_id`, ordered by episode id.
    pub fn viewed_records(&self, user_id: &str) -> Result<Vec<ViewedRecord>, ViewlogError> {
        let mut stmt = self.conn.prepare(
            "SELECT episode_id, name, code, air_date, characters, viewed
             FROM viewed_record WHERE user_id = ?1 ORDER BY episode_id",
        )?;
        let rows = stmt
            .query_map(params![user_id], |row| {
                let characters: String = row.get(4)?;
                Ok(ViewedRecord {
                    episode_id: row.get(0)?,
                    name: row.get(1)?,
                    code: row.get(2)?,
                    air_date: row.get(3)?,
                    character_refs: serde_json::from_str(&characters).unwrap_or_default(),
                    viewed: row.get::<_, i32>(5)? != 0,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Create or replace the record keyed by `(user_id, record.episode_id)`.
    pub fn upsert_viewed_record(
        &self,
        user_id: &str,
        record: &ViewedRecord,
    ) -> Result<(), ViewlogError> {
        let characters = serde_json::to_string(&record.character_refs)?;
        self.conn.execute(
            "INSERT OR REPLACE INTO viewed_record
             (user_id, episode_id, name, code, air_date, characters, viewed, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                user_id,
                record.episode_id,
                record.name,
                record.code,
                record.air_date,
                characters,
                record.viewed as i32,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }
}

fn run_migrations(conn: &Connection) -> Result<(), ViewlogError> {
    let version: i32 = conn
        .pragma_query_value(None, "user_version", |row| row.get(0))
        .unwrap_or(0);

    if version < 1 {
        conn.execute_batch(SCHEMA_V1)?;
        conn.pragma_update(None, "user_version", 1)?;
    }
    Ok(())
}
