//! Key/value store for the state of the index

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::SqliteResult;

/// Set to `"true"` when every note must be reparsed on the next indexing
pub const REINDEXING_REQUIRED_KEY: &str = "kiln.reindexing_required";

pub struct MetadataStore<'c> {
    conn: &'c Connection,
}

impl<'c> MetadataStore<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    pub fn get(&self, key: &str) -> SqliteResult<Option<String>> {
        let value = self
            .conn
            .query_row("SELECT value FROM metadata WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    pub fn set(&self, key: &str, value: &str) -> SqliteResult<()> {
        self.conn.execute(
            "INSERT INTO metadata (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn get_bool(&self, key: &str) -> SqliteResult<bool> {
        Ok(self.get(key)?.as_deref() == Some("true"))
    }

    pub fn set_bool(&self, key: &str, value: bool) -> SqliteResult<()> {
        self.set(key, if value { "true" } else { "false" })
    }
}
