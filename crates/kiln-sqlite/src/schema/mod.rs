//! Schema management and migrations
//!
//! Migrations are applied in order, each in its own transaction, and
//! recorded in `schema_migrations` so that applying them is idempotent. A
//! migration changing how notes are indexed is flagged so that the next
//! indexing pass reparses every note.

use crate::error::{SqliteError, SqliteResult};
use crate::store::metadata::{MetadataStore, REINDEXING_REQUIRED_KEY};
use rusqlite::Connection;
use tracing::{debug, info};

/// An ordered schema change
struct Migration {
    version: i32,
    description: &'static str,
    sql: &'static str,
    /// Indexed data must be rebuilt after this migration
    needs_reindexing: bool,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "notes, links and full-text search",
        sql: SCHEMA_V1,
        needs_reindexing: false,
    },
    Migration {
        version: 2,
        description: "collections",
        sql: SCHEMA_V2,
        needs_reindexing: false,
    },
    Migration {
        version: 3,
        description: "metadata store and resolved links",
        sql: SCHEMA_V3,
        needs_reindexing: true,
    },
];

/// Schema version - the version of the last migration
pub const SCHEMA_VERSION: i32 = 3;

/// Apply all pending migrations
pub fn apply_migrations(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    let current_version = get_current_version(conn)?;
    debug!(current_version, target_version = SCHEMA_VERSION, "Checking migrations");

    let mut needs_reindexing = false;
    for migration in MIGRATIONS.iter().filter(|m| m.version > current_version) {
        apply_migration(conn, migration)?;
        needs_reindexing |= migration.needs_reindexing;
    }

    if needs_reindexing {
        MetadataStore::new(conn).set(REINDEXING_REQUIRED_KEY, "true")?;
        info!("Schema changes require a full reindex");
    }

    Ok(())
}

/// Get current schema version
pub fn get_current_version(conn: &Connection) -> SqliteResult<i32> {
    let version: Option<i32> =
        conn.query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
            row.get(0)
        })?;

    Ok(version.unwrap_or(0))
}

fn apply_migration(conn: &Connection, migration: &Migration) -> SqliteResult<()> {
    debug!(
        version = migration.version,
        "Applying migration v{}: {}", migration.version, migration.description
    );

    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(migration.sql).map_err(|e| {
        SqliteError::Schema(format!(
            "Failed to apply v{} schema: {}",
            migration.version, e
        ))
    })?;
    tx.execute(
        "INSERT INTO schema_migrations (version) VALUES (?1)",
        [migration.version],
    )?;
    tx.commit()?;

    info!(version = migration.version, "Migration applied successfully");
    Ok(())
}

/// Notes, links and full-text index
const SCHEMA_V1: &str = r#"
-- ============================================================================
-- TABLE: notes
-- ============================================================================
-- One row per note file. `sortable_path` orders paths like a directory walk.

CREATE TABLE IF NOT EXISTS notes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    path TEXT NOT NULL UNIQUE,
    sortable_path TEXT NOT NULL,
    title TEXT NOT NULL DEFAULT '',
    lead TEXT NOT NULL DEFAULT '',
    body TEXT NOT NULL DEFAULT '',
    raw_content TEXT NOT NULL DEFAULT '',
    word_count INTEGER NOT NULL DEFAULT 0,
    metadata TEXT NOT NULL DEFAULT '{}',  -- JSON
    checksum TEXT NOT NULL,
    created TEXT NOT NULL,
    modified TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_notes_checksum ON notes(checksum);
CREATE INDEX IF NOT EXISTS idx_notes_sortable_path ON notes(sortable_path);

-- ============================================================================
-- TABLE: links
-- ============================================================================
-- Outbound links. A NULL target is a dangling link, kept for later resolution.

CREATE TABLE IF NOT EXISTS links (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source_id INTEGER NOT NULL REFERENCES notes(id) ON DELETE CASCADE,
    target_id INTEGER REFERENCES notes(id) ON DELETE SET NULL,
    title TEXT NOT NULL DEFAULT '',
    href TEXT NOT NULL,
    type TEXT NOT NULL,
    external INTEGER NOT NULL DEFAULT 0,
    rels TEXT NOT NULL DEFAULT '',
    snippet TEXT NOT NULL DEFAULT '',
    snippet_start INTEGER NOT NULL DEFAULT 0,
    snippet_end INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_links_source_target ON links(source_id, target_id);
CREATE INDEX IF NOT EXISTS idx_links_target_source ON links(target_id, source_id);

-- ============================================================================
-- FTS5: notes_fts
-- ============================================================================
-- External content index over notes, kept in sync by triggers

CREATE VIRTUAL TABLE IF NOT EXISTS notes_fts USING fts5(
    path, title, body,
    content = 'notes',
    content_rowid = 'id',
    tokenize = 'porter unicode61 remove_diacritics 1'
);

CREATE TRIGGER IF NOT EXISTS trigger_notes_ai AFTER INSERT ON notes BEGIN
    INSERT INTO notes_fts(rowid, path, title, body)
    VALUES (new.id, new.path, new.title, new.body);
END;

CREATE TRIGGER IF NOT EXISTS trigger_notes_ad AFTER DELETE ON notes BEGIN
    INSERT INTO notes_fts(notes_fts, rowid, path, title, body)
    VALUES ('delete', old.id, old.path, old.title, old.body);
END;

CREATE TRIGGER IF NOT EXISTS trigger_notes_au AFTER UPDATE ON notes BEGIN
    INSERT INTO notes_fts(notes_fts, rowid, path, title, body)
    VALUES ('delete', old.id, old.path, old.title, old.body);
    INSERT INTO notes_fts(rowid, path, title, body)
    VALUES (new.id, new.path, new.title, new.body);
END;
"#;

/// Collections (tags) and their association with notes
const SCHEMA_V2: &str = r#"
CREATE TABLE IF NOT EXISTS collections (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    kind TEXT NOT NULL,
    name TEXT NOT NULL,
    UNIQUE(kind, name)
);

CREATE TABLE IF NOT EXISTS notes_collections (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    note_id INTEGER NOT NULL REFERENCES notes(id) ON DELETE CASCADE,
    collection_id INTEGER NOT NULL REFERENCES collections(id) ON DELETE CASCADE,
    UNIQUE(note_id, collection_id)
);

CREATE INDEX IF NOT EXISTS idx_notes_collections_collection ON notes_collections(collection_id);

-- Notes with their tags joined by U+0001
CREATE VIEW IF NOT EXISTS notes_with_metadata AS
SELECT n.*, GROUP_CONCAT(c.name, char(1)) AS tags
  FROM notes n
  LEFT JOIN notes_collections nc ON nc.note_id = n.id
  LEFT JOIN collections c ON c.id = nc.collection_id AND c.kind = 'tag'
 GROUP BY n.id;
"#;

/// Key/value store for index state, and links with their endpoints
const SCHEMA_V3: &str = r#"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY NOT NULL,
    value TEXT NOT NULL
);

CREATE VIEW IF NOT EXISTS resolved_links AS
SELECT l.*, s.path AS source_path, t.path AS target_path
  FROM links l
  JOIN notes s ON s.id = l.source_id
  LEFT JOIN notes t ON t.id = l.target_id;
"#;

#[cfg(test)]
mod tests {
    use super::*;

    fn open() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        crate::functions::register(&conn).unwrap();
        conn
    }

    #[test]
    fn test_migrations_are_idempotent() {
        let conn = open();
        apply_migrations(&conn).unwrap();
        apply_migrations(&conn).unwrap();

        assert_eq!(get_current_version(&conn).unwrap(), SCHEMA_VERSION);
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_migrations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, MIGRATIONS.len() as i64);
    }

    #[test]
    fn test_migration_flags_reindexing() {
        let conn = open();
        apply_migrations(&conn).unwrap();

        let store = MetadataStore::new(&conn);
        assert_eq!(store.get(REINDEXING_REQUIRED_KEY).unwrap().as_deref(), Some("true"));

        // Up-to-date schema doesn't raise the flag again
        store.set(REINDEXING_REQUIRED_KEY, "false").unwrap();
        apply_migrations(&conn).unwrap();
        assert_eq!(store.get(REINDEXING_REQUIRED_KEY).unwrap().as_deref(), Some("false"));
    }

    #[test]
    fn test_upgrade_from_older_version() {
        let conn = open();
        conn.execute_batch(
            "CREATE TABLE schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL DEFAULT (datetime('now'))
            );",
        )
        .unwrap();
        conn.execute_batch(SCHEMA_V1).unwrap();
        conn.execute("INSERT INTO schema_migrations (version) VALUES (1)", [])
            .unwrap();

        apply_migrations(&conn).unwrap();
        assert_eq!(get_current_version(&conn).unwrap(), 3);
    }

    #[test]
    fn test_migration_versions_are_ordered() {
        let versions: Vec<i32> = MIGRATIONS.iter().map(|m| m.version).collect();
        let mut sorted = versions.clone();
        sorted.sort_unstable();
        assert_eq!(versions, sorted);
        assert_eq!(versions.last().copied(), Some(SCHEMA_VERSION));
    }
}
