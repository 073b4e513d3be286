//! Note store
//!
//! Inserting or updating a note also stores its tags and outbound links,
//! and repoints the links of other notes which now match it better.

use kiln_core::diff::walk_order_key;
use kiln_core::{FileMetadata, Note, NoteId};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use crate::error::{SqliteError, SqliteResult};
use crate::store::collection::CollectionStore;
use crate::store::link::LinkStore;
use crate::store::{format_date, parse_date};

pub struct NoteStore<'c> {
    conn: &'c Connection,
    partial_markdown_links: bool,
}

impl<'c> NoteStore<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self {
            conn,
            partial_markdown_links: false,
        }
    }

    #[must_use]
    pub fn with_partial_markdown_links(mut self, enabled: bool) -> Self {
        self.partial_markdown_links = enabled;
        self
    }

    fn links(&self) -> LinkStore<'c> {
        LinkStore::new(self.conn).with_partial_markdown_links(self.partial_markdown_links)
    }

    /// Insert a new note
    pub fn add(&self, note: &Note) -> SqliteResult<NoteId> {
        let metadata = serde_json::to_string(&note.metadata)?;
        self.conn.execute(
            r#"
            INSERT INTO notes (path, sortable_path, title, lead, body, raw_content, word_count,
                               metadata, checksum, created, modified)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                note.path,
                walk_order_key(&note.path),
                note.title,
                note.lead,
                note.body,
                note.raw_content,
                note.word_count as i64,
                metadata,
                note.checksum,
                format_date(&note.created),
                format_date(&note.modified),
            ],
        )?;
        let id = NoteId(self.conn.last_insert_rowid());

        self.store_relations(id, note)?;
        debug!(path = %note.path, id = id.0, "added note");
        Ok(id)
    }

    /// Replace the indexed data of the note at `note.path`
    pub fn update(&self, note: &Note) -> SqliteResult<NoteId> {
        let id = self
            .find_id_by_path(&note.path)?
            .ok_or_else(|| SqliteError::NotFound(format!("note at {}", note.path)))?;

        let metadata = serde_json::to_string(&note.metadata)?;
        self.conn.execute(
            r#"
            UPDATE notes
               SET title = ?2, lead = ?3, body = ?4, raw_content = ?5, word_count = ?6,
                   metadata = ?7, checksum = ?8, created = ?9, modified = ?10
             WHERE id = ?1
            "#,
            params![
                id.0,
                note.title,
                note.lead,
                note.body,
                note.raw_content,
                note.word_count as i64,
                metadata,
                note.checksum,
                format_date(&note.created),
                format_date(&note.modified),
            ],
        )?;

        self.links().remove_links(id)?;
        self.store_relations(id, note)?;
        debug!(path = %note.path, id = id.0, "updated note");
        Ok(id)
    }

    /// Remove the note at `path`. Its outbound links go with it, inbound
    /// links are kept dangling.
    pub fn remove(&self, path: &str) -> SqliteResult<()> {
        let id = self
            .find_id_by_path(path)?
            .ok_or_else(|| SqliteError::NotFound(format!("note at {}", path)))?;

        self.conn.execute("DELETE FROM notes WHERE id = ?1", [id.0])?;
        debug!(path, id = id.0, "removed note");
        Ok(())
    }

    fn store_relations(&self, id: NoteId, note: &Note) -> SqliteResult<()> {
        CollectionStore::new(self.conn).set_tags(id, &note.tags)?;
        let links = self.links();
        links.insert_links(id, &note.links)?;
        links.repair_targets(id, &note.path)?;
        Ok(())
    }

    pub fn find_id_by_path(&self, path: &str) -> SqliteResult<Option<NoteId>> {
        let id = self
            .conn
            .query_row("SELECT id FROM notes WHERE path = ?1", [path], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(id.map(NoteId))
    }

    /// Path and modification date of every note, in walk order
    pub fn indexed(&self) -> SqliteResult<Vec<FileMetadata>> {
        let mut stmt = self
            .conn
            .prepare("SELECT path, modified FROM notes ORDER BY sortable_path ASC")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(path, modified)| -> SqliteResult<FileMetadata> {
                Ok(FileMetadata::new(path, parse_date(&modified)?))
            })
            .collect()
    }
}
