//! Collection (tag) store

use kiln_core::{Collection, CollectionId, CollectionKind, CollectionSortField, CollectionSorter, NoteId};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::debug;

use crate::error::SqliteResult;

pub struct CollectionStore<'c> {
    conn: &'c Connection,
}

impl<'c> CollectionStore<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    /// ID of the collection with this exact kind and name, created on
    /// first use
    pub fn find_or_create(&self, kind: CollectionKind, name: &str) -> SqliteResult<CollectionId> {
        let existing: Option<i64> = self
            .conn
            .query_row(
                "SELECT id FROM collections WHERE kind = ?1 AND name = ?2",
                params![kind.as_str(), name],
                |row| row.get(0),
            )
            .optional()?;

        if let Some(id) = existing {
            return Ok(CollectionId(id));
        }

        self.conn.execute(
            "INSERT INTO collections (kind, name) VALUES (?1, ?2)",
            params![kind.as_str(), name],
        )?;
        debug!(kind = %kind, name, "created collection");
        Ok(CollectionId(self.conn.last_insert_rowid()))
    }

    /// Associate a note with a collection. Associating twice is a no-op.
    pub fn associate(&self, note_id: NoteId, collection_id: CollectionId) -> SqliteResult<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO notes_collections (note_id, collection_id) VALUES (?1, ?2)",
            params![note_id.0, collection_id.0],
        )?;
        Ok(())
    }

    /// Dissociate a note from every collection
    pub fn remove_associations(&self, note_id: NoteId) -> SqliteResult<()> {
        self.conn.execute(
            "DELETE FROM notes_collections WHERE note_id = ?1",
            [note_id.0],
        )?;
        Ok(())
    }

    /// Replace the tags of a note
    pub fn set_tags(&self, note_id: NoteId, tags: &[String]) -> SqliteResult<()> {
        self.remove_associations(note_id)?;
        for tag in tags {
            let tag = tag.trim();
            if tag.is_empty() {
                continue;
            }
            let id = self.find_or_create(CollectionKind::Tag, tag)?;
            self.associate(note_id, id)?;
        }
        Ok(())
    }

    /// Collections of a kind with at least one note, with their note
    /// counts. Ties are broken by name.
    pub fn find_all(
        &self,
        kind: CollectionKind,
        sorters: &[CollectionSorter],
    ) -> SqliteResult<Vec<Collection>> {
        let mut order: Vec<&str> = sorters
            .iter()
            .map(|sorter| match (sorter.field, sorter.ascending) {
                (CollectionSortField::Name, true) => "c.name ASC",
                (CollectionSortField::Name, false) => "c.name DESC",
                (CollectionSortField::NoteCount, true) => "note_count ASC",
                (CollectionSortField::NoteCount, false) => "note_count DESC",
            })
            .collect();
        order.push("c.name ASC");

        let sql = format!(
            r#"
            SELECT c.id, c.name, COUNT(nc.note_id) AS note_count
              FROM collections c
              JOIN notes_collections nc ON nc.collection_id = c.id
             WHERE c.kind = ?1
             GROUP BY c.id
             ORDER BY {}
            "#,
            order.join(", ")
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let collections = stmt
            .query_map([kind.as_str()], |row| row_to_collection(row, kind))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(collections)
    }
}

fn row_to_collection(row: &Row<'_>, kind: CollectionKind) -> rusqlite::Result<Collection> {
    let count: i64 = row.get(2)?;
    Ok(Collection {
        id: CollectionId(row.get(0)?),
        kind,
        name: row.get(1)?,
        note_count: count as usize,
    })
}
