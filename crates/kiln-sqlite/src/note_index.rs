//! SQLite implementation of the [`NoteIndex`] port
//!
//! [`SqliteNoteIndex`] runs every operation in its own transaction.
//! [`NoteIndex::commit`] opens a single write transaction and hands a
//! [`TxNoteIndex`] bound to it to the closure, so that everything the
//! closure does is committed or rolled back at once.

use kiln_core::{
    Collection, CollectionKind, CollectionSorter, ContextualNote, FileMetadata, IndexResult,
    MinimalNote, Note, NoteFindOpts, NoteId, NoteIndex, NotebookConfig, ResolvedLink, ResultExt,
};
use rusqlite::Connection;
use tracing::info;

use crate::connection::SqlitePool;
use crate::query::QueryBuilder;
use crate::store::metadata::REINDEXING_REQUIRED_KEY;
use crate::store::{CollectionStore, LinkStore, MetadataStore, NoteStore};

/// Notebook settings affecting how notes are indexed and found
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct IndexSettings {
    partial_markdown_links: bool,
    default_limit: Option<usize>,
}

/// Note index stored in a SQLite database
#[derive(Clone)]
pub struct SqliteNoteIndex {
    pool: SqlitePool,
    settings: IndexSettings,
}

impl SqliteNoteIndex {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            settings: IndexSettings::default(),
        }
    }

    /// Apply the settings of a notebook
    #[must_use]
    pub fn with_config(mut self, config: &NotebookConfig) -> Self {
        self.settings = IndexSettings {
            partial_markdown_links: config.partial_markdown_links,
            default_limit: config.default_limit,
        };
        self
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn bind<'c>(&self, conn: &'c Connection) -> TxNoteIndex<'c> {
        TxNoteIndex {
            conn,
            settings: self.settings,
        }
    }
}

impl NoteIndex for SqliteNoteIndex {
    fn find(&self, opts: &NoteFindOpts) -> IndexResult<Vec<ContextualNote>> {
        self.pool
            .with_read_transaction(|conn| self.bind(conn).find(opts))
    }

    fn find_minimal(&self, opts: &NoteFindOpts) -> IndexResult<Vec<MinimalNote>> {
        self.pool
            .with_read_transaction(|conn| self.bind(conn).find_minimal(opts))
    }

    fn find_collections(
        &self,
        kind: CollectionKind,
        sorters: &[CollectionSorter],
    ) -> IndexResult<Vec<Collection>> {
        self.pool
            .with_read_transaction(|conn| self.bind(conn).find_collections(kind, sorters))
    }

    fn find_links_between(&self, ids: &[NoteId]) -> IndexResult<Vec<ResolvedLink>> {
        self.pool
            .with_read_transaction(|conn| self.bind(conn).find_links_between(ids))
    }

    fn find_links_from(&self, id: NoteId) -> IndexResult<Vec<ResolvedLink>> {
        self.pool
            .with_read_transaction(|conn| self.bind(conn).find_links_from(id))
    }

    fn indexed_paths(&self) -> IndexResult<Vec<FileMetadata>> {
        self.pool
            .with_read_transaction(|conn| self.bind(conn).indexed_paths())
    }

    fn add(&self, note: &Note) -> IndexResult<NoteId> {
        self.pool.with_transaction(|conn| self.bind(conn).add(note))
    }

    fn update(&self, note: &Note) -> IndexResult<()> {
        self.pool.with_transaction(|conn| self.bind(conn).update(note))
    }

    fn remove(&self, path: &str) -> IndexResult<()> {
        self.pool.with_transaction(|conn| self.bind(conn).remove(path))
    }

    fn commit(&self, f: &mut dyn FnMut(&dyn NoteIndex) -> IndexResult<()>) -> IndexResult<()> {
        self.pool.with_transaction(|conn| f(&self.bind(conn)))
    }

    fn needs_reindexing(&self) -> IndexResult<bool> {
        self.pool
            .with_read_transaction(|conn| self.bind(conn).needs_reindexing())
    }

    fn set_needs_reindexing(&self, needed: bool) -> IndexResult<()> {
        self.pool
            .with_transaction(|conn| self.bind(conn).set_needs_reindexing(needed))
    }

    fn resolve_dangling_links(&self) -> IndexResult<usize> {
        self.pool
            .with_transaction(|conn| self.bind(conn).resolve_dangling_links())
    }
}

/// Note index operations joining an open transaction
pub struct TxNoteIndex<'c> {
    conn: &'c Connection,
    settings: IndexSettings,
}

impl<'c> TxNoteIndex<'c> {
    fn notes(&self) -> NoteStore<'c> {
        NoteStore::new(self.conn).with_partial_markdown_links(self.settings.partial_markdown_links)
    }

    fn links(&self) -> LinkStore<'c> {
        LinkStore::new(self.conn).with_partial_markdown_links(self.settings.partial_markdown_links)
    }

    fn queries(&self) -> QueryBuilder<'c> {
        QueryBuilder::new(self.conn).with_default_limit(self.settings.default_limit)
    }
}

impl NoteIndex for TxNoteIndex<'_> {
    fn find(&self, opts: &NoteFindOpts) -> IndexResult<Vec<ContextualNote>> {
        self.queries().find(opts).context("failed to find notes")
    }

    fn find_minimal(&self, opts: &NoteFindOpts) -> IndexResult<Vec<MinimalNote>> {
        self.queries().find_minimal(opts).context("failed to find notes")
    }

    fn find_collections(
        &self,
        kind: CollectionKind,
        sorters: &[CollectionSorter],
    ) -> IndexResult<Vec<Collection>> {
        CollectionStore::new(self.conn)
            .find_all(kind, sorters)
            .with_context(|| format!("failed to list the {} collections", kind))
    }

    fn find_links_between(&self, ids: &[NoteId]) -> IndexResult<Vec<ResolvedLink>> {
        self.links()
            .links_between(ids)
            .context("failed to find links between notes")
    }

    fn find_links_from(&self, id: NoteId) -> IndexResult<Vec<ResolvedLink>> {
        self.links()
            .links_of(id)
            .with_context(|| format!("failed to find the links of note {}", id))
    }

    fn indexed_paths(&self) -> IndexResult<Vec<FileMetadata>> {
        self.notes().indexed().context("failed to list indexed notes")
    }

    fn add(&self, note: &Note) -> IndexResult<NoteId> {
        self.notes()
            .add(note)
            .with_context(|| format!("{}: failed to add the note to the index", note.path))
    }

    fn update(&self, note: &Note) -> IndexResult<()> {
        self.notes()
            .update(note)
            .map(|_| ())
            .with_context(|| format!("{}: failed to update the note in the index", note.path))
    }

    fn remove(&self, path: &str) -> IndexResult<()> {
        self.notes()
            .remove(path)
            .with_context(|| format!("{}: failed to remove the note from the index", path))
    }

    fn commit(&self, f: &mut dyn FnMut(&dyn NoteIndex) -> IndexResult<()>) -> IndexResult<()> {
        f(self)
    }

    fn needs_reindexing(&self) -> IndexResult<bool> {
        MetadataStore::new(self.conn)
            .get_bool(REINDEXING_REQUIRED_KEY)
            .context("failed to read the index state")
    }

    fn set_needs_reindexing(&self, needed: bool) -> IndexResult<()> {
        MetadataStore::new(self.conn)
            .set_bool(REINDEXING_REQUIRED_KEY, needed)
            .context("failed to save the index state")?;
        info!(needed, "updated the reindexing flag");
        Ok(())
    }

    fn resolve_dangling_links(&self) -> IndexResult<usize> {
        self.links()
            .resolve_dangling()
            .context("failed to resolve dangling links")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_core::IndexError;

    fn index() -> SqliteNoteIndex {
        SqliteNoteIndex::new(SqlitePool::memory().unwrap())
    }

    #[test]
    fn test_commit_rolls_back_on_error() {
        let index = index();
        let res = index.commit(&mut |tx: &dyn NoteIndex| {
            tx.add(&Note::new("a.md"))?;
            Err(IndexError::storage("boom"))
        });
        assert!(res.is_err());
        assert!(index.indexed_paths().unwrap().is_empty());

        index
            .commit(&mut |tx: &dyn NoteIndex| {
                tx.add(&Note::new("a.md"))?;
                // Nested commits join the open transaction
                tx.commit(&mut |tx: &dyn NoteIndex| tx.add(&Note::new("b.md")).map(|_| ()))
            })
            .unwrap();
        assert_eq!(index.indexed_paths().unwrap().len(), 2);
    }

    #[test]
    fn test_reindexing_flag() {
        let index = index();
        // Fresh databases went through every migration
        assert!(index.needs_reindexing().unwrap());
        index.set_needs_reindexing(false).unwrap();
        assert!(!index.needs_reindexing().unwrap());
    }

    #[test]
    fn test_missing_note_cannot_be_updated_or_removed() {
        let index = index();
        assert!(index.update(&Note::new("nope.md")).is_err());
        assert!(index.remove("nope.md").is_err());
    }
}
