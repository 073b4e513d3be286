//! The note index port
//!
//! [`NoteIndex`] is the contract between the storage-agnostic parts of the
//! system (the indexer, command surfaces) and a concrete store. The index
//! over the notebook files is disposable: it can always be rebuilt from
//! the files themselves.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::collection::{Collection, CollectionKind, CollectionSorter};
use crate::error::IndexResult;
use crate::find::NoteFindOpts;
use crate::link::ResolvedLink;
use crate::note::{ContextualNote, FileMetadata, MinimalNote, Note, NoteId};

/// Persistent index of the notes in a notebook
///
/// Every operation runs in its own transaction unless it is invoked from
/// the closure given to [`NoteIndex::commit`], in which case it joins the
/// enclosing one.
pub trait NoteIndex {
    /// Find notes matching the given criteria, with snippets
    fn find(&self, opts: &NoteFindOpts) -> IndexResult<Vec<ContextualNote>>;

    /// Same as [`find`](NoteIndex::find) with a lighter projection
    fn find_minimal(&self, opts: &NoteFindOpts) -> IndexResult<Vec<MinimalNote>>;

    /// List the collections of the given kind with their note counts
    fn find_collections(
        &self,
        kind: CollectionKind,
        sorters: &[CollectionSorter],
    ) -> IndexResult<Vec<Collection>>;

    /// Links whose source and target are both among the given notes
    fn find_links_between(&self, ids: &[NoteId]) -> IndexResult<Vec<ResolvedLink>>;

    /// Outbound links of a note, dangling ones included
    fn find_links_from(&self, id: NoteId) -> IndexResult<Vec<ResolvedLink>>;

    /// Path and modification time of every indexed note, in walk order.
    ///
    /// The returned list can be iterated as many times as needed.
    fn indexed_paths(&self) -> IndexResult<Vec<FileMetadata>>;

    /// Index a new note and return its ID
    fn add(&self, note: &Note) -> IndexResult<NoteId>;

    /// Replace the indexed data of the note at `note.path`
    fn update(&self, note: &Note) -> IndexResult<()>;

    /// Remove the note at the given path from the index
    fn remove(&self, path: &str) -> IndexResult<()>;

    /// Run `f` in a single transaction.
    ///
    /// The transaction is committed if `f` succeeds and rolled back
    /// otherwise, in which case the error is returned.
    fn commit(&self, f: &mut dyn FnMut(&dyn NoteIndex) -> IndexResult<()>) -> IndexResult<()>;

    /// Whether every note must be reparsed on the next indexing pass
    fn needs_reindexing(&self) -> IndexResult<bool>;

    fn set_needs_reindexing(&self, needed: bool) -> IndexResult<()>;

    /// Try to resolve every dangling internal link against the current
    /// notes. Returns the number of links that found a target.
    fn resolve_dangling_links(&self) -> IndexResult<usize>;

    /// Best single note matching an href, the least nested one winning.
    ///
    /// Unlike an href filter, an href matching nothing is not an error.
    fn find_by_href(&self, href: &str, allow_partial: bool) -> IndexResult<Option<MinimalNote>> {
        let opts = NoteFindOpts::best_match_for(href, allow_partial);
        match self.find_minimal(&opts) {
            Ok(notes) => Ok(notes.into_iter().next()),
            Err(err) if err.is_user_error() => Ok(None),
            Err(err) => Err(err),
        }
    }
}

/// Summary of an indexing pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NoteIndexingStats {
    /// Number of notes in the source
    pub source_count: usize,
    pub added_count: usize,
    pub modified_count: usize,
    pub removed_count: usize,
    /// Number of notes skipped because they could not be parsed
    pub failed_count: usize,
    pub duration: Duration,
}

impl NoteIndexingStats {
    pub fn has_changes(&self) -> bool {
        self.added_count + self.modified_count + self.removed_count > 0
    }
}

impl fmt::Display for NoteIndexingStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Indexed {} {} in {}ms",
            self.source_count,
            if self.source_count == 1 { "note" } else { "notes" },
            self.duration.as_millis()
        )?;
        writeln!(f, "  + {} added", self.added_count)?;
        writeln!(f, "  ~ {} modified", self.modified_count)?;
        write!(f, "  - {} removed", self.removed_count)?;
        if self.failed_count > 0 {
            write!(f, "\n  ! {} failed", self.failed_count)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_display() {
        let stats = NoteIndexingStats {
            source_count: 10,
            added_count: 1,
            modified_count: 3,
            removed_count: 2,
            failed_count: 0,
            duration: Duration::from_millis(42),
        };
        assert_eq!(
            stats.to_string(),
            "Indexed 10 notes in 42ms\n  + 1 added\n  ~ 3 modified\n  - 2 removed"
        );
        assert!(stats.has_changes());
    }

    #[test]
    fn test_stats_display_reports_failures() {
        let stats = NoteIndexingStats {
            source_count: 1,
            failed_count: 1,
            ..Default::default()
        };
        let text = stats.to_string();
        assert!(text.starts_with("Indexed 1 note in"));
        assert!(text.ends_with("  ! 1 failed"));
        assert!(!stats.has_changes());
    }
}
