//! Core of the Kiln note index
//!
//! Storage-agnostic building blocks for indexing a notebook of plain text
//! notes:
//!
//! - **Domain types**: [`Note`], [`Link`], [`Collection`] and the
//!   [`NoteFindOpts`] query description
//! - **Ports**: [`NoteIndex`] implemented by a store, [`ContentParser`] and
//!   [`FileScanner`] provided by collaborators
//! - **Indexing**: walk-order [`diff`](diff::diff) and the [`NoteIndexer`]
//!   orchestrator
//!
//! ## Usage
//!
//! ```rust,ignore
//! use kiln_core::{NoteIndexer, NotebookConfig, WalkScanner};
//!
//! let config = NotebookConfig::load(root.join(".kiln/config.toml"))?;
//! let scanner = WalkScanner::new(&root, &config)?;
//! let indexer = NoteIndexer::new(&index, &scanner, &parser);
//! let stats = indexer.index(false, &mut |change| println!("{:?}", change))?;
//! println!("{}", stats);
//! ```

pub mod collection;
pub mod config;
pub mod diff;
pub mod error;
pub mod find;
pub mod index;
pub mod indexer;
pub mod link;
pub mod note;
pub mod parser;
pub mod scan;

// Re-exports
pub use collection::{Collection, CollectionId, CollectionKind, CollectionSortField, CollectionSorter};
pub use config::NotebookConfig;
pub use diff::{ChangeKind, PathChange};
pub use error::{IndexError, IndexResult, ResultExt};
pub use find::{LinkFilter, MatchStrategy, NoteFindOpts, NoteSortField, NoteSorter, TagGroup};
pub use index::{NoteIndex, NoteIndexingStats};
pub use indexer::NoteIndexer;
pub use link::{Link, LinkRelation, LinkType, ResolvedLink};
pub use note::{ContextualNote, FileMetadata, MinimalNote, Note, NoteId, MATCH_END, MATCH_START};
pub use parser::{ContentParser, ParsedContent};
pub use scan::{FileContent, FileScanner, WalkScanner};
