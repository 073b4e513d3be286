//! SQLite note index for Kiln
//!
//! This crate provides the SQLite implementation of the
//! [`NoteIndex`](kiln_core::NoteIndex) port.
//!
//! ## Features
//!
//! - **Link graph**: outbound links with their targets resolved, repaired
//!   incrementally as notes come and go
//! - **FTS5 Full-Text Search**: relevance-ranked matches with highlighted
//!   snippets
//! - **Query builder**: tags, hrefs, paths, mentions, dates and recursive
//!   link reachability compiled to a single bound statement
//! - **Migrations**: ordered and idempotent, flagging the index for a full
//!   reindex when needed
//! - **Thread Safety**: Arc<Mutex<Connection>> pattern for concurrent access
//!
//! ## Usage
//!
//! ```rust,ignore
//! use kiln_core::{NoteFindOpts, NoteIndex};
//! use kiln_sqlite::{SqliteConfig, SqliteNoteIndex, SqlitePool};
//!
//! let pool = SqlitePool::new(SqliteConfig::new("./.kiln/notebook.db"))?;
//! let index = SqliteNoteIndex::new(pool).with_config(&notebook_config);
//!
//! let opts = NoteFindOpts {
//!     tags: vec!["fiction|fantasy".into()],
//!     ..Default::default()
//! };
//! for note in index.find(&opts)? {
//!     println!("{}", note.note.path);
//! }
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod functions;
pub mod note_index;
pub mod query;
pub mod resolver;
pub mod schema;
pub mod store;

// Re-exports
pub use config::SqliteConfig;
pub use connection::SqlitePool;
pub use error::{SqliteError, SqliteResult};
pub use note_index::{SqliteNoteIndex, TxNoteIndex};
pub use query::{CompiledQuery, Predicate, QueryBuilder};
pub use resolver::{HrefPattern, LinkResolver};
