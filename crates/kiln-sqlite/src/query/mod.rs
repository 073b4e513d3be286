//! Note queries
//!
//! - [`fts`]: user query syntax to FTS5
//! - [`predicate`]: one SQL condition per filter
//! - [`builder`]: full statements, executed against a connection

pub mod builder;
pub mod fts;
pub mod predicate;

pub use builder::{CompiledQuery, Projection, QueryBuilder};
pub use fts::convert_query;
pub use predicate::{DateField, LinkDirection, Predicate, RenderContext, MAX_CLOSURE_ROWS};
