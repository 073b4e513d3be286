//! Content parser port
//!
//! Extracting titles, links and tags from note content is the job of an
//! external parser (e.g. a markdown one). The indexer only depends on this
//! trait.

use serde_json::{Map, Value};

use crate::error::IndexResult;
use crate::link::Link;

/// What a parser extracted from the content of a note
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParsedContent {
    pub title: String,
    /// First paragraph of the body
    pub lead: String,
    /// Content without the frontmatter and title heading
    pub body: String,
    /// Number of words in the whole content
    pub word_count: usize,
    /// Links with their hrefs as authored
    pub links: Vec<Link>,
    pub tags: Vec<String>,
    /// Frontmatter metadata
    pub metadata: Map<String, Value>,
}

/// Parses the raw content of a note
pub trait ContentParser {
    fn parse(&self, content: &str) -> IndexResult<ParsedContent>;
}

impl<F> ContentParser for F
where
    F: Fn(&str) -> IndexResult<ParsedContent>,
{
    fn parse(&self, content: &str) -> IndexResult<ParsedContent> {
        self(content)
    }
}

/// Number of whitespace separated words in a text
pub fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}
