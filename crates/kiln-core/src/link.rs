//! Links between notes
//!
//! A [`Link`] is what the content parser found in a note. Once stored it
//! becomes a [`ResolvedLink`], whose target may still be unknown: a link
//! whose href matches no indexed note is kept "dangling" and re-resolved
//! on later indexing passes.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::note::NoteId;

/// Syntax a link was authored with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LinkType {
    /// `[title](href)`
    #[default]
    Markdown,
    /// `[[href]]`
    WikiLink,
    /// A bare URL detected in the text
    Implicit,
}

impl LinkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkType::Markdown => "markdown",
            LinkType::WikiLink => "wiki-link",
            LinkType::Implicit => "implicit",
        }
    }

    /// Parse the stored representation. Unknown values fall back to
    /// markdown, the strictest resolution mode.
    pub fn from_stored(s: &str) -> Self {
        match s {
            "wiki-link" => LinkType::WikiLink,
            "implicit" => LinkType::Implicit,
            _ => LinkType::Markdown,
        }
    }

    /// Whether hrefs of this type may match notes partially.
    ///
    /// Wiki-links name notes rather than locate them, so `[[report]]`
    /// should find `archive/report.md`.
    pub fn allows_partial_match(&self) -> bool {
        matches!(self, LinkType::WikiLink)
    }
}

impl std::fmt::Display for LinkType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Relationship between a link's source and its target
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LinkRelation(pub String);

impl LinkRelation {
    /// The target is a child of the source
    pub fn down() -> Self {
        Self("down".to_string())
    }

    /// The target is a parent of the source
    pub fn up() -> Self {
        Self("up".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A link found in a note's content
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Link {
    /// Label of the link
    pub title: String,

    /// Destination as authored
    pub href: String,

    #[serde(rename = "type", default)]
    pub link_type: LinkType,

    /// The target is a remote resource (e.g. HTTP)
    pub is_external: bool,

    #[serde(default)]
    pub rels: Vec<LinkRelation>,

    /// Paragraph surrounding the link
    pub snippet: String,

    /// Byte offset of the snippet start in the note content
    pub snippet_start: usize,

    /// Byte offset of the snippet end in the note content
    pub snippet_end: usize,
}

impl Link {
    /// Create an internal link of the given type
    pub fn new(title: impl Into<String>, href: impl Into<String>, link_type: LinkType) -> Self {
        let href = href.into();
        Self {
            title: title.into(),
            is_external: is_url(&href),
            href,
            link_type,
            ..Default::default()
        }
    }

    /// Builder-style: set the surrounding snippet and its span
    #[must_use]
    pub fn with_snippet(mut self, snippet: impl Into<String>, start: usize, end: usize) -> Self {
        self.snippet = snippet.into();
        self.snippet_start = start;
        self.snippet_end = end;
        self
    }

    /// Builder-style: set relations
    #[must_use]
    pub fn with_rels(mut self, rels: Vec<LinkRelation>) -> Self {
        self.rels = rels;
        self
    }
}

/// A stored link with its endpoints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedLink {
    #[serde(flatten)]
    pub link: Link,
    pub source_id: NoteId,
    pub source_path: String,
    /// `None` while the link is dangling
    pub target_id: Option<NoteId>,
    pub target_path: Option<String>,
}

impl ResolvedLink {
    pub fn is_dangling(&self) -> bool {
        self.target_id.is_none()
    }
}

static URL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:[a-zA-Z][a-zA-Z0-9+.\-]*://\S+|mailto:\S+)$").expect("valid URL regex")
});

/// Whether the href is a URL rather than a path inside the notebook
pub fn is_url(href: &str) -> bool {
    URL_REGEX.is_match(href.trim())
}
