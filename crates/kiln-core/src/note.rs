//! Note records
//!
//! A note is the indexed form of a single plaintext file in the notebook.
//! The file itself remains the source of truth; the index only holds what
//! the content parser extracted from it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::link::Link;

/// Unique ID of a note, assigned by the store on insertion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteId(pub i64);

impl NoteId {
    /// Store-assigned IDs are strictly positive
    pub fn is_valid(&self) -> bool {
        self.0 > 0
    }
}

impl std::fmt::Display for NoteId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Path and modification time of a note file, used for diffing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
    /// Path relative to the notebook root
    pub path: String,
    pub modified: DateTime<Utc>,
}

impl FileMetadata {
    pub fn new(path: impl Into<String>, modified: DateTime<Utc>) -> Self {
        Self {
            path: path.into(),
            modified,
        }
    }
}

/// Metadata and content of a single note
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    /// `None` until the note has been stored
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<NoteId>,

    /// Path relative to the notebook root. Unique in an index.
    pub path: String,

    pub title: String,

    /// First paragraph of the body
    pub lead: String,

    /// Content after any frontmatter and title heading
    pub body: String,

    /// Whole raw content of the file
    pub raw_content: String,

    pub word_count: usize,

    /// Outgoing links, internal or external
    #[serde(default)]
    pub links: Vec<Link>,

    #[serde(default)]
    pub tags: Vec<String>,

    /// Freeform frontmatter metadata
    #[serde(default)]
    pub metadata: Map<String, Value>,

    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,

    /// Hex SHA-256 of the raw file bytes
    pub checksum: String,
}

impl Note {
    /// Create an empty note at the given path
    pub fn new(path: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: None,
            path: path.into(),
            title: String::new(),
            lead: String::new(),
            body: String::new(),
            raw_content: String::new(),
            word_count: 0,
            links: Vec::new(),
            tags: Vec::new(),
            metadata: Map::new(),
            created: now,
            modified: now,
            checksum: String::new(),
        }
    }

    /// Builder-style: set the title
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Builder-style: set the body
    #[must_use]
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Builder-style: set tags
    #[must_use]
    pub fn with_tags<S: Into<String>>(mut self, tags: impl IntoIterator<Item = S>) -> Self {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Builder-style: set outgoing links
    #[must_use]
    pub fn with_links(mut self, links: Vec<Link>) -> Self {
        self.links = links;
        self
    }

    /// Builder-style: set metadata
    #[must_use]
    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Builder-style: set the modification date
    #[must_use]
    pub fn with_modified(mut self, modified: DateTime<Utc>) -> Self {
        self.modified = modified;
        self
    }

    /// Builder-style: set the creation date
    #[must_use]
    pub fn with_created(mut self, created: DateTime<Utc>) -> Self {
        self.created = created;
        self
    }

    /// Filename portion of the path
    pub fn filename(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    /// Filename without its extension
    pub fn filename_stem(&self) -> &str {
        let filename = self.filename();
        match filename.rfind('.') {
            Some(0) | None => filename,
            Some(idx) => &filename[..idx],
        }
    }

    pub fn as_minimal(&self) -> MinimalNote {
        MinimalNote {
            id: self.id,
            path: self.path.clone(),
            title: self.title.clone(),
            metadata: self.metadata.clone(),
        }
    }

    pub fn file_metadata(&self) -> FileMetadata {
        FileMetadata::new(self.path.clone(), self.modified)
    }
}

/// Lightweight projection of a note, for listings and lookups
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinimalNote {
    pub id: Option<NoteId>,
    pub path: String,
    pub title: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// A note with context-sensitive excerpts
///
/// Snippets hold either the matched search terms or the paragraphs of the
/// links followed to reach the note, highlighted with [`MATCH_START`] and
/// [`MATCH_END`] markers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextualNote {
    #[serde(flatten)]
    pub note: Note,
    #[serde(default)]
    pub snippets: Vec<String>,
}

/// Opening marker of a highlighted match in a snippet
pub const MATCH_START: &str = "<kiln:match>";

/// Closing marker of a highlighted match in a snippet
pub const MATCH_END: &str = "</kiln:match>";
