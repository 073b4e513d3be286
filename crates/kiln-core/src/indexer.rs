//! Indexing orchestration
//!
//! Brings a [`NoteIndex`] in line with the files of a notebook: the files
//! listed by a [`FileScanner`] are diffed against the indexed ones, and
//! every added or modified file is parsed and stored. The whole pass runs
//! in a single transaction.

use std::time::Instant;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::diff::{diff, ChangeKind, PathChange};
use crate::error::{IndexError, IndexResult};
use crate::index::{NoteIndex, NoteIndexingStats};
use crate::link::{is_url, Link, LinkType};
use crate::note::Note;
use crate::parser::{count_words, ContentParser};
use crate::scan::{FileContent, FileScanner};

/// Indexes the notes of a notebook
pub struct NoteIndexer<'a> {
    index: &'a dyn NoteIndex,
    scanner: &'a dyn FileScanner,
    parser: &'a dyn ContentParser,
}

impl<'a> NoteIndexer<'a> {
    pub fn new(
        index: &'a dyn NoteIndex,
        scanner: &'a dyn FileScanner,
        parser: &'a dyn ContentParser,
    ) -> Self {
        Self {
            index,
            scanner,
            parser,
        }
    }

    /// Run an indexing pass.
    ///
    /// With `force`, or when the index was flagged as needing it, every
    /// note is reparsed even when unchanged. `on_change` is notified of
    /// each change before it is applied. Notes which fail to parse are
    /// logged, counted and skipped; any other failure rolls the whole
    /// pass back.
    pub fn index(
        &self,
        force: bool,
        on_change: &mut dyn FnMut(&PathChange),
    ) -> IndexResult<NoteIndexingStats> {
        let start = Instant::now();

        let needs_reindexing = self.index.needs_reindexing()?;
        if needs_reindexing {
            info!("index flagged for a full reindex");
        }
        let force = force || needs_reindexing;

        let source = self.scanner.scan()?;
        let mut stats = NoteIndexingStats::default();

        self.index.commit(&mut |index: &dyn NoteIndex| {
            let target = index.indexed_paths()?;
            let mut pass = NoteIndexingStats::default();

            let source_count = diff(source.clone(), target, force, |change| {
                on_change(&change);
                match change.kind {
                    ChangeKind::Added => match self.load_note(&change.path) {
                        Some(note) => {
                            index.add(&note)?;
                            pass.added_count += 1;
                        }
                        None => pass.failed_count += 1,
                    },
                    ChangeKind::Modified => match self.load_note(&change.path) {
                        Some(note) => {
                            index.update(&note)?;
                            pass.modified_count += 1;
                        }
                        None => pass.failed_count += 1,
                    },
                    ChangeKind::Removed => {
                        index.remove(&change.path)?;
                        pass.removed_count += 1;
                    }
                }
                Ok(())
            })?;
            pass.source_count = source_count;

            let resolved = index.resolve_dangling_links()?;
            if resolved > 0 {
                debug!(count = resolved, "resolved dangling links");
            }

            if needs_reindexing {
                index.set_needs_reindexing(false)?;
            }

            stats = pass;
            Ok(())
        })?;

        stats.duration = start.elapsed();
        info!(
            source = stats.source_count,
            added = stats.added_count,
            modified = stats.modified_count,
            removed = stats.removed_count,
            failed = stats.failed_count,
            duration_ms = stats.duration.as_millis() as u64,
            "indexing complete"
        );
        Ok(stats)
    }

    /// Read and parse a note file. Failures are logged and yield `None`.
    fn load_note(&self, path: &str) -> Option<Note> {
        let content = match self.scanner.read(path) {
            Ok(content) => content,
            Err(err) => {
                warn!(path = %path, error = %err, "failed to read note");
                return None;
            }
        };

        match self.build_note(path, content) {
            Ok(note) => Some(note),
            Err(err) => {
                warn!(path = %path, error = %err, "failed to parse note");
                None
            }
        }
    }

    fn build_note(&self, path: &str, content: FileContent) -> IndexResult<Note> {
        let checksum = hex::encode(Sha256::digest(&content.bytes));
        let text = String::from_utf8(content.bytes).map_err(|e| IndexError::Parse {
            path: path.to_string(),
            message: e.to_string(),
        })?;

        let parsed = self.parser.parse(&text).map_err(|e| {
            let message = match e {
                IndexError::Parse { message, .. } => message,
                other => other.to_string(),
            };
            IndexError::Parse {
                path: path.to_string(),
                message,
            }
        })?;

        let created = parsed
            .metadata
            .get("date")
            .and_then(Value::as_str)
            .and_then(parse_date)
            .or(content.created)
            .unwrap_or(content.modified);

        let word_count = if parsed.word_count > 0 {
            parsed.word_count
        } else {
            count_words(&text)
        };

        let links = parsed
            .links
            .into_iter()
            .map(|link| with_notebook_relative_href(path, link))
            .collect();

        Ok(Note {
            id: None,
            path: path.to_string(),
            title: parsed.title,
            lead: parsed.lead,
            body: parsed.body,
            raw_content: text,
            word_count,
            links,
            tags: parsed.tags,
            metadata: parsed.metadata,
            created,
            modified: content.modified,
            checksum,
        })
    }
}

/// Markdown links locate their target relative to the note containing
/// them. Store them relative to the notebook root instead, so they can be
/// resolved like any other href.
fn with_notebook_relative_href(source_path: &str, mut link: Link) -> Link {
    if link.link_type != LinkType::Markdown || link.is_external || is_url(&link.href) {
        return link;
    }
    if link.href.is_empty() || link.href.starts_with('#') {
        return link;
    }

    let href = match link.href.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => match source_path.rfind('/') {
            Some(idx) => format!("{}/{}", &source_path[..idx], link.href),
            None => link.href.clone(),
        },
    };
    link.href = normalize_path(&href);
    link
}

/// Resolve `.` and `..` components of a relative path. Components going
/// above the root are dropped.
pub fn normalize_path(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            part => parts.push(part),
        }
    }
    parts.join("/")
}

/// Parse a creation date from metadata
pub fn parse_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(date) = DateTime::parse_from_rfc3339(value) {
        return Some(date.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(date) = NaiveDateTime::parse_from_str(value, format) {
            return Some(date.and_utc());
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|date| date.and_utc())
}
