//! Link resolution
//!
//! Finds the notes an href may refer to. The same matching rules are used
//! to resolve link targets while indexing, to repair dangling links when a
//! note appears, and to turn href filters into sets of notes.
//!
//! Candidates are found in this order:
//!
//! 1. With partial matching, notes whose filename contains the href, or
//!    failing that notes whose path contains it anywhere.
//! 2. Notes whose path strictly matches the href: the href followed by
//!    more filename characters (e.g. a missing extension), or a directory
//!    containing the note. An exact path match wins over every other
//!    strict match.
//!
//! Within each group the shortest paths come first.

use kiln_core::link::is_url;
use kiln_core::NoteId;
use regex::Regex;
use rusqlite::{Connection, OptionalExtension, ToSql};
use tracing::trace;

use crate::error::SqliteResult;

/// An href stripped of its anchor, ready to be matched against paths
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HrefPattern {
    href: String,
}

impl HrefPattern {
    /// `None` for hrefs which can't refer to a note: URLs and anchors
    /// within the same note
    pub fn new(href: &str) -> Option<Self> {
        let href = href.trim();
        if is_url(href) {
            return None;
        }
        let href = href.split('#').next().unwrap_or_default();
        if href.is_empty() {
            return None;
        }
        Some(Self {
            href: href.to_string(),
        })
    }

    pub fn href(&self) -> &str {
        &self.href
    }

    /// Regex matching paths whose last segment contains the href
    pub fn filename_regex(&self) -> String {
        format!("^(?:.*/)?[^/]*{}[^/]*$", regex::escape(&self.href))
    }

    /// Regex matching paths starting with the href, followed by more
    /// filename characters or by a subpath
    pub fn strict_regex(&self) -> String {
        prefix_regex(&self.href)
    }

    /// `LIKE` operand matching the href literally, to be used with
    /// `ESCAPE '\'`
    pub fn like_escaped(&self) -> String {
        escape_like(&self.href)
    }

    /// How well `path` matches this href, lower is better. `None` when it
    /// doesn't match at all.
    ///
    /// The ranking agrees with the order of [`LinkResolver::resolve`], so
    /// that comparing the ranks of two paths tells which one the href
    /// would resolve to.
    pub fn rank(&self, path: &str, allow_partial: bool) -> Option<MatchRank> {
        let strict = self.matches_strict(path);
        let tier = if allow_partial {
            if self.matches_filename(path) {
                0
            } else if path
                .to_ascii_lowercase()
                .contains(&self.href.to_ascii_lowercase())
            {
                1
            } else if strict {
                2
            } else {
                return None;
            }
        } else if path == self.href {
            0
        } else if strict {
            1
        } else {
            return None;
        };

        // SQLite measures and folds text the same way
        Some(MatchRank {
            tier,
            length: path.chars().count(),
        })
    }

    fn matches_filename(&self, path: &str) -> bool {
        Regex::new(&self.filename_regex()).is_ok_and(|re| re.is_match(path))
    }

    fn matches_strict(&self, path: &str) -> bool {
        match path.strip_prefix(self.href.as_str()) {
            Some(rest) => {
                !rest.contains('/') || (rest.len() > 1 && rest.starts_with('/'))
            }
            None => false,
        }
    }
}

/// Rank of a path matching an href
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct MatchRank {
    tier: u8,
    length: usize,
}

/// Regex matching paths which extend `prefix` with more filename
/// characters, or live beneath it as a directory
pub fn prefix_regex(prefix: &str) -> String {
    let escaped = regex::escape(prefix);
    format!("^(?:{0}[^/]*|{0}/.+)$", escaped)
}

/// Escape the `LIKE` wildcards of a literal, for use with `ESCAPE '\'`
pub fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Resolves hrefs to note IDs
pub struct LinkResolver<'c> {
    conn: &'c Connection,
}

impl<'c> LinkResolver<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    /// Notes matching the href, best candidate first
    pub fn resolve(&self, href: &str, allow_partial: bool) -> SqliteResult<Vec<NoteId>> {
        let Some(pattern) = HrefPattern::new(href) else {
            return Ok(Vec::new());
        };

        let mut ids = Vec::new();
        if allow_partial {
            ids = self.query_ids("path REGEXP ?1", &pattern.filename_regex())?;
            if ids.is_empty() {
                ids = self.query_ids(
                    "path LIKE '%' || ?1 || '%' ESCAPE '\\'",
                    &pattern.like_escaped(),
                )?;
            }
        }

        for id in self.resolve_strict(&pattern)? {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }

        trace!(href, count = ids.len(), "resolved href");
        Ok(ids)
    }

    /// Best candidate for the href, if any
    pub fn resolve_one(&self, href: &str, allow_partial: bool) -> SqliteResult<Option<NoteId>> {
        Ok(self.resolve(href, allow_partial)?.into_iter().next())
    }

    fn resolve_strict(&self, pattern: &HrefPattern) -> SqliteResult<Vec<NoteId>> {
        let exact: Option<i64> = self
            .conn
            .query_row(
                "SELECT id FROM notes WHERE path = ?1",
                [pattern.href()],
                |row| row.get(0),
            )
            .optional()?;

        match exact {
            Some(id) => Ok(vec![NoteId(id)]),
            None => self.query_ids("path REGEXP ?1", &pattern.strict_regex()),
        }
    }

    fn query_ids(&self, condition: &str, param: &dyn ToSql) -> SqliteResult<Vec<NoteId>> {
        let sql = format!(
            "SELECT id FROM notes WHERE {} ORDER BY LENGTH(path) ASC, path ASC",
            condition
        );
        let mut stmt = self.conn.prepare_cached(&sql)?;
        let ids = stmt
            .query_map([param], |row| row.get(0).map(NoteId))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }
}
