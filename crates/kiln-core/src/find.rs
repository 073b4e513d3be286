//! Filtering and sorting options for note queries
//!
//! [`NoteFindOpts`] is a plain description of what to find. Every filter
//! category combines with the others using an implicit AND; it is up to the
//! `NoteIndex` implementation to compile it into a query.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::collection::split_order_suffix;
use crate::error::{IndexError, IndexResult};
use crate::note::NoteId;

/// How match terms are compared against note content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStrategy {
    /// Tokenized full-text search, ranked by relevance
    #[default]
    Fts,
    /// Case-insensitive substring
    Exact,
    /// Regular expression over the raw content
    Re,
}

impl MatchStrategy {
    pub fn parse(s: &str) -> IndexResult<Self> {
        match s {
            "fts" | "f" => Ok(MatchStrategy::Fts),
            "exact" | "e" => Ok(MatchStrategy::Exact),
            "re" | "r" | "grep" => Ok(MatchStrategy::Re),
            _ => Err(IndexError::invalid_filter(format!(
                "{}: unknown match strategy\ntry fts (full-text search), re (regular expression) or exact",
                s
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStrategy::Fts => "fts",
            MatchStrategy::Exact => "exact",
            MatchStrategy::Re => "re",
        }
    }
}

/// Graph reachability filter over links
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LinkFilter {
    /// Hrefs of the notes at the other end of the links
    pub hrefs: Vec<String>,
    /// Select the notes *not* reachable
    #[serde(default)]
    pub negate: bool,
    /// Follow chains of links instead of direct links only
    #[serde(default)]
    pub recursive: bool,
    /// Maximum number of hops when recursive. `None` is unbounded.
    #[serde(default)]
    pub max_distance: Option<usize>,
}

impl LinkFilter {
    pub fn new<S: Into<String>>(hrefs: impl IntoIterator<Item = S>) -> Self {
        Self {
            hrefs: hrefs.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn negated(mut self) -> Self {
        self.negate = true;
        self
    }

    #[must_use]
    pub fn recursive(mut self, max_distance: Option<usize>) -> Self {
        self.recursive = true;
        self.max_distance = max_distance;
        self
    }
}

/// Note field used as an order term
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoteSortField {
    Created,
    Modified,
    Path,
    Random,
    Title,
    WordCount,
    /// Length of the path. Not user-facing: used to pick the best match
    /// when looking a note up by href.
    PathLength,
}

/// An order term for note queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteSorter {
    pub field: NoteSortField,
    pub ascending: bool,
}

impl NoteSorter {
    pub fn new(field: NoteSortField, ascending: bool) -> Self {
        Self { field, ascending }
    }

    /// Parse a sort term such as `created`, `t` or `word-count-`.
    ///
    /// Without a `+`/`-` suffix the field's default direction is used:
    /// dates sort newest first, everything else ascending.
    pub fn parse(term: &str) -> IndexResult<Self> {
        let (name, ascending) = split_order_suffix(term);

        let (field, default_ascending) = match name {
            "created" | "c" => (NoteSortField::Created, false),
            "modified" | "m" => (NoteSortField::Modified, false),
            "path" | "p" => (NoteSortField::Path, true),
            "title" | "t" => (NoteSortField::Title, true),
            "random" | "r" => (NoteSortField::Random, true),
            "word-count" | "wc" => (NoteSortField::WordCount, true),
            _ => {
                return Err(IndexError::invalid_filter(format!(
                    "{}: unknown sorting term\ntry created, modified, path, title, random or word-count",
                    name
                )))
            }
        };

        Ok(Self::new(field, ascending.unwrap_or(default_ascending)))
    }

    /// Parse a list of sort terms in reverse order, so that terms given
    /// last (e.g. on the command line) take precedence over those set
    /// earlier (e.g. in an alias).
    pub fn parse_all<S: AsRef<str>>(terms: &[S]) -> IndexResult<Vec<Self>> {
        terms.iter().rev().map(|t| Self::parse(t.as_ref())).collect()
    }
}

/// One tag filter entry: an OR-group of glob patterns
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagGroup {
    pub globs: Vec<String>,
    pub negate: bool,
}

impl TagGroup {
    /// Parse a tag filter entry such as `fiction|fantasy`, `a OR b`,
    /// `-draft` or `NOT draft`.
    ///
    /// Returns `None` when the entry holds no tag. A negation inside a
    /// multi-tag group is ambiguous and rejected.
    pub fn parse(entry: &str) -> IndexResult<Option<Self>> {
        let mut globs = Vec::new();
        let mut negate = false;
        let mut negate_next = false;

        for token in entry.split(|c: char| c == '|' || c.is_whitespace()) {
            match token {
                "" | "OR" => continue,
                "NOT" => {
                    negate_next = true;
                    continue;
                }
                _ => {}
            }

            let (glob, negated) = match token.strip_prefix('-') {
                Some(rest) => (rest, true),
                None => (token, negate_next),
            };
            negate_next = false;

            if glob.is_empty() {
                // A lone `-` negates the following tag
                negate_next = negated;
                continue;
            }
            negate |= negated;
            globs.push(glob.to_string());
        }

        if globs.is_empty() {
            return Ok(None);
        }
        if negate && globs.len() > 1 {
            return Err(IndexError::invalid_filter(format!(
                "cannot negate a tag in a OR group: {}",
                entry
            )));
        }

        Ok(Some(Self { globs, negate }))
    }
}

/// Filtering, sorting and pagination criteria for finding notes
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NoteFindOpts {
    /// Terms matched against note content, ANDed together
    pub match_terms: Vec<String>,
    pub match_strategy: MatchStrategy,

    /// Keep only notes matching one of these hrefs
    pub include_hrefs: Vec<String>,
    /// Drop notes matching any of these hrefs
    pub exclude_hrefs: Vec<String>,
    /// Let href filters match notes partially (by filename or anywhere
    /// in the path) rather than strictly
    pub allow_partial_hrefs: bool,

    /// Keep only notes at, or beneath, one of these path prefixes
    pub include_paths: Vec<String>,
    /// Drop notes at, or beneath, any of these path prefixes
    pub exclude_paths: Vec<String>,

    pub exclude_ids: Vec<NoteId>,

    /// Tag filter entries, ANDed together. See [`TagGroup::parse`].
    pub tags: Vec<String>,
    /// Keep only notes without any tag
    pub tagless: bool,

    /// Keep notes mentioning the title (or an alias) of these notes
    pub mention: Vec<String>,
    /// Keep notes whose title (or an alias) is mentioned by these notes
    pub mentioned_by: Vec<String>,

    /// Keep notes linking to the given ones
    pub link_to: Option<LinkFilter>,
    /// Keep notes linked by the given ones
    pub linked_by: Option<LinkFilter>,
    /// Keep notes two links away from the given ones, in either direction
    pub related: Vec<String>,

    /// Keep notes no other note links to
    pub orphan: bool,

    pub created_start: Option<DateTime<Utc>>,
    pub created_end: Option<DateTime<Utc>>,
    pub modified_start: Option<DateTime<Utc>>,
    pub modified_end: Option<DateTime<Utc>>,

    pub limit: Option<usize>,
    pub sorters: Vec<NoteSorter>,
}

impl NoteFindOpts {
    /// Copy of these options excluding the given note
    #[must_use]
    pub fn excluding_id(mut self, id: NoteId) -> Self {
        if !self.exclude_ids.contains(&id) {
            self.exclude_ids.push(id);
        }
        self
    }

    /// Options finding the single best match for an href
    pub fn best_match_for(href: impl Into<String>, allow_partial: bool) -> Self {
        Self {
            include_hrefs: vec![href.into()],
            allow_partial_hrefs: allow_partial,
            sorters: vec![NoteSorter::new(NoteSortField::PathLength, true)],
            limit: Some(1),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("c", NoteSortField::Created, false)]
    #[test_case("c+", NoteSortField::Created, true)]
    #[test_case("created-", NoteSortField::Created, false)]
    #[test_case("modified", NoteSortField::Modified, false)]
    #[test_case("m+", NoteSortField::Modified, true)]
    #[test_case("p", NoteSortField::Path, true)]
    #[test_case("path-", NoteSortField::Path, false)]
    #[test_case("title", NoteSortField::Title, true)]
    #[test_case("t-", NoteSortField::Title, false)]
    #[test_case("random", NoteSortField::Random, true)]
    #[test_case("wc", NoteSortField::WordCount, true)]
    #[test_case("word-count-", NoteSortField::WordCount, false)]
    fn test_parse_sorter(term: &str, field: NoteSortField, ascending: bool) {
        assert_eq!(NoteSorter::parse(term).unwrap(), NoteSorter::new(field, ascending));
    }

    #[test]
    fn test_parse_unknown_sorter() {
        let err = NoteSorter::parse("foobar").unwrap_err();
        assert!(err.is_user_error());
        assert!(err.to_string().starts_with("foobar: unknown sorting term"));
    }

    #[test_case("word-count--")]
    #[test_case("title+-")]
    #[test_case("c++")]
    fn test_parse_rejects_repeated_order_suffix(term: &str) {
        let err = NoteSorter::parse(term).unwrap_err();
        assert!(err.is_user_error());
        assert!(err.to_string().contains("unknown sorting term"));
    }

    #[test]
    fn test_parse_all_sorters_in_reverse_order() {
        let sorters = NoteSorter::parse_all(&["c+", "title", "random"]).unwrap();
        assert_eq!(
            sorters,
            vec![
                NoteSorter::new(NoteSortField::Random, true),
                NoteSorter::new(NoteSortField::Title, true),
                NoteSorter::new(NoteSortField::Created, true),
            ]
        );
        assert!(NoteSorter::parse_all(&["c", "foobar"]).is_err());
    }

    #[test_case("f", MatchStrategy::Fts)]
    #[test_case("fts", MatchStrategy::Fts)]
    #[test_case("r", MatchStrategy::Re)]
    #[test_case("re", MatchStrategy::Re)]
    #[test_case("grep", MatchStrategy::Re)]
    #[test_case("e", MatchStrategy::Exact)]
    #[test_case("exact", MatchStrategy::Exact)]
    fn test_parse_match_strategy(s: &str, expected: MatchStrategy) {
        assert_eq!(MatchStrategy::parse(s).unwrap(), expected);
    }

    #[test]
    fn test_parse_unknown_match_strategy() {
        let err = MatchStrategy::parse("foobar").unwrap_err();
        assert_eq!(
            err.to_string(),
            "foobar: unknown match strategy\ntry fts (full-text search), re (regular expression) or exact"
        );
    }

    #[test]
    fn test_tag_group_or_separators() {
        for entry in ["fiction|fantasy", "fiction OR fantasy", "fiction fantasy", " fiction | fantasy "] {
            let group = TagGroup::parse(entry).unwrap().unwrap();
            assert_eq!(group.globs, vec!["fiction", "fantasy"], "{entry}");
            assert!(!group.negate);
        }
    }

    #[test]
    fn test_tag_group_negation() {
        for entry in ["-draft", "NOT draft", "NOT -draft", "- draft"] {
            let group = TagGroup::parse(entry).unwrap().unwrap();
            assert_eq!(group.globs, vec!["draft"], "{entry}");
            assert!(group.negate, "{entry}");
        }
    }

    #[test]
    fn test_tag_group_keyword_prefix_is_part_of_the_tag() {
        let group = TagGroup::parse("NOTES").unwrap().unwrap();
        assert_eq!(group.globs, vec!["NOTES"]);
        assert!(!group.negate);
    }

    #[test]
    fn test_tag_group_rejects_negation_in_or_group() {
        let err = TagGroup::parse("fiction|-fantasy").unwrap_err();
        assert_eq!(err.to_string(), "cannot negate a tag in a OR group: fiction|-fantasy");
    }

    #[test]
    fn test_tag_group_empty() {
        assert_eq!(TagGroup::parse("  | ").unwrap(), None);
        assert_eq!(TagGroup::parse("-").unwrap(), None);
    }

    #[test]
    fn test_excluding_id_is_idempotent() {
        let opts = NoteFindOpts::default()
            .excluding_id(NoteId(3))
            .excluding_id(NoteId(3));
        assert_eq!(opts.exclude_ids, vec![NoteId(3)]);
    }
}
