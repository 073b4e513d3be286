//! Find query compilation and execution
//!
//! [`QueryBuilder`] turns a [`NoteFindOpts`] into a single SQL statement
//! over the `notes_with_metadata` view. Href-based filters are resolved to
//! note IDs first, with the same rules as link targets.

use kiln_core::{
    ContextualNote, Link, MatchStrategy, MinimalNote, Note, NoteFindOpts, NoteId, NoteSortField,
    NoteSorter, TagGroup, MATCH_END, MATCH_START,
};
use regex::Regex;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, Row};
use serde_json::Map;
use tracing::trace;

use crate::error::{SqliteError, SqliteResult};
use crate::functions::mention_query;
use crate::query::fts::convert_query;
use crate::query::predicate::{DateField, LinkDirection, Predicate, RenderContext};
use crate::resolver::LinkResolver;
use crate::store::{parse_date, LinkStore};

const FULL_COLUMNS: &str = "n.id, n.path, n.title, n.lead, n.body, n.raw_content, n.word_count, \
     n.metadata, n.checksum, n.created, n.modified, n.tags";

const MINIMAL_COLUMNS: &str = "n.id, n.path, n.title, n.metadata";

/// Relevance weights of the `path`, `title` and `body` FTS columns
const BM25_ORDER: &str = "bm25(notes_fts, 1000.0, 500.0, 1.0)";

/// Columns selected by a query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Projection {
    /// Whole notes with their snippets
    Full,
    Minimal,
}

/// A SQL statement with its bound parameters
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub sql: String,
    pub params: Vec<Value>,
}

pub struct QueryBuilder<'c> {
    conn: &'c Connection,
    default_limit: Option<usize>,
}

impl<'c> QueryBuilder<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self {
            conn,
            default_limit: None,
        }
    }

    /// Limit applied when the options don't set one
    #[must_use]
    pub fn with_default_limit(mut self, limit: Option<usize>) -> Self {
        self.default_limit = limit;
        self
    }

    /// Compile the filters of `opts` into predicates, resolving hrefs
    pub fn predicates(&self, opts: &NoteFindOpts) -> SqliteResult<Vec<Predicate>> {
        let mut predicates = Vec::new();
        let mut exclude_ids = opts.exclude_ids.clone();
        let mut fts_parts = Vec::new();
        let partial = opts.allow_partial_hrefs;

        for term in opts.match_terms.iter().map(|t| t.trim()).filter(|t| !t.is_empty()) {
            match opts.match_strategy {
                MatchStrategy::Fts => fts_parts.push(format!("({})", convert_query(term))),
                MatchStrategy::Exact => predicates.push(Predicate::ContentContains(term.to_string())),
                MatchStrategy::Re => {
                    Regex::new(term).map_err(|e| {
                        SqliteError::InvalidFilter(format!("{}: invalid regular expression: {}", term, e))
                    })?;
                    predicates.push(Predicate::ContentRegex(term.to_string()));
                }
            }
        }

        if !opts.mention.is_empty() {
            if opts.match_strategy != MatchStrategy::Fts {
                return Err(SqliteError::InvalidFilter(format!(
                    "the {} match strategy cannot be used together with mention",
                    opts.match_strategy.as_str()
                )));
            }
            let ids = self.resolve_hrefs(&opts.mention, partial)?;
            let queries = self.mention_queries(&ids)?;
            fts_parts.push(format!("({})", queries.join(" OR ")));
            extend_unique(&mut exclude_ids, &ids);
        }

        if !fts_parts.is_empty() {
            predicates.push(Predicate::FullText(fts_parts.join(" AND ")));
        }

        if !opts.include_hrefs.is_empty() {
            let ids = self.resolve_hrefs(&opts.include_hrefs, partial)?;
            predicates.push(Predicate::IdIn(ids));
        }
        if !opts.exclude_hrefs.is_empty() {
            let ids = self.resolve_hrefs(&opts.exclude_hrefs, partial)?;
            extend_unique(&mut exclude_ids, &ids);
        }

        if !opts.include_paths.is_empty() {
            predicates.push(Predicate::PathPrefix {
                prefixes: opts.include_paths.clone(),
                negate: false,
            });
        }
        if !opts.exclude_paths.is_empty() {
            predicates.push(Predicate::PathPrefix {
                prefixes: opts.exclude_paths.clone(),
                negate: true,
            });
        }

        for entry in &opts.tags {
            if let Some(group) = TagGroup::parse(entry)? {
                predicates.push(Predicate::Tags(group));
            }
        }
        if opts.tagless {
            predicates.push(Predicate::Tagless);
        }

        if !opts.mentioned_by.is_empty() {
            let ids = self.resolve_hrefs(&opts.mentioned_by, partial)?;
            extend_unique(&mut exclude_ids, &ids);
            predicates.push(Predicate::MentionedBy(ids));
        }

        let link_filters = [
            (LinkDirection::LinkedBy, &opts.linked_by),
            (LinkDirection::LinkingTo, &opts.link_to),
        ];
        for (direction, filter) in link_filters {
            let Some(filter) = filter.as_ref().filter(|f| !f.hrefs.is_empty()) else {
                continue;
            };
            predicates.push(Predicate::Links {
                direction,
                ids: self.resolve_hrefs(&filter.hrefs, partial)?,
                negate: filter.negate,
                recursive: filter.recursive,
                max_distance: filter.max_distance,
            });
        }

        if !opts.related.is_empty() {
            let ids = self.resolve_hrefs(&opts.related, partial)?;
            predicates.push(Predicate::Related(ids));
        }

        if opts.orphan {
            predicates.push(Predicate::Orphan);
        }

        if opts.created_start.is_some() || opts.created_end.is_some() {
            predicates.push(Predicate::DateRange {
                field: DateField::Created,
                start: opts.created_start,
                end: opts.created_end,
            });
        }
        if opts.modified_start.is_some() || opts.modified_end.is_some() {
            predicates.push(Predicate::DateRange {
                field: DateField::Modified,
                start: opts.modified_start,
                end: opts.modified_end,
            });
        }

        if !exclude_ids.is_empty() {
            predicates.push(Predicate::IdNotIn(exclude_ids));
        }

        Ok(predicates)
    }

    /// Compile `opts` into a single statement
    pub fn build(&self, opts: &NoteFindOpts, projection: Projection) -> SqliteResult<CompiledQuery> {
        let predicates = self.predicates(opts)?;
        let uses_fts = predicates
            .iter()
            .any(|p| matches!(p, Predicate::FullText(_)));

        let mut ctx = RenderContext::new();
        let conditions: Vec<String> = predicates.iter().map(|p| p.render(&mut ctx)).collect();

        let columns = match projection {
            Projection::Minimal => MINIMAL_COLUMNS.to_string(),
            Projection::Full => {
                let snippet = if uses_fts {
                    format!(
                        "snippet(notes_fts, 2, {}, {}, '…', 20)",
                        ctx.bind(MATCH_START.to_string()),
                        ctx.bind(MATCH_END.to_string())
                    )
                } else if let Some(links) = ctx.link_snippet() {
                    links
                } else {
                    "n.lead".to_string()
                };
                format!("{}, {} AS snippets", FULL_COLUMNS, snippet)
            }
        };

        let mut order: Vec<String> = opts.sorters.iter().map(order_term).collect();
        if uses_fts {
            order.push(BM25_ORDER.to_string());
        }
        order.push("n.title ASC".to_string());
        order.push("n.path ASC".to_string());

        let limit = opts
            .limit
            .or(self.default_limit)
            .filter(|limit| *limit > 0)
            .map(|limit| ctx.bind(limit as i64));

        let mut sql = ctx.with_clause().unwrap_or_default();
        sql.push_str(&format!("SELECT {}\n  FROM notes_with_metadata n\n", columns));
        if uses_fts {
            sql.push_str("  JOIN notes_fts ON notes_fts.rowid = n.id\n");
        }
        if !conditions.is_empty() {
            sql.push_str(&format!(" WHERE {}\n", conditions.join("\n   AND ")));
        }
        sql.push_str(&format!(" ORDER BY {}\n", order.join(", ")));
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {}\n", limit));
        }

        trace!(%sql, "compiled find query");
        Ok(CompiledQuery {
            sql,
            params: ctx.into_params(),
        })
    }

    /// Find whole notes with their outbound links and snippets
    pub fn find(&self, opts: &NoteFindOpts) -> SqliteResult<Vec<ContextualNote>> {
        let query = self.build(opts, Projection::Full)?;
        let mut stmt = self.conn.prepare(&query.sql)?;
        let rows = stmt
            .query_map(params_from_iter(query.params.iter()), NoteRow::read)?
            .collect::<Result<Vec<_>, _>>()?;

        let links = LinkStore::new(self.conn);
        rows.into_iter()
            .map(|row| -> SqliteResult<ContextualNote> {
                let outbound = links
                    .links_of(NoteId(row.id))?
                    .into_iter()
                    .map(|resolved| resolved.link)
                    .collect();
                row.into_contextual(outbound)
            })
            .collect()
    }

    pub fn find_minimal(&self, opts: &NoteFindOpts) -> SqliteResult<Vec<MinimalNote>> {
        let query = self.build(opts, Projection::Minimal)?;
        let mut stmt = self.conn.prepare(&query.sql)?;
        let rows = stmt
            .query_map(params_from_iter(query.params.iter()), |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, path, title, metadata)| -> SqliteResult<MinimalNote> {
                Ok(MinimalNote {
                    id: Some(NoteId(id)),
                    path,
                    title,
                    metadata: serde_json::from_str(&metadata)?,
                })
            })
            .collect()
    }

    /// IDs of every note matching one of the hrefs. Matching nothing is
    /// a user error.
    fn resolve_hrefs(&self, hrefs: &[String], allow_partial: bool) -> SqliteResult<Vec<NoteId>> {
        let resolver = LinkResolver::new(self.conn);
        let mut ids = Vec::new();
        for href in hrefs {
            let found = resolver.resolve(href, allow_partial)?;
            extend_unique(&mut ids, &found);
        }

        if ids.is_empty() {
            return Err(SqliteError::InvalidFilter(format!(
                "could not find notes at: {}",
                hrefs.join(", ")
            )));
        }
        Ok(ids)
    }

    fn mention_queries(&self, ids: &[NoteId]) -> SqliteResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT title, metadata FROM notes WHERE id = ?1")?;
        let mut queries = Vec::with_capacity(ids.len());
        for id in ids {
            let (title, metadata): (String, String) =
                stmt.query_row([id.0], |row| Ok((row.get(0)?, row.get(1)?)))?;
            let metadata: Map<String, serde_json::Value> = serde_json::from_str(&metadata)?;
            queries.push(mention_query(&title, &metadata));
        }
        Ok(queries)
    }
}

fn extend_unique(ids: &mut Vec<NoteId>, more: &[NoteId]) {
    for id in more {
        if !ids.contains(id) {
            ids.push(*id);
        }
    }
}

fn order_term(sorter: &NoteSorter) -> String {
    let column = match sorter.field {
        NoteSortField::Random => return "RANDOM()".to_string(),
        NoteSortField::Created => "n.created",
        NoteSortField::Modified => "n.modified",
        NoteSortField::Path => "n.path",
        NoteSortField::Title => "n.title",
        NoteSortField::WordCount => "n.word_count",
        NoteSortField::PathLength => "LENGTH(n.path)",
    };
    format!("{} {}", column, if sorter.ascending { "ASC" } else { "DESC" })
}

/// Raw columns of a full projection
struct NoteRow {
    id: i64,
    path: String,
    title: String,
    lead: String,
    body: String,
    raw_content: String,
    word_count: i64,
    metadata: String,
    checksum: String,
    created: String,
    modified: String,
    tags: Option<String>,
    snippets: Option<String>,
}

impl NoteRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            path: row.get("path")?,
            title: row.get("title")?,
            lead: row.get("lead")?,
            body: row.get("body")?,
            raw_content: row.get("raw_content")?,
            word_count: row.get("word_count")?,
            metadata: row.get("metadata")?,
            checksum: row.get("checksum")?,
            created: row.get("created")?,
            modified: row.get("modified")?,
            tags: row.get("tags")?,
            snippets: row.get("snippets")?,
        })
    }

    fn into_contextual(self, links: Vec<Link>) -> SqliteResult<ContextualNote> {
        let note = Note {
            id: Some(NoteId(self.id)),
            path: self.path,
            title: self.title,
            lead: self.lead,
            body: self.body,
            raw_content: self.raw_content,
            word_count: self.word_count.max(0) as usize,
            links,
            tags: split_list(self.tags.as_deref()),
            metadata: serde_json::from_str(&self.metadata)?,
            created: parse_date(&self.created)?,
            modified: parse_date(&self.modified)?,
            checksum: self.checksum,
        };
        Ok(ContextualNote {
            note,
            snippets: split_list(self.snippets.as_deref()),
        })
    }
}

/// Split a list joined with U+0001, dropping empty and repeated items
fn split_list(joined: Option<&str>) -> Vec<String> {
    let mut items: Vec<String> = Vec::new();
    for item in joined.unwrap_or_default().split('\u{1}') {
        if !item.is_empty() && !items.iter().any(|i| i == item) {
            items.push(item.to_string());
        }
    }
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::NoteStore;
    use crate::SqlitePool;
    use kiln_core::{IndexError, LinkFilter, LinkType};

    fn pool_with(paths: &[&str]) -> SqlitePool {
        let pool = SqlitePool::memory().unwrap();
        pool.with_connection(|conn| {
            let store = NoteStore::new(conn);
            for path in paths {
                store.add(&Note::new(*path).with_title(*path))?;
            }
            Ok(())
        })
        .unwrap();
        pool
    }

    fn build(pool: &SqlitePool, opts: &NoteFindOpts) -> SqliteResult<CompiledQuery> {
        pool.with_connection(|conn| QueryBuilder::new(conn).build(opts, Projection::Full))
    }

    #[test]
    fn test_default_ordering() {
        let pool = pool_with(&[]);
        let query = build(&pool, &NoteFindOpts::default()).unwrap();
        assert!(query.sql.contains("ORDER BY n.title ASC, n.path ASC"));
        assert!(!query.sql.contains("LIMIT"));
        assert!(query.params.is_empty());
    }

    #[test]
    fn test_full_text_ranks_after_sorters() {
        let pool = pool_with(&[]);
        let opts = NoteFindOpts {
            match_terms: vec!["foo bar".into()],
            sorters: vec![NoteSorter::parse("created").unwrap()],
            limit: Some(5),
            ..Default::default()
        };
        let query = build(&pool, &opts).unwrap();

        assert!(query.sql.contains("JOIN notes_fts ON notes_fts.rowid = n.id"));
        assert!(query.sql.contains(&format!("ORDER BY n.created DESC, {}, n.title ASC", BM25_ORDER)));
        assert!(query.sql.contains("snippet(notes_fts, 2,"));
        assert_eq!(query.params[0], Value::Text(r#"("foo" "bar")"#.into()));
        assert_eq!(query.params.last(), Some(&Value::Integer(5)));
    }

    #[test]
    fn test_default_limit_applies_without_explicit_limit() {
        let pool = pool_with(&[]);
        let query = pool
            .with_connection(|conn| {
                QueryBuilder::new(conn)
                    .with_default_limit(Some(20))
                    .build(&NoteFindOpts::default(), Projection::Minimal)
            })
            .unwrap();
        assert!(query.sql.starts_with("SELECT n.id, n.path, n.title, n.metadata"));
        assert_eq!(query.params, vec![Value::Integer(20)]);
    }

    #[test]
    fn test_unknown_href_is_a_user_error() {
        let pool = pool_with(&["a.md"]);
        let opts = NoteFindOpts {
            link_to: Some(LinkFilter::new(["missing"])),
            ..Default::default()
        };
        let err: IndexError = build(&pool, &opts).unwrap_err().into();
        assert!(err.is_user_error());
        assert_eq!(err.to_string(), "could not find notes at: missing");
    }

    #[test]
    fn test_mention_requires_full_text() {
        let pool = pool_with(&["a.md"]);
        let opts = NoteFindOpts {
            mention: vec!["a.md".into()],
            match_strategy: MatchStrategy::Exact,
            ..Default::default()
        };
        let err = build(&pool, &opts).unwrap_err();
        assert!(matches!(err, SqliteError::InvalidFilter(_)));
    }

    #[test]
    fn test_invalid_regex_is_a_user_error() {
        let pool = pool_with(&[]);
        let opts = NoteFindOpts {
            match_terms: vec!["(unclosed".into()],
            match_strategy: MatchStrategy::Re,
            ..Default::default()
        };
        assert!(matches!(build(&pool, &opts), Err(SqliteError::InvalidFilter(_))));
    }

    #[test]
    fn test_ambiguous_tag_negation_is_rejected() {
        let pool = pool_with(&[]);
        let opts = NoteFindOpts {
            tags: vec!["a|-b".into()],
            ..Default::default()
        };
        let err = build(&pool, &opts).unwrap_err();
        assert_eq!(err.to_string(), "cannot negate a tag in a OR group: a|-b");
    }

    #[test]
    fn test_minimal_link_filter_binds_only_used_params() {
        let pool = pool_with(&["b.md"]);
        pool.with_connection(|conn| {
            let link = Link::new("B", "b", LinkType::WikiLink);
            NoteStore::new(conn).add(&Note::new("a.md").with_title("A").with_links(vec![link]))?;
            Ok(())
        })
        .unwrap();

        let opts = NoteFindOpts {
            linked_by: Some(LinkFilter::new(["a.md"])),
            ..Default::default()
        };
        let query = pool
            .with_connection(|conn| QueryBuilder::new(conn).build(&opts, Projection::Minimal))
            .unwrap();
        assert!(!query.sql.contains("GROUP_CONCAT"));
        assert_eq!(query.params.len(), 1);

        let found = pool
            .with_connection(|conn| QueryBuilder::new(conn).find_minimal(&opts))
            .unwrap();
        let paths: Vec<_> = found.iter().map(|n| n.path.as_str()).collect();
        assert_eq!(paths, vec!["b.md"]);
    }

    #[test]
    fn test_full_link_filter_highlights_link_titles() {
        let pool = pool_with(&["b.md"]);
        pool.with_connection(|conn| {
            let link = Link::new("B", "b", LinkType::WikiLink).with_snippet("see B here", 0, 10);
            NoteStore::new(conn).add(&Note::new("a.md").with_title("A").with_links(vec![link]))?;
            Ok(())
        })
        .unwrap();

        let opts = NoteFindOpts {
            linked_by: Some(LinkFilter::new(["a.md"])),
            ..Default::default()
        };
        let found = pool
            .with_connection(|conn| QueryBuilder::new(conn).find(&opts))
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(
            found[0].snippets,
            vec![format!("see {}B{} here", MATCH_START, MATCH_END)]
        );
    }

    #[test]
    fn test_split_list() {
        assert_eq!(split_list(Some("a\u{1}b\u{1}a\u{1}")), vec!["a", "b"]);
        assert!(split_list(None).is_empty());
    }
}
