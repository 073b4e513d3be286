//! Query predicates
//!
//! Every filter of a find query compiles to one [`Predicate`], rendered as
//! a SQL condition over the note alias `n`. Values are never interpolated:
//! they are bound as numbered parameters collected in a [`RenderContext`],
//! along with the recursive CTEs some predicates need.

use chrono::{DateTime, Utc};
use kiln_core::{CollectionKind, NoteId, TagGroup, MATCH_END, MATCH_START};
use rusqlite::types::Value;

use crate::resolver::{escape_like, prefix_regex};
use crate::store::format_date;

/// Maximum number of rows a recursive link expansion may produce
pub const MAX_CLOSURE_ROWS: usize = 100_000;

/// Which end of the links the given notes sit on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkDirection {
    /// Notes the given ones link to
    LinkedBy,
    /// Notes linking to the given ones
    LinkingTo,
}

impl LinkDirection {
    /// `links` columns of the known and the reached endpoints
    fn columns(self) -> (&'static str, &'static str) {
        match self {
            LinkDirection::LinkedBy => ("source_id", "target_id"),
            LinkDirection::LinkingTo => ("target_id", "source_id"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateField {
    Created,
    Modified,
}

impl DateField {
    fn column(self) -> &'static str {
        match self {
            DateField::Created => "n.created",
            DateField::Modified => "n.modified",
        }
    }
}

/// A single filter condition
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// FTS5 query, requires `notes_fts` to be joined on the note
    FullText(String),
    /// Case-insensitive substring of the raw content
    ContentContains(String),
    /// Regular expression over the raw content
    ContentRegex(String),
    IdIn(Vec<NoteId>),
    IdNotIn(Vec<NoteId>),
    /// Notes at or beneath any of the prefixes, or none of them
    PathPrefix { prefixes: Vec<String>, negate: bool },
    Tags(TagGroup),
    Tagless,
    /// No other note links to it
    Orphan,
    /// The title or an alias of the note is mentioned by one of these
    MentionedBy(Vec<NoteId>),
    Links {
        direction: LinkDirection,
        ids: Vec<NoteId>,
        negate: bool,
        recursive: bool,
        max_distance: Option<usize>,
    },
    /// Exactly two links away from these notes, in either direction
    Related(Vec<NoteId>),
    /// Half-open date range, `start` included
    DateRange {
        field: DateField,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    },
}

/// Bound parameters and CTEs collected while rendering predicates
#[derive(Debug, Default)]
pub struct RenderContext {
    params: Vec<Value>,
    ctes: Vec<String>,
    /// Condition selecting the links followed by the first link filter
    snippet_links: Option<String>,
}

impl RenderContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a value and return its placeholder
    pub fn bind(&mut self, value: impl Into<Value>) -> String {
        self.params.push(value.into());
        format!("?{}", self.params.len())
    }

    /// Bind a list of IDs, for use in an `IN (...)` list
    pub fn bind_ids(&mut self, ids: &[NoteId]) -> String {
        ids.iter()
            .map(|id| self.bind(id.0))
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }

    pub fn into_params(self) -> Vec<Value> {
        self.params
    }

    /// `WITH RECURSIVE` clause declaring the collected CTEs, if any
    pub fn with_clause(&self) -> Option<String> {
        if self.ctes.is_empty() {
            None
        } else {
            Some(format!("WITH RECURSIVE {}\n", self.ctes.join(",\n")))
        }
    }

    /// Whether a link filter can provide snippets
    pub fn has_link_snippet(&self) -> bool {
        self.snippet_links.is_some()
    }

    /// Snippet expression made of the paragraphs of the followed links,
    /// with the link titles highlighted. The markers are bound on call, so
    /// only call it when the expression is selected.
    pub fn link_snippet(&mut self) -> Option<String> {
        let links_condition = self.snippet_links.clone()?;
        let start = self.bind(MATCH_START.to_string());
        let end = self.bind(MATCH_END.to_string());
        Some(format!(
            "(SELECT GROUP_CONCAT(REPLACE(l.snippet, l.title, {start} || l.title || {end}), char(1))
                FROM links l WHERE {links_condition})"
        ))
    }

    /// Declare a CTE of the notes reachable from `ids` by following links
    /// in the given direction. Returns its name.
    ///
    /// Columns: `note_id`, `link_id` (last link followed), `distance` and
    /// `visited`, the dot-delimited chain of notes used to stop at cycles.
    fn closure(
        &mut self,
        direction: LinkDirection,
        ids: &[NoteId],
        max_distance: Option<usize>,
    ) -> String {
        let name = format!("closure_{}", self.ctes.len());
        let (from, to) = direction.columns();
        let ids = self.bind_ids(ids);
        let cap = match max_distance.filter(|d| *d > 0) {
            Some(max) => format!("\n       AND tc.distance < {}", self.bind(max as i64)),
            None => String::new(),
        };

        self.ctes.push(format!(
            r#"{name}(note_id, link_id, distance, visited) AS (
    SELECT {to}, id, 1, '.' || {from} || '.' || {to} || '.'
      FROM links
     WHERE {from} IN ({ids}) AND target_id IS NOT NULL
    UNION ALL
    SELECT l.{to}, l.id, tc.distance + 1, tc.visited || l.{to} || '.'
      FROM links l
      JOIN {name} tc ON l.{from} = tc.note_id
     WHERE l.target_id IS NOT NULL
       AND tc.visited NOT LIKE '%.' || l.{to} || '.%'{cap}
     LIMIT {limit}
)"#,
            limit = MAX_CLOSURE_ROWS,
        ));
        name
    }

    fn offer_link_snippet(&mut self, links_condition: &str) {
        if self.snippet_links.is_none() {
            self.snippet_links = Some(links_condition.to_string());
        }
    }
}

impl Predicate {
    /// Render the SQL condition, binding its values in `ctx`
    pub fn render(&self, ctx: &mut RenderContext) -> String {
        match self {
            Predicate::FullText(query) => format!("notes_fts MATCH {}", ctx.bind(query.clone())),

            Predicate::ContentContains(term) => format!(
                "n.raw_content LIKE '%' || {} || '%' ESCAPE '\\'",
                ctx.bind(escape_like(term))
            ),

            Predicate::ContentRegex(pattern) => {
                format!("n.raw_content REGEXP {}", ctx.bind(pattern.clone()))
            }

            Predicate::IdIn(ids) => format!("n.id IN ({})", ctx.bind_ids(ids)),

            Predicate::IdNotIn(ids) => format!("n.id NOT IN ({})", ctx.bind_ids(ids)),

            Predicate::PathPrefix { prefixes, negate } => {
                let (op, joiner) = if *negate {
                    ("NOT REGEXP", " AND ")
                } else {
                    ("REGEXP", " OR ")
                };
                let conditions: Vec<String> = prefixes
                    .iter()
                    .map(|prefix| {
                        let regex = path_regex(prefix);
                        format!("n.path {} {}", op, ctx.bind(regex))
                    })
                    .collect();
                format!("({})", conditions.join(joiner))
            }

            Predicate::Tags(group) => {
                let globs: Vec<String> = group
                    .globs
                    .iter()
                    .map(|glob| format!("c.name GLOB {}", ctx.bind(glob.clone())))
                    .collect();
                let kind = ctx.bind(CollectionKind::Tag.as_str().to_string());
                format!(
                    "n.id {}IN (
                        SELECT nc.note_id FROM notes_collections nc
                          JOIN collections c ON c.id = nc.collection_id
                         WHERE c.kind = {} AND ({})
                    )",
                    if group.negate { "NOT " } else { "" },
                    kind,
                    globs.join(" OR ")
                )
            }

            Predicate::Tagless => format!(
                "n.id NOT IN (
                    SELECT nc.note_id FROM notes_collections nc
                      JOIN collections c ON c.id = nc.collection_id
                     WHERE c.kind = {}
                )",
                ctx.bind(CollectionKind::Tag.as_str().to_string())
            ),

            Predicate::Orphan => {
                "n.id NOT IN (SELECT target_id FROM links WHERE target_id IS NOT NULL)".to_string()
            }

            Predicate::MentionedBy(ids) => format!(
                "EXISTS (
                    SELECT 1 FROM notes_fts mb
                     WHERE mb.notes_fts MATCH mention_query(n.title, n.metadata)
                       AND mb.rowid IN ({})
                )",
                ctx.bind_ids(ids)
            ),

            Predicate::Links {
                direction,
                ids,
                negate,
                recursive,
                max_distance,
            } => {
                let (from, to) = direction.columns();
                let (reached, links_condition) = if *recursive {
                    let closure = ctx.closure(*direction, ids, *max_distance);
                    (
                        format!("SELECT note_id FROM {}", closure),
                        format!("l.id IN (SELECT link_id FROM {} WHERE note_id = n.id)", closure),
                    )
                } else {
                    let ids = ctx.bind_ids(ids);
                    (
                        format!(
                            "SELECT {to} FROM links WHERE {from} IN ({ids}) AND target_id IS NOT NULL"
                        ),
                        format!("l.{to} = n.id AND l.{from} IN ({ids})"),
                    )
                };

                if *negate {
                    format!("n.id NOT IN ({})", reached)
                } else {
                    ctx.offer_link_snippet(&links_condition);
                    format!("n.id IN ({})", reached)
                }
            }

            Predicate::Related(ids) => {
                let forward = ctx.closure(LinkDirection::LinkedBy, ids, Some(2));
                let backward = ctx.closure(LinkDirection::LinkingTo, ids, Some(2));
                let ids = ctx.bind_ids(ids);
                format!(
                    "(n.id IN (
                        SELECT note_id FROM (
                            SELECT note_id, distance FROM {forward}
                            UNION ALL
                            SELECT note_id, distance FROM {backward}
                        )
                        GROUP BY note_id
                        HAVING MIN(distance) = 2
                    ) AND n.id NOT IN ({ids}))"
                )
            }

            Predicate::DateRange { field, start, end } => {
                let column = field.column();
                let mut conditions = Vec::new();
                if let Some(start) = start {
                    conditions.push(format!("{} >= {}", column, ctx.bind(format_date(start))));
                }
                if let Some(end) = end {
                    conditions.push(format!("{} < {}", column, ctx.bind(format_date(end))));
                }
                if conditions.is_empty() {
                    "1".to_string()
                } else {
                    conditions.join(" AND ")
                }
            }
        }
    }
}

/// Paths ending with a slash only match what is below that directory
fn path_regex(prefix: &str) -> String {
    match prefix.strip_suffix('/') {
        Some(dir) => format!("^{}/.+$", regex::escape(dir.trim_end_matches('/'))),
        None => prefix_regex(prefix),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_values_are_bound() {
        let mut ctx = RenderContext::new();
        let sql = Predicate::ContentContains("100%".into()).render(&mut ctx);
        assert_eq!(sql, "n.raw_content LIKE '%' || ?1 || '%' ESCAPE '\\'");
        assert_eq!(ctx.params(), &[Value::Text("100\\%".into())]);
    }

    #[test]
    fn test_placeholders_are_numbered_across_predicates() {
        let mut ctx = RenderContext::new();
        let first = Predicate::IdIn(vec![NoteId(1), NoteId(2)]).render(&mut ctx);
        let second = Predicate::IdNotIn(vec![NoteId(3)]).render(&mut ctx);
        assert_eq!(first, "n.id IN (?1, ?2)");
        assert_eq!(second, "n.id NOT IN (?3)");
        assert_eq!(ctx.into_params().len(), 3);
    }

    #[test]
    fn test_path_prefixes() {
        let mut ctx = RenderContext::new();
        let sql = Predicate::PathPrefix {
            prefixes: vec!["journal/".into(), "inbox".into()],
            negate: true,
        }
        .render(&mut ctx);
        assert_eq!(sql, "(n.path NOT REGEXP ?1 AND n.path NOT REGEXP ?2)");
        assert_eq!(ctx.params()[0], Value::Text("^journal/.+$".into()));
        assert_eq!(ctx.params()[1], Value::Text("^(?:inbox[^/]*|inbox/.+)$".into()));
    }

    #[test]
    fn test_recursive_links_declare_a_closure() {
        let mut ctx = RenderContext::new();
        let sql = Predicate::Links {
            direction: LinkDirection::LinkedBy,
            ids: vec![NoteId(7)],
            negate: false,
            recursive: true,
            max_distance: Some(3),
        }
        .render(&mut ctx);

        assert_eq!(sql, "n.id IN (SELECT note_id FROM closure_0)");
        let with = ctx.with_clause().unwrap();
        assert!(with.starts_with("WITH RECURSIVE closure_0("));
        assert!(with.contains("tc.distance < ?2"));
        assert!(with.contains("LIMIT 100000"));
        // Markers are only bound once the snippet is selected
        assert_eq!(ctx.params().len(), 2);
        assert!(ctx.link_snippet().unwrap().contains("closure_0"));
        assert_eq!(ctx.params().len(), 4);
    }

    #[test]
    fn test_negated_links_have_no_snippet() {
        let mut ctx = RenderContext::new();
        let sql = Predicate::Links {
            direction: LinkDirection::LinkingTo,
            ids: vec![NoteId(7)],
            negate: true,
            recursive: false,
            max_distance: None,
        }
        .render(&mut ctx);

        assert_eq!(
            sql,
            "n.id NOT IN (SELECT source_id FROM links WHERE target_id IN (?1) AND target_id IS NOT NULL)"
        );
        assert!(!ctx.has_link_snippet());
        assert!(ctx.link_snippet().is_none());
        assert!(ctx.with_clause().is_none());
    }

    #[test]
    fn test_date_range_is_half_open() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut ctx = RenderContext::new();
        let sql = Predicate::DateRange {
            field: DateField::Modified,
            start: Some(start),
            end: Some(start + chrono::Duration::days(1)),
        }
        .render(&mut ctx);
        assert_eq!(sql, "n.modified >= ?1 AND n.modified < ?2");
    }
}
