//! Link store
//!
//! Outbound links are replaced wholesale whenever their source note is
//! indexed. Their targets are then kept up to date as other notes come
//! and go.

use kiln_core::{Link, LinkRelation, LinkType, NoteId, ResolvedLink};
use rusqlite::{params, params_from_iter, Connection, Row};
use tracing::debug;

use crate::error::SqliteResult;
use crate::resolver::{HrefPattern, LinkResolver};

const RESOLVED_LINK_COLUMNS: &str = "id, source_id, source_path, target_id, target_path, \
     title, href, type, external, rels, snippet, snippet_start, snippet_end";

pub struct LinkStore<'c> {
    conn: &'c Connection,
    partial_markdown_links: bool,
}

impl<'c> LinkStore<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self {
            conn,
            partial_markdown_links: false,
        }
    }

    /// Let markdown links resolve partially, like wiki-links
    #[must_use]
    pub fn with_partial_markdown_links(mut self, enabled: bool) -> Self {
        self.partial_markdown_links = enabled;
        self
    }

    fn allows_partial(&self, link_type: LinkType) -> bool {
        link_type.allows_partial_match()
            || (self.partial_markdown_links && link_type == LinkType::Markdown)
    }

    /// Store the outbound links of a note, resolving their targets
    pub fn insert_links(&self, source_id: NoteId, links: &[Link]) -> SqliteResult<()> {
        let resolver = LinkResolver::new(self.conn);
        let mut stmt = self.conn.prepare_cached(
            r#"
            INSERT INTO links (source_id, target_id, title, href, type, external, rels,
                               snippet, snippet_start, snippet_end)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )?;

        for link in links {
            let target_id = if link.is_external {
                None
            } else {
                resolver.resolve_one(&link.href, self.allows_partial(link.link_type))?
            };

            stmt.execute(params![
                source_id.0,
                target_id.map(|id| id.0),
                link.title,
                link.href,
                link.link_type.as_str(),
                link.is_external,
                join_rels(&link.rels),
                link.snippet,
                link.snippet_start as i64,
                link.snippet_end as i64,
            ])?;
        }
        Ok(())
    }

    /// Delete the outbound links of a note
    pub fn remove_links(&self, source_id: NoteId) -> SqliteResult<()> {
        self.conn
            .execute("DELETE FROM links WHERE source_id = ?1", [source_id.0])?;
        Ok(())
    }

    /// Point to the given note every internal link it matches better than
    /// the link's current target, dangling links included.
    ///
    /// Returns the number of repointed links.
    pub fn repair_targets(&self, note_id: NoteId, path: &str) -> SqliteResult<usize> {
        // Every match contains the href, which prunes most links upfront
        let mut stmt = self.conn.prepare_cached(
            r#"
            SELECT l.id, l.href, l.type, t.path
              FROM links l
              LEFT JOIN notes t ON t.id = l.target_id
             WHERE l.external = 0
               AND (l.target_id IS NULL OR l.target_id != ?1)
               AND INSTR(LOWER(?2), LOWER(
                       CASE WHEN INSTR(l.href, '#') > 0
                            THEN SUBSTR(l.href, 1, INSTR(l.href, '#') - 1)
                            ELSE l.href END)) > 0
            "#,
        )?;

        let candidates = stmt
            .query_map(params![note_id.0, path], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<String>>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut repaired = 0;
        for (link_id, href, link_type, target_path) in candidates {
            let Some(pattern) = HrefPattern::new(&href) else {
                continue;
            };
            let partial = self.allows_partial(LinkType::from_stored(&link_type));
            let Some(rank) = pattern.rank(path, partial) else {
                continue;
            };

            let better = match target_path {
                None => true,
                // Ties go to the smaller path, as in resolution order
                Some(current) => pattern
                    .rank(&current, partial)
                    .map_or(true, |r| (rank, path) < (r, current.as_str())),
            };
            if better {
                self.conn.execute(
                    "UPDATE links SET target_id = ?1 WHERE id = ?2",
                    params![note_id.0, link_id],
                )?;
                repaired += 1;
            }
        }

        if repaired > 0 {
            debug!(path, count = repaired, "repointed links to note");
        }
        Ok(repaired)
    }

    /// Try to resolve every dangling internal link. Returns the number of
    /// links which found a target.
    pub fn resolve_dangling(&self) -> SqliteResult<usize> {
        let dangling = {
            let mut stmt = self.conn.prepare(
                "SELECT id, href, type FROM links WHERE target_id IS NULL AND external = 0",
            )?;
            let rows = stmt
                .query_map([], |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                })?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        };

        let resolver = LinkResolver::new(self.conn);
        let mut resolved = 0;
        for (link_id, href, link_type) in dangling {
            let partial = self.allows_partial(LinkType::from_stored(&link_type));
            if let Some(target) = resolver.resolve_one(&href, partial)? {
                self.conn.execute(
                    "UPDATE links SET target_id = ?1 WHERE id = ?2",
                    params![target.0, link_id],
                )?;
                resolved += 1;
            }
        }
        Ok(resolved)
    }

    /// Links whose source and target are both among the given notes
    pub fn links_between(&self, ids: &[NoteId]) -> SqliteResult<Vec<ResolvedLink>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!(
            "SELECT {} FROM resolved_links
              WHERE source_id IN ({1}) AND target_id IN ({1})
              ORDER BY id",
            RESOLVED_LINK_COLUMNS, placeholders
        );
        let params = ids.iter().chain(ids.iter()).map(|id| id.0);

        let mut stmt = self.conn.prepare(&sql)?;
        let links = stmt
            .query_map(params_from_iter(params), row_to_resolved_link)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(links)
    }

    /// Outbound links of a note, in authored order
    pub fn links_of(&self, source_id: NoteId) -> SqliteResult<Vec<ResolvedLink>> {
        let sql = format!(
            "SELECT {} FROM resolved_links WHERE source_id = ?1 ORDER BY id",
            RESOLVED_LINK_COLUMNS
        );
        let mut stmt = self.conn.prepare_cached(&sql)?;
        let links = stmt
            .query_map([source_id.0], row_to_resolved_link)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(links)
    }
}

/// Relations are stored delimited on both ends, e.g. `;up;down;`, so a
/// relation can be matched with `LIKE '%;up;%'`
fn join_rels(rels: &[LinkRelation]) -> String {
    if rels.is_empty() {
        return String::new();
    }
    let names: Vec<&str> = rels.iter().map(LinkRelation::as_str).collect();
    format!(";{};", names.join(";"))
}

fn split_rels(rels: &str) -> Vec<LinkRelation> {
    rels.split(';')
        .filter(|rel| !rel.is_empty())
        .map(|rel| LinkRelation(rel.to_string()))
        .collect()
}

fn row_to_resolved_link(row: &Row<'_>) -> rusqlite::Result<ResolvedLink> {
    let link_type: String = row.get("type")?;
    let rels: String = row.get("rels")?;
    let snippet_start: i64 = row.get("snippet_start")?;
    let snippet_end: i64 = row.get("snippet_end")?;

    Ok(ResolvedLink {
        link: Link {
            title: row.get("title")?,
            href: row.get("href")?,
            link_type: LinkType::from_stored(&link_type),
            is_external: row.get("external")?,
            rels: split_rels(&rels),
            snippet: row.get("snippet")?,
            snippet_start: snippet_start.max(0) as usize,
            snippet_end: snippet_end.max(0) as usize,
        },
        source_id: NoteId(row.get("source_id")?),
        source_path: row.get("source_path")?,
        target_id: row.get::<_, Option<i64>>("target_id")?.map(NoteId),
        target_path: row.get("target_path")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rels_round_trip() {
        let rels = vec![LinkRelation::up(), LinkRelation::down()];
        let joined = join_rels(&rels);
        assert_eq!(joined, ";up;down;");
        assert_eq!(split_rels(&joined), rels);
        assert_eq!(join_rels(&[]), "");
        assert!(split_rels("").is_empty());
    }
}
