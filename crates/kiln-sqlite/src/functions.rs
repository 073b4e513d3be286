//! Custom SQL functions
//!
//! - `regexp(pattern, text)` backs the `REGEXP` operator
//! - `mention_query(title, metadata)` builds the full-text query matching
//!   mentions of a note

use std::sync::Arc;

use regex::Regex;
use rusqlite::functions::FunctionFlags;
use rusqlite::{Connection, Error};
use serde_json::{Map, Value};

use crate::error::SqliteResult;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Full-text term matching no note, used when a note has no title nor alias
pub const UNMATCHABLE_TERM: &str = "8b80252291ee418289cfc9968eb2961c";

/// Register the custom functions on a connection
pub fn register(conn: &Connection) -> SqliteResult<()> {
    let flags = FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC;

    conn.create_scalar_function("regexp", 2, flags, move |ctx| {
        let regex: Arc<Regex> = ctx.get_or_create_aux(0, |vr| -> Result<_, BoxError> {
            Ok(Regex::new(vr.as_str()?)?)
        })?;
        let is_match = {
            let text = ctx
                .get_raw(1)
                .as_str_or_null()
                .map_err(|e| Error::UserFunctionError(e.into()))?;
            text.is_some_and(|text| regex.is_match(text))
        };
        Ok(is_match)
    })?;

    conn.create_scalar_function("mention_query", 2, flags, move |ctx| {
        let title = ctx
            .get_raw(0)
            .as_str_or_null()
            .map_err(|e| Error::UserFunctionError(e.into()))?
            .unwrap_or_default();
        let metadata = ctx
            .get_raw(1)
            .as_str_or_null()
            .map_err(|e| Error::UserFunctionError(e.into()))?
            .unwrap_or("{}");
        let metadata: Map<String, Value> =
            serde_json::from_str(metadata).map_err(|e| Error::UserFunctionError(e.into()))?;
        Ok(mention_query(title, &metadata))
    })?;

    Ok(())
}

/// Full-text query matching any mention of a note: its title or one of
/// its `aliases`, each as a phrase.
pub fn mention_query(title: &str, metadata: &Map<String, Value>) -> String {
    let mut names = vec![title.to_string()];
    match metadata.get("aliases") {
        Some(Value::Array(aliases)) => {
            names.extend(aliases.iter().filter_map(Value::as_str).map(str::to_string))
        }
        Some(Value::String(alias)) => names.push(alias.clone()),
        _ => {}
    }

    let phrases: Vec<String> = names
        .iter()
        .map(|name| name.replace('"', ""))
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .map(|name| format!("\"{}\"", name))
        .collect();

    if phrases.is_empty() {
        return UNMATCHABLE_TERM.to_string();
    }
    format!("({})", phrases.join(" OR "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn metadata(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_mention_query() {
        assert_eq!(mention_query("Dune", &Map::new()), r#"("Dune")"#);
        assert_eq!(
            mention_query("Dune", &metadata(json!({"aliases": ["Arrakis", "The \"Desert\" Planet"]}))),
            r#"("Dune" OR "Arrakis" OR "The Desert Planet")"#
        );
        assert_eq!(
            mention_query("Dune", &metadata(json!({"aliases": "Arrakis"}))),
            r#"("Dune" OR "Arrakis")"#
        );
    }

    #[test]
    fn test_mention_query_without_names() {
        assert_eq!(mention_query("", &Map::new()), UNMATCHABLE_TERM);
        assert_eq!(mention_query("\"\"", &metadata(json!({"aliases": [""]}))), UNMATCHABLE_TERM);
    }

    #[test]
    fn test_sql_functions() {
        let conn = Connection::open_in_memory().unwrap();
        register(&conn).unwrap();

        let matched: bool = conn
            .query_row("SELECT 'notes/report.md' REGEXP '^notes/.*\\.md$'", [], |row| row.get(0))
            .unwrap();
        assert!(matched);

        let matched: bool = conn
            .query_row("SELECT NULL REGEXP 'a'", [], |row| row.get::<_, Option<bool>>(0))
            .unwrap()
            .unwrap_or(false);
        assert!(!matched);

        let query: String = conn
            .query_row(
                "SELECT mention_query('Dune', '{\"aliases\": [\"Arrakis\"]}')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(query, r#"("Dune" OR "Arrakis")"#);
    }
}
