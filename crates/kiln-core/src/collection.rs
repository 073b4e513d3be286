//! Note collections (tags)

use serde::{Deserialize, Serialize};

use crate::error::{IndexError, IndexResult};

/// Kind of note collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionKind {
    Tag,
}

impl CollectionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CollectionKind::Tag => "tag",
        }
    }
}

impl std::fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unique ID of a collection in the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CollectionId(pub i64);

/// A named grouping of notes, such as a tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    pub id: CollectionId,
    pub kind: CollectionKind,
    /// Case-sensitive name, unique per kind
    pub name: String,
    /// Number of notes associated with this collection
    pub note_count: usize,
}

/// Field used to sort a collection listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CollectionSortField {
    Name,
    NoteCount,
}

/// An order term for collection listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionSorter {
    pub field: CollectionSortField,
    pub ascending: bool,
}

impl CollectionSorter {
    /// Parse a sort term such as `name`, `nc` or `note-count+`.
    ///
    /// A `+` or `-` suffix overrides the field's default direction.
    pub fn parse(term: &str) -> IndexResult<Self> {
        let (name, ascending) = split_order_suffix(term);

        let mut sorter = match name {
            "name" | "n" => CollectionSorter {
                field: CollectionSortField::Name,
                ascending: true,
            },
            "note-count" | "nc" => CollectionSorter {
                field: CollectionSortField::NoteCount,
                ascending: false,
            },
            _ => {
                return Err(IndexError::invalid_filter(format!(
                    "{}: unknown sorting term\ntry name or note-count",
                    name
                )))
            }
        };

        if let Some(ascending) = ascending {
            sorter.ascending = ascending;
        }
        Ok(sorter)
    }

    /// Parse a list of sort terms, latest first so that later terms
    /// override earlier ones.
    pub fn parse_all<S: AsRef<str>>(terms: &[S]) -> IndexResult<Vec<Self>> {
        terms.iter().rev().map(|t| Self::parse(t.as_ref())).collect()
    }
}

/// Split a trailing `+`/`-` order symbol from a sort term
pub(crate) fn split_order_suffix(term: &str) -> (&str, Option<bool>) {
    let ascending = match term.chars().last() {
        Some('+') => Some(true),
        Some('-') => Some(false),
        _ => None,
    };
    match ascending {
        Some(_) => (&term[..term.len() - 1], ascending),
        None => (term, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("name", CollectionSortField::Name, true)]
    #[test_case("n-", CollectionSortField::Name, false)]
    #[test_case("note-count", CollectionSortField::NoteCount, false)]
    #[test_case("nc+", CollectionSortField::NoteCount, true)]
    fn test_parse_sorter(term: &str, field: CollectionSortField, ascending: bool) {
        assert_eq!(
            CollectionSorter::parse(term).unwrap(),
            CollectionSorter { field, ascending }
        );
    }

    #[test]
    fn test_parse_unknown_sorter() {
        let err = CollectionSorter::parse("size").unwrap_err();
        assert_eq!(err.to_string(), "size: unknown sorting term\ntry name or note-count");
    }

    #[test]
    fn test_parse_only_one_order_suffix() {
        let err = CollectionSorter::parse("name+-").unwrap_err();
        assert_eq!(err.to_string(), "name+: unknown sorting term\ntry name or note-count");
    }

    #[test_case("name", ("name", None))]
    #[test_case("nc+", ("nc", Some(true)))]
    #[test_case("word-count-", ("word-count", Some(false)))]
    #[test_case("word-count--", ("word-count-", Some(false)))]
    fn test_split_order_suffix(term: &str, expected: (&str, Option<bool>)) {
        assert_eq!(split_order_suffix(term), expected);
    }

    #[test]
    fn test_parse_all_reverses() {
        let sorters = CollectionSorter::parse_all(&["name", "nc"]).unwrap();
        assert_eq!(sorters[0].field, CollectionSortField::NoteCount);
        assert_eq!(sorters[1].field, CollectionSortField::Name);
    }
}
