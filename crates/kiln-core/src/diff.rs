//! Change detection between the notebook files and the index
//!
//! Both sides are streams of [`FileMetadata`] sorted in directory walk
//! order, so a single linear merge finds every change.

use std::cmp::Ordering;
use std::fmt;

use tracing::debug;

use crate::error::IndexResult;
use crate::note::FileMetadata;

/// Kind of change detected for a path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Added,
    Modified,
    Removed,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ChangeKind::Added => "added",
            ChangeKind::Modified => "modified",
            ChangeKind::Removed => "removed",
        })
    }
}

/// A file that differs between the source and the target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathChange {
    pub path: String,
    pub kind: ChangeKind,
}

impl PathChange {
    fn new(path: impl Into<String>, kind: ChangeKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

/// Sort key reproducing the order of a recursive directory walk.
///
/// A walk visits the whole content of `a/` when it reaches the entry `a`,
/// before the sibling `a.md`. Replacing the separator with a byte lower
/// than any printable character gives plain string comparison the same
/// order.
pub fn walk_order_key(path: &str) -> String {
    path.replace('/', "\u{1}")
}

/// Compare two relative paths in directory walk order
pub fn walk_order(a: &str, b: &str) -> Ordering {
    let a = a.split('/');
    let b = b.split('/');
    a.cmp(b)
}

/// Report the changes needed to bring `target` in line with `source`.
///
/// Both iterators must be sorted in walk order. A path present on both
/// sides is modified when its modification time differs, or always when
/// `force` is set. `callback` is invoked for each change in order; the
/// first error it returns stops the diff.
///
/// Returns the number of files in `source`.
pub fn diff<S, T, F>(source: S, target: T, force: bool, mut callback: F) -> IndexResult<usize>
where
    S: IntoIterator<Item = FileMetadata>,
    T: IntoIterator<Item = FileMetadata>,
    F: FnMut(PathChange) -> IndexResult<()>,
{
    let mut source = source.into_iter();
    let mut target = target.into_iter();
    let mut source_count = 0;

    let mut next_source = source.next();
    let mut next_target = target.next();

    loop {
        let change = match (next_source.take(), next_target.take()) {
            (None, None) => break,
            (Some(s), None) => {
                source_count += 1;
                next_source = source.next();
                Some(PathChange::new(s.path, ChangeKind::Added))
            }
            (None, Some(t)) => {
                next_target = target.next();
                Some(PathChange::new(t.path, ChangeKind::Removed))
            }
            (Some(s), Some(t)) => match walk_order(&s.path, &t.path) {
                Ordering::Equal => {
                    source_count += 1;
                    next_source = source.next();
                    next_target = target.next();
                    if force || s.modified != t.modified {
                        Some(PathChange::new(s.path, ChangeKind::Modified))
                    } else {
                        None
                    }
                }
                Ordering::Less => {
                    source_count += 1;
                    next_source = source.next();
                    next_target = Some(t);
                    Some(PathChange::new(s.path, ChangeKind::Added))
                }
                Ordering::Greater => {
                    next_source = Some(s);
                    next_target = target.next();
                    Some(PathChange::new(t.path, ChangeKind::Removed))
                }
            },
        };

        if let Some(change) = change {
            debug!(path = %change.path, kind = %change.kind, "detected change");
            callback(change)?;
        }
    }

    Ok(source_count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::IndexError;
    use chrono::{DateTime, TimeZone, Utc};

    fn date(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn files(entries: &[(&str, i64)]) -> Vec<FileMetadata> {
        entries
            .iter()
            .map(|(path, secs)| FileMetadata::new(*path, date(*secs)))
            .collect()
    }

    fn collect(
        source: Vec<FileMetadata>,
        target: Vec<FileMetadata>,
        force: bool,
    ) -> (usize, Vec<PathChange>) {
        let mut changes = Vec::new();
        let count = diff(source, target, force, |c| {
            changes.push(c);
            Ok(())
        })
        .unwrap();
        (count, changes)
    }

    #[test]
    fn test_identical_streams_have_no_changes() {
        let entries = &[("a.md", 1), ("b/c.md", 2), ("d.md", 3)];
        let (count, changes) = collect(files(entries), files(entries), false);
        assert_eq!(count, 3);
        assert!(changes.is_empty());
    }

    #[test]
    fn test_against_empty_target_everything_is_added() {
        let (count, changes) = collect(files(&[("a.md", 1), ("b.md", 2)]), vec![], false);
        assert_eq!(count, 2);
        assert_eq!(
            changes,
            vec![
                PathChange::new("a.md", ChangeKind::Added),
                PathChange::new("b.md", ChangeKind::Added),
            ]
        );
    }

    #[test]
    fn test_against_empty_source_everything_is_removed() {
        let (count, changes) = collect(vec![], files(&[("a.md", 1), ("b.md", 2)]), false);
        assert_eq!(count, 0);
        assert!(changes.iter().all(|c| c.kind == ChangeKind::Removed));
        assert_eq!(changes.len(), 2);
    }

    #[test]
    fn test_mixed_changes() {
        let source = files(&[("a.md", 1), ("b.md", 5), ("d.md", 1)]);
        let target = files(&[("a.md", 1), ("b.md", 2), ("c.md", 1)]);
        let (count, changes) = collect(source, target, false);
        assert_eq!(count, 3);
        assert_eq!(
            changes,
            vec![
                PathChange::new("b.md", ChangeKind::Modified),
                PathChange::new("c.md", ChangeKind::Removed),
                PathChange::new("d.md", ChangeKind::Added),
            ]
        );
    }

    #[test]
    fn test_force_marks_every_shared_path_modified() {
        let entries = &[("a.md", 1), ("b.md", 2)];
        let (_, changes) = collect(files(entries), files(entries), true);
        assert_eq!(changes.len(), 2);
        assert!(changes.iter().all(|c| c.kind == ChangeKind::Modified));
    }

    #[test]
    fn test_walk_order_visits_directories_before_siblings() {
        let source = files(&[("a/z.md", 1), ("a.md", 1), ("b.md", 1)]);
        let target = files(&[("a/z.md", 1), ("a.md", 1), ("b.md", 1)]);
        let (_, changes) = collect(source, target, false);
        assert!(changes.is_empty());

        assert_eq!(walk_order("a/z.md", "a.md"), Ordering::Less);
        assert!(walk_order_key("a/z.md") < walk_order_key("a.md"));
    }

    #[test]
    fn test_callback_error_stops_the_diff() {
        let mut seen = 0;
        let res = diff(files(&[("a.md", 1), ("b.md", 1)]), vec![], false, |_| {
            seen += 1;
            Err(IndexError::storage("boom"))
        });
        assert!(res.is_err());
        assert_eq!(seen, 1);
    }
}
