//! Notebook file scanner
//!
//! The [`FileScanner`] port lists the note files of a notebook in walk
//! order and reads them. [`WalkScanner`] implements it over a directory on
//! disk.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use globset::GlobSet;
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

use crate::config::NotebookConfig;
use crate::error::{IndexError, IndexResult, ResultExt};
use crate::note::FileMetadata;

/// Raw content of a note file with its dates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileContent {
    pub bytes: Vec<u8>,
    /// Not every platform records a creation time
    pub created: Option<DateTime<Utc>>,
    pub modified: DateTime<Utc>,
}

/// Source of the note files of a notebook
pub trait FileScanner {
    /// Every note file, sorted the way a recursive directory walk visits
    /// them
    fn scan(&self) -> IndexResult<Vec<FileMetadata>>;

    /// Read the note file at a path relative to the notebook root
    fn read(&self, path: &str) -> IndexResult<FileContent>;
}

/// Scans a notebook directory on disk
#[derive(Debug, Clone)]
pub struct WalkScanner {
    root: PathBuf,
    extension: String,
    ignore: GlobSet,
}

impl WalkScanner {
    pub fn new(root: impl Into<PathBuf>, config: &NotebookConfig) -> IndexResult<Self> {
        Ok(Self {
            root: root.into(),
            extension: config.extension().to_string(),
            ignore: config.ignore_set()?,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path relative to the root, with `/` separators
    fn relative_path(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let parts: Option<Vec<&str>> = relative.components().map(|c| c.as_os_str().to_str()).collect();
        Some(parts?.join("/"))
    }

    fn has_note_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext == self.extension)
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with('.'))
}

fn to_utc(time: SystemTime) -> DateTime<Utc> {
    DateTime::<Utc>::from(time)
}

impl FileScanner for WalkScanner {
    fn scan(&self) -> IndexResult<Vec<FileMetadata>> {
        let mut files = Vec::new();

        let walker = WalkDir::new(&self.root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !is_hidden(e));

        for entry in walker {
            let entry = entry.map_err(|e| IndexError::Io(e.to_string()))?;
            if !entry.file_type().is_file() || !self.has_note_extension(entry.path()) {
                continue;
            }

            let Some(path) = self.relative_path(entry.path()) else {
                warn!(path = %entry.path().display(), "skipping file with a non UTF-8 path");
                continue;
            };
            if self.ignore.is_match(&path) {
                debug!(path = %path, "ignoring file");
                continue;
            }

            let metadata = entry
                .metadata()
                .map_err(|e| IndexError::Io(e.to_string()))
                .with_context(|| path.clone())?;
            let modified = metadata.modified().context(path.clone())?;
            files.push(FileMetadata::new(path, to_utc(modified)));
        }

        debug!(root = %self.root.display(), count = files.len(), "scanned notebook");
        Ok(files)
    }

    fn read(&self, path: &str) -> IndexResult<FileContent> {
        let abs = self.root.join(path);
        let bytes = std::fs::read(&abs).context(path)?;
        let metadata = std::fs::metadata(&abs).context(path)?;
        Ok(FileContent {
            bytes,
            created: metadata.created().ok().map(to_utc),
            modified: to_utc(metadata.modified().context(path)?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(root: &Path, path: &str, content: &str) {
        let path = root.join(path);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_scan_in_walk_order() {
        let dir = tempfile::tempdir().unwrap();
        for path in ["b.md", "a.md", "a/z.md", "a/b/c.md", "c.txt", ".hidden.md", ".git/x.md"] {
            write(dir.path(), path, "content");
        }

        let scanner = WalkScanner::new(dir.path(), &NotebookConfig::default()).unwrap();
        let paths: Vec<String> = scanner.scan().unwrap().into_iter().map(|f| f.path).collect();

        assert_eq!(paths, vec!["a/b/c.md", "a/z.md", "a.md", "b.md"]);
    }

    #[test]
    fn test_scan_skips_ignored_paths() {
        let dir = tempfile::tempdir().unwrap();
        for path in ["keep.md", "drafts/skip.md", "notes/drafts/keep.md"] {
            write(dir.path(), path, "content");
        }

        let config = NotebookConfig {
            ignore: vec!["drafts/*".to_string()],
            ..Default::default()
        };
        let scanner = WalkScanner::new(dir.path(), &config).unwrap();
        let paths: Vec<String> = scanner.scan().unwrap().into_iter().map(|f| f.path).collect();

        assert_eq!(paths, vec!["keep.md", "notes/drafts/keep.md"]);
    }

    #[test]
    fn test_read() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "dir/note.md", "# Hello");

        let scanner = WalkScanner::new(dir.path(), &NotebookConfig::default()).unwrap();
        let content = scanner.read("dir/note.md").unwrap();
        assert_eq!(content.bytes, b"# Hello");

        assert!(scanner.read("missing.md").is_err());
    }
}
