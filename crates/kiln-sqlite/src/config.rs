//! SQLite database configuration

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Settings of the index database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SqliteConfig {
    /// Database file, or `:memory:`
    pub path: PathBuf,

    /// Use write-ahead logging
    pub wal_mode: bool,

    pub busy_timeout_ms: u32,

    /// Page cache size. Negative values are in KiB.
    pub cache_size: i64,

    /// Memory-mapped I/O size in bytes, 0 to disable
    pub mmap_size: i64,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./.kiln/notebook.db"),
            wal_mode: true,
            busy_timeout_ms: 5000,
            cache_size: -16000,
            mmap_size: 0,
        }
    }
}

impl SqliteConfig {
    /// Configuration for a database file at `path`
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            ..Default::default()
        }
    }

    /// Configuration for a private in-memory database
    pub fn memory() -> Self {
        Self {
            path: PathBuf::from(":memory:"),
            wal_mode: false,
            ..Default::default()
        }
    }

    pub fn is_memory(&self) -> bool {
        self.path.to_str() == Some(":memory:")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_config() {
        let config = SqliteConfig::memory();
        assert!(config.is_memory());
        assert!(!config.wal_mode);
        assert!(!SqliteConfig::new("notes.db").is_memory());
    }

    #[test]
    fn test_deserialize_partial_config() {
        let config: SqliteConfig =
            serde_json::from_str(r#"{"path": "/tmp/index.db", "busy_timeout_ms": 100}"#).unwrap();
        assert_eq!(config.path, PathBuf::from("/tmp/index.db"));
        assert_eq!(config.busy_timeout_ms, 100);
        assert!(config.wal_mode);
    }
}
