//! Notebook configuration
//!
//! Settings read from the notebook's TOML configuration file.

use std::path::Path;

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};

use crate::error::{IndexError, IndexResult};

/// Per-notebook indexing settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotebookConfig {
    /// Extension of the note files, without the leading dot
    pub extension: String,

    /// Glob patterns of paths (relative to the notebook root) left out
    /// of the index
    pub ignore: Vec<String>,

    /// Let regular markdown links match notes partially at indexing time,
    /// like wiki-links do
    pub partial_markdown_links: bool,

    /// Limit applied to queries which don't set one
    pub default_limit: Option<usize>,
}

impl Default for NotebookConfig {
    fn default() -> Self {
        Self {
            extension: "md".to_string(),
            ignore: Vec::new(),
            partial_markdown_links: false,
            default_limit: None,
        }
    }
}

impl NotebookConfig {
    /// Parse a configuration from TOML content
    pub fn from_toml_str(content: &str) -> IndexResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| IndexError::Configuration(format!("invalid notebook config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file, falling back to the defaults when it
    /// doesn't exist
    pub fn load(path: impl AsRef<Path>) -> IndexResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| IndexError::Configuration(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> IndexResult<()> {
        if self.extension.trim().is_empty() {
            return Err(IndexError::Configuration(
                "note extension cannot be empty".to_string(),
            ));
        }
        if self.default_limit == Some(0) {
            return Err(IndexError::Configuration(
                "default limit must be greater than 0".to_string(),
            ));
        }
        self.ignore_set().map(|_| ())
    }

    /// Extension without any leading dot
    pub fn extension(&self) -> &str {
        self.extension.trim_start_matches('.')
    }

    /// Compile the ignore patterns
    pub fn ignore_set(&self) -> IndexResult<GlobSet> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &self.ignore {
            let glob = Glob::new(pattern).map_err(|e| {
                IndexError::Configuration(format!("invalid ignore pattern {}: {}", pattern, e))
            })?;
            builder.add(glob);
        }
        builder
            .build()
            .map_err(|e| IndexError::Configuration(e.to_string()))
    }
}
