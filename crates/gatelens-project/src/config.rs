//! Project settings, read from a TOML file.
//!
//! ```toml
//! pretty = true
//! verify-integrity = true
//! library-search-paths = ["/opt/cells", "libs"]
//! project-extension = "glp"
//! ```
//!
//! Every key is optional.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ProjectError;

/// Settings of a [`FileManager`](crate::FileManager).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct ProjectSettings {
    /// Indent project JSON.
    pub pretty: bool,
    /// Check the recorded netlist hash on load.
    pub verify_integrity: bool,
    /// Directories searched for a gate library that is neither at its
    /// recorded path nor already loaded.
    pub library_search_paths: Vec<PathBuf>,
    /// Extension (without dot) that marks a file as a project file.
    pub project_extension: String,
}

impl Default for ProjectSettings {
    fn default() -> Self {
        Self {
            pretty: true,
            verify_integrity: true,
            library_search_paths: Vec::new(),
            project_extension: "glp".to_string(),
        }
    }
}

impl ProjectSettings {
    /// Read settings from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ProjectError> {
        let content = fs::read_to_string(path).map_err(|source| ProjectError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(input: &str) -> Result<Self, ProjectError> {
        Ok(toml::from_str(input)?)
    }

    pub fn to_toml_string(&self) -> Result<String, ProjectError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Whether `path` carries the project extension.
    pub fn is_project_file(&self, path: &Path) -> bool {
        let wanted = self.project_extension.trim_start_matches('.');
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(wanted))
    }
}
