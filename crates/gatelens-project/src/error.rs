//! Project error types.

use std::io;
use std::path::PathBuf;

use gatelens_core::{CallbackFailure, ErrorKind, NetlistError};
use gatelens_hdl::HdlError;
use gatelens_library::LibraryError;

/// Errors from saving, loading or importing projects.
#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid project JSON in {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid settings: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("cannot render settings: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("not a project file: {0}")]
    InvalidFormat(String),

    #[error("project format version {found} is not supported (newest known is {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },

    #[error("netlist hash mismatch: file records {expected}, content hashes to {actual}")]
    IntegrityFailed { expected: String, actual: String },

    #[error(transparent)]
    Netlist(#[from] NetlistError),

    #[error(transparent)]
    Library(#[from] LibraryError),

    #[error(transparent)]
    Hdl(#[from] HdlError),

    #[error("a callback named '{0}' is already registered")]
    DuplicateCallback(String),

    #[error("{} plugin callback(s) failed: {}", .failures.len(), render(.failures))]
    PluginCallbacks { failures: Vec<CallbackFailure> },

    #[error("gate library '{name}' ({}) could not be found", .path.display())]
    MissingLibrary { name: String, path: PathBuf },
}

impl ProjectError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProjectError::Io { source, .. } if source.kind() == io::ErrorKind::NotFound => {
                ErrorKind::NotFound
            }
            ProjectError::Io { .. } => ErrorKind::IoFailure,
            ProjectError::Json { .. }
            | ProjectError::InvalidFormat(_)
            | ProjectError::IntegrityFailed { .. } => ErrorKind::InvalidData,
            ProjectError::Toml(_)
            | ProjectError::TomlSerialize(_)
            | ProjectError::DuplicateCallback(_) => {
                ErrorKind::Configuration
            }
            ProjectError::UnsupportedVersion { .. } => ErrorKind::FormatUnsupported,
            ProjectError::Netlist(e) => e.kind(),
            ProjectError::Library(e) => e.kind(),
            ProjectError::Hdl(e) => e.kind(),
            ProjectError::PluginCallbacks { .. } => ErrorKind::PluginCallbackFailure,
            ProjectError::MissingLibrary { .. } => ErrorKind::NotFound,
        }
    }
}

fn render(failures: &[CallbackFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
