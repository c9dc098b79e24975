//! Error types for gate library loading.

use std::io;
use std::path::PathBuf;

use gatelens_core::{ErrorKind, RegistryError};

/// Errors from reading, parsing or looking up gate libraries.
#[derive(Debug, thiserror::Error)]
pub enum LibraryError {
    #[error("invalid gate library JSON in {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("gate type '{cell}': {message}")]
    InvalidCell { cell: String, message: String },

    #[error("missing '{field}' in {context}")]
    MissingField { field: &'static str, context: String },

    #[error("gate library '{0}' is not loaded")]
    NotLoaded(String),
}

impl LibraryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LibraryError::Json { .. }
            | LibraryError::InvalidCell { .. }
            | LibraryError::MissingField { .. } => ErrorKind::InvalidData,
            LibraryError::Io { .. } => ErrorKind::IoFailure,
            LibraryError::Registry(e) => e.kind(),
            LibraryError::NotLoaded(_) => ErrorKind::NotFound,
        }
    }
}
