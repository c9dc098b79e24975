//! Error types for HDL parsing and writing.

use std::io;
use std::path::PathBuf;

use gatelens_core::{ErrorKind, NetlistError, RegistryError};

/// Errors from parser and writer backends and their managers.
#[derive(Debug, thiserror::Error)]
pub enum HdlError {
    #[error("syntax error at line {line} (token {position}): {message}")]
    Syntax {
        line: u32,
        position: usize,
        message: String,
    },

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Netlist(#[from] NetlistError),

    #[error("{backend}: {message}")]
    Backend { backend: String, message: String },
}

impl HdlError {
    pub fn syntax(line: u32, position: usize, message: impl Into<String>) -> Self {
        HdlError::Syntax {
            line,
            position,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            HdlError::Syntax { .. } => ErrorKind::SyntaxError,
            HdlError::Io { .. } => ErrorKind::IoFailure,
            HdlError::Registry(e) => e.kind(),
            HdlError::Netlist(e) => e.kind(),
            HdlError::Backend { .. } => ErrorKind::InvalidData,
        }
    }
}
