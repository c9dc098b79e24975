//! Error classification shared by every gatelens crate.
//!
//! Each crate defines its own error enum; all of them map onto one of these
//! kinds through a `kind()` method so callers can react to the category of a
//! failure without matching on crate-specific variants.

use std::fmt;

/// Broad category of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Pin already connected, name collision, cyclic module assignment.
    StructuralConflict,
    /// Operation on an id, handle, or key that is not present.
    NotFound,
    /// No registered backend handles the requested format.
    FormatUnsupported,
    /// Token stream mismatch or malformed input text.
    SyntaxError,
    /// Underlying file access failed.
    IoFailure,
    /// A registered plugin or event callback reported a failure.
    PluginCallbackFailure,
    /// Invalid registration or settings.
    Configuration,
    /// Input parsed but describes an invalid object.
    InvalidData,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::StructuralConflict => write!(f, "structural conflict"),
            ErrorKind::NotFound => write!(f, "not found"),
            ErrorKind::FormatUnsupported => write!(f, "format unsupported"),
            ErrorKind::SyntaxError => write!(f, "syntax error"),
            ErrorKind::IoFailure => write!(f, "I/O failure"),
            ErrorKind::PluginCallbackFailure => write!(f, "plugin callback failure"),
            ErrorKind::Configuration => write!(f, "configuration error"),
            ErrorKind::InvalidData => write!(f, "invalid data"),
        }
    }
}
