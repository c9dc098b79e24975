//! Identifier-keyed backend registries.
//!
//! Parsers, writers and gate-library readers are all plugged in the same
//! way: a backend is registered under a unique identifier together with a
//! [`Selector`] describing which files it handles and a factory producing a
//! fresh instance per use. The registry picks a backend for a path by file
//! extension first and by predicate second.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::error::ErrorKind;

type Factory<B> = Arc<dyn Fn() -> B + Send + Sync>;
type Predicate = Arc<dyn Fn(&Path) -> bool + Send + Sync>;

/// Errors raised by [`BackendRegistry`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("{kind} backend '{identifier}' is already registered")]
    DuplicateBackend { kind: &'static str, identifier: String },

    #[error("no {kind} backend accepts '{path}'")]
    NoBackend { kind: &'static str, path: String },

    #[error("unknown {kind} backend '{identifier}'")]
    UnknownBackend { kind: &'static str, identifier: String },
}

impl RegistryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RegistryError::DuplicateBackend { .. } => ErrorKind::Configuration,
            RegistryError::NoBackend { .. } => ErrorKind::FormatUnsupported,
            RegistryError::UnknownBackend { .. } => ErrorKind::NotFound,
        }
    }
}

/// Which files a backend handles.
#[derive(Clone, Default)]
pub struct Selector {
    extensions: Vec<String>,
    predicate: Option<Predicate>,
}

impl Selector {
    /// Match by file extension. Extensions are compared case-insensitively
    /// and may be given with or without a leading dot.
    pub fn extensions<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            extensions: extensions
                .into_iter()
                .map(|e| normalize_extension(e.as_ref()))
                .filter(|e| !e.is_empty())
                .collect(),
            predicate: None,
        }
    }

    /// Match any path accepted by `predicate`.
    pub fn predicate<F>(predicate: F) -> Self
    where
        F: Fn(&Path) -> bool + Send + Sync + 'static,
    {
        Self {
            extensions: Vec::new(),
            predicate: Some(Arc::new(predicate)),
        }
    }

    /// Add a predicate to an extension selector.
    pub fn with_predicate<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Path) -> bool + Send + Sync + 'static,
    {
        self.predicate = Some(Arc::new(predicate));
        self
    }

    pub fn extension_list(&self) -> &[String] {
        &self.extensions
    }

    fn matches_extension(&self, path: &Path) -> bool {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) => {
                let ext = normalize_extension(ext);
                self.extensions.iter().any(|e| *e == ext)
            }
            None => false,
        }
    }

    fn matches_predicate(&self, path: &Path) -> bool {
        self.predicate.as_ref().is_some_and(|p| p(path))
    }
}

impl fmt::Debug for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Selector")
            .field("extensions", &self.extensions)
            .field("predicate", &self.predicate.is_some())
            .finish()
    }
}

struct Entry<B> {
    identifier: String,
    selector: Selector,
    factory: Factory<B>,
}

/// Ordered map from backend identifier to selector and factory.
pub struct BackendRegistry<B> {
    kind: &'static str,
    entries: Vec<Entry<B>>,
}

impl<B> BackendRegistry<B> {
    /// Create an empty registry. `kind` names the backend family in errors
    /// and logs (for example `"parser"`).
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            entries: Vec::new(),
        }
    }

    /// Register a backend. Fails if `identifier` is taken; the existing
    /// registration is left in place.
    pub fn register<F>(
        &mut self,
        identifier: impl Into<String>,
        selector: Selector,
        factory: F,
    ) -> Result<(), RegistryError>
    where
        F: Fn() -> B + Send + Sync + 'static,
    {
        let identifier = identifier.into();
        if self.contains(&identifier) {
            return Err(RegistryError::DuplicateBackend {
                kind: self.kind,
                identifier,
            });
        }
        debug!(
            target: "gatelens::registry",
            kind = self.kind,
            identifier = %identifier,
            extensions = ?selector.extensions,
            "backend registered"
        );
        self.entries.push(Entry {
            identifier,
            selector,
            factory: Arc::new(factory),
        });
        Ok(())
    }

    pub fn unregister(&mut self, identifier: &str) -> Result<(), RegistryError> {
        let before = self.entries.len();
        self.entries.retain(|e| e.identifier != identifier);
        if self.entries.len() == before {
            return Err(self.unknown(identifier));
        }
        debug!(target: "gatelens::registry", kind = self.kind, identifier, "backend unregistered");
        Ok(())
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.entries.iter().any(|e| e.identifier == identifier)
    }

    /// Registered identifiers in registration order.
    pub fn identifiers(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.identifier.as_str()).collect()
    }

    /// Every extension some backend selects on, sorted and deduplicated.
    pub fn supported_extensions(&self) -> Vec<String> {
        let mut all: Vec<String> = self
            .entries
            .iter()
            .flat_map(|e| e.selector.extensions.iter().cloned())
            .collect();
        all.sort();
        all.dedup();
        all
    }

    /// Whether some backend would accept `path`.
    pub fn accepts(&self, path: &Path) -> bool {
        self.select(path).is_ok()
    }

    /// Identifier of the backend that handles `path`.
    pub fn select(&self, path: &Path) -> Result<&str, RegistryError> {
        self.entries
            .iter()
            .find(|e| e.selector.matches_extension(path))
            .or_else(|| self.entries.iter().find(|e| e.selector.matches_predicate(path)))
            .map(|e| e.identifier.as_str())
            .ok_or_else(|| RegistryError::NoBackend {
                kind: self.kind,
                path: path.display().to_string(),
            })
    }

    /// A fresh instance of the named backend.
    pub fn create(&self, identifier: &str) -> Result<B, RegistryError> {
        self.entries
            .iter()
            .find(|e| e.identifier == identifier)
            .map(|e| (e.factory)())
            .ok_or_else(|| self.unknown(identifier))
    }

    /// Select a backend for `path` and instantiate it.
    pub fn create_for(&self, path: &Path) -> Result<(String, B), RegistryError> {
        let identifier = self.select(path)?.to_string();
        let backend = self.create(&identifier)?;
        Ok((identifier, backend))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn unknown(&self, identifier: &str) -> RegistryError {
        RegistryError::UnknownBackend {
            kind: self.kind,
            identifier: identifier.to_string(),
        }
    }
}

impl<B> fmt::Debug for BackendRegistry<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("kind", &self.kind)
            .field("identifiers", &self.identifiers())
            .finish()
    }
}

fn normalize_extension(ext: &str) -> String {
    ext.trim_start_matches('.').to_ascii_lowercase()
}
