//! Loading and caching of gate libraries.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use gatelens_core::{BackendRegistry, GateLibrary, Selector};
use tracing::{debug, info, warn};

use crate::error::LibraryError;
use crate::hgl::HglReader;

/// A reader for one gate library file format.
pub trait GateLibraryParser: Send {
    fn parse(&mut self, path: &Path, source: &str) -> Result<GateLibrary, LibraryError>;
}

/// Loads gate libraries through registered readers and keeps them by path.
///
/// Loaded libraries are shared as `Arc<GateLibrary>`; loading the same file
/// twice returns the cached instance unless a reload is requested.
#[derive(Debug)]
pub struct GateLibraryManager {
    registry: BackendRegistry<Box<dyn GateLibraryParser>>,
    libraries: BTreeMap<PathBuf, Arc<GateLibrary>>,
}

impl GateLibraryManager {
    /// A manager with no readers registered.
    pub fn new() -> Self {
        Self {
            registry: BackendRegistry::new("gate library"),
            libraries: BTreeMap::new(),
        }
    }

    /// A manager with the built-in `.hgl` reader registered.
    pub fn with_defaults() -> Self {
        let mut manager = Self::new();
        let registered =
            manager.register_parser("hgl", Selector::extensions(["hgl"]), || HglReader);
        if let Err(err) = registered {
            warn!(target: "gatelens::library", error = %err, "built-in hgl reader not registered");
        }
        manager
    }

    pub fn register_parser<F, P>(
        &mut self,
        identifier: impl Into<String>,
        selector: Selector,
        factory: F,
    ) -> Result<(), LibraryError>
    where
        F: Fn() -> P + Send + Sync + 'static,
        P: GateLibraryParser + 'static,
    {
        self.registry.register(identifier, selector, move || {
            Box::new(factory()) as Box<dyn GateLibraryParser>
        })?;
        Ok(())
    }

    pub fn unregister_parser(&mut self, identifier: &str) -> Result<(), LibraryError> {
        self.registry.unregister(identifier)?;
        Ok(())
    }

    pub fn supported_extensions(&self) -> Vec<String> {
        self.registry.supported_extensions()
    }

    pub fn can_load(&self, path: &Path) -> bool {
        self.registry.accepts(path)
    }

    /// Load the library at `path`.
    ///
    /// A library already loaded from the same file is returned as is unless
    /// `reload` is set, in which case the file is parsed again and replaces
    /// the cached entry.
    pub fn load(&mut self, path: &Path, reload: bool) -> Result<Arc<GateLibrary>, LibraryError> {
        let (identifier, mut parser) = self.registry.create_for(path)?;
        let key = fs::canonicalize(path).map_err(|source| LibraryError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        if !reload {
            if let Some(library) = self.libraries.get(&key) {
                debug!(
                    target: "gatelens::library",
                    path = %key.display(),
                    "gate library cache hit"
                );
                return Ok(Arc::clone(library));
            }
        }

        let source = fs::read_to_string(&key).map_err(|source| LibraryError::Io {
            path: key.clone(),
            source,
        })?;
        let library = Arc::new(parser.parse(&key, &source)?);
        info!(
            target: "gatelens::library",
            reader = %identifier,
            library = library.name(),
            path = %key.display(),
            gate_types = library.len(),
            "gate library loaded"
        );
        self.libraries.insert(key, Arc::clone(&library));
        Ok(library)
    }

    /// Load every file in `directory` some registered reader accepts.
    ///
    /// Files are visited in name order. A file that fails to load is logged
    /// and skipped.
    pub fn load_all(
        &mut self,
        directory: &Path,
        reload: bool,
    ) -> Result<Vec<Arc<GateLibrary>>, LibraryError> {
        let entries = fs::read_dir(directory).map_err(|source| LibraryError::Io {
            path: directory.to_path_buf(),
            source,
        })?;

        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| LibraryError::Io {
                path: directory.to_path_buf(),
                source,
            })?;
            let path = entry.path();
            if path.is_file() && self.registry.accepts(&path) {
                paths.push(path);
            }
        }
        paths.sort();

        let mut loaded = Vec::with_capacity(paths.len());
        for path in paths {
            match self.load(&path, reload) {
                Ok(library) => loaded.push(library),
                Err(err) => warn!(
                    target: "gatelens::library",
                    path = %path.display(),
                    error = %err,
                    "skipping gate library"
                ),
            }
        }
        Ok(loaded)
    }

    /// Add a library built in memory, keyed by its own path.
    pub fn insert(&mut self, library: GateLibrary) -> Arc<GateLibrary> {
        let library = Arc::new(library);
        self.libraries
            .insert(library.path().to_path_buf(), Arc::clone(&library));
        library
    }

    /// The library loaded from `path`, if any.
    pub fn get(&self, path: &Path) -> Option<Arc<GateLibrary>> {
        let key = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        self.libraries.get(&key).cloned()
    }

    /// The first loaded library called `name`, in path order.
    pub fn get_by_name(&self, name: &str) -> Option<Arc<GateLibrary>> {
        self.libraries.values().find(|l| l.name() == name).cloned()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.get(path).is_some()
    }

    /// Forget the library loaded from `path`.
    pub fn remove(&mut self, path: &Path) -> Result<Arc<GateLibrary>, LibraryError> {
        let key = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        self.libraries
            .remove(&key)
            .ok_or_else(|| LibraryError::NotLoaded(path.display().to_string()))
    }

    /// All loaded libraries, in path order.
    pub fn libraries(&self) -> impl Iterator<Item = &Arc<GateLibrary>> {
        self.libraries.values()
    }

    pub fn len(&self) -> usize {
        self.libraries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.libraries.is_empty()
    }
}

impl Default for GateLibraryManager {
    fn default() -> Self {
        Self::with_defaults()
    }
}
