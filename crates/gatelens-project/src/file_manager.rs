//! Saving, loading and importing netlists.

use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use gatelens_core::{guarded, CallbackFailure, CallbackResult, GateLibrary, Netlist};
use gatelens_hdl::ParserManager;
use gatelens_library::GateLibraryManager;
use tracing::{debug, info, warn};

use crate::config::ProjectSettings;
use crate::document::DocNode;
use crate::error::ProjectError;
use crate::serialize::{LibraryRef, NetlistSection, ProjectDocument, FORMAT_TAG, FORMAT_VERSION};

type SerializeFn = Box<dyn Fn(&Path, &Netlist, &mut DocNode) -> CallbackResult + Send + Sync>;
type DeserializeFn = Box<dyn Fn(&Path, &mut Netlist, &DocNode) -> CallbackResult + Send + Sync>;

/// Result of loading or importing a netlist.
#[derive(Debug)]
pub struct LoadOutcome {
    pub netlist: Netlist,
    /// Deserialize callbacks that failed. The netlist itself is complete.
    pub failures: Vec<CallbackFailure>,
}

impl LoadOutcome {
    /// Whether some plugin could not restore its section.
    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Reads and writes project files and runs plugin section callbacks.
///
/// Plugins register a serialize callback to store their own data next to
/// the netlist and a deserialize callback to read it back. Both run in
/// registration order, one at a time.
pub struct FileManager {
    settings: ProjectSettings,
    serializers: Vec<(String, SerializeFn)>,
    deserializers: Vec<(String, DeserializeFn)>,
}

impl FileManager {
    pub fn new(settings: ProjectSettings) -> Self {
        Self {
            settings,
            serializers: Vec::new(),
            deserializers: Vec::new(),
        }
    }

    pub fn settings(&self) -> &ProjectSettings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut ProjectSettings {
        &mut self.settings
    }

    /// Register a callback that writes the section `identifier` on save.
    ///
    /// The callback receives an empty map node to fill.
    pub fn on_serialize<F>(
        &mut self,
        identifier: impl Into<String>,
        callback: F,
    ) -> Result<(), ProjectError>
    where
        F: Fn(&Path, &Netlist, &mut DocNode) -> CallbackResult + Send + Sync + 'static,
    {
        let identifier = identifier.into();
        if self.serializers.iter().any(|(id, _)| *id == identifier) {
            return Err(ProjectError::DuplicateCallback(identifier));
        }
        debug!(
            target: "gatelens::project",
            identifier = %identifier,
            "serialize callback registered"
        );
        self.serializers.push((identifier, Box::new(callback)));
        Ok(())
    }

    /// Register a callback that reads the section `identifier` on load.
    ///
    /// It only runs for files that contain the section.
    pub fn on_deserialize<F>(
        &mut self,
        identifier: impl Into<String>,
        callback: F,
    ) -> Result<(), ProjectError>
    where
        F: Fn(&Path, &mut Netlist, &DocNode) -> CallbackResult + Send + Sync + 'static,
    {
        let identifier = identifier.into();
        if self.deserializers.iter().any(|(id, _)| *id == identifier) {
            return Err(ProjectError::DuplicateCallback(identifier));
        }
        debug!(
            target: "gatelens::project",
            identifier = %identifier,
            "deserialize callback registered"
        );
        self.deserializers.push((identifier, Box::new(callback)));
        Ok(())
    }

    /// Returns whether a callback was registered under `identifier`.
    pub fn remove_serializer(&mut self, identifier: &str) -> bool {
        let before = self.serializers.len();
        self.serializers.retain(|(id, _)| id != identifier);
        self.serializers.len() != before
    }

    pub fn remove_deserializer(&mut self, identifier: &str) -> bool {
        let before = self.deserializers.len();
        self.deserializers.retain(|(id, _)| id != identifier);
        self.deserializers.len() != before
    }

    pub fn serializer_ids(&self) -> Vec<&str> {
        self.serializers.iter().map(|(id, _)| id.as_str()).collect()
    }

    pub fn deserializer_ids(&self) -> Vec<&str> {
        self.deserializers.iter().map(|(id, _)| id.as_str()).collect()
    }

    pub fn is_project_file(&self, path: &Path) -> bool {
        self.settings.is_project_file(path)
    }

    /// Save `netlist` and every plugin section to `path`.
    ///
    /// The netlist is written before any callback runs. Sections of failed
    /// or panicking callbacks are left out and reported through
    /// [`ProjectError::PluginCallbacks`]; the file on disk still holds the
    /// netlist and the sections that succeeded.
    pub fn save(&self, path: &Path, netlist: &Netlist) -> Result<(), ProjectError> {
        let section = NetlistSection::from_netlist(netlist);
        let mut document = ProjectDocument::new(section).map_err(|source| ProjectError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        self.write_document(path, &document)?;

        let mut failures = Vec::new();
        for (identifier, callback) in &self.serializers {
            let mut node = DocNode::map();
            let outcome = guarded(|| callback(path, netlist, &mut node)).and_then(|()| {
                if node.is_finite() {
                    Ok(())
                } else {
                    Err("section holds a NaN or infinite number".to_string())
                }
            });
            match outcome {
                Ok(()) => {
                    document.plugins.insert(identifier.clone(), node);
                }
                Err(message) => {
                    failures.push(self.callback_failed("serialize", identifier, message))
                }
            }
        }
        if !document.plugins.is_empty() {
            self.write_document(path, &document)?;
        }

        info!(
            target: "gatelens::project",
            path = %path.display(),
            gates = netlist.gate_count(),
            nets = netlist.net_count(),
            sections = document.plugins.len(),
            "project saved"
        );
        if failures.is_empty() {
            Ok(())
        } else {
            Err(ProjectError::PluginCallbacks { failures })
        }
    }

    /// Load a project file.
    ///
    /// The gate library is looked up in `libraries` by the recorded path,
    /// then by name, then in the configured search paths. Plugin sections
    /// are restored after the netlist is complete; their failures make the
    /// outcome partial but do not fail the load.
    pub fn load(
        &self,
        path: &Path,
        libraries: &mut GateLibraryManager,
    ) -> Result<LoadOutcome, ProjectError> {
        let text = fs::read_to_string(path).map_err(|source| ProjectError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let document: ProjectDocument =
            serde_json::from_str(&text).map_err(|source| ProjectError::Json {
                path: path.to_path_buf(),
                source,
            })?;
        self.validate(path, &document)?;

        let library = self.resolve_library(&document.netlist.gate_library, libraries)?;
        let mut netlist = document.netlist.into_netlist(library)?;

        let mut failures = Vec::new();
        for (identifier, callback) in &self.deserializers {
            let Some(section) = document.plugins.get(identifier) else {
                debug!(target: "gatelens::project", identifier = %identifier, "no section in file");
                continue;
            };
            if let Err(message) = guarded(|| callback(path, &mut netlist, section)) {
                failures.push(self.callback_failed("deserialize", identifier, message));
            }
        }

        info!(
            target: "gatelens::project",
            path = %path.display(),
            gates = netlist.gate_count(),
            nets = netlist.net_count(),
            failed_sections = failures.len(),
            "project loaded"
        );
        Ok(LoadOutcome { netlist, failures })
    }

    /// Open any supported file.
    ///
    /// Project files go through [`load`](Self::load). Anything else is
    /// parsed by `parsers`, against `library` when given and otherwise
    /// against every library currently held by `libraries`.
    pub fn import(
        &self,
        path: &Path,
        parsers: &ParserManager,
        libraries: &mut GateLibraryManager,
        library: Option<Arc<GateLibrary>>,
    ) -> Result<LoadOutcome, ProjectError> {
        if self.is_project_file(path) {
            return self.load(path, libraries);
        }

        let netlist = match library {
            Some(library) => parsers.parse(path, library)?,
            None => {
                let candidates: Vec<Arc<GateLibrary>> = libraries.libraries().cloned().collect();
                parsers.parse_with_candidates(path, &candidates)?
            }
        };
        Ok(LoadOutcome {
            netlist,
            failures: Vec::new(),
        })
    }

    fn validate(&self, path: &Path, document: &ProjectDocument) -> Result<(), ProjectError> {
        if document.format != FORMAT_TAG {
            return Err(ProjectError::InvalidFormat(format!(
                "{} has format '{}', expected '{FORMAT_TAG}'",
                path.display(),
                document.format
            )));
        }
        if document.version == 0 || document.version > FORMAT_VERSION {
            return Err(ProjectError::UnsupportedVersion {
                found: document.version,
                supported: FORMAT_VERSION,
            });
        }
        if !self.settings.verify_integrity {
            return Ok(());
        }
        if let Some(expected) = &document.netlist_hash {
            let actual = document.netlist.hash().map_err(|source| ProjectError::Json {
                path: path.to_path_buf(),
                source,
            })?;
            if *expected != actual {
                return Err(ProjectError::IntegrityFailed {
                    expected: expected.clone(),
                    actual,
                });
            }
        }
        Ok(())
    }

    fn resolve_library(
        &self,
        reference: &LibraryRef,
        libraries: &mut GateLibraryManager,
    ) -> Result<Arc<GateLibrary>, ProjectError> {
        if let Some(library) = libraries.get(&reference.path) {
            return Ok(library);
        }
        if reference.path.is_file() {
            match libraries.load(&reference.path, false) {
                Ok(library) => return Ok(library),
                Err(err) => warn!(
                    target: "gatelens::project",
                    path = %reference.path.display(),
                    error = %err,
                    "recorded gate library failed to load"
                ),
            }
        }
        if let Some(library) = libraries.get_by_name(&reference.name) {
            return Ok(library);
        }
        for directory in &self.settings.library_search_paths {
            if let Err(err) = libraries.load_all(directory, false) {
                warn!(
                    target: "gatelens::project",
                    directory = %directory.display(),
                    error = %err,
                    "gate library search path unreadable"
                );
                continue;
            }
            if let Some(library) = libraries.get_by_name(&reference.name) {
                return Ok(library);
            }
        }
        Err(ProjectError::MissingLibrary {
            name: reference.name.clone(),
            path: reference.path.clone(),
        })
    }

    fn write_document(&self, path: &Path, document: &ProjectDocument) -> Result<(), ProjectError> {
        let rendered = if self.settings.pretty {
            serde_json::to_string_pretty(document)
        } else {
            serde_json::to_string(document)
        }
        .map_err(|source| ProjectError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, rendered).map_err(|source| ProjectError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    fn callback_failed(&self, hook: &str, identifier: &str, message: String) -> CallbackFailure {
        warn!(
            target: "gatelens::project",
            hook,
            identifier,
            error = %message,
            "plugin callback failed"
        );
        CallbackFailure {
            hook: hook.to_string(),
            key: identifier.to_string(),
            message,
        }
    }
}

impl Default for FileManager {
    fn default() -> Self {
        Self::new(ProjectSettings::default())
    }
}

impl fmt::Debug for FileManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileManager")
            .field("settings", &self.settings)
            .field("serializers", &self.serializer_ids())
            .field("deserializers", &self.deserializer_ids())
            .finish()
    }
}
