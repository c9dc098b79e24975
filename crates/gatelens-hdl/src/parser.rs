//! HDL parser backends and the manager that dispatches to them.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use gatelens_core::{BackendRegistry, GateLibrary, Netlist, Selector};
use tracing::{debug, info, warn};

use crate::error::HdlError;

/// A parser for one hardware-description format.
///
/// A fresh instance is created for every file, so implementations may keep
/// per-parse state in `self`.
pub trait HdlParser: Send {
    /// Build a netlist from `source`, the contents of `path`, instantiating
    /// gates from `library`.
    fn parse(
        &mut self,
        path: &Path,
        source: &str,
        library: Arc<GateLibrary>,
    ) -> Result<Netlist, HdlError>;
}

/// Registry of HDL parsers.
#[derive(Debug)]
pub struct ParserManager {
    registry: BackendRegistry<Box<dyn HdlParser>>,
}

impl ParserManager {
    pub fn new() -> Self {
        Self {
            registry: BackendRegistry::new("parser"),
        }
    }

    /// Register a parser factory under `identifier`.
    pub fn register_parser<F, P>(
        &mut self,
        identifier: impl Into<String>,
        selector: Selector,
        factory: F,
    ) -> Result<(), HdlError>
    where
        F: Fn() -> P + Send + Sync + 'static,
        P: HdlParser + 'static,
    {
        self.registry
            .register(identifier, selector, move || Box::new(factory()) as Box<dyn HdlParser>)?;
        Ok(())
    }

    pub fn unregister_parser(&mut self, identifier: &str) -> Result<(), HdlError> {
        self.registry.unregister(identifier)?;
        Ok(())
    }

    pub fn is_registered(&self, identifier: &str) -> bool {
        self.registry.contains(identifier)
    }

    pub fn identifiers(&self) -> Vec<&str> {
        self.registry.identifiers()
    }

    pub fn supported_extensions(&self) -> Vec<String> {
        self.registry.supported_extensions()
    }

    /// Whether some registered parser accepts `path`.
    pub fn can_parse(&self, path: &Path) -> bool {
        self.registry.accepts(path)
    }

    /// Parse `path` with the parser selected for it.
    pub fn parse(&self, path: &Path, library: Arc<GateLibrary>) -> Result<Netlist, HdlError> {
        let identifier = self.registry.select(path)?.to_string();
        self.parse_with(&identifier, path, library)
    }

    /// Parse `path` with a specific parser, bypassing selection.
    pub fn parse_with(
        &self,
        identifier: &str,
        path: &Path,
        library: Arc<GateLibrary>,
    ) -> Result<Netlist, HdlError> {
        let mut parser = self.registry.create(identifier)?;
        let source = read_source(path)?;
        run_parser(identifier, parser.as_mut(), path, &source, library)
    }

    /// Parse `path` against each candidate library in turn.
    ///
    /// Returns the first successful netlist. If every attempt fails, the
    /// error of the last attempt is returned.
    pub fn parse_with_candidates(
        &self,
        path: &Path,
        libraries: &[Arc<GateLibrary>],
    ) -> Result<Netlist, HdlError> {
        let identifier = self.registry.select(path)?.to_string();
        let source = read_source(path)?;

        let mut last_error = None;
        for library in libraries {
            let mut parser = self.registry.create(&identifier)?;
            match run_parser(&identifier, parser.as_mut(), path, &source, Arc::clone(library)) {
                Ok(netlist) => return Ok(netlist),
                Err(err) => {
                    debug!(
                        target: "gatelens::hdl",
                        library = library.name(),
                        error = %err,
                        "candidate gate library rejected"
                    );
                    last_error = Some(err);
                }
            }
        }

        let err = last_error.unwrap_or_else(|| HdlError::Backend {
            backend: identifier,
            message: "no candidate gate libraries given".to_string(),
        });
        warn!(
            target: "gatelens::hdl",
            path = %path.display(),
            error = %err,
            "no gate library fits"
        );
        Err(err)
    }
}

impl Default for ParserManager {
    fn default() -> Self {
        Self::new()
    }
}

fn run_parser(
    identifier: &str,
    parser: &mut dyn HdlParser,
    path: &Path,
    source: &str,
    library: Arc<GateLibrary>,
) -> Result<Netlist, HdlError> {
    let library_name = library.name().to_string();
    let mut netlist = parser.parse(path, source, library)?;
    netlist.set_input_path(path);
    info!(
        target: "gatelens::hdl",
        parser = identifier,
        path = %path.display(),
        library = %library_name,
        gates = netlist.gate_count(),
        nets = netlist.net_count(),
        "netlist parsed"
    );
    Ok(netlist)
}

pub(crate) fn read_source(path: &Path) -> Result<String, HdlError> {
    fs::read_to_string(path).map_err(|source| HdlError::Io {
        path: path.to_path_buf(),
        source,
    })
}
