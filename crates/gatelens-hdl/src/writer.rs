//! HDL writer backends and the manager that dispatches to them.

use std::path::Path;

use gatelens_core::{BackendRegistry, Netlist, Selector};
use tracing::info;

use crate::error::HdlError;

/// A writer for one hardware-description format.
pub trait HdlWriter: Send {
    fn write(&mut self, netlist: &Netlist, path: &Path) -> Result<(), HdlError>;
}

/// Registry of HDL writers.
#[derive(Debug)]
pub struct WriterManager {
    registry: BackendRegistry<Box<dyn HdlWriter>>,
}

impl WriterManager {
    pub fn new() -> Self {
        Self {
            registry: BackendRegistry::new("writer"),
        }
    }

    pub fn register_writer<F, W>(
        &mut self,
        identifier: impl Into<String>,
        selector: Selector,
        factory: F,
    ) -> Result<(), HdlError>
    where
        F: Fn() -> W + Send + Sync + 'static,
        W: HdlWriter + 'static,
    {
        self.registry
            .register(identifier, selector, move || Box::new(factory()) as Box<dyn HdlWriter>)?;
        Ok(())
    }

    pub fn unregister_writer(&mut self, identifier: &str) -> Result<(), HdlError> {
        self.registry.unregister(identifier)?;
        Ok(())
    }

    pub fn is_registered(&self, identifier: &str) -> bool {
        self.registry.contains(identifier)
    }

    pub fn supported_extensions(&self) -> Vec<String> {
        self.registry.supported_extensions()
    }

    pub fn can_write(&self, path: &Path) -> bool {
        self.registry.accepts(path)
    }

    /// Write `netlist` to `path` with the writer selected for it.
    pub fn write(&self, netlist: &Netlist, path: &Path) -> Result<(), HdlError> {
        let identifier = self.registry.select(path)?.to_string();
        self.write_with(&identifier, netlist, path)
    }

    /// Write with a specific writer, bypassing selection.
    pub fn write_with(
        &self,
        identifier: &str,
        netlist: &Netlist,
        path: &Path,
    ) -> Result<(), HdlError> {
        let mut writer = self.registry.create(identifier)?;
        writer.write(netlist, path)?;
        info!(
            target: "gatelens::hdl",
            writer = identifier,
            path = %path.display(),
            gates = netlist.gate_count(),
            "netlist written"
        );
        Ok(())
    }
}

impl Default for WriterManager {
    fn default() -> Self {
        Self::new()
    }
}
