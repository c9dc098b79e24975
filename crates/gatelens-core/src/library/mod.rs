//! Gate libraries: named collections of gate types.
//!
//! A netlist is always built against exactly one library, which resolves a
//! cell-type name to the pin layout used when a gate is created.

mod gate_type;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use crate::error::ErrorKind;

pub use gate_type::{
    ClearPresetBehavior, GateType, GateTypeProperty, LutConfig, PinDef, PinDirection, PinType,
    SequentialConfig,
};

/// Errors raised while assembling a gate library.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GateLibraryError {
    #[error("gate type '{name}' already exists in library '{library}'")]
    DuplicateGateType { library: String, name: String },

    #[error("unknown {kind} '{value}'")]
    UnknownVariant { kind: &'static str, value: String },
}

impl GateLibraryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GateLibraryError::DuplicateGateType { .. } => ErrorKind::StructuralConflict,
            GateLibraryError::UnknownVariant { .. } => ErrorKind::InvalidData,
        }
    }
}

/// A named set of gate types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateLibrary {
    name: String,
    path: PathBuf,
    gate_types: BTreeMap<String, Arc<GateType>>,
}

impl GateLibrary {
    /// Create an empty library. `path` records where it was loaded from.
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            gate_types: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Add a gate type; its name must be unique within the library.
    pub fn add_gate_type(
        &mut self,
        gate_type: GateType,
    ) -> Result<Arc<GateType>, GateLibraryError> {
        if self.gate_types.contains_key(gate_type.name()) {
            return Err(GateLibraryError::DuplicateGateType {
                library: self.name.clone(),
                name: gate_type.name().to_string(),
            });
        }
        let gate_type = Arc::new(gate_type);
        self.gate_types
            .insert(gate_type.name().to_string(), Arc::clone(&gate_type));
        Ok(gate_type)
    }

    /// Resolve a cell-type name.
    pub fn gate_type(&self, name: &str) -> Option<&Arc<GateType>> {
        self.gate_types.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.gate_types.contains_key(name)
    }

    /// All gate types, ordered by name.
    pub fn gate_types(&self) -> impl Iterator<Item = &Arc<GateType>> {
        self.gate_types.values()
    }

    /// Gate types flagged as constant-one drivers.
    pub fn vcc_gate_types(&self) -> impl Iterator<Item = &Arc<GateType>> {
        self.gate_types
            .values()
            .filter(|gt| gt.has_property(GateTypeProperty::Power))
    }

    /// Gate types flagged as constant-zero drivers.
    pub fn gnd_gate_types(&self) -> impl Iterator<Item = &Arc<GateType>> {
        self.gate_types
            .values()
            .filter(|gt| gt.has_property(GateTypeProperty::Ground))
    }

    pub fn len(&self) -> usize {
        self.gate_types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gate_types.is_empty()
    }
}
