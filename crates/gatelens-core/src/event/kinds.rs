//! Event types broadcast by a [`Netlist`](crate::netlist::Netlist).
//!
//! Events carry handles only. An observer that needs the current state of an
//! object looks it up in the netlist after the mutating call returns.

use crate::netlist::{GateId, ModuleId, NetId};

/// Changes to a single gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateEvent {
    Created(GateId),
    Removed(GateId),
    NameChanged(GateId),
}

impl GateEvent {
    /// The gate this event is about.
    pub fn gate(&self) -> GateId {
        match self {
            GateEvent::Created(g) | GateEvent::Removed(g) | GateEvent::NameChanged(g) => *g,
        }
    }
}

/// Changes to a single net, including its endpoint lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetEvent {
    Created(NetId),
    Removed(NetId),
    NameChanged(NetId),
    SourceAdded { net: NetId, gate: GateId, pin: String },
    SourceRemoved { net: NetId, gate: GateId, pin: String },
    DestinationAdded { net: NetId, gate: GateId, pin: String },
    DestinationRemoved { net: NetId, gate: GateId, pin: String },
}

impl NetEvent {
    /// The net this event is about.
    pub fn net(&self) -> NetId {
        match self {
            NetEvent::Created(n) | NetEvent::Removed(n) | NetEvent::NameChanged(n) => *n,
            NetEvent::SourceAdded { net, .. }
            | NetEvent::SourceRemoved { net, .. }
            | NetEvent::DestinationAdded { net, .. }
            | NetEvent::DestinationRemoved { net, .. } => *net,
        }
    }
}

/// Changes to a module and its membership.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleEvent {
    Created(ModuleId),
    Removed(ModuleId),
    NameChanged(ModuleId),
    TypeChanged(ModuleId),
    ParentChanged(ModuleId),
    SubmoduleAdded { module: ModuleId, submodule: ModuleId },
    SubmoduleRemoved { module: ModuleId, submodule: ModuleId },
    GateAssigned { module: ModuleId, gate: GateId },
    GateRemoved { module: ModuleId, gate: GateId },
}

impl ModuleEvent {
    /// The module this event is about.
    pub fn module(&self) -> ModuleId {
        match self {
            ModuleEvent::Created(m)
            | ModuleEvent::Removed(m)
            | ModuleEvent::NameChanged(m)
            | ModuleEvent::TypeChanged(m)
            | ModuleEvent::ParentChanged(m) => *m,
            ModuleEvent::SubmoduleAdded { module, .. }
            | ModuleEvent::SubmoduleRemoved { module, .. }
            | ModuleEvent::GateAssigned { module, .. }
            | ModuleEvent::GateRemoved { module, .. } => *module,
        }
    }
}

/// Netlist-wide changes: metadata and global net/gate markings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetlistEvent {
    IdChanged { old: u64, new: u64 },
    InputPathChanged,
    DesignNameChanged,
    DeviceNameChanged,
    MarkedGlobalVcc(GateId),
    MarkedGlobalGnd(GateId),
    UnmarkedGlobalVcc(GateId),
    UnmarkedGlobalGnd(GateId),
    MarkedGlobalInput(NetId),
    MarkedGlobalOutput(NetId),
    UnmarkedGlobalInput(NetId),
    UnmarkedGlobalOutput(NetId),
}
