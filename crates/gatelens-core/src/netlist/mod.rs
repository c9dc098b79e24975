//! The netlist object graph: gates, nets, modules, and their container.
//!
//! A design is a set of gates (library cell instances) connected by nets
//! (wires with driving and driven endpoints) and grouped into a tree of
//! modules. The [`Netlist`] owns all three kinds of object in id-keyed
//! arenas; objects refer to each other only by handle.
//!
//! Every mutation validates first and commits second, so a failed call leaves
//! the graph untouched. Events are dispatched after the commit and before the
//! call returns.

pub mod canonical;
pub mod endpoint;
pub mod gate;
mod id;
pub mod module;
pub mod net;

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::error::ErrorKind;
use crate::event::{EventHandlers, NetlistEvent};
use crate::library::{GateLibrary, PinDirection};

use self::endpoint::{Endpoint, PinRole};
use self::gate::Gate;
use self::module::Module;
use self::net::Net;

pub use self::id::{GateId, ModuleId, NetId};

/// Id given to the top module of a fresh netlist.
pub const DEFAULT_TOP_MODULE_ID: ModuleId = ModuleId(1);

/// Name given to the top module of a fresh netlist.
pub const DEFAULT_TOP_MODULE_NAME: &str = "top_module";

/// Errors raised by netlist mutations and lookups.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NetlistError {
    #[error("gate not found: {0}")]
    GateNotFound(GateId),

    #[error("net not found: {0}")]
    NetNotFound(NetId),

    #[error("module not found: {0}")]
    ModuleNotFound(ModuleId),

    #[error("a gate named '{0}' already exists")]
    DuplicateGateName(String),

    #[error("a net named '{0}' already exists")]
    DuplicateNetName(String),

    #[error("duplicate {kind} id {id}")]
    DuplicateId { kind: &'static str, id: u64 },

    #[error("gate type '{name}' is not part of gate library '{library}'")]
    UnknownGateType { name: String, library: String },

    #[error("gate {gate} has no pin '{pin}'")]
    UnknownPin { gate: GateId, pin: String },

    #[error("pin '{pin}' of gate {gate} is an {direction} pin and cannot be a {role}")]
    PinDirectionMismatch {
        gate: GateId,
        pin: String,
        direction: PinDirection,
        role: PinRole,
    },

    #[error("pin '{pin}' of gate {gate} is already a {role} of {net}")]
    PinAlreadyConnected {
        gate: GateId,
        pin: String,
        role: PinRole,
        net: NetId,
    },

    #[error("({gate}, '{pin}') is not a {role} of {net}")]
    EndpointNotFound {
        net: NetId,
        gate: GateId,
        pin: String,
        role: PinRole,
    },

    #[error("making {parent} the parent of {module} would create a cycle")]
    ModuleCycle { module: ModuleId, parent: ModuleId },

    #[error("the top module {0} cannot be removed, reparented, or emptied")]
    TopModuleImmutable(ModuleId),

    #[error("gate {gate} is not assigned to {module}")]
    GateNotInModule { gate: GateId, module: ModuleId },
}

impl NetlistError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            NetlistError::GateNotFound(_)
            | NetlistError::NetNotFound(_)
            | NetlistError::ModuleNotFound(_)
            | NetlistError::UnknownGateType { .. }
            | NetlistError::UnknownPin { .. }
            | NetlistError::EndpointNotFound { .. }
            | NetlistError::GateNotInModule { .. } => ErrorKind::NotFound,
            NetlistError::DuplicateGateName(_)
            | NetlistError::DuplicateNetName(_)
            | NetlistError::DuplicateId { .. }
            | NetlistError::PinDirectionMismatch { .. }
            | NetlistError::PinAlreadyConnected { .. }
            | NetlistError::ModuleCycle { .. }
            | NetlistError::TopModuleImmutable(_) => ErrorKind::StructuralConflict,
        }
    }
}

/// The root container of one design.
#[derive(Debug)]
pub struct Netlist {
    id: u64,
    design_name: String,
    device_name: String,
    input_path: Option<PathBuf>,
    library: Arc<GateLibrary>,

    gates: BTreeMap<GateId, Gate>,
    nets: BTreeMap<NetId, Net>,
    modules: BTreeMap<ModuleId, Module>,
    top_module: ModuleId,

    /// Index: non-empty gate name -> gate
    gate_names: HashMap<String, GateId>,
    /// Index: non-empty net name -> net
    net_names: HashMap<String, NetId>,

    next_gate_id: u64,
    next_net_id: u64,
    next_module_id: u64,

    vcc_gates: BTreeSet<GateId>,
    gnd_gates: BTreeSet<GateId>,
    global_inputs: BTreeSet<NetId>,
    global_outputs: BTreeSet<NetId>,

    /// Bumped on every change to gate or module membership; cached
    /// accumulated gate sets from an older epoch are stale.
    membership_epoch: u64,

    events: Arc<EventHandlers>,
}

impl Netlist {
    /// Create an empty netlist with a default top module.
    pub fn new(library: Arc<GateLibrary>) -> Self {
        Self::with_events(library, Arc::new(EventHandlers::new()))
    }

    /// Create an empty netlist that reports to existing event handlers.
    pub fn with_events(library: Arc<GateLibrary>, events: Arc<EventHandlers>) -> Self {
        Self::with_top_module(library, DEFAULT_TOP_MODULE_ID, DEFAULT_TOP_MODULE_NAME, events)
    }

    /// Create an empty netlist whose top module has the given id and name.
    pub fn with_top_module(
        library: Arc<GateLibrary>,
        top_id: ModuleId,
        top_name: impl Into<String>,
        events: Arc<EventHandlers>,
    ) -> Self {
        let mut modules = BTreeMap::new();
        modules.insert(top_id, Module::new(top_id, top_name.into(), None));
        Self {
            id: 0,
            design_name: String::new(),
            device_name: String::new(),
            input_path: None,
            library,
            gates: BTreeMap::new(),
            nets: BTreeMap::new(),
            modules,
            top_module: top_id,
            gate_names: HashMap::new(),
            net_names: HashMap::new(),
            next_gate_id: 1,
            next_net_id: 1,
            next_module_id: top_id.0.saturating_add(1).max(1),
            vcc_gates: BTreeSet::new(),
            gnd_gates: BTreeSet::new(),
            global_inputs: BTreeSet::new(),
            global_outputs: BTreeSet::new(),
            membership_epoch: 0,
            events,
        }
    }

    // --- Metadata ---

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn set_id(&mut self, id: u64) {
        if self.id != id {
            let old = self.id;
            self.id = id;
            self.events.emit_netlist(NetlistEvent::IdChanged { old, new: id });
        }
    }

    pub fn design_name(&self) -> &str {
        &self.design_name
    }

    pub fn set_design_name(&mut self, name: impl Into<String>) {
        let name = name.into();
        if self.design_name != name {
            self.design_name = name;
            self.events.emit_netlist(NetlistEvent::DesignNameChanged);
        }
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn set_device_name(&mut self, name: impl Into<String>) {
        let name = name.into();
        if self.device_name != name {
            self.device_name = name;
            self.events.emit_netlist(NetlistEvent::DeviceNameChanged);
        }
    }

    /// The file this netlist was parsed or loaded from, if any.
    pub fn input_path(&self) -> Option<&Path> {
        self.input_path.as_deref()
    }

    pub fn set_input_path(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        if self.input_path.as_ref() != Some(&path) {
            self.input_path = Some(path);
            self.events.emit_netlist(NetlistEvent::InputPathChanged);
        }
    }

    /// The gate library every gate of this netlist is instantiated from.
    pub fn library(&self) -> &Arc<GateLibrary> {
        &self.library
    }

    /// Event hooks of this netlist.
    pub fn events(&self) -> &Arc<EventHandlers> {
        &self.events
    }

    pub fn gate_count(&self) -> usize {
        self.gates.len()
    }

    pub fn net_count(&self) -> usize {
        self.nets.len()
    }

    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    // --- Global markings ---

    /// Mark a gate as a global constant-one driver.
    pub fn mark_vcc_gate(&mut self, gate: GateId) -> Result<(), NetlistError> {
        self.require_gate(gate)?;
        if self.vcc_gates.insert(gate) {
            self.events.emit_netlist(NetlistEvent::MarkedGlobalVcc(gate));
        }
        Ok(())
    }

    /// Mark a gate as a global constant-zero driver.
    pub fn mark_gnd_gate(&mut self, gate: GateId) -> Result<(), NetlistError> {
        self.require_gate(gate)?;
        if self.gnd_gates.insert(gate) {
            self.events.emit_netlist(NetlistEvent::MarkedGlobalGnd(gate));
        }
        Ok(())
    }

    pub fn unmark_vcc_gate(&mut self, gate: GateId) -> Result<(), NetlistError> {
        self.require_gate(gate)?;
        if self.vcc_gates.remove(&gate) {
            self.events.emit_netlist(NetlistEvent::UnmarkedGlobalVcc(gate));
        }
        Ok(())
    }

    pub fn unmark_gnd_gate(&mut self, gate: GateId) -> Result<(), NetlistError> {
        self.require_gate(gate)?;
        if self.gnd_gates.remove(&gate) {
            self.events.emit_netlist(NetlistEvent::UnmarkedGlobalGnd(gate));
        }
        Ok(())
    }

    pub fn is_vcc_gate(&self, gate: GateId) -> bool {
        self.vcc_gates.contains(&gate)
    }

    pub fn is_gnd_gate(&self, gate: GateId) -> bool {
        self.gnd_gates.contains(&gate)
    }

    pub fn vcc_gates(&self) -> impl Iterator<Item = GateId> + '_ {
        self.vcc_gates.iter().copied()
    }

    pub fn gnd_gates(&self) -> impl Iterator<Item = GateId> + '_ {
        self.gnd_gates.iter().copied()
    }

    /// Mark a net as a primary input of the design.
    pub fn mark_global_input_net(&mut self, net: NetId) -> Result<(), NetlistError> {
        self.require_net(net)?;
        if self.global_inputs.insert(net) {
            self.events.emit_netlist(NetlistEvent::MarkedGlobalInput(net));
        }
        Ok(())
    }

    /// Mark a net as a primary output of the design.
    pub fn mark_global_output_net(&mut self, net: NetId) -> Result<(), NetlistError> {
        self.require_net(net)?;
        if self.global_outputs.insert(net) {
            self.events.emit_netlist(NetlistEvent::MarkedGlobalOutput(net));
        }
        Ok(())
    }

    pub fn unmark_global_input_net(&mut self, net: NetId) -> Result<(), NetlistError> {
        self.require_net(net)?;
        if self.global_inputs.remove(&net) {
            self.events.emit_netlist(NetlistEvent::UnmarkedGlobalInput(net));
        }
        Ok(())
    }

    pub fn unmark_global_output_net(&mut self, net: NetId) -> Result<(), NetlistError> {
        self.require_net(net)?;
        if self.global_outputs.remove(&net) {
            self.events.emit_netlist(NetlistEvent::UnmarkedGlobalOutput(net));
        }
        Ok(())
    }

    pub fn is_global_input_net(&self, net: NetId) -> bool {
        self.global_inputs.contains(&net)
    }

    pub fn is_global_output_net(&self, net: NetId) -> bool {
        self.global_outputs.contains(&net)
    }

    pub fn global_input_nets(&self) -> impl Iterator<Item = NetId> + '_ {
        self.global_inputs.iter().copied()
    }

    pub fn global_output_nets(&self) -> impl Iterator<Item = NetId> + '_ {
        self.global_outputs.iter().copied()
    }

    // --- Consistency ---

    /// Check every bidirectional reference in the graph.
    ///
    /// Returns one message per violation; an empty list means the gate pin
    /// maps, net endpoint lists, module memberships and the module tree all
    /// agree with each other.
    pub fn check_consistency(&self) -> Vec<String> {
        let mut issues = Vec::new();

        for gate in self.gates.values() {
            match self.modules.get(&gate.module) {
                Some(m) if m.gates.contains(&gate.id) => {}
                Some(_) => issues.push(format!("{} missing from its {}", gate.id, gate.module)),
                None => issues.push(format!("{} assigned to unknown {}", gate.id, gate.module)),
            }
            for role in [PinRole::Source, PinRole::Destination] {
                for (pin, net_id) in gate.connections(role) {
                    let endpoint = Endpoint::new(gate.id, pin.clone());
                    match self.nets.get(net_id) {
                        Some(net) if net.endpoints(role).contains(&endpoint) => {}
                        Some(_) => issues.push(format!(
                            "{} lists {} as {role} of {net_id}, but the net does not",
                            gate.id, pin
                        )),
                        None => issues.push(format!("{} connected to unknown {net_id}", gate.id)),
                    }
                }
            }
            if !gate.name.is_empty() && self.gate_names.get(&gate.name) != Some(&gate.id) {
                issues.push(format!("name index out of date for {}", gate.id));
            }
        }

        for net in self.nets.values() {
            for role in [PinRole::Source, PinRole::Destination] {
                let endpoints = net.endpoints(role);
                let unique: BTreeSet<&Endpoint> = endpoints.iter().collect();
                if unique.len() != endpoints.len() {
                    issues.push(format!("{} lists a {role} endpoint twice", net.id));
                }
                for ep in endpoints {
                    match self.gates.get(&ep.gate) {
                        Some(g) if g.connection(&ep.pin, role) == Some(net.id) => {}
                        Some(_) => issues.push(format!(
                            "{} lists {ep} as {role}, but the gate does not",
                            net.id
                        )),
                        None => issues.push(format!("{} has dangling endpoint {ep}", net.id)),
                    }
                }
            }
            if !net.name.is_empty() && self.net_names.get(&net.name) != Some(&net.id) {
                issues.push(format!("name index out of date for {}", net.id));
            }
        }

        for module in self.modules.values() {
            for gate in &module.gates {
                if self.gates.get(gate).map(|g| g.module) != Some(module.id) {
                    issues.push(format!("{} lists {gate} which belongs elsewhere", module.id));
                }
            }
            for child in &module.submodules {
                if self.modules.get(child).and_then(|c| c.parent) != Some(module.id) {
                    issues.push(format!("{} lists child {child} with another parent", module.id));
                }
            }
            match module.parent {
                None if module.id != self.top_module => {
                    issues.push(format!("{} has no parent but is not the top module", module.id))
                }
                Some(_) if module.id == self.top_module => {
                    issues.push(format!("top module {} has a parent", module.id))
                }
                Some(parent) => {
                    if !self
                        .modules
                        .get(&parent)
                        .is_some_and(|p| p.submodules.contains(&module.id))
                    {
                        issues.push(format!("{} not listed by its parent {parent}", module.id));
                    }
                }
                None => {}
            }
            let mut cursor = module.parent;
            let mut steps = 0;
            while let Some(p) = cursor {
                steps += 1;
                if steps > self.modules.len() {
                    issues.push(format!("{} is part of a module cycle", module.id));
                    break;
                }
                cursor = self.modules.get(&p).and_then(|m| m.parent);
            }
        }

        issues
    }

    // --- Lookup helpers ---

    fn require_gate(&self, id: GateId) -> Result<&Gate, NetlistError> {
        self.gates.get(&id).ok_or(NetlistError::GateNotFound(id))
    }

    fn require_net(&self, id: NetId) -> Result<&Net, NetlistError> {
        self.nets.get(&id).ok_or(NetlistError::NetNotFound(id))
    }

    fn require_module(&self, id: ModuleId) -> Result<&Module, NetlistError> {
        self.modules.get(&id).ok_or(NetlistError::ModuleNotFound(id))
    }

    fn touch_membership(&mut self) {
        self.membership_epoch = self.membership_epoch.wrapping_add(1);
        debug!(target: "gatelens::netlist", epoch = self.membership_epoch, "membership changed");
    }
}
