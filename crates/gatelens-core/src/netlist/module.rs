//! Modules: the hierarchy that groups gates.
//!
//! Modules form a tree rooted at the top module. Every gate belongs to
//! exactly one module directly; the gates of a module's subtree are its
//! accumulated gates. Boundary nets (inputs and outputs of a module) are
//! derived from the accumulated gate set.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use super::gate::Gate;
use super::{GateId, ModuleId, NetId, Netlist, NetlistError};
use crate::event::ModuleEvent;

type GateSetCache = Mutex<Option<(u64, Arc<BTreeSet<GateId>>)>>;

/// A node of the module tree.
#[derive(Debug)]
pub struct Module {
    pub(super) id: ModuleId,
    pub(super) name: String,
    pub(super) module_type: String,
    pub(super) parent: Option<ModuleId>,
    pub(super) submodules: BTreeSet<ModuleId>,
    pub(super) gates: BTreeSet<GateId>,
    pub(super) annotations: BTreeMap<String, String>,
    /// Accumulated gate set, tagged with the membership epoch it was built in.
    accumulated: GateSetCache,
}

impl Module {
    pub(super) fn new(id: ModuleId, name: String, parent: Option<ModuleId>) -> Self {
        Self {
            id,
            name,
            module_type: String::new(),
            parent,
            submodules: BTreeSet::new(),
            gates: BTreeSet::new(),
            annotations: BTreeMap::new(),
            accumulated: Mutex::new(None),
        }
    }

    pub fn id(&self) -> ModuleId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// User-defined type label, empty by default.
    pub fn module_type(&self) -> &str {
        &self.module_type
    }

    /// Parent module; `None` only for the top module.
    pub fn parent(&self) -> Option<ModuleId> {
        self.parent
    }

    pub fn is_top_module(&self) -> bool {
        self.parent.is_none()
    }

    /// Direct children.
    pub fn submodules(&self) -> &BTreeSet<ModuleId> {
        &self.submodules
    }

    /// Gates assigned directly to this module.
    pub fn gates(&self) -> &BTreeSet<GateId> {
        &self.gates
    }

    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations.get(key).map(String::as_str)
    }

    pub fn annotations(&self) -> &BTreeMap<String, String> {
        &self.annotations
    }
}

/// Nets crossing or contained in a module, as seen from its accumulated gates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleBoundary {
    /// Nets driven from outside (or global inputs) that reach a gate inside.
    pub inputs: BTreeSet<NetId>,
    /// Nets driven from inside that reach a gate outside (or are global outputs).
    pub outputs: BTreeSet<NetId>,
    /// Nets with both a source and a destination inside.
    pub internal: BTreeSet<NetId>,
}

impl Netlist {
    pub fn top_module(&self) -> ModuleId {
        self.top_module
    }

    pub fn module(&self, id: ModuleId) -> Option<&Module> {
        self.modules.get(&id)
    }

    /// All modules, ordered by id.
    pub fn modules(&self) -> impl Iterator<Item = &Module> {
        self.modules.values()
    }

    pub fn modules_where(&self, filter: impl Fn(&Module) -> bool) -> Vec<&Module> {
        self.modules.values().filter(|m| filter(m)).collect()
    }

    /// Create a module under `parent` and move `gates` into it.
    pub fn create_module(
        &mut self,
        name: impl Into<String>,
        parent: ModuleId,
        gates: &[GateId],
    ) -> Result<ModuleId, NetlistError> {
        let id = ModuleId(self.next_module_id);
        self.insert_module(id, name.into(), parent, gates)
    }

    /// Create a module with a caller-chosen id.
    pub fn create_module_with_id(
        &mut self,
        id: ModuleId,
        name: impl Into<String>,
        parent: ModuleId,
        gates: &[GateId],
    ) -> Result<ModuleId, NetlistError> {
        self.insert_module(id, name.into(), parent, gates)
    }

    fn insert_module(
        &mut self,
        id: ModuleId,
        name: String,
        parent: ModuleId,
        gates: &[GateId],
    ) -> Result<ModuleId, NetlistError> {
        if self.modules.contains_key(&id) {
            return Err(NetlistError::DuplicateId { kind: "module", id: id.0 });
        }
        self.require_module(parent)?;
        for gate in gates {
            self.require_gate(*gate)?;
        }

        self.modules.insert(id, Module::new(id, name, Some(parent)));
        if let Some(p) = self.modules.get_mut(&parent) {
            p.submodules.insert(id);
        }
        self.next_module_id = self.next_module_id.max(id.0.saturating_add(1));
        self.touch_membership();

        debug!(
            target: "gatelens::netlist",
            module = %id,
            parent = %parent,
            gates = gates.len(),
            "module created"
        );
        self.events.emit_module(ModuleEvent::Created(id));
        self.events.emit_module(ModuleEvent::SubmoduleAdded { module: parent, submodule: id });

        for gate in gates {
            self.move_gate(*gate, id);
        }
        Ok(id)
    }

    /// Remove a module. Its gates and submodules move to its parent.
    pub fn remove_module(&mut self, module: ModuleId) -> Result<(), NetlistError> {
        let m = self.require_module(module)?;
        let parent = m.parent.ok_or(NetlistError::TopModuleImmutable(module))?;
        let gates: Vec<GateId> = m.gates.iter().copied().collect();
        let children: Vec<ModuleId> = m.submodules.iter().copied().collect();

        for gate in gates {
            self.move_gate(gate, parent);
        }
        for child in children {
            self.reparent(child, parent);
        }

        if let Some(p) = self.modules.get_mut(&parent) {
            p.submodules.remove(&module);
        }
        self.touch_membership();
        self.events.emit_module(ModuleEvent::SubmoduleRemoved {
            module: parent,
            submodule: module,
        });
        self.events.emit_module(ModuleEvent::Removed(module));
        self.modules.remove(&module);

        debug!(target: "gatelens::netlist", module = %module, "module removed");
        Ok(())
    }

    pub fn set_module_name(
        &mut self,
        module: ModuleId,
        name: impl Into<String>,
    ) -> Result<(), NetlistError> {
        let name = name.into();
        let m = self.modules.get_mut(&module).ok_or(NetlistError::ModuleNotFound(module))?;
        if m.name != name {
            m.name = name;
            self.events.emit_module(ModuleEvent::NameChanged(module));
        }
        Ok(())
    }

    pub fn set_module_type(
        &mut self,
        module: ModuleId,
        module_type: impl Into<String>,
    ) -> Result<(), NetlistError> {
        let module_type = module_type.into();
        let m = self.modules.get_mut(&module).ok_or(NetlistError::ModuleNotFound(module))?;
        if m.module_type != module_type {
            m.module_type = module_type;
            self.events.emit_module(ModuleEvent::TypeChanged(module));
        }
        Ok(())
    }

    /// Attach a key/value annotation to a module, returning the previous value.
    pub fn set_module_annotation(
        &mut self,
        module: ModuleId,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<Option<String>, NetlistError> {
        let m = self.modules.get_mut(&module).ok_or(NetlistError::ModuleNotFound(module))?;
        Ok(m.annotations.insert(key.into(), value.into()))
    }

    /// Move `module` (with its subtree) under `parent`.
    pub fn set_module_parent(
        &mut self,
        module: ModuleId,
        parent: ModuleId,
    ) -> Result<(), NetlistError> {
        let m = self.require_module(module)?;
        self.require_module(parent)?;
        let current = m.parent.ok_or(NetlistError::TopModuleImmutable(module))?;
        if current == parent {
            return Ok(());
        }
        if module == parent || self.is_ancestor_of(module, parent) {
            return Err(NetlistError::ModuleCycle { module, parent });
        }
        self.reparent(module, parent);
        Ok(())
    }

    /// Whether `ancestor` lies strictly above `module` in the tree.
    pub fn is_ancestor_of(&self, ancestor: ModuleId, module: ModuleId) -> bool {
        let mut cursor = self.modules.get(&module).and_then(|m| m.parent);
        let mut steps = 0;
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            steps += 1;
            if steps > self.modules.len() {
                return false;
            }
            cursor = self.modules.get(&current).and_then(|m| m.parent);
        }
        false
    }

    /// Assign a gate directly to `module`, taking it out of its current module.
    pub fn assign_gate(&mut self, module: ModuleId, gate: GateId) -> Result<(), NetlistError> {
        self.require_module(module)?;
        self.require_gate(gate)?;
        self.move_gate(gate, module);
        Ok(())
    }

    /// Take a gate out of `module`; it falls back to the top module.
    pub fn remove_gate_from_module(
        &mut self,
        module: ModuleId,
        gate: GateId,
    ) -> Result<(), NetlistError> {
        self.require_module(module)?;
        let g = self.require_gate(gate)?;
        if g.module != module {
            return Err(NetlistError::GateNotInModule { gate, module });
        }
        if module == self.top_module {
            return Err(NetlistError::TopModuleImmutable(module));
        }
        let top = self.top_module;
        self.move_gate(gate, top);
        Ok(())
    }

    /// Whether `gate` is in `module`, directly or (when `recursive`) through
    /// any submodule.
    pub fn module_contains_gate(
        &self,
        module: ModuleId,
        gate: GateId,
        recursive: bool,
    ) -> Result<bool, NetlistError> {
        let m = self.require_module(module)?;
        if m.gates.contains(&gate) {
            return Ok(true);
        }
        Ok(recursive && self.accumulated_gates(module).contains(&gate))
    }

    /// Gates of a module, ordered by id.
    pub fn module_gates(
        &self,
        module: ModuleId,
        recursive: bool,
    ) -> Result<Vec<&Gate>, NetlistError> {
        self.module_gates_where(module, recursive, |_| true)
    }

    /// Gates of a module accepted by `filter`, ordered by id.
    pub fn module_gates_where(
        &self,
        module: ModuleId,
        recursive: bool,
        filter: impl Fn(&Gate) -> bool,
    ) -> Result<Vec<&Gate>, NetlistError> {
        let m = self.require_module(module)?;
        let accumulated;
        let ids = if recursive {
            accumulated = self.accumulated_gates(module);
            &*accumulated
        } else {
            &m.gates
        };
        Ok(ids
            .iter()
            .filter_map(|id| self.gates.get(id))
            .filter(|g| filter(g))
            .collect())
    }

    /// Children of a module; with `recursive`, the whole subtree in
    /// breadth-first order.
    pub fn submodules(
        &self,
        module: ModuleId,
        recursive: bool,
    ) -> Result<Vec<ModuleId>, NetlistError> {
        let m = self.require_module(module)?;
        if !recursive {
            return Ok(m.submodules.iter().copied().collect());
        }
        let mut out = Vec::new();
        let mut queue: VecDeque<ModuleId> = m.submodules.iter().copied().collect();
        while let Some(next) = queue.pop_front() {
            out.push(next);
            if let Some(child) = self.modules.get(&next) {
                queue.extend(child.submodules.iter().copied());
            }
        }
        Ok(out)
    }

    /// Classify the nets touching `module`'s accumulated gates.
    pub fn module_boundary(&self, module: ModuleId) -> Result<ModuleBoundary, NetlistError> {
        self.require_module(module)?;
        let inside = self.accumulated_gates(module);

        let touching: BTreeSet<NetId> = inside
            .iter()
            .filter_map(|id| self.gates.get(id))
            .flat_map(|g| g.fan_in.values().chain(g.fan_out.values()).copied())
            .collect();

        let mut boundary = ModuleBoundary::default();
        for net_id in touching {
            let Some(net) = self.nets.get(&net_id) else { continue };
            let source_inside = net.sources.iter().any(|ep| inside.contains(&ep.gate));
            let source_outside = net.sources.iter().any(|ep| !inside.contains(&ep.gate));
            let dest_inside = net.destinations.iter().any(|ep| inside.contains(&ep.gate));
            let dest_outside = net.destinations.iter().any(|ep| !inside.contains(&ep.gate));

            if dest_inside && (source_outside || self.global_inputs.contains(&net_id)) {
                boundary.inputs.insert(net_id);
            }
            if source_inside && (dest_outside || self.global_outputs.contains(&net_id)) {
                boundary.outputs.insert(net_id);
            }
            if source_inside && dest_inside {
                boundary.internal.insert(net_id);
            }
        }
        Ok(boundary)
    }

    pub fn module_input_nets(&self, module: ModuleId) -> Result<BTreeSet<NetId>, NetlistError> {
        Ok(self.module_boundary(module)?.inputs)
    }

    pub fn module_output_nets(&self, module: ModuleId) -> Result<BTreeSet<NetId>, NetlistError> {
        Ok(self.module_boundary(module)?.outputs)
    }

    pub fn module_internal_nets(&self, module: ModuleId) -> Result<BTreeSet<NetId>, NetlistError> {
        Ok(self.module_boundary(module)?.internal)
    }

    /// Gates of the subtree rooted at `module`, cached per membership epoch.
    fn accumulated_gates(&self, module: ModuleId) -> Arc<BTreeSet<GateId>> {
        let Some(m) = self.modules.get(&module) else {
            return Arc::default();
        };
        if let Some((epoch, set)) = m.accumulated.lock().as_ref() {
            if *epoch == self.membership_epoch {
                return Arc::clone(set);
            }
        }

        let mut set = m.gates.clone();
        for child in &m.submodules {
            set.extend(self.accumulated_gates(*child).iter().copied());
        }
        let set = Arc::new(set);
        *m.accumulated.lock() = Some((self.membership_epoch, Arc::clone(&set)));
        set
    }

    /// Move a gate between modules without validation.
    fn move_gate(&mut self, gate: GateId, to: ModuleId) {
        let Some(g) = self.gates.get_mut(&gate) else { return };
        let from = g.module;
        if from == to {
            return;
        }
        g.module = to;
        if let Some(m) = self.modules.get_mut(&from) {
            m.gates.remove(&gate);
        }
        if let Some(m) = self.modules.get_mut(&to) {
            m.gates.insert(gate);
        }
        self.touch_membership();
        self.events.emit_module(ModuleEvent::GateRemoved { module: from, gate });
        self.events.emit_module(ModuleEvent::GateAssigned { module: to, gate });
    }

    /// Move a module under a new parent without validation.
    fn reparent(&mut self, module: ModuleId, to: ModuleId) {
        let Some(m) = self.modules.get_mut(&module) else { return };
        let from = m.parent;
        m.parent = Some(to);
        if let Some(old) = from.and_then(|p| self.modules.get_mut(&p)) {
            old.submodules.remove(&module);
        }
        if let Some(new) = self.modules.get_mut(&to) {
            new.submodules.insert(module);
        }
        self.touch_membership();
        if let Some(from) = from {
            self.events.emit_module(ModuleEvent::SubmoduleRemoved {
                module: from,
                submodule: module,
            });
        }
        self.events.emit_module(ModuleEvent::ParentChanged(module));
        self.events.emit_module(ModuleEvent::SubmoduleAdded { module: to, submodule: module });
    }
}
