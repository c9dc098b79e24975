//! Gates: instances of a library gate type.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::debug;

use super::endpoint::PinRole;
use super::{GateId, ModuleId, NetId, Netlist, NetlistError};
use crate::event::{GateEvent, ModuleEvent, NetlistEvent};
use crate::library::GateType;

/// A placed cell.
///
/// Each pin of the gate type is connected to at most one net. The pin maps
/// mirror the endpoint lists of the nets: `fan_in[pin] == n` exactly when
/// `(gate, pin)` is a destination of `n`, and likewise for `fan_out` and
/// sources.
#[derive(Debug, Clone)]
pub struct Gate {
    pub(super) id: GateId,
    pub(super) name: String,
    pub(super) gate_type: Arc<GateType>,
    pub(super) module: ModuleId,
    pub(super) fan_in: BTreeMap<String, NetId>,
    pub(super) fan_out: BTreeMap<String, NetId>,
    pub(super) annotations: BTreeMap<String, String>,
}

impl Gate {
    pub(super) fn new(
        id: GateId,
        name: String,
        gate_type: Arc<GateType>,
        module: ModuleId,
    ) -> Self {
        Self {
            id,
            name,
            gate_type,
            module,
            fan_in: BTreeMap::new(),
            fan_out: BTreeMap::new(),
            annotations: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> GateId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn gate_type(&self) -> &Arc<GateType> {
        &self.gate_type
    }

    /// Name of the gate type.
    pub fn type_name(&self) -> &str {
        self.gate_type.name()
    }

    /// The module this gate is directly assigned to.
    pub fn module(&self) -> ModuleId {
        self.module
    }

    /// Net connected to an input pin, if any.
    pub fn fan_in_net(&self, pin: &str) -> Option<NetId> {
        self.fan_in.get(pin).copied()
    }

    /// Net connected to an output pin, if any.
    pub fn fan_out_net(&self, pin: &str) -> Option<NetId> {
        self.fan_out.get(pin).copied()
    }

    /// All nets driving this gate.
    pub fn fan_in_nets(&self) -> BTreeSet<NetId> {
        self.fan_in.values().copied().collect()
    }

    /// All nets driven by this gate.
    pub fn fan_out_nets(&self) -> BTreeSet<NetId> {
        self.fan_out.values().copied().collect()
    }

    /// `(pin, net)` pairs of connected input pins, ordered by pin name.
    pub fn fan_in(&self) -> impl Iterator<Item = (&str, NetId)> {
        self.fan_in.iter().map(|(p, n)| (p.as_str(), *n))
    }

    /// `(pin, net)` pairs of connected output pins, ordered by pin name.
    pub fn fan_out(&self) -> impl Iterator<Item = (&str, NetId)> {
        self.fan_out.iter().map(|(p, n)| (p.as_str(), *n))
    }

    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations.get(key).map(String::as_str)
    }

    /// Free-form key/value data attached by analyses.
    pub fn annotations(&self) -> &BTreeMap<String, String> {
        &self.annotations
    }

    pub(super) fn connections(&self, role: PinRole) -> &BTreeMap<String, NetId> {
        match role {
            PinRole::Source => &self.fan_out,
            PinRole::Destination => &self.fan_in,
        }
    }

    pub(super) fn connections_mut(&mut self, role: PinRole) -> &mut BTreeMap<String, NetId> {
        match role {
            PinRole::Source => &mut self.fan_out,
            PinRole::Destination => &mut self.fan_in,
        }
    }

    pub(super) fn connection(&self, pin: &str, role: PinRole) -> Option<NetId> {
        self.connections(role).get(pin).copied()
    }
}

impl Netlist {
    /// Create a gate in the top module with a fresh id.
    pub fn create_gate(
        &mut self,
        type_name: &str,
        name: impl Into<String>,
    ) -> Result<GateId, NetlistError> {
        let module = self.top_module;
        self.create_gate_in(module, type_name, name)
    }

    /// Create a gate in `module` with a fresh id.
    pub fn create_gate_in(
        &mut self,
        module: ModuleId,
        type_name: &str,
        name: impl Into<String>,
    ) -> Result<GateId, NetlistError> {
        let id = GateId(self.next_gate_id);
        self.insert_gate(id, module, type_name, name.into())
    }

    /// Create a gate with a caller-chosen id, as needed when rebuilding a
    /// netlist from a file.
    pub fn create_gate_with_id(
        &mut self,
        id: GateId,
        module: ModuleId,
        type_name: &str,
        name: impl Into<String>,
    ) -> Result<GateId, NetlistError> {
        self.insert_gate(id, module, type_name, name.into())
    }

    fn insert_gate(
        &mut self,
        id: GateId,
        module: ModuleId,
        type_name: &str,
        name: String,
    ) -> Result<GateId, NetlistError> {
        // Fresh ids stop advancing at u64::MAX, so this also catches exhaustion.
        if self.gates.contains_key(&id) {
            return Err(NetlistError::DuplicateId { kind: "gate", id: id.0 });
        }
        self.require_module(module)?;
        self.ensure_gate_name_free(&name, None)?;
        let gate_type = self
            .library
            .gate_type(type_name)
            .cloned()
            .ok_or_else(|| NetlistError::UnknownGateType {
                name: type_name.to_string(),
                library: self.library.name().to_string(),
            })?;

        if !name.is_empty() {
            self.gate_names.insert(name.clone(), id);
        }
        self.gates.insert(id, Gate::new(id, name, gate_type, module));
        self.next_gate_id = self.next_gate_id.max(id.0.saturating_add(1));
        if let Some(m) = self.modules.get_mut(&module) {
            m.gates.insert(id);
        }
        self.touch_membership();

        debug!(
            target: "gatelens::netlist",
            gate = %id,
            gate_type = type_name,
            module = %module,
            "gate created"
        );
        self.events.emit_gate(GateEvent::Created(id));
        self.events.emit_module(ModuleEvent::GateAssigned { module, gate: id });
        Ok(id)
    }

    /// Remove a gate and every endpoint that refers to it.
    ///
    /// The nets the gate was connected to stay in the netlist.
    pub fn remove_gate(&mut self, gate: GateId) -> Result<(), NetlistError> {
        let g = self.require_gate(gate)?;
        let module = g.module;
        let outputs: Vec<(String, NetId)> =
            g.fan_out.iter().map(|(p, n)| (p.clone(), *n)).collect();
        let inputs: Vec<(String, NetId)> = g.fan_in.iter().map(|(p, n)| (p.clone(), *n)).collect();

        for (pin, net) in outputs {
            self.detach(net, gate, &pin, PinRole::Source);
        }
        for (pin, net) in inputs {
            self.detach(net, gate, &pin, PinRole::Destination);
        }

        if let Some(m) = self.modules.get_mut(&module) {
            m.gates.remove(&gate);
        }
        self.touch_membership();
        self.events.emit_module(ModuleEvent::GateRemoved { module, gate });

        if self.vcc_gates.remove(&gate) {
            self.events.emit_netlist(NetlistEvent::UnmarkedGlobalVcc(gate));
        }
        if self.gnd_gates.remove(&gate) {
            self.events.emit_netlist(NetlistEvent::UnmarkedGlobalGnd(gate));
        }

        self.events.emit_gate(GateEvent::Removed(gate));
        if let Some(removed) = self.gates.remove(&gate) {
            if self.gate_names.get(&removed.name) == Some(&gate) {
                self.gate_names.remove(&removed.name);
            }
        }
        debug!(target: "gatelens::netlist", gate = %gate, "gate removed");
        Ok(())
    }

    /// Rename a gate. Non-empty names are unique across all gates.
    pub fn set_gate_name(
        &mut self,
        gate: GateId,
        name: impl Into<String>,
    ) -> Result<(), NetlistError> {
        let name = name.into();
        let old = self.require_gate(gate)?.name.clone();
        if old == name {
            return Ok(());
        }
        self.ensure_gate_name_free(&name, Some(gate))?;

        if !old.is_empty() {
            self.gate_names.remove(&old);
        }
        if !name.is_empty() {
            self.gate_names.insert(name.clone(), gate);
        }
        if let Some(g) = self.gates.get_mut(&gate) {
            g.name = name;
        }
        self.events.emit_gate(GateEvent::NameChanged(gate));
        Ok(())
    }

    /// Attach a key/value annotation to a gate, returning the previous value.
    pub fn set_gate_annotation(
        &mut self,
        gate: GateId,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<Option<String>, NetlistError> {
        let g = self.gates.get_mut(&gate).ok_or(NetlistError::GateNotFound(gate))?;
        Ok(g.annotations.insert(key.into(), value.into()))
    }

    pub fn gate(&self, id: GateId) -> Option<&Gate> {
        self.gates.get(&id)
    }

    pub fn gate_by_name(&self, name: &str) -> Option<&Gate> {
        self.gate_names.get(name).and_then(|id| self.gates.get(id))
    }

    /// All gates, ordered by id.
    pub fn gates(&self) -> impl Iterator<Item = &Gate> {
        self.gates.values()
    }

    /// Gates accepted by `filter`, ordered by id.
    pub fn gates_where(&self, filter: impl Fn(&Gate) -> bool) -> Vec<&Gate> {
        self.gates.values().filter(|g| filter(g)).collect()
    }

    pub fn contains_gate_id(&self, id: GateId) -> bool {
        self.gates.contains_key(&id)
    }

    /// Nets connected to input pins of `gate`.
    pub fn fan_in_nets(&self, gate: GateId) -> Result<BTreeSet<NetId>, NetlistError> {
        Ok(self.require_gate(gate)?.fan_in_nets())
    }

    /// Nets connected to output pins of `gate`.
    pub fn fan_out_nets(&self, gate: GateId) -> Result<BTreeSet<NetId>, NetlistError> {
        Ok(self.require_gate(gate)?.fan_out_nets())
    }

    /// Net connected to input pin `pin` of `gate`, if any.
    pub fn fan_in_net(&self, gate: GateId, pin: &str) -> Result<Option<NetId>, NetlistError> {
        Ok(self.require_gate(gate)?.fan_in_net(pin))
    }

    /// Net connected to output pin `pin` of `gate`, if any.
    pub fn fan_out_net(&self, gate: GateId, pin: &str) -> Result<Option<NetId>, NetlistError> {
        Ok(self.require_gate(gate)?.fan_out_net(pin))
    }

    /// Gates driving any input net of `gate`.
    pub fn predecessors(&self, gate: GateId) -> Result<BTreeSet<GateId>, NetlistError> {
        let g = self.require_gate(gate)?;
        Ok(g.fan_in
            .values()
            .filter_map(|n| self.nets.get(n))
            .flat_map(|net| net.sources.iter().map(|ep| ep.gate))
            .collect())
    }

    /// Gates driven by any output net of `gate`.
    pub fn successors(&self, gate: GateId) -> Result<BTreeSet<GateId>, NetlistError> {
        let g = self.require_gate(gate)?;
        Ok(g.fan_out
            .values()
            .filter_map(|n| self.nets.get(n))
            .flat_map(|net| net.destinations.iter().map(|ep| ep.gate))
            .collect())
    }

    fn ensure_gate_name_free(
        &self,
        name: &str,
        except: Option<GateId>,
    ) -> Result<(), NetlistError> {
        if name.is_empty() {
            return Ok(());
        }
        match self.gate_names.get(name) {
            Some(existing) if Some(*existing) != except => {
                Err(NetlistError::DuplicateGateName(name.to_string()))
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::sample_library;
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn create_assigns_fresh_ids_and_top_module() {
        let mut nl = Netlist::new(sample_library());
        let a = nl.create_gate("AND2", "a").unwrap();
        let b = nl.create_gate("AND2", "b").unwrap();
        assert_ne!(a, b);

        let gate = nl.gate(a).unwrap();
        assert_eq!(gate.type_name(), "AND2");
        assert_eq!(gate.module(), nl.top_module());
        assert_eq!(nl.gate_by_name("b").map(Gate::id), Some(b));
    }

    #[test]
    fn unknown_type_rejected() {
        let mut nl = Netlist::new(sample_library());
        let err = nl.create_gate("XOR9", "x").unwrap_err();
        assert!(matches!(err, NetlistError::UnknownGateType { .. }));
        assert_eq!(nl.gate_count(), 0);
    }

    #[test]
    fn duplicate_names_rejected_but_empty_names_allowed() {
        let mut nl = Netlist::new(sample_library());
        nl.create_gate("INV", "u1").unwrap();
        assert_eq!(
            nl.create_gate("INV", "u1").unwrap_err(),
            NetlistError::DuplicateGateName("u1".into())
        );
        nl.create_gate("INV", "").unwrap();
        nl.create_gate("INV", "").unwrap();
        assert_eq!(nl.gate_count(), 3);
    }

    #[test]
    fn explicit_ids() {
        let mut nl = Netlist::new(sample_library());
        let top = nl.top_module();
        nl.create_gate_with_id(GateId(10), top, "INV", "a").unwrap();
        let err = nl
            .create_gate_with_id(GateId(10), top, "INV", "b")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StructuralConflict);

        let next = nl.create_gate("INV", "c").unwrap();
        assert!(next.0 > 10);
    }

    #[test]
    fn rename_updates_index() {
        let mut nl = Netlist::new(sample_library());
        let a = nl.create_gate("INV", "a").unwrap();
        let b = nl.create_gate("INV", "b").unwrap();

        assert!(nl.set_gate_name(a, "b").is_err());
        nl.set_gate_name(a, "renamed").unwrap();
        assert!(nl.gate_by_name("a").is_none());
        assert_eq!(nl.gate_by_name("renamed").map(Gate::id), Some(a));

        nl.set_gate_name(b, "a").unwrap();
        assert_eq!(nl.gate_by_name("a").map(Gate::id), Some(b));
        assert!(nl.check_consistency().is_empty());
    }

    #[test]
    fn predecessors_and_successors() {
        let mut nl = Netlist::new(sample_library());
        let src = nl.create_gate("INV", "src").unwrap();
        let mid = nl.create_gate("AND2", "mid").unwrap();
        let sink = nl.create_gate("DFF", "sink").unwrap();
        let n0 = nl.create_net("n0").unwrap();
        let n1 = nl.create_net("n1").unwrap();
        nl.add_source(n0, src, "O").unwrap();
        nl.add_destination(n0, mid, "I0").unwrap();
        nl.add_destination(n0, mid, "I1").unwrap();
        nl.add_source(n1, mid, "O").unwrap();
        nl.add_destination(n1, sink, "D").unwrap();

        assert_eq!(nl.predecessors(mid).unwrap().into_iter().collect::<Vec<_>>(), vec![src]);
        assert_eq!(nl.successors(mid).unwrap().into_iter().collect::<Vec<_>>(), vec![sink]);
        assert!(nl.predecessors(src).unwrap().is_empty());
        assert_eq!(nl.fan_in_net(mid, "I1").unwrap(), Some(n0));
        assert_eq!(nl.fan_out_net(mid, "O").unwrap(), Some(n1));
        assert_eq!(nl.fan_in_nets(mid).unwrap().len(), 1);
    }

    #[test]
    fn annotations() {
        let mut nl = Netlist::new(sample_library());
        let g = nl.create_gate("INV", "g").unwrap();
        assert_eq!(nl.set_gate_annotation(g, "role", "clk_buf").unwrap(), None);
        assert_eq!(
            nl.set_gate_annotation(g, "role", "data").unwrap(),
            Some("clk_buf".to_string())
        );
        assert_eq!(nl.gate(g).unwrap().annotation("role"), Some("data"));
    }

    #[test]
    fn gates_where_filters() {
        let mut nl = Netlist::new(sample_library());
        nl.create_gate("INV", "i1").unwrap();
        nl.create_gate("DFF", "ff").unwrap();
        nl.create_gate("INV", "i2").unwrap();
        let invs = nl.gates_where(|g| g.type_name() == "INV");
        assert_eq!(invs.len(), 2);
    }

    #[test]
    fn fresh_id_after_max_explicit_id_is_rejected() {
        let mut nl = Netlist::new(sample_library());
        let top = nl.top_module();
        let a = nl.create_gate_with_id(GateId(u64::MAX), top, "INV", "a").unwrap();
        let n = nl.create_net("n").unwrap();
        nl.add_source(n, a, "O").unwrap();

        let err = nl.create_gate("INV", "b").unwrap_err();
        assert_eq!(err, NetlistError::DuplicateId { kind: "gate", id: u64::MAX });
        assert_eq!(err.kind(), ErrorKind::StructuralConflict);
        assert_eq!(nl.gate_count(), 1);
        assert_eq!(nl.gate(a).unwrap().name(), "a");
        assert!(nl.gate_by_name("b").is_none());
        assert!(nl.check_consistency().is_empty());
    }
}
