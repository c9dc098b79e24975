//! Nets and the endpoint operations that connect them to gates.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use super::endpoint::{Endpoint, PinRole};
use super::{GateId, NetId, Netlist, NetlistError};
use crate::event::{NetEvent, NetlistEvent};

/// A wire with driving (source) and driven (destination) endpoints.
#[derive(Debug, Clone)]
pub struct Net {
    pub(super) id: NetId,
    pub(super) name: String,
    pub(super) sources: Vec<Endpoint>,
    pub(super) destinations: Vec<Endpoint>,
    pub(super) annotations: BTreeMap<String, String>,
}

impl Net {
    pub(super) fn new(id: NetId, name: String) -> Self {
        Self {
            id,
            name,
            sources: Vec::new(),
            destinations: Vec::new(),
            annotations: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> NetId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Driving endpoints in connection order.
    pub fn sources(&self) -> &[Endpoint] {
        &self.sources
    }

    /// Driven endpoints in connection order.
    pub fn destinations(&self) -> &[Endpoint] {
        &self.destinations
    }

    pub fn endpoints(&self, role: PinRole) -> &[Endpoint] {
        match role {
            PinRole::Source => &self.sources,
            PinRole::Destination => &self.destinations,
        }
    }

    /// Whether `(gate, pin)` is an endpoint of this net in `role`.
    pub fn is_endpoint(&self, gate: GateId, pin: &str, role: PinRole) -> bool {
        self.endpoints(role)
            .iter()
            .any(|ep| ep.gate == gate && ep.pin == pin)
    }

    /// A net with neither sources nor destinations.
    pub fn is_unrouted(&self) -> bool {
        self.sources.is_empty() && self.destinations.is_empty()
    }

    pub fn source_gates(&self) -> BTreeSet<GateId> {
        self.sources.iter().map(|ep| ep.gate).collect()
    }

    pub fn destination_gates(&self) -> BTreeSet<GateId> {
        self.destinations.iter().map(|ep| ep.gate).collect()
    }

    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations.get(key).map(String::as_str)
    }

    pub fn annotations(&self) -> &BTreeMap<String, String> {
        &self.annotations
    }

    fn endpoints_mut(&mut self, role: PinRole) -> &mut Vec<Endpoint> {
        match role {
            PinRole::Source => &mut self.sources,
            PinRole::Destination => &mut self.destinations,
        }
    }
}

impl Netlist {
    /// Create a net with a fresh id.
    pub fn create_net(&mut self, name: impl Into<String>) -> Result<NetId, NetlistError> {
        let id = NetId(self.next_net_id);
        self.insert_net(id, name.into())
    }

    /// Create a net with a caller-chosen id.
    pub fn create_net_with_id(
        &mut self,
        id: NetId,
        name: impl Into<String>,
    ) -> Result<NetId, NetlistError> {
        self.insert_net(id, name.into())
    }

    fn insert_net(&mut self, id: NetId, name: String) -> Result<NetId, NetlistError> {
        if self.nets.contains_key(&id) {
            return Err(NetlistError::DuplicateId { kind: "net", id: id.0 });
        }
        self.ensure_net_name_free(&name, None)?;
        if !name.is_empty() {
            self.net_names.insert(name.clone(), id);
        }
        self.nets.insert(id, Net::new(id, name));
        self.next_net_id = self.next_net_id.max(id.0.saturating_add(1));

        debug!(target: "gatelens::netlist", net = %id, "net created");
        self.events.emit_net(NetEvent::Created(id));
        Ok(id)
    }

    /// Remove a net, disconnecting it from every gate pin first.
    pub fn remove_net(&mut self, net: NetId) -> Result<(), NetlistError> {
        let n = self.require_net(net)?;
        let sources = n.sources.clone();
        let destinations = n.destinations.clone();

        for ep in sources {
            self.detach(net, ep.gate, &ep.pin, PinRole::Source);
        }
        for ep in destinations {
            self.detach(net, ep.gate, &ep.pin, PinRole::Destination);
        }

        if self.global_inputs.remove(&net) {
            self.events.emit_netlist(NetlistEvent::UnmarkedGlobalInput(net));
        }
        if self.global_outputs.remove(&net) {
            self.events.emit_netlist(NetlistEvent::UnmarkedGlobalOutput(net));
        }

        self.events.emit_net(NetEvent::Removed(net));
        if let Some(removed) = self.nets.remove(&net) {
            if self.net_names.get(&removed.name) == Some(&net) {
                self.net_names.remove(&removed.name);
            }
        }
        debug!(target: "gatelens::netlist", net = %net, "net removed");
        Ok(())
    }

    /// Rename a net. Non-empty names are unique across all nets.
    pub fn set_net_name(
        &mut self,
        net: NetId,
        name: impl Into<String>,
    ) -> Result<(), NetlistError> {
        let name = name.into();
        let old = self.require_net(net)?.name.clone();
        if old == name {
            return Ok(());
        }
        self.ensure_net_name_free(&name, Some(net))?;

        if !old.is_empty() {
            self.net_names.remove(&old);
        }
        if !name.is_empty() {
            self.net_names.insert(name.clone(), net);
        }
        if let Some(n) = self.nets.get_mut(&net) {
            n.name = name;
        }
        self.events.emit_net(NetEvent::NameChanged(net));
        Ok(())
    }

    /// Attach a key/value annotation to a net, returning the previous value.
    pub fn set_net_annotation(
        &mut self,
        net: NetId,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<Option<String>, NetlistError> {
        let n = self.nets.get_mut(&net).ok_or(NetlistError::NetNotFound(net))?;
        Ok(n.annotations.insert(key.into(), value.into()))
    }

    /// Make output pin `pin` of `gate` drive `net`.
    pub fn add_source(&mut self, net: NetId, gate: GateId, pin: &str) -> Result<(), NetlistError> {
        self.connect(net, gate, pin, PinRole::Source)
    }

    /// Make `net` drive input pin `pin` of `gate`.
    pub fn add_destination(
        &mut self,
        net: NetId,
        gate: GateId,
        pin: &str,
    ) -> Result<(), NetlistError> {
        self.connect(net, gate, pin, PinRole::Destination)
    }

    pub fn remove_source(
        &mut self,
        net: NetId,
        gate: GateId,
        pin: &str,
    ) -> Result<(), NetlistError> {
        self.disconnect(net, gate, pin, PinRole::Source)
    }

    pub fn remove_destination(
        &mut self,
        net: NetId,
        gate: GateId,
        pin: &str,
    ) -> Result<(), NetlistError> {
        self.disconnect(net, gate, pin, PinRole::Destination)
    }

    /// Connect `(gate, pin)` to `net` in the given role.
    ///
    /// The pin must exist on the gate type, accept the role, and not be
    /// connected in that role already (to this or any other net).
    pub fn connect(
        &mut self,
        net: NetId,
        gate: GateId,
        pin: &str,
        role: PinRole,
    ) -> Result<(), NetlistError> {
        self.require_net(net)?;
        let g = self.require_gate(gate)?;
        let def = g.gate_type.pin(pin).ok_or_else(|| NetlistError::UnknownPin {
            gate,
            pin: pin.to_string(),
        })?;
        if !role.accepts(def.direction) {
            return Err(NetlistError::PinDirectionMismatch {
                gate,
                pin: pin.to_string(),
                direction: def.direction,
                role,
            });
        }
        if let Some(existing) = g.connection(pin, role) {
            return Err(NetlistError::PinAlreadyConnected {
                gate,
                pin: pin.to_string(),
                role,
                net: existing,
            });
        }

        if let Some(g) = self.gates.get_mut(&gate) {
            g.connections_mut(role).insert(pin.to_string(), net);
        }
        if let Some(n) = self.nets.get_mut(&net) {
            n.endpoints_mut(role).push(Endpoint::new(gate, pin));
        }

        debug!(target: "gatelens::netlist", net = %net, gate = %gate, pin, %role, "endpoint added");
        let pin = pin.to_string();
        self.events.emit_net(match role {
            PinRole::Source => NetEvent::SourceAdded { net, gate, pin },
            PinRole::Destination => NetEvent::DestinationAdded { net, gate, pin },
        });
        Ok(())
    }

    /// Disconnect `(gate, pin)` from `net` in the given role.
    pub fn disconnect(
        &mut self,
        net: NetId,
        gate: GateId,
        pin: &str,
        role: PinRole,
    ) -> Result<(), NetlistError> {
        self.require_gate(gate)?;
        if !self.require_net(net)?.is_endpoint(gate, pin, role) {
            return Err(NetlistError::EndpointNotFound {
                net,
                gate,
                pin: pin.to_string(),
                role,
            });
        }
        self.detach(net, gate, pin, role);
        Ok(())
    }

    /// Drop an endpoint from both the net and the gate without validation.
    ///
    /// Returns whether the net listed the endpoint.
    pub(super) fn detach(&mut self, net: NetId, gate: GateId, pin: &str, role: PinRole) -> bool {
        let removed = match self.nets.get_mut(&net) {
            Some(n) => {
                let list = n.endpoints_mut(role);
                let before = list.len();
                list.retain(|ep| !(ep.gate == gate && ep.pin == pin));
                list.len() != before
            }
            None => false,
        };
        if let Some(g) = self.gates.get_mut(&gate) {
            if g.connection(pin, role) == Some(net) {
                g.connections_mut(role).remove(pin);
            }
        }
        if removed {
            debug!(
                target: "gatelens::netlist",
                net = %net,
                gate = %gate,
                pin,
                %role,
                "endpoint removed"
            );
            let pin = pin.to_string();
            self.events.emit_net(match role {
                PinRole::Source => NetEvent::SourceRemoved { net, gate, pin },
                PinRole::Destination => NetEvent::DestinationRemoved { net, gate, pin },
            });
        }
        removed
    }

    pub fn net(&self, id: NetId) -> Option<&Net> {
        self.nets.get(&id)
    }

    pub fn net_by_name(&self, name: &str) -> Option<&Net> {
        self.net_names.get(name).and_then(|id| self.nets.get(id))
    }

    /// All nets, ordered by id.
    pub fn nets(&self) -> impl Iterator<Item = &Net> {
        self.nets.values()
    }

    /// Nets accepted by `filter`, ordered by id.
    pub fn nets_where(&self, filter: impl Fn(&Net) -> bool) -> Vec<&Net> {
        self.nets.values().filter(|n| filter(n)).collect()
    }

    pub fn contains_net_id(&self, id: NetId) -> bool {
        self.nets.contains_key(&id)
    }

    fn ensure_net_name_free(&self, name: &str, except: Option<NetId>) -> Result<(), NetlistError> {
        if name.is_empty() {
            return Ok(());
        }
        match self.net_names.get(name) {
            Some(existing) if Some(*existing) != except => {
                Err(NetlistError::DuplicateNetName(name.to_string()))
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
    use crate::library::PinDirection;

    fn pair() -> (Netlist, GateId, GateId, NetId) {
        let mut nl = Netlist::new(sample_library());
        let a = nl.create_gate("INV", "a").unwrap();
        let b = nl.create_gate("AND2", "b").unwrap();
        let n = nl.create_net("n").unwrap();
        (nl, a, b, n)
    }

    #[test]
    fn connect_updates_both_sides() {
        let (mut nl, a, b, n) = pair();
        nl.add_source(n, a, "O").unwrap();
        nl.add_destination(n, b, "I0").unwrap();

        let net = nl.net(n).unwrap();
        assert_eq!(net.sources(), &[Endpoint::new(a, "O")]);
        assert_eq!(net.destinations(), &[Endpoint::new(b, "I0")]);
        assert_eq!(nl.gate(a).unwrap().fan_out_net("O"), Some(n));
        assert_eq!(nl.gate(b).unwrap().fan_in_net("I0"), Some(n));
        assert!(nl.check_consistency().is_empty());
    }

    #[test]
    fn pin_direction_checked() {
        let (mut nl, a, _, n) = pair();
        let err = nl.add_source(n, a, "I").unwrap_err();
        assert_eq!(
            err,
            NetlistError::PinDirectionMismatch {
                gate: a,
                pin: "I".into(),
                direction: PinDirection::Input,
                role: PinRole::Source,
            }
        );
        assert!(nl.net(n).unwrap().is_unrouted());
    }

    #[test]
    fn unknown_pin_rejected() {
        let (mut nl, a, _, n) = pair();
        let err = nl.add_destination(n, a, "Z").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn pin_connects_to_one_net_per_role() {
        let (mut nl, a, _, n) = pair();
        let other = nl.create_net("other").unwrap();
        nl.add_source(n, a, "O").unwrap();
        let err = nl.add_source(other, a, "O").unwrap_err();
        assert_eq!(
            err,
            NetlistError::PinAlreadyConnected {
                gate: a,
                pin: "O".into(),
                role: PinRole::Source,
                net: n,
            }
        );
        assert!(nl.add_source(n, a, "O").is_err());
        assert_eq!(nl.net(n).unwrap().sources().len(), 1);
    }

    #[test]
    fn inout_pin_can_be_both_roles() {
        let mut nl = Netlist::new(sample_library());
        let io = nl.create_gate("IOBUF", "io").unwrap();
        let n = nl.create_net("pad").unwrap();
        nl.add_source(n, io, "PAD").unwrap();
        nl.add_destination(n, io, "PAD").unwrap();
        assert!(nl.add_destination(n, io, "T").is_err());
        assert!(nl.check_consistency().is_empty());
    }

    #[test]
    fn disconnect_requires_existing_endpoint() {
        let (mut nl, _, b, n) = pair();
        let err = nl.remove_destination(n, b, "I0").unwrap_err();
        assert!(matches!(err, NetlistError::EndpointNotFound { .. }));

        nl.add_destination(n, b, "I0").unwrap();
        nl.remove_destination(n, b, "I0").unwrap();
        assert!(nl.gate(b).unwrap().fan_in_net("I0").is_none());
        assert!(nl.net(n).unwrap().is_unrouted());

        assert_eq!(
            nl.remove_source(n, GateId(999), "O").unwrap_err(),
            NetlistError::GateNotFound(GateId(999))
        );
    }

    #[test]
    fn empty_net_persists_until_removed() {
        let (mut nl, a, _, n) = pair();
        nl.add_source(n, a, "O").unwrap();
        nl.remove_gate(a).unwrap();
        assert!(nl.net(n).unwrap().is_unrouted());
        nl.remove_net(n).unwrap();
        assert!(nl.net(n).is_none());
        assert!(nl.net_by_name("n").is_none());
    }

    #[test]
    fn remove_net_clears_gate_pins() {
        let (mut nl, a, b, n) = pair();
        nl.add_source(n, a, "O").unwrap();
        nl.add_destination(n, b, "I1").unwrap();
        nl.remove_net(n).unwrap();
        assert!(nl.gate(a).unwrap().fan_out_nets().is_empty());
        assert!(nl.gate(b).unwrap().fan_in_nets().is_empty());
        assert!(nl.check_consistency().is_empty());
    }

    #[test]
    fn net_names_unique() {
        let (mut nl, _, _, n) = pair();
        assert_eq!(
            nl.create_net("n").unwrap_err(),
            NetlistError::DuplicateNetName("n".into())
        );
        nl.set_net_name(n, "clk").unwrap();
        nl.create_net("n").unwrap();
        assert_eq!(nl.net_by_name("clk").map(Net::id), Some(n));
    }

    #[test]
    fn fresh_id_after_max_explicit_id_is_rejected() {
        let (mut nl, a, _, _) = pair();
        let n = nl.create_net_with_id(NetId(u64::MAX), "wide").unwrap();
        nl.add_source(n, a, "O").unwrap();

        let err = nl.create_net("other").unwrap_err();
        assert_eq!(err, NetlistError::DuplicateId { kind: "net", id: u64::MAX });
        assert_eq!(err.kind(), ErrorKind::StructuralConflict);
        assert_eq!(nl.net_count(), 2);
        assert_eq!(nl.net(n).unwrap().name(), "wide");
        assert!(nl.check_consistency().is_empty());
    }
}
