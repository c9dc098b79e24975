//! Id-independent view of a netlist.
//!
//! Two netlists describe the same design when their canonical forms are
//! equal: objects are keyed by name (modules by their path from the top),
//! and every collection is sorted. Handles do not appear at all, so a
//! netlist that was saved and reloaded, or built in a different order,
//! compares equal to the original.

use std::collections::BTreeMap;

use serde::Serialize;

use super::endpoint::Endpoint;
use super::{GateId, ModuleId, NetId, Netlist};
use crate::hash::{content_hash, ContentHash};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CanonicalGate {
    pub name: String,
    pub gate_type: String,
    /// Path of the module the gate is directly assigned to.
    pub module: String,
    pub annotations: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CanonicalNet {
    pub name: String,
    /// `(gate name, pin)` pairs, sorted.
    pub sources: Vec<(String, String)>,
    pub destinations: Vec<(String, String)>,
    pub annotations: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CanonicalModule {
    /// Slash-separated module names from the top module down.
    pub path: String,
    pub module_type: String,
    pub annotations: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CanonicalNetlist {
    pub design_name: String,
    pub device_name: String,
    pub library: String,
    pub gates: Vec<CanonicalGate>,
    pub nets: Vec<CanonicalNet>,
    pub modules: Vec<CanonicalModule>,
    pub vcc_gates: Vec<String>,
    pub gnd_gates: Vec<String>,
    pub global_inputs: Vec<String>,
    pub global_outputs: Vec<String>,
}

impl Netlist {
    /// Build the canonical form of this netlist.
    pub fn canonical_form(&self) -> CanonicalNetlist {
        let mut gates: Vec<CanonicalGate> = self
            .gates
            .values()
            .map(|g| CanonicalGate {
                name: self.gate_label(g.id),
                gate_type: g.type_name().to_string(),
                module: self.module_path(g.module),
                annotations: g.annotations.clone(),
            })
            .collect();
        gates.sort_by(|a, b| (&a.name, &a.gate_type).cmp(&(&b.name, &b.gate_type)));

        let mut nets: Vec<CanonicalNet> = self
            .nets
            .values()
            .map(|n| CanonicalNet {
                name: n.name.clone(),
                sources: self.endpoint_labels(&n.sources),
                destinations: self.endpoint_labels(&n.destinations),
                annotations: n.annotations.clone(),
            })
            .collect();
        nets.sort_by(|a, b| {
            (&a.name, &a.sources, &a.destinations).cmp(&(&b.name, &b.sources, &b.destinations))
        });

        let mut modules: Vec<CanonicalModule> = self
            .modules
            .values()
            .map(|m| CanonicalModule {
                path: self.module_path(m.id),
                module_type: m.module_type.clone(),
                annotations: m.annotations.clone(),
            })
            .collect();
        modules.sort_by(|a, b| a.path.cmp(&b.path));

        let sorted = |labels: Vec<String>| {
            let mut labels = labels;
            labels.sort();
            labels
        };

        CanonicalNetlist {
            design_name: self.design_name.clone(),
            device_name: self.device_name.clone(),
            library: self.library.name().to_string(),
            gates,
            nets,
            modules,
            vcc_gates: sorted(self.vcc_gates.iter().map(|g| self.gate_label(*g)).collect()),
            gnd_gates: sorted(self.gnd_gates.iter().map(|g| self.gate_label(*g)).collect()),
            global_inputs: sorted(self.global_inputs.iter().map(|n| self.net_label(*n)).collect()),
            global_outputs: sorted(
                self.global_outputs.iter().map(|n| self.net_label(*n)).collect(),
            ),
        }
    }

    /// SHA-256 of the canonical form.
    pub fn canonical_hash(&self) -> Result<ContentHash, serde_json::Error> {
        content_hash(&self.canonical_form())
    }

    /// Slash-separated path of module names from the top module.
    pub fn module_path(&self, module: ModuleId) -> String {
        let mut names = Vec::new();
        let mut cursor = Some(module);
        while let Some(id) = cursor {
            let Some(m) = self.modules.get(&id) else { break };
            names.push(m.name.as_str());
            if names.len() > self.modules.len() {
                break;
            }
            cursor = m.parent;
        }
        names.reverse();
        names.join("/")
    }

    fn gate_label(&self, gate: GateId) -> String {
        match self.gates.get(&gate) {
            Some(g) if !g.name.is_empty() => g.name.clone(),
            _ => gate.to_string(),
        }
    }

    fn net_label(&self, net: NetId) -> String {
        match self.nets.get(&net) {
            Some(n) if !n.name.is_empty() => n.name.clone(),
            _ => net.to_string(),
        }
    }

    fn endpoint_labels(&self, endpoints: &[Endpoint]) -> Vec<(String, String)> {
        let mut labels: Vec<(String, String)> = endpoints
            .iter()
            .map(|ep| (self.gate_label(ep.gate), ep.pin.clone()))
            .collect();
        labels.sort();
        labels
    }
}
