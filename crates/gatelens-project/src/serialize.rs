//! The persisted layout of a project file and the conversion between its
//! core section and a [`Netlist`].

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use gatelens_core::hash::{content_hash, hash_hex};
use gatelens_core::{Endpoint, EventHandlers, GateId, GateLibrary, ModuleId, NetId, Netlist};
use serde::{Deserialize, Serialize};

use crate::document::DocNode;
use crate::error::ProjectError;

/// Value of the `format` field of every project file.
pub const FORMAT_TAG: &str = "gatelens-project";

/// Newest project layout this crate reads and the one it writes.
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ProjectDocument {
    pub format: String,
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub netlist_hash: Option<String>,
    pub netlist: NetlistSection,
    #[serde(default)]
    pub plugins: BTreeMap<String, DocNode>,
}

impl ProjectDocument {
    pub fn new(netlist: NetlistSection) -> Result<Self, serde_json::Error> {
        Ok(Self {
            format: FORMAT_TAG.to_string(),
            version: FORMAT_VERSION,
            netlist_hash: Some(netlist.hash()?),
            netlist,
            plugins: BTreeMap::new(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct NetlistSection {
    pub id: u64,
    pub design_name: String,
    pub device_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_path: Option<PathBuf>,
    pub gate_library: LibraryRef,
    pub top_module: ModuleId,
    pub gates: Vec<GateRecord>,
    pub nets: Vec<NetRecord>,
    pub modules: Vec<ModuleRecord>,
    #[serde(default)]
    pub global_vcc: Vec<GateId>,
    #[serde(default)]
    pub global_gnd: Vec<GateId>,
    #[serde(default)]
    pub global_inputs: Vec<NetId>,
    #[serde(default)]
    pub global_outputs: Vec<NetId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct LibraryRef {
    pub name: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct GateRecord {
    pub id: GateId,
    pub name: String,
    #[serde(rename = "type")]
    pub gate_type: String,
    pub module: ModuleId,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct NetRecord {
    pub id: NetId,
    pub name: String,
    #[serde(default)]
    pub sources: Vec<Endpoint>,
    #[serde(default)]
    pub destinations: Vec<Endpoint>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct ModuleRecord {
    pub id: ModuleId,
    pub name: String,
    #[serde(rename = "type", default)]
    pub module_type: String,
    pub parent: Option<ModuleId>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

impl NetlistSection {
    /// Snapshot `netlist` into its persisted form.
    pub fn from_netlist(netlist: &Netlist) -> Self {
        let library = netlist.library();
        Self {
            id: netlist.id(),
            design_name: netlist.design_name().to_string(),
            device_name: netlist.device_name().to_string(),
            input_path: netlist.input_path().map(|p| p.to_path_buf()),
            gate_library: LibraryRef {
                name: library.name().to_string(),
                path: library.path().to_path_buf(),
            },
            top_module: netlist.top_module(),
            gates: netlist
                .gates()
                .map(|g| GateRecord {
                    id: g.id(),
                    name: g.name().to_string(),
                    gate_type: g.type_name().to_string(),
                    module: g.module(),
                    annotations: g.annotations().clone(),
                })
                .collect(),
            nets: netlist
                .nets()
                .map(|n| NetRecord {
                    id: n.id(),
                    name: n.name().to_string(),
                    sources: n.sources().to_vec(),
                    destinations: n.destinations().to_vec(),
                    annotations: n.annotations().clone(),
                })
                .collect(),
            modules: netlist
                .modules()
                .map(|m| ModuleRecord {
                    id: m.id(),
                    name: m.name().to_string(),
                    module_type: m.module_type().to_string(),
                    parent: m.parent(),
                    annotations: m.annotations().clone(),
                })
                .collect(),
            global_vcc: netlist.vcc_gates().collect(),
            global_gnd: netlist.gnd_gates().collect(),
            global_inputs: netlist.global_input_nets().collect(),
            global_outputs: netlist.global_output_nets().collect(),
        }
    }

    /// Hex SHA-256 of this section.
    pub fn hash(&self) -> Result<String, serde_json::Error> {
        Ok(hash_hex(&content_hash(self)?))
    }

    /// Rebuild the netlist this section describes, keeping every id.
    ///
    /// No events are delivered while the graph is assembled; the returned
    /// netlist has fresh handlers with dispatch enabled.
    pub fn into_netlist(self, library: Arc<GateLibrary>) -> Result<Netlist, ProjectError> {
        let events = Arc::new(EventHandlers::new());
        events.set_enabled(false);

        let top = self.modules.iter().find(|m| m.id == self.top_module);
        let top_name = top.map_or_else(|| "top_module".to_string(), |m| m.name.clone());
        let mut netlist =
            Netlist::with_top_module(library, self.top_module, top_name, Arc::clone(&events));
        let built = self.populate(&mut netlist);
        events.set_enabled(true);
        built?;
        Ok(netlist)
    }

    fn populate(self, netlist: &mut Netlist) -> Result<(), ProjectError> {
        netlist.set_id(self.id);
        netlist.set_design_name(self.design_name);
        netlist.set_device_name(self.device_name);
        if let Some(path) = self.input_path {
            netlist.set_input_path(path);
        }

        // Every module is created under the top module first so that
        // parents never need to exist before their children.
        let top = self.top_module;
        for m in self.modules.iter().filter(|m| m.id != top) {
            netlist.create_module_with_id(m.id, m.name.clone(), top, &[])?;
        }
        for m in &self.modules {
            if let Some(parent) = m.parent.filter(|p| *p != top && m.id != top) {
                netlist.set_module_parent(m.id, parent)?;
            }
            netlist.set_module_type(m.id, m.module_type.clone())?;
            for (key, value) in &m.annotations {
                netlist.set_module_annotation(m.id, key.clone(), value.clone())?;
            }
        }

        for g in self.gates {
            netlist.create_gate_with_id(g.id, g.module, &g.gate_type, g.name)?;
            for (key, value) in g.annotations {
                netlist.set_gate_annotation(g.id, key, value)?;
            }
        }

        for n in self.nets {
            netlist.create_net_with_id(n.id, n.name)?;
            for ep in &n.sources {
                netlist.add_source(n.id, ep.gate, &ep.pin)?;
            }
            for ep in &n.destinations {
                netlist.add_destination(n.id, ep.gate, &ep.pin)?;
            }
            for (key, value) in n.annotations {
                netlist.set_net_annotation(n.id, key, value)?;
            }
        }

        for gate in self.global_vcc {
            netlist.mark_vcc_gate(gate)?;
        }
        for gate in self.global_gnd {
            netlist.mark_gnd_gate(gate)?;
        }
        for net in self.global_inputs {
            netlist.mark_global_input_net(net)?;
        }
        for net in self.global_outputs {
            netlist.mark_global_output_net(net)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatelens_core::library::{GateType, PinDef};
    use gatelens_core::PinRole;

    fn library() -> Arc<GateLibrary> {
        let mut lib = GateLibrary::new("cells", "/libs/cells.hgl");
        lib.add_gate_type(
            GateType::new("AND2")
                .with_pin(PinDef::input("I0"))
                .with_pin(PinDef::input("I1"))
                .with_pin(PinDef::output("O")),
        )
        .unwrap();
        lib.add_gate_type(GateType::new("VCC").with_pin(PinDef::output("O")))
            .unwrap();
        Arc::new(lib)
    }

    fn sample() -> Netlist {
        let mut nl = Netlist::new(library());
        nl.set_design_name("demo");
        let top = nl.top_module();
        let inner = nl.create_module("inner", top, &[]).unwrap();
        let outer = nl.create_module("outer", top, &[]).unwrap();
        nl.set_module_parent(inner, outer).unwrap();
        nl.set_module_type(inner, "alu").unwrap();

        let vcc = nl.create_gate("VCC", "vcc").unwrap();
        let g = nl.create_gate_in(inner, "AND2", "g").unwrap();
        nl.set_gate_annotation(g, "loc", "X1Y2").unwrap();
        let n = nl.create_net("n").unwrap();
        nl.connect(n, vcc, "O", PinRole::Source).unwrap();
        nl.connect(n, g, "I0", PinRole::Destination).unwrap();
        nl.connect(n, g, "I1", PinRole::Destination).unwrap();
        nl.mark_vcc_gate(vcc).unwrap();
        let out = nl.create_net("out").unwrap();
        nl.connect(out, g, "O", PinRole::Source).unwrap();
        nl.mark_global_output_net(out).unwrap();
        nl
    }

    #[test]
    fn rebuild_preserves_ids_and_structure() {
        let original = sample();
        let section = NetlistSection::from_netlist(&original);
        let rebuilt = section.clone().into_netlist(library()).unwrap();

        assert_eq!(rebuilt.canonical_form(), original.canonical_form());
        assert_eq!(NetlistSection::from_netlist(&rebuilt), section);
        assert!(rebuilt.check_consistency().is_empty());
        assert!(rebuilt.events().is_enabled());
    }

    #[test]
    fn hash_tracks_content() {
        let mut nl = sample();
        let before = NetlistSection::from_netlist(&nl).hash().unwrap();
        assert_eq!(before, NetlistSection::from_netlist(&nl).hash().unwrap());
        nl.set_design_name("other");
        assert_ne!(before, NetlistSection::from_netlist(&nl).hash().unwrap());
    }

    #[test]
    fn unknown_gate_type_fails_rebuild() {
        let mut section = NetlistSection::from_netlist(&sample());
        section.gates[0].gate_type = "NAND9".to_string();
        let err = section.into_netlist(library()).unwrap_err();
        assert_eq!(err.kind(), gatelens_core::ErrorKind::NotFound);
    }
}
