use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use gatelens_core::{ErrorKind, GateLibrary, Netlist, PinRole, Selector};
use gatelens_hdl::{HdlError, HdlParser, ParserManager};
use gatelens_library::GateLibraryManager;
use gatelens_project::{DocNode, FileManager, ProjectError, ProjectSettings};

const CELLS: &str = r#"{
    "library": "demo_cells",
    "cells": [
        {
            "name": "AND2",
            "pins": [
                { "name": "I0", "direction": "input" },
                { "name": "I1", "direction": "input" },
                { "name": "O", "direction": "output", "function": "I0 & I1" }
            ]
        },
        {
            "name": "INV",
            "pins": [
                { "name": "I", "direction": "input" },
                { "name": "O", "direction": "output", "function": "!I" }
            ]
        },
        {
            "name": "VCC",
            "types": ["power"],
            "pins": [ { "name": "O", "direction": "output", "function": "1" } ]
        }
    ]
}"#;

struct Fixture {
    dir: tempfile::TempDir,
    library_path: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let library_path = dir.path().join("demo_cells.hgl");
        fs::write(&library_path, CELLS).unwrap();
        Self { dir, library_path }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn libraries(&self) -> (GateLibraryManager, Arc<GateLibrary>) {
        let mut manager = GateLibraryManager::with_defaults();
        let library = manager.load(&self.library_path, false).unwrap();
        (manager, library)
    }

    fn design(&self) -> Netlist {
        let (_, library) = self.libraries();
        let mut nl = Netlist::new(library);
        nl.set_design_name("demo");
        nl.set_device_name("xc7a35t");

        let top = nl.top_module();
        let logic = nl.create_module("logic", top, &[]).unwrap();
        let vcc = nl.create_gate("VCC", "vcc").unwrap();
        let and = nl.create_gate_in(logic, "AND2", "and").unwrap();
        let inv = nl.create_gate_in(logic, "INV", "inv").unwrap();
        nl.mark_vcc_gate(vcc).unwrap();

        let a = nl.create_net("a").unwrap();
        let one = nl.create_net("one").unwrap();
        let mid = nl.create_net("mid").unwrap();
        let y = nl.create_net("y").unwrap();
        nl.connect(a, and, "I0", PinRole::Destination).unwrap();
        nl.connect(one, vcc, "O", PinRole::Source).unwrap();
        nl.connect(one, and, "I1", PinRole::Destination).unwrap();
        nl.connect(mid, and, "O", PinRole::Source).unwrap();
        nl.connect(mid, inv, "I", PinRole::Destination).unwrap();
        nl.connect(y, inv, "O", PinRole::Source).unwrap();
        nl.mark_global_input_net(a).unwrap();
        nl.mark_global_output_net(y).unwrap();
        nl.set_net_annotation(mid, "timing", "critical").unwrap();
        nl
    }
}

fn rewrite_json(path: &Path, edit: impl FnOnce(&mut serde_json::Value)) {
    let mut value: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
    edit(&mut value);
    fs::write(path, serde_json::to_string_pretty(&value).unwrap()).unwrap();
}

#[test]
fn save_then_load_preserves_canonical_form() {
    let fx = Fixture::new();
    let original = fx.design();
    let file = fx.path("demo.glp");

    let manager = FileManager::default();
    manager.save(&file, &original).unwrap();

    let mut libraries = GateLibraryManager::with_defaults();
    let outcome = manager.load(&file, &mut libraries).unwrap();
    assert!(!outcome.is_partial());
    let loaded = outcome.netlist;

    assert_eq!(loaded.canonical_form(), original.canonical_form());
    assert_eq!(loaded.top_module(), original.top_module());
    assert_eq!(
        loaded.gate_by_name("inv").unwrap().id(),
        original.gate_by_name("inv").unwrap().id()
    );
    assert_eq!(loaded.library().name(), "demo_cells");
    assert!(loaded.check_consistency().is_empty());

    // New objects continue after the highest loaded id.
    let mut loaded = loaded;
    let fresh = loaded.create_gate("INV", "extra").unwrap();
    assert!(original.gates().all(|g| g.id() < fresh));
}

#[test]
fn plugin_sections_round_trip_in_order() {
    let fx = Fixture::new();
    let file = fx.path("demo.glp");
    let log = Arc::new(Mutex::new(Vec::new()));

    let mut manager = FileManager::default();
    let l1 = Arc::clone(&log);
    manager
        .on_serialize("c1", move |_: &Path, nl: &Netlist, node: &mut DocNode| {
            l1.lock().unwrap().push("c1 start");
            node.insert("gates", nl.gate_count() as i64);
            l1.lock().unwrap().push("c1 end");
            Ok(())
        })
        .unwrap();
    let l2 = Arc::clone(&log);
    manager
        .on_serialize("c2", move |_: &Path, _: &Netlist, node: &mut DocNode| {
            l2.lock().unwrap().push("c2 start");
            node.insert("note", "hello");
            Ok(())
        })
        .unwrap();
    manager.save(&file, &fx.design()).unwrap();
    assert_eq!(*log.lock().unwrap(), vec!["c1 start", "c1 end", "c2 start"]);

    let restored = Arc::new(Mutex::new(None));
    let r = Arc::clone(&restored);
    manager
        .on_deserialize("c1", move |_: &Path, nl: &mut Netlist, node: &DocNode| {
            let count = node.get("gates").and_then(DocNode::as_i64).ok_or("no gate count")?;
            *r.lock().unwrap() = Some(count);
            let inv = nl.gate_by_name("inv").map(|g| g.id()).ok_or("no inv")?;
            nl.set_gate_annotation(inv, "restored", "yes")?;
            Ok(())
        })
        .unwrap();

    let (mut libraries, _) = fx.libraries();
    let outcome = manager.load(&file, &mut libraries).unwrap();
    assert_eq!(*restored.lock().unwrap(), Some(3));
    let inv = outcome.netlist.gate_by_name("inv").unwrap();
    assert_eq!(inv.annotation("restored"), Some("yes"));
}

#[test]
fn failing_serializer_keeps_core_and_other_sections() {
    let fx = Fixture::new();
    let file = fx.path("demo.glp");
    let design = fx.design();

    let mut manager = FileManager::default();
    manager
        .on_serialize("good", |_: &Path, _: &Netlist, node: &mut DocNode| {
            node.insert("ok", true);
            Ok(())
        })
        .unwrap();
    manager
        .on_serialize("bad", |_: &Path, _: &Netlist, _: &mut DocNode| Err("disk quota".into()))
        .unwrap();

    let err = manager.save(&file, &design).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PluginCallbackFailure);
    match err {
        ProjectError::PluginCallbacks { failures } => {
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].key, "bad");
            assert_eq!(failures[0].hook, "serialize");
            assert!(failures[0].message.contains("disk quota"));
        }
        other => panic!("unexpected error {other:?}"),
    }

    let raw: serde_json::Value = serde_json::from_str(&fs::read_to_string(&file).unwrap()).unwrap();
    assert_eq!(raw["plugins"]["good"]["ok"], serde_json::Value::Bool(true));
    assert!(raw["plugins"].get("bad").is_none());

    let (mut libraries, _) = fx.libraries();
    let loaded = FileManager::default().load(&file, &mut libraries).unwrap();
    assert_eq!(loaded.netlist.canonical_form(), design.canonical_form());
}

#[test]
fn failing_deserializer_gives_partial_outcome() {
    let fx = Fixture::new();
    let file = fx.path("demo.glp");

    let mut manager = FileManager::default();
    manager
        .on_serialize("stats", |_: &Path, _: &Netlist, node: &mut DocNode| {
            node.insert("version", 7);
            Ok(())
        })
        .unwrap();
    manager.save(&file, &fx.design()).unwrap();

    let absent_called = Arc::new(Mutex::new(false));
    let flag = Arc::clone(&absent_called);
    manager
        .on_deserialize("stats", |_: &Path, _: &mut Netlist, _: &DocNode| {
            Err("cannot read stats".into())
        })
        .unwrap();
    manager
        .on_deserialize("absent", move |_: &Path, _: &mut Netlist, _: &DocNode| {
            *flag.lock().unwrap() = true;
            Ok(())
        })
        .unwrap();

    let (mut libraries, _) = fx.libraries();
    let outcome = manager.load(&file, &mut libraries).unwrap();
    assert!(outcome.is_partial());
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].key, "stats");
    assert_eq!(outcome.netlist.gate_count(), 3);
    assert!(!*absent_called.lock().unwrap());
}

#[test]
fn panicking_serializer_is_reported_and_later_sections_saved() {
    let fx = Fixture::new();
    let file = fx.path("demo.glp");

    let mut manager = FileManager::default();
    manager
        .on_serialize("bad", |_: &Path, _: &Netlist, _: &mut DocNode| panic!("plugin bug"))
        .unwrap();
    manager
        .on_serialize("good", |_: &Path, _: &Netlist, node: &mut DocNode| {
            node.insert("ok", true);
            Ok(())
        })
        .unwrap();

    match manager.save(&file, &fx.design()).unwrap_err() {
        ProjectError::PluginCallbacks { failures } => {
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].key, "bad");
            assert!(failures[0].message.contains("plugin bug"));
        }
        other => panic!("unexpected error {other:?}"),
    }

    let raw: serde_json::Value = serde_json::from_str(&fs::read_to_string(&file).unwrap()).unwrap();
    assert_eq!(raw["plugins"]["good"]["ok"], serde_json::Value::Bool(true));
    assert!(raw["plugins"].get("bad").is_none());
}

#[test]
fn panicking_deserializer_gives_partial_outcome() {
    let fx = Fixture::new();
    let file = fx.path("demo.glp");

    let mut manager = FileManager::default();
    for identifier in ["first", "second"] {
        manager
            .on_serialize(identifier, |_: &Path, _: &Netlist, node: &mut DocNode| {
                node.insert("n", 1);
                Ok(())
            })
            .unwrap();
    }
    manager.save(&file, &fx.design()).unwrap();

    let second_ran = Arc::new(Mutex::new(false));
    let flag = Arc::clone(&second_ran);
    manager
        .on_deserialize("first", |_: &Path, _: &mut Netlist, _: &DocNode| panic!("decoder crashed"))
        .unwrap();
    manager
        .on_deserialize("second", move |_: &Path, _: &mut Netlist, _: &DocNode| {
            *flag.lock().unwrap() = true;
            Ok(())
        })
        .unwrap();

    let (mut libraries, _) = fx.libraries();
    let outcome = manager.load(&file, &mut libraries).unwrap();
    assert!(outcome.is_partial());
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].key, "first");
    assert_eq!(outcome.failures[0].hook, "deserialize");
    assert!(outcome.failures[0].message.contains("decoder crashed"));
    assert_eq!(outcome.netlist.canonical_form(), fx.design().canonical_form());
    assert!(*second_ran.lock().unwrap());
}

#[test]
fn non_finite_numbers_fail_their_section() {
    let fx = Fixture::new();
    let file = fx.path("demo.glp");

    let mut manager = FileManager::default();
    manager
        .on_serialize("timing", |_: &Path, _: &Netlist, node: &mut DocNode| {
            node.insert("slack", f64::NAN);
            Ok(())
        })
        .unwrap();

    match manager.save(&file, &fx.design()).unwrap_err() {
        ProjectError::PluginCallbacks { failures } => {
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].key, "timing");
        }
        other => panic!("unexpected error {other:?}"),
    }
    let raw: serde_json::Value = serde_json::from_str(&fs::read_to_string(&file).unwrap()).unwrap();
    assert!(raw.get("plugins").map_or(true, |p| p.get("timing").is_none()));
}

#[test]
fn duplicate_callbacks_are_configuration_errors() {
    let mut manager = FileManager::default();
    manager
        .on_serialize("p", |_: &Path, _: &Netlist, _: &mut DocNode| Ok(()))
        .unwrap();
    let err = manager
        .on_serialize("p", |_: &Path, _: &Netlist, _: &mut DocNode| Ok(()))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);

    assert!(manager.remove_serializer("p"));
    assert!(!manager.remove_serializer("p"));
    assert!(!manager.remove_deserializer("p"));
    assert!(manager.serializer_ids().is_empty());
}

#[test]
fn tampered_netlist_fails_integrity_check() {
    let fx = Fixture::new();
    let file = fx.path("demo.glp");
    FileManager::default().save(&file, &fx.design()).unwrap();
    rewrite_json(&file, |v| v["netlist"]["design_name"] = "tampered".into());

    let (mut libraries, _) = fx.libraries();
    let err = FileManager::default().load(&file, &mut libraries).unwrap_err();
    assert!(matches!(err, ProjectError::IntegrityFailed { .. }));
    assert_eq!(err.kind(), ErrorKind::InvalidData);

    let lenient = FileManager::new(ProjectSettings {
        verify_integrity: false,
        ..ProjectSettings::default()
    });
    let outcome = lenient.load(&file, &mut libraries).unwrap();
    assert_eq!(outcome.netlist.design_name(), "tampered");
}

#[test]
fn rejects_foreign_and_future_documents() {
    let fx = Fixture::new();
    let file = fx.path("demo.glp");
    let manager = FileManager::default();
    let (mut libraries, _) = fx.libraries();

    manager.save(&file, &fx.design()).unwrap();
    rewrite_json(&file, |v| v["version"] = 2.into());
    let err = manager.load(&file, &mut libraries).unwrap_err();
    assert!(matches!(err, ProjectError::UnsupportedVersion { found: 2, supported: 1 }));

    manager.save(&file, &fx.design()).unwrap();
    rewrite_json(&file, |v| v["format"] = "something-else".into());
    let err = manager.load(&file, &mut libraries).unwrap_err();
    assert!(matches!(err, ProjectError::InvalidFormat(_)));

    fs::write(&file, "not json").unwrap();
    assert_eq!(manager.load(&file, &mut libraries).unwrap_err().kind(), ErrorKind::InvalidData);

    let err = manager.load(&fx.path("missing.glp"), &mut libraries).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn library_found_through_search_paths() {
    let fx = Fixture::new();
    let file = fx.path("demo.glp");
    FileManager::default().save(&file, &fx.design()).unwrap();

    let elsewhere = fx.path("cells");
    fs::create_dir(&elsewhere).unwrap();
    fs::rename(&fx.library_path, elsewhere.join("renamed.hgl")).unwrap();

    let mut libraries = GateLibraryManager::with_defaults();
    let err = FileManager::default().load(&file, &mut libraries).unwrap_err();
    assert!(matches!(err, ProjectError::MissingLibrary { ref name, .. } if name == "demo_cells"));
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let manager = FileManager::new(ProjectSettings {
        library_search_paths: vec![elsewhere],
        ..ProjectSettings::default()
    });
    let outcome = manager.load(&file, &mut libraries).unwrap();
    assert_eq!(outcome.netlist.library().name(), "demo_cells");
}

/// One `TYPE NAME` pair per line.
struct GateListParser;

impl HdlParser for GateListParser {
    fn parse(
        &mut self,
        _path: &Path,
        source: &str,
        library: Arc<GateLibrary>,
    ) -> Result<Netlist, HdlError> {
        let mut netlist = Netlist::new(library);
        for (index, line) in source.lines().enumerate() {
            let mut words = line.split_whitespace();
            match (words.next(), words.next()) {
                (Some(gate_type), Some(name)) => {
                    netlist.create_gate(gate_type, name)?;
                }
                (None, _) => {}
                _ => return Err(HdlError::syntax(index as u32 + 1, 0, "expected TYPE NAME")),
            }
        }
        Ok(netlist)
    }
}

#[test]
fn import_routes_by_extension() {
    let fx = Fixture::new();
    let project = fx.path("demo.glp");
    let list = fx.path("gates.lst");
    let other = fx.path("design.vhd");
    fs::write(&list, "INV i0\nAND2 a0\n").unwrap();
    fs::write(&other, "entity x is end;").unwrap();

    let manager = FileManager::default();
    manager.save(&project, &fx.design()).unwrap();

    let mut parsers = ParserManager::new();
    parsers
        .register_parser("list", Selector::extensions(["lst"]), || GateListParser)
        .unwrap();
    let (mut libraries, library) = fx.libraries();

    let from_project = manager.import(&project, &parsers, &mut libraries, None).unwrap();
    assert_eq!(from_project.netlist.design_name(), "demo");

    let explicit = manager
        .import(&list, &parsers, &mut libraries, Some(Arc::clone(&library)))
        .unwrap();
    assert_eq!(explicit.netlist.gate_count(), 2);
    assert_eq!(explicit.netlist.input_path(), Some(list.as_path()));

    let candidates = manager.import(&list, &parsers, &mut libraries, None).unwrap();
    assert_eq!(candidates.netlist.library().name(), "demo_cells");

    let err = manager.import(&other, &parsers, &mut libraries, None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FormatUnsupported);
}

#[test]
fn compact_output_when_not_pretty() {
    let fx = Fixture::new();
    let file = fx.path("demo.glp");
    let manager = FileManager::new(ProjectSettings {
        pretty: false,
        ..ProjectSettings::default()
    });
    manager.save(&file, &fx.design()).unwrap();
    let text = fs::read_to_string(&file).unwrap();
    assert!(!text.contains('\n'));
    assert!(text.starts_with(r#"{"format":"gatelens-project","version":1,"netlist_hash":""#));
}
