use std::fs;
use std::path::Path;
use std::sync::Arc;

use gatelens_core::{ErrorKind, Selector};
use gatelens_library::{GateLibraryManager, GateLibraryParser, LibraryError};

fn cells(name: &str, cell: &str) -> String {
    format!(
        r#"{{
            "library": "{name}",
            "cells": [
                {{
                    "name": "{cell}",
                    "pins": [
                        {{ "name": "I", "direction": "input" }},
                        {{ "name": "O", "direction": "output", "function": "!I" }}
                    ]
                }}
            ]
        }}"#
    )
}

#[test]
fn load_caches_by_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("lib_a.hgl");
    fs::write(&path, cells("lib_a", "INV")).unwrap();

    let mut manager = GateLibraryManager::with_defaults();
    let first = manager.load(&path, false).unwrap();
    assert_eq!(first.name(), "lib_a");
    assert!(first.gate_type("INV").is_some());

    let again = manager.load(&path, false).unwrap();
    assert!(Arc::ptr_eq(&first, &again));

    // A relative spelling of the same file still hits the cache.
    let dotted = dir.path().join(".").join("lib_a.hgl");
    assert!(Arc::ptr_eq(&first, &manager.load(&dotted, false).unwrap()));
    assert_eq!(manager.len(), 1);
}

#[test]
fn reload_replaces_cached_library() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("lib.hgl");
    fs::write(&path, cells("lib", "INV")).unwrap();

    let mut manager = GateLibraryManager::with_defaults();
    let first = manager.load(&path, false).unwrap();

    fs::write(&path, cells("lib", "BUF")).unwrap();
    let cached = manager.load(&path, false).unwrap();
    assert!(cached.gate_type("BUF").is_none());

    let reloaded = manager.load(&path, true).unwrap();
    assert!(!Arc::ptr_eq(&first, &reloaded));
    assert!(reloaded.gate_type("BUF").is_some());
    assert!(Arc::ptr_eq(&manager.get(&path).unwrap(), &reloaded));
}

#[test]
fn load_all_skips_broken_and_foreign_files() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("b.hgl"), cells("lib_b", "INV")).unwrap();
    fs::write(dir.path().join("a.hgl"), cells("lib_a", "INV")).unwrap();
    fs::write(dir.path().join("broken.hgl"), "{ \"library\": ").unwrap();
    fs::write(dir.path().join("notes.txt"), cells("ignored", "INV")).unwrap();

    let mut manager = GateLibraryManager::with_defaults();
    let loaded = manager.load_all(dir.path(), false).unwrap();
    let names: Vec<&str> = loaded.iter().map(|l| l.name()).collect();
    assert_eq!(names, vec!["lib_a", "lib_b"]);

    assert!(manager.get_by_name("lib_b").is_some());
    assert!(manager.get_by_name("ignored").is_none());
    assert_eq!(manager.libraries().count(), 2);
}

#[test]
fn remove_forgets_library() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("lib.hgl");
    fs::write(&path, cells("lib", "INV")).unwrap();

    let mut manager = GateLibraryManager::with_defaults();
    manager.load(&path, false).unwrap();
    manager.remove(&path).unwrap();
    assert!(manager.get(&path).is_none());

    let err = manager.remove(&path).unwrap_err();
    assert!(matches!(err, LibraryError::NotLoaded(_)));
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn unsupported_and_missing_files() {
    let mut manager = GateLibraryManager::with_defaults();
    let err = manager.load(Path::new("/nowhere/cells.lib"), false).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FormatUnsupported);

    let err = manager.load(Path::new("/nowhere/cells.hgl"), false).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IoFailure);

    let err = manager.load_all(Path::new("/nowhere"), false).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IoFailure);
}

#[test]
fn invalid_library_reports_invalid_data() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.hgl");
    fs::write(
        &path,
        r#"{ "library": "bad", "cells": [ { "name": "X", "types": ["warp"] } ] }"#,
    )
    .unwrap();

    let mut manager = GateLibraryManager::with_defaults();
    let err = manager.load(&path, false).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidData);
    assert!(manager.is_empty());
}

struct NameOnly;

impl GateLibraryParser for NameOnly {
    fn parse(
        &mut self,
        path: &Path,
        source: &str,
    ) -> Result<gatelens_core::GateLibrary, LibraryError> {
        Ok(gatelens_core::GateLibrary::new(source.trim(), path))
    }
}

#[test]
fn custom_reader_by_predicate() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("CELLS");
    fs::write(&path, "custom\n").unwrap();

    let mut manager = GateLibraryManager::with_defaults();
    manager
        .register_parser(
            "names",
            Selector::predicate(|p| p.file_name().is_some_and(|n| n == "CELLS")),
            || NameOnly,
        )
        .unwrap();
    let err = manager
        .register_parser("names", Selector::extensions(["names"]), || NameOnly)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);

    assert_eq!(manager.load(&path, false).unwrap().name(), "custom");
    manager.unregister_parser("names").unwrap();
    assert!(!manager.can_load(&path));
}
