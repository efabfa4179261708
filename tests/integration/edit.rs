use crate::fixture::{Module, DATA, LEGACY};
use goannotate::edit::{Delta, EditEngine, Edits, FileOutcome};
use goannotate::format::Passthrough;
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

fn engine() -> EditEngine {
    EditEngine::new(Arc::new(Passthrough))
}

#[test]
fn empty_delta_lists_leave_files_unchanged() {
    let module = Module::new(&[("data/data.go", DATA), ("impl/legacy.go", LEGACY)]);
    let mut edits = Edits::new();
    edits.insert(module.path("data/data.go"), Vec::new());
    edits.insert(module.path("impl/legacy.go"), Vec::new());

    let outcomes = engine().apply(None, &edits).unwrap();
    assert!(outcomes.iter().all(|o| matches!(o, FileOutcome::Unchanged { .. })));
    assert_eq!(module.read("data/data.go"), DATA);
    assert_eq!(module.read("impl/legacy.go"), LEGACY);

    let out = TempDir::new().unwrap();
    engine().apply(Some(out.path()), &edits).unwrap();
    assert_eq!(fs::read_to_string(out.path().join("data/data.go")).unwrap(), DATA);
    assert_eq!(fs::read_to_string(out.path().join("impl/legacy.go")).unwrap(), LEGACY);
}

#[test]
fn edits_are_applied_against_original_offsets() {
    let module = Module::new(&[("data/data.go", DATA)]);
    let path = module.path("data/data.go");
    let fn10 = DATA.find("func Fn10").unwrap();
    let mut edits = Edits::new();
    edits.insert(
        path.clone(),
        vec![
            Delta::insert(fn10, "// Fn10 is documented.\n"),
            Delta::replace(DATA.find("rcv struct").unwrap(), 3, "receiver"),
            Delta::insert(0, "// Code generated for tests.\n\n"),
        ],
    );
    let outcomes = engine().apply(None, &edits).unwrap();
    assert_eq!(
        outcomes,
        vec![FileOutcome::Written {
            source: path.clone(),
            destination: path.clone(),
        }]
    );
    let edited = module.read("data/data.go");
    assert!(edited.starts_with("// Code generated for tests.\n\npackage data\n\ntype receiver struct{}\n"));
    assert!(edited.contains("// Fn10 is documented.\nfunc Fn10() {}\n"));
}

#[test]
fn failures_are_reported_per_file() {
    let module = Module::new(&[("data/data.go", DATA), ("impl/legacy.go", LEGACY)]);
    let mut edits = Edits::new();
    edits.insert(module.path("data/data.go"), vec![Delta::delete(DATA.len(), 10)]);
    edits.insert(module.path("impl/legacy.go"), vec![Delta::insert(0, "// ok\n")]);
    edits.insert(module.path("impl/missing.go"), vec![Delta::insert(0, "x")]);

    let errors = engine().apply(None, &edits).unwrap_err();
    assert_eq!(errors.0.len(), 2);
    let failed: Vec<_> = errors.0.iter().map(|e| e.path().to_path_buf()).collect();
    assert_eq!(failed, vec![module.path("data/data.go"), module.path("impl/missing.go")]);
    assert!(module.read("impl/legacy.go").starts_with("// ok\npackage impl"));
    assert_eq!(module.read("data/data.go"), DATA);
}

#[test]
fn preview_does_not_write() {
    let module = Module::new(&[("data/data.go", DATA)]);
    let mut edits = Edits::new();
    edits.insert(module.path("data/data.go"), vec![Delta::insert(0, "// preview\n")]);
    let changes = engine().preview(&edits).unwrap();
    let change = &changes[&module.path("data/data.go")];
    assert_eq!(change.original, DATA);
    assert_eq!(change.formatted, format!("// preview\n{DATA}"));
    assert_eq!(module.read("data/data.go"), DATA);
}
