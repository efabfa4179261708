use crate::fixture::{Module, EMPTY, EXISTING, IFCS, LEGACY};
use goannotate::annotate::{self, AnnotateContext, AnnotateError, Registry};
use goannotate::config::load_from_str;
use goannotate::edit::{EditEngine, FileOutcome};
use goannotate::format::Passthrough;
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

const CONFIG: &str = r#"
[settings]
formatter = []

[[annotations]]
type = "rmlogcall"
name = "rmlegacy"
packages = ["example.com/m/impl"]
interfaces = ["example.com/m/ifcs.Writer$"]
functions = ["example.com/m/impl.API"]
function_name_re = "apilog.LogCallfLegacy"
comment = "gologcop: DO NOT EDIT"
deferred = true

[[annotations]]
type = "rmlogcall"
name = "rmlegacy-nodefer"
packages = ["example.com/m/impl"]
interfaces = ["example.com/m/ifcs.Writer$"]
functions = ["example.com/m/impl.API"]
function_name_re = "apilog.LogCallfLegacy"
comment = "gologcop: DO NOT EDIT"

[[annotations]]
type = "addlogcall"
name = "add"
packages = ["example.com/m/impl"]
interfaces = ["example.com/m/ifcs.Writer$"]
functions = ["example.com/m/impl.API"]
logcall = "apilog.LogCallf"
import = "example.com/m/apilog"
ignore_empty_functions = true

[[annotations]]
type = "copyright"
name = "copyright"
packages = ["example.com/m/impl"]
copyright = "// Copyright 2024 Example Authors."
license = """
// Use of this source code is governed by the Apache-2.0
// license that can be found in the LICENSE file."""
exclusions = ["skip\\.go$"]
"#;

fn run(module: &Module, name: &str, out: Option<&TempDir>) -> Result<Vec<FileOutcome>, AnnotateError> {
    let config = load_from_str(CONFIG).unwrap();
    let registry = Registry::with_builtins();
    let annotation = registry.build(config.annotation(name).unwrap())?;
    let ctx = AnnotateContext::new(module.toolchain());
    let engine = EditEngine::new(Arc::new(Passthrough));
    annotate::run(annotation.as_ref(), &ctx, &engine, out.map(TempDir::path), &[])
}

#[test]
fn rmlogcall_removes_marked_deferred_calls() {
    let module = Module::new(&[("ifcs/ifcs.go", IFCS), ("impl/legacy.go", LEGACY)]);
    let out = TempDir::new().unwrap();
    run(&module, "rmlegacy", Some(&out)).unwrap();

    let want = LEGACY
        .replace(
            "\tdefer apilog.LogCallfLegacy(nil, \"buf=%v...\", buf)(nil, \"\") // gologcop: DO NOT EDIT, MUST BE FIRST STATEMENT\n",
            "",
        )
        .replace(
            "\tdefer apilog.LogCallfLegacy(nil, \"n=%v...\", n)(nil, \"\") // gologcop: DO NOT EDIT, MUST BE FIRST STATEMENT\n",
            "",
        );
    assert_eq!(fs::read_to_string(out.path().join("legacy.go")).unwrap(), want);
    assert!(want.contains("\tapilog.LogCallfLegacy(nil, \"n=%v...\", n)(nil, \"\")"));
    assert_eq!(module.read("impl/legacy.go"), LEGACY);
}

#[test]
fn rmlogcall_removes_marked_plain_calls() {
    let module = Module::new(&[("ifcs/ifcs.go", IFCS), ("impl/legacy.go", LEGACY)]);
    run(&module, "rmlegacy-nodefer", None).unwrap();

    let want = LEGACY.replace(
        "\tapilog.LogCallfLegacy(nil, \"n=%v...\", n)(nil, \"\") // gologcop: DO NOT EDIT, MUST BE FIRST STATEMENT\n",
        "",
    );
    assert_eq!(module.read("impl/legacy.go"), want);
}

#[test]
fn addlogcall_inserts_calls_and_imports() {
    let module = Module::new(&[
        ("ifcs/ifcs.go", IFCS),
        ("impl/empty.go", EMPTY),
        ("impl/existing.go", EXISTING),
    ]);
    run(&module, "add", None).unwrap();

    let want_empty = "package impl\nimport \"example.com/m/apilog\"\n\n\ntype Empty struct{}\n\n\
func (i *Empty) Write(buf []byte) error {\n\
\tdefer apilog.LogCallf(nil, \"example.com/m/impl.Write\", \"impl/empty.go:5\", \"buf[:%d]=...\", len(buf))(nil, \"_=?\") // DO NOT EDIT, AUTO GENERATED BY addlogcall#add\n\
\treturn nil\n}\n\n\
func APIEmpty(n int) error {\n\
\tdefer apilog.LogCallf(nil, \"example.com/m/impl.APIEmpty\", \"impl/empty.go:9\", \"n=%d\", n)(nil, \"_=?\") // DO NOT EDIT, AUTO GENERATED BY addlogcall#add\n\
\treturn nil\n}\n";
    assert_eq!(module.read("impl/empty.go"), want_empty);

    let want_existing = EXISTING.replace(
        "func APINew(n int) error {\n",
        "func APINew(n int) error {\n\tdefer apilog.LogCallf(nil, \"example.com/m/impl.APINew\", \"impl/existing.go:10\", \"n=%d\", n)(nil, \"_=?\") // DO NOT EDIT, AUTO GENERATED BY addlogcall#add\n",
    );
    assert_eq!(module.read("impl/existing.go"), want_existing);

    // A second run finds everything annotated.
    run(&module, "add", None).unwrap();
    assert_eq!(module.read("impl/empty.go"), want_empty);
    assert_eq!(module.read("impl/existing.go"), want_existing);
}

#[test]
fn copyright_is_added_to_every_file_but_exclusions() {
    let module = Module::new(&[
        ("impl/a.go", "package impl\n\nfunc A() {}\n"),
        ("impl/a_test.go", "package impl\n\nfunc helper() {}\n"),
        ("impl/skip.go", "package impl\n"),
        ("impl/done.go", "// Copyright 2020 Someone.\n// All rights reserved.\n\npackage impl\n"),
    ]);
    let outcomes = run(&module, "copyright", None).unwrap();
    assert_eq!(outcomes.len(), 2);

    let header = "// Copyright 2024 Example Authors.\n\
// Use of this source code is governed by the Apache-2.0\n\
// license that can be found in the LICENSE file.\n\n";
    assert_eq!(module.read("impl/a.go"), format!("{header}package impl\n\nfunc A() {{}}\n"));
    assert_eq!(module.read("impl/a_test.go"), format!("{header}package impl\n\nfunc helper() {{}}\n"));
    assert_eq!(module.read("impl/skip.go"), "package impl\n");
    assert!(module.read("impl/done.go").starts_with("// Copyright 2020 Someone."));
}

#[test]
fn copyright_must_be_configured() {
    let module = Module::new(&[("impl/a.go", "package impl\n")]);
    let config = load_from_str("[[annotations]]\ntype = \"copyright\"\nname = \"c\"\n").unwrap();
    let annotation = Registry::with_builtins().build(&config.annotations[0]).unwrap();
    let ctx = AnnotateContext::new(module.toolchain());
    let err = annotation
        .edits(&ctx, &["example.com/m/impl".to_string()])
        .unwrap_err();
    assert!(err.to_string().contains("missing or empty copyright"), "{err}");
}

#[test]
fn packages_on_the_command_line_replace_configured_ones() {
    let config = load_from_str(CONFIG).unwrap();
    let annotation = Registry::with_builtins()
        .build(config.annotation("copyright").unwrap())
        .unwrap();
    assert_eq!(annotate::packages_for(annotation.as_ref(), &[]), vec!["example.com/m/impl"]);
    let requested = vec!["example.com/m/other".to_string()];
    assert_eq!(annotate::packages_for(annotation.as_ref(), &requested), requested);
}
