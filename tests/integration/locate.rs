use crate::fixture::{Module, DATA, EMBED, FILE, IFCS, IMPL12, RC, READER, SIZER};
use goannotate::locate::{CancelToken, HitMask, LocateError, LocateOptions, Locator};
use std::path::PathBuf;

fn options(include_methods: bool) -> LocateOptions {
    LocateOptions {
        concurrency: 2,
        include_methods,
        ..LocateOptions::default()
    }
}

fn functions(locator: &Locator) -> Vec<(String, usize, usize, Vec<String>)> {
    let mut out = Vec::new();
    locator.walk_functions(|entry, _file, _pkg| {
        out.push((
            entry.name.clone(),
            entry.position.line,
            entry.position.column,
            entry.implements.clone(),
        ));
    });
    out
}

#[test]
fn functions_without_methods() {
    let module = Module::new(&[("data/data.go", DATA)]);
    let mut locator = Locator::new(module.toolchain(), options(false));
    locator.add_functions(["example.com/m/data.Fn1$"]);
    locator.run(&CancelToken::new()).unwrap();

    let found = functions(&locator);
    assert_eq!(found, vec![("example.com/m/data.Fn1".to_string(), 5, 6, vec![])]);
    let mut files = Vec::new();
    locator.walk_functions(|entry, file, pkg| {
        assert_eq!(pkg.path, "example.com/m/data");
        files.push((entry.filename().to_path_buf(), file.path.clone()));
    });
    assert_eq!(files, vec![(module.path("data/data.go"), module.path("data/data.go"))]);
}

#[test]
fn functions_with_methods_sorted_by_position() {
    let module = Module::new(&[("data/data.go", DATA)]);
    let mut locator = Locator::new(module.toolchain(), options(true));
    locator.add_functions(["example.com/m/data.Fn1$"]);
    locator.run(&CancelToken::new()).unwrap();

    let names: Vec<(String, usize)> = functions(&locator).into_iter().map(|(n, l, _, _)| (n, l)).collect();
    assert_eq!(
        names,
        vec![
            ("example.com/m/data.Fn1".to_string(), 5),
            ("(*example.com/m/data.rcv).Fn1".to_string(), 7),
        ]
    );
}

#[test]
fn interface_methods_are_abstract_functions() {
    let module = Module::new(&[("ifcs/ifcs.go", IFCS)]);
    let mut locator = Locator::new(module.toolchain(), options(true));
    locator.add_functions(["example.com/m/ifcs.M[12]$"]);
    locator.run(&CancelToken::new()).unwrap();

    let mut found = Vec::new();
    locator.walk_functions(|entry, file, _pkg| {
        assert!(entry.decl.is_none(), "{}", entry.name);
        assert!(entry.function.is_abstract(), "{}", entry.name);
        assert_eq!(file.path, module.path("ifcs/ifcs.go"));
        found.push((entry.name.clone(), entry.position.line, entry.position.column));
    });
    assert_eq!(
        found,
        vec![
            ("(example.com/m/ifcs.Ifc1).M1".to_string(), 4, 2),
            ("(example.com/m/ifcs.Ifc1).M2".to_string(), 5, 2),
            ("(example.com/m/ifcs.Ifc2).M2".to_string(), 9, 2),
            ("(example.com/m/ifcs.Ifc3).M1".to_string(), 14, 2),
        ]
    );
    assert_eq!(locator.hit_mask(&module.path("ifcs/ifcs.go")), HitMask::FUNCTION);

    let mut locator = Locator::new(module.toolchain(), options(false));
    locator.add_functions(["example.com/m/ifcs.M[12]$"]);
    let err = locator.run(&CancelToken::new()).unwrap_err();
    assert!(matches!(err, LocateError::NoMatch { kind: "functions", .. }), "{err}");
}

#[test]
fn unanchored_patterns_match_prefixes() {
    let module = Module::new(&[("data/data.go", DATA)]);
    let mut locator = Locator::new(module.toolchain(), options(false));
    locator.add_functions(["example.com/m/data.Fn"]);
    locator.run(&CancelToken::new()).unwrap();
    let names: Vec<String> = functions(&locator).into_iter().map(|f| f.0).collect();
    assert_eq!(names, vec!["example.com/m/data.Fn1", "example.com/m/data.Fn10"]);
}

#[test]
fn missing_matches_are_errors_unless_ignored() {
    let module = Module::new(&[("data/data.go", DATA)]);
    let mut locator = Locator::new(module.toolchain(), options(false));
    locator.add_functions(["example.com/m/data.Nothing$"]);
    let err = locator.run(&CancelToken::new()).unwrap_err();
    assert!(matches!(err, LocateError::NoMatch { kind: "functions", .. }), "{err}");

    let mut locator = Locator::new(
        module.toolchain(),
        LocateOptions {
            ignore_missing: true,
            ..options(false)
        },
    );
    locator.add_functions(["example.com/m/data.Nothing$"]);
    locator.run(&CancelToken::new()).unwrap();
    assert!(functions(&locator).is_empty());
}

#[test]
fn unknown_packages_fail_to_load() {
    let module = Module::new(&[("data/data.go", DATA)]);
    let mut locator = Locator::new(module.toolchain(), options(false));
    locator.add_functions(["example.com/m/missing.F"]);
    let err = locator.run(&CancelToken::new()).unwrap_err();
    assert!(matches!(err, LocateError::Load(_)), "{err}");
}

#[test]
fn invalid_specs_are_reported_together() {
    let module = Module::new(&[("data/data.go", DATA)]);
    let mut locator = Locator::new(module.toolchain(), options(false));
    locator.add_functions(["example.com/m/data.(", "example.com/m/data.[z-a]"]);
    let err = locator.run(&CancelToken::new()).unwrap_err();
    match err {
        LocateError::Multiple(errors) => assert_eq!(errors.len(), 2),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn cancelled_runs_stop() {
    let module = Module::new(&[("data/data.go", DATA)]);
    let mut locator = Locator::new(module.toolchain(), options(false));
    locator.add_functions(["example.com/m/data.Fn1$"]);
    let token = CancelToken::new();
    token.cancel();
    let err = locator.run(&token).unwrap_err();
    assert!(matches!(err, LocateError::Cancelled), "{err}");
}

#[test]
fn implementations_record_every_satisfied_interface() {
    let module = Module::new(&[("ifcs/ifcs.go", IFCS), ("impl/impl.go", IMPL12)]);
    let mut locator = Locator::new(module.toolchain(), options(false));
    locator
        .add_interfaces(["example.com/m/ifcs.Ifc[1234]$"])
        .add_packages(["example.com/m/impl"]);
    locator.run(&CancelToken::new()).unwrap();

    let mut interfaces = Vec::new();
    locator.walk_interfaces(|entry, _file, _pkg| interfaces.push(entry.name.clone()));
    assert_eq!(
        interfaces,
        vec![
            "example.com/m/ifcs.Ifc1",
            "example.com/m/ifcs.Ifc2",
            "example.com/m/ifcs.Ifc3",
            "example.com/m/ifcs.Ifc4",
        ]
    );

    let all = vec![
        "example.com/m/ifcs.Ifc1".to_string(),
        "example.com/m/ifcs.Ifc2".to_string(),
        "example.com/m/ifcs.Ifc3".to_string(),
    ];
    let found = functions(&locator);
    let names: Vec<&str> = found.iter().map(|f| f.0.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "(*example.com/m/impl.Impl12).M1",
            "(*example.com/m/impl.Impl12).M2",
            "(*example.com/m/impl.Impl12).M3",
        ]
    );
    for (name, _, _, implements) in &found {
        assert_eq!(implements, &all, "{name}");
    }

    assert_eq!(locator.hit_mask(&module.path("impl/impl.go")), HitMask::FUNCTION);
    assert_eq!(locator.hit_mask(&module.path("ifcs/ifcs.go")), HitMask::INTERFACE);
}

#[test]
fn implementations_merge_with_located_functions() {
    let module = Module::new(&[("ifcs/ifcs.go", IFCS), ("impl/impl.go", IMPL12)]);
    let mut locator = Locator::new(module.toolchain(), options(true));
    locator
        .add_interfaces(["example.com/m/ifcs.Ifc3$"])
        .add_functions(["example.com/m/impl.M1$"])
        .add_packages(["example.com/m/impl"]);
    locator.run(&CancelToken::new()).unwrap();

    // M1 is found both by name and as an implementation; every method of
    // Impl12 counts towards Ifc3.
    let found = functions(&locator);
    let names: Vec<&str> = found.iter().map(|f| f.0.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "(*example.com/m/impl.Impl12).M1",
            "(*example.com/m/impl.Impl12).M2",
            "(*example.com/m/impl.Impl12).M3",
        ]
    );
    for (name, _, _, implements) in &found {
        assert_eq!(implements, &vec!["example.com/m/ifcs.Ifc3".to_string()], "{name}");
    }
}

#[test]
fn embedded_local_interfaces_are_located() {
    let module = Module::new(&[("embed/embed.go", EMBED)]);
    let mut locator = Locator::new(module.toolchain(), options(false));
    locator.add_interfaces(["example.com/m/embed.IfcE$"]);
    locator.run(&CancelToken::new()).unwrap();

    let mut interfaces = Vec::new();
    locator.walk_interfaces(|entry, _file, _pkg| interfaces.push(entry.name.clone()));
    assert_eq!(
        interfaces,
        vec![
            "example.com/m/embed.IfcE",
            "example.com/m/embed.IfcE1",
            "example.com/m/embed.ifcE2",
        ]
    );
}

#[test]
fn interfaces_embedding_unnamed_packages_are_implemented() {
    let module = Module::new(&[
        ("rc/rc.go", RC),
        ("reader/reader.go", READER),
        ("sizer/sizer.go", SIZER),
        ("impl/file.go", FILE),
    ]);
    let mut locator = Locator::new(module.toolchain(), options(false));
    locator
        .add_interfaces(["example.com/m/rc.ReadCloser$"])
        .add_packages(["example.com/m/impl"]);
    locator.run(&CancelToken::new()).unwrap();

    let mut sets = Vec::new();
    locator.walk_interfaces(|entry, _file, _pkg| {
        sets.push(entry.method_set.as_ref().map(|s| s.keys().cloned().collect::<Vec<_>>()));
    });
    assert_eq!(sets, vec![Some(vec!["Close".to_string(), "Read".to_string(), "Size".to_string()])]);

    let found = functions(&locator);
    let names: Vec<&str> = found.iter().map(|f| f.0.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "(*example.com/m/impl.File).Read",
            "(*example.com/m/impl.File).Close",
            "(*example.com/m/impl.File).Size",
        ]
    );
    for (name, _, _, implements) in &found {
        assert_eq!(implements, &vec!["example.com/m/rc.ReadCloser".to_string()], "{name}");
    }

    let mut packages = Vec::new();
    locator.walk_packages(|pkg| packages.push(pkg.path.clone()));
    assert_eq!(packages, vec!["example.com/m/impl", "example.com/m/rc"]);
}

#[test]
fn walk_files_visits_files_with_hits_in_order() {
    let module = Module::new(&[
        ("notes/a.go", "package notes\n\n// marker: one\nfunc A() {}\n"),
        ("notes/b.go", "package notes\n\n// nothing here\nfunc B() {}\n"),
        ("notes/c.go", "package notes\n\nfunc C() {\n\t// marker: two\n}\n"),
        ("notes/d.go", "package notes\n\nfunc D() {}\n"),
    ]);
    let mut locator = Locator::new(module.toolchain(), options(false));
    locator
        .add_comments(["marker:"])
        .add_functions(["example.com/m/notes.D$"])
        .add_packages(["example.com/m/notes"]);
    locator.run(&CancelToken::new()).unwrap();

    let mut visited: Vec<(PathBuf, HitMask)> = Vec::new();
    locator.walk_files(|file, _pkg, mask| visited.push((file.path.clone(), mask)));
    assert_eq!(
        visited,
        vec![
            (module.path("notes/a.go"), HitMask::COMMENT),
            (module.path("notes/c.go"), HitMask::COMMENT),
            (module.path("notes/d.go"), HitMask::FUNCTION),
        ]
    );

    let mut all = Vec::new();
    locator.walk_all_files(|file, _pkg, mask| all.push((file.path.clone(), mask.is_empty())));
    assert_eq!(all.len(), 4);
    assert_eq!(all[1], (module.path("notes/b.go"), true));

    let mut comments = Vec::new();
    locator.walk_comments(|entry, _file, _pkg| {
        comments.push((entry.pattern.clone(), entry.position.line, entry.group.text()));
    });
    assert_eq!(
        comments,
        vec![
            ("marker:".to_string(), 3, "marker: one\n".to_string()),
            ("marker:".to_string(), 4, "marker: two\n".to_string()),
        ]
    );

    let mut packages = Vec::new();
    locator.walk_packages(|pkg| packages.push(pkg.path.clone()));
    assert_eq!(packages, vec!["example.com/m/notes"]);
}

#[test]
fn listing_expressions_expand_to_packages() {
    let module = Module::new(&[("data/data.go", DATA), ("ifcs/ifcs.go", IFCS)]);
    let mut locator = Locator::new(
        module.toolchain(),
        LocateOptions {
            ignore_missing: true,
            ..options(false)
        },
    );
    locator.add_functions(["./..."]);
    locator.run(&CancelToken::new()).unwrap();
    let names: Vec<String> = functions(&locator).into_iter().map(|f| f.0).collect();
    assert_eq!(names, vec!["example.com/m/data.Fn1", "example.com/m/data.Fn10"]);
}
