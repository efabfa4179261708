//! Go module fixtures written to temporary directories.

use goannotate::toolchain::{ModuleLayout, Toolchain};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

pub const MODULE: &str = "example.com/m";

pub struct Module {
    dir: TempDir,
}

impl Module {
    /// Writes `go.mod` and `files`, given as `(relative path, contents)`.
    pub fn new(files: &[(&str, &str)]) -> Self {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("go.mod"), format!("module {MODULE}\n\ngo 1.21\n")).unwrap();
        for (name, contents) in files {
            let path = dir.path().join(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, contents).unwrap();
        }
        Self { dir }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn read(&self, name: &str) -> String {
        fs::read_to_string(self.path(name)).unwrap()
    }

    pub fn toolchain(&self) -> Arc<dyn Toolchain> {
        Arc::new(ModuleLayout::new(self.root()).unwrap())
    }
}

pub const DATA: &str = r#"package data

type rcv struct{}

func Fn1() {}

func (r *rcv) Fn1() {}

func Fn10() {}

func fn1() {}
"#;

pub const IFCS: &str = r#"package ifcs

type Ifc1 interface {
	M1()
	M2(int) error
}

type Ifc2 interface {
	M2(int) error
	M3() string
}

type Ifc3 interface {
	M1()
}

type Ifc4 interface {
	Other()
}

type Writer interface {
	Write([]byte) error
}
"#;

pub const IMPL12: &str = r#"package impl

type Impl12 struct{}

func (i *Impl12) M1() {}

func (i *Impl12) M2(int) error { return nil }

func (i *Impl12) M3() string { return "" }

func (i *Impl12) helper() {}
"#;

pub const EMBED: &str = r#"package embed

import "io"

type IfcE interface {
	IfcE1
	io.Reader
}

type IfcE1 interface {
	ifcE2
}

type ifcE2 interface {
	M()
}
"#;

pub const RC: &str = r#"package rc

import "example.com/m/reader"

type ReadCloser interface {
	reader.Reader
	Close() error
}
"#;

pub const READER: &str = r#"package reader

import "example.com/m/sizer"

type Reader interface {
	sizer.Sizer
	Read(p []byte) (n int, err error)
}
"#;

pub const SIZER: &str = r#"package sizer

type Sizer interface {
	Size() int64
}
"#;

pub const FILE: &str = r#"package impl

type File struct{}

func (f *File) Read(buf []byte) (int, error) { return 0, nil }

func (f *File) Close() error { return nil }

func (f *File) Size() int64 { return 0 }

type Half struct{}

func (h *Half) Read(buf []byte) (int, error) { return 0, nil }

func (h *Half) Close() error { return nil }
"#;

pub const LEGACY: &str = r#"package impl

import "example.com/m/apilog"

type Legacy struct{}

func (i *Legacy) Write(buf []byte) error {
	defer apilog.LogCallfLegacy(nil, "buf=%v...", buf)(nil, "") // gologcop: DO NOT EDIT, MUST BE FIRST STATEMENT
	return nil
}

func APILegacy(n int) error {
	defer apilog.LogCallfLegacy(nil, "n=%v...", n)(nil, "") // gologcop: DO NOT EDIT, MUST BE FIRST STATEMENT
	return nil
}

func APILegacyNonDefer(n int) error {
	apilog.LogCallfLegacy(nil, "n=%v...", n)(nil, "") // gologcop: DO NOT EDIT, MUST BE FIRST STATEMENT
	return nil
}
"#;

pub const EMPTY: &str = r#"package impl

type Empty struct{}

func (i *Empty) Write(buf []byte) error {
	return nil
}

func APIEmpty(n int) error {
	return nil
}
"#;

pub const EXISTING: &str = r#"package impl

import "example.com/m/apilog"

func APIExisting(n int) error {
	defer apilog.LogCallf(nil, "example.com/m/impl.APIExisting", "impl/existing.go:5", "n=%d", n)(nil, "_=?") // DO NOT EDIT, AUTO GENERATED BY addlogcall#add
	return nil
}

func APINew(n int) error {
	return nil
}

func APIEmptyFunc(n int) {
}
"#;
