//! Format strings and arguments describing a function's parameters and
//! results, for generated logging calls.

use crate::go::syntax::{Param, Signature, TypeExpr};

enum Verb {
    Value(&'static str),
    Length,
    Opaque,
}

fn verb(ty: &TypeExpr) -> Verb {
    match ty {
        TypeExpr::Named(named) if named.package.is_none() && named.args.is_empty() => match named.name.as_str() {
            "int" | "int8" | "int16" | "int32" | "int64" | "uint" | "uint16" | "uint32" | "uint64" | "uintptr" => {
                Verb::Value("%d")
            }
            "float32" | "float64" | "complex64" | "complex128" => Verb::Value("%f"),
            "bool" => Verb::Value("%t"),
            "string" => Verb::Value("%.10s..."),
            "rune" => Verb::Value("%c"),
            "byte" | "uint8" => Verb::Value("%02x"),
            "error" => Verb::Value("%v"),
            _ => Verb::Opaque,
        },
        TypeExpr::Pointer(_) | TypeExpr::Chan { .. } | TypeExpr::Func(_) => Verb::Value("%p"),
        TypeExpr::Slice(_) | TypeExpr::Array { .. } | TypeExpr::Map { .. } => Verb::Length,
        _ => Verb::Opaque,
    }
}

fn describe(params: &[Param]) -> (String, Vec<String>) {
    let mut specs = Vec::with_capacity(params.len());
    let mut args = Vec::new();
    for param in params {
        let name = match param.name.as_deref() {
            Some(name) if name != "_" => name,
            _ => {
                specs.push("_=?".to_string());
                continue;
            }
        };
        let dots = if param.variadic { "..." } else { "" };
        let verb = if param.variadic { Verb::Length } else { verb(&param.ty) };
        match verb {
            Verb::Value(v) => {
                specs.push(format!("{name}={v}"));
                args.push(name.to_string());
            }
            Verb::Length => {
                specs.push(format!("{dots}{name}[:%d]=..."));
                args.push(format!("len({name})"));
            }
            Verb::Opaque => specs.push(format!("{name}=?")),
        }
    }
    (specs.join(", "), args)
}

/// Format and arguments for the parameters, without the first one when
/// `skip_first` is set.
pub fn args_for_params(sig: &Signature, skip_first: bool) -> (String, Vec<String>) {
    let start = usize::from(skip_first).min(sig.params.len());
    describe(&sig.params[start..])
}

pub fn args_for_results(sig: &Signature) -> (String, Vec<String>) {
    describe(&sig.results)
}

/// Type as written, for the simple shapes a context parameter can take.
pub fn type_text(ty: &TypeExpr) -> Option<String> {
    match ty {
        TypeExpr::Named(named) if named.args.is_empty() => Some(match &named.package {
            Some(pkg) => format!("{pkg}.{}", named.name),
            None => named.name.clone(),
        }),
        TypeExpr::Pointer(inner) => type_text(inner).map(|t| format!("*{t}")),
        _ => None,
    }
}

/// The name of the first parameter when its type is `context_type`.
/// An unnamed context parameter yields `Some(None)`.
pub fn context_param(sig: &Signature, context_type: &str) -> Option<Option<String>> {
    if context_type.is_empty() {
        return None;
    }
    let first = sig.params.first()?;
    if type_text(&first.ty).as_deref() != Some(context_type) {
        return None;
    }
    Some(first.name.clone().filter(|n| n != "_"))
}

/// `"format", arg1, arg2`.
pub fn flatten(format: &str, args: &[String]) -> String {
    let quoted = format!("\"{format}\"");
    if args.is_empty() {
        return quoted;
    }
    format!("{quoted}, {}", args.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::go::parser::GoParser;
    use crate::go::syntax::SourceFile;

    fn signatures(src: &str) -> Vec<Signature> {
        let mut parser = GoParser::new().unwrap();
        let file = SourceFile::parse(&mut parser, src).unwrap();
        file.functions().map(|f| f.signature.clone()).collect()
    }

    #[test]
    fn formats_parameters_and_results() {
        let sigs = signatures(
            r#"package p

import "context"

func A() {}
func B(a, b int, c float64) (ar int, err error) { return }
func C(a bool, b string, c rune, d byte) {}
func D(a *int, b chan int, c func()) {}
func E(a, b struct{}) {}
func F(int, string) (int, int) { return 0, 0 }
func G(a []int, b map[string]int, c [2]int) {}
func H(a int, b ...string) {}
func I(ctx context.Context, a int) {}
"#,
        );
        let params: Vec<(String, String)> = sigs
            .iter()
            .map(|s| {
                let (spec, args) = args_for_params(s, false);
                (spec, args.join(", "))
            })
            .collect();
        let want = [
            ("", ""),
            ("a=%d, b=%d, c=%f", "a, b, c"),
            ("a=%t, b=%.10s..., c=%c, d=%02x", "a, b, c, d"),
            ("a=%p, b=%p, c=%p", "a, b, c"),
            ("a=?, b=?", ""),
            ("_=?, _=?", ""),
            ("a[:%d]=..., b[:%d]=..., c[:%d]=...", "len(a), len(b), len(c)"),
            ("a=%d, ...b[:%d]=...", "a, len(b)"),
            ("ctx=?, a=%d", "a"),
        ];
        for (i, (got, want)) in params.iter().zip(want).enumerate() {
            assert_eq!((got.0.as_str(), got.1.as_str()), want, "function {i}");
        }

        let (spec, args) = args_for_results(&sigs[1]);
        assert_eq!(spec, "ar=%d, err=%v");
        assert_eq!(args, vec!["ar", "err"]);
        assert_eq!(args_for_results(&sigs[5]).0, "_=?, _=?");
    }

    #[test]
    fn context_detection() {
        let sigs = signatures(
            "package p\n\nimport \"context\"\n\nfunc A(ctx context.Context, a int) {}\nfunc B(a int) {}\nfunc C(_ context.Context) {}\n",
        );
        assert_eq!(context_param(&sigs[0], "context.Context"), Some(Some("ctx".to_string())));
        assert_eq!(context_param(&sigs[0], ""), None);
        assert_eq!(context_param(&sigs[1], "context.Context"), None);
        assert_eq!(context_param(&sigs[2], "context.Context"), Some(None));
        let (spec, args) = args_for_params(&sigs[0], true);
        assert_eq!(spec, "a=%d");
        assert_eq!(args, vec!["a"]);
    }

    #[test]
    fn flatten_quotes_format() {
        assert_eq!(flatten("", &[]), "\"\"");
        assert_eq!(flatten("n=%d", &["n".to_string()]), "\"n=%d\", n");
    }
}
