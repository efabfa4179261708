//! Name specifications.
//!
//! A spec names a package and, optionally, a pattern for exported names in
//! it: `example.com/m/data.Fn1$`. A bare path means every name. Specs that
//! start with `./` or `../`, or that contain `...`, are listing expressions
//! and are expanded into package paths by the [`Toolchain`].

use crate::toolchain::{ListingError, Toolchain};
use regex::Regex;
use std::collections::BTreeSet;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SpecError {
    #[error("failed to compile regexp {pattern:?} in {spec:?}: {source}")]
    Pattern {
        spec: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("failed to compile regexp {pattern:?}: {source}")]
    Comment {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// A compiled spec: package path plus local name pattern.
#[derive(Debug, Clone)]
pub struct NameSpec {
    pub spec: String,
    pub path: String,
    pub pattern: Regex,
}

impl NameSpec {
    pub fn parse(spec: &str) -> Result<Self, SpecError> {
        let (path, pattern) = parse_path_and_pattern(spec);
        let compiled = Regex::new(&pattern).map_err(|source| SpecError::Pattern {
            spec: spec.to_string(),
            pattern: pattern.clone(),
            source,
        })?;
        Ok(Self {
            spec: spec.to_string(),
            path,
            pattern: compiled,
        })
    }

    pub fn matches(&self, name: &str) -> bool {
        self.pattern.is_match(name)
    }
}

pub fn is_listing_expression(spec: &str) -> bool {
    spec.starts_with("./") || spec.starts_with("../") || spec.contains("...")
}

/// Splits a spec at the first `.` of its last path element. Dots in earlier
/// elements (`example.com/`) belong to the path; a missing pattern means
/// `.*`.
pub fn parse_path_and_pattern(spec: &str) -> (String, String) {
    let last = spec.rfind('/').unwrap_or(0);
    match spec[last..].find('.') {
        Some(dot) => {
            let dot = last + dot;
            (spec[..dot].to_string(), spec[dot + 1..].to_string())
        }
        None => (spec.to_string(), ".*".to_string()),
    }
}

/// Expands the listing expressions among `specs` with one toolchain call and
/// merges the result with the literal specs.
pub fn expand_list_expressions(
    toolchain: &dyn Toolchain,
    specs: &[String],
) -> Result<Vec<String>, ListingError> {
    let (listing, mut expanded): (Vec<String>, Vec<String>) =
        specs.iter().cloned().partition(|s| is_listing_expression(s));
    if !listing.is_empty() {
        expanded.extend(toolchain.list(&listing)?);
    }
    Ok(dedup(expanded))
}

/// Sorted, duplicate-free copy of `items`.
pub fn dedup(items: impl IntoIterator<Item = String>) -> Vec<String> {
    items.into_iter().collect::<BTreeSet<_>>().into_iter().collect()
}

/// Compiles every spec, collecting all failures.
pub fn compile_all(specs: &[String]) -> Result<Vec<NameSpec>, Vec<SpecError>> {
    let mut compiled = Vec::with_capacity(specs.len());
    let mut errors = Vec::new();
    for spec in specs {
        match NameSpec::parse(spec) {
            Ok(s) => compiled.push(s),
            Err(e) => errors.push(e),
        }
    }
    if errors.is_empty() {
        Ok(compiled)
    } else {
        Err(errors)
    }
}

/// Compiles comment patterns, collecting all failures.
pub fn compile_comments(patterns: &[String]) -> Result<Vec<Regex>, Vec<SpecError>> {
    let mut compiled = Vec::with_capacity(patterns.len());
    let mut errors = Vec::new();
    for pattern in patterns {
        match Regex::new(pattern) {
            Ok(re) => compiled.push(re),
            Err(source) => errors.push(SpecError::Comment {
                pattern: pattern.clone(),
                source,
            }),
        }
    }
    if errors.is_empty() {
        Ok(compiled)
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Mutex;

    #[test]
    fn split_path_and_pattern() {
        let cases = [
            ("", "", ".*"),
            ("a", "a", ".*"),
            (".", "", ""),
            (".a", "", "a"),
            ("a.b", "a", "b"),
            ("a.com/b", "a.com/b", ".*"),
            ("/x/y/z/a.b", "/x/y/z/a", "b"),
            ("/x/y/z/a.", "/x/y/z/a", ""),
            ("/x/y/z/a..*", "/x/y/z/a", ".*"),
            ("/x/y/z/a.foo.*", "/x/y/z/a", "foo.*"),
        ];
        for (spec, path, pattern) in cases {
            assert_eq!(
                parse_path_and_pattern(spec),
                (path.to_string(), pattern.to_string()),
                "spec {spec:?}"
            );
        }
    }

    #[test]
    fn listing_expressions() {
        assert!(is_listing_expression("./..."));
        assert!(is_listing_expression("../x"));
        assert!(is_listing_expression("example.com/m/..."));
        assert!(!is_listing_expression("example.com/m/data.Fn1$"));
        assert!(!is_listing_expression(".Fn"));
    }

    #[test]
    fn invalid_pattern_is_reported() {
        let err = NameSpec::parse("example.com/m/data.(").unwrap_err();
        assert!(err.to_string().contains("failed to compile regexp"));
        let errs = compile_all(&["a.(".to_string(), "b.)".to_string(), "c".to_string()]).unwrap_err();
        assert_eq!(errs.len(), 2);
        assert_eq!(compile_comments(&["[".to_string()]).unwrap_err().len(), 1);
    }

    #[test]
    fn dedup_sorts_and_removes_duplicates() {
        let out = dedup(vec!["b".to_string(), "a".to_string(), "b".to_string()]);
        assert_eq!(out, vec!["a", "b"]);
    }

    struct Recorder(Mutex<Vec<Vec<String>>>);

    impl Toolchain for Recorder {
        fn list(&self, exprs: &[String]) -> Result<Vec<String>, ListingError> {
            self.0.lock().unwrap().push(exprs.to_vec());
            Ok(vec!["example.com/m/a".to_string(), "example.com/m/b".to_string()])
        }

        fn resolve(&self, _: &[String]) -> Result<Vec<crate::toolchain::ResolvedPackage>, ListingError> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn listing_specs_are_batched() {
        let recorder = Recorder(Mutex::new(Vec::new()));
        let specs = vec![
            "./...".to_string(),
            "example.com/m/a".to_string(),
            "example.com/m/c/...".to_string(),
        ];
        let out = expand_list_expressions(&recorder, &specs).unwrap();
        assert_eq!(out, vec!["example.com/m/a", "example.com/m/b"]);
        let calls = recorder.0.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0], vec!["./...", "example.com/m/c/..."]);
    }

    proptest! {
        #[test]
        fn split_round_trips(
            path in "[a-z]{1,8}(\\.[a-z]{2,3})?(/[a-z_]{1,8}){0,3}",
            pattern in "[A-Za-z0-9$^.*]{0,12}",
        ) {
            prop_assume!(!is_listing_expression(&path));
            // A dot in the last element would move the split point.
            let last = path.rsplit('/').next().unwrap_or_default();
            prop_assume!(!last.contains('.'));
            let spec = format!("{path}.{pattern}");
            let (p, r) = parse_path_and_pattern(&spec);
            prop_assert_eq!(&p, &path);
            prop_assert_eq!(&r, &pattern);
            prop_assert_eq!(format!("{p}.{r}"), spec);
        }
    }
}
