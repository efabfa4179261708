use super::{addlogcall, copyright, describe_fields, rmlogcall, AnnotateError, Annotation};
use crate::config::AnnotationConfig;
use std::collections::BTreeMap;

/// Constructs an annotator type and describes its configuration.
#[derive(Clone, Copy)]
pub struct Factory {
    pub name: &'static str,
    pub summary: &'static str,
    /// `(field, description)` for every configuration field.
    pub fields: &'static [(&'static str, &'static str)],
    pub build: fn(&AnnotationConfig) -> Result<Box<dyn Annotation>, AnnotateError>,
}

impl Factory {
    pub fn describe(&self) -> String {
        describe_fields(self.summary, self.fields)
    }
}

/// Annotator types by name.
#[derive(Clone, Default)]
pub struct Registry {
    factories: BTreeMap<&'static str, Factory>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in annotator types.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(rmlogcall::FACTORY);
        registry.register(addlogcall::FACTORY);
        registry.register(copyright::FACTORY);
        registry
    }

    /// Registers `factory`, replacing any factory of the same name.
    pub fn register(&mut self, factory: Factory) -> &mut Self {
        self.factories.insert(factory.name, factory);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Factory> {
        self.factories.get(name)
    }

    /// Registered type names, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        self.factories.keys().copied().collect()
    }

    pub fn factories(&self) -> impl Iterator<Item = &Factory> {
        self.factories.values()
    }

    /// Builds the annotation configured by `config`.
    pub fn build(&self, config: &AnnotationConfig) -> Result<Box<dyn Annotation>, AnnotateError> {
        match self.factories.get(config.kind.as_str()) {
            Some(factory) => (factory.build)(config),
            None => Err(AnnotateError::UnknownType {
                kind: config.kind.clone(),
                suggestion: self.closest(&config.kind),
            }),
        }
    }

    fn closest(&self, kind: &str) -> Option<String> {
        self.factories
            .keys()
            .map(|name| (strsim::normalized_damerau_levenshtein(kind, name), *name))
            .filter(|(score, _)| *score >= 0.6)
            .max_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, name)| name.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_from_str;

    #[test]
    fn builtins_are_registered() {
        let registry = Registry::with_builtins();
        assert_eq!(registry.names(), vec!["addlogcall", "copyright", "rmlogcall"]);
        for factory in registry.factories() {
            let text = factory.describe();
            assert!(text.contains("  type "), "{}", factory.name);
            assert!(text.contains("  packages "), "{}", factory.name);
        }
    }

    #[test]
    fn unknown_types_suggest_the_closest_name() {
        let config = load_from_str("[[annotations]]\ntype = \"rmlogcal\"\nname = \"x\"\n").unwrap();
        let registry = Registry::with_builtins();
        let err = registry.build(&config.annotations[0]).err().unwrap();
        match err {
            AnnotateError::UnknownType { kind, suggestion } => {
                assert_eq!(kind, "rmlogcal");
                assert_eq!(suggestion.as_deref(), Some("rmlogcall"));
            }
            other => panic!("unexpected error: {other}"),
        }

        let config = load_from_str("[[annotations]]\ntype = \"zzz\"\nname = \"x\"\n").unwrap();
        let err = registry.build(&config.annotations[0]).err().unwrap();
        assert!(matches!(err, AnnotateError::UnknownType { suggestion: None, .. }));
    }

    #[test]
    fn builds_configured_annotations() {
        let config = load_from_str(
            r#"
[[annotations]]
type = "copyright"
name = "c"
copyright = "// Copyright 2024 Example"
packages = ["example.com/m/..."]
"#,
        )
        .unwrap();
        let annotation = Registry::with_builtins().build(&config.annotations[0]).unwrap();
        assert_eq!(annotation.name(), "c");
        assert_eq!(annotation.kind(), "copyright");
        assert_eq!(annotation.common().packages, vec!["example.com/m/..."]);
    }
}
