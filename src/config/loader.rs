use crate::config::schema::{AnnotateConfig, ValidationError};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Toml {
        path: Option<PathBuf>,
        source: toml_edit::de::Error,
    },
    Validation {
        path: Option<PathBuf>,
        source: ValidationError,
    },
}

impl ConfigError {
    fn with_path(self, path: &Path) -> Self {
        let path = path.to_path_buf();
        match self {
            ConfigError::Toml { path: None, source } => ConfigError::Toml {
                path: Some(path),
                source,
            },
            ConfigError::Validation { path: None, source } => ConfigError::Validation {
                path: Some(path),
                source,
            },
            other => other,
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(f, "failed to read config from {}: {}", path.display(), source)
            }
            ConfigError::Toml { path, source } => match path {
                Some(path) => write!(f, "failed to parse config TOML ({}): {}", path.display(), source),
                None => write!(f, "failed to parse config TOML: {}", source),
            },
            ConfigError::Validation { path, source } => match path {
                Some(path) => write!(f, "invalid config ({}): {}", path.display(), source),
                None => write!(f, "invalid config: {}", source),
            },
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Toml { source, .. } => Some(source),
            ConfigError::Validation { source, .. } => Some(source),
        }
    }
}

pub fn load_from_str(input: &str) -> Result<AnnotateConfig, ConfigError> {
    let config: AnnotateConfig =
        toml_edit::de::from_str(input).map_err(|source| ConfigError::Toml { path: None, source })?;
    config
        .validate()
        .map_err(|source| ConfigError::Validation { path: None, source })?;
    Ok(config)
}

/// Loads a config file. A relative `module_root` is taken relative to the
/// directory holding the file.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<AnnotateConfig, ConfigError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut config = load_from_str(&contents).map_err(|error| error.with_path(path))?;
    if let (Some(root), Some(dir)) = (config.settings.module_root.as_mut(), path.parent()) {
        if root.is_relative() {
            *root = dir.join(&*root);
        }
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
[settings]
formatter = []
module_root = "."

[[annotations]]
type = "rmlogcall"
name = "rmlegacy"
packages = ["example.com/m/impl"]
function_name_re = "apilog.LogCallfLegacy"
comment = "gologcop: DO NOT EDIT"
deferred = true

[[annotations]]
type = "copyright"
name = "copyright"
copyright = "// Copyright 2024 Example"
"#;

    #[test]
    fn parses_settings_and_annotations() {
        let config = load_from_str(CONFIG).unwrap();
        assert!(config.settings.formatter.is_empty());
        assert_eq!(config.names(), vec!["copyright", "rmlegacy"]);
        let rm = config.annotation("rmlegacy").unwrap();
        assert_eq!(rm.kind, "rmlogcall");
        assert_eq!(rm.options["deferred"], serde_json::Value::Bool(true));
        assert!(!rm.options.contains_key("name"));
    }

    #[test]
    fn defaults_use_goimports() {
        let config = load_from_str("[[annotations]]\ntype = \"copyright\"\nname = \"c\"\n").unwrap();
        assert_eq!(config.settings.formatter, vec!["goimports"]);
        assert_eq!(config.settings.concurrency, 0);
        assert!(config.settings.module_root.is_none());
    }

    #[test]
    fn validation_collects_issues() {
        let err = load_from_str(
            "[[annotations]]\ntype = \"\"\nname = \"a\"\n[[annotations]]\ntype = \"copyright\"\nname = \"a\"\n",
        )
        .unwrap_err();
        let ConfigError::Validation { source, .. } = &err else {
            panic!("unexpected error: {err}");
        };
        assert_eq!(source.issues.len(), 2);
        assert!(err.to_string().contains("defined more than once"));

        assert!(matches!(load_from_str(""), Err(ConfigError::Validation { .. })));
        assert!(matches!(load_from_str("[[annotations]]\nname = 1"), Err(ConfigError::Toml { .. })));
    }

    #[test]
    fn relative_module_root_follows_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("goannotate.toml");
        fs::write(&path, CONFIG).unwrap();
        let config = load_from_path(&path).unwrap();
        assert_eq!(config.settings.module_root.unwrap(), dir.path().join("."));

        let missing = load_from_path(dir.path().join("missing.toml")).unwrap_err();
        assert!(missing.to_string().starts_with("failed to read config from"));
    }
}
