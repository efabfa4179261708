use serde::Deserialize;
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

/// Contents of a `goannotate.toml` file.
#[derive(Debug, Deserialize, Default, Clone)]
pub struct AnnotateConfig {
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub annotations: Vec<AnnotationConfig>,
}

impl AnnotateConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = Vec::new();

        if self.annotations.is_empty() {
            issues.push(ValidationIssue::EmptyAnnotationList);
        }

        let mut seen = BTreeSet::new();
        for annotation in &self.annotations {
            let name = annotation.name.trim();
            if name.is_empty() {
                issues.push(ValidationIssue::MissingField {
                    annotation: None,
                    field: "name",
                });
            } else if !seen.insert(name) {
                issues.push(ValidationIssue::DuplicateName(name.to_string()));
            }
            if annotation.kind.trim().is_empty() {
                issues.push(ValidationIssue::MissingField {
                    annotation: Some(annotation.name.clone()),
                    field: "type",
                });
            }
        }

        if self.settings.formatter.iter().any(|arg| arg.trim().is_empty()) {
            issues.push(ValidationIssue::InvalidSetting {
                field: "formatter",
                message: "program and arguments must not be empty".to_string(),
            });
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }

    pub fn annotation(&self, name: &str) -> Option<&AnnotationConfig> {
        self.annotations.iter().find(|a| a.name == name)
    }

    /// Configured annotation names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.annotations.iter().map(|a| a.name.as_str()).collect();
        names.sort_unstable();
        names
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Settings {
    /// Formatter program and arguments; empty leaves output unformatted.
    pub formatter: Vec<String>,
    /// Resolve packages from this module tree instead of running `go list`.
    pub module_root: Option<PathBuf>,
    /// Worker threads; 0 uses the available parallelism.
    pub concurrency: usize,
    /// Reject edits that introduce syntax errors.
    pub validate: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            formatter: vec!["goimports".to_string()],
            module_root: None,
            concurrency: 0,
            validate: false,
        }
    }
}

/// One `[[annotations]]` entry. Fields other than `type` and `name` belong
/// to the annotator and are decoded by it.
#[derive(Debug, Deserialize, Clone)]
pub struct AnnotationConfig {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    #[serde(flatten)]
    pub options: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, issue) in self.issues.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone)]
pub enum ValidationIssue {
    EmptyAnnotationList,
    MissingField {
        annotation: Option<String>,
        field: &'static str,
    },
    DuplicateName(String),
    InvalidSetting {
        field: &'static str,
        message: String,
    },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::EmptyAnnotationList => write!(f, "config contains no annotations"),
            ValidationIssue::MissingField { annotation, field } => match annotation {
                Some(name) => write!(f, "annotation '{name}' missing required field '{field}'"),
                None => write!(f, "annotation missing required field '{field}'"),
            },
            ValidationIssue::DuplicateName(name) => write!(f, "annotation '{name}' is defined more than once"),
            ValidationIssue::InvalidSetting { field, message } => {
                write!(f, "invalid setting '{field}': {message}")
            }
        }
    }
}
