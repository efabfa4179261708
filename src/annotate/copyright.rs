use super::{decode_options, AnnotateContext, AnnotateError, Annotation, CommonOptions, Factory, COMMON_FIELDS};
use crate::config::AnnotationConfig;
use crate::edit::{Delta, Edits};
use crate::go::comments::CommentGroup;
use crate::go::syntax::SourceFile;
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, info};

pub(super) const FACTORY: Factory = Factory {
    name: "copyright",
    summary: "an annotator that ensures that a copyright and license notice is
present at the top of all files. It will not remove existing notices.",
    fields: &[
        COMMON_FIELDS[0],
        COMMON_FIELDS[1],
        COMMON_FIELDS[2],
        COMMON_FIELDS[3],
        ("copyright", "desired copyright notice."),
        ("exclusions", "regular expressions for files to be excluded."),
        ("license", "desired license notice."),
        ("update_copyright", "set to true to update existing copyright notice."),
        ("update_license", "set to true to update existing license notice."),
    ],
    build,
};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct Options {
    #[serde(flatten)]
    common: CommonOptions,
    copyright: String,
    exclusions: Vec<String>,
    license: String,
    #[serde(alias = "updateCopyright")]
    update_copyright: bool,
    #[serde(alias = "updateLicense")]
    update_license: bool,
}

/// Ensures every file starts with a copyright notice and, optionally, a
/// license.
pub struct EnsureCopyright {
    name: String,
    options: Options,
    exclusions: Vec<Regex>,
}

fn build(config: &AnnotationConfig) -> Result<Box<dyn Annotation>, AnnotateError> {
    let options: Options = decode_options(&config.name, &config.options)?;
    let exclusions = options
        .exclusions
        .iter()
        .map(|pattern| {
            Regex::new(pattern).map_err(|source| AnnotateError::Pattern {
                name: config.name.clone(),
                pattern: pattern.clone(),
                source,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Box::new(EnsureCopyright {
        name: config.name.clone(),
        options,
        exclusions,
    }))
}

/// An existing header: the first comment holds the copyright, any further
/// comments in the group the license.
struct Header {
    copyright_len: usize,
    license: Option<(usize, usize)>,
}

/// The package documentation ends on the line right before `package`.
fn is_file_doc(file: &SourceFile, group: &CommentGroup) -> bool {
    let package_line = file.lines.line(file.package_clause.start);
    group.span.end <= file.package_clause.start && file.lines.line(group.span.end) + 1 == package_line
}

fn existing_header(file: &SourceFile) -> Option<Header> {
    let group = file
        .comments
        .iter()
        .find(|group| group.span.start == 0 && !is_file_doc(file, group))?;
    if !group.text().trim().to_lowercase().starts_with("copyright") {
        return None;
    }
    let first = group.comments.first()?;
    let license = group.comments.get(1).map(|second| {
        let start = second.span.start;
        (start, group.span.end - start)
    });
    Some(Header {
        copyright_len: first.span.len(),
        license,
    })
}

impl EnsureCopyright {
    fn deltas(&self, file: &SourceFile) -> Vec<Delta> {
        let copyright = format!("{}\n", self.options.copyright.trim_end_matches('\n'));
        let license = format!("{}\n\n", self.options.license.trim_end_matches('\n'));
        let mut deltas = Vec::new();
        match existing_header(file) {
            Some(header) => {
                if self.options.update_copyright {
                    deltas.push(Delta::replace(0, header.copyright_len + 1, copyright));
                }
                if let Some((start, len)) = header.license {
                    if !self.options.license.is_empty() && self.options.update_license {
                        deltas.push(Delta::replace(start, len, license));
                    }
                }
            }
            None => {
                deltas.push(Delta::insert(0, copyright));
                if !self.options.license.is_empty() {
                    deltas.push(Delta::insert(0, license));
                }
            }
        }
        deltas
    }
}

impl Annotation for EnsureCopyright {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &'static str {
        FACTORY.name
    }

    fn describe(&self) -> String {
        FACTORY.describe()
    }

    fn common(&self) -> &CommonOptions {
        &self.options.common
    }

    fn edits(&self, ctx: &AnnotateContext, packages: &[String]) -> Result<Edits, AnnotateError> {
        if self.options.copyright.is_empty() {
            return Err(AnnotateError::Invalid {
                name: self.name.clone(),
                message: "missing or empty copyright specified in the configuration file".to_string(),
            });
        }
        let mut locator = ctx.locator(&self.options.common, true);
        locator.add_packages(packages.iter().cloned());
        debug!(annotation = %self.name, "locating files to have a copyright/license annotation");
        locator.run(&ctx.cancel)?;

        let mut edits = Edits::new();
        locator.walk_all_files(|file, _pkg, _mask| {
            let name = file.path.to_string_lossy();
            if self.exclusions.iter().any(|re| re.is_match(&name)) {
                info!(file = %file.path.display(), "ignoring");
                return;
            }
            let deltas = self.deltas(&file.syntax);
            if !deltas.is_empty() {
                edits.insert(file.path.clone(), deltas);
            }
        });
        Ok(edits)
    }
}
