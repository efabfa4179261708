use super::{CommentEntry, Discovery, HitMask, LocateError, Locator};
use crate::loader::FileRecord;
use rayon::prelude::*;
use regex::Regex;
use tracing::debug;

impl Locator {
    /// Matches every comment group attached to a node in a loaded file
    /// against each pattern.
    pub(super) fn find_comments(&self, discovery: &Discovery<'_>, patterns: &[Regex]) -> Result<(), LocateError> {
        if patterns.is_empty() {
            return Ok(());
        }
        self.loader.files().par_iter().try_for_each(|file| {
            discovery.check()?;
            let found = match_comments(file, patterns);
            if found.is_empty() {
                return Ok(());
            }
            debug!(file = %file.path.display(), matches = found.len(), "comments");
            let mut index = self.lock();
            index.mark(&file.path, HitMask::COMMENT);
            for entry in found {
                index.comments.entry(entry.pattern.clone()).or_default().push(entry);
            }
            Ok(())
        })
    }
}

fn match_comments(file: &FileRecord, patterns: &[Regex]) -> Vec<CommentEntry> {
    let mut found = Vec::new();
    for (node, groups) in file.comments.iter() {
        for group in groups {
            let text = group.text();
            for re in patterns.iter().filter(|re| re.is_match(&text)) {
                found.push(CommentEntry {
                    pattern: re.as_str().to_string(),
                    group: group.clone(),
                    node: *node,
                    package: file.package.clone(),
                    position: file.position(group.span.start),
                });
            }
        }
    }
    found
}
