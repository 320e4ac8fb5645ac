//! One-shot file discovery.

use std::collections::HashSet;
use std::path::PathBuf;

use crate::discovery::file::{load_group, FileOutcome};
use crate::discovery::GroupSender;
use crate::jobcfg::config::PROVIDER_FILE_READER;
use crate::jobcfg::Group;
use crate::observability::metrics;

/// Expands glob patterns once, parses every match, emits one batch of
/// groups, and terminates.
pub struct Reader {
    patterns: Vec<String>,
    out: GroupSender,
}

impl Reader {
    pub fn new(patterns: &[String], out: GroupSender) -> Self {
        Self { patterns: patterns.to_vec(), out }
    }

    pub async fn run(self) {
        let groups = self.discover();
        tracing::info!(groups = groups.len(), "file discovery finished");
        metrics::record_discovery(PROVIDER_FILE_READER, groups.len());

        if !groups.is_empty() && self.out.send(groups).is_err() {
            tracing::warn!("output channel closed, discarding discovered groups");
        }
    }

    fn discover(&self) -> Vec<Group> {
        let mut seen: HashSet<PathBuf> = HashSet::new();
        let mut groups = Vec::new();

        for pattern in &self.patterns {
            let paths = match glob::glob(pattern) {
                Ok(paths) => paths,
                Err(e) => {
                    tracing::warn!(pattern, error = %e, "bad glob pattern");
                    continue;
                }
            };

            for entry in paths {
                let path = match entry {
                    Ok(path) => path,
                    Err(e) => {
                        tracing::warn!(pattern, error = %e, "glob entry unreadable");
                        continue;
                    }
                };
                if !seen.insert(path.clone()) {
                    continue;
                }
                match load_group(&path, PROVIDER_FILE_READER) {
                    FileOutcome::Group(group) => groups.push(group),
                    // one bad file must not abort discovery of the rest
                    FileOutcome::Unreadable | FileOutcome::Malformed => {}
                }
            }
        }

        groups
    }
}
