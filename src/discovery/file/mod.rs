//! File-based discovery: one-shot reads and a continuous watch.

pub mod parse;
pub mod read;
pub mod watch;

pub use read::Reader;
pub use watch::Watcher;

use std::fs;
use std::path::Path;

use crate::jobcfg::{Config, Group};

/// What loading one candidate file produced.
pub(crate) enum FileOutcome {
    /// The file parsed; the group carries zero or more stamped configs.
    Group(Group),
    /// The file is gone, not a regular file, or unreadable.
    Unreadable,
    /// The file exists but is not valid job YAML. Already logged.
    Malformed,
}

/// Load one file and stamp its configs with source and provider. The
/// stamp overwrites anything the file itself may have set for the
/// reserved keys.
pub(crate) fn load_group(path: &Path, provider: &str) -> FileOutcome {
    let meta = match fs::metadata(path) {
        Ok(meta) => meta,
        Err(e) => {
            tracing::debug!(source = %path.display(), error = %e, "stat failed");
            return FileOutcome::Unreadable;
        }
    };
    if !meta.is_file() {
        tracing::debug!(source = %path.display(), "not a regular file, skipping");
        return FileOutcome::Unreadable;
    }

    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            tracing::warn!(source = %path.display(), error = %e, "read failed");
            return FileOutcome::Unreadable;
        }
    };

    match parse::parse_document(&content) {
        Ok(configs) => FileOutcome::Group(stamp(path, configs, provider)),
        Err(e) => {
            tracing::error!(source = %path.display(), error = %e, "invalid job file");
            FileOutcome::Malformed
        }
    }
}

fn stamp(path: &Path, mut configs: Vec<Config>, provider: &str) -> Group {
    let source = path.display().to_string();
    for cfg in &mut configs {
        cfg.set_source(&source);
        cfg.set_provider(provider);
    }
    Group::new(source, configs)
}
