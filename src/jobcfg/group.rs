//! Configuration groups: the unit of exchange with the scheduler.

use crate::jobcfg::Config;

/// A coherent batch of configs attributed to one source.
///
/// The consumer treats a group atomically: all configs previously
/// attributed to the same source are superseded by this batch. An
/// empty `configs` with a known source means "this source now produces
/// nothing", which is distinct from the source never having been seen.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Group {
    pub source: String,
    pub configs: Vec<Config>,
}

impl Group {
    pub fn new(source: impl Into<String>, configs: Vec<Config>) -> Self {
        Self { source: source.into(), configs }
    }

    /// An explicit retraction: the source exists (or existed) but
    /// defines no jobs anymore.
    pub fn empty(source: impl Into<String>) -> Self {
        Self { source: source.into(), configs: Vec::new() }
    }
}
