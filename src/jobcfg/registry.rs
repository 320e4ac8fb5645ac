//! Read-only registry of collector modules.
//!
//! Collectors are external to this subsystem; what the dynamic
//! configuration controller needs from them is a JSON config schema
//! (served on `get_job_config_schema`) and a defaults template merged
//! into every job created through `set_job_config`.

use std::collections::BTreeMap;

use crate::jobcfg::Config;

/// Per-module data the controller can hand out.
#[derive(Debug, Clone, Default)]
pub struct ModuleInfo {
    /// JSON document describing the module's job config schema.
    pub schema: String,
    /// Defaults merged into jobs that do not set the keys themselves.
    pub defaults: Config,
}

/// Lookup of module name → schema and defaults. Built once at startup,
/// read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct ModuleRegistry {
    modules: BTreeMap<String, ModuleInfo>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, info: ModuleInfo) -> &mut Self {
        self.modules.insert(name.into(), info);
        self
    }

    pub fn lookup(&self, name: &str) -> Option<&ModuleInfo> {
        self.modules.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    /// Module names in stable order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.modules.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}
