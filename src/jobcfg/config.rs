//! Job configuration value type and identity derivation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use sha2::{Digest, Sha256};

/// Reserved key naming the collector module a job belongs to.
pub const KEY_MODULE: &str = "module";

/// Reserved key holding the user-visible job name.
pub const KEY_NAME: &str = "name";

/// Reserved key recording where a config came from (file path or
/// synthesized dyncfg token).
pub const KEY_SOURCE: &str = "__source__";

/// Reserved key recording which provider produced a config.
pub const KEY_PROVIDER: &str = "__provider__";

/// Provider name stamped by the one-shot file discovery provider.
pub const PROVIDER_FILE_READER: &str = "file reader";

/// Provider name stamped by the filesystem watch provider.
pub const PROVIDER_FILE_WATCHER: &str = "file watcher";

/// Provider name stamped by the dynamic configuration controller.
pub const PROVIDER_DYNCFG: &str = "dyncfg";

/// Source prefix identifying jobs owned by the dynamic configuration
/// channel. Jobs whose source starts with this prefix are addressed by
/// their literal name, never by a content hash.
pub const DYNCFG_SOURCE_PREFIX: &str = "dyncfg/";

/// One job's configuration: a string-keyed mapping of YAML values.
///
/// Key order is irrelevant; the backing map is sorted so serialization
/// and hashing are deterministic. Unknown keys pass through untouched,
/// which keeps collector-specific fields intact on the way from a
/// config file to the scheduler.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Config(BTreeMap<String, Value>);

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw access to a value by key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Insert a raw value, replacing any previous one.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn module(&self) -> String {
        self.scalar(KEY_MODULE)
    }

    pub fn name(&self) -> String {
        self.scalar(KEY_NAME)
    }

    pub fn source(&self) -> String {
        self.scalar(KEY_SOURCE)
    }

    pub fn provider(&self) -> String {
        self.scalar(KEY_PROVIDER)
    }

    pub fn set_module(&mut self, module: &str) -> &mut Self {
        self.insert(KEY_MODULE, Value::from(module));
        self
    }

    pub fn set_name(&mut self, name: &str) -> &mut Self {
        self.insert(KEY_NAME, Value::from(name));
        self
    }

    pub fn set_source(&mut self, source: &str) -> &mut Self {
        self.insert(KEY_SOURCE, Value::from(source));
        self
    }

    pub fn set_provider(&mut self, provider: &str) -> &mut Self {
        self.insert(KEY_PROVIDER, Value::from(provider));
        self
    }

    /// Whether this config is owned by the dynamic configuration
    /// channel (source carries the dyncfg prefix).
    pub fn is_dyncfg(&self) -> bool {
        self.source().starts_with(DYNCFG_SOURCE_PREFIX)
    }

    /// Name combined with a stable content hash, used to disambiguate
    /// unnamed or name-colliding jobs from static sources.
    pub fn name_with_hash(&self) -> String {
        format!("{}_{}", self.name(), self.content_hash())
    }

    /// The job name used for addressing: the literal name for
    /// dyncfg-owned jobs, the hashed name for everything else.
    pub fn job_name(&self) -> String {
        if self.is_dyncfg() {
            self.name()
        } else {
            self.name_with_hash()
        }
    }

    /// Derived identity: `<module>_<job name>`.
    pub fn identity(&self) -> String {
        format!("{}_{}", self.module(), self.job_name())
    }

    /// Merge a defaults template into this config. Defaults fill only
    /// absent keys; values already set are never discarded.
    pub fn apply(&mut self, defaults: &Config) {
        for (key, value) in &defaults.0 {
            self.0.entry(key.clone()).or_insert_with(|| value.clone());
        }
    }

    /// Stable hash over all key/value pairs, hex-encoded. The map is
    /// sorted and the digest keyed by nothing, so the hash survives
    /// process restarts.
    fn content_hash(&self) -> String {
        let mut hasher = Sha256::new();
        for (key, value) in &self.0 {
            hasher.update(key.as_bytes());
            hasher.update([0]);
            hasher.update(scalar_to_string(value).as_bytes());
            hasher.update([0]);
        }
        let digest = hasher.finalize();
        digest[..8].iter().map(|b| format!("{b:02x}")).collect()
    }

    fn scalar(&self, key: &str) -> String {
        self.0.get(key).map(scalar_to_string).unwrap_or_default()
    }
}

impl FromIterator<(String, Value)> for Config {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Render a scalar value the way a user wrote it. User files carry
/// things like `name: 21` or `enabled: yes`; those must address the
/// same job as their quoted forms.
fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Null => String::new(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn yaml(doc: &str) -> Config {
        serde_yaml::from_str(doc).unwrap()
    }

    #[test]
    fn test_accessors_absent_keys() {
        let cfg = Config::new();
        assert_eq!(cfg.module(), "");
        assert_eq!(cfg.name(), "");
        assert_eq!(cfg.source(), "");
        assert_eq!(cfg.provider(), "");
    }

    #[test]
    fn test_non_string_scalars_stringified() {
        let cfg = yaml("module: nginx\nname: 21\nenabled: true");
        assert_eq!(cfg.name(), "21");
        assert_eq!(cfg.module(), "nginx");
    }

    #[test]
    fn test_setters_overwrite() {
        let mut cfg = yaml("__source__: sneaky\n__provider__: sneaky");
        cfg.set_source("/etc/jobs/nginx.yaml").set_provider(PROVIDER_FILE_READER);
        assert_eq!(cfg.source(), "/etc/jobs/nginx.yaml");
        assert_eq!(cfg.provider(), PROVIDER_FILE_READER);
    }

    #[test]
    fn test_identity_dyncfg_uses_literal_name() {
        let mut cfg = yaml("module: nginx\nname: web1");
        cfg.set_source("dyncfg/nginx/web1").set_provider(PROVIDER_DYNCFG);
        assert_eq!(cfg.identity(), "nginx_web1");
    }

    #[test]
    fn test_identity_file_job_uses_hash() {
        let mut cfg = yaml("module: nginx\nname: web1\nurl: http://localhost");
        cfg.set_source("/etc/jobs/nginx.yaml");
        let identity = cfg.identity();
        assert!(identity.starts_with("nginx_web1_"));
        assert_ne!(identity, "nginx_web1");
    }

    #[test]
    fn test_hash_stable_and_content_sensitive() {
        let a = yaml("module: nginx\nname: web\nurl: http://a");
        let b = yaml("url: http://a\nname: web\nmodule: nginx");
        let c = yaml("module: nginx\nname: web\nurl: http://b");
        assert_eq!(a.name_with_hash(), b.name_with_hash());
        assert_ne!(a.name_with_hash(), c.name_with_hash());
    }

    #[test]
    fn test_apply_fills_only_absent_keys() {
        let mut cfg = yaml("module: nginx\nupdate_every: 5");
        let defaults = yaml("update_every: 1\nautodetection_retry: 30");
        cfg.apply(&defaults);
        assert_eq!(cfg.scalar("update_every"), "5");
        assert_eq!(cfg.scalar("autodetection_retry"), "30");
    }

    #[test]
    fn test_unknown_keys_pass_through() {
        let cfg = yaml("module: nginx\ncustom_field: {nested: [1, 2]}");
        let out = serde_yaml::to_string(&cfg).unwrap();
        let back: Config = serde_yaml::from_str(&out).unwrap();
        assert_eq!(cfg, back);
    }
}
