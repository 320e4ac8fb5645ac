//! Agent configuration schema.

use serde::{Deserialize, Serialize};

/// Root configuration for the discovery agent.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AgentConfig {
    /// Plugin name announced to the host. Prefixes every config
    /// object id on the wire.
    pub name: String,

    /// Discovery provider settings.
    pub discovery: DiscoveryConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Which sources the file providers look at.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Glob patterns scanned once at startup.
    pub read: Vec<String>,

    /// Glob patterns watched continuously for changes.
    pub watch: Vec<String>,

    /// How often the watcher re-expands its patterns to pick up files
    /// the event stream missed.
    pub refresh_secs: u64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self { read: Vec::new(), watch: Vec::new(), refresh_secs: 60 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

impl AgentConfig {
    /// The plugin name, falling back to the crate name when unset.
    pub fn plugin_name(&self) -> &str {
        if self.name.is_empty() {
            env!("CARGO_PKG_NAME")
        } else {
            &self.name
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AgentConfig::default();
        assert_eq!(config.plugin_name(), "confstream");
        assert_eq!(config.discovery.refresh_secs, 60);
        assert!(!config.observability.metrics_enabled);
    }

    #[test]
    fn test_minimal_toml() {
        let config: AgentConfig =
            toml::from_str("[discovery]\nwatch = [\"/etc/jobs/*.yaml\"]\n").unwrap();
        assert_eq!(config.discovery.watch, vec!["/etc/jobs/*.yaml"]);
        assert!(config.discovery.read.is_empty());
        assert_eq!(config.observability.log_level, "info");
    }
}
