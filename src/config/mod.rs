//! Agent-level configuration.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → AgentConfig (validated, immutable)
//!     → provider constructors
//! ```
//!
//! # Design Decisions
//! - This is the configuration OF the providers, not the job configs
//!   they discover; job files are YAML and live in discovery::file
//! - All fields have defaults so a missing config file still runs
//! - CLI flags override file values

pub mod loader;
pub mod schema;

pub use loader::{load_config, ConfigError};
pub use schema::{AgentConfig, DiscoveryConfig, ObservabilityConfig};
