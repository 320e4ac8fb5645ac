//! Job configuration model.
//!
//! # Data Flow
//! ```text
//! provider (file read / file watch / dyncfg)
//!     → Config (string-keyed YAML values, reserved identity keys)
//!     → Group (batch of configs sharing one source)
//!     → shared output channel
//!     → external job scheduler
//! ```
//!
//! # Design Decisions
//! - Configs are replaced whole, never patched field-by-field
//! - Identity is derived from content, not stored
//! - Unknown keys pass through untouched for collector-specific fields

pub mod config;
pub mod group;
pub mod registry;

pub use config::Config;
pub use group::Group;
pub use registry::{ModuleInfo, ModuleRegistry};
