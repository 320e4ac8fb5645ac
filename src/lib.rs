//! Job configuration discovery library.
//!
//! Collects job configurations from files, a filesystem watch, and a
//! runtime command channel, and reconciles them into one stream of
//! configuration groups for an external job scheduler.

pub mod config;
pub mod discovery;
pub mod jobcfg;
pub mod lifecycle;
pub mod observability;
pub mod protocol;

pub use discovery::dyncfg::DyncfgController;
pub use discovery::file::{Reader, Watcher};
pub use jobcfg::{Config, Group, ModuleInfo, ModuleRegistry};
pub use lifecycle::Shutdown;
pub use protocol::{FunctionRouter, HostApi, LineApi};
