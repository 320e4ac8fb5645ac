//! Lifecycle management.
//!
//! # Data Flow
//! ```text
//! Shutdown (shutdown.rs):
//!     SIGTERM/SIGINT or stdin EOF → broadcast → providers drain & exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → trigger graceful shutdown
//!     SIGHUP → re-announce dyncfg state to the host
//! ```
//!
//! # Design Decisions
//! - One broadcast channel per event; every provider task subscribes
//! - Providers release their resources (watch descriptors) before
//!   returning

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
