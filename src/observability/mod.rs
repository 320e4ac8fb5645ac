//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events, stderr)
//!     → metrics.rs (discovery and command counters)
//!
//! Consumers:
//!     → host process log collection (stderr)
//!     → optional Prometheus scrape endpoint
//! ```
//!
//! # Design Decisions
//! - Logs go to stderr: stdout belongs to the host wire protocol
//! - Metric updates are cheap atomic increments
//! - The exporter is opt-in; counters are recorded either way

pub mod logging;
pub mod metrics;
