//! Configuration discovery providers.
//!
//! # Data Flow
//! ```text
//! file/read.rs   (one-shot glob scan)          ┐
//! file/watch.rs  (filesystem event stream)     ├─→ Vec<Group> → shared
//! dyncfg.rs      (runtime command channel)     ┘    output channel
//! ```
//!
//! # Design Decisions
//! - Providers run as independent tasks and never talk to each other
//! - The shared channel only ever carries valid groups; failures are
//!   logged and the affected source is omitted from that round
//! - Every emitted config is stamped with its source and provider

pub mod dyncfg;
pub mod file;

use tokio::sync::mpsc;

use crate::jobcfg::Group;

/// Sending half of the shared provider output channel.
pub type GroupSender = mpsc::UnboundedSender<Vec<Group>>;

/// Receiving half, held by the external job scheduler.
pub type GroupReceiver = mpsc::UnboundedReceiver<Vec<Group>>;

/// Create the shared output channel.
pub fn group_channel() -> (GroupSender, GroupReceiver) {
    mpsc::unbounded_channel()
}
