//! Host wire protocol.
//!
//! # Data Flow
//! ```text
//! Outbound (api.rs):
//!     CONFIG create/delete/status frames, function results
//!     → line-oriented frames on the host's output stream
//!
//! Inbound (function.rs):
//!     FUNCTION / FUNCTION_PAYLOAD frames on the input stream
//!     → decoded Function { name, uid, args, payload }
//!     → registered handler, one at a time
//! ```
//!
//! # Design Decisions
//! - Every outbound frame ends with a blank line; the host parses
//!   line-by-line, so payloads must never contain raw newlines
//! - Business failures travel as reject results, never as transport
//!   errors
//! - Handler dispatch is serialized by the read loop

pub mod api;
pub mod function;

pub use api::{error_payload, HostApi, JobStatus, JobType, LineApi};
pub use function::{Function, FunctionRegistry, FunctionRouter, Handler};
