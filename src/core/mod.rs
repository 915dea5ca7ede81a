//! Runtime core: endpoint supervision.
//!
//! The public API from this module is [`Supervisor`] (built with
//! [`SupervisorBuilder`]) and the [`StatusTracker`] phase board it maintains.
//!
//! Internal modules:
//! - [`actor`]: the Launching → Running → Draining → Backoff loop of one endpoint;
//! - [`runner`]: one launch: plan, spawn, reader task, wait for exit;
//! - [`reader`]: diagnostic line loop, ledger updates, drain decisions;
//! - [`status`]: per-endpoint phase board;
//! - [`shutdown`]: OS stop signals;
//! - [`supervisor`]: one actor per endpoint, graceful stop.

mod actor;
mod builder;
mod reader;
mod runner;
mod shutdown;
mod status;
mod supervisor;

#[cfg(test)]
mod testing;

pub use builder::SupervisorBuilder;
pub use status::{EndpointPhase, EndpointStatus, StatusTracker};
pub use supervisor::Supervisor;
