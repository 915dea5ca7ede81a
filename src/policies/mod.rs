//! Relaunch and quota policies.
//!
//! This module groups the knobs that decide **when** an endpoint stops consuming
//! diagnostics and **how long** it waits before launching again.
//!
//! ## Contents
//! - [`QuotaPolicy`]   cutoff once an endpoint's usage reaches its limit
//! - [`BackoffPolicy`] delay between a process exit and the next launch
//! - [`JitterPolicy`]  randomization applied to that delay
//!
//! ## Quick wiring
//! ```text
//! EndpointActor
//!   ├─ reader: QuotaPolicy::should_continue(all, sent, received) → drain on false
//!   └─ after exit: BackoffPolicy::next(streak) → sleep (cancellable)
//! ```

mod backoff;
mod jitter;
mod quota;

pub use backoff::BackoffPolicy;
pub use jitter::JitterPolicy;
pub use quota::{BYTES_PER_MB, KEEPALIVE_RECEIVED_MAX, QuotaPolicy};
