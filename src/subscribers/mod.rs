//! # Event subscribers for the tunnelvisor runtime.
//!
//! ## Architecture
//! ```text
//!   EndpointActor ── publish(Event) ──► Bus ──► Supervisor listener
//!                                                  │
//!                                                  ├──► StatusTracker (phase board)
//!                                                  └──► SubscriberSet
//!                                                          ├──► LogWriter
//!                                                          └──► custom …
//! ```

mod log;
mod set;
mod subscriber;

pub use log::LogWriter;
pub use set::SubscriberSet;
pub use subscriber::Subscribe;
