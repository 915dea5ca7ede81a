//! # tunnelvisor
//!
//! **Tunnelvisor** supervises an external tunnel core process per local listen
//! port. It keeps each endpoint alive, meters its traffic, cuts it over when a
//! quota is used up, and restarts it when its diagnostic stream reports a fatal
//! condition.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │  port 1080   │   │  port 1081   │   │  port 1082   │
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            ▼                  ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Supervisor                                                       │
//! │  - Bus (broadcast events)                                         │
//! │  - StatusTracker (endpoint phases, seq-ordered)                   │
//! │  - SubscriberSet (fans out to user subscribers)                   │
//! │  - UsageLedger (per-endpoint and grand byte totals)               │
//! │  - CredentialRotator (shared through TunnelConfig)                │
//! └──────┬──────────────────┬──────────────────┬──────────────────────┘
//!        ▼                  ▼                  ▼
//!   EndpointActor      EndpointActor      EndpointActor
//!   (launch loop)      (launch loop)      (launch loop)
//!        │
//!        ├─► Launcher::launch() ──► tunnel core process
//!        │                              │ stderr, one JSON notice per line
//!        └─► reader task ◄──────────────┘
//!              ├─ NoticeEvent::parse()
//!              ├─ UsageLedger + QuotaPolicy
//!              ├─ classify_alert() over ALERT_RULES
//!              └─ ProxyRegistry::register() at the desired tunnel count
//! ```
//!
//! ### Lifecycle of one endpoint
//! ```text
//! loop {
//!   ├─► Launching: reset ledger slice, rotate credential, write plan, spawn
//!   ├─► Running:   read notices until drain / end of stream / stop
//!   ├─► Draining:  wait for the process to exit on its own
//!   ├─► Backoff:   sleep (3 s by default, cancellable)
//!   └─► stop requested? → Stopped
//! }
//! setup fault (no diagnostic pipe) → EndpointDead, no retry
//! ```
//!
//! ## Features
//! | Area               | Description                                              | Key types                                   |
//! |--------------------|----------------------------------------------------------|---------------------------------------------|
//! | **Supervision**    | One restart loop per listen port, graceful stop          | [`Supervisor`], [`SupervisorBuilder`]       |
//! | **Credentials**    | Round-robin authorization tokens across launches         | [`CredentialRotator`]                       |
//! | **Usage**          | Byte totals per diagnostic id, endpoint and overall      | [`UsageLedger`], [`ledger::format_bytes`]   |
//! | **Notices**        | Tolerant parsing and ordered alert classification        | [`NoticeEvent`], [`notice::classify_alert`] |
//! | **Policies**       | Quota cutoff, restart delay                              | [`QuotaPolicy`], [`BackoffPolicy`]          |
//! | **Subscriber API** | Hook into runtime events                                 | [`Subscribe`], [`LogWriter`]                |
//! | **Launching**      | Launch plan, datastore seeding, process spawning         | [`Launcher`], [`ProcessLauncher`]           |
//! | **Configuration**  | TOML settings and runtime configs                        | [`Settings`], [`SupervisorConfig`]          |
//!
//! ## Example
//! ```rust,no_run
//! use std::sync::Arc;
//! use tunnelvisor::{LogWriter, ProxyPool, Settings, Supervisor};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (cfg, tunnel) = Settings::load("tunnelvisor.toml".as_ref())?.into_configs()?;
//!     let verbose = cfg.verbose;
//!
//!     let sup = Supervisor::builder(cfg, tunnel)
//!         .with_subscriber(Arc::new(LogWriter::new(verbose)))
//!         .with_registry(Arc::new(ProxyPool::new()))
//!         .build();
//!
//!     sup.run().await?;
//!     Ok(())
//! }
//! ```

mod config;
mod core;
mod credentials;
mod error;
mod events;
mod policies;
mod registry;
mod subscribers;

pub mod launch;
pub mod ledger;
pub mod notice;

// ---- Public re-exports ----

pub use config::{
    BackoffSettings, Settings, SupervisorConfig, SupervisorSettings, TunnelConfig, TunnelSettings,
    default_data_dir,
};
pub use crate::core::{EndpointPhase, EndpointStatus, StatusTracker, Supervisor, SupervisorBuilder};
pub use credentials::CredentialRotator;
pub use error::{ConfigError, LaunchError, RuntimeError};
pub use events::{Bus, Event, EventKind};
pub use launch::{LaunchPlan, LaunchRequest, Launched, Launcher, ProcessExit, ProcessLauncher};
pub use ledger::{EndpointUsage, TransferTotals, UsageLedger};
pub use notice::NoticeEvent;
pub use policies::{BYTES_PER_MB, BackoffPolicy, JitterPolicy, KEEPALIVE_RECEIVED_MAX, QuotaPolicy};
pub use registry::{NoopRegistry, ProxyPool, ProxyRegistry};
pub use subscribers::{LogWriter, Subscribe, SubscriberSet};
