//! Launching the tunnel core.
//!
//! ```text
//! EndpointActor (Launching)
//!   ├─ datastore::seed_datastore()      once, before the first launch
//!   ├─ LaunchPlan::write()              <data_dir>/data/<port>/config.json
//!   └─ Launcher::launch(LaunchRequest)  → Launched { diagnostics, exit }
//! ```
//!
//! [`Launcher`] is the seam between supervision and the operating system:
//! [`ProcessLauncher`] spawns the real executable, tests plug in scripted launchers.

mod datastore;
mod plan;
mod process;

pub use datastore::{DATASTORE_RELATIVE_PATH, endpoint_dir, remove_data, seed_datastore};
pub use plan::{LaunchPlan, PROPAGATION_CHANNEL_ID, SPONSOR_ID};
pub use process::{
    DiagnosticStream, ExitFuture, LaunchRequest, Launched, Launcher, ProcessExit, ProcessLauncher,
};
