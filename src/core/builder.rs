//! # SupervisorBuilder: wiring collaborators into a [`Supervisor`].
//!
//! Defaults:
//! - launcher: [`ProcessLauncher`] (spawns the real tunnel core)
//! - registry: [`NoopRegistry`]
//! - ledger: a fresh [`UsageLedger`]
//! - OS signal handling: on

use std::sync::Arc;

use crate::config::{SupervisorConfig, TunnelConfig};
use crate::core::supervisor::Supervisor;
use crate::launch::{Launcher, ProcessLauncher};
use crate::ledger::UsageLedger;
use crate::registry::{NoopRegistry, ProxyRegistry};
use crate::subscribers::Subscribe;

/// Builder for [`Supervisor`].
pub struct SupervisorBuilder {
    cfg: SupervisorConfig,
    tunnel: TunnelConfig,
    subscribers: Vec<Arc<dyn Subscribe>>,
    launcher: Option<Arc<dyn Launcher>>,
    registry: Option<Arc<dyn ProxyRegistry>>,
    ledger: Option<Arc<UsageLedger>>,
    handle_signals: bool,
}

impl SupervisorBuilder {
    /// Creates a new builder.
    pub fn new(cfg: SupervisorConfig, tunnel: TunnelConfig) -> Self {
        Self {
            cfg,
            tunnel,
            subscribers: Vec::new(),
            launcher: None,
            registry: None,
            ledger: None,
            handle_signals: true,
        }
    }

    /// Replaces the event subscribers.
    ///
    /// Each subscriber gets a dedicated worker with a bounded queue.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Adds one event subscriber.
    pub fn with_subscriber(mut self, subscriber: Arc<dyn Subscribe>) -> Self {
        self.subscribers.push(subscriber);
        self
    }

    /// Sets how tunnel cores are started.
    pub fn with_launcher(mut self, launcher: Arc<dyn Launcher>) -> Self {
        self.launcher = Some(launcher);
        self
    }

    /// Sets where connected endpoints are announced.
    pub fn with_registry(mut self, registry: Arc<dyn ProxyRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Shares an existing usage ledger (e.g. one read by a display).
    pub fn with_ledger(mut self, ledger: Arc<UsageLedger>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    /// Whether SIGINT/SIGTERM/SIGQUIT/SIGHUP (Ctrl-C elsewhere) trigger a stop.
    pub fn with_signal_handling(mut self, enabled: bool) -> Self {
        self.handle_signals = enabled;
        self
    }

    /// Builds the supervisor. Nothing runs until [`Supervisor::run`].
    pub fn build(self) -> Supervisor {
        Supervisor::new_internal(
            self.cfg,
            self.tunnel,
            self.subscribers,
            self.launcher.unwrap_or_else(|| Arc::new(ProcessLauncher)),
            self.registry.unwrap_or_else(|| Arc::new(NoopRegistry)),
            self.ledger.unwrap_or_else(|| Arc::new(UsageLedger::new())),
            self.handle_signals,
        )
    }
}
