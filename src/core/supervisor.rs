//! # Supervisor: one endpoint actor per listen port, fan-out delivery and graceful stop.
//!
//! The [`Supervisor`] owns the event bus, the shared [`UsageLedger`], the
//! [`StatusTracker`] and the root [`CancellationToken`]. It spawns one
//! [`EndpointActor`] per configured port and waits for them.
//!
//! ## High-level architecture
//! ```text
//! run():
//!   subscriber_listener(): Bus.subscribe() ─► StatusTracker::update() ─► SubscriberSet::emit()
//!
//!   listen_ports[0]   listen_ports[1]   ...
//!        │                 │
//!        └──► EndpointActor::run(root.child_token())      (one per port)
//!
//! Stop path:
//!   stop() or OS signal
//!        └─► Bus.publish(ShutdownRequested)
//!        └─► root.cancel()          → readers stop, no relaunch
//!        └─► wait_all_with_grace(cfg.grace):
//!               ├─ all actors joined → AllStoppedWithin, Ok
//!               └─ timeout           → GraceExceeded, Err(stuck ports)
//!
//! All actors ended without a stop → every endpoint hit a setup fault → EndpointsFailed
//! ```
//!
//! A supervisor runs once; after `run` returns it stays stopped.
//!
//! ## Example
//! ```rust,no_run
//! use std::sync::Arc;
//! use tunnelvisor::{LogWriter, ProxyPool, Supervisor, SupervisorConfig, TunnelConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cfg = SupervisorConfig {
//!         listen_ports: vec![1080, 1081],
//!         ..SupervisorConfig::default()
//!     };
//!     let pool = Arc::new(ProxyPool::new());
//!
//!     let sup = Supervisor::builder(cfg, TunnelConfig::default())
//!         .with_subscriber(Arc::new(LogWriter::new(false)))
//!         .with_registry(pool.clone())
//!         .build();
//!
//!     sup.run().await?;
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::{SupervisorConfig, TunnelConfig};
use crate::core::actor::{ActorExit, ActorParams, EndpointActor};
use crate::core::builder::SupervisorBuilder;
use crate::core::shutdown;
use crate::core::status::StatusTracker;
use crate::error::RuntimeError;
use crate::events::{Bus, Event, EventKind};
use crate::launch::Launcher;
use crate::ledger::UsageLedger;
use crate::registry::ProxyRegistry;
use crate::subscribers::{Subscribe, SubscriberSet};

/// Coordinates endpoint actors, event delivery and graceful stop.
pub struct Supervisor {
    cfg: SupervisorConfig,
    tunnel: TunnelConfig,
    bus: Bus,
    subscribers: Vec<Arc<dyn Subscribe>>,
    status: Arc<StatusTracker>,
    ledger: Arc<UsageLedger>,
    launcher: Arc<dyn Launcher>,
    registry: Arc<dyn ProxyRegistry>,
    token: CancellationToken,
    handle_signals: bool,
}

impl Supervisor {
    /// Starts building a supervisor.
    pub fn builder(cfg: SupervisorConfig, tunnel: TunnelConfig) -> SupervisorBuilder {
        SupervisorBuilder::new(cfg, tunnel)
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new_internal(
        cfg: SupervisorConfig,
        tunnel: TunnelConfig,
        subscribers: Vec<Arc<dyn Subscribe>>,
        launcher: Arc<dyn Launcher>,
        registry: Arc<dyn ProxyRegistry>,
        ledger: Arc<UsageLedger>,
        handle_signals: bool,
    ) -> Self {
        Self {
            bus: Bus::new(cfg.bus_capacity),
            cfg,
            tunnel,
            subscribers,
            status: Arc::new(StatusTracker::new()),
            ledger,
            launcher,
            registry,
            token: CancellationToken::new(),
            handle_signals,
        }
    }

    /// Supervises every configured endpoint until stopped.
    ///
    /// Returns:
    /// - `Ok(())` after a stop once every endpoint exited within grace;
    /// - [`RuntimeError::GraceExceeded`] when some tunnel core outlived the grace
    ///   period (remaining actors are aborted, which kills their processes);
    /// - [`RuntimeError::EndpointsFailed`] when every endpoint hit a setup fault.
    pub async fn run(&self) -> Result<(), RuntimeError> {
        let listener_stop = CancellationToken::new();
        let listener = self.subscriber_listener(listener_stop.clone());

        let mut set = JoinSet::new();
        self.spawn_actors(&mut set);
        let res = self.drive_shutdown(&mut set).await;

        set.abort_all();
        listener_stop.cancel();
        let _ = listener.await;
        res
    }

    /// Requests a stop: readers halt, nothing is relaunched, running processes
    /// are left to exit on their own.
    pub fn stop(&self) {
        if self.token.is_cancelled() {
            return;
        }
        self.bus.publish(Event::new(EventKind::ShutdownRequested));
        self.token.cancel();
    }

    /// True once a stop was requested.
    pub fn is_stopping(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Usage counters of all endpoints.
    pub fn ledger(&self) -> &Arc<UsageLedger> {
        &self.ledger
    }

    /// Phase board of all endpoints.
    pub fn status(&self) -> &Arc<StatusTracker> {
        &self.status
    }

    /// Event bus; subscribe for raw runtime events.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.cfg
    }

    /// Forwards bus events to the status board and subscribers until `stop`,
    /// then flushes what is left and drains subscriber queues.
    fn subscriber_listener(&self, stop: CancellationToken) -> JoinHandle<()> {
        let mut rx = self.bus.subscribe();
        let set = SubscriberSet::new(self.subscribers.clone(), self.bus.clone());
        let status = Arc::clone(&self.status);

        tokio::spawn(async move {
            let deliver = |ev: &Event| {
                status.update(ev);
                set.emit(ev);
            };
            loop {
                tokio::select! {
                    biased;
                    msg = rx.recv() => match msg {
                        Ok(ev) => deliver(&ev),
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(skipped, "event listener lagged");
                        }
                        Err(RecvError::Closed) => break,
                    },
                    _ = stop.cancelled() => {
                        loop {
                            match rx.try_recv() {
                                Ok(ev) => deliver(&ev),
                                Err(TryRecvError::Lagged(_)) => continue,
                                Err(_) => break,
                            }
                        }
                        break;
                    }
                }
            }
            set.shutdown().await;
        })
    }

    fn spawn_actors(&self, set: &mut JoinSet<(u16, ActorExit)>) {
        let params = ActorParams::from(&self.cfg);
        for &port in &self.cfg.listen_ports {
            let actor = EndpointActor {
                port,
                tunnel: self.tunnel.clone(),
                params: params.clone(),
                launcher: Arc::clone(&self.launcher),
                ledger: Arc::clone(&self.ledger),
                registry: Arc::clone(&self.registry),
                bus: self.bus.clone(),
            };
            let child = self.token.child_token();
            set.spawn(async move { (port, actor.run(child).await) });
        }
    }

    /// Waits until either every actor ends on its own or a stop arrives.
    async fn drive_shutdown(
        &self,
        set: &mut JoinSet<(u16, ActorExit)>,
    ) -> Result<(), RuntimeError> {
        let mut dead = Vec::new();
        let all_ended = tokio::select! {
            biased;
            _ = self.stop_trigger() => false,
            _ = join_all(set, &mut dead) => true,
        };

        if !all_ended {
            return self.wait_all_with_grace(set).await;
        }
        if dead.is_empty() {
            return Ok(());
        }
        dead.sort_unstable();
        Err(RuntimeError::EndpointsFailed { ports: dead })
    }

    /// Completes on [`Supervisor::stop`] or, when enabled, an OS stop signal.
    async fn stop_trigger(&self) {
        let signal = async {
            if !self.handle_signals {
                return std::future::pending::<()>().await;
            }
            match shutdown::wait_for_stop_signal().await {
                Ok(name) => info!(signal = name, "stop signal received"),
                Err(e) => {
                    warn!(error = %e, "cannot install signal handlers");
                    std::future::pending::<()>().await
                }
            }
        };
        tokio::select! {
            _ = self.token.cancelled() => {}
            _ = signal => self.stop(),
        }
    }

    /// Waits for all actors within the configured grace period.
    async fn wait_all_with_grace(
        &self,
        set: &mut JoinSet<(u16, ActorExit)>,
    ) -> Result<(), RuntimeError> {
        let grace = self.cfg.grace;
        let done = async { while set.join_next().await.is_some() {} };

        match tokio::time::timeout(grace, done).await {
            Ok(()) => {
                self.bus.publish(Event::new(EventKind::AllStoppedWithin));
                Ok(())
            }
            Err(_) => {
                self.bus.publish(Event::new(EventKind::GraceExceeded));
                let stuck = self.status.active_ports();
                Err(RuntimeError::GraceExceeded { grace, stuck })
            }
        }
    }
}

/// Joins every actor, collecting ports whose supervision died.
async fn join_all(set: &mut JoinSet<(u16, ActorExit)>, dead: &mut Vec<u16>) {
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((port, ActorExit::Dead(_))) => dead.push(port),
            Ok((_, ActorExit::Stopped)) => {}
            Err(e) => warn!(error = %e, "endpoint actor task failed"),
        }
    }
}
