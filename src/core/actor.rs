//! # EndpointActor: supervision loop of one listen endpoint.
//!
//! ```text
//!            ┌──────────────────────────────────────────────┐
//!            ▼                                              │
//! Launching ──► Running ──► Draining ──► (process exit) ──► Backoff
//!     │            │                          ▲               │
//!     │            └──── stream ends ─────────┘               │ stop
//!     │ setup fault                                           ▼
//!     └──────────► EndpointDead                            Stopped
//! ```
//!
//! ## Event flow
//! ```text
//! LaunchStarting → ProcessSpawned → [TunnelActivated…, EndpointConnected, UsageUpdated…]
//!                → DrainRequested? → ProcessExited → BackoffScheduled → [sleep] → LaunchStarting
//! ```
//!
//! ## Rules
//! - Launches run sequentially within one actor
//! - Only a setup fault ([`LaunchError::is_fatal`](crate::LaunchError::is_fatal)) ends supervision early
//! - A stop never kills a running process; it prevents the next launch
//! - A stop during backoff ends the sleep and goes straight to `Stopped`
//! - The backoff streak resets after a launch that reached its desired tunnel count

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::{select, time};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::config::{SupervisorConfig, TunnelConfig};
use crate::core::runner::run_once;
use crate::events::{Bus, Event, EventKind};
use crate::launch::{Launcher, endpoint_dir, seed_datastore};
use crate::ledger::UsageLedger;
use crate::policies::BackoffPolicy;
use crate::registry::ProxyRegistry;

/// Per-endpoint settings extracted from [`SupervisorConfig`].
#[derive(Clone, Debug)]
pub(crate) struct ActorParams {
    pub data_dir: PathBuf,
    pub datastore_template: Option<PathBuf>,
    pub upstream_proxy_port: Option<u16>,
    pub backoff: BackoffPolicy,
    pub reader_join_timeout: Duration,
}

impl From<&SupervisorConfig> for ActorParams {
    fn from(cfg: &SupervisorConfig) -> Self {
        Self {
            data_dir: cfg.data_dir.clone(),
            datastore_template: cfg.datastore_template.clone(),
            upstream_proxy_port: cfg.upstream_proxy_port,
            backoff: cfg.backoff,
            reader_join_timeout: cfg.reader_join_timeout,
        }
    }
}

/// How an actor finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ActorExit {
    Stopped,
    Dead(String),
}

/// Supervises the tunnel core of one endpoint.
pub(crate) struct EndpointActor {
    pub port: u16,
    pub tunnel: TunnelConfig,
    pub params: ActorParams,
    pub launcher: Arc<dyn Launcher>,
    pub ledger: Arc<UsageLedger>,
    pub registry: Arc<dyn ProxyRegistry>,
    pub bus: Bus,
}

impl EndpointActor {
    /// Runs launches until stopped or a setup fault occurs.
    pub async fn run(self, token: CancellationToken) -> ActorExit {
        self.seed().await;

        let mut attempt: u32 = 0;
        let mut streak: u32 = 0;

        loop {
            if token.is_cancelled() {
                break;
            }
            attempt = attempt.saturating_add(1);

            let reason = match run_once(&self, attempt, &token).await {
                Ok(outcome) => {
                    if outcome.fully_connected {
                        streak = 0;
                    }
                    let reason = outcome.reason();
                    self.bus.publish(
                        Event::new(EventKind::ProcessExited)
                            .with_port(self.port)
                            .with_attempt(attempt)
                            .with_reason(reason.as_str()),
                    );
                    reason
                }
                Err(e) if e.is_fatal() => {
                    let reason = e.to_string();
                    self.bus.publish(
                        Event::new(EventKind::EndpointDead)
                            .with_port(self.port)
                            .with_attempt(attempt)
                            .with_reason(reason.as_str()),
                    );
                    return ActorExit::Dead(reason);
                }
                Err(e) => e.to_string(),
            };

            if token.is_cancelled() {
                break;
            }

            let delay = self.params.backoff.next(streak);
            streak = streak.saturating_add(1);
            self.bus.publish(
                Event::new(EventKind::BackoffScheduled)
                    .with_port(self.port)
                    .with_attempt(attempt)
                    .with_delay(delay)
                    .with_reason(reason),
            );

            let sleep = time::sleep(delay);
            tokio::pin!(sleep);
            select! {
                _ = &mut sleep => {}
                _ = token.cancelled() => break,
            }
        }

        self.bus
            .publish(Event::new(EventKind::EndpointStopped).with_port(self.port));
        ActorExit::Stopped
    }

    /// Copies the datastore template in before the first launch; failures only warn.
    async fn seed(&self) {
        let Some(template) = &self.params.datastore_template else {
            return;
        };
        let dir = endpoint_dir(&self.params.data_dir, self.port);
        if let Err(e) = seed_datastore(&dir, template).await {
            warn!(port = self.port, error = %e, "datastore seeding failed");
        }
    }

    #[cfg(test)]
    pub(crate) fn for_tests(
        port: u16,
        data_dir: &std::path::Path,
        launcher: Arc<dyn Launcher>,
    ) -> Self {
        let cfg = SupervisorConfig {
            data_dir: data_dir.to_path_buf(),
            datastore_template: None,
            ..SupervisorConfig::default()
        };
        let tunnel = crate::config::TunnelSettings {
            tunnel: 1,
            authorizations: vec!["A".into()],
            ..Default::default()
        }
        .into_config();
        Self {
            port,
            tunnel,
            params: ActorParams::from(&cfg),
            launcher,
            ledger: Arc::new(UsageLedger::new()),
            registry: Arc::new(crate::registry::NoopRegistry),
            bus: Bus::new(256),
        }
    }
}
