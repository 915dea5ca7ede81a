//! # LogWriter: console output through `tracing`.
//!
//! Non-verbose mode shows what an operator needs at a glance: connection state
//! and usage. Verbose mode adds reconnect reasons, backoff and the raw text of
//! alert/warning notices.
//!
//! ## Example output
//! ```text
//! INFO port=1080 Connecting
//! INFO port=1080 Connected (a1b2c3)
//! INFO port=1080 Connected
//! INFO port=1080 1080 (a1b2c3) (1.50 MB) (12.03 MB)
//! WARN port=1080 {"noticeType":"Warning","data":{"message":"tunnel failed: …"}}   (verbose)
//! INFO port=1080 Reconnecting reason="exit status: 1"                           (verbose)
//! ```

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::events::{Event, EventKind};
use crate::ledger::format_bytes;
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogWriter {
    verbose: bool,
}

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    fn usage_line(e: &Event) -> String {
        format!(
            "{} ({}) ({}) ({})",
            e.port.unwrap_or_default(),
            e.diagnostic_id.as_deref().unwrap_or("-"),
            format_bytes(e.bytes.unwrap_or_default()),
            format_bytes(e.total.unwrap_or_default()),
        )
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let port = e.port.unwrap_or_default();
        let reason = e.reason.as_deref().unwrap_or("");

        match e.kind {
            EventKind::LaunchStarting => {
                if e.attempt == Some(1) {
                    info!(port, "Connecting");
                } else if self.verbose {
                    debug!(port, attempt = e.attempt, credentials = e.credentials, "launching");
                }
            }
            EventKind::ProcessSpawned => {
                if self.verbose {
                    debug!(port, attempt = e.attempt, "tunnel core spawned");
                }
            }
            EventKind::TunnelActivated => {
                if e.desired.unwrap_or(1) > 1 {
                    info!(port, "Connected ({})", e.diagnostic_id.as_deref().unwrap_or("-"));
                }
            }
            EventKind::EndpointConnected => {
                info!(port, "Connected");
            }
            EventKind::UsageUpdated => {
                info!(port, "{}", Self::usage_line(e));
            }
            EventKind::NoticeLogged | EventKind::DrainRequested => {
                if self.verbose {
                    warn!(port, "{reason}");
                }
            }
            EventKind::ProcessExited => {
                if self.verbose {
                    info!(port, reason, "Reconnecting");
                }
            }
            EventKind::BackoffScheduled => {
                if self.verbose {
                    debug!(port, delay_ms = e.delay_ms, after_attempt = e.attempt, "backoff");
                }
            }
            EventKind::EndpointStopped => {
                if self.verbose {
                    info!(port, "stopped");
                }
            }
            EventKind::EndpointDead => {
                error!(port, reason, "endpoint supervision aborted");
            }
            EventKind::ShutdownRequested => {
                info!("shutdown requested");
            }
            EventKind::AllStoppedWithin => {
                info!("all endpoints stopped within grace");
            }
            EventKind::GraceExceeded => {
                warn!("grace exceeded; some tunnel processes are still running");
            }
            EventKind::SubscriberOverflow | EventKind::SubscriberPanicked => {
                warn!(
                    subscriber = e.diagnostic_id.as_deref().unwrap_or("unknown"),
                    reason, "subscriber trouble"
                );
            }
        }
    }

    fn name(&self) -> &'static str {
        "log-writer"
    }
}
