//! # Runtime events emitted by the supervisor and endpoint actors.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Subscriber events**: fan-out health (overflow, panic)
//! - **Shutdown events**: stop requested, grace outcome
//! - **Endpoint lifecycle**: launch, tunnel activation, usage, drain, exit, backoff
//! - **Terminal events**: endpoint stopped or dead
//!
//! The [`Event`] struct carries metadata such as the endpoint port, diagnostic id,
//! reason text, byte counters and backoff delay.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Within one endpoint, events are published in the order things happened.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use tunnelvisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::BackoffScheduled)
//!     .with_port(1080)
//!     .with_reason("tunnel failed: reset")
//!     .with_attempt(3)
//!     .with_delay(Duration::from_secs(3));
//!
//! assert_eq!(ev.kind, EventKind::BackoffScheduled);
//! assert_eq!(ev.port, Some(1080));
//! assert_eq!(ev.delay_ms, Some(3000));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(1);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets: `diagnostic_id` (subscriber name), `reason` (panic message).
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets: `diagnostic_id` (subscriber name), `reason`.
    SubscriberOverflow,

    // === Shutdown events ===
    /// Stop requested (OS signal or explicit stop).
    ShutdownRequested,

    /// All endpoints stopped within the grace period.
    AllStoppedWithin,

    /// Grace period exceeded; some endpoints still wait on their process.
    GraceExceeded,

    // === Endpoint lifecycle ===
    /// Endpoint is launching a tunnel process.
    ///
    /// Sets: `port`, `attempt` (1-based launch count), `credentials` (tokens handed out).
    LaunchStarting,

    /// Tunnel process spawned; diagnostics are being read.
    ///
    /// Sets: `port`, `attempt`.
    ProcessSpawned,

    /// One tunnel became active.
    ///
    /// Sets: `port`, `diagnostic_id`, `connected`, `desired`.
    TunnelActivated,

    /// Desired tunnel count reached; endpoint registered with the proxy registry.
    ///
    /// Sets: `port`, `connected`, `desired`, `reason` (registered address).
    EndpointConnected,

    /// Bytes recorded for one tunnel.
    ///
    /// Sets: `port`, `diagnostic_id`, `bytes` (diagnostic cumulative), `total` (grand total).
    UsageUpdated,

    /// Informational alert/warning (verbose output only).
    ///
    /// Sets: `port`, `reason` (raw notice line).
    NoticeLogged,

    /// Reader stopped consuming diagnostics; waiting for the process to exit.
    ///
    /// Sets: `port`, `reason` (quota or the raw fatal notice line).
    DrainRequested,

    /// Tunnel process exited (or failed to run).
    ///
    /// Sets: `port`, `attempt`, `reason` (exit status or error).
    ProcessExited,

    /// Next launch scheduled.
    ///
    /// Sets: `port`, `attempt`, `delay_ms`.
    BackoffScheduled,

    // === Terminal events ===
    /// Endpoint observed the stop signal and will not relaunch.
    ///
    /// Sets: `port`.
    EndpointStopped,

    /// Endpoint aborted on a setup fault.
    ///
    /// Sets: `port`, `reason`.
    EndpointDead,
}

/// Runtime event with optional metadata.
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Endpoint listen port, if applicable.
    pub port: Option<u16>,
    /// Tunnel diagnostic id (or subscriber name for subscriber events).
    pub diagnostic_id: Option<Arc<str>>,
    /// Human-readable reason (raw notice, exit status, error).
    pub reason: Option<Arc<str>>,
    /// Launch count for this endpoint (starting from 1).
    pub attempt: Option<u32>,
    /// Backoff delay in milliseconds.
    pub delay_ms: Option<u32>,
    /// Cumulative bytes for `diagnostic_id`.
    pub bytes: Option<f64>,
    /// Grand total bytes across endpoints.
    pub total: Option<f64>,
    /// Tunnels connected during this launch.
    pub connected: Option<u32>,
    /// Desired tunnel count.
    pub desired: Option<u32>,
    /// Number of credentials handed to this launch.
    pub credentials: Option<u32>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            port: None,
            diagnostic_id: None,
            reason: None,
            attempt: None,
            delay_ms: None,
            bytes: None,
            total: None,
            connected: None,
            desired: None,
            credentials: None,
        }
    }

    /// Attaches the endpoint port.
    #[inline]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Attaches a diagnostic id.
    #[inline]
    pub fn with_diagnostic(mut self, id: impl Into<Arc<str>>) -> Self {
        self.diagnostic_id = Some(id.into());
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a launch count.
    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Attaches a backoff delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.delay_ms = Some(ms);
        self
    }

    /// Attaches usage counters.
    #[inline]
    pub fn with_usage(mut self, bytes: f64, total: f64) -> Self {
        self.bytes = Some(bytes);
        self.total = Some(total);
        self
    }

    /// Attaches connected/desired tunnel counts.
    #[inline]
    pub fn with_tunnels(mut self, connected: usize, desired: usize) -> Self {
        self.connected = Some(u32::try_from(connected).unwrap_or(u32::MAX));
        self.desired = Some(u32::try_from(desired).unwrap_or(u32::MAX));
        self
    }

    /// Attaches the number of credentials handed to a launch.
    #[inline]
    pub fn with_credentials(mut self, n: usize) -> Self {
        self.credentials = Some(u32::try_from(n).unwrap_or(u32::MAX));
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_diagnostic(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_diagnostic(subscriber)
            .with_reason(info)
    }

    #[inline]
    pub fn is_subscriber_overflow(&self) -> bool {
        matches!(self.kind, EventKind::SubscriberOverflow)
    }
}
