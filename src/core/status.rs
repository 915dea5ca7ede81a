//! # Endpoint status board with sequence-based ordering.
//!
//! Keeps the latest phase of every supervised endpoint for display and for the
//! stuck-endpoint report when shutdown grace is exceeded.
//!
//! ```text
//! Supervisor ──► Bus ──► listener ──► StatusTracker::update()
//!                                            │
//!                                            ▼
//!                                 HashMap<u16, PortState>
//!                                 (port → {last_seq, status})
//! ```
//!
//! ## Rules
//! - Events with `seq <= last_seq` for the same port are rejected (stale)
//! - `EndpointStopped` / `EndpointDead` deregister the endpoint; later stale
//!   events for it cannot bring it back

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::events::{Event, EventKind};

/// Supervision phase of one endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointPhase {
    /// Preparing and spawning the tunnel core.
    Launching,
    /// Process up, diagnostic stream being read.
    Running,
    /// Reader stopped; waiting for the process to exit on its own.
    Draining,
    /// Process exited; waiting before the next launch.
    Backoff,
}

/// Display snapshot of one endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointStatus {
    pub port: u16,
    pub phase: EndpointPhase,
    /// Launch counter, starting at 1.
    pub attempt: u32,
    pub connected: u32,
    pub desired: u32,
}

#[derive(Debug)]
struct PortState {
    last_seq: u64,
    /// `None` once the endpoint has been deregistered.
    status: Option<EndpointStatus>,
}

/// Thread-safe tracker of endpoint phases.
#[derive(Debug, Default)]
pub struct StatusTracker {
    state: RwLock<HashMap<u16, PortState>>,
}

impl StatusTracker {
    /// Creates an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies `ev` if it is newer than the last event seen for its port.
    ///
    /// Returns `true` when the endpoint's status changed.
    pub fn update(&self, ev: &Event) -> bool {
        let Some(port) = ev.port else {
            return false;
        };

        let mut state = self.state.write();
        let entry = state.entry(port).or_insert(PortState {
            last_seq: 0,
            status: None,
        });
        if ev.seq <= entry.last_seq {
            return false;
        }
        entry.last_seq = ev.seq;

        match ev.kind {
            EventKind::LaunchStarting => {
                let status = entry.status.get_or_insert(EndpointStatus {
                    port,
                    phase: EndpointPhase::Launching,
                    attempt: 0,
                    connected: 0,
                    desired: 0,
                });
                status.phase = EndpointPhase::Launching;
                status.attempt = ev.attempt.unwrap_or(status.attempt + 1);
                status.connected = 0;
                true
            }
            EventKind::EndpointStopped | EventKind::EndpointDead => entry.status.take().is_some(),
            kind => {
                let Some(status) = entry.status.as_mut() else {
                    return false;
                };
                match kind {
                    EventKind::ProcessSpawned => status.phase = EndpointPhase::Running,
                    EventKind::TunnelActivated | EventKind::EndpointConnected => {
                        status.phase = EndpointPhase::Running;
                        status.connected = ev.connected.unwrap_or(status.connected);
                        status.desired = ev.desired.unwrap_or(status.desired);
                    }
                    EventKind::DrainRequested => status.phase = EndpointPhase::Draining,
                    EventKind::ProcessExited | EventKind::BackoffScheduled => {
                        status.phase = EndpointPhase::Backoff
                    }
                    _ => return false,
                }
                true
            }
        }
    }

    /// All registered endpoints, sorted by port.
    pub fn snapshot(&self) -> Vec<EndpointStatus> {
        let state = self.state.read();
        let mut out: Vec<EndpointStatus> =
            state.values().filter_map(|s| s.status.clone()).collect();
        out.sort_unstable_by_key(|s| s.port);
        out
    }

    /// Current phase of `port`, if registered.
    pub fn phase(&self, port: u16) -> Option<EndpointPhase> {
        self.state
            .read()
            .get(&port)
            .and_then(|s| s.status.as_ref())
            .map(|s| s.phase)
    }

    /// Ports still registered (sorted).
    pub fn active_ports(&self) -> Vec<u16> {
        self.snapshot().into_iter().map(|s| s.port).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ev(kind: EventKind) -> Event {
        Event::new(kind).with_port(1080)
    }

    #[test]
    fn test_phase_progression() {
        let t = StatusTracker::new();
        assert!(t.update(&ev(EventKind::LaunchStarting).with_attempt(1)));
        assert_eq!(t.phase(1080), Some(EndpointPhase::Launching));

        t.update(&ev(EventKind::ProcessSpawned));
        assert_eq!(t.phase(1080), Some(EndpointPhase::Running));

        t.update(&ev(EventKind::TunnelActivated).with_tunnels(1, 2));
        t.update(&ev(EventKind::DrainRequested));
        assert_eq!(t.phase(1080), Some(EndpointPhase::Draining));

        t.update(&ev(EventKind::ProcessExited));
        assert_eq!(t.phase(1080), Some(EndpointPhase::Backoff));

        let snap = t.snapshot();
        assert_eq!(snap.len(), 1);
        assert_eq!(snap[0].attempt, 1);
        assert_eq!((snap[0].connected, snap[0].desired), (1, 2));
    }

    #[test]
    fn test_stale_events_rejected() {
        let t = StatusTracker::new();
        let old = ev(EventKind::ProcessSpawned);
        let newer = ev(EventKind::LaunchStarting).with_attempt(2);

        assert!(t.update(&newer));
        assert!(!t.update(&old));
        assert_eq!(t.phase(1080), Some(EndpointPhase::Launching));
    }

    #[test]
    fn test_stop_deregisters() {
        let t = StatusTracker::new();
        let early = ev(EventKind::BackoffScheduled);
        t.update(&Event::new(EventKind::LaunchStarting).with_port(1081));
        t.update(&ev(EventKind::LaunchStarting));
        assert_eq!(t.active_ports(), vec![1080, 1081]);

        assert!(t.update(&ev(EventKind::EndpointStopped)));
        assert_eq!(t.active_ports(), vec![1081]);
        assert_eq!(t.phase(1080), None);

        // Events for a deregistered endpoint do not resurrect it.
        assert!(!t.update(&early));
        assert!(!t.update(&ev(EventKind::ProcessExited)));
        assert_eq!(t.active_ports(), vec![1081]);
    }

    #[test]
    fn test_events_without_port_ignored() {
        let t = StatusTracker::new();
        assert!(!t.update(&Event::new(EventKind::ShutdownRequested)));
        assert!(t.snapshot().is_empty());
    }
}
