//! # Diagnostic reader: the Running half of one launch.
//!
//! Consumes the tunnel core's diagnostic stream line by line, in order, and
//! decides whether the endpoint keeps running.
//!
//! ```text
//! line ──► NoticeEvent::parse()
//!            ├─ ActiveTunnel      → connected += 1, register once at desired
//!            ├─ BytesTransferred  → ledger + quota ──► false → Drain
//!            ├─ Alert / Warning   → classify_alert ──► Fatal → Drain
//!            └─ Unrecognized      → dropped
//! ```
//!
//! ## Rules
//! - The loop exits on drain, end of stream, read error or cancellation
//! - Exiting never signals the process; the runner keeps waiting for its exit
//! - Exiting drops the read end of the diagnostic pipe, so the next write from
//!   the tunnel core fails (EPIPE, or SIGPIPE if unhandled). In practice a
//!   drained core ends on that write rather than being killed
//! - Malformed lines are never errors
//! - Lines longer than [`MAX_LINE_BYTES`] are discarded whole, like any other
//!   unrecognized line, without buffering more than the cap

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, AsyncReadExt};
use tracing::debug;
use tokio_util::sync::CancellationToken;

use crate::events::{Bus, Event, EventKind};
use crate::launch::DiagnosticStream;
use crate::ledger::{UsageLedger, format_bytes};
use crate::notice::{Disposition, NoticeEvent, TunnelCounts, classify_alert};
use crate::policies::QuotaPolicy;
use crate::registry::ProxyRegistry;

/// Longest diagnostic line kept in memory.
pub(crate) const MAX_LINE_BYTES: usize = 64 * 1024;

/// State shared by the reader and the runner for one launch.
#[derive(Debug, Default)]
pub(crate) struct LaunchState {
    /// `ActiveTunnel` notices seen since launch.
    pub connected: usize,
    /// Endpoint registered with the proxy registry during this launch.
    pub registered: bool,
    /// Why the reader asked for a drain, if it did.
    pub drain: Option<String>,
}

/// Why the reader loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ReaderExit {
    Drained,
    Eof,
    Cancelled,
    Failed(String),
}

/// Everything the reader needs besides the stream.
#[derive(Clone)]
pub(crate) struct ReaderContext {
    pub port: u16,
    pub desired: usize,
    pub quota: QuotaPolicy,
    pub ledger: Arc<UsageLedger>,
    pub registry: Arc<dyn ProxyRegistry>,
    pub bus: Bus,
    pub state: Arc<Mutex<LaunchState>>,
}

impl ReaderContext {
    /// Reads until drain, EOF, error or `token` cancellation.
    pub async fn run(self, mut stream: DiagnosticStream, token: CancellationToken) -> ReaderExit {
        let mut buf = Vec::with_capacity(512);
        let mut oversized = false;
        loop {
            buf.clear();
            let limit = MAX_LINE_BYTES as u64 + 1;
            let read = {
                let mut limited = (&mut stream).take(limit);
                tokio::select! {
                    biased;
                    _ = token.cancelled() => return ReaderExit::Cancelled,
                    r = limited.read_until(b'\n', &mut buf) => r,
                }
            };
            match read {
                Ok(0) => return ReaderExit::Eof,
                Ok(_) => {}
                Err(e) => return ReaderExit::Failed(e.to_string()),
            }

            let complete = buf.last() == Some(&b'\n');
            if oversized || buf.len() > MAX_LINE_BYTES {
                if !oversized {
                    debug!(port = self.port, limit = MAX_LINE_BYTES, "overlong diagnostic line dropped");
                }
                oversized = !complete;
                continue;
            }

            let line = String::from_utf8_lossy(&buf);
            let line = line.trim_end_matches(['\r', '\n']);
            if line.is_empty() {
                continue;
            }
            if let Some(reason) = self.handle_line(line) {
                self.bus.publish(
                    Event::new(EventKind::DrainRequested)
                        .with_port(self.port)
                        .with_reason(reason.as_str()),
                );
                self.state.lock().drain = Some(reason);
                return ReaderExit::Drained;
            }
        }
    }

    /// Applies one notice. Returns a drain reason when the endpoint must restart.
    pub fn handle_line(&self, line: &str) -> Option<String> {
        match NoticeEvent::parse(line) {
            NoticeEvent::ActiveTunnel { diagnostic_id } => {
                self.on_active_tunnel(&diagnostic_id);
                None
            }
            NoticeEvent::BytesTransferred {
                diagnostic_id,
                sent,
                received,
            } => self.on_bytes(&diagnostic_id, sent, received),
            NoticeEvent::Alert { message } | NoticeEvent::Warning { message } => {
                let counts = TunnelCounts {
                    desired: self.desired,
                    connected: self.state.lock().connected,
                };
                let verdict = classify_alert(&message, counts);
                match verdict.disposition {
                    Disposition::Ignore => None,
                    Disposition::Informational => {
                        self.bus.publish(
                            Event::new(EventKind::NoticeLogged)
                                .with_port(self.port)
                                .with_reason(line),
                        );
                        None
                    }
                    Disposition::Fatal => Some(line.to_string()),
                }
            }
            NoticeEvent::Unrecognized => None,
        }
    }

    fn on_active_tunnel(&self, diagnostic_id: &str) {
        let (connected, first_full) = {
            let mut state = self.state.lock();
            state.connected += 1;
            let first_full = !state.registered && state.connected >= self.desired;
            if first_full {
                state.registered = true;
            }
            (state.connected, first_full)
        };

        self.bus.publish(
            Event::new(EventKind::TunnelActivated)
                .with_port(self.port)
                .with_diagnostic(diagnostic_id)
                .with_tunnels(connected, self.desired),
        );
        if first_full {
            let addr = format!("0.0.0.0:{}", self.port);
            self.registry.register(&addr);
            self.bus.publish(
                Event::new(EventKind::EndpointConnected)
                    .with_port(self.port)
                    .with_tunnels(connected, self.desired)
                    .with_reason(addr),
            );
        }
    }

    fn on_bytes(&self, diagnostic_id: &str, sent: f64, received: f64) -> Option<String> {
        let totals = self
            .ledger
            .record_transfer(self.port, diagnostic_id, sent, received);

        if !self.quota.should_continue(totals.endpoint, sent, received) {
            return Some(format!(
                "quota of {} MB reached ({} used)",
                self.quota.limit_mb,
                format_bytes(totals.endpoint)
            ));
        }
        self.bus.publish(
            Event::new(EventKind::UsageUpdated)
                .with_port(self.port)
                .with_diagnostic(diagnostic_id)
                .with_usage(totals.diagnostic, totals.grand),
        );
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ProxyPool;
    use tokio::io::BufReader;

    fn ctx(desired: usize, quota_mb: u64) -> (ReaderContext, Arc<ProxyPool>) {
        let pool = Arc::new(ProxyPool::new());
        let ctx = ReaderContext {
            port: 1080,
            desired,
            quota: QuotaPolicy::new(quota_mb),
            ledger: Arc::new(UsageLedger::new()),
            registry: pool.clone(),
            bus: Bus::new(64),
            state: Arc::new(Mutex::new(LaunchState::default())),
        };
        (ctx, pool)
    }

    fn stream(text: &'static str) -> DiagnosticStream {
        Box::new(BufReader::new(text.as_bytes()))
    }

    const ACTIVE: &str = r#"{"noticeType":"ActiveTunnel","data":{"diagnosticID":"t1"}}"#;

    #[test]
    fn test_registers_once_at_desired_count() {
        let (ctx, pool) = ctx(2, 0);
        let mut rx = ctx.bus.subscribe();

        assert_eq!(ctx.handle_line(ACTIVE), None);
        assert!(pool.addresses().is_empty());
        ctx.handle_line(ACTIVE);
        ctx.handle_line(ACTIVE);
        assert_eq!(pool.addresses(), vec!["0.0.0.0:1080"]);
        assert_eq!(ctx.state.lock().connected, 3);

        let events: Vec<Event> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
        let kinds: Vec<EventKind> = events.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                EventKind::TunnelActivated,
                EventKind::TunnelActivated,
                EventKind::EndpointConnected,
                EventKind::TunnelActivated,
            ]
        );
        assert_eq!(events[2].reason.as_deref(), Some("0.0.0.0:1080"));
    }

    #[test]
    fn test_bytes_update_ledger_and_publish_usage() {
        let (ctx, _) = ctx(1, 0);
        let mut rx = ctx.bus.subscribe();
        let line = r#"{"noticeType":"BytesTransferred","data":{"diagnosticID":"t1","sent":100,"received":400}}"#;

        assert_eq!(ctx.handle_line(line), None);
        assert_eq!(ctx.ledger.endpoint_total(1080), 500.0);

        let ev = rx.try_recv().unwrap();
        assert_eq!(ev.kind, EventKind::UsageUpdated);
        assert_eq!(ev.bytes, Some(500.0));
        assert_eq!(ev.total, Some(500.0));
    }

    #[test]
    fn test_quota_drains_on_keepalive_noise() {
        let (ctx, _) = ctx(1, 1);
        let big = r#"{"noticeType":"BytesTransferred","data":{"diagnosticID":"t1","sent":500000,"received":500000}}"#;
        let noise = r#"{"noticeType":"BytesTransferred","data":{"diagnosticID":"t1","sent":0,"received":100}}"#;

        // The sample that crosses the limit still has traffic in it.
        assert_eq!(ctx.handle_line(big), None);
        let reason = ctx.handle_line(noise).unwrap();
        assert!(reason.starts_with("quota of 1 MB reached"));
    }

    #[test]
    fn test_alert_dispositions() {
        let (ctx, _) = ctx(1, 0);
        let mut rx = ctx.bus.subscribe();

        let ignored = r#"{"noticeType":"Alert","data":{"message":"Config migration: done"}}"#;
        let info = r#"{"noticeType":"Alert","data":{"message":"something odd"}}"#;
        let fatal = r#"{"noticeType":"Warning","data":{"message":"tunnel failed: reset"}}"#;

        assert_eq!(ctx.handle_line(ignored), None);
        assert!(rx.try_recv().is_err());

        assert_eq!(ctx.handle_line(info), None);
        let ev = rx.try_recv().unwrap();
        assert_eq!(ev.kind, EventKind::NoticeLogged);
        assert_eq!(ev.reason.as_deref(), Some(info));

        assert_eq!(ctx.handle_line(fatal).as_deref(), Some(fatal));
    }

    #[test]
    fn test_meek_failure_depends_on_connected_count() {
        let (ctx, _) = ctx(1, 0);
        let meek = r#"{"noticeType":"Alert","data":{"message":"meek round trip failed: EOF"}}"#;

        assert_eq!(ctx.handle_line(meek), None);
        ctx.handle_line(ACTIVE);
        assert!(ctx.handle_line(meek).is_some());
    }

    #[tokio::test]
    async fn test_run_stops_at_fatal_line() {
        let (ctx, _) = ctx(1, 0);
        let state = ctx.state.clone();
        let mut rx = ctx.bus.subscribe();
        let text = "garbage\n\
            {\"noticeType\":\"ActiveTunnel\",\"data\":{\"diagnosticID\":\"t1\"}}\n\
            {\"noticeType\":\"Warning\",\"data\":{\"message\":\"tunnel failed: x\"}}\n\
            {\"noticeType\":\"ActiveTunnel\",\"data\":{\"diagnosticID\":\"t2\"}}\n";

        let exit = ctx.run(stream(text), CancellationToken::new()).await;
        assert_eq!(exit, ReaderExit::Drained);
        // Nothing after the fatal line is consumed.
        assert_eq!(state.lock().connected, 1);
        assert!(state.lock().drain.as_deref().unwrap().contains("tunnel failed"));

        let kinds: Vec<EventKind> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|e| e.kind)
            .collect();
        assert_eq!(kinds.last(), Some(&EventKind::DrainRequested));
    }

    #[tokio::test]
    async fn test_run_eof_and_cancel() {
        let (ctx, _) = ctx(1, 0);
        let exit = ctx.clone().run(stream("{}\n\n"), CancellationToken::new()).await;
        assert_eq!(exit, ReaderExit::Eof);

        let (_writer, pending) = tokio::io::duplex(64);
        let token = CancellationToken::new();
        token.cancel();
        let exit = ctx.run(Box::new(BufReader::new(pending)), token).await;
        assert_eq!(exit, ReaderExit::Cancelled);
    }

    #[tokio::test]
    async fn test_overlong_line_is_dropped_and_reading_continues() {
        let (ctx, pool) = ctx(1, 0);
        let state = ctx.state.clone();
        let mut text = "x".repeat(3 * MAX_LINE_BYTES);
        text.push('\n');
        text.push_str(ACTIVE);
        text.push('\n');
        let stream: DiagnosticStream = Box::new(BufReader::new(std::io::Cursor::new(text.into_bytes())));

        let exit = ctx.run(stream, CancellationToken::new()).await;
        assert_eq!(exit, ReaderExit::Eof);
        assert_eq!(state.lock().connected, 1);
        assert_eq!(pool.addresses(), vec!["0.0.0.0:1080"]);
    }

    #[tokio::test]
    async fn test_line_at_cap_is_still_parsed() {
        let (ctx, _) = ctx(1, 0);
        let state = ctx.state.clone();
        // Pad the JSON with spaces up to exactly the cap, newline included.
        let mut text = ACTIVE.to_string();
        text.push_str(&" ".repeat(MAX_LINE_BYTES - ACTIVE.len() - 1));
        text.push('\n');
        let stream: DiagnosticStream = Box::new(BufReader::new(std::io::Cursor::new(text.into_bytes())));

        ctx.run(stream, CancellationToken::new()).await;
        assert_eq!(state.lock().connected, 1);
    }

    #[tokio::test]
    async fn test_endless_line_without_newline_ends_at_eof() {
        let (ctx, _) = ctx(1, 0);
        let text = vec![b'{'; 5 * MAX_LINE_BYTES];
        let stream: DiagnosticStream = Box::new(BufReader::new(std::io::Cursor::new(text)));
        let exit = ctx.run(stream, CancellationToken::new()).await;
        assert_eq!(exit, ReaderExit::Eof);
    }
}
