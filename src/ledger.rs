//! # Usage ledger: bytes transferred per endpoint and per tunnel.
//!
//! ```text
//! UsageLedger
//!   ├─ ports: HashMap<u16, Slice>
//!   │           ├─ by_diagnostic: HashMap<diagnosticID, bytes>
//!   │           └─ all: bytes since the last reset of this endpoint
//!   └─ total: bytes across every endpoint since the ledger was created
//! ```
//!
//! ## Rules
//! - `record_transfer` bumps the diagnostic counter, the endpoint `all` counter and
//!   the grand total under one write lock, so concurrent endpoints never lose updates.
//! - `reset_endpoint` clears one slice only; other endpoints and the grand total are kept.
//! - Readers get copies ([`EndpointUsage`]) and never hold the lock.

use std::collections::HashMap;

use parking_lot::RwLock;

/// Reserved identifier under which an endpoint's total is reported.
pub const ALL: &str = "all";

#[derive(Debug, Default, Clone)]
struct Slice {
    by_diagnostic: HashMap<String, f64>,
    all: f64,
}

#[derive(Debug, Default)]
struct Inner {
    ports: HashMap<u16, Slice>,
    total: f64,
}

/// Counters observed right after a transfer was recorded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransferTotals {
    /// Cumulative bytes for the sample's diagnostic id on this endpoint.
    pub diagnostic: f64,
    /// Cumulative bytes for the endpoint since its last reset.
    pub endpoint: f64,
    /// Grand total across all endpoints.
    pub grand: f64,
}

/// Read-only copy of one endpoint's counters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EndpointUsage {
    /// Bytes per diagnostic id.
    pub by_diagnostic: HashMap<String, f64>,
    /// Endpoint total since the last reset.
    pub all: f64,
}

impl EndpointUsage {
    /// Returns the counter for `id`; [`ALL`] yields the endpoint total.
    pub fn get(&self, id: &str) -> Option<f64> {
        if id == ALL {
            Some(self.all)
        } else {
            self.by_diagnostic.get(id).copied()
        }
    }
}

/// Thread-safe aggregate of transferred bytes.
#[derive(Debug, Default)]
pub struct UsageLedger {
    inner: RwLock<Inner>,
}

impl UsageLedger {
    /// Creates an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `sent + received` to the diagnostic, endpoint and grand counters.
    pub fn record_transfer(
        &self,
        port: u16,
        diagnostic_id: &str,
        sent: f64,
        received: f64,
    ) -> TransferTotals {
        let bytes = sent + received;
        let mut inner = self.inner.write();
        inner.total += bytes;
        let grand = inner.total;

        let slice = inner.ports.entry(port).or_default();
        let diagnostic = slice
            .by_diagnostic
            .entry(diagnostic_id.to_string())
            .or_insert(0.0);
        *diagnostic += bytes;
        let diagnostic = *diagnostic;
        slice.all += bytes;

        TransferTotals {
            diagnostic,
            endpoint: slice.all,
            grand,
        }
    }

    /// Clears one endpoint's counters (called once per launch).
    pub fn reset_endpoint(&self, port: u16) {
        self.inner.write().ports.insert(port, Slice::default());
    }

    /// Returns a copy of one endpoint's counters, if the endpoint is known.
    pub fn snapshot(&self, port: u16) -> Option<EndpointUsage> {
        self.inner.read().ports.get(&port).map(|s| EndpointUsage {
            by_diagnostic: s.by_diagnostic.clone(),
            all: s.all,
        })
    }

    /// Endpoint total since its last reset (`0.0` for unknown endpoints).
    pub fn endpoint_total(&self, port: u16) -> f64 {
        self.inner.read().ports.get(&port).map_or(0.0, |s| s.all)
    }

    /// Bytes across every endpoint since the ledger was created.
    pub fn grand_total(&self) -> f64 {
        self.inner.read().total
    }
}

/// Renders a byte count for humans (`1024` base, two decimals).
///
/// ```
/// use tunnelvisor::ledger::format_bytes;
///
/// assert_eq!(format_bytes(512.0), "512 B");
/// assert_eq!(format_bytes(1536.0), "1.50 KB");
/// ```
pub fn format_bytes(bytes: f64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

    if bytes < 1024.0 {
        return format!("{} B", bytes.max(0.0) as u64);
    }
    let mut value = bytes;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.2} {}", UNITS[unit])
}
