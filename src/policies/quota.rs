//! # Quota cutoff policy.
//!
//! [`QuotaPolicy`] decides whether an endpoint keeps consuming diagnostics after a
//! `BytesTransferred` sample. The cutoff is narrow on purpose: once the endpoint's
//! usage has reached the limit, only a receive-only trickle (`sent == 0` and
//! `received <= 64000`) stops the tunnel. Anything larger passes once more.
//!
//! ```text
//! limit_mb == 0                       → continue (unlimited)
//! all < limit_mb × 1_000_000          → continue
//! sent != 0                           → continue
//! received > 64_000                   → continue
//! otherwise                           → stop
//! ```
//!
//! Samples are truncated to whole bytes before comparing.

/// Receive-only samples at or below this size count as keepalive noise.
pub const KEEPALIVE_RECEIVED_MAX: i64 = 64_000;

/// Bytes per configured megabyte.
pub const BYTES_PER_MB: i64 = 1_000_000;

/// Per-endpoint quota limit (`0` = unlimited).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QuotaPolicy {
    /// Limit in whole megabytes.
    pub limit_mb: u64,
}

impl QuotaPolicy {
    /// Creates a policy with the given limit in megabytes.
    pub const fn new(limit_mb: u64) -> Self {
        Self { limit_mb }
    }

    /// True when no limit is configured.
    pub const fn is_unlimited(&self) -> bool {
        self.limit_mb == 0
    }

    /// Returns `false` when the endpoint should drain.
    ///
    /// `endpoint_all` is the endpoint's cumulative usage including this sample.
    ///
    /// # Example
    /// ```
    /// use tunnelvisor::QuotaPolicy;
    ///
    /// let q = QuotaPolicy::new(1);
    /// assert!(!q.should_continue(1_000_000.0, 0.0, 64_000.0));
    /// assert!(q.should_continue(1_000_000.0, 0.0, 64_001.0));
    /// assert!(q.should_continue(1_000_000.0, 1.0, 10.0));
    /// ```
    pub fn should_continue(&self, endpoint_all: f64, sent: f64, received: f64) -> bool {
        if self.is_unlimited() {
            return true;
        }
        let limit = i64::try_from(self.limit_mb)
            .unwrap_or(i64::MAX)
            .saturating_mul(BYTES_PER_MB);

        let exhausted = endpoint_all as i64 >= limit;
        let trickle = sent as i64 == 0 && received as i64 <= KEEPALIVE_RECEIVED_MAX;
        !(exhausted && trickle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unlimited_never_stops() {
        let q = QuotaPolicy::new(0);
        assert!(q.should_continue(f64::MAX, 0.0, 0.0));
    }

    #[test]
    fn test_below_limit_continues() {
        let q = QuotaPolicy::new(5);
        assert!(q.should_continue(4_999_999.0, 0.0, 0.0));
    }

    #[test]
    fn test_threshold_boundaries_after_limit() {
        let q = QuotaPolicy::new(5);
        let all = 5_000_000.0;
        assert!(!q.should_continue(all, 0.0, 64_000.0));
        assert!(!q.should_continue(all, 0.0, 0.0));
        assert!(q.should_continue(all, 0.0, 64_001.0));
        assert!(q.should_continue(all, 1.0, 0.0));
        assert!(q.should_continue(all, 1.0, 1_000_000.0));
    }

    #[test]
    fn test_fractional_samples_truncate() {
        let q = QuotaPolicy::new(1);
        // 0.9 bytes sent truncates to zero; 64000.9 received truncates to 64000.
        assert!(!q.should_continue(1_000_000.5, 0.9, 64_000.9));
        // Usage just under the limit truncates below it.
        assert!(q.should_continue(999_999.9, 0.0, 0.0));
    }
}
