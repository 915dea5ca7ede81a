//! # Relaunch backoff.
//!
//! After a tunnel process exits, the endpoint waits before launching again.
//! [`BackoffPolicy`] computes that wait from the number of consecutive launches
//! that never became fully connected:
//!
//! ```text
//! delay(n) = min(first × factor^n, max), then jitter
//! ```
//!
//! The default is the classic fixed 3 second pause (`factor = 1.0`, no jitter).
//! A launch that reached its desired tunnel count resets `n` to zero.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use tunnelvisor::{BackoffPolicy, JitterPolicy};
//!
//! let fixed = BackoffPolicy::default();
//! assert_eq!(fixed.next(0), Duration::from_secs(3));
//! assert_eq!(fixed.next(7), Duration::from_secs(3));
//!
//! let growing = BackoffPolicy {
//!     first: Duration::from_secs(3),
//!     max: Duration::from_secs(30),
//!     factor: 2.0,
//!     jitter: JitterPolicy::None,
//! };
//! assert_eq!(growing.next(1), Duration::from_secs(6));
//! assert_eq!(growing.next(10), Duration::from_secs(30));
//! ```

use std::time::Duration;

use crate::policies::jitter::JitterPolicy;

/// Delay before the next launch of an endpoint.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BackoffPolicy {
    /// Delay after the first failed launch (and the constant delay when `factor == 1.0`).
    pub first: Duration,
    /// Upper bound on the delay.
    pub max: Duration,
    /// Multiplicative growth per consecutive unconnected launch.
    pub factor: f64,
    /// Randomization applied after clamping.
    pub jitter: JitterPolicy,
}

impl Default for BackoffPolicy {
    /// Fixed 3 s, no growth, no jitter.
    fn default() -> Self {
        Self {
            first: Duration::from_secs(3),
            max: Duration::from_secs(3),
            factor: 1.0,
            jitter: JitterPolicy::None,
        }
    }
}

impl BackoffPolicy {
    /// A constant delay without jitter.
    pub fn fixed(delay: Duration) -> Self {
        Self {
            first: delay,
            max: delay,
            factor: 1.0,
            jitter: JitterPolicy::None,
        }
    }

    /// Computes the delay for `streak` consecutive unconnected launches (0-indexed).
    pub fn next(&self, streak: u32) -> Duration {
        let max_secs = self.max.as_secs_f64();
        let exp = streak.min(i32::MAX as u32) as i32;
        let secs = self.first.as_secs_f64() * self.factor.powi(exp);

        let base = if !secs.is_finite() || secs < 0.0 || secs > max_secs {
            self.max
        } else {
            Duration::from_secs_f64(secs)
        };
        self.jitter.apply(base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_fixed_three_seconds() {
        let policy = BackoffPolicy::default();
        for streak in [0, 1, 5, 1000] {
            assert_eq!(policy.next(streak), Duration::from_secs(3));
        }
    }

    #[test]
    fn test_exponential_growth_clamped() {
        let policy = BackoffPolicy {
            first: Duration::from_millis(100),
            max: Duration::from_secs(1),
            factor: 2.0,
            jitter: JitterPolicy::None,
        };
        assert_eq!(policy.next(0), Duration::from_millis(100));
        assert_eq!(policy.next(2), Duration::from_millis(400));
        assert_eq!(policy.next(4), Duration::from_secs(1));
    }

    #[test]
    fn test_first_exceeding_max_is_clamped() {
        let policy = BackoffPolicy {
            first: Duration::from_secs(10),
            max: Duration::from_secs(5),
            factor: 1.0,
            jitter: JitterPolicy::None,
        };
        assert_eq!(policy.next(0), Duration::from_secs(5));
    }

    #[test]
    fn test_overflow_clamps_to_max() {
        let policy = BackoffPolicy {
            first: Duration::from_millis(100),
            max: Duration::from_secs(10),
            factor: 2.0,
            jitter: JitterPolicy::None,
        };
        assert_eq!(policy.next(u32::MAX), Duration::from_secs(10));
    }

    #[test]
    fn test_fixed_constructor() {
        let policy = BackoffPolicy::fixed(Duration::from_millis(250));
        assert_eq!(policy.next(3), Duration::from_millis(250));
    }
}
