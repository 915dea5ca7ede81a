//! # Alert/Warning disposition rules.
//!
//! [`ALERT_RULES`] is evaluated top to bottom; the first rule that returns a
//! decision wins. Order is part of the contract: `Config migration:` must be
//! skipped before anything else looks at the text, and a `meek round trip failed`
//! message is settled by its own rule even when it also mentions a later marker.
//!
//! ```text
//! 1 config-migration    prefix "Config migration:"                  → Ignore
//! 2 meek-round-trip     contains "meek round trip failed"           → Fatal | Informational
//! 3 component-failure   shutdown / component / closed / duplicate   → Fatal
//! 4 connect-timeout     OS connection-timeout phrase                → Fatal
//! - fallback                                                        → Informational
//! ```
//!
//! Matching is case-sensitive.

/// What to do with an `Alert`/`Warning` notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Skip silently.
    Ignore,
    /// Log (verbose) and keep running.
    Informational,
    /// Log (verbose), stop reading and let the process exit.
    Fatal,
}

/// Tunnel counts the meek rule depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TunnelCounts {
    /// Configured tunnel pool size.
    pub desired: usize,
    /// Tunnels activated since this launch started.
    pub connected: usize,
}

/// One entry of the rule table.
pub struct AlertRule {
    /// Stable rule name (appears in logs and events).
    pub name: &'static str,
    decide: fn(&str, TunnelCounts) -> Option<Disposition>,
}

/// Outcome of [`classify_alert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertVerdict {
    pub disposition: Disposition,
    /// Name of the deciding rule, `"fallback"` when none matched.
    pub rule: &'static str,
}

const MEEK_ROUND_TRIP: &str = "meek round trip failed";

const MEEK_FATAL_EXACT: [&str; 3] = [
    "meek round trip failed: remote error: tls: bad record MAC",
    "meek round trip failed: context deadline exceeded",
    "meek round trip failed: EOF",
];

const COMPONENT_FAILURE_MARKERS: [&str; 7] = [
    "controller shutdown due to component failure",
    "psiphon.(*ServerContext).DoConnectedRequest",
    "psiphon.(*Tunnel).sendSshKeepAlive",
    "psiphon.(*Tunnel).Activate",
    "underlying conn is closed",
    "duplicate tunnel:",
    "tunnel failed:",
];

const CONNECT_TIMEOUT: &str = "A connection attempt failed because the connected party did not properly respond after a period of time";

fn config_migration(message: &str, _: TunnelCounts) -> Option<Disposition> {
    message
        .starts_with("Config migration:")
        .then_some(Disposition::Ignore)
}

fn meek_round_trip(message: &str, counts: TunnelCounts) -> Option<Disposition> {
    if !message.contains(MEEK_ROUND_TRIP) {
        return None;
    }
    let single_and_up = counts.desired == 1 && counts.connected == counts.desired;
    let known_failure =
        MEEK_FATAL_EXACT.contains(&message) || message.contains("psiphon.CustomTLSDial");

    if single_and_up && known_failure {
        Some(Disposition::Fatal)
    } else {
        Some(Disposition::Informational)
    }
}

fn component_failure(message: &str, _: TunnelCounts) -> Option<Disposition> {
    COMPONENT_FAILURE_MARKERS
        .iter()
        .any(|m| message.contains(m))
        .then_some(Disposition::Fatal)
}

fn connect_timeout(message: &str, _: TunnelCounts) -> Option<Disposition> {
    message
        .contains(CONNECT_TIMEOUT)
        .then_some(Disposition::Fatal)
}

/// Ordered rule table.
pub const ALERT_RULES: &[AlertRule] = &[
    AlertRule {
        name: "config-migration",
        decide: config_migration,
    },
    AlertRule {
        name: "meek-round-trip",
        decide: meek_round_trip,
    },
    AlertRule {
        name: "component-failure",
        decide: component_failure,
    },
    AlertRule {
        name: "connect-timeout",
        decide: connect_timeout,
    },
];

impl AlertRule {
    /// Applies this rule alone.
    pub fn decide(&self, message: &str, counts: TunnelCounts) -> Option<Disposition> {
        (self.decide)(message, counts)
    }
}

/// Classifies an `Alert`/`Warning` message.
///
/// # Example
/// ```
/// use tunnelvisor::notice::{classify_alert, Disposition, TunnelCounts};
///
/// let counts = TunnelCounts { desired: 1, connected: 1 };
/// assert_eq!(classify_alert("tunnel failed: reset", counts).disposition, Disposition::Fatal);
/// assert_eq!(classify_alert("Config migration: x", counts).disposition, Disposition::Ignore);
/// ```
pub fn classify_alert(message: &str, counts: TunnelCounts) -> AlertVerdict {
    ALERT_RULES
        .iter()
        .find_map(|rule| {
            rule.decide(message, counts).map(|disposition| AlertVerdict {
                disposition,
                rule: rule.name,
            })
        })
        .unwrap_or(AlertVerdict {
            disposition: Disposition::Informational,
            rule: "fallback",
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SINGLE_UP: TunnelCounts = TunnelCounts {
        desired: 1,
        connected: 1,
    };

    fn disposition(message: &str, counts: TunnelCounts) -> Disposition {
        classify_alert(message, counts).disposition
    }

    #[test]
    fn test_config_migration_is_ignored_first() {
        assert_eq!(disposition("Config migration: x", SINGLE_UP), Disposition::Ignore);
        // Rule 1 wins even when a later marker is present.
        assert_eq!(
            disposition("Config migration: tunnel failed: x", SINGLE_UP),
            Disposition::Ignore
        );
        // Prefix only: the phrase later in the text does not count.
        assert_eq!(
            disposition("note Config migration: x", SINGLE_UP),
            Disposition::Informational
        );
    }

    #[test]
    fn test_meek_exact_messages_fatal_when_single_tunnel_up() {
        for msg in MEEK_FATAL_EXACT {
            assert_eq!(disposition(msg, SINGLE_UP), Disposition::Fatal, "{msg}");
        }
        assert_eq!(
            disposition(
                "meek round trip failed: psiphon.CustomTLSDial: handshake",
                SINGLE_UP
            ),
            Disposition::Fatal
        );
    }

    #[test]
    fn test_meek_informational_otherwise() {
        let msg = "meek round trip failed: EOF";
        let two = TunnelCounts {
            desired: 2,
            connected: 2,
        };
        let not_up = TunnelCounts {
            desired: 1,
            connected: 0,
        };
        assert_eq!(disposition(msg, two), Disposition::Informational);
        assert_eq!(disposition(msg, not_up), Disposition::Informational);
        assert_eq!(
            disposition("meek round trip failed: something else", SINGLE_UP),
            Disposition::Informational
        );
    }

    #[test]
    fn test_meek_rule_settles_before_component_markers() {
        let verdict = classify_alert("meek round trip failed: tunnel failed: x", TunnelCounts {
            desired: 3,
            connected: 1,
        });
        assert_eq!(verdict.disposition, Disposition::Informational);
        assert_eq!(verdict.rule, "meek-round-trip");
    }

    #[test]
    fn test_component_failures_are_fatal() {
        let counts = TunnelCounts {
            desired: 10,
            connected: 3,
        };
        for msg in [
            "tunnel failed: reset",
            "controller shutdown due to component failure",
            "psiphon.(*Tunnel).Activate: error",
            "read: underlying conn is closed",
            "duplicate tunnel: abc",
        ] {
            let verdict = classify_alert(msg, counts);
            assert_eq!(verdict.disposition, Disposition::Fatal, "{msg}");
            assert_eq!(verdict.rule, "component-failure");
        }
    }

    #[test]
    fn test_connect_timeout_is_fatal() {
        let msg = format!("dial tcp: {CONNECT_TIMEOUT}, or established connection failed");
        let verdict = classify_alert(&msg, TunnelCounts::default());
        assert_eq!(verdict.disposition, Disposition::Fatal);
        assert_eq!(verdict.rule, "connect-timeout");
    }

    #[test]
    fn test_matching_is_case_sensitive() {
        assert_eq!(
            disposition("Tunnel Failed: reset", SINGLE_UP),
            Disposition::Informational
        );
    }

    #[test]
    fn test_fallback_is_informational() {
        let verdict = classify_alert("fetching remote server list", SINGLE_UP);
        assert_eq!(verdict.disposition, Disposition::Informational);
        assert_eq!(verdict.rule, "fallback");
    }
}
