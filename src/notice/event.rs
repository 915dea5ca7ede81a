//! # Parsing one diagnostic line.
//!
//! Tolerant reader: unknown notice types, malformed JSON and records missing a
//! required field all become [`NoticeEvent::Unrecognized`]. Parsing never fails.

use serde::Deserialize;
use serde_json::Value;

/// Typed view of one diagnostic line.
#[derive(Debug, Clone, PartialEq)]
pub enum NoticeEvent {
    /// Periodic traffic sample for one tunnel.
    BytesTransferred {
        diagnostic_id: String,
        sent: f64,
        received: f64,
    },
    /// One tunnel finished its handshake and is usable.
    ActiveTunnel { diagnostic_id: String },
    /// Alert notice text.
    Alert { message: String },
    /// Warning notice text.
    Warning { message: String },
    /// Anything else; dropped by the reader.
    Unrecognized,
}

#[derive(Deserialize)]
struct RawNotice {
    #[serde(rename = "noticeType")]
    notice_type: String,
    #[serde(default)]
    data: Value,
}

#[derive(Deserialize)]
struct BytesData {
    #[serde(rename = "diagnosticID")]
    diagnostic_id: String,
    sent: f64,
    received: f64,
}

#[derive(Deserialize)]
struct TunnelData {
    #[serde(rename = "diagnosticID")]
    diagnostic_id: String,
}

#[derive(Deserialize)]
struct MessageData {
    message: String,
}

impl NoticeEvent {
    /// Parses one raw diagnostic line.
    ///
    /// # Example
    /// ```
    /// use tunnelvisor::NoticeEvent;
    ///
    /// let ev = NoticeEvent::parse(r#"{"noticeType":"Alert","data":{"message":"hi"}}"#);
    /// assert_eq!(ev, NoticeEvent::Alert { message: "hi".into() });
    /// assert_eq!(NoticeEvent::parse("not json"), NoticeEvent::Unrecognized);
    /// ```
    pub fn parse(line: &str) -> Self {
        let Ok(raw) = serde_json::from_str::<RawNotice>(line.trim()) else {
            return NoticeEvent::Unrecognized;
        };
        Self::from_parts(&raw.notice_type, raw.data).unwrap_or(NoticeEvent::Unrecognized)
    }

    fn from_parts(notice_type: &str, data: Value) -> Option<Self> {
        match notice_type {
            "BytesTransferred" => {
                let d: BytesData = serde_json::from_value(data).ok()?;
                Some(NoticeEvent::BytesTransferred {
                    diagnostic_id: d.diagnostic_id,
                    sent: d.sent,
                    received: d.received,
                })
            }
            "ActiveTunnel" => {
                let d: TunnelData = serde_json::from_value(data).ok()?;
                Some(NoticeEvent::ActiveTunnel {
                    diagnostic_id: d.diagnostic_id,
                })
            }
            "Alert" => {
                let d: MessageData = serde_json::from_value(data).ok()?;
                Some(NoticeEvent::Alert { message: d.message })
            }
            "Warning" => {
                let d: MessageData = serde_json::from_value(data).ok()?;
                Some(NoticeEvent::Warning { message: d.message })
            }
            _ => None,
        }
    }

    /// Message text for `Alert`/`Warning`, `None` otherwise.
    pub fn message(&self) -> Option<&str> {
        match self {
            NoticeEvent::Alert { message } | NoticeEvent::Warning { message } => Some(message),
            _ => None,
        }
    }
}
