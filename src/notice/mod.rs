//! Diagnostic notices emitted by the tunnel core.
//!
//! The tunnel core writes one JSON object per line on its diagnostic stream:
//!
//! ```text
//! {"noticeType":"BytesTransferred","data":{"diagnosticID":"a1","sent":120,"received":4096},"timestamp":"…"}
//! {"noticeType":"ActiveTunnel","data":{"diagnosticID":"a1","protocol":"FRONTED-MEEK-OSSH"}}
//! {"noticeType":"Warning","data":{"message":"tunnel failed: …"}}
//! ```
//!
//! ## Contents
//! - [`NoticeEvent`] typed view of one line; anything unknown or malformed is `Unrecognized`
//! - [`ALERT_RULES`] ordered rule table deciding what an `Alert`/`Warning` means
//! - [`classify_alert`] evaluates the table top to bottom

mod event;
mod rules;

pub use event::NoticeEvent;
pub use rules::{ALERT_RULES, AlertRule, AlertVerdict, Disposition, TunnelCounts, classify_alert};
