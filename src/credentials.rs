//! # Round-robin authorization credentials.
//!
//! [`CredentialRotator`] hands out one token per tunnel launch and moves it to
//! the back of the queue. One rotator is shared (via `Arc`) by every endpoint
//! launched from the same [`TunnelConfig`](crate::TunnelConfig), so the queue
//! lives behind a mutex and a pop/push pair never interleaves with another.
//!
//! ```text
//! [A, B, C] ── next() → [A] ──► [B, C, A]
//!           ── next() → [B] ──► [C, A, B]
//! []        ── next() → []  ──► []
//! ```

use std::collections::VecDeque;

use parking_lot::Mutex;

/// Mutex-guarded token queue with round-robin hand-out.
#[derive(Debug, Default)]
pub struct CredentialRotator {
    tokens: Mutex<VecDeque<String>>,
}

impl CredentialRotator {
    /// Creates a rotator over the given tokens (front first).
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tokens: Mutex::new(tokens.into_iter().map(Into::into).collect()),
        }
    }

    /// Returns zero or one token for the next launch.
    ///
    /// An empty pool is a valid steady state and yields an empty list.
    pub fn next(&self) -> Vec<String> {
        let mut tokens = self.tokens.lock();
        match tokens.pop_front() {
            Some(token) => {
                tokens.push_back(token.clone());
                vec![token]
            }
            None => Vec::new(),
        }
    }

    /// Number of tokens in the pool.
    pub fn len(&self) -> usize {
        self.tokens.lock().len()
    }

    /// True when the pool holds no tokens.
    pub fn is_empty(&self) -> bool {
        self.tokens.lock().is_empty()
    }
}
