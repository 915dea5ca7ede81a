//! # Proxy registry: where connected endpoints are announced.
//!
//! An endpoint registers its local address once per launch, when its desired
//! tunnel count is first reached. [`ProxyPool`] is the in-process registry: it
//! keeps each address once and hands them out round-robin to whatever routes
//! traffic across endpoints.

use parking_lot::Mutex;

/// Receiver of "endpoint is reachable" announcements.
pub trait ProxyRegistry: Send + Sync + 'static {
    /// Announces a reachable local proxy address (e.g. `0.0.0.0:1080`).
    fn register(&self, address: &str);
}

/// Registry that ignores announcements.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRegistry;

impl ProxyRegistry for NoopRegistry {
    fn register(&self, _address: &str) {}
}

#[derive(Debug, Default)]
struct PoolInner {
    addresses: Vec<String>,
    cursor: usize,
}

/// In-memory registry with round-robin hand-out.
#[derive(Debug, Default)]
pub struct ProxyPool {
    inner: Mutex<PoolInner>,
}

impl ProxyPool {
    /// Creates an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the next registered address, cycling through all of them.
    pub fn next(&self) -> Option<String> {
        let mut inner = self.inner.lock();
        if inner.addresses.is_empty() {
            return None;
        }
        let idx = inner.cursor % inner.addresses.len();
        inner.cursor = idx + 1;
        Some(inner.addresses[idx].clone())
    }

    /// Registered addresses in registration order.
    pub fn addresses(&self) -> Vec<String> {
        self.inner.lock().addresses.clone()
    }
}

impl ProxyRegistry for ProxyPool {
    fn register(&self, address: &str) {
        let mut inner = self.inner.lock();
        if !inner.addresses.iter().any(|a| a == address) {
            inner.addresses.push(address.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_dedups() {
        let pool = ProxyPool::new();
        pool.register("0.0.0.0:1080");
        pool.register("0.0.0.0:1080");
        pool.register("0.0.0.0:1081");
        assert_eq!(pool.addresses(), vec!["0.0.0.0:1080", "0.0.0.0:1081"]);
    }

    #[test]
    fn test_next_cycles() {
        let pool = ProxyPool::new();
        assert_eq!(pool.next(), None);
        pool.register("a");
        pool.register("b");
        assert_eq!(pool.next().as_deref(), Some("a"));
        assert_eq!(pool.next().as_deref(), Some("b"));
        assert_eq!(pool.next().as_deref(), Some("a"));
    }
}
