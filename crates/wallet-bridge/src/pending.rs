//! Completions waiting for an out-of-band wallet response

use std::collections::HashMap;
use std::hash::Hash;

use tokio::sync::oneshot;

use crate::error::{Result, WalletError};

/// One-shot completions keyed by correlation key (callback action, session
/// topic, or `()` for a single slot). Several waiters may share a key; they
/// all receive the same result.
pub struct PendingTable<K, T> {
    entries: HashMap<K, Vec<oneshot::Sender<Result<T>>>>,
}

impl<K: Eq + Hash, T: Clone> PendingTable<K, T> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Add a waiter for `key`
    pub fn register(&mut self, key: K) -> oneshot::Receiver<Result<T>> {
        let (tx, rx) = oneshot::channel();
        self.entries.entry(key).or_default().push(tx);
        rx
    }

    pub fn is_pending(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Remove `key`, then complete all of its waiters. Returns how many
    /// waiters were completed.
    pub fn resolve(&mut self, key: &K, result: Result<T>) -> usize {
        let Some(waiters) = self.entries.remove(key) else {
            return 0;
        };
        let count = waiters.len();
        for waiter in waiters {
            // A waiter whose caller went away is simply skipped
            let _ = waiter.send(result.clone());
        }
        count
    }

    /// Drop every waiter without a result. Returns how many were dropped.
    pub fn clear(&mut self) -> usize {
        let count = self.entries.values().map(Vec::len).sum();
        self.entries.clear();
        count
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Eq + Hash, T: Clone> Default for PendingTable<K, T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Wait for a registered completion. A completion dropped by `disconnect`
/// resolves as a failed connection.
pub async fn wait<T>(rx: oneshot::Receiver<Result<T>>) -> Result<T> {
    rx.await.unwrap_or_else(|_| {
        Err(WalletError::ConnectionFailed(
            "Connection closed before the wallet responded".to_string(),
        ))
    })
}
