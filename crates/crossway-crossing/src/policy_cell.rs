//! Latest policy snapshot received from the hub

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crossway_core::{Policy, ShutdownSignal};

/// Cloneable handle. Empty until the hub's first POLICY arrives.
#[derive(Clone, Debug)]
pub struct PolicyCell {
    tx: Arc<watch::Sender<Option<Arc<Policy>>>>,
}

impl PolicyCell {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        PolicyCell { tx: Arc::new(tx) }
    }

    /// Replace the snapshot as a whole
    pub fn set(&self, policy: Policy) {
        self.tx.send_replace(Some(Arc::new(policy)));
    }

    pub fn current(&self) -> Option<Arc<Policy>> {
        self.tx.borrow().clone()
    }

    /// Wait for a snapshot, re-checking at least every `poll`.
    /// None when shutdown arrives first.
    pub async fn wait_ready(&self, poll: Duration, shutdown: &ShutdownSignal) -> Option<Arc<Policy>> {
        let mut rx = self.tx.subscribe();
        let mut warned = false;

        loop {
            if let Some(policy) = rx.borrow_and_update().clone() {
                return Some(policy);
            }
            if shutdown.is_triggered() {
                return None;
            }
            if !warned {
                tracing::info!("waiting for policy");
                warned = true;
            }
            tokio::select! {
                _ = rx.changed() => {}
                _ = tokio::time::sleep(poll) => {}
                _ = shutdown.wait() => return None,
            }
        }
    }
}

impl Default for PolicyCell {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_wait_ready_parks_until_set() {
        let cell = PolicyCell::new();
        let shutdown = Arc::new(ShutdownSignal::new());

        let waiter = {
            let cell = cell.clone();
            let shutdown = Arc::clone(&shutdown);
            tokio::spawn(async move { cell.wait_ready(Duration::from_millis(10), &shutdown).await })
        };
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(!waiter.is_finished());

        cell.set(Policy::hybrid());
        let got = timeout(Duration::from_secs(1), waiter).await.unwrap().unwrap();
        assert_eq!(*got.unwrap(), Policy::hybrid());
    }

    #[tokio::test]
    async fn test_wait_ready_yields_to_shutdown() {
        let cell = PolicyCell::new();
        let shutdown = ShutdownSignal::new();
        shutdown.trigger();
        assert!(cell.wait_ready(Duration::from_millis(10), &shutdown).await.is_none());
    }

    #[test]
    fn test_set_replaces_snapshot() {
        let cell = PolicyCell::new();
        assert!(cell.current().is_none());
        cell.set(Policy::hybrid());
        let before = cell.current().unwrap();
        cell.set(Policy { min_green: 9, ..Policy::hybrid() });
        assert_eq!(before.min_green, 5);
        assert_eq!(cell.current().unwrap().min_green, 9);
    }
}
