//! Cooperative control signals for the prober pool
//!
//! Two watch-channel based primitives:
//!
//! - [`WorkerGate`] - the pause/resume gate probers check before drawing a new
//!   ID. Closing it never interrupts an in-flight probe, only the next draw.
//!   The aggregator's critical section is the single set/clear authority.
//! - [`Shutdown`] - a one-way global stop flag observed by the ID source, the
//!   probers, the aggregator, and the moderation gate.

use tokio::sync::watch;

/// Open/closed gate that prober workers wait on without busy-polling
#[derive(Debug)]
pub struct WorkerGate {
    tx: watch::Sender<bool>,
}

impl WorkerGate {
    /// Create a gate in the open state
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(true);
        Self { tx }
    }

    /// Close the gate; workers block before their next ID draw
    pub fn pause(&self) {
        let _ = self.tx.send(false);
    }

    /// Reopen the gate
    pub fn resume(&self) {
        let _ = self.tx.send(true);
    }

    /// Current gate state
    pub fn is_open(&self) -> bool {
        *self.tx.borrow()
    }

    /// Create a watcher for one worker
    pub fn watcher(&self) -> GateWatcher {
        GateWatcher {
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for WorkerGate {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-worker view of the gate
#[derive(Debug, Clone)]
pub struct GateWatcher {
    rx: watch::Receiver<bool>,
}

impl GateWatcher {
    /// Wait until the gate is open.
    ///
    /// Returns immediately when already open. A dropped gate counts as open so
    /// workers fall through to the stop-flag check instead of hanging.
    pub async fn wait_open(&mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                return;
            }
            if self.rx.changed().await.is_err() {
                return;
            }
        }
    }
}

/// Global stop flag. Cloned freely; triggering is one-way and idempotent.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: std::sync::Arc<watch::Sender<bool>>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self {
            tx: std::sync::Arc::new(tx),
        }
    }

    /// Request a global stop
    pub fn trigger(&self) {
        let _ = self.tx.send(true);
    }

    /// Whether a stop has been requested
    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    /// Wait until a stop is requested
    pub async fn triggered(&self) {
        let mut rx = self.tx.subscribe();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_open_gate_does_not_block() {
        let gate = WorkerGate::new();
        assert!(gate.is_open());

        let mut watcher = gate.watcher();
        tokio::time::timeout(Duration::from_millis(50), watcher.wait_open())
            .await
            .expect("open gate must not block");
    }

    #[tokio::test]
    async fn test_closed_gate_blocks_until_resume() {
        let gate = WorkerGate::new();
        gate.pause();
        assert!(!gate.is_open());

        let mut watcher = gate.watcher();
        let blocked = tokio::time::timeout(Duration::from_millis(50), watcher.wait_open()).await;
        assert!(blocked.is_err(), "closed gate must block");

        gate.resume();
        tokio::time::timeout(Duration::from_millis(50), watcher.wait_open())
            .await
            .expect("resumed gate must release waiters");
    }

    #[tokio::test]
    async fn test_shutdown_releases_all_clones() {
        let shutdown = Shutdown::new();
        assert!(!shutdown.is_triggered());

        let waiter = shutdown.clone();
        let handle = tokio::spawn(async move { waiter.triggered().await });

        shutdown.trigger();
        shutdown.trigger(); // idempotent

        tokio::time::timeout(Duration::from_millis(100), handle)
            .await
            .expect("shutdown must release waiters")
            .unwrap();
        assert!(shutdown.is_triggered());
    }
}
