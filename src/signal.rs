//! One-shot broadcast signals for lifecycle coordination.
//!
//! A [`Signal`] fires exactly once, carries no payload, and is observed by
//! any number of waiters — including waiters that subscribe after the fact.
//! The runtime owns two of them: the shutdown signal (fired by
//! [`shutdown`](crate::subscriber::SubscriberHandle::shutdown)) and the done
//! signal (fired when every worker has exited).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::info;

/// A single-writer, multi-reader, fire-once event.
#[derive(Clone)]
pub struct Signal {
    fired: Arc<AtomicBool>,
    sender: broadcast::Sender<()>,
}

impl Signal {
    /// Create a new unfired signal.
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1);
        Self {
            fired: Arc::new(AtomicBool::new(false)),
            sender,
        }
    }

    /// Fire the signal, waking all current and future waiters.
    ///
    /// Idempotent: only the first call fires. Returns `true` if this call
    /// was the one that fired it.
    pub fn fire(&self) -> bool {
        if self.fired.swap(true, Ordering::SeqCst) {
            return false;
        }
        // No receivers is fine; late waiters observe the fired flag.
        let _ = self.sender.send(());
        true
    }

    /// Non-blocking check whether the signal has fired.
    pub fn is_fired(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }

    /// Wait until the signal fires. Returns immediately if it already has.
    pub async fn wait(&self) {
        // Subscribe before checking the flag so a concurrent fire() cannot
        // slip between the check and the recv.
        let mut receiver = self.sender.subscribe();
        if self.is_fired() {
            return;
        }
        let _ = receiver.recv().await;
    }
}

impl Default for Signal {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("fired", &self.is_fired())
            .finish()
    }
}

/// Wait for process termination (SIGTERM or SIGINT).
///
/// Intended for binaries embedding the runtime: wait for this, then call
/// [`shutdown`](crate::subscriber::SubscriberHandle::shutdown).
pub async fn wait_for_termination() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_fire_wakes_pending_waiter() {
        let signal = Signal::new();
        let waiter = signal.clone();

        let handle = tokio::spawn(async move {
            waiter.wait().await;
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(signal.fire());

        tokio::time::timeout(Duration::from_millis(100), handle)
            .await
            .expect("waiter did not wake")
            .unwrap();
    }

    #[tokio::test]
    async fn test_late_waiter_returns_immediately() {
        let signal = Signal::new();
        signal.fire();

        // Must not hang even though the broadcast was sent before subscribing.
        tokio::time::timeout(Duration::from_millis(100), signal.wait())
            .await
            .expect("late waiter hung");
    }

    #[tokio::test]
    async fn test_fire_is_idempotent() {
        let signal = Signal::new();
        assert!(!signal.is_fired());
        assert!(signal.fire());
        assert!(!signal.fire());
        assert!(signal.is_fired());
    }

    #[tokio::test]
    async fn test_multiple_waiters_all_wake() {
        let signal = Signal::new();

        let mut handles = Vec::new();
        for _ in 0..4 {
            let waiter = signal.clone();
            handles.push(tokio::spawn(async move { waiter.wait().await }));
        }

        tokio::time::sleep(Duration::from_millis(10)).await;
        signal.fire();

        for handle in handles {
            tokio::time::timeout(Duration::from_millis(100), handle)
                .await
                .expect("waiter did not wake")
                .unwrap();
        }
    }
}
