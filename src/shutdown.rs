//! Shutdown Signal
//!
//! A single process-wide stop signal, fanned out to every connection
//! through a `tokio::sync::watch` channel. The server owns the sender and
//! flips it to `true` once; each connection holds a [`Shutdown`] listener.

use tokio::sync::watch;

/// Listens for the server-wide shutdown signal.
///
/// Once the signal has been observed it stays observed. A dropped sender
/// also counts as shutdown, so a listener never waits forever on a server
/// that is gone.
#[derive(Debug, Clone)]
pub struct Shutdown {
    /// `true` once the signal has been seen through `recv`
    is_shutdown: bool,

    notify: watch::Receiver<bool>,
}

impl Shutdown {
    /// Creates a listener from the receiving half of the server's channel.
    pub fn new(notify: watch::Receiver<bool>) -> Self {
        Self {
            is_shutdown: false,
            notify,
        }
    }

    /// Non-blocking check.
    pub fn is_shutdown(&self) -> bool {
        self.is_shutdown || *self.notify.borrow()
    }

    /// Waits until the signal fires. Returns immediately if it already has.
    pub async fn recv(&mut self) {
        if self.is_shutdown {
            return;
        }

        // Err means the sender is gone: treat it the same as a signal
        let _ = self.notify.wait_for(|stop| *stop).await;

        self.is_shutdown = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_recv_after_signal() {
        let (tx, rx) = watch::channel(false);
        let mut shutdown = Shutdown::new(rx);

        assert!(!shutdown.is_shutdown());

        tx.send(true).unwrap();
        shutdown.recv().await;
        assert!(shutdown.is_shutdown());

        // Already observed: returns at once
        shutdown.recv().await;
    }

    #[tokio::test]
    async fn test_recv_blocks_until_signal() {
        let (tx, rx) = watch::channel(false);
        let mut shutdown = Shutdown::new(rx);

        let pending = tokio::time::timeout(Duration::from_millis(50), shutdown.recv()).await;
        assert!(pending.is_err());

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), shutdown.recv())
            .await
            .expect("shutdown should be observed");
    }

    #[tokio::test]
    async fn test_dropped_sender_counts_as_shutdown() {
        let (tx, rx) = watch::channel(false);
        let mut shutdown = Shutdown::new(rx);

        drop(tx);
        tokio::time::timeout(Duration::from_secs(1), shutdown.recv())
            .await
            .expect("dropped sender should release the listener");
        assert!(shutdown.is_shutdown());
    }
}
