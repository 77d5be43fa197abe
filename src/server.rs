//! TCP Server (Connection Acceptor)
//!
//! Owns the listening socket and spawns one task per accepted connection.
//!
//! ## Admission Control
//!
//! A counting semaphore with `max_connections` permits guards `accept`.
//! A permit is taken *before* accepting, so when every permit is out the
//! loop stops accepting and new clients wait in the kernel backlog until a
//! connection finishes. The permit travels into the connection task and is
//! released when that task ends, whether it returned or panicked.
//!
//! ## Fault Isolation
//!
//! Each connection future runs under `catch_unwind`. A panic is logged
//! with the peer address and ends only that connection.
//!
//! ## Shutdown
//!
//! ```text
//! Listening ──> Accepting ──(shutdown future resolves)──> ShuttingDown ──> Stopped
//!                                                           │
//!                                                           ├─ stop accepting, close listener
//!                                                           ├─ notify every connection
//!                                                           └─ wait for every connection task
//! ```

use crate::commands::QueryExecutor;
use crate::connection::{handle_connection, ConnectionLimits, ConnectionStats};
use crate::shutdown::Shutdown;
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, error, info};

/// Default maximum concurrent connections
pub const DEFAULT_MAX_CONNECTIONS: usize = 100;

/// Default maximum request line size (2 KB)
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 2 * 1024;

/// Default idle timeout
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// Limits applied by the acceptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerConfig {
    /// Maximum concurrent connections (0 = unbounded)
    pub max_connections: usize,
    /// Maximum request line size in bytes (0 = unlimited)
    pub max_message_size: usize,
    /// Time from accept after which a connection is closed (0 = never)
    pub idle_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }
}

/// The connection acceptor.
pub struct Server {
    listener: TcpListener,

    executor: Arc<dyn QueryExecutor>,

    config: ServerConfig,

    /// `None` when `max_connections` is 0
    limit_connections: Option<Arc<Semaphore>>,

    /// Flipped to `true` once on shutdown
    notify_shutdown: watch::Sender<bool>,

    stats: Arc<ConnectionStats>,
}

impl Server {
    /// Creates a server on an already bound listener.
    pub fn new(
        listener: TcpListener,
        executor: Arc<dyn QueryExecutor>,
        config: ServerConfig,
    ) -> Self {
        let limit_connections = match config.max_connections {
            0 => None,
            n => Some(Arc::new(Semaphore::new(n))),
        };
        let (notify_shutdown, _) = watch::channel(false);

        Self {
            listener,
            executor,
            config,
            limit_connections,
            notify_shutdown,
            stats: Arc::new(ConnectionStats::new()),
        }
    }

    /// The address the listener is bound to.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Shared connection statistics.
    pub fn stats(&self) -> Arc<ConnectionStats> {
        Arc::clone(&self.stats)
    }

    /// Accepts connections until `shutdown` resolves, then waits for
    /// every in-flight connection to finish.
    pub async fn run(mut self, shutdown: impl Future) {
        let addr = self.listener.local_addr().ok();
        info!(addr = ?addr, "start serve");

        let mut connections = JoinSet::new();

        tokio::select! {
            _ = self.accept_loop(&mut connections) => {}
            _ = shutdown => {
                info!("Shutdown signal received, stopping server...");
            }
        }

        let Server {
            listener,
            notify_shutdown,
            stats,
            ..
        } = self;

        drop(listener);
        notify_shutdown.send_replace(true);

        let in_flight = connections.len();
        if in_flight > 0 {
            info!(connections = in_flight, "Waiting for connections to finish");
        }
        while let Some(result) = connections.join_next().await {
            if let Err(e) = result {
                error!(error = %e, "Connection task failed");
            }
        }

        info!(
            accepted = stats.connections_accepted.load(Ordering::Relaxed),
            commands = stats.commands_processed.load(Ordering::Relaxed),
            "Server stopped"
        );
    }

    /// Admit, accept, spawn; forever.
    async fn accept_loop(&mut self, connections: &mut JoinSet<()>) {
        loop {
            // Reap finished connection tasks so the set does not grow
            while connections.try_join_next().is_some() {}

            let permit = match &self.limit_connections {
                Some(semaphore) => match Arc::clone(semaphore).acquire_owned().await {
                    Ok(permit) => Some(permit),
                    // Never closed while the server is alive
                    Err(_) => return,
                },
                None => None,
            };

            let (stream, addr) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    error!(error = %e, "failed to accept conn");
                    drop(permit);
                    continue;
                }
            };

            // Set once here and never extended
            let idle_timeout = self.config.idle_timeout;
            let limits = ConnectionLimits {
                deadline: connection_deadline(Instant::now(), idle_timeout),
                max_message_size: self.config.max_message_size,
            };

            debug!(client = %addr, "Accepted connection");
            self.stats.connection_opened();

            let stats = Arc::clone(&self.stats);
            let connection = handle_connection(
                stream,
                addr,
                Arc::clone(&self.executor),
                limits,
                Shutdown::new(self.notify_shutdown.subscribe()),
                Arc::clone(&stats),
            );

            connections.spawn(async move {
                if let Err(panic) = AssertUnwindSafe(connection).catch_unwind().await {
                    error!(
                        client = %addr,
                        panic = panic_message(&*panic),
                        "panic while serving connection"
                    );
                }
                stats.connection_closed();
                drop(permit);
            });
        }
    }
}

/// The one-shot read deadline for a connection accepted at `now`.
///
/// A zero timeout, or one too large to represent, means no deadline.
fn connection_deadline(now: Instant, idle_timeout: Duration) -> Option<Instant> {
    if idle_timeout.is_zero() {
        return None;
    }
    now.checked_add(idle_timeout)
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::CommandHandler;
    use crate::storage::StorageEngine;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;
    use tokio::sync::oneshot;

    struct PanicOnBoom;

    impl QueryExecutor for PanicOnBoom {
        fn run_command(&self, raw: &str) -> String {
            if raw == "boom" {
                panic!("boom requested");
            }
            format!("echo {}", raw)
        }
    }

    async fn start(
        executor: Arc<dyn QueryExecutor>,
        config: ServerConfig,
    ) -> (
        SocketAddr,
        Arc<ConnectionStats>,
        oneshot::Sender<()>,
        tokio::task::JoinHandle<()>,
    ) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let server = Server::new(listener, executor, config);
        let addr = server.local_addr().unwrap();
        let stats = server.stats();
        let (tx, rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(server.run(async move {
            let _ = rx.await;
        }));
        (addr, stats, tx, handle)
    }

    async fn request(client: &mut TcpStream, line: &str) -> String {
        client.write_all(line.as_bytes()).await.unwrap();
        let mut buf = [0u8; 2048];
        let n = tokio::time::timeout(Duration::from_secs(2), client.read(&mut buf))
            .await
            .expect("response timed out")
            .unwrap();
        String::from_utf8_lossy(&buf[..n]).into_owned()
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(&*payload), "static");

        let payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(&*payload), "owned");

        let payload: Box<dyn Any + Send> = Box::new(42u32);
        assert_eq!(panic_message(&*payload), "unknown panic payload");
    }

    #[tokio::test]
    async fn test_serves_commands() {
        let storage = Arc::new(StorageEngine::new());
        let (addr, stats, _tx, _handle) = start(
            Arc::new(CommandHandler::new(storage)),
            ServerConfig::default(),
        )
        .await;

        let mut client = TcpStream::connect(addr).await.unwrap();
        assert_eq!(request(&mut client, "set foo bar\n").await, "ok");
        assert_eq!(request(&mut client, "get foo\n").await, "bar");

        assert_eq!(stats.connections_accepted.load(Ordering::Relaxed), 1);
        assert_eq!(stats.commands_processed.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn test_panic_is_isolated() {
        let (addr, stats, _tx, _handle) =
            start(Arc::new(PanicOnBoom), ServerConfig::default()).await;

        let mut healthy = TcpStream::connect(addr).await.unwrap();
        let mut faulty = TcpStream::connect(addr).await.unwrap();

        assert_eq!(request(&mut healthy, "first\n").await, "echo first");

        faulty.write_all(b"boom\n").await.unwrap();
        let mut buf = [0u8; 64];
        let n = tokio::time::timeout(Duration::from_secs(2), faulty.read(&mut buf))
            .await
            .expect("faulty connection should be closed")
            .unwrap_or(0);
        assert_eq!(n, 0);

        assert_eq!(request(&mut healthy, "second\n").await, "echo second");

        // The acceptor is still accepting
        let mut late = TcpStream::connect(addr).await.unwrap();
        assert_eq!(request(&mut late, "third\n").await, "echo third");

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(stats.active_connections.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn test_admission_limit_stalls_extra_connection() {
        let config = ServerConfig {
            max_connections: 1,
            ..ServerConfig::default()
        };
        let (addr, _stats, _tx, _handle) = start(Arc::new(PanicOnBoom), config).await;

        let mut first = TcpStream::connect(addr).await.unwrap();
        assert_eq!(request(&mut first, "a\n").await, "echo a");

        // Kernel completes the handshake, but the server does not accept it
        let mut second = TcpStream::connect(addr).await.unwrap();
        second.write_all(b"b\n").await.unwrap();
        let mut buf = [0u8; 64];
        let stalled =
            tokio::time::timeout(Duration::from_millis(200), second.read(&mut buf)).await;
        assert!(stalled.is_err(), "second connection must wait for a slot");

        drop(first);

        let n = tokio::time::timeout(Duration::from_secs(2), second.read(&mut buf))
            .await
            .expect("second connection should be served once a slot frees")
            .unwrap();
        assert_eq!(&buf[..n], b"echo b");
    }

    #[tokio::test]
    async fn test_panic_releases_slot() {
        let config = ServerConfig {
            max_connections: 1,
            ..ServerConfig::default()
        };
        let (addr, _stats, _tx, _handle) = start(Arc::new(PanicOnBoom), config).await;

        let mut faulty = TcpStream::connect(addr).await.unwrap();
        faulty.write_all(b"boom\n").await.unwrap();

        let mut next = TcpStream::connect(addr).await.unwrap();
        assert_eq!(request(&mut next, "after\n").await, "echo after");
    }

    #[tokio::test]
    async fn test_unbounded_when_zero() {
        let config = ServerConfig {
            max_connections: 0,
            ..ServerConfig::default()
        };
        let (addr, stats, _tx, _handle) = start(Arc::new(PanicOnBoom), config).await;

        let mut clients = Vec::new();
        for i in 0..8 {
            let mut client = TcpStream::connect(addr).await.unwrap();
            assert_eq!(
                request(&mut client, &format!("c{}\n", i)).await,
                format!("echo c{}", i)
            );
            clients.push(client);
        }

        assert_eq!(stats.active_connections.load(Ordering::Relaxed), 8);
    }

    #[tokio::test]
    async fn test_shutdown_waits_and_closes_connections() {
        let (addr, stats, tx, handle) =
            start(Arc::new(PanicOnBoom), ServerConfig::default()).await;

        let mut client = TcpStream::connect(addr).await.unwrap();
        assert_eq!(request(&mut client, "hi\n").await, "echo hi");

        tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("server should stop")
            .unwrap();

        assert_eq!(stats.active_connections.load(Ordering::Relaxed), 0);

        let mut buf = [0u8; 16];
        let n = client.read(&mut buf).await.unwrap_or(0);
        assert_eq!(n, 0);

        assert!(TcpStream::connect(addr).await.is_err());
    }

    #[test]
    fn test_connection_deadline() {
        let now = Instant::now();

        assert_eq!(connection_deadline(now, Duration::ZERO), None);
        assert_eq!(connection_deadline(now, Duration::MAX), None);
        assert_eq!(
            connection_deadline(now, Duration::from_secs(60)),
            Some(now + Duration::from_secs(60))
        );
    }

    #[tokio::test]
    async fn test_huge_idle_timeout_keeps_accepting() {
        let config = ServerConfig {
            idle_timeout: Duration::MAX,
            ..ServerConfig::default()
        };
        let (addr, _stats, tx, handle) = start(Arc::new(PanicOnBoom), config).await;

        let mut first = TcpStream::connect(addr).await.unwrap();
        assert_eq!(request(&mut first, "one\n").await, "echo one");
        let mut second = TcpStream::connect(addr).await.unwrap();
        assert_eq!(request(&mut second, "two\n").await, "echo two");
        assert!(!handle.is_finished());

        drop(first);
        drop(second);
        tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("server should stop")
            .unwrap();
    }
}
