//! Connection Handler Module
//!
//! This module handles individual client connections to linekv.
//! Each client gets its own handler task that runs in a loop,
//! reading request lines and sending responses.
//!
//! ## Connection Lifecycle
//!
//! ```text
//! 1. Client connects, deadline = accept time + idle timeout
//!        │
//!        ▼
//! 2. ┌──────────────────────────────┐
//!    │      Main Loop               │
//!    │                              │
//!    │  shutdown? ──yes──> exit     │
//!    │      │                       │
//!    │      ▼                       │
//!    │  Read one line (Reading)     │
//!    │      │                       │
//!    │      ▼                       │
//!    │  Run command (Dispatching)   │
//!    │      │                       │
//!    │      ▼                       │
//!    │  Send response (Writing)     │
//!    │      │                       │
//!    │      ▼                       │
//!    │  [Loop back]                 │
//!    └──────────────────────────────┘
//!        │
//!        ▼
//! 3. Timeout / error / EOF / shutdown (Closing)
//!        │
//!        ▼
//! 4. Handler dropped, socket closed
//! ```
//!
//! ## Buffer Management
//!
//! Incoming bytes accumulate in a `BytesMut`. TCP is a stream, so one read
//! can hold half a line or several lines; complete lines are split off the
//! front and served in arrival order.
//!
//! ## Idle Deadline
//!
//! The read deadline is fixed when the connection is accepted and is not
//! pushed back by later reads. A connection is closed once that deadline
//! passes, however recently it last sent a request.

use crate::commands::QueryExecutor;
use crate::shutdown::Shutdown;
use bytes::{Bytes, BytesMut};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufWriter};
use tokio::time::Instant;
use tracing::{debug, error, info, trace, warn};

/// Initial buffer capacity
const INITIAL_BUFFER_SIZE: usize = 4096;

/// Statistics for connection handling
#[derive(Debug, Default)]
pub struct ConnectionStats {
    /// Total number of connections accepted
    pub connections_accepted: AtomicU64,
    /// Currently active connections
    pub active_connections: AtomicU64,
    /// Total commands processed
    pub commands_processed: AtomicU64,
    /// Total bytes read
    pub bytes_read: AtomicU64,
    /// Total bytes written
    pub bytes_written: AtomicU64,
}

impl ConnectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_opened(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn command_processed(&self) {
        self.commands_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bytes_read(&self, count: usize) {
        self.bytes_read.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn bytes_written(&self, count: usize) {
        self.bytes_written
            .fetch_add(count as u64, Ordering::Relaxed);
    }
}

/// Per-connection limits fixed at accept time.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionLimits {
    /// Instant after which reads fail with a timeout (`None` = never)
    pub deadline: Option<Instant>,
    /// Longest accepted request line in bytes (0 = unlimited)
    pub max_message_size: usize,
}

/// Handles a single client connection.
///
/// Generic over the transport so that the loop can be driven by a real
/// `TcpStream` or by an in-memory mock.
pub struct ConnectionHandler<S> {
    /// The transport for this connection
    stream: BufWriter<S>,

    /// Client's address (for logging)
    addr: SocketAddr,

    /// Buffer for incoming data
    buffer: BytesMut,

    /// Turns request lines into responses
    executor: Arc<dyn QueryExecutor>,

    limits: ConnectionLimits,

    shutdown: Shutdown,

    /// Connection statistics (shared)
    stats: Arc<ConnectionStats>,
}

impl<S> ConnectionHandler<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a new connection handler.
    ///
    /// # Arguments
    ///
    /// * `stream` - The transport for this connection
    /// * `addr` - The client's socket address
    /// * `executor` - Runs each request line
    /// * `limits` - Read deadline and line size cap
    /// * `shutdown` - Server-wide stop signal
    /// * `stats` - Shared connection statistics
    pub fn new(
        stream: S,
        addr: SocketAddr,
        executor: Arc<dyn QueryExecutor>,
        limits: ConnectionLimits,
        shutdown: Shutdown,
        stats: Arc<ConnectionStats>,
    ) -> Self {
        Self {
            stream: BufWriter::new(stream),
            addr,
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_SIZE),
            executor,
            limits,
            shutdown,
            stats,
        }
    }

    /// Runs the main connection loop.
    ///
    /// Returns `Ok(())` when the loop stopped because of shutdown and an
    /// error for every other way a connection ends. The transport is
    /// dropped, and so closed, when this returns.
    pub async fn run(mut self) -> Result<(), ConnectionError> {
        info!(client = %self.addr, "Client connected");

        let result = self.main_loop().await;

        match &result {
            Ok(()) => info!(client = %self.addr, "Connection closed on shutdown"),
            Err(e @ (ConnectionError::Timeout | ConnectionError::MessageTooLarge { .. })) => {
                warn!(client = %self.addr, error = %e, "Closing connection")
            }
            Err(e) => error!(client = %self.addr, error = %e, "Closing connection"),
        }

        result
    }

    /// The main read-execute-respond loop.
    async fn main_loop(&mut self) -> Result<(), ConnectionError> {
        loop {
            if self.shutdown.is_shutdown() {
                return Ok(());
            }

            let line = match self.read_line().await? {
                Some(line) => line,
                None => return Ok(()),
            };

            let raw = String::from_utf8_lossy(&line);
            let response = self.executor.run_command(raw.trim());
            self.stats.command_processed();

            self.send_response(&response).await?;
        }
    }

    /// Returns the next complete line, reading from the socket as needed.
    ///
    /// `None` means shutdown fired while waiting for data.
    async fn read_line(&mut self) -> Result<Option<Bytes>, ConnectionError> {
        loop {
            let max = self.limits.max_message_size;

            if let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
                if max > 0 && pos > max {
                    return Err(ConnectionError::MessageTooLarge { size: pos, max });
                }
                let line = self.buffer.split_to(pos + 1).freeze();
                trace!(
                    client = %self.addr,
                    consumed = line.len(),
                    remaining = self.buffer.len(),
                    "Split line"
                );
                return Ok(Some(line));
            }

            if max > 0 && self.buffer.len() > max {
                return Err(ConnectionError::MessageTooLarge {
                    size: self.buffer.len(),
                    max,
                });
            }

            if !self.read_more_data().await? {
                return Ok(None);
            }
        }
    }

    /// Reads more data from the socket into the buffer.
    ///
    /// Returns `false` if shutdown fired before any data arrived.
    async fn read_more_data(&mut self) -> Result<bool, ConnectionError> {
        // Ensure we have some capacity
        if self.buffer.capacity() - self.buffer.len() < 1024 {
            self.buffer.reserve(4096);
        }

        let deadline = self.limits.deadline;
        let read = self.stream.get_mut().read_buf(&mut self.buffer);
        let timed_read = async move {
            match deadline {
                Some(deadline) => match tokio::time::timeout_at(deadline, read).await {
                    Ok(result) => result.map_err(ConnectionError::Read),
                    Err(_) => Err(ConnectionError::Timeout),
                },
                None => read.await.map_err(ConnectionError::Read),
            }
        };

        let n = tokio::select! {
            result = timed_read => result?,
            _ = self.shutdown.recv() => {
                debug!(client = %self.addr, "Shutdown while waiting for data");
                return Ok(false);
            }
        };

        if n == 0 {
            // Connection closed by client
            if self.buffer.is_empty() {
                return Err(ConnectionError::ClientDisconnected);
            } else {
                // Partial line in buffer
                return Err(ConnectionError::UnexpectedEof);
            }
        }

        self.stats.bytes_read(n);
        trace!(client = %self.addr, bytes = n, "Read data");

        Ok(true)
    }

    /// Sends a response to the client, verbatim.
    async fn send_response(&mut self, response: &str) -> Result<(), ConnectionError> {
        let bytes = response.as_bytes();
        self.stream
            .write_all(bytes)
            .await
            .map_err(ConnectionError::Write)?;
        self.stream.flush().await.map_err(ConnectionError::Write)?;
        self.stats.bytes_written(bytes.len());
        trace!(
            client = %self.addr,
            bytes = bytes.len(),
            "Sent response"
        );
        Ok(())
    }
}

/// Errors that end a connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// The idle deadline passed while waiting for data
    #[error("read timeout")]
    Timeout,

    /// I/O error while reading
    #[error("failed read conn: {0}")]
    Read(#[source] std::io::Error),

    /// I/O error while writing
    #[error("failed write conn: {0}")]
    Write(#[source] std::io::Error),

    /// Client disconnected between requests
    #[error("client disconnected")]
    ClientDisconnected,

    /// Client disconnected halfway through a line
    #[error("unexpected end of stream")]
    UnexpectedEof,

    /// A request line exceeded the configured maximum
    #[error("message too large: {size} bytes (max: {max})")]
    MessageTooLarge { size: usize, max: usize },
}

/// Handles a client connection.
///
/// This is a convenience function that creates a ConnectionHandler
/// and runs it to completion.
pub async fn handle_connection<S>(
    stream: S,
    addr: SocketAddr,
    executor: Arc<dyn QueryExecutor>,
    limits: ConnectionLimits,
    shutdown: Shutdown,
    stats: Arc<ConnectionStats>,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let handler = ConnectionHandler::new(stream, addr, executor, limits, shutdown, stats);
    // Already logged by run()
    let _ = handler.run().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::CommandHandler;
    use crate::storage::StorageEngine;
    use std::time::Duration;
    use tokio::sync::watch;

    fn test_addr() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    fn unlimited() -> ConnectionLimits {
        ConnectionLimits {
            deadline: None,
            max_message_size: 0,
        }
    }

    fn create_handler<S>(
        stream: S,
        limits: ConnectionLimits,
    ) -> (ConnectionHandler<S>, Arc<ConnectionStats>, watch::Sender<bool>)
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let storage = Arc::new(StorageEngine::new());
        let executor: Arc<dyn QueryExecutor> = Arc::new(CommandHandler::new(storage));
        let stats = Arc::new(ConnectionStats::new());
        let (tx, rx) = watch::channel(false);
        let handler = ConnectionHandler::new(
            stream,
            test_addr(),
            executor,
            limits,
            Shutdown::new(rx),
            Arc::clone(&stats),
        );
        (handler, stats, tx)
    }

    #[tokio::test]
    async fn test_request_response() {
        let mock = tokio_test::io::Builder::new()
            .read(b"set name Ariz\n")
            .write(b"ok")
            .read(b"get name\n")
            .write(b"Ariz")
            .build();

        let (handler, stats, _tx) = create_handler(mock, unlimited());
        let result = handler.run().await;

        assert!(matches!(result, Err(ConnectionError::ClientDisconnected)));
        assert_eq!(stats.commands_processed.load(Ordering::Relaxed), 2);
        assert_eq!(stats.bytes_written.load(Ordering::Relaxed), 6);
    }

    #[tokio::test]
    async fn test_multiple_lines_in_one_read() {
        let mock = tokio_test::io::Builder::new()
            .read(b"set k1 v1\nset k2 v2\r\nget k1\nget k2\n")
            .write(b"ok")
            .write(b"ok")
            .write(b"v1")
            .write(b"v2")
            .build();

        let (handler, stats, _tx) = create_handler(mock, unlimited());
        let _ = handler.run().await;

        assert_eq!(stats.commands_processed.load(Ordering::Relaxed), 4);
    }

    #[tokio::test]
    async fn test_line_split_across_reads() {
        let mock = tokio_test::io::Builder::new()
            .read(b"set gre")
            .read(b"eting \"hello wor")
            .read(b"ld\"\nget greeting\n")
            .write(b"ok")
            .write(b"hello world")
            .build();

        let (handler, _stats, _tx) = create_handler(mock, unlimited());
        let _ = handler.run().await;
    }

    #[tokio::test]
    async fn test_parse_error_keeps_connection_open() {
        let mock = tokio_test::io::Builder::new()
            .read(b"bogus x\n")
            .write(b"failed parse query: invalid query: unknown command: bogus")
            .read(b"get missing\n")
            .write(b"nil")
            .build();

        let (handler, stats, _tx) = create_handler(mock, unlimited());
        let _ = handler.run().await;

        assert_eq!(stats.commands_processed.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn test_partial_line_at_eof() {
        let mock = tokio_test::io::Builder::new().read(b"get na").build();

        let (handler, stats, _tx) = create_handler(mock, unlimited());
        let result = handler.run().await;

        assert!(matches!(result, Err(ConnectionError::UnexpectedEof)));
        assert_eq!(stats.commands_processed.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn test_message_too_large() {
        let mock = tokio_test::io::Builder::new()
            .read(b"set k 0123456789abcdef\n")
            .build();

        let limits = ConnectionLimits {
            deadline: None,
            max_message_size: 8,
        };
        let (handler, stats, _tx) = create_handler(mock, limits);
        let result = handler.run().await;

        assert!(matches!(
            result,
            Err(ConnectionError::MessageTooLarge { max: 8, .. })
        ));
        assert_eq!(stats.commands_processed.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn test_message_too_large_without_newline() {
        let mock = tokio_test::io::Builder::new()
            .read(b"set k 0123456789abcdef")
            .build();

        let limits = ConnectionLimits {
            deadline: None,
            max_message_size: 8,
        };
        let (handler, _stats, _tx) = create_handler(mock, limits);

        assert!(matches!(
            handler.run().await,
            Err(ConnectionError::MessageTooLarge { .. })
        ));
    }

    #[tokio::test]
    async fn test_line_at_limit_is_accepted() {
        let mock = tokio_test::io::Builder::new()
            .read(b"get abcd\n")
            .write(b"nil")
            .build();

        let limits = ConnectionLimits {
            deadline: None,
            max_message_size: 8,
        };
        let (handler, stats, _tx) = create_handler(mock, limits);
        let _ = handler.run().await;

        assert_eq!(stats.commands_processed.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_deadline_times_out() {
        let (client, server) = tokio::io::duplex(64);

        let limits = ConnectionLimits {
            deadline: Some(Instant::now() + Duration::from_millis(50)),
            max_message_size: 0,
        };
        let (handler, _stats, _tx) = create_handler(server, limits);
        let result = handler.run().await;

        assert!(matches!(result, Err(ConnectionError::Timeout)));
        drop(client);
    }

    #[tokio::test]
    async fn test_shutdown_before_first_read() {
        let (_client, server) = tokio::io::duplex(64);

        let (handler, _stats, tx) = create_handler(server, unlimited());
        tx.send(true).unwrap();

        assert!(handler.run().await.is_ok());
    }

    #[tokio::test]
    async fn test_shutdown_releases_blocked_read() {
        let (_client, server) = tokio::io::duplex(64);

        let (handler, _stats, tx) = create_handler(server, unlimited());
        let task = tokio::spawn(handler.run());

        tokio::time::sleep(Duration::from_millis(20)).await;
        tx.send(true).unwrap();

        let result = tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("handler should stop on shutdown")
            .unwrap();
        assert!(result.is_ok());
    }
}
