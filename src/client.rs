//! TCP Client
//!
//! A minimal client for the line protocol. Responses carry no delimiter,
//! so the client performs a single read of up to `buffer_size` bytes per
//! request and treats whatever arrived as the response.

use std::net::SocketAddr;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, ToSocketAddrs};

/// Default response buffer size (2 KB)
pub const DEFAULT_BUFFER_SIZE: usize = 2 * 1024;

/// Errors returned by [`TcpClient`].
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("failed connect: {0}")]
    Connect(#[source] std::io::Error),

    #[error("failed write conn: {0}")]
    Write(#[source] std::io::Error),

    #[error("failed read conn: {0}")]
    Read(#[source] std::io::Error),

    #[error("connection closed by server")]
    Closed,
}

/// A connected client.
#[derive(Debug)]
pub struct TcpClient {
    stream: TcpStream,
    buffer_size: usize,
}

impl TcpClient {
    /// Connects to a server.
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(ClientError::Connect)?;
        Ok(Self::new(stream))
    }

    /// Wraps an already connected stream.
    pub fn new(stream: TcpStream) -> Self {
        Self {
            stream,
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }

    /// Sets the largest response read per request.
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size.max(1);
        self
    }

    /// The server's address.
    pub fn peer_addr(&self) -> std::io::Result<SocketAddr> {
        self.stream.peer_addr()
    }

    /// Sends one request and returns the response bytes.
    ///
    /// A trailing newline is added if missing. An empty request is not
    /// sent and yields an empty response.
    pub async fn send(&mut self, request: &[u8]) -> Result<Vec<u8>, ClientError> {
        if request.is_empty() {
            return Ok(Vec::new());
        }

        let mut line = request.to_vec();
        if line.last() != Some(&b'\n') {
            line.push(b'\n');
        }

        self.stream
            .write_all(&line)
            .await
            .map_err(ClientError::Write)?;

        let mut response = vec![0u8; self.buffer_size];
        let n = self
            .stream
            .read(&mut response)
            .await
            .map_err(ClientError::Read)?;
        if n == 0 {
            return Err(ClientError::Closed);
        }

        response.truncate(n);
        Ok(response)
    }
}
