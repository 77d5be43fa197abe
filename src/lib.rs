//! # linekv - A Line-Protocol In-Memory Key-Value Store
//!
//! linekv is a volatile, single-node key-value store reachable over a
//! newline-delimited text protocol. Clients send one request per line and
//! receive the raw response text back on the same socket.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                               linekv                                    │
//! │                                                                         │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐                  │
//! │  │   Server    │───>│ Connection  │───>│  Command    │                  │
//! │  │ (acceptor)  │    │  Handler    │    │  Handler    │                  │
//! │  └──────┬──────┘    └─────────────┘    └──────┬──────┘                  │
//! │         │                                     │                         │
//! │   Semaphore                                   ▼                         │
//! │   (admission)       ┌─────────────┐    ┌──────────────────────────┐     │
//! │                     │ Line Parser │    │     StorageEngine        │     │
//! │                     │  (shlex)    │    │ RwLock<HashMap<..>>      │     │
//! │                     └─────────────┘    └──────────────────────────┘     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use linekv::commands::{CommandHandler, QueryExecutor};
//! use linekv::server::{Server, ServerConfig};
//! use linekv::storage::StorageEngine;
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let storage = Arc::new(StorageEngine::new());
//!     let executor: Arc<dyn QueryExecutor> = Arc::new(CommandHandler::new(storage));
//!
//!     let listener = TcpListener::bind("127.0.0.1:8080").await?;
//!     Server::new(listener, executor, ServerConfig::default())
//!         .run(tokio::signal::ctrl_c())
//!         .await;
//!     Ok(())
//! }
//! ```
//!
//! ## Protocol
//!
//! | Request         | Response                       |
//! |-----------------|--------------------------------|
//! | `set key value` | `ok`                           |
//! | `get key`       | the value, or `nil`            |
//! | `del key`       | `ok`                           |
//! | anything else   | `failed parse query: <detail>` |
//!
//! Verbs are case-insensitive and arguments may be shell-quoted:
//! `set motd "hello world"`.
//!
//! ## Module Overview
//!
//! - [`protocol`]: Request types and the line parser
//! - [`storage`]: Thread-safe storage engine
//! - [`commands`]: Dispatch from request line to response text
//! - [`connection`]: Per-client read/dispatch/write loop
//! - [`server`]: Accept loop, admission control, shutdown
//! - [`client`]: TCP client for the line protocol
//! - [`cli`]: Interactive prompt
//! - [`config`] / [`logging`]: Process setup

pub mod cli;
pub mod client;
pub mod commands;
pub mod config;
pub mod connection;
pub mod logging;
pub mod protocol;
pub mod server;
pub mod shutdown;
pub mod storage;

// Re-export commonly used types for convenience
pub use commands::{CommandHandler, QueryExecutor};
pub use connection::{handle_connection, ConnectionStats};
pub use protocol::{parse, Command, ParseError, Query};
pub use server::{Server, ServerConfig};
pub use storage::StorageEngine;

/// The default address linekv binds to
pub const DEFAULT_ADDRESS: &str = "127.0.0.1:8080";

/// Version of linekv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
