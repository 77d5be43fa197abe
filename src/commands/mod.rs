//! Command Handler Module
//!
//! This module implements the dispatch layer for linekv.
//! It receives raw request lines, parses them, executes them against the
//! storage engine, and renders the textual response.
//!
//! ## Architecture
//!
//! ```text
//! Request line
//!       │
//!       ▼
//! ┌─────────────────┐
//! │  Line Parser    │  (protocol module)
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ CommandHandler  │  (this module)
//! │                 │
//! │  - Dispatch     │
//! │  - Validate     │
//! │  - Execute      │
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ StorageEngine   │  (storage module)
//! └─────────────────┘
//! ```
//!
//! ## Supported Commands
//!
//! - `GET key`
//! - `SET key value`
//! - `DEL key`

pub mod handler;

// Re-export the main command handler
pub use handler::{
    CommandError, CommandHandler, MESSAGE_NIL, MESSAGE_OK, MESSAGE_UNKNOWN_COMMAND,
};

/// Anything that can turn a request line into a response.
///
/// The connection layer only depends on this trait, so a server can be
/// driven by [`CommandHandler`] or by any other executor.
pub trait QueryExecutor: Send + Sync + 'static {
    /// Runs one request line. Must not fail; errors are response text.
    fn run_command(&self, raw: &str) -> String;
}
