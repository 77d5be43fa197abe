//! Storage Engine Module
//!
//! This module provides the in-memory key-value store behind every
//! connection. It is volatile: nothing is persisted and nothing expires.
//!
//! ## Features
//!
//! - **RwLock**: Multiple concurrent readers, exclusive writers
//! - **Last write wins**: Concurrent `set` on one key leaves exactly one of the values
//! - **Statistics**: Atomic operation counters
//!
//! ## Example
//!
//! ```
//! use linekv::storage::StorageEngine;
//! use std::sync::Arc;
//!
//! let engine = Arc::new(StorageEngine::new());
//!
//! engine.set("name".to_string(), "Ariz".to_string());
//! assert_eq!(engine.get("name"), Some("Ariz".to_string()));
//! ```

pub mod engine;

// Re-export commonly used types
pub use engine::{StorageEngine, StorageStats};
