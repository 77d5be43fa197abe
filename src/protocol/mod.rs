//! Line Protocol Implementation
//!
//! Requests are newline-terminated lines of text; responses are the raw
//! bytes of the rendered result with no delimiter of their own.
//!
//! ## Modules
//!
//! - `types`: Defines [`Command`] and [`Query`]
//! - `parser`: Turns a raw line into a validated [`Query`]
//!
//! ## Example
//!
//! ```
//! use linekv::protocol::{parse, Command};
//!
//! let query = parse("get name").unwrap();
//! assert_eq!(query.command(), Command::Get);
//! ```

pub mod parser;
pub mod types;

// Re-export commonly used types for convenience
pub use parser::{parse, ParseError, ParseResult};
pub use types::{Command, Query};
