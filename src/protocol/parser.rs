//! Request Line Parser
//!
//! Turns one raw request line into a validated [`Query`].
//!
//! ## How the Parser Works
//!
//! 1. Split the line into words with POSIX shell rules, so that
//!    `set k "two words"` yields three words.
//! 2. Map the first word to a [`Command`], ignoring case.
//! 3. Check that the remaining words match the command's arity.
//!
//! The parser is a pure function: no I/O, no shared state.

use crate::protocol::types::{Command, Query};
use thiserror::Error;

/// Errors that can occur while parsing a request line.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Unbalanced quotes or a trailing escape
    #[error("invalid query: malformed quoting")]
    Tokenize,

    /// The line held no words at all
    #[error("invalid query: empty command")]
    EmptyCommand,

    /// The first word is not a known verb
    #[error("invalid query: unknown command: {0}")]
    UnknownCommand(String),

    /// Wrong number of arguments for a known verb
    #[error("invalid args: {command} wants {expected} args, got {args:?}")]
    InvalidArgs {
        command: Command,
        expected: usize,
        args: Vec<String>,
    },
}

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// Parses a request line into a [`Query`].
///
/// # Example
///
/// ```
/// use linekv::protocol::{parse, Command};
///
/// let query = parse(r#"set greeting "hello world""#).unwrap();
/// assert_eq!(query.command(), Command::Set);
/// assert_eq!(query.args(), ["greeting", "hello world"]);
/// ```
pub fn parse(raw: &str) -> ParseResult<Query> {
    let mut words = shlex::split(raw).ok_or(ParseError::Tokenize)?;

    if words.is_empty() {
        return Err(ParseError::EmptyCommand);
    }

    let verb = words.remove(0);
    let command = Command::from_verb(&verb);
    let expected = command
        .arity()
        .ok_or_else(|| ParseError::UnknownCommand(verb))?;

    if words.len() != expected {
        return Err(ParseError::InvalidArgs {
            command,
            expected,
            args: words,
        });
    }

    Ok(Query::new(command, words))
}
