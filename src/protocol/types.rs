//! Request Types
//!
//! This module defines the typed form of a client request.
//!
//! ## Wire Format
//!
//! Every request is one line of text:
//!
//! ```text
//! <verb> <arg> <arg> ...\n
//! ```
//!
//! The verb is matched case-insensitively. Arguments containing whitespace
//! are quoted the way a POSIX shell would quote them:
//!
//! ```text
//! set greeting "hello world"
//! get greeting
//! del greeting
//! ```

use std::fmt;

/// The commands understood by the server.
///
/// `Unknown` exists so that the dispatcher can fall through to a fixed
/// error for anything that is not one of the three real commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// `GET key`
    Get,
    /// `SET key value`
    Set,
    /// `DEL key`
    Del,
    /// Anything else
    Unknown,
}

impl Command {
    /// Maps a request verb to a command, ignoring case.
    ///
    /// Unrecognised verbs map to [`Command::Unknown`].
    ///
    /// # Example
    /// ```
    /// use linekv::protocol::Command;
    /// assert_eq!(Command::from_verb("SeT"), Command::Set);
    /// assert_eq!(Command::from_verb("ping"), Command::Unknown);
    /// ```
    pub fn from_verb(verb: &str) -> Self {
        if verb.eq_ignore_ascii_case("get") {
            Command::Get
        } else if verb.eq_ignore_ascii_case("set") {
            Command::Set
        } else if verb.eq_ignore_ascii_case("del") {
            Command::Del
        } else {
            Command::Unknown
        }
    }

    /// Returns the exact number of arguments the command requires.
    ///
    /// `Unknown` has no arity.
    pub fn arity(self) -> Option<usize> {
        match self {
            Command::Get => Some(1),
            Command::Set => Some(2),
            Command::Del => Some(1),
            Command::Unknown => None,
        }
    }

    /// Returns the canonical verb for this command.
    pub fn name(self) -> &'static str {
        match self {
            Command::Get => "GET",
            Command::Set => "SET",
            Command::Del => "DEL",
            Command::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A parsed request: one command and its arguments.
///
/// A `Query` is built once per request line and never mutated. Queries
/// produced by [`parse`](crate::protocol::parse) always carry exactly
/// `command.arity()` arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    command: Command,
    args: Vec<String>,
}

impl Query {
    /// Creates a query without validating the argument count.
    ///
    /// The dispatcher re-checks arity before executing, so a hand-built
    /// query with the wrong number of arguments is rejected there.
    pub fn new(command: Command, args: Vec<String>) -> Self {
        Self { command, args }
    }

    /// The command to run.
    pub fn command(&self) -> Command {
        self.command
    }

    /// The arguments, in the order they appeared on the line.
    pub fn args(&self) -> &[String] {
        &self.args
    }
}
