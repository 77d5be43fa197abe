//! Command Handler Module
//!
//! Parses a raw request line, routes it to an execution function and
//! renders the result as the text sent back to the client.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     CommandHandler                          │
//! │                                                             │
//! │  ┌─────────────┐    ┌──────────────┐    ┌─────────────┐     │
//! │  │   parse()   │───>│executor_for()│───>│  exec_*()   │     │
//! │  └─────────────┘    └──────────────┘    └─────────────┘     │
//! │                                               │             │
//! │                                               ▼             │
//! │                                      StorageEngine          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Responses
//!
//! | Outcome                | Response body                 |
//! |------------------------|-------------------------------|
//! | `GET` hit              | the stored value              |
//! | `GET` miss             | `nil`                         |
//! | `SET` / `DEL`          | `ok`                          |
//! | parse failure          | `failed parse query: <detail>`|
//! | command without table entry | `unknown command`        |
//! | execution failure      | `failed run query: <detail>`  |
//!
//! Every outcome is a response; nothing here ends the connection.

use crate::commands::QueryExecutor;
use crate::protocol::{parse, Command, Query};
use crate::storage::StorageEngine;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error};

/// Response to a successful `SET` or `DEL`.
pub const MESSAGE_OK: &str = "ok";

/// Response to a `GET` on a missing key.
pub const MESSAGE_NIL: &str = "nil";

/// Response for a command with no execution function.
pub const MESSAGE_UNKNOWN_COMMAND: &str = "unknown command";

/// Errors raised while executing a parsed query.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("invalid arguments: {command} wants {expected} args, got {got}")]
    InvalidArgs {
        command: Command,
        expected: usize,
        got: usize,
    },
}

type ExecFn = fn(&CommandHandler, &Query) -> Result<String, CommandError>;

/// Maps a command to its execution function.
///
/// Only `GET`, `SET` and `DEL` have one; everything else falls through to
/// [`MESSAGE_UNKNOWN_COMMAND`].
fn executor_for(command: Command) -> Option<ExecFn> {
    match command {
        Command::Get => Some(CommandHandler::exec_get),
        Command::Set => Some(CommandHandler::exec_set),
        Command::Del => Some(CommandHandler::exec_del),
        Command::Unknown => None,
    }
}

/// Dispatches request lines against a shared storage engine.
#[derive(Clone, Debug)]
pub struct CommandHandler {
    /// The storage engine
    storage: Arc<StorageEngine>,
}

impl CommandHandler {
    /// Creates a new command handler with the given storage engine.
    pub fn new(storage: Arc<StorageEngine>) -> Self {
        Self { storage }
    }

    /// Runs one raw request line and returns the response text.
    ///
    /// This never fails: parse and execution errors become response text.
    pub fn run(&self, raw: &str) -> String {
        debug!(raw_query = raw, "run command");

        let query = match parse(raw) {
            Ok(query) => query,
            Err(e) => {
                error!(raw_query = raw, error = %e, "failed parse query");
                return format!("failed parse query: {}", e);
            }
        };

        self.dispatch(raw, &query)
    }

    /// Routes an already-parsed query to its execution function.
    fn dispatch(&self, raw: &str, query: &Query) -> String {
        let exec = match executor_for(query.command()) {
            Some(exec) => exec,
            None => {
                error!(raw_query = raw, "unknown command");
                return MESSAGE_UNKNOWN_COMMAND.to_string();
            }
        };

        match exec(self, query) {
            Ok(output) => output,
            Err(e) => {
                error!(raw_query = raw, error = %e, "failed run query");
                format!("failed run query: {}", e)
            }
        }
    }

    /// Re-checks the query against its command's arity before touching storage.
    fn check_arity(query: &Query) -> Result<(), CommandError> {
        let expected = query.command().arity().unwrap_or(0);
        if query.args().len() != expected {
            return Err(CommandError::InvalidArgs {
                command: query.command(),
                expected,
                got: query.args().len(),
            });
        }
        Ok(())
    }

    /// GET key
    fn exec_get(&self, query: &Query) -> Result<String, CommandError> {
        Self::check_arity(query)?;

        Ok(self
            .storage
            .get(&query.args()[0])
            .unwrap_or_else(|| MESSAGE_NIL.to_string()))
    }

    /// SET key value
    fn exec_set(&self, query: &Query) -> Result<String, CommandError> {
        Self::check_arity(query)?;

        let args = query.args();
        self.storage.set(args[0].clone(), args[1].clone());
        Ok(MESSAGE_OK.to_string())
    }

    /// DEL key
    fn exec_del(&self, query: &Query) -> Result<String, CommandError> {
        Self::check_arity(query)?;

        self.storage.delete(&query.args()[0]);
        Ok(MESSAGE_OK.to_string())
    }
}

impl QueryExecutor for CommandHandler {
    fn run_command(&self, raw: &str) -> String {
        self.run(raw)
    }
}
