//! Unified error type for git log reading.

use thiserror::Error;

/// All errors that can abort a git log read.
///
/// Malformed individual records are not errors: the parser reports them as
/// [`DroppedRecord`](crate::git::parser::DroppedRecord) values and keeps going.
#[derive(Error, Debug)]
pub enum GitLogError {
    /// I/O error (pipe read/write, process spawn)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The git executable could not be found
    #[error("git is not installed or not in PATH")]
    GitNotFound,

    /// git exited with a nonzero status
    #[error("`{command}` failed (exit code {exit_code}): {stderr}")]
    CommandFailed {
        command: String,
        exit_code: i32,
        stderr: String,
    },

    /// Output does not match the requested options. Fatal to the whole read.
    #[error("git log output does not match the requested format: expected {expected} fields, found {found}")]
    Format { expected: usize, found: usize },

    /// The read was cancelled by the caller
    #[error("Operation cancelled")]
    Cancelled,

    /// Argument validation error
    #[error("{0}")]
    InvalidArgs(String),
}
