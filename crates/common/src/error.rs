//! Error types for the testbed harness

use std::time::Duration;
use thiserror::Error;

/// Result type alias using the harness Error
pub type Result<T> = std::result::Result<T, Error>;

/// Harness error taxonomy.
///
/// Transport-level failures (host unreachable, authentication rejected) are
/// deliberately distinct from `Execution`, which means the command ran and
/// exited non-zero. Callers rely on that distinction to tell "could not
/// reach host" apart from "command ran and failed".
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Command failed with exit code {exit_code}: {command}\nstdout: {stdout}\nstderr: {stderr}")]
    Execution {
        command: String,
        exit_code: i32,
        stdout: String,
        stderr: String,
    },

    #[error("File transfer failed: {0}")]
    Transfer(String),

    #[error("Timed out after {attempts} attempts in {elapsed:?}: {message}")]
    Timeout {
        message: String,
        attempts: u32,
        elapsed: Duration,
    },

    #[error("Gave up after {attempts} attempts: {message}")]
    RetriesExhausted { message: String, attempts: u32 },

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("API call {method} failed: {message}")]
    ApiCall { method: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// True for failures of the underlying transport rather than of the
    /// command or API method that was carried over it.
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport(_))
    }
}
