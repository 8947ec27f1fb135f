//! Error types for GamePulse.
//!
//! Per-process access failures during a snapshot are never represented here:
//! they are swallowed where they happen and the process is left out. What
//! remains are the outcomes a caller can act on.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Main error type for the GamePulse library.
#[derive(Debug, Error)]
pub enum GamePulseError {
    #[error("Operation cancelled")]
    Cancelled,

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Runtime error: {message}")]
    Runtime { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Launch failed for {target}: {message}")]
    LaunchFailed { target: String, message: String },

    #[error("Executable not found: {0}")]
    ExecutableNotFound(PathBuf),

    #[error("Failed to terminate process {pid}: {message}")]
    TerminationFailed { pid: u32, message: String },
}

/// Result type alias for GamePulse operations.
pub type Result<T> = std::result::Result<T, GamePulseError>;

impl GamePulseError {
    /// Whether this error is the cooperative-cancellation outcome.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, GamePulseError::Cancelled)
    }
}
