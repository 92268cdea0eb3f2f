//! Error types for the encoder daemon.

use std::path::PathBuf;
use std::time::Duration;

/// Errors raised while loading, validating or saving the configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read or written.
    #[error("Config file {path}: {source}")]
    Io {
        /// The file involved.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The configuration file is not valid JSON for the expected schema.
    #[error("Malformed config: {0}")]
    Malformed(#[from] serde_json::Error),

    /// A field holds a value outside its allowed range.
    #[error("Invalid config value for {field}: {reason}")]
    Invalid {
        /// Dotted path of the offending field.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

/// Errors reported by a player or display sink.
///
/// Sink errors are never fatal: callers log them and carry on.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// Spawning or talking to the external client failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The external client did not finish within its time budget.
    #[error("Command timed out after {0:?}")]
    Timeout(Duration),

    /// The external client exited unsuccessfully.
    #[error("Command `{command}` failed with status {status}")]
    CommandFailed {
        /// The subcommand that failed.
        command: String,
        /// Exit code, or -1 when killed by a signal.
        status: i32,
    },

    /// The sink is not able to perform the request.
    #[error("Sink unavailable: {0}")]
    Unavailable(String),
}

/// Errors reading the encoder lines.
#[derive(Debug, thiserror::Error)]
pub enum PinError {
    /// The line read failed.
    #[error("Pin read failed: {0}")]
    Read(String),

    /// The lines could not be requested from the GPIO chip.
    #[error("Failed to request lines {pins:?} on {chip}: {reason}")]
    Request {
        /// Chip name, e.g. `gpiochip0`.
        chip: String,
        /// The requested line offsets.
        pins: [u32; 3],
        /// Driver error message.
        reason: String,
    },

    /// The pin source returned fewer values than lines requested.
    #[error("Expected {expected} line values, got {got}")]
    ShortRead {
        /// Number of lines requested.
        expected: usize,
        /// Number of values returned.
        got: usize,
    },
}

/// Errors loading or saving the persisted interaction state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    /// The state file could not be read or written.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The state file is not valid JSON.
    #[error("Malformed state file: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Errors starting the runtime.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// A worker thread could not be spawned.
    #[error("Failed to spawn {name} thread: {source}")]
    Spawn {
        /// Thread name.
        name: &'static str,
        /// The underlying I/O error.
        source: std::io::Error,
    },
}
