//! Error types for cfgdrift.

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Main error type for cfgdrift operations.
#[derive(Error, Debug)]
pub enum Error {
    /// SSH transport-level errors
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Interactive session errors
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Snapshot storage errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Configuration file errors
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Notification / explanation adapter errors
    #[error("Notify error: {0}")]
    Notify(#[from] NotifyError),
}

/// Transport layer errors (SSH connection, authentication).
///
/// A transport failure is fatal for the affected device; the run-level
/// orchestrator records it and continues with the remaining devices.
#[derive(Error, Debug)]
pub enum TransportError {
    /// SSH handshake or protocol error
    #[error("SSH error: {0}")]
    Ssh(#[from] russh::Error),

    /// Authentication failed
    #[error("Authentication failed for user '{user}'")]
    AuthenticationFailed { user: String },

    /// Connection was closed unexpectedly
    #[error("Connection disconnected")]
    Disconnected,

    /// Operation timed out
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),
}

/// Interactive session errors (command execution over the shell channel).
#[derive(Error, Debug)]
pub enum SessionError {
    /// No shell prompt was detected within the overall command timeout.
    #[error("No prompt detected within {0:?}")]
    Timeout(Duration),

    /// The channel was closed by the peer before the command completed.
    #[error("Channel closed before command completed")]
    Closed,

    /// Channel-level failure while sending or receiving.
    #[error("Channel failure: {0}")]
    Channel(String),

    /// Underlying transport failure surfaced mid-session.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Snapshot store errors (version tree on disk).
#[derive(Error, Debug)]
pub enum StoreError {
    /// Filesystem operation failed
    #[error("I/O error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
}

/// Configuration loading errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },

    /// Config file could not be written
    #[error("Failed to write config file {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: io::Error,
    },

    /// Config file could not be parsed
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// A required value is missing or invalid
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}

/// Errors from the webhook notifier and the diff explainer.
#[derive(Error, Debug)]
pub enum NotifyError {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The remote service returned a non-success status
    #[error("Service returned status {status}")]
    Status { status: u16 },

    /// The response body did not have the expected shape
    #[error("Unexpected response: {message}")]
    UnexpectedResponse { message: String },
}

impl StoreError {
    /// Wrap an I/O error with the path it occurred on.
    pub fn io(path: impl AsRef<std::path::Path>, source: io::Error) -> Self {
        StoreError::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }
}

/// Result type alias using cfgdrift's Error.
pub type Result<T> = std::result::Result<T, Error>;
