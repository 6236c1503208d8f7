//! Error types for admp-ap
//!
//! Defines module-specific error types using thiserror for clear error
//! propagation.

use thiserror::Error;

/// Main error type for the admp-ap module
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file loading errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File could not be opened or probed (bad path, unsupported format)
    #[error("File open error: {0}")]
    FileOpen(String),

    /// Audio decoding errors
    #[error("Audio decode error: {0}")]
    Decode(String),

    /// Transient I/O error while refilling the stream cache
    #[error("Stream read error: {0}")]
    StreamRead(String),

    /// Audio output device errors
    #[error("Audio output error: {0}")]
    AudioOutput(String),

    /// Playback engine errors
    #[error("Playback error: {0}")]
    Playback(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Other errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convenience Result type using admp-ap Error
pub type Result<T> = std::result::Result<T, Error>;
