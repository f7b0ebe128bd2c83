//! Protocol error types

use thiserror::Error;

/// Protocol-level errors
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Serialization error from postcard
    #[error("Serialization error: {0}")]
    Serialization(#[from] postcard::Error),

    /// Announcement payload is empty or not a whole number of 32-bit words
    #[error("Malformed service announcement: {len} bytes is not a non-empty multiple of 4")]
    MalformedAnnouncement { len: usize },

    /// Announcement lists more services than a service index can address
    #[error("Too many services announced: {count} words (max: {max})")]
    TooManyServices { count: usize, max: usize },

    /// Service class string could not be parsed
    #[error("Invalid service class: {0}")]
    InvalidServiceClass(String),

    /// Frame length exceeds maximum allowed size
    #[error("Frame too large: {size} bytes (max: {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// Incomplete frame data
    #[error("Incomplete frame: expected {expected} bytes, got {actual}")]
    IncompleteFrame { expected: usize, actual: usize },

    /// I/O error during frame operations
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Type alias for protocol results
pub type Result<T> = std::result::Result<T, ProtocolError>;
