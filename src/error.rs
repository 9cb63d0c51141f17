//! Error types for the audio ring library

use thiserror::Error;

/// Main error type for the library
#[derive(Error, Debug)]
pub enum Error {
    #[error("Buffer error: {0}")]
    Buffer(#[from] BufferError),

    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),

    #[error("File error: {0}")]
    File(#[from] FileError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Ring buffer errors
///
/// All of these are synchronous and caller-correctable. Overrun is not an
/// error: the buffer overwrites the oldest unread frames and reports it
/// through its counters.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BufferError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Invalid channel {channel} (buffer has {channel_count})")]
    InvalidChannel { channel: usize, channel_count: usize },

    #[error("Request of {requested} frames exceeds capacity of {capacity}")]
    RequestExceedsCapacity { requested: usize, capacity: usize },

    #[error("Slice too small: need {needed} samples, got {actual}")]
    BufferTooSmall { needed: usize, actual: usize },

    #[error("Stride must be at least 1")]
    InvalidStride,
}

/// Audio device and session errors
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Failed to open stream: {0}")]
    StreamError(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("An audio session is already active in this process")]
    SessionActive,

    #[error("cpal error: {0}")]
    CpalError(String),

    #[error("Buffer error: {0}")]
    Buffer(#[from] BufferError),
}

/// Audio file reader/writer errors
#[derive(Error, Debug)]
pub enum FileError {
    #[cfg(feature = "files")]
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("Unsupported sample format: {0}")]
    UnsupportedFormat(String),

    #[error("Too many channels: {0}")]
    TooManyChannels(usize),

    #[error("Expected {expected} channels, got {actual}")]
    ChannelMismatch { expected: usize, actual: usize },

    #[error("Buffer error: {0}")]
    Buffer(#[from] BufferError),

    #[error("Worker thread failed: {0}")]
    Worker(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;
