//! # Audio Ring
//!
//! Multi-channel audio ring buffer with callback-driven device and WAV file I/O.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                     AudioSession (audio::session)                    │
//! │   ┌──────────────┐                              ┌──────────────┐     │
//! │   │ Input stream │                              │ Output stream│     │
//! │   │  (RT thread) │                              │  (RT thread) │     │
//! │   └──────┬───────┘                              └──────▲───────┘     │
//! │          │ input callback                output callback │           │
//! └──────────┼───────────────────────────────────────────────┼───────────┘
//!            │ add_interleaved_frames                        │
//!            ▼                                               │
//! ┌──────────────────────────────────────┐                   │
//! │        RingBuffer (audio::buffer)    │   fetch_fresh_data│
//! │  ┌────────┬────────┬────────┬──────┐ │   fetch_interleaved_data
//! │  │ ch 0   │ ch 1   │ ch 2   │ ch 3 │ │───────────────────┘
//! │  │ w/r    │ w/r    │ w/r    │ w/r  │ │
//! │  └────────┴────────┴────────┴──────┘ │──▶ fetch_data / fetch_latest
//! │        mean / min / max              │    (meters, scopes)
//! └──────────────────────────────────────┘
//!            ▲                      │
//!            │ feeder thread        │ flusher thread
//! ┌──────────┴───────────┐  ┌───────▼──────────────┐
//! │ AudioFileReader      │  │ AudioFileWriter      │
//! │ (file::reader, WAV)  │  │ (file::writer, WAV)  │
//! └──────────────────────┘  └──────────────────────┘
//! ```

pub mod audio;
pub mod config;
pub mod error;
#[cfg(feature = "files")]
pub mod file;

pub use audio::buffer::{create_shared_buffer, Fetched, RingBuffer, SharedRingBuffer};
pub use config::{AppConfig, RingBufferConfig, SessionConfig};
pub use error::{Error, Result};

/// Library-wide constants
pub mod constants {
    /// Default sample rate for audio processing
    pub const DEFAULT_SAMPLE_RATE: u32 = 48000;

    /// Default channel count (stereo)
    pub const DEFAULT_CHANNELS: u16 = 2;

    /// Default hardware block size in frames
    pub const DEFAULT_BUFFER_FRAMES: u32 = 512;

    /// Default ring buffer capacity (in frames per channel), one second at 48 kHz
    pub const RING_BUFFER_CAPACITY: usize = 48000;

    /// Largest hardware block the session pre-allocates scratch space for
    pub const MAX_BLOCK_FRAMES: usize = 4096;

    /// Frames decoded per step by the file reader
    pub const FEED_BLOCK_FRAMES: usize = 1024;

    /// Pause between file reader top-ups
    pub const FEED_INTERVAL_MS: u64 = 5;

    /// Frames moved to disk per step by the file writer
    pub const DRAIN_BLOCK_FRAMES: usize = 4096;

    /// Pause between file writer drains
    pub const FLUSH_INTERVAL_MS: u64 = 20;
}
