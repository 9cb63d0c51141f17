//! Configuration for ring buffers and audio sessions
//!
//! Everything here is construction-time only. Settings are read from
//! `<config dir>/audio-ring/config.toml`; missing fields fall back to
//! their defaults so older files keep loading.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::audio::buffer::MAX_CHANNELS;
use crate::constants::{
    DEFAULT_BUFFER_FRAMES, DEFAULT_CHANNELS, DEFAULT_SAMPLE_RATE, RING_BUFFER_CAPACITY,
};
use crate::error::{Error, Result};

/// Ring buffer shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RingBufferConfig {
    /// Frames retained per channel
    pub capacity: usize,
    /// Number of independent channels
    pub channel_count: usize,
}

impl Default for RingBufferConfig {
    fn default() -> Self {
        Self {
            capacity: RING_BUFFER_CAPACITY,
            channel_count: DEFAULT_CHANNELS as usize,
        }
    }
}

impl RingBufferConfig {
    pub fn new(capacity: usize, channel_count: usize) -> Self {
        Self {
            capacity,
            channel_count,
        }
    }

    /// Capacity needed to hold `seconds` of audio at `sample_rate`
    pub fn for_duration(seconds: f32, sample_rate: u32, channel_count: usize) -> Self {
        Self {
            capacity: (seconds * sample_rate as f32).ceil() as usize,
            channel_count,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(Error::Config("ring capacity must be at least 1 frame".into()));
        }
        if self.channel_count == 0 || self.channel_count > MAX_CHANNELS {
            return Err(Error::Config(format!(
                "ring channel count must be between 1 and {}",
                MAX_CHANNELS
            )));
        }
        Ok(())
    }
}

/// Audio session settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Requested sample rate in Hz
    pub sample_rate: u32,
    /// Requested hardware block size in frames, `None` for the host default
    pub buffer_frames: Option<u32>,
    /// Open the default input device when playing
    pub input_enabled: bool,
    /// Open the default output device when playing
    pub output_enabled: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            buffer_frames: Some(DEFAULT_BUFFER_FRAMES),
            input_enabled: true,
            output_enabled: true,
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(Error::Config("sample rate must be positive".into()));
        }
        if self.buffer_frames == Some(0) {
            return Err(Error::Config("buffer size must be positive".into()));
        }
        if !self.input_enabled && !self.output_enabled {
            return Err(Error::Config("session needs input or output enabled".into()));
        }
        Ok(())
    }
}

/// Top-level configuration file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub ring: RingBufferConfig,
    pub session: SessionConfig,
}

impl AppConfig {
    /// Default location of the configuration file
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "audio-ring").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }

    /// Load and validate a configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Load from the default location, falling back to defaults on any error
    pub fn load_or_default() -> Self {
        let Some(path) = Self::default_path() else {
            return Self::default();
        };

        match Self::load(&path) {
            Ok(config) => {
                tracing::info!("Loaded config from {}", path.display());
                config
            }
            Err(Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No config at {}, using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                tracing::warn!("Ignoring config at {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.ring.validate()?;
        self.session.validate()
    }
}
