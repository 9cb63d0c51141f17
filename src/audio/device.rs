//! Default audio device lookup
//!
//! The session always runs on the host's default devices; this module only
//! wraps finding them and describing them for logs.

use cpal::traits::{DeviceTrait, HostTrait};

use crate::error::AudioError;

/// Wrapper around a cpal device
pub struct AudioDevice {
    inner: cpal::Device,
    pub name: String,
    pub is_input: bool,
}

impl AudioDevice {
    pub fn from_cpal(device: cpal::Device, is_input: bool) -> Self {
        let name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        Self {
            inner: device,
            name,
            is_input,
        }
    }

    pub fn inner(&self) -> &cpal::Device {
        &self.inner
    }

    /// Default stream configuration in the device's direction
    pub fn default_config(&self) -> Result<cpal::SupportedStreamConfig, AudioError> {
        let config = if self.is_input {
            self.inner.default_input_config()
        } else {
            self.inner.default_output_config()
        };
        config.map_err(|e| AudioError::CpalError(e.to_string()))
    }
}

/// Get default input device
pub fn default_input_device() -> Result<AudioDevice, AudioError> {
    let host = cpal::default_host();
    host.default_input_device()
        .map(|d| AudioDevice::from_cpal(d, true))
        .ok_or_else(|| AudioError::DeviceNotFound("No default input device".to_string()))
}

/// Get default output device
pub fn default_output_device() -> Result<AudioDevice, AudioError> {
    let host = cpal::default_host();
    host.default_output_device()
        .map(|d| AudioDevice::from_cpal(d, false))
        .ok_or_else(|| AudioError::DeviceNotFound("No default output device".to_string()))
}

/// Human-readable summary of a default device
#[derive(Debug, Clone)]
pub struct DeviceSummary {
    pub name: String,
    pub is_input: bool,
    pub sample_rate: u32,
    pub channels: u16,
    pub sample_format: String,
}

impl DeviceSummary {
    fn probe(device: &AudioDevice) -> Option<Self> {
        let config = device.default_config().ok()?;
        Some(Self {
            name: device.name.clone(),
            is_input: device.is_input,
            sample_rate: config.sample_rate().0,
            channels: config.channels(),
            sample_format: format!("{:?}", config.sample_format()),
        })
    }
}

/// Describe the default input and output devices, skipping missing ones
pub fn describe_default_devices() -> Vec<DeviceSummary> {
    [default_input_device(), default_output_device()]
        .into_iter()
        .filter_map(|device| device.ok())
        .filter_map(|device| DeviceSummary::probe(&device))
        .collect()
}
