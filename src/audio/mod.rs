//! Audio subsystem module

pub mod buffer;
#[cfg(feature = "device")]
pub mod device;
pub mod sample;
#[cfg(feature = "device")]
pub mod session;

pub use buffer::{ChannelStats, Fetched, RingBuffer, SharedRingBuffer, MAX_CHANNELS};
#[cfg(feature = "device")]
pub use device::{default_input_device, default_output_device, AudioDevice};
pub use sample::{Sample, SampleFormat};
#[cfg(feature = "device")]
pub use session::{AudioCallback, AudioSession};
