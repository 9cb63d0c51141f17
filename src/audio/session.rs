//! Process-wide audio session
//!
//! One `AudioSession` may be alive per process. It opens the host's default
//! input and output devices, hands every input block to a registered input
//! callback (and optionally to a shared ring buffer), and asks a registered
//! output callback to fill every output block.
//!
//! Streams are built and owned by a dedicated thread for as long as the
//! session is playing, so the session handle itself can move freely between
//! threads. Callbacks run synchronously on the host's real-time audio thread.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::StreamConfig;
use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;

use crate::audio::buffer::SharedRingBuffer;
use crate::audio::device::{default_input_device, default_output_device, AudioDevice};
use crate::audio::sample::Sample;
use crate::config::SessionConfig;
use crate::constants::MAX_BLOCK_FRAMES;
use crate::error::{AudioError, BufferError, Result};

/// Callback invoked with `(samples, frame_count, channel_count)`
///
/// Samples are interleaved f32. Input callbacks receive the captured block;
/// output callbacks receive a zeroed block to fill.
pub type AudioCallback = Box<dyn FnMut(&mut [f32], usize, usize) + Send>;

type CallbackSlot = Arc<Mutex<Option<AudioCallback>>>;

static SESSION_ACTIVE: AtomicBool = AtomicBool::new(false);

/// Claim on the one-per-process session slot, released on drop
#[derive(Debug)]
struct SessionGuard(());

impl SessionGuard {
    fn acquire() -> std::result::Result<Self, AudioError> {
        SESSION_ACTIVE
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| SessionGuard(()))
            .map_err(|_| AudioError::SessionActive)
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        SESSION_ACTIVE.store(false, Ordering::Release);
    }
}

/// Shared state handed to the stream thread
#[derive(Clone)]
struct StreamShared {
    running: Arc<AtomicBool>,
    input_callback: CallbackSlot,
    output_callback: CallbackSlot,
    input_buffer: Option<SharedRingBuffer>,
    frames_captured: Arc<AtomicU64>,
    frames_dropped: Arc<AtomicU64>,
    frames_rendered: Arc<AtomicU64>,
    error_tx: Sender<AudioError>,
}

impl StreamShared {
    /// Append one input block to the attached ring buffer, if any
    fn push_input<S: Sample>(&self, data: &[S], frames: usize, channels: usize) {
        let Some(buffer) = &self.input_buffer else {
            return;
        };
        match buffer.add_interleaved_frames(data, frames, channels) {
            Ok(0) => {}
            Ok(dropped) => {
                self.frames_dropped
                    .fetch_add(dropped as u64, Ordering::Relaxed);
            }
            Err(e) => {
                let _ = self.error_tx.try_send(AudioError::Buffer(e));
            }
        }
    }
}

/// Handle to the process-wide audio session
pub struct AudioSession {
    config: SessionConfig,

    /// Whether streams are running
    running: Arc<AtomicBool>,

    /// Stream thread handle
    thread_handle: Option<JoinHandle<()>>,

    input_callback: CallbackSlot,
    output_callback: CallbackSlot,

    /// Ring buffer fed with every input block
    input_buffer: Option<SharedRingBuffer>,

    error_tx: Sender<AudioError>,
    error_rx: Receiver<AudioError>,

    frames_captured: Arc<AtomicU64>,
    frames_dropped: Arc<AtomicU64>,
    frames_rendered: Arc<AtomicU64>,

    input_available: bool,
    num_input_channels: usize,
    num_output_channels: usize,

    _guard: SessionGuard,
}

impl AudioSession {
    /// Open the session
    ///
    /// Fails with `AudioError::SessionActive` while another session is alive.
    /// A missing input device is not an error (`input_available()` reports
    /// it); a missing output device is, when output is enabled.
    pub fn init(config: SessionConfig) -> Result<Self> {
        config.validate()?;
        let guard = SessionGuard::acquire()?;

        let mut num_input_channels = 0;
        if config.input_enabled {
            match default_input_device().and_then(|d| d.default_config()) {
                Ok(c) => num_input_channels = c.channels() as usize,
                Err(e) => tracing::warn!("No audio input available: {}", e),
            }
        }

        let num_output_channels = if config.output_enabled {
            default_output_device()?.default_config()?.channels() as usize
        } else {
            0
        };

        let (error_tx, error_rx) = bounded::<AudioError>(16);

        tracing::info!(
            sample_rate = config.sample_rate,
            input_channels = num_input_channels,
            output_channels = num_output_channels,
            "Audio session initialized"
        );

        Ok(Self {
            config,
            running: Arc::new(AtomicBool::new(false)),
            thread_handle: None,
            input_callback: Arc::new(Mutex::new(None)),
            output_callback: Arc::new(Mutex::new(None)),
            input_buffer: None,
            error_tx,
            error_rx,
            frames_captured: Arc::new(AtomicU64::new(0)),
            frames_dropped: Arc::new(AtomicU64::new(0)),
            frames_rendered: Arc::new(AtomicU64::new(0)),
            input_available: num_input_channels > 0,
            num_input_channels,
            num_output_channels,
            _guard: guard,
        })
    }

    /// Register the input callback, replacing any previous one
    pub fn set_input_callback<F>(&self, callback: F)
    where
        F: FnMut(&mut [f32], usize, usize) + Send + 'static,
    {
        *self.input_callback.lock() = Some(Box::new(callback));
    }

    /// Register the output callback, replacing any previous one
    pub fn set_output_callback<F>(&self, callback: F)
    where
        F: FnMut(&mut [f32], usize, usize) + Send + 'static,
    {
        *self.output_callback.lock() = Some(Box::new(callback));
    }

    /// Remove both callbacks; output falls back to silence
    pub fn clear_callbacks(&self) {
        *self.input_callback.lock() = None;
        *self.output_callback.lock() = None;
    }

    /// Feed every captured block into `buffer` as interleaved frames
    ///
    /// Takes effect on the next `play()`. The buffer needs at least as many
    /// channels as the input device delivers.
    pub fn attach_input_buffer(&mut self, buffer: SharedRingBuffer) -> Result<()> {
        if buffer.channel_count() < self.num_input_channels {
            return Err(AudioError::Buffer(BufferError::InvalidConfiguration(format!(
                "input delivers {} channels but the buffer holds {}",
                self.num_input_channels,
                buffer.channel_count()
            )))
            .into());
        }
        self.input_buffer = Some(buffer);
        Ok(())
    }

    /// Start the input and output streams
    pub fn play(&mut self) -> Result<()> {
        if self.running.load(Ordering::SeqCst) {
            return Ok(());
        }

        let input = if self.config.input_enabled && self.input_available {
            Some(default_input_device()?)
        } else {
            None
        };
        let output = if self.config.output_enabled {
            Some(default_output_device()?)
        } else {
            None
        };

        let shared = StreamShared {
            running: self.running.clone(),
            input_callback: self.input_callback.clone(),
            output_callback: self.output_callback.clone(),
            input_buffer: self.input_buffer.clone(),
            frames_captured: self.frames_captured.clone(),
            frames_dropped: self.frames_dropped.clone(),
            frames_rendered: self.frames_rendered.clone(),
            error_tx: self.error_tx.clone(),
        };
        let config = self.config.clone();

        self.running.store(true, Ordering::SeqCst);

        let handle = thread::Builder::new()
            .name("audio-session".to_string())
            .spawn(move || run_streams(input, output, config, shared))
            .map_err(|e| AudioError::StreamError(e.to_string()))?;

        self.thread_handle = Some(handle);
        tracing::info!("Audio session playing");
        Ok(())
    }

    /// Stop all streams and wait for the stream thread to exit
    pub fn pause(&mut self) {
        self.running.store(false, Ordering::SeqCst);

        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
            tracing::info!("Audio session paused");
        }
    }

    pub fn is_playing(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn input_available(&self) -> bool {
        self.input_available
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate
    }

    pub fn num_input_channels(&self) -> usize {
        self.num_input_channels
    }

    pub fn num_output_channels(&self) -> usize {
        self.num_output_channels
    }

    /// Total input frames delivered since the session was created
    pub fn frames_captured(&self) -> u64 {
        self.frames_captured.load(Ordering::Relaxed)
    }

    /// Unread input frames the attached ring buffer overwrote because its
    /// consumer fell behind
    pub fn frames_dropped(&self) -> u64 {
        self.frames_dropped.load(Ordering::Relaxed)
    }

    /// Total output frames rendered since the session was created
    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered.load(Ordering::Relaxed)
    }

    /// Check for stream errors
    pub fn check_errors(&self) -> Option<AudioError> {
        self.error_rx.try_recv().ok()
    }
}

impl Drop for AudioSession {
    fn drop(&mut self) {
        self.pause();
    }
}

fn stream_config(
    device: &AudioDevice,
    config: &SessionConfig,
) -> std::result::Result<(StreamConfig, cpal::SampleFormat), AudioError> {
    let default_config = device.default_config()?;
    let stream_config = StreamConfig {
        channels: default_config.channels(),
        sample_rate: cpal::SampleRate(config.sample_rate),
        buffer_size: match config.buffer_frames {
            Some(frames) => cpal::BufferSize::Fixed(frames),
            None => cpal::BufferSize::Default,
        },
    };
    Ok((stream_config, default_config.sample_format()))
}

/// Stream thread body: build, play, idle until stopped
fn run_streams(
    input: Option<AudioDevice>,
    output: Option<AudioDevice>,
    config: SessionConfig,
    shared: StreamShared,
) {
    let mut streams = Vec::new();

    if let Some(device) = input {
        tracing::info!("Using input device: {}", device.name);
        match build_input(&device, &config, &shared) {
            Ok(stream) => streams.push(stream),
            Err(e) => {
                tracing::error!("Failed to build input stream: {}", e);
                let _ = shared.error_tx.try_send(e);
            }
        }
    }

    if let Some(device) = output {
        tracing::info!("Using output device: {}", device.name);
        match build_output(&device, &config, &shared) {
            Ok(stream) => streams.push(stream),
            Err(e) => {
                tracing::error!("Failed to build output stream: {}", e);
                let _ = shared.error_tx.try_send(e);
            }
        }
    }

    for stream in &streams {
        if let Err(e) = stream.play() {
            tracing::error!("Failed to start stream: {}", e);
            let _ = shared.error_tx.try_send(AudioError::StreamError(e.to_string()));
        }
    }

    // Keep streams alive while running
    while shared.running.load(Ordering::Relaxed) {
        thread::sleep(Duration::from_millis(10));
    }

    // Streams are dropped here, stopping audio
}

fn build_input(
    device: &AudioDevice,
    config: &SessionConfig,
    shared: &StreamShared,
) -> std::result::Result<cpal::Stream, AudioError> {
    let (stream_config, format) = stream_config(device, config)?;
    match format {
        cpal::SampleFormat::F32 => {
            build_input_stream::<f32>(device, &stream_config, shared.clone())
        }
        cpal::SampleFormat::I16 => {
            build_input_stream::<i16>(device, &stream_config, shared.clone())
        }
        other => Err(AudioError::UnsupportedFormat(format!("{:?}", other))),
    }
}

fn build_input_stream<S>(
    device: &AudioDevice,
    stream_config: &StreamConfig,
    shared: StreamShared,
) -> std::result::Result<cpal::Stream, AudioError>
where
    S: cpal::SizedSample + Sample,
{
    let channels = stream_config.channels as usize;
    let mut scratch = vec![0.0f32; MAX_BLOCK_FRAMES * channels];
    let error_tx = shared.error_tx.clone();

    let format = <S as Sample>::FORMAT;
    tracing::debug!(channels, %format, "building input stream");

    device
        .inner()
        .build_input_stream(
            stream_config,
            move |data: &[S], _: &cpal::InputCallbackInfo| {
                if !shared.running.load(Ordering::Relaxed) {
                    return;
                }
                let frames = data.len() / channels;

                shared.push_input(data, frames, channels);

                if let Some(mut slot) = shared.input_callback.try_lock() {
                    if let Some(callback) = slot.as_mut() {
                        // Only grows if the host delivers an unusually large block
                        if scratch.len() < data.len() {
                            scratch.resize(data.len(), 0.0);
                        }
                        let block = &mut scratch[..data.len()];
                        for (dst, &src) in block.iter_mut().zip(data) {
                            *dst = src.to_f32();
                        }
                        callback(block, frames, channels);
                    }
                }

                shared
                    .frames_captured
                    .fetch_add(frames as u64, Ordering::Relaxed);
            },
            move |err| {
                let _ = error_tx.try_send(AudioError::StreamError(err.to_string()));
            },
            None,
        )
        .map_err(|e| AudioError::StreamError(e.to_string()))
}

fn build_output(
    device: &AudioDevice,
    config: &SessionConfig,
    shared: &StreamShared,
) -> std::result::Result<cpal::Stream, AudioError> {
    let (stream_config, format) = stream_config(device, config)?;
    match format {
        cpal::SampleFormat::F32 => {
            build_output_stream::<f32>(device, &stream_config, shared.clone())
        }
        cpal::SampleFormat::I16 => {
            build_output_stream::<i16>(device, &stream_config, shared.clone())
        }
        other => Err(AudioError::UnsupportedFormat(format!("{:?}", other))),
    }
}

fn build_output_stream<S>(
    device: &AudioDevice,
    stream_config: &StreamConfig,
    shared: StreamShared,
) -> std::result::Result<cpal::Stream, AudioError>
where
    S: cpal::SizedSample + cpal::FromSample<f32>,
{
    let channels = stream_config.channels as usize;
    let mut scratch = vec![0.0f32; MAX_BLOCK_FRAMES * channels];
    let error_tx = shared.error_tx.clone();

    device
        .inner()
        .build_output_stream(
            stream_config,
            move |data: &mut [S], _: &cpal::OutputCallbackInfo| {
                if scratch.len() < data.len() {
                    scratch.resize(data.len(), 0.0);
                }
                let block = &mut scratch[..data.len()];
                block.fill(0.0);

                if shared.running.load(Ordering::Relaxed) {
                    let frames = data.len() / channels;
                    if let Some(mut slot) = shared.output_callback.try_lock() {
                        if let Some(callback) = slot.as_mut() {
                            callback(block, frames, channels);
                        }
                    }
                    shared
                        .frames_rendered
                        .fetch_add(frames as u64, Ordering::Relaxed);
                }

                for (dst, &src) in data.iter_mut().zip(block.iter()) {
                    *dst = <S as cpal::FromSample<f32>>::from_sample_(src);
                }
            },
            move |err| {
                let _ = error_tx.try_send(AudioError::StreamError(err.to_string()));
            },
            None,
        )
        .map_err(|e| AudioError::StreamError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::buffer::create_shared_buffer;

    #[test]
    fn test_single_session_per_process() {
        // Guard and session share one slot, so check both in one test
        let guard = SessionGuard::acquire().unwrap();
        assert!(matches!(
            SessionGuard::acquire(),
            Err(AudioError::SessionActive)
        ));
        assert!(matches!(
            AudioSession::init(SessionConfig::default()),
            Err(crate::Error::Audio(AudioError::SessionActive))
        ));
        drop(guard);

        // The rest needs an output device; CI machines may have none
        let Ok(mut session) = AudioSession::init(SessionConfig::default()) else {
            return;
        };
        assert!(matches!(
            AudioSession::init(SessionConfig::default()),
            Err(crate::Error::Audio(AudioError::SessionActive))
        ));

        let too_narrow = create_shared_buffer(64, 1).unwrap();
        if session.num_input_channels() > 1 {
            assert!(session.attach_input_buffer(too_narrow).is_err());
        }

        session.set_output_callback(|data, frames, channels| {
            assert_eq!(data.len(), frames * channels);
        });
        session.clear_callbacks();
        assert!(!session.is_playing());

        drop(session);
        let session = AudioSession::init(SessionConfig::default());
        assert!(session.is_ok());
    }

    fn shared_with_buffer(buffer: SharedRingBuffer) -> (StreamShared, Receiver<AudioError>) {
        let (error_tx, error_rx) = bounded(4);
        let shared = StreamShared {
            running: Arc::new(AtomicBool::new(true)),
            input_callback: Arc::new(Mutex::new(None)),
            output_callback: Arc::new(Mutex::new(None)),
            input_buffer: Some(buffer),
            frames_captured: Arc::new(AtomicU64::new(0)),
            frames_dropped: Arc::new(AtomicU64::new(0)),
            frames_rendered: Arc::new(AtomicU64::new(0)),
            error_tx,
        };
        (shared, error_rx)
    }

    #[test]
    fn test_input_overrun_is_counted() {
        let buffer = create_shared_buffer(8, 2).unwrap();
        let (shared, error_rx) = shared_with_buffer(buffer.clone());

        let block = [0.5f32; 12];
        shared.push_input(&block, 6, 2);
        assert_eq!(shared.frames_dropped.load(Ordering::Relaxed), 0);

        // 6 unread + 6 new in 8 slots loses 4
        shared.push_input(&block, 6, 2);
        assert_eq!(shared.frames_dropped.load(Ordering::Relaxed), 4);
        assert_eq!(buffer.num_unread_frames(0).unwrap(), 8);
        assert!(error_rx.try_recv().is_err());
    }

    #[test]
    fn test_input_buffer_errors_are_reported() {
        let buffer = create_shared_buffer(8, 1).unwrap();
        let (shared, error_rx) = shared_with_buffer(buffer.clone());

        // A stereo block does not fit a mono buffer
        shared.push_input(&[0i16; 4], 2, 2);
        assert!(matches!(
            error_rx.try_recv(),
            Ok(AudioError::Buffer(BufferError::InvalidChannel { .. }))
        ));
        assert_eq!(buffer.write_head_position(0).unwrap(), 0);
        assert_eq!(shared.frames_dropped.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = SessionConfig {
            input_enabled: false,
            output_enabled: false,
            ..SessionConfig::default()
        };
        assert!(matches!(
            AudioSession::init(config),
            Err(crate::Error::Config(_))
        ));
    }
}
