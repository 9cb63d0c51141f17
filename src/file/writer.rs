//! WAV file writer
//!
//! `write_new_audio` only touches the ring buffer, so it is safe to call from
//! an input callback. Disk writes happen on a flusher thread while recording,
//! or synchronously through `flush`.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use hound::{SampleFormat, WavSpec, WavWriter};

use crate::audio::buffer::{create_shared_buffer, SharedRingBuffer, MAX_CHANNELS};
use crate::constants::{DRAIN_BLOCK_FRAMES, FLUSH_INTERVAL_MS};
use crate::error::FileError;

/// Owns the encoder; lives on the flusher thread while recording
struct FileSink {
    writer: WavWriter<BufWriter<File>>,
    buffer: SharedRingBuffer,
    block: Vec<f32>,
    block_frames: usize,
    channels: usize,
    frames_written: Arc<AtomicU64>,
}

impl FileSink {
    /// Move every unread frame from the ring buffer to the file
    fn drain(&mut self) -> Result<usize, FileError> {
        let mut total = 0;
        loop {
            let pending = self.buffer.num_unread_frames(0)?.min(self.block_frames);
            if pending == 0 {
                break;
            }

            let len = pending * self.channels;
            let fetched =
                self.buffer
                    .fetch_interleaved_data(&mut self.block[..len], pending, self.channels)?;
            if fetched.delivered == 0 {
                break;
            }

            for &sample in &self.block[..fetched.delivered * self.channels] {
                self.writer.write_sample(sample)?;
            }
            self.frames_written
                .fetch_add(fetched.delivered as u64, Ordering::Relaxed);
            total += fetched.delivered;
        }
        Ok(total)
    }
}

/// Records interleaved audio to a 32-bit float WAV file
pub struct AudioFileWriter {
    path: PathBuf,
    buffer: SharedRingBuffer,

    /// Encoder, present while not recording
    sink: Option<FileSink>,

    /// Flusher thread, present while recording; hands the encoder back on exit
    thread_handle: Option<JoinHandle<FileSink>>,

    running: Arc<AtomicBool>,
    frames_written: Arc<AtomicU64>,
    sample_rate: u32,
    channels: usize,
}

impl AudioFileWriter {
    /// Create (or truncate) a WAV file
    ///
    /// `buffer_frames` bounds how much audio can queue between flushes;
    /// anything beyond that is overwritten oldest-first.
    pub fn create(
        path: impl AsRef<Path>,
        sample_rate: u32,
        channels: usize,
        buffer_frames: usize,
    ) -> Result<Self, FileError> {
        if channels == 0 || channels > MAX_CHANNELS {
            return Err(FileError::TooManyChannels(channels));
        }

        let path = path.as_ref().to_path_buf();
        let buffer = create_shared_buffer(buffer_frames, channels)?;
        let spec = WavSpec {
            channels: channels as u16,
            sample_rate,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let writer = WavWriter::create(&path, spec)?;

        let block_frames = DRAIN_BLOCK_FRAMES.min(buffer_frames);
        let frames_written = Arc::new(AtomicU64::new(0));

        tracing::info!(path = %path.display(), sample_rate, channels, "Created audio file");

        Ok(Self {
            path,
            sink: Some(FileSink {
                writer,
                buffer: buffer.clone(),
                block: vec![0.0; block_frames * channels],
                block_frames,
                channels,
                frames_written: frames_written.clone(),
            }),
            buffer,
            thread_handle: None,
            running: Arc::new(AtomicBool::new(false)),
            frames_written,
            sample_rate,
            channels,
        })
    }

    /// Queue interleaved frames for writing
    ///
    /// Never blocks or touches the disk. Returns how many queued frames were
    /// lost because the flusher fell behind.
    pub fn write_new_audio(
        &self,
        data: &[f32],
        frame_count: usize,
        channel_count: usize,
    ) -> Result<usize, FileError> {
        if channel_count != self.channels {
            return Err(FileError::ChannelMismatch {
                expected: self.channels,
                actual: channel_count,
            });
        }
        Ok(self
            .buffer
            .add_interleaved_frames(data, frame_count, channel_count)?)
    }

    /// Start draining to disk in the background
    pub fn record(&mut self) -> Result<(), FileError> {
        let Some(mut sink) = self.sink.take() else {
            return Ok(());
        };

        let running = self.running.clone();
        running.store(true, Ordering::SeqCst);

        let handle = thread::Builder::new()
            .name("file-writer".to_string())
            .spawn(move || {
                while running.load(Ordering::Relaxed) {
                    if let Err(e) = sink.drain() {
                        tracing::error!("Audio file write failed: {}", e);
                        break;
                    }
                    thread::sleep(Duration::from_millis(FLUSH_INTERVAL_MS));
                }
                sink
            })
            .map_err(|e| FileError::Worker(e.to_string()))?;

        self.thread_handle = Some(handle);
        tracing::debug!(path = %self.path.display(), "Recording started");
        Ok(())
    }

    /// Stop the flusher thread; queued audio stays in the buffer
    pub fn pause(&mut self) -> Result<(), FileError> {
        self.running.store(false, Ordering::SeqCst);

        if let Some(handle) = self.thread_handle.take() {
            let sink = handle
                .join()
                .map_err(|_| FileError::Worker("file writer thread panicked".to_string()))?;
            self.sink = Some(sink);
        }
        Ok(())
    }

    pub fn recording(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Write everything queued so far to disk
    ///
    /// Briefly stops the flusher thread if recording, then resumes it.
    pub fn flush(&mut self) -> Result<usize, FileError> {
        let was_recording = self.recording();
        self.pause()?;

        let written = match self.sink.as_mut() {
            Some(sink) => {
                let written = sink.drain()?;
                sink.writer.flush()?;
                written
            }
            None => 0,
        };

        if was_recording {
            self.record()?;
        }
        Ok(written)
    }

    /// Flush and close the file, returning the total frames written
    pub fn finalize(mut self) -> Result<u64, FileError> {
        self.close()?;
        Ok(self.frames_written.load(Ordering::Relaxed))
    }

    fn close(&mut self) -> Result<(), FileError> {
        self.pause()?;
        if let Some(mut sink) = self.sink.take() {
            sink.drain()?;
            sink.writer.finalize()?;
            tracing::info!(
                path = %self.path.display(),
                frames = self.frames_written.load(Ordering::Relaxed),
                "Closed audio file"
            );
        }
        Ok(())
    }

    /// Seconds of audio written to disk
    pub fn duration(&self) -> f32 {
        self.frames_written.load(Ordering::Relaxed) as f32 / self.sample_rate as f32
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> usize {
        self.channels
    }
}

impl Drop for AudioFileWriter {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!("Failed to close {}: {}", self.path.display(), e);
        }
    }
}
