//! WAV file reader
//!
//! Decodes a WAV file into a ring buffer on a feeder thread and serves
//! interleaved blocks at whatever cadence the caller pulls them, typically
//! from an output callback.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use hound::WavReader;

use crate::audio::buffer::{create_shared_buffer, Fetched, SharedRingBuffer, MAX_CHANNELS};
use crate::audio::sample::Sample;
use crate::constants::{FEED_BLOCK_FRAMES, FEED_INTERVAL_MS};
use crate::error::{BufferError, FileError};

/// Reusable decode block in the file's native representation
enum SampleBlock {
    I16(Vec<i16>),
    F32(Vec<f32>),
}

/// Owns the decoder; lives on the feeder thread while playing
struct FileFeeder {
    reader: WavReader<BufReader<File>>,
    buffer: SharedRingBuffer,
    block: SampleBlock,
    channels: usize,
    finished: Arc<AtomicBool>,
}

impl FileFeeder {
    /// Decode up to `max_frames` frames into the ring buffer
    fn pump(&mut self, max_frames: usize) -> Result<usize, FileError> {
        let wanted = max_frames * self.channels;
        let frames = match &mut self.block {
            SampleBlock::I16(block) => {
                decode_into(&mut self.reader, block, wanted, self.channels, &self.buffer)?
            }
            SampleBlock::F32(block) => {
                decode_into(&mut self.reader, block, wanted, self.channels, &self.buffer)?
            }
        };

        if frames < max_frames {
            self.finished.store(true, Ordering::Release);
        }
        Ok(frames)
    }

    /// Top the ring buffer up until it is full or the file ends
    fn fill(&mut self) -> Result<usize, FileError> {
        let mut total = 0;
        while !self.finished.load(Ordering::Acquire) {
            let free = self.buffer.capacity() - self.buffer.num_unread_frames(0)?;
            if free == 0 {
                break;
            }
            total += self.pump(free.min(FEED_BLOCK_FRAMES))?;
        }
        Ok(total)
    }
}

fn decode_into<S>(
    reader: &mut WavReader<BufReader<File>>,
    block: &mut Vec<S>,
    wanted: usize,
    channels: usize,
    buffer: &SharedRingBuffer,
) -> Result<usize, FileError>
where
    S: hound::Sample + Sample,
{
    block.clear();
    for sample in reader.samples::<S>().take(wanted) {
        block.push(sample?);
    }

    let frames = block.len() / channels;
    buffer.add_interleaved_frames(block, frames, channels)?;
    Ok(frames)
}

/// Streams a WAV file through a ring buffer
pub struct AudioFileReader {
    path: PathBuf,
    buffer: SharedRingBuffer,

    /// Decoder, present while paused
    feeder: Option<FileFeeder>,

    /// Feeder thread, present while playing; hands the decoder back on exit
    thread_handle: Option<JoinHandle<FileFeeder>>,

    running: Arc<AtomicBool>,
    finished: Arc<AtomicBool>,

    /// Interleaved staging for channel count conversion
    scratch: Vec<f32>,

    frames_retrieved: u64,
    total_frames: u64,
    sample_rate: u32,
    channels: usize,
}

impl AudioFileReader {
    /// Open a 16-bit integer or 32-bit float WAV file
    ///
    /// `buffer_frames` sets how much decoded audio is kept ahead of the reader.
    pub fn open(path: impl AsRef<Path>, buffer_frames: usize) -> Result<Self, FileError> {
        let path = path.as_ref().to_path_buf();
        let reader = WavReader::open(&path)?;
        let spec = reader.spec();

        let channels = spec.channels as usize;
        if channels == 0 || channels > MAX_CHANNELS {
            return Err(FileError::TooManyChannels(channels));
        }

        let block_len = FEED_BLOCK_FRAMES * channels;
        let block = match (spec.sample_format, spec.bits_per_sample) {
            (hound::SampleFormat::Int, 16) => SampleBlock::I16(Vec::with_capacity(block_len)),
            (hound::SampleFormat::Float, 32) => SampleBlock::F32(Vec::with_capacity(block_len)),
            (format, bits) => {
                return Err(FileError::UnsupportedFormat(format!(
                    "{:?} {}-bit",
                    format, bits
                )))
            }
        };

        let total_frames = reader.duration() as u64;
        let buffer = create_shared_buffer(buffer_frames, channels)?;
        let finished = Arc::new(AtomicBool::new(false));

        tracing::info!(
            path = %path.display(),
            sample_rate = spec.sample_rate,
            channels,
            total_frames,
            "Opened audio file"
        );

        Ok(Self {
            path,
            feeder: Some(FileFeeder {
                reader,
                buffer: buffer.clone(),
                block,
                channels,
                finished: finished.clone(),
            }),
            buffer,
            thread_handle: None,
            running: Arc::new(AtomicBool::new(false)),
            finished,
            scratch: vec![0.0; buffer_frames * channels],
            frames_retrieved: 0,
            total_frames,
            sample_rate: spec.sample_rate,
            channels,
        })
    }

    /// Decode synchronously until the buffer is full or the file ends
    ///
    /// Does nothing while the feeder thread is running.
    pub fn prime(&mut self) -> Result<usize, FileError> {
        match self.feeder.as_mut() {
            Some(feeder) => feeder.fill(),
            None => Ok(0),
        }
    }

    /// Start keeping the buffer topped up in the background
    pub fn play(&mut self) -> Result<(), FileError> {
        let Some(mut feeder) = self.feeder.take() else {
            return Ok(());
        };

        let running = self.running.clone();
        running.store(true, Ordering::SeqCst);

        let handle = thread::Builder::new()
            .name("file-reader".to_string())
            .spawn(move || {
                while running.load(Ordering::Relaxed) {
                    if let Err(e) = feeder.fill() {
                        tracing::error!("Audio file decode failed: {}", e);
                        feeder.finished.store(true, Ordering::Release);
                    }
                    if feeder.finished.load(Ordering::Acquire) {
                        running.store(false, Ordering::SeqCst);
                        break;
                    }
                    thread::sleep(Duration::from_millis(FEED_INTERVAL_MS));
                }
                feeder
            })
            .map_err(|e| FileError::Worker(e.to_string()))?;

        self.thread_handle = Some(handle);
        tracing::debug!(path = %self.path.display(), "File playback started");
        Ok(())
    }

    /// Stop the feeder thread; buffered audio stays available
    pub fn pause(&mut self) -> Result<(), FileError> {
        self.running.store(false, Ordering::SeqCst);

        if let Some(handle) = self.thread_handle.take() {
            let feeder = handle
                .join()
                .map_err(|_| FileError::Worker("file reader thread panicked".to_string()))?;
            self.feeder = Some(feeder);
        }
        Ok(())
    }

    /// True while the feeder thread is decoding; goes false at end of file
    pub fn is_playing(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Pull `frame_count` interleaved frames of `channel_count` channels
    ///
    /// Missing output channels repeat the file's last channel, so a mono file
    /// plays on both sides of a stereo device. Extra file channels are
    /// dropped. Frames not yet decoded come back as silence.
    pub fn retrieve_fresh_audio(
        &mut self,
        out: &mut [f32],
        frame_count: usize,
        channel_count: usize,
    ) -> Result<Fetched, FileError> {
        let fetched = if channel_count == self.channels {
            self.buffer
                .fetch_interleaved_data(out, frame_count, channel_count)?
        } else {
            if channel_count == 0 {
                return Err(BufferError::InvalidStride.into());
            }
            let needed = frame_count * channel_count;
            if out.len() < needed {
                return Err(BufferError::BufferTooSmall {
                    needed,
                    actual: out.len(),
                }
                .into());
            }

            let file_channels = self.channels;
            let fetched = self.buffer.fetch_interleaved_data(
                &mut self.scratch,
                frame_count,
                file_channels,
            )?;
            for (frame, src) in out[..needed]
                .chunks_exact_mut(channel_count)
                .zip(self.scratch.chunks_exact(file_channels))
            {
                for (c, sample) in frame.iter_mut().enumerate() {
                    *sample = src[c.min(file_channels - 1)];
                }
            }
            fetched
        };

        self.frames_retrieved += fetched.delivered as u64;
        Ok(fetched)
    }

    /// Playback position in seconds
    pub fn current_time(&self) -> f32 {
        self.frames_retrieved as f32 / self.sample_rate as f32
    }

    /// Jump to `seconds` into the file, clamped to its length
    ///
    /// Buffered audio is discarded and decoding restarts at the new
    /// position. A running feeder is stopped for the jump and restarted.
    pub fn set_current_time(&mut self, seconds: f32) -> Result<(), FileError> {
        let was_playing = self.is_playing();
        self.pause()?;

        let frame = ((seconds.max(0.0) * self.sample_rate as f32).round() as u64)
            .min(self.total_frames);
        let feeder = self
            .feeder
            .as_mut()
            .ok_or_else(|| FileError::Worker("file reader has no decoder".to_string()))?;
        let target = u32::try_from(frame)
            .map_err(|_| FileError::UnsupportedFormat(format!("seek to frame {}", frame)))?;
        feeder.reader.seek(target)?;

        self.buffer.clear();
        self.finished
            .store(frame >= self.total_frames, Ordering::Release);
        self.frames_retrieved = frame;
        tracing::debug!(path = %self.path.display(), frame, "Seeked audio file");

        if was_playing {
            self.play()?;
        }
        Ok(())
    }

    /// File length in seconds
    pub fn duration(&self) -> f32 {
        self.total_frames as f32 / self.sample_rate as f32
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// True once the whole file was decoded and retrieved
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
            && self.buffer.num_unread_frames(0).unwrap_or(0) == 0
    }

    /// The ring buffer holding decoded audio, for meters and scopes
    pub fn buffer(&self) -> &SharedRingBuffer {
        &self.buffer
    }
}

impl Drop for AudioFileReader {
    fn drop(&mut self) {
        let _ = self.pause();
    }
}
