//! Multi-channel ring buffer for audio samples
//!
//! A fixed-capacity circular store with one write cursor and one read cursor
//! per channel. The producer side (a hardware callback, a file decoder) pushes
//! blocks of any supported sample representation; the consumer side pulls
//! arbitrary frame counts at arbitrary strides, either consuming or peeking.
//!
//! The buffer is always writable. When a consumer falls more than `capacity`
//! frames behind, the oldest unread frames are overwritten and the consumer
//! resumes at the oldest surviving sample. Nothing blocks and nothing
//! allocates after construction.
//!
//! ## Threading
//!
//! Each channel is single-producer single-consumer. Samples live in
//! `AtomicU32` slots holding `f32` bits and cursors are `AtomicU64`, so the
//! buffer can be shared through an `Arc` without locks. The write cursor is
//! only stored by the producer and published with `Release`; the read cursor
//! is only stored by the consumer. `clear` and the seek operations are
//! resynchronization points and must not race an active producer or consumer.

use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use crate::audio::sample::Sample;
use crate::config::RingBufferConfig;
use crate::error::BufferError;

/// Maximum number of channels a ring buffer can hold
pub const MAX_CHANNELS: usize = 4;

/// Outcome of an extraction call
///
/// When fewer frames are available than requested, the available frames are
/// copied first and the rest of the request is zero-filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Fetched {
    /// Frames copied from the buffer
    pub delivered: usize,
    /// Frames written as silence because no unread data was available
    pub zero_filled: usize,
}

impl Fetched {
    /// True when the whole request was served from buffered data
    pub fn is_complete(&self) -> bool {
        self.zero_filled == 0
    }
}

/// Single-pass summary of one channel's storage
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelStats {
    pub mean: f32,
    pub min: f32,
    pub max: f32,
    pub unread: usize,
}

/// Storage and cursors for one channel
struct ChannelStore {
    samples: Box<[AtomicU32]>,
    write_index: AtomicU64,
    read_index: AtomicU64,
}

impl ChannelStore {
    fn new(capacity: usize) -> Self {
        let samples = (0..capacity)
            .map(|_| AtomicU32::new(0.0f32.to_bits()))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Self {
            samples,
            write_index: AtomicU64::new(0),
            read_index: AtomicU64::new(0),
        }
    }

    #[inline]
    fn get(&self, slot: usize) -> f32 {
        f32::from_bits(self.samples[slot].load(Ordering::Relaxed))
    }

    #[inline]
    fn put(&self, slot: usize, value: f32) {
        self.samples[slot].store(value.to_bits(), Ordering::Relaxed);
    }

    fn values(&self) -> impl Iterator<Item = f32> + '_ {
        self.samples
            .iter()
            .map(|s| f32::from_bits(s.load(Ordering::Relaxed)))
    }
}

/// Fixed-capacity multi-channel sample ring buffer
pub struct RingBuffer {
    channels: Box<[ChannelStore]>,
    capacity: usize,
}

impl RingBuffer {
    /// Create a ring buffer holding `capacity` frames for each of
    /// `channel_count` channels
    pub fn new(capacity: usize, channel_count: usize) -> Result<Self, BufferError> {
        if capacity == 0 {
            return Err(BufferError::InvalidConfiguration(
                "capacity must be at least 1 frame".to_string(),
            ));
        }
        if channel_count == 0 || channel_count > MAX_CHANNELS {
            return Err(BufferError::InvalidConfiguration(format!(
                "channel count must be between 1 and {}, got {}",
                MAX_CHANNELS, channel_count
            )));
        }

        let channels = (0..channel_count)
            .map(|_| ChannelStore::new(capacity))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        tracing::debug!(capacity, channel_count, "ring buffer allocated");

        Ok(Self { channels, capacity })
    }

    /// Create a ring buffer from its configuration object
    pub fn from_config(config: &RingBufferConfig) -> Result<Self, BufferError> {
        Self::new(config.capacity, config.channel_count)
    }

    /// Frames retained per channel
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of channels
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    fn store(&self, channel: usize) -> Result<&ChannelStore, BufferError> {
        self.channels.get(channel).ok_or(BufferError::InvalidChannel {
            channel,
            channel_count: self.channels.len(),
        })
    }

    fn check_channel_count(&self, channel_count: usize) -> Result<(), BufferError> {
        if channel_count == 0 || channel_count > self.channels.len() {
            return Err(BufferError::InvalidChannel {
                channel: channel_count.saturating_sub(1),
                channel_count: self.channels.len(),
            });
        }
        Ok(())
    }

    fn check_request(&self, frame_count: usize) -> Result<(), BufferError> {
        if frame_count > self.capacity {
            return Err(BufferError::RequestExceedsCapacity {
                requested: frame_count,
                capacity: self.capacity,
            });
        }
        Ok(())
    }

    /// Unread frames given a pair of cursor values
    #[inline]
    fn unread(&self, write: u64, read: u64) -> usize {
        write.saturating_sub(read).min(self.capacity as u64) as usize
    }

    // ------------------------------------------------------------------
    // Ingestion
    // ------------------------------------------------------------------

    /// Append `frame_count` samples to one channel
    ///
    /// Samples are converted to `f32` (16-bit integers are divided by 32768).
    /// If more than `capacity` frames are written at once only the last
    /// `capacity` survive, but the write cursor still advances by the full
    /// `frame_count`.
    ///
    /// Returns how many frames were lost to overrun by this call: unread
    /// frames pushed out, plus any leading part of an oversized block.
    pub fn add_frames<S: Sample>(
        &self,
        source: &[S],
        frame_count: usize,
        channel: usize,
    ) -> Result<usize, BufferError> {
        let store = self.store(channel)?;
        check_len(frame_count, source.len())?;

        Ok(self.push_channel(store, frame_count, |i| source[i].to_f32()))
    }

    /// Append `frame_count` interleaved frames of `channel_count` channels
    ///
    /// Channel `c` of the source lands in channel `c` of the buffer. All
    /// touched channels advance by the same `frame_count`.
    ///
    /// Returns the largest overwrite count across the touched channels.
    pub fn add_interleaved_frames<S: Sample>(
        &self,
        source: &[S],
        frame_count: usize,
        channel_count: usize,
    ) -> Result<usize, BufferError> {
        self.check_channel_count(channel_count)?;
        check_len(frame_count * channel_count, source.len())?;

        let mut overwritten = 0;
        for (c, store) in self.channels[..channel_count].iter().enumerate() {
            let dropped =
                self.push_channel(store, frame_count, |i| source[i * channel_count + c].to_f32());
            overwritten = overwritten.max(dropped);
        }
        Ok(overwritten)
    }

    /// Write `len` samples produced by `sample_at` at the channel's write
    /// cursor, wrapping at most once, then publish the new cursor.
    fn push_channel(
        &self,
        store: &ChannelStore,
        len: usize,
        sample_at: impl Fn(usize) -> f32,
    ) -> usize {
        let cap = self.capacity;
        let write = store.write_index.load(Ordering::Relaxed);
        let read = store.read_index.load(Ordering::Acquire);
        let unread_before = self.unread(write, read);

        let skip = len.saturating_sub(cap);
        let offset = ((write + skip as u64) % cap as u64) as usize;
        let first_run = (len - skip).min(cap - offset);

        for (n, i) in (skip..skip + first_run).enumerate() {
            store.put(offset + n, sample_at(i));
        }
        for (slot, i) in (skip + first_run..len).enumerate() {
            store.put(slot, sample_at(i));
        }

        store
            .write_index
            .store(write + len as u64, Ordering::Release);

        len - len.min(cap - unread_before)
    }

    // ------------------------------------------------------------------
    // Extraction
    // ------------------------------------------------------------------

    /// Oldest position a consumer may still read, and how many frames follow it
    fn read_window(&self, store: &ChannelStore) -> (u64, usize) {
        let write = store.write_index.load(Ordering::Acquire);
        let read = store.read_index.load(Ordering::Relaxed);
        let start = read.max(write.saturating_sub(self.capacity as u64));
        (start, self.unread(write, start))
    }

    fn copy_out(
        &self,
        store: &ChannelStore,
        start: u64,
        available: usize,
        dest: &mut [f32],
        frame_count: usize,
        stride: usize,
    ) -> Fetched {
        let cap = self.capacity;
        let delivered = frame_count.min(available);
        let mut slot = (start % cap as u64) as usize;

        for i in 0..delivered {
            dest[i * stride] = store.get(slot);
            slot += 1;
            if slot == cap {
                slot = 0;
            }
        }
        for i in delivered..frame_count {
            dest[i * stride] = 0.0;
        }

        Fetched {
            delivered,
            zero_filled: frame_count - delivered,
        }
    }

    /// Copy the `frame_count` frames ending at logical position `end`,
    /// zero-filling the front for anything older than the surviving window
    fn copy_ending_at(
        &self,
        store: &ChannelStore,
        end: u64,
        write: u64,
        dest: &mut [f32],
        frame_count: usize,
        stride: usize,
    ) -> Fetched {
        let oldest = write.saturating_sub(self.capacity as u64);
        let delivered = (end.saturating_sub(oldest) as usize).min(frame_count);
        let missing = frame_count - delivered;

        for i in 0..missing {
            dest[i * stride] = 0.0;
        }
        if delivered > 0 {
            self.copy_out(
                store,
                end - delivered as u64,
                delivered,
                &mut dest[missing * stride..],
                delivered,
                stride,
            );
        }

        Fetched {
            delivered,
            zero_filled: missing,
        }
    }

    fn check_dest(
        &self,
        dest: &[f32],
        frame_count: usize,
        stride: usize,
    ) -> Result<(), BufferError> {
        if stride == 0 {
            return Err(BufferError::InvalidStride);
        }
        self.check_request(frame_count)?;
        check_len(strided_len(frame_count, stride), dest.len())
    }

    /// Replay the `frame_count` frames ending at the read cursor without
    /// consuming anything
    ///
    /// These are the frames most recently handed out by `fetch_fresh_data`,
    /// so a visualizer can show exactly what playback just consumed. Repeated
    /// calls with no intervening read or write return identical data. Frames
    /// never written, or already overwritten, come back as leading zeros.
    pub fn fetch_data(
        &self,
        dest: &mut [f32],
        frame_count: usize,
        channel: usize,
        stride: usize,
    ) -> Result<Fetched, BufferError> {
        let store = self.store(channel)?;
        self.check_dest(dest, frame_count, stride)?;

        let write = store.write_index.load(Ordering::Acquire);
        let read = store.read_index.load(Ordering::Relaxed);
        let end = read
            .max(write.saturating_sub(self.capacity as u64))
            .min(write);
        Ok(self.copy_ending_at(store, end, write, dest, frame_count, stride))
    }

    /// Copy `frame_count` frames starting at the read cursor and consume them
    ///
    /// If fewer frames are unread, the shortfall is zero-filled and the read
    /// cursor only advances past the frames actually delivered, so it never
    /// overtakes the write cursor.
    pub fn fetch_fresh_data(
        &self,
        dest: &mut [f32],
        frame_count: usize,
        channel: usize,
        stride: usize,
    ) -> Result<Fetched, BufferError> {
        let store = self.store(channel)?;
        self.check_dest(dest, frame_count, stride)?;

        let (start, available) = self.read_window(store);
        let fetched = self.copy_out(store, start, available, dest, frame_count, stride);
        store
            .read_index
            .store(start + fetched.delivered as u64, Ordering::Release);

        Ok(fetched)
    }

    /// Consuming interleaved read across channels `0..channel_count`
    ///
    /// The report carries the smallest delivered count across channels.
    pub fn fetch_interleaved_data(
        &self,
        dest: &mut [f32],
        frame_count: usize,
        channel_count: usize,
    ) -> Result<Fetched, BufferError> {
        self.check_channel_count(channel_count)?;
        self.check_request(frame_count)?;
        check_len(frame_count * channel_count, dest.len())?;
        if frame_count == 0 {
            return Ok(Fetched::default());
        }

        let mut delivered = frame_count;
        for (c, store) in self.channels[..channel_count].iter().enumerate() {
            let (start, available) = self.read_window(store);
            let fetched =
                self.copy_out(store, start, available, &mut dest[c..], frame_count, channel_count);
            store
                .read_index
                .store(start + fetched.delivered as u64, Ordering::Release);
            delivered = delivered.min(fetched.delivered);
        }

        Ok(Fetched {
            delivered,
            zero_filled: frame_count - delivered,
        })
    }

    /// Copy the most recent `frame_count` frames, ending at the write cursor,
    /// without touching the read cursor
    ///
    /// Meant for scopes and meters that always want the newest audio. If less
    /// than `frame_count` frames were ever written, the leading part of the
    /// destination is zero-filled so the newest sample is always last.
    pub fn fetch_latest(
        &self,
        dest: &mut [f32],
        frame_count: usize,
        channel: usize,
        stride: usize,
    ) -> Result<Fetched, BufferError> {
        let store = self.store(channel)?;
        self.check_dest(dest, frame_count, stride)?;

        let write = store.write_index.load(Ordering::Acquire);
        Ok(self.copy_ending_at(store, write, write, dest, frame_count, stride))
    }

    // ------------------------------------------------------------------
    // Cursor control
    // ------------------------------------------------------------------

    /// Move the write cursor by a relative offset (saturating at 0)
    pub fn seek_write_head(&self, offset: i64, channel: usize) -> Result<(), BufferError> {
        let store = self.store(channel)?;
        let write = store.write_index.load(Ordering::Relaxed);
        store
            .write_index
            .store(write.saturating_add_signed(offset), Ordering::Release);
        Ok(())
    }

    /// Move the read cursor by a relative offset (saturating at 0)
    pub fn seek_read_head(&self, offset: i64, channel: usize) -> Result<(), BufferError> {
        let store = self.store(channel)?;
        let read = store.read_index.load(Ordering::Relaxed);
        store
            .read_index
            .store(read.saturating_add_signed(offset), Ordering::Release);
        Ok(())
    }

    /// Logical write cursor: total frames written to the channel
    pub fn write_head_position(&self, channel: usize) -> Result<u64, BufferError> {
        Ok(self.store(channel)?.write_index.load(Ordering::Acquire))
    }

    /// Logical read cursor: total frames consumed from the channel
    pub fn read_head_position(&self, channel: usize) -> Result<u64, BufferError> {
        Ok(self.store(channel)?.read_index.load(Ordering::Acquire))
    }

    /// Frames written since a previously recorded write cursor value
    pub fn num_new_frames(&self, last_read_frame: u64, channel: usize) -> Result<u64, BufferError> {
        let write = self.write_head_position(channel)?;
        Ok(write.saturating_sub(last_read_frame))
    }

    /// Frames written but not yet consumed, at most `capacity`
    pub fn num_unread_frames(&self, channel: usize) -> Result<usize, BufferError> {
        let store = self.store(channel)?;
        let write = store.write_index.load(Ordering::Acquire);
        let read = store.read_index.load(Ordering::Acquire);
        Ok(self.unread(write, read))
    }

    /// Unread frames as a fraction of capacity
    pub fn fill_level(&self, channel: usize) -> Result<f32, BufferError> {
        Ok(self.num_unread_frames(channel)? as f32 / self.capacity as f32)
    }

    /// Zero all storage and reset every cursor
    pub fn clear(&self) {
        for store in self.channels.iter() {
            for slot in store.samples.iter() {
                slot.store(0.0f32.to_bits(), Ordering::Relaxed);
            }
            store.read_index.store(0, Ordering::Release);
            store.write_index.store(0, Ordering::Release);
        }
        tracing::debug!(capacity = self.capacity, "ring buffer cleared");
    }

    // ------------------------------------------------------------------
    // Analytics
    // ------------------------------------------------------------------

    /// Mean over the channel's whole storage
    pub fn mean(&self, channel: usize) -> Result<f32, BufferError> {
        let store = self.store(channel)?;
        let sum: f64 = store.values().map(f64::from).sum();
        Ok((sum / self.capacity as f64) as f32)
    }

    /// Largest sample in the channel's storage
    pub fn max(&self, channel: usize) -> Result<f32, BufferError> {
        let store = self.store(channel)?;
        Ok(store.values().fold(f32::NEG_INFINITY, f32::max))
    }

    /// Smallest sample in the channel's storage
    pub fn min(&self, channel: usize) -> Result<f32, BufferError> {
        let store = self.store(channel)?;
        Ok(store.values().fold(f32::INFINITY, f32::min))
    }

    /// Mean, min, max and unread count in one pass
    pub fn stats(&self, channel: usize) -> Result<ChannelStats, BufferError> {
        let store = self.store(channel)?;
        let mut sum = 0.0f64;
        let mut min = f32::INFINITY;
        let mut max = f32::NEG_INFINITY;
        for v in store.values() {
            sum += f64::from(v);
            min = min.min(v);
            max = max.max(v);
        }

        Ok(ChannelStats {
            mean: (sum / self.capacity as f64) as f32,
            min,
            max,
            unread: self.num_unread_frames(channel)?,
        })
    }
}

impl fmt::Debug for RingBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RingBuffer")
            .field("capacity", &self.capacity)
            .field("channel_count", &self.channels.len())
            .finish()
    }
}

/// Samples a strided destination must hold for `frame_count` frames
#[inline]
fn strided_len(frame_count: usize, stride: usize) -> usize {
    if frame_count == 0 {
        0
    } else {
        (frame_count - 1) * stride + 1
    }
}

#[inline]
fn check_len(needed: usize, actual: usize) -> Result<(), BufferError> {
    if actual < needed {
        return Err(BufferError::BufferTooSmall { needed, actual });
    }
    Ok(())
}

/// Thread-safe handle to a ring buffer
pub type SharedRingBuffer = Arc<RingBuffer>;

/// Create a new shared ring buffer
pub fn create_shared_buffer(
    capacity: usize,
    channel_count: usize,
) -> Result<SharedRingBuffer, BufferError> {
    RingBuffer::new(capacity, channel_count).map(Arc::new)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(start: usize, len: usize) -> Vec<f32> {
        (start..start + len).map(|i| i as f32).collect()
    }

    #[test]
    fn test_construction_limits() {
        assert!(RingBuffer::new(0, 1).is_err());
        assert!(RingBuffer::new(16, 0).is_err());
        assert!(matches!(
            RingBuffer::new(16, MAX_CHANNELS + 1),
            Err(BufferError::InvalidConfiguration(_))
        ));

        let buffer = RingBuffer::new(16, MAX_CHANNELS).unwrap();
        assert_eq!(buffer.capacity(), 16);
        assert_eq!(buffer.channel_count(), MAX_CHANNELS);
    }

    #[test]
    fn test_invalid_channel() {
        let buffer = RingBuffer::new(8, 2).unwrap();
        let mut out = [0.0f32; 4];

        assert_eq!(
            buffer.add_frames(&[1.0f32], 1, 2),
            Err(BufferError::InvalidChannel {
                channel: 2,
                channel_count: 2
            })
        );
        assert!(buffer.fetch_data(&mut out, 4, 3, 1).is_err());
        assert!(buffer.mean(9).is_err());
        assert!(buffer.num_unread_frames(2).is_err());
        assert!(buffer.add_interleaved_frames(&[0.0f32; 12], 4, 3).is_err());
    }

    #[test]
    fn test_float_round_trip() {
        let buffer = RingBuffer::new(32, 1).unwrap();
        let input = ramp(0, 20);

        buffer.add_frames(&input, 20, 0).unwrap();
        assert_eq!(buffer.num_unread_frames(0).unwrap(), 20);

        let mut out = vec![0.0f32; 20];
        let fetched = buffer.fetch_fresh_data(&mut out, 20, 0, 1).unwrap();
        assert!(fetched.is_complete());
        assert_eq!(out, input);
        assert_eq!(buffer.num_unread_frames(0).unwrap(), 0);
    }

    #[test]
    fn test_i16_and_f64_ingestion() {
        let buffer = RingBuffer::new(8, 2).unwrap();
        buffer.add_frames(&[16384i16, -32768, 0], 3, 0).unwrap();
        buffer.add_frames(&[0.25f64, -0.5], 2, 1).unwrap();

        let mut out = [0.0f32; 3];
        buffer.fetch_fresh_data(&mut out, 3, 0, 1).unwrap();
        assert!((out[0] - 0.5).abs() <= 1.0 / 32768.0);
        assert_eq!(out[1], -1.0);
        assert_eq!(out[2], 0.0);

        let mut out = [0.0f32; 2];
        buffer.fetch_fresh_data(&mut out, 2, 1, 1).unwrap();
        assert_eq!(out, [0.25, -0.5]);
    }

    #[test]
    fn test_unread_saturates_and_reports_overwrite() {
        let buffer = RingBuffer::new(10, 1).unwrap();

        assert_eq!(buffer.add_frames(&ramp(0, 6), 6, 0).unwrap(), 0);
        assert_eq!(buffer.num_unread_frames(0).unwrap(), 6);

        // 4 fit, 2 overwrite
        assert_eq!(buffer.add_frames(&ramp(6, 6), 6, 0).unwrap(), 2);
        assert_eq!(buffer.num_unread_frames(0).unwrap(), 10);

        assert_eq!(buffer.add_frames(&ramp(12, 3), 3, 0).unwrap(), 3);
        assert_eq!(buffer.num_unread_frames(0).unwrap(), 10);
    }

    #[test]
    fn test_wraparound_keeps_latest_capacity() {
        let cap = 16;
        let buffer = RingBuffer::new(cap, 1).unwrap();
        buffer.add_frames(&ramp(0, cap), cap, 0).unwrap();
        buffer.add_frames(&ramp(cap, 10), 10, 0).unwrap();

        let mut out = vec![0.0f32; cap];
        let fetched = buffer.fetch_fresh_data(&mut out, cap, 0, 1).unwrap();
        assert_eq!(fetched.delivered, cap);
        assert_eq!(out, ramp(10, cap));
        assert_eq!(buffer.read_head_position(0).unwrap(), (cap + 10) as u64);
    }

    #[test]
    fn test_single_write_larger_than_capacity() {
        let buffer = RingBuffer::new(8, 1).unwrap();
        let input = ramp(0, 21);

        assert_eq!(buffer.add_frames(&input, 21, 0).unwrap(), 13);
        assert_eq!(buffer.write_head_position(0).unwrap(), 21);

        let mut out = [0.0f32; 8];
        buffer.fetch_fresh_data(&mut out, 8, 0, 1).unwrap();
        assert_eq!(out.to_vec(), ramp(13, 8));
    }

    #[test]
    fn test_peek_replays_last_consumed_frames() {
        let buffer = RingBuffer::new(16, 1).unwrap();
        buffer.add_frames(&ramp(1, 12), 12, 0).unwrap();

        // Nothing consumed yet, so there is nothing to replay
        let mut first = [9.0f32; 8];
        let fetched = buffer.fetch_data(&mut first, 8, 0, 1).unwrap();
        assert_eq!(fetched.delivered, 0);
        assert_eq!(first, [0.0; 8]);

        let mut consumed = [0.0f32; 8];
        buffer.fetch_fresh_data(&mut consumed, 8, 0, 1).unwrap();

        let mut second = [0.0f32; 8];
        buffer.fetch_data(&mut first, 8, 0, 1).unwrap();
        buffer.fetch_data(&mut second, 8, 0, 1).unwrap();
        assert_eq!(first, consumed);
        assert_eq!(second, consumed);
        assert_eq!(buffer.read_head_position(0).unwrap(), 8);
        assert_eq!(buffer.num_unread_frames(0).unwrap(), 4);
    }

    #[test]
    fn test_peek_zero_fills_overwritten_history() {
        let buffer = RingBuffer::new(8, 1).unwrap();
        buffer.add_frames(&ramp(0, 6), 6, 0).unwrap();
        let mut consumed = [0.0f32; 6];
        buffer.fetch_fresh_data(&mut consumed, 6, 0, 1).unwrap();

        // Frames 0 and 1 are gone once the write cursor reaches 10
        buffer.add_frames(&ramp(6, 4), 4, 0).unwrap();

        let mut out = [9.0f32; 6];
        let fetched = buffer.fetch_data(&mut out, 6, 0, 1).unwrap();
        assert_eq!(
            fetched,
            Fetched {
                delivered: 4,
                zero_filled: 2
            }
        );
        assert_eq!(out, [0.0, 0.0, 2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_fresh_read_zero_fills_shortfall() {
        let buffer = RingBuffer::new(16, 1).unwrap();
        buffer.add_frames(&[0.1f32, 0.2, 0.3], 3, 0).unwrap();

        let mut out = [9.0f32; 5];
        let fetched = buffer.fetch_fresh_data(&mut out, 5, 0, 1).unwrap();
        assert_eq!(
            fetched,
            Fetched {
                delivered: 3,
                zero_filled: 2
            }
        );
        assert_eq!(out, [0.1, 0.2, 0.3, 0.0, 0.0]);
        assert_eq!(buffer.read_head_position(0).unwrap(), 3);

        // Exhausted: all silence, cursor stays put
        let fetched = buffer.fetch_fresh_data(&mut out, 5, 0, 1).unwrap();
        assert_eq!(fetched.delivered, 0);
        assert_eq!(out, [0.0; 5]);
        assert_eq!(buffer.read_head_position(0).unwrap(), 3);

        // New data is picked up right where the cursor stopped
        buffer.add_frames(&[0.7f32], 1, 0).unwrap();
        let fetched = buffer.fetch_fresh_data(&mut out[..1], 1, 0, 1).unwrap();
        assert!(fetched.is_complete());
        assert_eq!(out[0], 0.7);
    }

    #[test]
    fn test_request_exceeds_capacity() {
        let buffer = RingBuffer::new(4, 1).unwrap();
        let mut out = [0.0f32; 8];
        assert_eq!(
            buffer.fetch_data(&mut out, 5, 0, 1),
            Err(BufferError::RequestExceedsCapacity {
                requested: 5,
                capacity: 4
            })
        );
        assert!(buffer.fetch_fresh_data(&mut out, 5, 0, 1).is_err());
        assert!(buffer.fetch_interleaved_data(&mut out, 5, 1).is_err());
    }

    #[test]
    fn test_slice_validation() {
        let buffer = RingBuffer::new(8, 2).unwrap();
        let mut out = [0.0f32; 4];

        assert_eq!(
            buffer.add_frames(&[1.0f32; 2], 3, 0),
            Err(BufferError::BufferTooSmall {
                needed: 3,
                actual: 2
            })
        );
        assert_eq!(
            buffer.fetch_data(&mut out, 2, 0, 0),
            Err(BufferError::InvalidStride)
        );
        // stride 2 over 3 frames needs 5 slots
        assert!(buffer.fetch_data(&mut out, 3, 0, 2).is_err());
        assert!(buffer.fetch_data(&mut out, 2, 0, 3).is_ok());
    }

    #[test]
    fn test_strided_fetch_into_interleaved_destination() {
        let buffer = RingBuffer::new(8, 2).unwrap();
        buffer.add_frames(&[1.0f32, 2.0, 3.0], 3, 0).unwrap();
        buffer.add_frames(&[-1.0f32, -2.0, -3.0], 3, 1).unwrap();

        let mut out = [0.0f32; 6];
        buffer.fetch_fresh_data(&mut out, 3, 0, 2).unwrap();
        buffer.fetch_fresh_data(&mut out[1..], 3, 1, 2).unwrap();
        assert_eq!(out, [1.0, -1.0, 2.0, -2.0, 3.0, -3.0]);
    }

    #[test]
    fn test_interleaved_round_trip() {
        let buffer = RingBuffer::new(8, 2).unwrap();
        let interleaved = [0.0f32, 10.0, 1.0, 11.0, 2.0, 12.0];
        buffer.add_interleaved_frames(&interleaved, 3, 2).unwrap();

        assert_eq!(buffer.write_head_position(0).unwrap(), 3);
        assert_eq!(buffer.write_head_position(1).unwrap(), 3);

        let mut left = [0.0f32; 3];
        let mut right = [0.0f32; 3];
        buffer.fetch_fresh_data(&mut left, 3, 0, 1).unwrap();
        buffer.fetch_fresh_data(&mut right, 3, 1, 1).unwrap();
        assert_eq!(left, [0.0, 1.0, 2.0]);
        assert_eq!(right, [10.0, 11.0, 12.0]);
    }

    #[test]
    fn test_fetch_interleaved_advances_all_channels() {
        let buffer = RingBuffer::new(8, 2).unwrap();
        buffer
            .add_interleaved_frames(&[1i16, 2, 3, 4], 2, 2)
            .unwrap();

        let mut out = [0.0f32; 6];
        let fetched = buffer.fetch_interleaved_data(&mut out, 3, 2).unwrap();
        assert_eq!(fetched.delivered, 2);
        assert_eq!(fetched.zero_filled, 1);
        assert_eq!(out[0] * 32768.0, 1.0);
        assert_eq!(out[1] * 32768.0, 2.0);
        assert_eq!(out[3] * 32768.0, 4.0);
        assert_eq!(&out[4..], &[0.0, 0.0]);

        assert_eq!(buffer.read_head_position(0).unwrap(), 2);
        assert_eq!(buffer.read_head_position(1).unwrap(), 2);
    }

    #[test]
    fn test_fetch_latest_ends_at_write_head() {
        let buffer = RingBuffer::new(8, 1).unwrap();
        buffer.add_frames(&ramp(0, 3), 3, 0).unwrap();

        let mut out = [9.0f32; 5];
        let fetched = buffer.fetch_latest(&mut out, 5, 0, 1).unwrap();
        assert_eq!(fetched.delivered, 3);
        assert_eq!(out, [0.0, 0.0, 0.0, 1.0, 2.0]);

        buffer.add_frames(&ramp(3, 9), 9, 0).unwrap();
        let fetched = buffer.fetch_latest(&mut out, 5, 0, 1).unwrap();
        assert!(fetched.is_complete());
        assert_eq!(out.to_vec(), ramp(7, 5));
        assert_eq!(buffer.read_head_position(0).unwrap(), 0);
    }

    #[test]
    fn test_num_new_frames() {
        let buffer = RingBuffer::new(8, 1).unwrap();
        assert_eq!(buffer.num_new_frames(0, 0).unwrap(), 0);

        buffer.add_frames(&ramp(0, 5), 5, 0).unwrap();
        assert_eq!(buffer.num_new_frames(0, 0).unwrap(), 5);

        let mark = buffer.write_head_position(0).unwrap();
        buffer.add_frames(&ramp(0, 2), 2, 0).unwrap();
        assert_eq!(buffer.num_new_frames(mark, 0).unwrap(), 2);
        assert_eq!(buffer.num_new_frames(100, 0).unwrap(), 0);
    }

    #[test]
    fn test_seek_heads() {
        let buffer = RingBuffer::new(8, 1).unwrap();
        buffer.add_frames(&ramp(0, 6), 6, 0).unwrap();

        buffer.seek_read_head(4, 0).unwrap();
        assert_eq!(buffer.num_unread_frames(0).unwrap(), 2);

        let mut out = [0.0f32; 2];
        buffer.fetch_data(&mut out, 2, 0, 1).unwrap();
        assert_eq!(out, [2.0, 3.0]);

        buffer.seek_read_head(-3, 0).unwrap();
        assert_eq!(buffer.read_head_position(0).unwrap(), 1);

        buffer.seek_write_head(-10, 0).unwrap();
        assert_eq!(buffer.write_head_position(0).unwrap(), 0);
        assert_eq!(buffer.num_unread_frames(0).unwrap(), 0);
    }

    #[test]
    fn test_analytics_and_clear() {
        let buffer = RingBuffer::new(4, 1).unwrap();
        buffer.add_frames(&[1.0f32, -3.0, 2.0, 4.0], 4, 0).unwrap();

        assert_eq!(buffer.mean(0).unwrap(), 1.0);
        assert_eq!(buffer.max(0).unwrap(), 4.0);
        assert_eq!(buffer.min(0).unwrap(), -3.0);

        let stats = buffer.stats(0).unwrap();
        assert_eq!(stats.unread, 4);
        assert_eq!(stats.min, -3.0);

        buffer.clear();
        assert_eq!(buffer.mean(0).unwrap(), 0.0);
        assert_eq!(buffer.max(0).unwrap(), 0.0);
        assert_eq!(buffer.min(0).unwrap(), 0.0);
        assert_eq!(buffer.write_head_position(0).unwrap(), 0);
        assert_eq!(buffer.read_head_position(0).unwrap(), 0);

        let mut out = [5.0f32; 4];
        let fetched = buffer.fetch_fresh_data(&mut out, 4, 0, 1).unwrap();
        assert_eq!(fetched.delivered, 0);
        assert_eq!(out, [0.0; 4]);
    }

    #[test]
    fn test_fill_level() {
        let buffer = RingBuffer::new(8, 1).unwrap();
        buffer.add_frames(&ramp(0, 2), 2, 0).unwrap();
        assert_eq!(buffer.fill_level(0).unwrap(), 0.25);
    }

    #[test]
    fn test_concurrent_producer_consumer() {
        let buffer = create_shared_buffer(4096, 1).unwrap();
        let producer = Arc::clone(&buffer);
        let total = 64 * 256;

        let handle = std::thread::spawn(move || {
            let mut next = 0usize;
            while next < total {
                // Keep at least one block of headroom so nothing is overwritten
                if producer.num_unread_frames(0).unwrap() <= 4096 - 256 {
                    producer.add_frames(&ramp(next, 256), 256, 0).unwrap();
                    next += 256;
                } else {
                    std::thread::yield_now();
                }
            }
        });

        let mut received = Vec::with_capacity(total);
        let mut block = [0.0f32; 100];
        while received.len() < total {
            let fetched = buffer.fetch_fresh_data(&mut block, 100, 0, 1).unwrap();
            received.extend_from_slice(&block[..fetched.delivered]);
            if fetched.delivered == 0 {
                std::thread::yield_now();
            }
        }
        handle.join().unwrap();

        assert_eq!(received, ramp(0, total));
    }
}
