//! Sample representations accepted by the ring buffer
//!
//! Everything is stored internally as `f32` in the nominal [-1, 1] range.
//! Integer samples are scaled by their full-scale factor on the way in.

use std::fmt;

/// Full-scale divisor for 16-bit signed integer samples
pub const I16_FULL_SCALE: f32 = 32768.0;

/// Source sample representation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleFormat {
    I16,
    F32,
    F64,
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SampleFormat::I16 => "i16",
            SampleFormat::F32 => "f32",
            SampleFormat::F64 => "f64",
        };
        f.write_str(name)
    }
}

/// A sample type that can be ingested into the ring buffer
pub trait Sample: Copy + Send + 'static {
    /// Representation tag, mostly for logging
    const FORMAT: SampleFormat;

    /// Convert to the internal f32 representation
    fn to_f32(self) -> f32;
}

impl Sample for i16 {
    const FORMAT: SampleFormat = SampleFormat::I16;

    #[inline]
    fn to_f32(self) -> f32 {
        self as f32 / I16_FULL_SCALE
    }
}

impl Sample for f32 {
    const FORMAT: SampleFormat = SampleFormat::F32;

    #[inline]
    fn to_f32(self) -> f32 {
        self
    }
}

impl Sample for f64 {
    const FORMAT: SampleFormat = SampleFormat::F64;

    #[inline]
    fn to_f32(self) -> f32 {
        self as f32
    }
}
