//! WAV file I/O through ring buffers
//!
//! Both sides decouple disk cadence from audio cadence: the reader decodes
//! ahead on a feeder thread, the writer queues from the audio thread and
//! drains on a flusher thread.

pub mod reader;
pub mod writer;

pub use reader::AudioFileReader;
pub use writer::AudioFileWriter;
