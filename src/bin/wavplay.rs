//! WAV Player
//!
//! Streams a WAV file to the default output device through a ring buffer.
//!
//! ```text
//! wavplay <file.wav>
//! ```

use anyhow::{Context, Result};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use audio_ring::{audio::AudioSession, file::AudioFileReader, AppConfig, SessionConfig};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let path = std::env::args()
        .nth(1)
        .context("usage: wavplay <file.wav>")?;

    tracing::info!("Starting WAV player");

    let config = AppConfig::load_or_default();

    let mut reader = AudioFileReader::open(&path, config.ring.capacity)
        .with_context(|| format!("Failed to open {}", path))?;
    let session_config = SessionConfig {
        sample_rate: reader.sample_rate(),
        input_enabled: false,
        ..config.session.clone()
    };

    println!("\n=== {} ===", path);
    println!("  Sample rate: {} Hz", reader.sample_rate());
    println!("  Channels: {}", reader.channels());
    println!("  Duration: {:.2} s", reader.duration());
    println!();

    reader.prime()?;
    reader.play()?;
    let reader = Arc::new(Mutex::new(reader));

    let mut session = AudioSession::init(session_config)?;
    {
        let reader = reader.clone();
        session.set_output_callback(move |data, frames, channels| {
            // Skip a block rather than wait on the reporting thread
            if let Some(mut reader) = reader.try_lock() {
                let _ = reader.retrieve_fresh_audio(data, frames, channels);
            }
        });
    }
    session.play()?;

    tracing::info!("Playing - press Ctrl+C to stop");

    let mut ticker = tokio::time::interval(Duration::from_millis(500));
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = ticker.tick() => {}
        }

        if let Some(err) = session.check_errors() {
            tracing::warn!("Stream error: {}", err);
        }

        let reader = reader.lock();
        if reader.is_finished() {
            tracing::info!("Reached end of file");
            break;
        }
        let unread = reader.buffer().num_unread_frames(0)?;
        println!(
            "{:>7.2} / {:.2} s  (buffered {} frames)",
            reader.current_time(),
            reader.duration(),
            unread
        );
    }

    session.pause();
    reader.lock().pause()?;

    Ok(())
}
