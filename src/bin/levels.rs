//! Input Level Meter
//!
//! Captures the default input into a ring buffer and reports per-channel
//! mean/min/max twice a second. Optionally records the input to a WAV file:
//!
//! ```text
//! levels [output.wav]
//! ```

use anyhow::{bail, Result};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use audio_ring::{
    audio::{device::describe_default_devices, AudioSession, MAX_CHANNELS},
    create_shared_buffer,
    file::AudioFileWriter,
    AppConfig, SessionConfig,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting input level meter");

    let config = AppConfig::load_or_default();

    println!("\n=== Default Audio Devices ===");
    for device in describe_default_devices() {
        let direction = if device.is_input { "Input" } else { "Output" };
        println!("  {} ({}):", device.name, direction);
        println!("    Sample rate: {} Hz", device.sample_rate);
        println!("    Channels: {}", device.channels);
        println!("    Format: {}", device.sample_format);
    }
    println!();

    let session_config = SessionConfig {
        output_enabled: false,
        ..config.session.clone()
    };
    let mut session = AudioSession::init(session_config)?;
    if !session.input_available() {
        bail!("No input device found");
    }

    let channels = session.num_input_channels().min(MAX_CHANNELS);
    let ring = create_shared_buffer(config.ring.capacity, channels.max(config.ring.channel_count))?;
    session.attach_input_buffer(ring.clone())?;

    // Peak since the last report, as f32 bits
    let peak = Arc::new(AtomicU32::new(0.0f32.to_bits()));

    let writer = match std::env::args().nth(1) {
        Some(path) => {
            let mut writer = AudioFileWriter::create(
                &path,
                session.sample_rate(),
                channels,
                config.ring.capacity,
            )?;
            writer.record()?;
            tracing::info!("Recording to {}", path);
            Some(Arc::new(writer))
        }
        None => None,
    };

    {
        let peak = peak.clone();
        let writer = writer.clone();

        session.set_input_callback(move |data, frames, block_channels| {
            let block_peak = data.iter().fold(0.0f32, |acc, s| acc.max(s.abs()));
            let current = f32::from_bits(peak.load(Ordering::Relaxed));
            if block_peak > current {
                peak.store(block_peak.to_bits(), Ordering::Relaxed);
            }

            if let Some(writer) = &writer {
                let _ = writer.write_new_audio(data, frames, block_channels);
            }
        });
    }

    session.play()?;
    tracing::info!("Metering {} channel(s) - press Ctrl+C to stop", channels);

    let mut ticker = tokio::time::interval(Duration::from_millis(500));
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = ticker.tick() => {}
        }

        if let Some(err) = session.check_errors() {
            tracing::warn!("Stream error: {}", err);
        }

        let block_peak = f32::from_bits(peak.swap(0.0f32.to_bits(), Ordering::Relaxed));
        let mut line = format!("peak {:>6.3} |", block_peak);
        for channel in 0..channels {
            let stats = ring.stats(channel)?;
            line.push_str(&format!(
                " ch{} mean {:+.4} min {:+.3} max {:+.3} |",
                channel, stats.mean, stats.min, stats.max
            ));
        }
        println!("{}", line);
    }

    session.pause();
    tracing::info!(
        "Captured {} frames ({} lost to overrun)",
        session.frames_captured(),
        session.frames_dropped()
    );
    drop(session);

    if let Some(writer) = writer.and_then(|w| Arc::try_unwrap(w).ok()) {
        let frames = writer.finalize()?;
        tracing::info!("Wrote {} frames", frames);
    }

    Ok(())
}
