//! ADM Player (admp-ap) - Main entry point
//!
//! Wires the audio device, render engine, transport controller, and HTTP
//! control interface together and runs until interrupted.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use ringbuf::{traits::*, HeapRb};
use tokio::signal;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use admp_ap::audio::AudioOutput;
use admp_ap::config::{Config, ConfigOverrides};
use admp_ap::playback::engine::{
    Command, EngineNotice, RenderEngine, COMMAND_RING_CAPACITY, DEFAULT_FAILURE_LIMIT,
    NOTICE_CHANNEL_CAPACITY,
};
use admp_ap::playback::meter::{decay_factor, MeterBank};
use admp_ap::playback::transport::StreamSettings;
use admp_ap::playback::{SharedStatus, TransportController};
use admp_ap::routing::RemapTable;
use admp_common::events::{EventBus, PlayerEvent};

/// Command-line arguments for admp-ap
#[derive(Parser, Debug)]
#[command(name = "admp-ap")]
#[command(about = "Multichannel speaker-array audio player")]
#[command(version)]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port for the HTTP control interface
    #[arg(short, long, env = "ADMP_AP_PORT")]
    port: Option<u16>,

    /// Folder containing the multichannel audio files
    #[arg(short, long, env = "ADMP_AUDIO_FOLDER")]
    audio_folder: Option<PathBuf>,

    /// Audio output device name
    #[arg(short, long)]
    device: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load(
        args.config.as_ref(),
        ConfigOverrides {
            port: args.port,
            audio_folder: args.audio_folder,
            device: args.device,
        },
    )
    .context("Failed to load configuration")?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("admp_ap={},tower_http=info", config.log_level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting ADM Player on port {}", config.port);
    info!("Audio folder: {}", config.audio_folder.display());

    // Open the audio device; configured once for the whole session
    let mut output = AudioOutput::new(
        config.device.clone(),
        config.sample_rate,
        config.output_channels,
        Some(config.buffer_frames),
    )
    .context("Failed to open audio output device")?;

    let device_channels = output.channels() as usize;
    let device_rate = output.sample_rate();
    let buffer_frames = output.buffer_frames();

    info!(
        "Audio device: {} ({} channels @ {} Hz, {} frames/callback)",
        output.device_name(),
        device_channels,
        device_rate,
        buffer_frames
    );

    // Engine plumbing: command ring, notice channel, shared status
    let (command_tx, command_rx) = HeapRb::<Command>::new(COMMAND_RING_CAPACITY).split();
    let (notice_tx, mut notice_rx) = mpsc::channel::<EngineNotice>(NOTICE_CHANNEL_CAPACITY);
    let status = Arc::new(SharedStatus::new());
    let events = EventBus::new(256);

    // Meter ballistics are tuned per callback; convert the configured
    // half-life against the actual device callback length
    let decay = decay_factor(config.meter.half_life_secs, buffer_frames, device_rate);
    let meters = MeterBank::new(device_channels, decay, config.meter.peak_hold_callbacks);
    let meter_shared = meters.shared();

    let mut engine = RenderEngine::new(
        RemapTable::speaker_array(),
        meters,
        Arc::clone(&status),
        command_rx,
        notice_tx,
        DEFAULT_FAILURE_LIMIT,
    );

    output
        .start(move |data, channels| engine.render(data, channels))
        .context("Failed to start audio stream")?;

    let transport = Arc::new(TransportController::new(
        command_tx,
        Arc::clone(&status),
        meter_shared,
        events.clone(),
        StreamSettings {
            audio_folder: config.audio_folder.clone(),
            chunk_seconds: config.chunk_seconds,
            prefetch_margin_percent: config.prefetch_margin_percent,
            expected_channels: config.expected_channels,
        },
    ));

    // Forward engine notices to the event bus off the audio thread
    let notice_events = events.clone();
    tokio::spawn(async move {
        while let Some(notice) = notice_rx.recv().await {
            let timestamp = admp_common::time::now();
            let event = match notice {
                EngineNotice::StateChanged(state) => PlayerEvent::StateChanged { state, timestamp },
                EngineNotice::Finished => PlayerEvent::PlaybackFinished { timestamp },
                EngineNotice::StreamReadFailed { start_frame } => {
                    PlayerEvent::StreamReadFailed {
                        start_frame,
                        timestamp,
                    }
                }
                EngineNotice::Aborted {
                    consecutive_failures,
                } => PlayerEvent::PlaybackAborted {
                    consecutive_failures,
                    timestamp,
                },
            };
            notice_events.emit_lossy(event);
        }
    });

    // Populate the file list and load the first file, if any
    match transport.rescan() {
        Ok(files) if !files.is_empty() => {
            if let Err(e) = transport.select_file(0, false) {
                warn!("Could not load initial file: {}", e);
            }
        }
        Ok(_) => {
            warn!(
                "No audio files found in {}; waiting for a rescan",
                config.audio_folder.display()
            );
        }
        Err(e) => {
            warn!("Could not scan audio folder: {}", e);
        }
    }

    // HTTP control interface
    let app = admp_ap::api::create_router(admp_ap::api::AppContext {
        transport,
        events,
    });

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    output.stop().context("Failed to stop audio stream")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
