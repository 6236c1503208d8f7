//! HTTP request handlers
//!
//! REST endpoints for playback control and read-only status. Meter values
//! are converted from the engine's linear amplitudes to decibels here, on
//! read; exact silence is reported as null.

use crate::api::server::AppContext;
use crate::error::Error;
use admp_common::level::linear_to_db;
use admp_common::time::frames_to_secs;
use admp_common::TransportState;
use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    module: String,
    version: String,
    build: String,
}

#[derive(Debug, Serialize)]
pub struct StatusMessage {
    status: String,
}

#[derive(Debug, Serialize)]
pub struct PlayerStatusResponse {
    state: TransportState,
    files: Vec<String>,
    selected: Option<usize>,
    position_frames: u64,
    duration_frames: u64,
    position_secs: f64,
    duration_secs: f64,
    sample_rate: u32,
    file_channels: usize,
    output_channels: usize,
    looping: bool,
    gain: f32,
}

#[derive(Debug, Serialize)]
pub struct PositionResponse {
    state: TransportState,
    position_frames: u64,
    duration_frames: u64,
    position_secs: f64,
    duration_secs: f64,
}

#[derive(Debug, Serialize)]
pub struct MeterChannel {
    level_db: Option<f32>,
    peak_db: Option<f32>,
}

#[derive(Debug, Serialize)]
pub struct MetersResponse {
    channels: Vec<MeterChannel>,
}

#[derive(Debug, Serialize)]
pub struct FilesResponse {
    files: Vec<String>,
    selected: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct SelectFileRequest {
    index: usize,
    /// Keep playing after the switch if playback was active
    #[serde(default)]
    resume: bool,
}

#[derive(Debug, Serialize)]
pub struct SelectFileResponse {
    status: String,
    file_channels: usize,
    sample_rate: u32,
    duration_secs: f64,
}

#[derive(Debug, Deserialize)]
pub struct LoopRequest {
    enabled: bool,
}

#[derive(Debug, Deserialize)]
pub struct GainRequest {
    gain: f32,
}

type HandlerError = (StatusCode, Json<StatusMessage>);

fn into_response_error(err: Error) -> HandlerError {
    let status = match &err {
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        Error::FileOpen(_) => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error!("Request failed: {}", err);
    (
        status,
        Json(StatusMessage {
            status: format!("error: {}", err),
        }),
    )
}

fn ok() -> Json<StatusMessage> {
    Json(StatusMessage {
        status: "ok".to_string(),
    })
}

// ============================================================================
// Health
// ============================================================================

/// GET /health - Health check endpoint
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        module: "audio_player".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        build: format!("{} ({})", env!("GIT_HASH"), env!("BUILD_TIMESTAMP")),
    })
}

// ============================================================================
// Status and meters
// ============================================================================

/// GET /status - Full player status
pub async fn status(State(ctx): State<AppContext>) -> Json<PlayerStatusResponse> {
    let transport = &ctx.transport;
    let (position, duration) = transport.position();
    let sample_rate = transport.sample_rate();

    Json(PlayerStatusResponse {
        state: transport.state(),
        files: transport.files(),
        selected: transport.selected(),
        position_frames: position,
        duration_frames: duration,
        position_secs: frames_to_secs(position, sample_rate),
        duration_secs: frames_to_secs(duration, sample_rate),
        sample_rate,
        file_channels: transport.file_channels(),
        output_channels: transport.output_channels(),
        looping: transport.looping(),
        gain: transport.gain(),
    })
}

/// GET /position - Playback position only
pub async fn position(State(ctx): State<AppContext>) -> Json<PositionResponse> {
    let transport = &ctx.transport;
    let (position, duration) = transport.position();
    let sample_rate = transport.sample_rate();

    Json(PositionResponse {
        state: transport.state(),
        position_frames: position,
        duration_frames: duration,
        position_secs: frames_to_secs(position, sample_rate),
        duration_secs: frames_to_secs(duration, sample_rate),
    })
}

/// GET /meters - Per-output-channel levels in dB
pub async fn meters(State(ctx): State<AppContext>) -> Json<MetersResponse> {
    let channels = ctx
        .transport
        .meter_snapshot()
        .into_iter()
        .map(|reading| MeterChannel {
            level_db: linear_to_db(reading.level),
            peak_db: linear_to_db(reading.peak),
        })
        .collect();

    Json(MetersResponse { channels })
}

// ============================================================================
// File selection
// ============================================================================

/// GET /files - List selectable audio files
pub async fn list_files(State(ctx): State<AppContext>) -> Json<FilesResponse> {
    Json(FilesResponse {
        files: ctx.transport.files(),
        selected: ctx.transport.selected(),
    })
}

/// POST /files/rescan - Rescan the audio folder
pub async fn rescan_files(
    State(ctx): State<AppContext>,
) -> Result<Json<FilesResponse>, HandlerError> {
    let files = ctx.transport.rescan().map_err(into_response_error)?;
    info!("Rescanned audio folder: {} files", files.len());

    Ok(Json(FilesResponse {
        files,
        selected: ctx.transport.selected(),
    }))
}

/// POST /files/select - Open a file by list index
pub async fn select_file(
    State(ctx): State<AppContext>,
    Json(request): Json<SelectFileRequest>,
) -> Result<Json<SelectFileResponse>, HandlerError> {
    let info = ctx
        .transport
        .select_file(request.index, request.resume)
        .map_err(into_response_error)?;

    Ok(Json(SelectFileResponse {
        status: "ok".to_string(),
        file_channels: info.channels,
        sample_rate: info.sample_rate,
        duration_secs: info.duration_secs(),
    }))
}

// ============================================================================
// Playback control
// ============================================================================

/// POST /playback/play
pub async fn play(State(ctx): State<AppContext>) -> Result<Json<StatusMessage>, HandlerError> {
    ctx.transport.play().map_err(into_response_error)?;
    Ok(ok())
}

/// POST /playback/pause
pub async fn pause(State(ctx): State<AppContext>) -> Result<Json<StatusMessage>, HandlerError> {
    ctx.transport.pause().map_err(into_response_error)?;
    Ok(ok())
}

/// POST /playback/stop
pub async fn stop(State(ctx): State<AppContext>) -> Result<Json<StatusMessage>, HandlerError> {
    ctx.transport.stop().map_err(into_response_error)?;
    Ok(ok())
}

/// POST /playback/rewind
pub async fn rewind(State(ctx): State<AppContext>) -> Result<Json<StatusMessage>, HandlerError> {
    ctx.transport.rewind().map_err(into_response_error)?;
    Ok(ok())
}

/// PUT /playback/loop
pub async fn set_loop(
    State(ctx): State<AppContext>,
    Json(request): Json<LoopRequest>,
) -> Result<Json<StatusMessage>, HandlerError> {
    ctx.transport
        .set_loop(request.enabled)
        .map_err(into_response_error)?;
    Ok(ok())
}

/// PUT /playback/gain
pub async fn set_gain(
    State(ctx): State<AppContext>,
    Json(request): Json<GainRequest>,
) -> Result<Json<StatusMessage>, HandlerError> {
    ctx.transport
        .set_gain(request.gain)
        .map_err(into_response_error)?;
    Ok(ok())
}
