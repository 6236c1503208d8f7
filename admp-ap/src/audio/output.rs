//! Audio output using cpal
//!
//! Manages the audio device and the callback-based output stream. The
//! device is configured once at startup (sample rate, output channel
//! count, buffer size); file switches never reopen it.

use crate::error::{Error, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Render callback: fills an interleaved f32 buffer for the given number
/// of output channels. Runs on the real-time audio thread.
pub trait RenderFn: FnMut(&mut [f32], usize) + Send + 'static {}
impl<F: FnMut(&mut [f32], usize) + Send + 'static> RenderFn for F {}

/// Audio output manager using cpal.
///
/// Holds the device, the negotiated stream configuration, and the running
/// stream. Stream errors are flagged for the control plane to observe.
pub struct AudioOutput {
    device: Device,
    config: StreamConfig,
    sample_format: SampleFormat,
    stream: Option<Stream>,
    /// Stream error flag, set by the audio callback error handler
    error_flag: Arc<AtomicBool>,
    /// Count of consecutive stream errors
    error_count: Arc<AtomicU32>,
}

impl AudioOutput {
    /// List available audio output devices.
    pub fn list_devices() -> Result<Vec<String>> {
        let host = cpal::default_host();

        let devices: Vec<String> = host
            .output_devices()
            .map_err(|e| Error::AudioOutput(format!("Failed to enumerate devices: {}", e)))?
            .filter_map(|device| device.name().ok())
            .collect();

        debug!("Found {} output devices", devices.len());
        Ok(devices)
    }

    /// Open an audio device for multichannel output.
    ///
    /// # Arguments
    /// - `device_name`: Optional device name (None = default device)
    /// - `sample_rate`: Requested sample rate in Hz
    /// - `channels`: Requested output channel count
    /// - `buffer_size`: Optional buffer size in frames (None = device default)
    ///
    /// # Fallback Behavior
    /// If the requested device is not found, falls back to the default
    /// device. If no supported configuration matches the requested rate and
    /// channel count, falls back to the device's default configuration;
    /// the render path bounds-checks against the actual channel count, so a
    /// narrower device only drops the channels it cannot carry.
    pub fn new(
        device_name: Option<String>,
        sample_rate: u32,
        channels: u16,
        buffer_size: Option<u32>,
    ) -> Result<Self> {
        let host = cpal::default_host();

        let device = if let Some(name) = device_name.as_ref() {
            let mut devices = host
                .output_devices()
                .map_err(|e| Error::AudioOutput(format!("Failed to enumerate devices: {}", e)))?;

            match devices.find(|d| d.name().ok().as_ref() == Some(name)) {
                Some(dev) => {
                    info!("Found requested audio device: {}", name);
                    dev
                }
                None => {
                    warn!(
                        "Requested device '{}' not found, falling back to default device",
                        name
                    );
                    let default_dev = host.default_output_device().ok_or_else(|| {
                        Error::AudioOutput(format!(
                            "Device '{}' not found and no default device available",
                            name
                        ))
                    })?;
                    info!(
                        "Using default audio device as fallback: {}",
                        default_dev.name().unwrap_or_else(|_| "Unknown".to_string())
                    );
                    default_dev
                }
            }
        } else {
            let dev = host
                .default_output_device()
                .ok_or_else(|| Error::AudioOutput("No default output device found".to_string()))?;
            info!(
                "Using default audio device: {}",
                dev.name().unwrap_or_else(|_| "Unknown".to_string())
            );
            dev
        };

        let (mut config, sample_format) = Self::pick_config(&device, sample_rate, channels)?;

        if let Some(size) = buffer_size {
            config.buffer_size = cpal::BufferSize::Fixed(size);
            debug!("Using requested buffer size: {} frames", size);
        } else {
            debug!("Using device default buffer size");
        }

        debug!(
            "Audio config: sample_rate={}, channels={}, format={:?}, buffer_size={:?}",
            config.sample_rate.0, config.channels, sample_format, config.buffer_size
        );

        Ok(Self {
            device,
            config,
            sample_format,
            stream: None,
            error_flag: Arc::new(AtomicBool::new(false)),
            error_count: Arc::new(AtomicU32::new(0)),
        })
    }

    /// Pick the best supported configuration for the requested rate and
    /// channel count, preferring f32 samples.
    fn pick_config(
        device: &Device,
        sample_rate: u32,
        channels: u16,
    ) -> Result<(StreamConfig, SampleFormat)> {
        let supported_configs: Vec<_> = device
            .supported_output_configs()
            .map_err(|e| Error::AudioOutput(format!("Failed to get device configs: {}", e)))?
            .collect();

        // Exact channel count, requested rate, f32
        let preferred = supported_configs.iter().find(|config| {
            config.channels() == channels
                && config.min_sample_rate().0 <= sample_rate
                && config.max_sample_rate().0 >= sample_rate
                && config.sample_format() == SampleFormat::F32
        });

        if let Some(supported_config) = preferred {
            let sample_format = supported_config.sample_format();
            let config = supported_config
                .with_sample_rate(cpal::SampleRate(sample_rate))
                .config();
            return Ok((config, sample_format));
        }

        // Any sample format with the requested channel count and rate
        let by_channels = supported_configs.iter().find(|config| {
            config.channels() == channels
                && config.min_sample_rate().0 <= sample_rate
                && config.max_sample_rate().0 >= sample_rate
        });

        if let Some(supported_config) = by_channels {
            let sample_format = supported_config.sample_format();
            let config = supported_config
                .with_sample_rate(cpal::SampleRate(sample_rate))
                .config();
            return Ok((config, sample_format));
        }

        // Fallback: device default config
        let supported_config = device
            .default_output_config()
            .map_err(|e| Error::AudioOutput(format!("Failed to get default config: {}", e)))?;

        warn!(
            "No supported config for {} channels @ {} Hz; using device default ({} channels @ {} Hz)",
            channels,
            sample_rate,
            supported_config.channels(),
            supported_config.sample_rate().0
        );

        let sample_format = supported_config.sample_format();
        let config = supported_config.config();
        Ok((config, sample_format))
    }

    /// Start the output stream with a render callback.
    ///
    /// The callback is invoked on the real-time audio thread once per
    /// device buffer with an interleaved f32 buffer to fill completely.
    /// For i16/u16 devices the samples are rendered into an f32 scratch
    /// buffer and converted.
    pub fn start<F>(&mut self, render: F) -> Result<()>
    where
        F: RenderFn,
    {
        info!("Starting audio stream");

        let stream = match self.sample_format {
            SampleFormat::F32 => self.build_stream_f32(render)?,
            SampleFormat::I16 => self.build_stream_i16(render)?,
            SampleFormat::U16 => self.build_stream_u16(render)?,
            sample_format => {
                return Err(Error::AudioOutput(format!(
                    "Unsupported sample format: {:?}",
                    sample_format
                )));
            }
        };

        stream
            .play()
            .map_err(|e| Error::AudioOutput(format!("Failed to start stream: {}", e)))?;

        self.stream = Some(stream);

        info!("Audio stream started successfully");
        Ok(())
    }

    /// Build audio stream for f32 samples
    fn build_stream_f32<F>(&self, mut render: F) -> Result<Stream>
    where
        F: RenderFn,
    {
        let channels = self.config.channels as usize;
        let error_flag = Arc::clone(&self.error_flag);
        let error_count = Arc::clone(&self.error_count);

        let stream = self
            .device
            .build_output_stream(
                &self.config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    render(data, channels);

                    // Clamp to prevent clipping
                    for sample in data.iter_mut() {
                        *sample = sample.clamp(-1.0, 1.0);
                    }
                },
                move |err| {
                    error!("Audio stream error: {}", err);
                    error_flag.store(true, Ordering::SeqCst);
                    error_count.fetch_add(1, Ordering::SeqCst);
                },
                None,
            )
            .map_err(|e| Error::AudioOutput(format!("Failed to build stream: {}", e)))?;

        Ok(stream)
    }

    /// Build audio stream for i16 samples
    fn build_stream_i16<F>(&self, mut render: F) -> Result<Stream>
    where
        F: RenderFn,
    {
        let channels = self.config.channels as usize;
        let error_flag = Arc::clone(&self.error_flag);
        let error_count = Arc::clone(&self.error_count);
        let mut scratch: Vec<f32> = Vec::new();

        let stream = self
            .device
            .build_output_stream(
                &self.config,
                move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                    scratch.resize(data.len(), 0.0);
                    render(&mut scratch, channels);

                    for (dst, &src) in data.iter_mut().zip(scratch.iter()) {
                        *dst = (src.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
                    }
                },
                move |err| {
                    error!("Audio stream error: {}", err);
                    error_flag.store(true, Ordering::SeqCst);
                    error_count.fetch_add(1, Ordering::SeqCst);
                },
                None,
            )
            .map_err(|e| Error::AudioOutput(format!("Failed to build stream: {}", e)))?;

        Ok(stream)
    }

    /// Build audio stream for u16 samples
    fn build_stream_u16<F>(&self, mut render: F) -> Result<Stream>
    where
        F: RenderFn,
    {
        let channels = self.config.channels as usize;
        let error_flag = Arc::clone(&self.error_flag);
        let error_count = Arc::clone(&self.error_count);
        let mut scratch: Vec<f32> = Vec::new();

        let stream = self
            .device
            .build_output_stream(
                &self.config,
                move |data: &mut [u16], _: &cpal::OutputCallbackInfo| {
                    scratch.resize(data.len(), 0.0);
                    render(&mut scratch, channels);

                    for (dst, &src) in data.iter_mut().zip(scratch.iter()) {
                        // Convert from [-1.0, 1.0] to [0, 65535]
                        *dst = ((src.clamp(-1.0, 1.0) + 1.0) * 32767.5) as u16;
                    }
                },
                move |err| {
                    error!("Audio stream error: {}", err);
                    error_flag.store(true, Ordering::SeqCst);
                    error_count.fetch_add(1, Ordering::SeqCst);
                },
                None,
            )
            .map_err(|e| Error::AudioOutput(format!("Failed to build stream: {}", e)))?;

        Ok(stream)
    }

    /// Stop the output stream.
    pub fn stop(&mut self) -> Result<()> {
        info!("Stopping audio stream");

        if let Some(stream) = self.stream.take() {
            stream
                .pause()
                .map_err(|e| Error::AudioOutput(format!("Failed to pause stream: {}", e)))?;
            drop(stream);
        }

        Ok(())
    }

    /// Device name
    pub fn device_name(&self) -> String {
        self.device
            .name()
            .unwrap_or_else(|_| "Unknown".to_string())
    }

    /// Negotiated sample rate
    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }

    /// Negotiated output channel count
    pub fn channels(&self) -> u16 {
        self.config.channels
    }

    /// Buffer size in frames per callback.
    ///
    /// May differ from the requested size depending on device capabilities.
    pub fn buffer_frames(&self) -> u32 {
        match &self.config.buffer_size {
            cpal::BufferSize::Fixed(size) => *size,
            cpal::BufferSize::Default => {
                warn!("Audio device using default buffer size (unknown exact value)");
                512
            }
        }
    }

    /// Check if a stream error has occurred
    pub fn has_error(&self) -> bool {
        self.error_flag.load(Ordering::SeqCst)
    }

    /// Clear the error flag and counter
    pub fn clear_error(&self) {
        self.error_flag.store(false, Ordering::SeqCst);
        self.error_count.store(0, Ordering::SeqCst);
        info!("Audio error state cleared");
    }

    /// Consecutive stream error count
    pub fn error_count(&self) -> u32 {
        self.error_count.load(Ordering::SeqCst)
    }
}

impl Drop for AudioOutput {
    fn drop(&mut self) {
        // Ensure stream is stopped on drop
        let _ = self.stop();
    }
}
