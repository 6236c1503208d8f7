//! Per-channel metering: decaying level plus peak-hold
//!
//! The render callback feeds one observed maximum per output channel per
//! callback; decay is applied once per callback, not per sample. The decay
//! constant is therefore a function of the callback length, so the
//! configuration expresses it as a half-life in seconds and converts it to
//! a per-callback factor when the engine is built. The default half-life
//! of 0.144 s reproduces the historical per-callback factor of 0.95 at
//! 512 frames / 48 kHz, which is what the meter ballistics were tuned
//! against.
//!
//! Linear values are published through per-channel atomics; decibel
//! conversion is a presentation concern handled on read.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Default meter decay half-life in seconds (0.95/callback at 512/48k)
pub const DEFAULT_HALF_LIFE_SECS: f32 = 0.144;

/// Default peak hold length in callbacks
pub const DEFAULT_PEAK_HOLD_CALLBACKS: u32 = 24;

/// Convert a decay half-life to a per-callback decay factor.
///
/// `factor = 0.5 ^ (callback_secs / half_life)`. Degenerate inputs
/// (non-positive half-life, zero sample rate) yield 0.0, an instant decay.
pub fn decay_factor(half_life_secs: f32, callback_frames: u32, sample_rate: u32) -> f32 {
    if half_life_secs <= 0.0 || sample_rate == 0 {
        return 0.0;
    }
    let callback_secs = callback_frames as f32 / sample_rate as f32;
    0.5_f32.powf(callback_secs / half_life_secs)
}

/// One meter reading in linear amplitude
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeterReading {
    pub level: f32,
    pub peak: f32,
}

/// Lock-free published meter state, read by the control plane.
///
/// Values are f32 bit patterns in atomics; always finite and >= 0.
pub struct MeterShared {
    levels: Vec<AtomicU32>,
    peaks: Vec<AtomicU32>,
}

impl MeterShared {
    fn new(channels: usize) -> Self {
        Self {
            levels: (0..channels).map(|_| AtomicU32::new(0)).collect(),
            peaks: (0..channels).map(|_| AtomicU32::new(0)).collect(),
        }
    }

    /// Number of metered channels
    pub fn channel_count(&self) -> usize {
        self.levels.len()
    }

    /// Read all channels as linear amplitudes
    pub fn snapshot(&self) -> Vec<MeterReading> {
        self.levels
            .iter()
            .zip(self.peaks.iter())
            .map(|(level, peak)| MeterReading {
                level: f32::from_bits(level.load(Ordering::Relaxed)),
                peak: f32::from_bits(peak.load(Ordering::Relaxed)),
            })
            .collect()
    }
}

/// Render-side meter bank, owned by the render engine.
pub struct MeterBank {
    levels: Vec<f32>,
    peaks: Vec<f32>,
    hold_counters: Vec<u32>,
    decay: f32,
    peak_hold_callbacks: u32,
    shared: Arc<MeterShared>,
}

impl MeterBank {
    /// Create a meter bank for `channels` output channels.
    ///
    /// # Arguments
    /// - `decay`: per-callback decay factor (see [`decay_factor`])
    /// - `peak_hold_callbacks`: callbacks to hold a peak before decaying
    pub fn new(channels: usize, decay: f32, peak_hold_callbacks: u32) -> Self {
        Self {
            levels: vec![0.0; channels],
            peaks: vec![0.0; channels],
            hold_counters: vec![0; channels],
            decay: decay.clamp(0.0, 1.0),
            peak_hold_callbacks,
            shared: Arc::new(MeterShared::new(channels)),
        }
    }

    /// Shared read handle for the control plane
    pub fn shared(&self) -> Arc<MeterShared> {
        Arc::clone(&self.shared)
    }

    /// Number of metered channels
    pub fn channel_count(&self) -> usize {
        self.levels.len()
    }

    /// Feed one callback's observed per-channel maxima.
    ///
    /// `observed` holds the maximum absolute post-gain sample per output
    /// channel for the callback just rendered. Non-finite or negative
    /// observations are treated as 0, so levels and peaks stay finite and
    /// non-negative.
    pub fn update(&mut self, observed: &[f32]) {
        debug_assert_eq!(observed.len(), self.levels.len());

        for ch in 0..self.levels.len() {
            let mut observed_max = observed[ch];
            if !observed_max.is_finite() || observed_max < 0.0 {
                observed_max = 0.0;
            }

            // Smooth decay for the current level, floored by the new max
            self.levels[ch] = (self.levels[ch] * self.decay).max(observed_max);

            // Peak hold
            if observed_max > self.peaks[ch] {
                self.peaks[ch] = observed_max;
                self.hold_counters[ch] = self.peak_hold_callbacks;
            } else if self.hold_counters[ch] > 0 {
                self.hold_counters[ch] -= 1;
            } else {
                self.peaks[ch] *= self.decay;
            }

            self.shared.levels[ch].store(self.levels[ch].to_bits(), Ordering::Relaxed);
            self.shared.peaks[ch].store(self.peaks[ch].to_bits(), Ordering::Relaxed);
        }
    }

    /// Zero all meter state (file switch, unload)
    pub fn reset(&mut self) {
        for ch in 0..self.levels.len() {
            self.levels[ch] = 0.0;
            self.peaks[ch] = 0.0;
            self.hold_counters[ch] = 0;
            self.shared.levels[ch].store(0, Ordering::Relaxed);
            self.shared.peaks[ch].store(0, Ordering::Relaxed);
        }
    }
}
