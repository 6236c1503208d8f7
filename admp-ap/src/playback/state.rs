//! Shared playback status
//!
//! Published by the render engine via atomics every callback; read by the
//! control plane (HTTP handlers, status accessors) without locks.

use crate::audio::reader::FileInfo;
use admp_common::TransportState;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicU8, Ordering};

const STATE_IDLE: u8 = 0;
const STATE_STOPPED: u8 = 1;
const STATE_PLAYING: u8 = 2;
const STATE_PAUSED: u8 = 3;

fn encode_state(state: TransportState) -> u8 {
    match state {
        TransportState::Idle => STATE_IDLE,
        TransportState::Stopped => STATE_STOPPED,
        TransportState::Playing => STATE_PLAYING,
        TransportState::Paused => STATE_PAUSED,
    }
}

fn decode_state(value: u8) -> TransportState {
    match value {
        STATE_STOPPED => TransportState::Stopped,
        STATE_PLAYING => TransportState::Playing,
        STATE_PAUSED => TransportState::Paused,
        _ => TransportState::Idle,
    }
}

/// Lock-free transport status shared between the render engine and the
/// control plane.
pub struct SharedStatus {
    state: AtomicU8,
    position: AtomicU64,
    total_frames: AtomicU64,
    sample_rate: AtomicU32,
    file_channels: AtomicU32,
    looping: AtomicBool,
    gain_bits: AtomicU32,
}

impl SharedStatus {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(STATE_IDLE),
            position: AtomicU64::new(0),
            total_frames: AtomicU64::new(0),
            sample_rate: AtomicU32::new(0),
            file_channels: AtomicU32::new(0),
            looping: AtomicBool::new(true),
            gain_bits: AtomicU32::new(0.5_f32.to_bits()),
        }
    }

    pub fn state(&self) -> TransportState {
        decode_state(self.state.load(Ordering::Acquire))
    }

    pub fn set_state(&self, state: TransportState) {
        self.state.store(encode_state(state), Ordering::Release);
    }

    /// Playback position in frames
    pub fn position(&self) -> u64 {
        self.position.load(Ordering::Relaxed)
    }

    pub fn set_position(&self, frames: u64) {
        self.position.store(frames, Ordering::Relaxed);
    }

    /// Total frames of the loaded file (0 when idle)
    pub fn total_frames(&self) -> u64 {
        self.total_frames.load(Ordering::Relaxed)
    }

    /// Sample rate of the loaded file (0 when idle)
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate.load(Ordering::Relaxed)
    }

    /// Channel count of the loaded file (0 when idle)
    pub fn file_channels(&self) -> usize {
        self.file_channels.load(Ordering::Relaxed) as usize
    }

    pub fn set_file_info(&self, info: Option<FileInfo>) {
        match info {
            Some(info) => {
                self.total_frames.store(info.total_frames, Ordering::Relaxed);
                self.sample_rate.store(info.sample_rate, Ordering::Relaxed);
                self.file_channels
                    .store(info.channels as u32, Ordering::Relaxed);
            }
            None => {
                self.total_frames.store(0, Ordering::Relaxed);
                self.sample_rate.store(0, Ordering::Relaxed);
                self.file_channels.store(0, Ordering::Relaxed);
            }
        }
    }

    pub fn looping(&self) -> bool {
        self.looping.load(Ordering::Relaxed)
    }

    pub fn set_looping(&self, looping: bool) {
        self.looping.store(looping, Ordering::Relaxed);
    }

    pub fn gain(&self) -> f32 {
        f32::from_bits(self.gain_bits.load(Ordering::Relaxed))
    }

    pub fn set_gain(&self, gain: f32) {
        self.gain_bits.store(gain.to_bits(), Ordering::Relaxed);
    }
}

impl Default for SharedStatus {
    fn default() -> Self {
        Self::new()
    }
}
