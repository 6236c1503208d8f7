//! Render engine
//!
//! Owns the per-callback render path: pulls frames from the chunked stream
//! cache, applies gain, routes file channels to speaker outputs through
//! the remap table, drives the meter bank, and manages transport state.
//!
//! The engine lives inside the audio device callback closure. Transport
//! commands arrive through a lock-free SPSC ring and are applied at
//! callback entry; status is published through shared atomics; engine-
//! initiated notifications leave through a non-blocking `try_send`
//! channel. The callback itself never locks, allocates, or touches disk.
//!
//! # Per-callback contract
//!
//! The device buffer is fully written on every callback. Idle, stopped,
//! and paused states write pure silence and leave the meters untouched.
//! End-of-file and loop-wrap policy is evaluated at callback entry only:
//! a boundary crossed mid-buffer leaves the remainder of that callback
//! silent, and playback resumes (from frame 0 when looping) on the next
//! callback.

use crate::audio::reader::FileInfo;
use crate::playback::chunk::{ChunkCache, ChunkStatus};
use crate::playback::meter::MeterBank;
use crate::playback::state::SharedStatus;
use crate::routing::RemapTable;
use admp_common::TransportState;
use ringbuf::{traits::*, HeapCons};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, trace, warn};

/// Capacity of the control -> engine command ring
pub const COMMAND_RING_CAPACITY: usize = 32;

/// Capacity of the engine -> control notice channel
pub const NOTICE_CHANNEL_CAPACITY: usize = 64;

/// Consecutive failed-load callbacks before playback is aborted
pub const DEFAULT_FAILURE_LIMIT: u32 = 96;

/// Initial gain
pub const DEFAULT_GAIN: f32 = 0.5;

/// Initial loop flag
pub const DEFAULT_LOOPING: bool = true;

/// Transport commands applied at callback entry
pub enum Command {
    Play,
    Pause,
    Stop,
    Rewind,
    SetLoop(bool),
    SetGain(f32),
    /// Swap in a source assembled on the control thread
    Load(Box<LoadedSource>),
    /// Close the current source and go idle
    Unload,
}

/// A fully opened source: stream cache with chunk 0 preloaded, plus the
/// file's static properties. Built on the control thread; the render
/// engine only swaps it in.
pub struct LoadedSource {
    pub cache: ChunkCache,
    pub info: FileInfo,
    /// Start playing immediately after the swap (resume intent)
    pub start_playing: bool,
}

/// Engine-initiated notifications, forwarded to the event bus off the
/// audio thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineNotice {
    StateChanged(TransportState),
    /// End of file reached with looping disabled
    Finished,
    /// A chunk load failed; silence was emitted and the load is retried
    StreamReadFailed { start_frame: u64 },
    /// Playback stopped after repeated consecutive load failures
    Aborted { consecutive_failures: u32 },
}

/// The per-callback render engine.
pub struct RenderEngine {
    source: Option<LoadedSource>,
    state: TransportState,
    position: u64,
    looping: bool,
    gain: f32,
    remap: RemapTable,
    meters: MeterBank,
    /// Per-output-channel maxima for the current callback
    maxima: Vec<f32>,
    status: Arc<SharedStatus>,
    commands: HeapCons<Command>,
    notices: mpsc::Sender<EngineNotice>,
    failure_limit: u32,
    consecutive_failures: u32,
}

impl RenderEngine {
    pub fn new(
        remap: RemapTable,
        meters: MeterBank,
        status: Arc<SharedStatus>,
        commands: HeapCons<Command>,
        notices: mpsc::Sender<EngineNotice>,
        failure_limit: u32,
    ) -> Self {
        let maxima = vec![0.0; meters.channel_count()];
        Self {
            source: None,
            state: TransportState::Idle,
            position: 0,
            looping: DEFAULT_LOOPING,
            gain: DEFAULT_GAIN,
            remap,
            meters,
            maxima,
            status,
            commands,
            notices,
            failure_limit,
            consecutive_failures: 0,
        }
    }

    /// Render one device callback.
    ///
    /// `out` is the interleaved output buffer for `out_channels` channels;
    /// it is always fully written.
    pub fn render(&mut self, out: &mut [f32], out_channels: usize) {
        self.apply_commands();

        // Zero-initialize: unmapped outputs and any unrendered remainder
        // stay silent, and the buffer is fully written in every state
        out.fill(0.0);

        let Some((total, file_channels)) = self
            .source
            .as_ref()
            .map(|s| (s.info.total_frames, s.info.channels))
        else {
            self.publish();
            return;
        };

        if self.state != TransportState::Playing {
            self.publish();
            return;
        }

        // Loop/stop policy is evaluated at callback entry only
        if self.position >= total {
            if self.looping {
                self.position = 0;
            } else {
                self.position = 0;
                self.notify(EngineNotice::Finished);
                self.set_state(TransportState::Stopped);
                self.publish();
                return;
            }
        }

        let n = out.len() / out_channels;
        let mut rendered: usize = 0;
        let mut load_failed = false;
        self.maxima.fill(0.0);

        if let Some(source) = self.source.as_mut() {
            let remap = &self.remap;
            let maxima = &mut self.maxima;
            let gain = self.gain;
            let position = self.position;

            while rendered < n {
                let frame = position + rendered as u64;
                if frame >= total {
                    break;
                }

                match source.cache.ensure(frame) {
                    ChunkStatus::Ready => {
                        let Some(chunk_end) = source.cache.resident_end() else {
                            break;
                        };
                        let run = ((n - rendered) as u64)
                            .min(chunk_end - frame)
                            .min(total - frame);

                        let src = match source.cache.frames(frame, run) {
                            Ok(src) => src,
                            Err(e) => {
                                error!("Chunk cache contract violation: {}", e);
                                break;
                            }
                        };

                        for i in 0..run as usize {
                            let src_frame = &src[i * file_channels..(i + 1) * file_channels];
                            let base = (rendered + i) * out_channels;

                            for (ch, &sample) in src_frame.iter().enumerate() {
                                // Unmapped file channels pass through to the
                                // same-numbered output; destinations past the
                                // device's channel count are dropped
                                let dest = remap.route(ch).unwrap_or(ch);
                                if dest < out_channels {
                                    let sample = sample * gain;
                                    out[base + dest] = sample;

                                    if dest < maxima.len() {
                                        let magnitude = sample.abs();
                                        if magnitude > maxima[dest] {
                                            maxima[dest] = magnitude;
                                        }
                                    }
                                }
                            }
                        }

                        rendered += run as usize;
                    }
                    ChunkStatus::Pending => break,
                    ChunkStatus::Failed => {
                        load_failed = true;
                        break;
                    }
                }
            }
        }

        self.position += rendered as u64;

        if load_failed {
            self.consecutive_failures += 1;
            if self.consecutive_failures == 1 {
                warn!(
                    "Stream read failed at frame {}; emitting silence and retrying",
                    self.position
                );
                self.notify(EngineNotice::StreamReadFailed {
                    start_frame: self.position,
                });
            }
            if self.consecutive_failures >= self.failure_limit {
                error!(
                    "Stopping playback after {} consecutive failed chunk loads",
                    self.consecutive_failures
                );
                self.notify(EngineNotice::Aborted {
                    consecutive_failures: self.consecutive_failures,
                });
                self.consecutive_failures = 0;
                self.position = 0;
                self.set_state(TransportState::Stopped);
            }
        } else if rendered > 0 {
            self.consecutive_failures = 0;
        }

        // Metering runs whenever playing; silence decays the meters
        self.meters.update(&self.maxima);

        if self.state == TransportState::Playing {
            if let Some(source) = self.source.as_mut() {
                source.cache.maybe_prefetch(self.position, self.looping);
            }
        }

        self.publish();
    }

    fn apply_commands(&mut self) {
        while let Some(command) = self.commands.try_pop() {
            match command {
                Command::Play => {
                    if self.source.is_some() && self.state != TransportState::Playing {
                        self.set_state(TransportState::Playing);
                    }
                }
                Command::Pause => {
                    if self.state == TransportState::Playing {
                        self.set_state(TransportState::Paused);
                    }
                }
                Command::Stop => {
                    if self.source.is_some() {
                        self.position = 0;
                        self.set_state(TransportState::Stopped);
                    }
                }
                Command::Rewind => {
                    self.position = 0;
                }
                Command::SetLoop(looping) => {
                    self.looping = looping;
                }
                Command::SetGain(gain) => {
                    self.gain = gain;
                }
                Command::Load(source) => {
                    let start_playing = source.start_playing;
                    self.source = Some(*source);
                    self.position = 0;
                    self.consecutive_failures = 0;
                    self.meters.reset();
                    self.set_state(if start_playing {
                        TransportState::Playing
                    } else {
                        TransportState::Stopped
                    });
                }
                Command::Unload => {
                    // Dropping the source shuts its chunk loader down,
                    // cancelling any in-flight prefetch
                    self.source = None;
                    self.position = 0;
                    self.consecutive_failures = 0;
                    self.meters.reset();
                    self.set_state(TransportState::Idle);
                }
            }
        }
    }

    fn set_state(&mut self, state: TransportState) {
        if self.state != state {
            self.state = state;
            self.notify(EngineNotice::StateChanged(state));
        }
    }

    fn notify(&self, notice: EngineNotice) {
        if self.notices.try_send(notice).is_err() {
            trace!("Notice channel full, dropping {:?}", notice);
        }
    }

    fn publish(&self) {
        self.status.set_state(self.state);
        self.status.set_position(self.position);
        self.status.set_file_info(self.source.as_ref().map(|s| s.info));
        self.status.set_looping(self.looping);
        self.status.set_gain(self.gain);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::meter::{decay_factor, DEFAULT_HALF_LIFE_SECS};
    use crate::playback::test_support::MemReader;
    use ringbuf::{HeapProd, HeapRb};
    use std::time::Duration;

    const OUT_CHANNELS: usize = 8;

    struct Harness {
        engine: RenderEngine,
        commands: HeapProd<Command>,
        notices: mpsc::Receiver<EngineNotice>,
        status: Arc<SharedStatus>,
    }

    fn harness(out_channels: usize) -> Harness {
        let (commands, command_rx) = HeapRb::<Command>::new(COMMAND_RING_CAPACITY).split();
        let (notice_tx, notices) = mpsc::channel(NOTICE_CHANNEL_CAPACITY);
        let status = Arc::new(SharedStatus::new());
        let decay = decay_factor(DEFAULT_HALF_LIFE_SECS, 512, 48_000);
        let meters = MeterBank::new(out_channels, decay, 24);

        let engine = RenderEngine::new(
            RemapTable::speaker_array(),
            meters,
            Arc::clone(&status),
            command_rx,
            notice_tx,
            DEFAULT_FAILURE_LIMIT,
        );

        Harness {
            engine,
            commands,
            notices,
            status,
        }
    }

    /// Identity-mapped table for small-channel tests, so file channel c
    /// lands on output c
    fn identity_harness(out_channels: usize) -> Harness {
        let mut h = harness(out_channels);
        h.engine.remap = RemapTable::from_pairs(&[]);
        h
    }

    fn load_source(
        h: &mut Harness,
        total_frames: u64,
        channels: usize,
        chunk_frames: u64,
        margin: u64,
        start_playing: bool,
    ) {
        let reader = MemReader::new(total_frames, channels);
        let info = reader.file_info();
        let mut cache = ChunkCache::spawn(Box::new(reader), chunk_frames, margin).unwrap();
        cache.preload(0).unwrap();
        assert!(h
            .commands
            .try_push(Command::Load(Box::new(LoadedSource {
                cache,
                info,
                start_playing,
            })))
            .is_ok());
    }

    fn push(h: &mut Harness, command: Command) {
        assert!(h.commands.try_push(command).is_ok());
    }

    fn callback(h: &mut Harness, frames: usize, out_channels: usize) -> Vec<f32> {
        let mut out = vec![f32::NAN; frames * out_channels];
        h.engine.render(&mut out, out_channels);
        out
    }

    #[test]
    fn test_idle_engine_writes_full_silence() {
        let mut h = harness(OUT_CHANNELS);
        let out = callback(&mut h, 128, OUT_CHANNELS);

        assert_eq!(out.len(), 128 * OUT_CHANNELS);
        assert!(out.iter().all(|&s| s == 0.0));
        assert_eq!(h.status.state(), TransportState::Idle);
    }

    #[test]
    fn test_stopped_and_paused_write_silence() {
        let mut h = identity_harness(4);
        load_source(&mut h, 1000, 4, 2000, 100, false);

        // Loaded but stopped
        let out = callback(&mut h, 64, 4);
        assert!(out.iter().all(|&s| s == 0.0));
        assert_eq!(h.status.state(), TransportState::Stopped);

        // Playing, then paused mid-file
        push(&mut h, Command::Play);
        callback(&mut h, 64, 4);
        push(&mut h, Command::Pause);
        let out = callback(&mut h, 64, 4);
        assert!(out.iter().all(|&s| s == 0.0));
        assert_eq!(h.status.state(), TransportState::Paused);

        // Position held across pause
        assert_eq!(h.status.position(), 64);
    }

    #[test]
    fn test_playing_renders_source_with_gain() {
        let mut h = identity_harness(4);
        load_source(&mut h, 1000, 4, 2000, 100, false);
        push(&mut h, Command::Play);
        push(&mut h, Command::SetGain(1.0));

        let out = callback(&mut h, 16, 4);
        for frame in 0..16u64 {
            for ch in 0..4 {
                let expected = MemReader::sample(frame, ch);
                assert_eq!(out[frame as usize * 4 + ch], expected);
            }
        }
        assert_eq!(h.status.position(), 16);
    }

    #[test]
    fn test_gain_boundaries() {
        let mut h = identity_harness(4);
        load_source(&mut h, 1000, 4, 2000, 100, false);
        push(&mut h, Command::Play);
        push(&mut h, Command::SetGain(0.0));

        let out = callback(&mut h, 32, 4);
        assert!(out.iter().all(|&s| s == 0.0));

        // Half gain scales the source amplitude
        push(&mut h, Command::Rewind);
        push(&mut h, Command::SetGain(0.5));
        let out = callback(&mut h, 4, 4);
        assert_eq!(out[4 + 1], MemReader::sample(1, 1) * 0.5);
    }

    #[test]
    fn test_remap_routes_and_skips() {
        // 56-channel file through the speaker-array table into 60 outputs
        let mut h = harness(60);
        load_source(&mut h, 1000, 56, 2000, 100, false);
        push(&mut h, Command::Play);
        push(&mut h, Command::SetGain(1.0));

        let out = callback(&mut h, 8, 60);

        for frame in 0..8u64 {
            let base = frame as usize * 60;
            // Upper ring: identity
            assert_eq!(out[base], MemReader::sample(frame, 0));
            // Middle ring: file channel 12 -> output 16
            assert_eq!(out[base + 16], MemReader::sample(frame, 12));
            // Lower ring: file channel 53 -> output 59
            assert_eq!(out[base + 59], MemReader::sample(frame, 53));
            // Sub: file channel 55 -> output 47
            assert_eq!(out[base + 47], MemReader::sample(frame, 55));
            // Skipped outputs stay silent
            for skipped in [12, 13, 14, 15, 46] {
                assert_eq!(out[base + skipped], 0.0, "output {} must be silent", skipped);
            }
        }
    }

    #[test]
    fn test_unmapped_channels_pass_through() {
        // Table maps only file channel 0; channel 1 has no entry and must
        // pass through to output 1 rather than being dropped
        let mut h = harness(4);
        h.engine.remap = RemapTable::from_pairs(&[(0, 2)]);
        load_source(&mut h, 100, 2, 500, 50, false);
        push(&mut h, Command::Play);
        push(&mut h, Command::SetGain(1.0));

        let out = callback(&mut h, 4, 4);
        for frame in 0..4u64 {
            let base = frame as usize * 4;
            // Mapped: file 0 -> output 2
            assert_eq!(out[base + 2], MemReader::sample(frame, 0));
            // Unmapped file channel 1 passes through to output 1
            assert_eq!(out[base + 1], MemReader::sample(frame, 1));
            assert_eq!(out[base], 0.0);
        }
    }

    #[test]
    fn test_out_of_range_destination_dropped() {
        // Table routes file channel 1 to output 7, but only 2 device
        // channels exist; the sample is dropped, not wrapped or fatal
        let mut h = harness(2);
        h.engine.remap = RemapTable::from_pairs(&[(0, 0), (1, 7)]);
        load_source(&mut h, 100, 2, 500, 50, false);
        push(&mut h, Command::Play);
        push(&mut h, Command::SetGain(1.0));

        let out = callback(&mut h, 4, 2);
        for frame in 0..4u64 {
            let base = frame as usize * 2;
            assert_eq!(out[base], MemReader::sample(frame, 0));
            assert_eq!(out[base + 1], 0.0);
        }
    }

    #[test]
    fn test_end_of_file_without_loop() {
        let mut h = identity_harness(2);
        load_source(&mut h, 100, 2, 500, 50, false);
        push(&mut h, Command::SetLoop(false));
        push(&mut h, Command::Play);
        push(&mut h, Command::SetGain(1.0));

        // 64 + 36 = 100 frames; second callback is a short remainder
        callback(&mut h, 64, 2);
        let out = callback(&mut h, 64, 2);

        // First 36 frames have content, the rest is silence fill
        assert_eq!(out[35 * 2], MemReader::sample(99, 0));
        assert!(out[36 * 2..].iter().all(|&s| s == 0.0));
        assert_eq!(h.status.state(), TransportState::Playing);
        assert_eq!(h.status.position(), 100);

        // Next callback: stop policy at entry, one full silent callback
        let out = callback(&mut h, 64, 2);
        assert!(out.iter().all(|&s| s == 0.0));
        assert_eq!(h.status.state(), TransportState::Stopped);
        assert_eq!(h.status.position(), 0);

        // Finished notice surfaced
        let mut saw_finished = false;
        while let Ok(notice) = h.notices.try_recv() {
            if notice == EngineNotice::Finished {
                saw_finished = true;
            }
        }
        assert!(saw_finished);
    }

    #[test]
    fn test_loop_boundary_not_stitched_mid_callback() {
        // totalFrames=1000, chunkSize=400, callback N=300, looping
        let mut h = identity_harness(2);
        load_source(&mut h, 1000, 2, 400, 200, false);
        push(&mut h, Command::SetLoop(true));
        push(&mut h, Command::Play);
        push(&mut h, Command::SetGain(1.0));

        let first = callback(&mut h, 300, 2);
        std::thread::sleep(Duration::from_millis(50));
        callback(&mut h, 300, 2); // [300, 600)
        std::thread::sleep(Duration::from_millis(50));
        callback(&mut h, 300, 2); // [600, 900)
        std::thread::sleep(Duration::from_millis(50));

        // [900, 1000) + 200 frames of silence; no splice from frame 0
        let partial = callback(&mut h, 300, 2);
        assert_eq!(partial[99 * 2], MemReader::sample(999, 0));
        assert!(partial[100 * 2..].iter().all(|&s| s == 0.0));
        assert_eq!(h.status.position(), 1000);
        std::thread::sleep(Duration::from_millis(50));

        // Wrap happens at the next callback entry; content matches the
        // very first callback of the session
        let wrapped = callback(&mut h, 300, 2);
        assert_eq!(wrapped, first);
        assert_eq!(h.status.state(), TransportState::Playing);
        assert_eq!(h.status.position(), 300);
    }

    #[test]
    fn test_chunk_crossing_mid_callback() {
        // Chunk of 400 frames, callback of 300: the second callback spans
        // the 400-frame boundary and must render continuously
        let mut h = identity_harness(2);
        load_source(&mut h, 1000, 2, 400, 200, false);
        push(&mut h, Command::Play);
        push(&mut h, Command::SetGain(1.0));

        callback(&mut h, 300, 2);
        std::thread::sleep(Duration::from_millis(50));

        let out = callback(&mut h, 300, 2);
        // Frame 399 then 400 with no gap
        assert_eq!(out[99 * 2], MemReader::sample(399, 0));
        assert_eq!(out[100 * 2], MemReader::sample(400, 0));
        assert_eq!(h.status.position(), 600);
    }

    #[test]
    fn test_transport_commands() {
        let mut h = identity_harness(2);
        load_source(&mut h, 1000, 2, 2000, 100, false);

        push(&mut h, Command::Play);
        callback(&mut h, 64, 2);
        assert_eq!(h.status.state(), TransportState::Playing);

        // Rewind while playing stays playing, position resets
        push(&mut h, Command::Rewind);
        callback(&mut h, 64, 2);
        assert_eq!(h.status.state(), TransportState::Playing);
        assert_eq!(h.status.position(), 64);

        // Stop resets position and halts
        push(&mut h, Command::Stop);
        callback(&mut h, 64, 2);
        assert_eq!(h.status.state(), TransportState::Stopped);
        assert_eq!(h.status.position(), 0);

        // Unload goes idle
        push(&mut h, Command::Unload);
        callback(&mut h, 64, 2);
        assert_eq!(h.status.state(), TransportState::Idle);
    }

    #[test]
    fn test_play_without_source_ignored() {
        let mut h = harness(2);
        push(&mut h, Command::Play);
        callback(&mut h, 64, 2);
        assert_eq!(h.status.state(), TransportState::Idle);
    }

    #[test]
    fn test_meters_track_output_channels() {
        let mut h = identity_harness(4);
        load_source(&mut h, 1000, 4, 2000, 100, false);
        push(&mut h, Command::Play);
        push(&mut h, Command::SetGain(1.0));

        let shared = h.engine.meters.shared();
        callback(&mut h, 16, 4);

        let snapshot = shared.snapshot();
        // Channel 3 saw frame 15's sample as its max: 15*100 + 3 = 1503
        assert_eq!(snapshot[3].level, MemReader::sample(15, 3));
        // Peak equals level after one callback
        assert_eq!(snapshot[3].peak, snapshot[3].level);
    }

    #[test]
    fn test_meters_not_updated_when_paused() {
        let mut h = identity_harness(2);
        load_source(&mut h, 1000, 2, 2000, 100, false);
        push(&mut h, Command::Play);
        push(&mut h, Command::SetGain(1.0));
        callback(&mut h, 16, 2);

        let shared = h.engine.meters.shared();
        let before = shared.snapshot();
        assert!(before[0].level > 0.0);

        push(&mut h, Command::Pause);
        callback(&mut h, 16, 2);
        callback(&mut h, 16, 2);

        // No decay while paused: levels frozen
        let after = shared.snapshot();
        assert_eq!(after[0].level, before[0].level);
    }

    #[test]
    fn test_stream_read_failure_emits_silence_and_notice() {
        let mut h = identity_harness(2);
        h.engine.failure_limit = 3;

        let mut reader = MemReader::new(1000, 2);
        reader.fail_at = Some(400);
        let info = reader.file_info();
        let mut cache = ChunkCache::spawn(Box::new(reader), 400, 0).unwrap();
        cache.preload(0).unwrap();
        push(
            &mut h,
            Command::Load(Box::new(LoadedSource {
                cache,
                info,
                start_playing: true,
            })),
        );
        push(&mut h, Command::SetGain(1.0));

        // Play out the first chunk (prefetch margin 0: no lookahead)
        callback(&mut h, 400, 2);
        std::thread::sleep(Duration::from_millis(50));

        // The next chunk fails to load; silence, position held until the
        // failure limit aborts playback
        let mut aborted = false;
        for _ in 0..20 {
            let out = callback(&mut h, 64, 2);
            assert!(out.iter().all(|&s| s == 0.0));
            if h.status.state() == TransportState::Stopped {
                aborted = true;
                break;
            }
            assert_eq!(h.status.position(), 400);
            std::thread::sleep(Duration::from_millis(20));
        }
        assert!(aborted, "engine should abort after repeated failures");

        let mut saw_failure = false;
        let mut saw_abort = false;
        while let Ok(notice) = h.notices.try_recv() {
            match notice {
                EngineNotice::StreamReadFailed { start_frame } => {
                    assert_eq!(start_frame, 400);
                    saw_failure = true;
                }
                EngineNotice::Aborted { .. } => saw_abort = true,
                _ => {}
            }
        }
        assert!(saw_failure);
        assert!(saw_abort);
    }

    #[test]
    fn test_load_resets_position_and_meters() {
        let mut h = identity_harness(2);
        load_source(&mut h, 1000, 2, 2000, 100, true);
        push(&mut h, Command::SetGain(1.0));
        callback(&mut h, 64, 2);
        assert_eq!(h.status.position(), 64);

        let shared = h.engine.meters.shared();
        assert!(shared.snapshot()[0].level > 0.0);

        // Loading a new source resets position and meters; stopped by
        // default when no resume was requested
        load_source(&mut h, 500, 2, 2000, 100, false);
        callback(&mut h, 64, 2);
        assert_eq!(h.status.position(), 0);
        assert_eq!(h.status.state(), TransportState::Stopped);
        assert_eq!(shared.snapshot()[0].level, 0.0);
        assert_eq!(h.status.total_frames(), 500);
    }
}
