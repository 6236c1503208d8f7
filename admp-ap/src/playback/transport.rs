//! Transport controller
//!
//! Control-plane side of the render engine: issues commands through the
//! lock-free command ring, performs file opens on the control thread, and
//! exposes read-only accessors over the engine's published status.
//!
//! The controller is shared by all HTTP handlers; its mutable state (the
//! command producer and the file list) sits behind a std::sync::Mutex.
//! The render thread never takes this lock; only the control plane does.

use crate::audio::reader::{open_file, AudioFileReader, FileInfo};
use crate::error::{Error, Result};
use crate::playback::chunk::ChunkCache;
use crate::playback::engine::{Command, LoadedSource};
use crate::playback::library;
use crate::playback::meter::{MeterReading, MeterShared};
use crate::playback::state::SharedStatus;
use admp_common::events::{EventBus, PlayerEvent};
use admp_common::TransportState;
use ringbuf::{traits::*, HeapProd};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

/// Streaming parameters applied at each file open
#[derive(Debug, Clone)]
pub struct StreamSettings {
    /// Folder holding the selectable audio files
    pub audio_folder: PathBuf,
    /// Chunk window length in seconds of audio
    pub chunk_seconds: u32,
    /// Portion of a chunk, in percent, treated as the prefetch margin
    pub prefetch_margin_percent: u32,
    /// Channel count the speaker-array material is expected to have
    pub expected_channels: usize,
}

struct TransportInner {
    commands: HeapProd<Command>,
    files: Vec<String>,
    selected: Option<usize>,
}

/// Command interface over the render engine.
pub struct TransportController {
    inner: Mutex<TransportInner>,
    status: Arc<SharedStatus>,
    meters: Arc<MeterShared>,
    events: EventBus,
    settings: StreamSettings,
}

impl TransportController {
    pub fn new(
        commands: HeapProd<Command>,
        status: Arc<SharedStatus>,
        meters: Arc<MeterShared>,
        events: EventBus,
        settings: StreamSettings,
    ) -> Self {
        Self {
            inner: Mutex::new(TransportInner {
                commands,
                files: Vec::new(),
                selected: None,
            }),
            status,
            meters,
            events,
            settings,
        }
    }

    /// Start or resume playback
    pub fn play(&self) -> Result<()> {
        self.push(Command::Play)
    }

    /// Pause, holding the current position
    pub fn pause(&self) -> Result<()> {
        self.push(Command::Pause)
    }

    /// Halt playback and reset the position to 0
    pub fn stop(&self) -> Result<()> {
        self.push(Command::Stop)
    }

    /// Reset the position to 0 without changing the transport state
    pub fn rewind(&self) -> Result<()> {
        self.push(Command::Rewind)
    }

    /// Enable or disable looping
    pub fn set_loop(&self, looping: bool) -> Result<()> {
        self.push(Command::SetLoop(looping))?;
        info!("Loop: {}", if looping { "ON" } else { "OFF" });
        self.events.emit_lossy(PlayerEvent::LoopChanged {
            looping,
            timestamp: admp_common::time::now(),
        });
        Ok(())
    }

    /// Set the playback gain, clamped to [0, 1]
    pub fn set_gain(&self, gain: f32) -> Result<()> {
        let gain = if gain.is_finite() { gain } else { 0.0 };
        let gain = gain.clamp(0.0, 1.0);
        self.push(Command::SetGain(gain))?;
        self.events.emit_lossy(PlayerEvent::GainChanged {
            gain,
            timestamp: admp_common::time::now(),
        });
        Ok(())
    }

    /// Rescan the audio folder, replacing the file list.
    ///
    /// The selected index is kept if the same file name is still present.
    pub fn rescan(&self) -> Result<Vec<String>> {
        let files = library::scan_audio_files(&self.settings.audio_folder)?;

        let mut inner = self.lock();
        let previous = inner.selected.and_then(|i| inner.files.get(i).cloned());
        inner.selected = previous.and_then(|name| files.iter().position(|f| *f == name));
        inner.files = files.clone();

        Ok(files)
    }

    /// Currently selectable file names
    pub fn files(&self) -> Vec<String> {
        self.lock().files.clone()
    }

    /// Index of the currently loaded file, if any
    pub fn selected(&self) -> Option<usize> {
        self.lock().selected
    }

    /// Open the file at `index` and hand it to the render engine.
    ///
    /// The current file is closed first, so a failed open leaves the
    /// engine idle. Playback resumes after the switch only when `resume`
    /// is set and the engine was playing before the call.
    pub fn select_file(&self, index: usize, resume: bool) -> Result<FileInfo> {
        let mut inner = self.lock();

        let name = inner
            .files
            .get(index)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("No audio file at index {}", index)))?;

        let was_playing = self.status.state() == TransportState::Playing;

        // Close the current source before opening the new one; the engine
        // is idle from here until the Load lands
        Self::push_locked(&mut inner, Command::Unload)?;

        let path = self.settings.audio_folder.join(&name);
        info!("Loading audio file: {}", path.display());

        let source = match self.open_source(&path, resume && was_playing) {
            Ok(source) => source,
            Err(e) => {
                warn!("Could not open {}: {}", path.display(), e);
                self.events.emit_lossy(PlayerEvent::FileLoadFailed {
                    file_name: name,
                    reason: e.to_string(),
                    timestamp: admp_common::time::now(),
                });
                return Err(e);
            }
        };

        let info = source.info;
        let mismatch = info.channels != self.settings.expected_channels;
        if mismatch {
            warn!(
                "Expected {} channels but file has {}; playing with the file's channel count",
                self.settings.expected_channels, info.channels
            );
        }

        info!(
            "Loaded {}: {} Hz, {} channels, {} frames ({:.2} s)",
            name,
            info.sample_rate,
            info.channels,
            info.total_frames,
            info.duration_secs()
        );

        Self::push_locked(&mut inner, Command::Load(Box::new(source)))?;
        inner.selected = Some(index);

        self.events.emit_lossy(PlayerEvent::FileLoaded {
            file_name: name,
            channels: info.channels,
            sample_rate: info.sample_rate,
            total_frames: info.total_frames,
            channel_count_mismatch: mismatch,
            timestamp: admp_common::time::now(),
        });

        Ok(info)
    }

    /// Current transport state
    pub fn state(&self) -> TransportState {
        self.status.state()
    }

    /// Playback position and total length in frames
    pub fn position(&self) -> (u64, u64) {
        (self.status.position(), self.status.total_frames())
    }

    /// Sample rate of the loaded file (0 when idle)
    pub fn sample_rate(&self) -> u32 {
        self.status.sample_rate()
    }

    /// Channel count of the loaded file (0 when idle)
    pub fn file_channels(&self) -> usize {
        self.status.file_channels()
    }

    pub fn looping(&self) -> bool {
        self.status.looping()
    }

    pub fn gain(&self) -> f32 {
        self.status.gain()
    }

    /// Linear meter snapshot, one reading per output channel
    pub fn meter_snapshot(&self) -> Vec<MeterReading> {
        self.meters.snapshot()
    }

    /// Number of metered output channels
    pub fn output_channels(&self) -> usize {
        self.meters.channel_count()
    }

    fn open_source(&self, path: &std::path::Path, start_playing: bool) -> Result<LoadedSource> {
        let reader = open_file(path)?;
        let info = reader.info();

        let chunk_frames = self.settings.chunk_seconds as u64 * info.sample_rate as u64;
        let margin = chunk_frames * self.settings.prefetch_margin_percent as u64 / 100;

        let mut cache = ChunkCache::spawn(reader, chunk_frames, margin)?;
        cache.preload(0)?;

        Ok(LoadedSource {
            cache,
            info,
            start_playing,
        })
    }

    fn push(&self, command: Command) -> Result<()> {
        let mut inner = self.lock();
        Self::push_locked(&mut inner, command)
    }

    fn push_locked(inner: &mut TransportInner, command: Command) -> Result<()> {
        inner
            .commands
            .try_push(command)
            .map_err(|_| Error::Playback("Engine command queue is full".to_string()))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, TransportInner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
