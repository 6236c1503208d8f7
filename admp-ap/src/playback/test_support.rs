//! In-memory audio sources for unit tests

use crate::audio::reader::{AudioFileReader, FileInfo};
use crate::error::{Error, Result};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Deterministic in-memory reader: frame `f`, channel `c` holds the
/// sample `f * 100 + c`. Counts seeks and reads so tests can assert on
/// I/O behavior, and can inject a read failure at a given frame.
pub(crate) struct MemReader {
    info: FileInfo,
    position: u64,
    pub seeks: Arc<AtomicU32>,
    pub reads: Arc<AtomicU32>,
    pub fail_at: Option<u64>,
}

impl MemReader {
    pub fn new(total_frames: u64, channels: usize) -> Self {
        Self {
            info: FileInfo {
                channels,
                sample_rate: 48_000,
                total_frames,
            },
            position: 0,
            seeks: Arc::new(AtomicU32::new(0)),
            reads: Arc::new(AtomicU32::new(0)),
            fail_at: None,
        }
    }

    /// The sample value stored at `(frame, channel)`
    pub fn sample(frame: u64, channel: usize) -> f32 {
        frame as f32 * 100.0 + channel as f32
    }

    /// Static file properties without needing the trait in scope
    pub fn file_info(&self) -> FileInfo {
        self.info
    }
}

impl AudioFileReader for MemReader {
    fn info(&self) -> FileInfo {
        self.info
    }

    fn seek(&mut self, frame: u64) -> Result<()> {
        self.seeks.fetch_add(1, Ordering::Relaxed);
        self.position = frame;
        Ok(())
    }

    fn read(&mut self, dest: &mut Vec<f32>, frames: u64) -> Result<u64> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        if let Some(fail_at) = self.fail_at {
            if self.position == fail_at {
                return Err(Error::StreamRead("injected read failure".to_string()));
            }
        }
        let available = self.info.total_frames.saturating_sub(self.position);
        let take = frames.min(available);
        for f in self.position..self.position + take {
            for c in 0..self.info.channels {
                dest.push(Self::sample(f, c));
            }
        }
        self.position += take;
        Ok(take)
    }
}
