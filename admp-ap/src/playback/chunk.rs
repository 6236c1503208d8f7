//! Chunked stream cache
//!
//! Presents frame-level access over an arbitrarily large file while holding
//! a bounded window of decoded samples resident. A dedicated loader thread
//! owns the file reader; the render thread communicates with it through
//! lock-free SPSC rings and never blocks on disk.
//!
//! # Architecture
//!
//! - **Render side** (`ChunkCache`): holds the resident chunk plus one
//!   staged (prefetched) chunk. `ensure()` reports whether a frame can be
//!   served; crossing into the staged chunk is a pointer swap.
//! - **Loader thread**: pops load requests, seeks and reads one chunk per
//!   request, pushes the completed chunk back. Parks when idle.
//!
//! A cache (and its loader) belongs to exactly one opened file. Switching
//! files drops the cache, which signals the loader to shut down; an
//! in-flight load can therefore never leak into another file's playback.

use crate::audio::reader::AudioFileReader;
use crate::error::{Error, Result};
use ringbuf::{traits::*, HeapCons, HeapProd, HeapRb};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error as ThisError;
use tracing::{debug, trace, warn};

/// Capacity of the render -> loader request ring
const REQUEST_RING_CAPACITY: usize = 8;

/// Capacity of the loader -> render completed-chunk ring
const RESULT_RING_CAPACITY: usize = 4;

/// How long the loader parks between wakeup checks when idle
const LOADER_PARK_TIMEOUT: Duration = Duration::from_millis(100);

/// Deadline for the blocking `preload` used on the control thread
const PRELOAD_TIMEOUT: Duration = Duration::from_secs(10);

/// One contiguous window of decoded frames.
///
/// Replaced wholesale on refill, never partially mutated.
#[derive(Debug)]
pub struct StreamChunk {
    /// First frame held by this chunk
    pub start_frame: u64,
    /// Number of frames held
    pub frame_count: u64,
    /// Interleaved channel count
    pub channels: usize,
    /// Interleaved samples, `frame_count * channels` long
    pub samples: Vec<f32>,
}

impl StreamChunk {
    /// True if `frame` falls inside this chunk's window
    pub fn contains(&self, frame: u64) -> bool {
        frame >= self.start_frame && frame < self.start_frame + self.frame_count
    }

    /// Exclusive end frame of the window
    pub fn end_frame(&self) -> u64 {
        self.start_frame + self.frame_count
    }
}

/// Outcome of `ensure`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkStatus {
    /// The frame is in the resident chunk
    Ready,
    /// A load is in flight; serve silence and retry next callback
    Pending,
    /// The load for this frame's chunk failed; serve silence, the next
    /// `ensure` re-requests it
    Failed,
}

/// Contract violations on the cache access path
#[derive(Debug, ThisError, PartialEq, Eq)]
pub enum CacheError {
    /// `frames` was called without a preceding successful `ensure`
    #[error("frame {0} is outside the resident chunk window")]
    OutOfWindow(u64),
}

struct LoadRequest {
    start_frame: u64,
}

enum LoadResult {
    Loaded(StreamChunk),
    Failed { start_frame: u64 },
}

/// Render-side handle to the chunked stream.
///
/// All methods except `preload` are non-blocking and safe to call from the
/// audio callback.
pub struct ChunkCache {
    chunk_frames: u64,
    total_frames: u64,
    channels: usize,
    prefetch_margin: u64,
    resident: Option<StreamChunk>,
    staged: Option<StreamChunk>,
    /// Start frame of the outstanding load request, if any
    pending: Option<u64>,
    /// Start frame of the most recent failed load, reported once
    last_failure: Option<u64>,
    req_tx: HeapProd<LoadRequest>,
    result_rx: HeapCons<LoadResult>,
    loader: thread::Thread,
    shutdown: Arc<AtomicBool>,
}

impl ChunkCache {
    /// Spawn a loader thread around `reader` and return the render-side
    /// cache handle.
    ///
    /// # Arguments
    /// - `reader`: opened file reader, moved to the loader thread
    /// - `chunk_frames`: window size in frames (clamped to at least 1)
    /// - `prefetch_margin`: how close (in frames) playback may get to the
    ///   end of the resident chunk before the next chunk is requested
    pub fn spawn(
        reader: Box<dyn AudioFileReader>,
        chunk_frames: u64,
        prefetch_margin: u64,
    ) -> Result<Self> {
        let info = reader.info();
        let chunk_frames = chunk_frames.max(1);

        let (req_tx, req_rx) = HeapRb::<LoadRequest>::new(REQUEST_RING_CAPACITY).split();
        let (result_tx, result_rx) = HeapRb::<LoadResult>::new(RESULT_RING_CAPACITY).split();

        let shutdown = Arc::new(AtomicBool::new(false));
        let loader_shutdown = Arc::clone(&shutdown);

        let handle = thread::Builder::new()
            .name("chunk-loader".to_string())
            .spawn(move || {
                loader_main(reader, chunk_frames, req_rx, result_tx, loader_shutdown);
            })
            .map_err(|e| Error::Internal(format!("Failed to spawn chunk loader: {}", e)))?;

        debug!(
            "Chunk cache ready: {} frames/chunk, {} total frames, {} channels",
            chunk_frames, info.total_frames, info.channels
        );

        Ok(Self {
            chunk_frames,
            total_frames: info.total_frames,
            channels: info.channels,
            prefetch_margin,
            resident: None,
            staged: None,
            pending: None,
            last_failure: None,
            req_tx,
            result_rx,
            loader: handle.thread().clone(),
            shutdown,
        })
    }

    /// Window size in frames
    pub fn chunk_frames(&self) -> u64 {
        self.chunk_frames
    }

    /// Total frames in the underlying file
    pub fn total_frames(&self) -> u64 {
        self.total_frames
    }

    /// Interleaved channel count
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Start frame of the resident chunk, if one is loaded
    pub fn resident_start(&self) -> Option<u64> {
        self.resident.as_ref().map(|c| c.start_frame)
    }

    /// Exclusive end frame of the resident chunk, if one is loaded
    pub fn resident_end(&self) -> Option<u64> {
        self.resident.as_ref().map(|c| c.end_frame())
    }

    /// Make the chunk containing `frame` resident if possible.
    ///
    /// Non-blocking: if the chunk is not available yet, a load request is
    /// enqueued (deduplicated against the outstanding request) and
    /// `Pending` is returned. Calling this again for a frame already in
    /// the resident window is a no-op.
    pub fn ensure(&mut self, frame: u64) -> ChunkStatus {
        debug_assert!(frame < self.total_frames, "ensure past end of file");

        if self.resident.as_ref().is_some_and(|c| c.contains(frame)) {
            return ChunkStatus::Ready;
        }

        self.drain_results();

        if self.staged.as_ref().is_some_and(|c| c.contains(frame)) {
            // Crossing into the prefetched chunk: pointer swap
            self.resident = self.staged.take();
            return ChunkStatus::Ready;
        }

        if self.resident.as_ref().is_some_and(|c| c.contains(frame)) {
            return ChunkStatus::Ready;
        }

        let boundary = self.chunk_start(frame);

        if self.last_failure == Some(boundary) {
            // Report the failure once; the next ensure re-requests
            self.last_failure = None;
            return ChunkStatus::Failed;
        }

        if self.pending != Some(boundary) {
            self.request(boundary);
        }

        ChunkStatus::Pending
    }

    /// Borrow `count` contiguous frames starting at `frame` from the
    /// resident chunk.
    ///
    /// Requires a preceding `ensure(frame)` that returned `Ready`; the
    /// error is a programming-contract violation, not a user-facing
    /// condition.
    pub fn frames(&self, frame: u64, count: u64) -> std::result::Result<&[f32], CacheError> {
        let chunk = self
            .resident
            .as_ref()
            .ok_or(CacheError::OutOfWindow(frame))?;

        if !chunk.contains(frame) || frame + count > chunk.end_frame() {
            return Err(CacheError::OutOfWindow(frame));
        }

        let local = (frame - chunk.start_frame) as usize * chunk.channels;
        let len = count as usize * chunk.channels;
        Ok(&chunk.samples[local..local + len])
    }

    /// Request the next chunk ahead of the boundary crossing.
    ///
    /// Once `position` enters the trailing margin of the resident chunk,
    /// the following chunk (frame 0 when looping past the end) is loaded
    /// into the staged slot so the crossing is a pointer swap rather than
    /// a disk wait.
    pub fn maybe_prefetch(&mut self, position: u64, looping: bool) {
        let Some(resident) = &self.resident else {
            return;
        };
        if !resident.contains(position) {
            return;
        }

        let end = resident.end_frame();
        if end - position > self.prefetch_margin {
            return;
        }

        let target = if end >= self.total_frames {
            if !looping {
                return;
            }
            0
        } else {
            end
        };

        if resident.start_frame == target {
            // Single-chunk file loops within the resident window
            return;
        }
        if self.staged.as_ref().is_some_and(|c| c.start_frame == target) {
            return;
        }
        if self.pending == Some(target) {
            return;
        }

        self.request(target);
    }

    /// Block until the chunk containing `frame` is resident.
    ///
    /// Control-thread use only (initial chunk load during file open); the
    /// audio callback must use `ensure`.
    pub fn preload(&mut self, frame: u64) -> Result<()> {
        let deadline = Instant::now() + PRELOAD_TIMEOUT;

        loop {
            match self.ensure(frame) {
                ChunkStatus::Ready => return Ok(()),
                ChunkStatus::Failed => {
                    return Err(Error::StreamRead(format!(
                        "Failed to load chunk at frame {}",
                        frame
                    )));
                }
                ChunkStatus::Pending => {
                    if Instant::now() > deadline {
                        return Err(Error::StreamRead(format!(
                            "Timed out loading chunk at frame {}",
                            frame
                        )));
                    }
                    thread::sleep(Duration::from_millis(2));
                }
            }
        }
    }

    /// Chunk boundary containing `frame`
    fn chunk_start(&self, frame: u64) -> u64 {
        (frame / self.chunk_frames) * self.chunk_frames
    }

    fn request(&mut self, start_frame: u64) {
        if self.req_tx.try_push(LoadRequest { start_frame }).is_ok() {
            self.pending = Some(start_frame);
            self.loader.unpark();
        } else {
            trace!("Chunk request ring full, retrying next callback");
        }
    }

    fn drain_results(&mut self) {
        while let Some(result) = self.result_rx.try_pop() {
            match result {
                LoadResult::Loaded(chunk) => {
                    if self.pending == Some(chunk.start_frame) {
                        self.pending = None;
                    }
                    if self.resident.is_none() {
                        self.resident = Some(chunk);
                    } else {
                        self.staged = Some(chunk);
                    }
                }
                LoadResult::Failed { start_frame } => {
                    if self.pending == Some(start_frame) {
                        self.pending = None;
                    }
                    self.last_failure = Some(start_frame);
                }
            }
        }
    }
}

impl Drop for ChunkCache {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        self.loader.unpark();
    }
}

/// Loader thread body: serve load requests until shutdown.
fn loader_main(
    mut reader: Box<dyn AudioFileReader>,
    chunk_frames: u64,
    mut req_rx: HeapCons<LoadRequest>,
    mut result_tx: HeapProd<LoadResult>,
    shutdown: Arc<AtomicBool>,
) {
    let info = reader.info();

    while !shutdown.load(Ordering::Acquire) {
        let Some(request) = req_rx.try_pop() else {
            thread::park_timeout(LOADER_PARK_TIMEOUT);
            continue;
        };

        let start = request.start_frame;
        if start >= info.total_frames {
            warn!("Ignoring chunk request past end of file: frame {}", start);
            continue;
        }

        let want = chunk_frames.min(info.total_frames - start);
        let result = load_chunk(reader.as_mut(), start, want);

        // A shutdown during the read means the cache is gone; discard
        if shutdown.load(Ordering::Acquire) {
            break;
        }

        match result {
            Ok(chunk) => {
                debug!(
                    "Loaded chunk: frames {}..{} ({} frames)",
                    chunk.start_frame,
                    chunk.end_frame(),
                    chunk.frame_count
                );
                if result_tx.try_push(LoadResult::Loaded(chunk)).is_err() {
                    trace!("Chunk result ring full, dropping load");
                }
            }
            Err(e) => {
                warn!("Chunk load at frame {} failed: {}", start, e);
                let _ = result_tx.try_push(LoadResult::Failed { start_frame: start });
            }
        }
    }

    debug!("Chunk loader thread exiting");
}

fn load_chunk(reader: &mut dyn AudioFileReader, start: u64, frames: u64) -> Result<StreamChunk> {
    let info = reader.info();

    reader.seek(start)?;

    let mut samples = Vec::with_capacity(frames as usize * info.channels);
    let got = reader.read(&mut samples, frames)?;
    if got == 0 {
        return Err(Error::StreamRead(format!(
            "Read returned no frames at {}",
            start
        )));
    }
    samples.truncate(got as usize * info.channels);

    debug_assert!(start + got <= info.total_frames);

    Ok(StreamChunk {
        start_frame: start,
        frame_count: got,
        channels: info.channels,
        samples,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::test_support::MemReader;

    fn wait_ready(cache: &mut ChunkCache, frame: u64) {
        cache.preload(frame).expect("chunk load should succeed");
    }

    #[test]
    fn test_window_invariant_after_ensure() {
        let reader = MemReader::new(1000, 2);
        let mut cache = ChunkCache::spawn(Box::new(reader), 400, 100).unwrap();

        for frame in [0, 399, 400, 800, 999] {
            wait_ready(&mut cache, frame);
            let start = cache.resident_start().unwrap();
            let end = cache.resident_end().unwrap();
            assert!(start <= frame && frame < end, "frame {} in [{}, {})", frame, start, end);
            // Boundary is aligned to the chunk size
            assert_eq!(start % 400, 0);
        }
    }

    #[test]
    fn test_final_chunk_is_short() {
        let reader = MemReader::new(1000, 2);
        let mut cache = ChunkCache::spawn(Box::new(reader), 400, 100).unwrap();

        wait_ready(&mut cache, 950);
        assert_eq!(cache.resident_start(), Some(800));
        assert_eq!(cache.resident_end(), Some(1000));
    }

    #[test]
    fn test_ensure_is_idempotent() {
        let reader = MemReader::new(1000, 2);
        let reads = Arc::clone(&reader.reads);
        let mut cache = ChunkCache::spawn(Box::new(reader), 400, 100).unwrap();

        wait_ready(&mut cache, 10);
        let reads_after_load = reads.load(Ordering::Relaxed);

        // Repeated ensures inside the window issue no further reads
        for _ in 0..10 {
            assert_eq!(cache.ensure(10), ChunkStatus::Ready);
            assert_eq!(cache.ensure(399), ChunkStatus::Ready);
        }
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(reads.load(Ordering::Relaxed), reads_after_load);
    }

    #[test]
    fn test_frames_returns_chunk_contents() {
        let reader = MemReader::new(1000, 3);
        let mut cache = ChunkCache::spawn(Box::new(reader), 400, 100).unwrap();

        wait_ready(&mut cache, 0);
        let frames = cache.frames(5, 2).unwrap();
        assert_eq!(frames.len(), 6);
        assert_eq!(frames[0], MemReader::sample(5, 0));
        assert_eq!(frames[2], MemReader::sample(5, 2));
        assert_eq!(frames[3], MemReader::sample(6, 0));
    }

    #[test]
    fn test_frames_out_of_window() {
        let reader = MemReader::new(1000, 2);
        let mut cache = ChunkCache::spawn(Box::new(reader), 400, 100).unwrap();

        // Nothing resident yet
        assert_eq!(cache.frames(0, 1), Err(CacheError::OutOfWindow(0)));

        wait_ready(&mut cache, 0);
        // Outside the resident window
        assert_eq!(cache.frames(400, 1), Err(CacheError::OutOfWindow(400)));
        // Run extending past the window edge
        assert_eq!(cache.frames(399, 2), Err(CacheError::OutOfWindow(399)));
    }

    #[test]
    fn test_prefetch_stages_next_chunk() {
        let reader = MemReader::new(1000, 2);
        let mut cache = ChunkCache::spawn(Box::new(reader), 400, 100).unwrap();

        wait_ready(&mut cache, 0);

        // Inside the margin: next chunk gets requested
        cache.maybe_prefetch(350, false);
        std::thread::sleep(Duration::from_millis(50));

        // Crossing the boundary must not require a new load
        assert_eq!(cache.ensure(400), ChunkStatus::Ready);
        assert_eq!(cache.resident_start(), Some(400));
    }

    #[test]
    fn test_prefetch_wraps_when_looping() {
        let reader = MemReader::new(1000, 2);
        let mut cache = ChunkCache::spawn(Box::new(reader), 400, 100).unwrap();

        wait_ready(&mut cache, 950);
        assert_eq!(cache.resident_start(), Some(800));

        cache.maybe_prefetch(990, true);
        std::thread::sleep(Duration::from_millis(50));

        assert_eq!(cache.ensure(0), ChunkStatus::Ready);
        assert_eq!(cache.resident_start(), Some(0));
    }

    #[test]
    fn test_prefetch_not_requested_outside_margin() {
        let reader = MemReader::new(10_000, 2);
        let reads = Arc::clone(&reader.reads);
        let mut cache = ChunkCache::spawn(Box::new(reader), 4000, 100).unwrap();

        wait_ready(&mut cache, 0);
        let reads_after_load = reads.load(Ordering::Relaxed);

        // Far from the boundary: no request
        cache.maybe_prefetch(1000, false);
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(reads.load(Ordering::Relaxed), reads_after_load);
    }

    #[test]
    fn test_read_failure_reported_once_then_retried() {
        let mut reader = MemReader::new(1000, 2);
        reader.fail_at = Some(400);
        let mut cache = ChunkCache::spawn(Box::new(reader), 400, 100).unwrap();

        wait_ready(&mut cache, 0);

        // The chunk at 400 fails to load
        let err = cache.preload(400).unwrap_err();
        assert!(matches!(err, Error::StreamRead(_)));

        // After the failure was reported, ensure re-requests (and fails
        // again in this fixture, proving the retry went out)
        let err = cache.preload(400).unwrap_err();
        assert!(matches!(err, Error::StreamRead(_)));
    }

    #[test]
    fn test_chunk_contains() {
        let chunk = StreamChunk {
            start_frame: 400,
            frame_count: 400,
            channels: 2,
            samples: vec![0.0; 1600],
        };
        assert!(!chunk.contains(399));
        assert!(chunk.contains(400));
        assert!(chunk.contains(799));
        assert!(!chunk.contains(800));
        assert_eq!(chunk.end_frame(), 800);
    }
}
