//! Audio file reading
//!
//! The render path never touches the decoders directly; it goes through
//! the chunked stream cache, whose loader thread drives an
//! [`AudioFileReader`]. The trait keeps the cache testable with in-memory
//! readers and keeps the decode internals behind one seam.
//!
//! Two production implementations sit behind [`open_file`]:
//!
//! - **WAV** goes through hound. Speaker-array renders routinely carry 50+
//!   channels, which symphonia's named-channel layout model cannot
//!   represent; hound reads any channel count and seeks in O(1) on PCM.
//! - **AIFF/FLAC** go through symphonia, with accurate seeking done as a
//!   coarse container seek followed by decode-and-discard up to the exact
//!   requested frame.

use crate::error::{Error, Result};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::formats::{FormatOptions, FormatReader, SeekMode, SeekTo};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::units::Time;
use tracing::{debug, warn};

/// Decode errors are not considered fatal; the correct action is to fetch
/// the next packet and try again. More than this many consecutive failures
/// is fatal.
const MAX_DECODE_RETRIES: usize = 3;

/// Static properties of an opened audio file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileInfo {
    /// Interleaved channel count
    pub channels: usize,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Total frame count
    pub total_frames: u64,
}

impl FileInfo {
    /// Duration in seconds
    pub fn duration_secs(&self) -> f64 {
        admp_common::time::frames_to_secs(self.total_frames, self.sample_rate)
    }
}

/// Random-access reader of interleaved f32 frames.
///
/// Implementations are driven from the cache loader thread, never from the
/// audio callback, so they may block on disk.
pub trait AudioFileReader: Send {
    /// Static file properties
    fn info(&self) -> FileInfo;

    /// Position the reader so the next `read` starts at `frame`
    fn seek(&mut self, frame: u64) -> Result<()>;

    /// Append up to `frames` interleaved frames to `dest`.
    ///
    /// Returns the number of frames actually read; fewer than requested
    /// means end of stream.
    fn read(&mut self, dest: &mut Vec<f32>, frames: u64) -> Result<u64>;
}

/// Open an audio file with the reader suited to its container.
///
/// WAV files use the hound-backed reader (arbitrary channel counts);
/// everything else is probed by symphonia.
pub fn open_file(path: &Path) -> Result<Box<dyn AudioFileReader>> {
    let is_wav = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("wav"))
        .unwrap_or(false);

    if is_wav {
        Ok(Box::new(WavFileReader::open(path)?))
    } else {
        Ok(Box::new(SymphoniaReader::open(path)?))
    }
}

/// Hound-backed WAV reader.
///
/// PCM WAV allows exact O(1) seeking and places no limit on the channel
/// count, which is what the multichannel render files need.
pub struct WavFileReader {
    reader: hound::WavReader<BufReader<File>>,
    info: FileInfo,
    sample_format: hound::SampleFormat,
    /// Scale applied to integer samples: 1 / 2^(bits-1)
    int_scale: f32,
}

impl WavFileReader {
    /// Open a WAV file.
    ///
    /// # Errors
    /// - File cannot be opened or is not a valid WAV
    /// - Unsupported bit depth
    pub fn open(path: &Path) -> Result<Self> {
        let reader = hound::WavReader::open(path).map_err(|e| {
            Error::FileOpen(format!("Failed to open WAV {}: {}", path.display(), e))
        })?;

        let spec = reader.spec();
        if spec.channels == 0 {
            return Err(Error::FileOpen("WAV reports zero channels".to_string()));
        }
        if spec.sample_format == hound::SampleFormat::Int
            && !(8..=32).contains(&spec.bits_per_sample)
        {
            return Err(Error::FileOpen(format!(
                "Unsupported WAV bit depth: {}",
                spec.bits_per_sample
            )));
        }

        let info = FileInfo {
            channels: spec.channels as usize,
            sample_rate: spec.sample_rate,
            total_frames: reader.duration() as u64,
        };

        debug!(
            "Opened {}: sample_rate={}, channels={}, frames={}, {} bit",
            path.display(),
            info.sample_rate,
            info.channels,
            info.total_frames,
            spec.bits_per_sample
        );

        Ok(Self {
            reader,
            info,
            sample_format: spec.sample_format,
            int_scale: 1.0 / (1u64 << (spec.bits_per_sample - 1)) as f32,
        })
    }
}

impl AudioFileReader for WavFileReader {
    fn info(&self) -> FileInfo {
        self.info
    }

    fn seek(&mut self, frame: u64) -> Result<()> {
        self.reader
            .seek(frame as u32)
            .map_err(|e| Error::StreamRead(format!("Seek to frame {} failed: {}", frame, e)))
    }

    fn read(&mut self, dest: &mut Vec<f32>, frames: u64) -> Result<u64> {
        let want_samples = frames as usize * self.info.channels;
        let mut copied = 0usize;

        match self.sample_format {
            hound::SampleFormat::Float => {
                for sample in self.reader.samples::<f32>().take(want_samples) {
                    let sample = sample
                        .map_err(|e| Error::StreamRead(format!("WAV read failed: {}", e)))?;
                    dest.push(sample);
                    copied += 1;
                }
            }
            hound::SampleFormat::Int => {
                let scale = self.int_scale;
                for sample in self.reader.samples::<i32>().take(want_samples) {
                    let sample = sample
                        .map_err(|e| Error::StreamRead(format!("WAV read failed: {}", e)))?;
                    dest.push(sample as f32 * scale);
                    copied += 1;
                }
            }
        }

        Ok((copied / self.info.channels) as u64)
    }
}

/// Symphonia-backed file reader for AIFF and FLAC
pub struct SymphoniaReader {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    info: FileInfo,
    /// Decoded samples not yet handed out (interleaved)
    pending: Vec<f32>,
    pending_pos: usize,
}

impl SymphoniaReader {
    /// Open an audio file and probe its format.
    ///
    /// # Errors
    /// - File cannot be opened
    /// - No supported audio track
    /// - Sample rate, channel count, or frame count missing from the
    ///   stream (chunked random access requires a known length)
    pub fn open(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path).map_err(|e| {
            Error::FileOpen(format!("Failed to open file {}: {}", path.display(), e))
        })?;

        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        // Hint the format registry with the file extension
        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| Error::FileOpen(format!("Failed to probe format: {}", e)))?;

        let format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| Error::FileOpen("No audio track found".to_string()))?;

        let track_id = track.id;
        let codec_params = &track.codec_params;

        let sample_rate = codec_params
            .sample_rate
            .ok_or_else(|| Error::FileOpen("Sample rate not found".to_string()))?;

        let channels = codec_params
            .channels
            .map(|c| c.count())
            .ok_or_else(|| Error::FileOpen("Channel count not found".to_string()))?;

        let total_frames = codec_params
            .n_frames
            .ok_or_else(|| Error::FileOpen("Frame count not found".to_string()))?;

        let decoder = symphonia::default::get_codecs()
            .make(codec_params, &DecoderOptions::default())
            .map_err(|e| Error::FileOpen(format!("Failed to create decoder: {}", e)))?;

        debug!(
            "Opened {}: sample_rate={}, channels={}, frames={}",
            path.display(),
            sample_rate,
            channels,
            total_frames
        );

        Ok(Self {
            format,
            decoder,
            track_id,
            info: FileInfo {
                channels,
                sample_rate,
                total_frames,
            },
            pending: Vec::new(),
            pending_pos: 0,
        })
    }

    /// Decode the next packet for our track into `pending`.
    ///
    /// Returns `Ok(false)` at end of stream.
    fn decode_next_packet(&mut self) -> Result<bool> {
        let mut decode_errors = 0;

        loop {
            let packet = match self.format.next_packet() {
                Ok(packet) => packet,
                Err(symphonia::core::errors::Error::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    return Ok(false);
                }
                Err(e) => {
                    return Err(Error::StreamRead(format!("Failed to read packet: {}", e)));
                }
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            match self.decoder.decode(&packet) {
                Ok(decoded) => {
                    let spec = *decoded.spec();
                    let duration = decoded.capacity() as u64;
                    let mut buf = SampleBuffer::<f32>::new(duration, spec);
                    buf.copy_interleaved_ref(decoded);
                    self.pending.clear();
                    self.pending.extend_from_slice(buf.samples());
                    self.pending_pos = 0;
                    return Ok(true);
                }
                Err(e) => {
                    decode_errors += 1;
                    warn!("Decode error (attempt {}): {}", decode_errors, e);
                    if decode_errors > MAX_DECODE_RETRIES {
                        return Err(Error::StreamRead(format!(
                            "Decode failed on {} consecutive packets: {}",
                            decode_errors, e
                        )));
                    }
                }
            }
        }
    }
}

impl AudioFileReader for SymphoniaReader {
    fn info(&self) -> FileInfo {
        self.info
    }

    fn seek(&mut self, frame: u64) -> Result<()> {
        let time = frame as f64 / self.info.sample_rate as f64;

        let seeked = self
            .format
            .seek(
                SeekMode::Accurate,
                SeekTo::Time {
                    time: Time::from(time),
                    track_id: Some(self.track_id),
                },
            )
            .map_err(|e| Error::StreamRead(format!("Seek to frame {} failed: {}", frame, e)))?;

        // The container lands on a packet boundary at or before the target;
        // decode and discard up to the exact frame
        self.decoder.reset();
        self.pending.clear();
        self.pending_pos = 0;

        let mut to_skip = frame.saturating_sub(seeked.actual_ts);
        let channels = self.info.channels;
        while to_skip > 0 {
            if !self.decode_next_packet()? {
                break;
            }
            let have = ((self.pending.len() - self.pending_pos) / channels) as u64;
            let drop = have.min(to_skip);
            self.pending_pos += drop as usize * channels;
            to_skip -= drop;
        }

        Ok(())
    }

    fn read(&mut self, dest: &mut Vec<f32>, frames: u64) -> Result<u64> {
        let channels = self.info.channels;
        let want_samples = frames as usize * channels;
        let mut copied = 0usize;

        while copied < want_samples {
            if self.pending_pos >= self.pending.len() {
                if !self.decode_next_packet()? {
                    break;
                }
            }

            let available = self.pending.len() - self.pending_pos;
            let take = available.min(want_samples - copied);
            dest.extend_from_slice(&self.pending[self.pending_pos..self.pending_pos + take]);
            self.pending_pos += take;
            copied += take;
        }

        Ok((copied / channels) as u64)
    }
}
