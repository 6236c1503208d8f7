//! Audio test file generation utilities
//!
//! Generates deterministic multichannel WAV files with known contents for
//! validating the reader, the stream cache, and the render path.
//!
//! Fixtures are written as plain 16-bit PCM WAV. Writers that switch to
//! WAVEFORMATEXTENSIBLE represent channels through a named speaker-position
//! mask, which stops far short of the 50+ channels a speaker-array render
//! carries; the canonical PCM header has no such limit.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// Standard test sample rate
pub const TEST_SAMPLE_RATE: u32 = 48_000;

/// Deterministic sample value for `(frame, channel)`.
///
/// Every channel carries a distinct repeating ramp so routing mistakes
/// (wrong channel, wrong frame) show up as value mismatches.
pub fn pattern_i16(frame: u32, channel: u16) -> i16 {
    ((frame as i32 * 31 + channel as i32 * 7) % 2000 - 1000) as i16
}

/// Write a 16-bit PCM WAV with samples supplied per `(frame, channel)`.
pub fn write_pcm16_wav<P, F>(
    path: P,
    frames: u32,
    channels: u16,
    sample_rate: u32,
    mut sample: F,
) -> io::Result<()>
where
    P: AsRef<Path>,
    F: FnMut(u32, u16) -> i16,
{
    let block_align = channels as u32 * 2;
    let data_size = frames * block_align;

    let mut w = BufWriter::new(File::create(path)?);
    w.write_all(b"RIFF")?;
    w.write_all(&(36 + data_size).to_le_bytes())?;
    w.write_all(b"WAVE")?;
    w.write_all(b"fmt ")?;
    w.write_all(&16u32.to_le_bytes())?;
    w.write_all(&1u16.to_le_bytes())?; // PCM
    w.write_all(&channels.to_le_bytes())?;
    w.write_all(&sample_rate.to_le_bytes())?;
    w.write_all(&(sample_rate * block_align).to_le_bytes())?;
    w.write_all(&(block_align as u16).to_le_bytes())?;
    w.write_all(&16u16.to_le_bytes())?;
    w.write_all(b"data")?;
    w.write_all(&data_size.to_le_bytes())?;

    for frame in 0..frames {
        for channel in 0..channels {
            w.write_all(&sample(frame, channel).to_le_bytes())?;
        }
    }
    w.flush()
}

/// Generate a multichannel WAV file with the deterministic pattern.
pub fn generate_pattern_wav<P: AsRef<Path>>(
    path: P,
    frames: u32,
    channels: u16,
) -> io::Result<()> {
    write_pcm16_wav(path, frames, channels, TEST_SAMPLE_RATE, pattern_i16)
}

/// Generate a WAV holding a constant amplitude on every channel.
///
/// Used for meter convergence tests: the expected linear level is
/// `amplitude` (within 16-bit quantization).
pub fn generate_constant_wav<P: AsRef<Path>>(
    path: P,
    frames: u32,
    channels: u16,
    amplitude: f32,
) -> io::Result<()> {
    let value = (amplitude * i16::MAX as f32) as i16;
    write_pcm16_wav(path, frames, channels, TEST_SAMPLE_RATE, |_, _| value)
}

/// Generate a silent WAV file
pub fn generate_silent_wav<P: AsRef<Path>>(
    path: P,
    frames: u32,
    channels: u16,
) -> io::Result<()> {
    generate_constant_wav(path, frames, channels, 0.0)
}
