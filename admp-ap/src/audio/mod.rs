//! Audio subsystem: file reading and device output

pub mod output;
pub mod reader;

pub use output::AudioOutput;
pub use reader::{open_file, AudioFileReader, FileInfo, SymphoniaReader, WavFileReader};
