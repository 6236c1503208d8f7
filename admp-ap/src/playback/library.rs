//! Audio folder scanning
//!
//! Builds the selectable file list from the configured audio folder.
//! Non-recursive; ordering is deterministic (lexicographic by file name).

use crate::error::Result;
use std::path::Path;
use tracing::{debug, info};

/// File extensions the player will list, lowercase
pub const AUDIO_EXTENSIONS: &[&str] = &["wav", "aiff", "aif", "flac"];

/// Scan `folder` for audio files.
///
/// Returns sorted file names (not full paths). An empty result is not an
/// error; the player simply stays idle with nothing to select.
pub fn scan_audio_files(folder: &Path) -> Result<Vec<String>> {
    debug!("Scanning for audio files in: {}", folder.display());

    let mut files = Vec::new();

    for entry in std::fs::read_dir(folder)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }

        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };

        let is_audio = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| AUDIO_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
            .unwrap_or(false);

        if is_audio {
            files.push(name.to_string());
        }
    }

    files.sort();

    info!("Found {} audio files in {}", files.len(), folder.display());
    Ok(files)
}
