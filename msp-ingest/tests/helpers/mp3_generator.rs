//! MP3 Test Fixture Generator
//!
//! Writes a bare MPEG-1 Layer III stream: constant-bitrate frames with a
//! valid header and silent (zeroed) payload, no tag.

use std::path::{Path, PathBuf};

/// MPEG-1 Layer III, 128 kbps, 44.1 kHz, joint stereo, no CRC, no padding
const FRAME_HEADER: [u8; 4] = [0xFF, 0xFB, 0x90, 0x64];

/// floor(144 * 128000 / 44100)
const FRAME_LEN: usize = 417;

#[derive(Debug, Clone)]
pub struct Mp3Config {
    pub frame_count: usize,
}

impl Default for Mp3Config {
    fn default() -> Self {
        Self { frame_count: 40 }
    }
}

/// Generate a test MP3 file with the given configuration
pub fn generate_test_mp3(path: &Path, config: &Mp3Config) -> anyhow::Result<PathBuf> {
    let mut bytes = Vec::with_capacity(FRAME_LEN * config.frame_count);
    for _ in 0..config.frame_count {
        let start = bytes.len();
        bytes.extend_from_slice(&FRAME_HEADER);
        bytes.resize(start + FRAME_LEN, 0);
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, &bytes)?;
    Ok(path.to_path_buf())
}
