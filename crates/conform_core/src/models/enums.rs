//! Core enums used throughout the application.

use serde::{Deserialize, Serialize};

/// Finishing codec for the conformed clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// MPEG-1 Layer III at a requested bitrate.
    #[default]
    Mp3,
    /// Uncompressed WAV (the pivot encoding, copied as-is).
    Wav,
}

impl OutputFormat {
    /// File extension for this format (without the dot).
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Mp3 => "mp3",
            OutputFormat::Wav => "wav",
        }
    }

    /// MIME type served for this format.
    pub fn content_type(&self) -> &'static str {
        match self {
            OutputFormat::Mp3 => "audio/mpeg",
            OutputFormat::Wav => "audio/wav",
        }
    }

    /// Whether the format is lossy (and therefore uses a bitrate).
    pub fn is_lossy(&self) -> bool {
        matches!(self, OutputFormat::Mp3)
    }

    /// Resolve a format from a file name suffix.
    ///
    /// Anything that is not `.mp3` is treated as WAV.
    pub fn from_file_name(name: &str) -> Self {
        if name.to_ascii_lowercase().ends_with(".mp3") {
            OutputFormat::Mp3
        } else {
            OutputFormat::Wav
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}
