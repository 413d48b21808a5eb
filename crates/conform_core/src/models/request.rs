//! Conform request model.

use serde::{Deserialize, Serialize};

use super::enums::OutputFormat;

/// Upper bound for the target duration (three minutes).
pub const MAX_TARGET_DURATION_MS: u64 = 3 * 60 * 1000;

/// A request to conform one clip to an exact duration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConformRequest {
    /// Locator of the source clip (http(s), file:// or a local path).
    pub audio_url: String,
    /// Exact duration the output must have.
    pub target_duration_ms: i64,
    /// Informational only: tempo stretching always preserves pitch.
    #[serde(default = "default_true")]
    pub preserve_pitch: bool,
    /// Finishing codec.
    #[serde(default)]
    pub format_out: OutputFormat,
    /// Bitrate for the lossy codec.
    #[serde(default = "default_bitrate")]
    pub bitrate_kbps: u32,
}

fn default_true() -> bool {
    true
}

fn default_bitrate() -> u32 {
    192
}

/// Bounds applied when validating a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestLimits {
    pub max_target_ms: u64,
    pub min_bitrate_kbps: u32,
    pub max_bitrate_kbps: u32,
}

impl Default for RequestLimits {
    fn default() -> Self {
        Self {
            max_target_ms: MAX_TARGET_DURATION_MS,
            min_bitrate_kbps: 32,
            max_bitrate_kbps: 320,
        }
    }
}

impl ConformRequest {
    /// Create a request with default pitch/format/bitrate values.
    pub fn new(audio_url: impl Into<String>, target_duration_ms: i64) -> Self {
        Self {
            audio_url: audio_url.into(),
            target_duration_ms,
            preserve_pitch: true,
            format_out: OutputFormat::default(),
            bitrate_kbps: default_bitrate(),
        }
    }

    /// Set the output format (builder pattern).
    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format_out = format;
        self
    }

    /// Set the output bitrate (builder pattern).
    pub fn with_bitrate(mut self, bitrate_kbps: u32) -> Self {
        self.bitrate_kbps = bitrate_kbps;
        self
    }

    /// Target duration as an unsigned value.
    ///
    /// Only meaningful after `validate` succeeded.
    pub fn target_ms(&self) -> u64 {
        self.target_duration_ms.max(0) as u64
    }

    /// Check the request against the configured limits.
    ///
    /// Runs before any external invocation. Returns a human-readable
    /// message on failure.
    pub fn validate(&self, limits: &RequestLimits) -> Result<(), String> {
        if self.target_duration_ms <= 0 || self.target_duration_ms as u64 > limits.max_target_ms {
            return Err(format!(
                "target_duration_ms out of bounds (0, {}]",
                limits.max_target_ms
            ));
        }

        if self.audio_url.trim().is_empty() {
            return Err("audio_url must not be empty".to_string());
        }

        if self.format_out.is_lossy()
            && !(limits.min_bitrate_kbps..=limits.max_bitrate_kbps).contains(&self.bitrate_kbps)
        {
            return Err(format!(
                "bitrate_kbps {} outside [{}, {}]",
                self.bitrate_kbps, limits.min_bitrate_kbps, limits.max_bitrate_kbps
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_fields() {
        let req: ConformRequest =
            serde_json::from_str(r#"{"audio_url":"http://x/a.wav","target_duration_ms":9000}"#)
                .unwrap();
        assert!(req.preserve_pitch);
        assert_eq!(req.format_out, OutputFormat::Mp3);
        assert_eq!(req.bitrate_kbps, 192);
    }

    #[test]
    fn target_bounds_are_half_open() {
        let limits = RequestLimits::default();
        assert!(ConformRequest::new("a", 0).validate(&limits).is_err());
        assert!(ConformRequest::new("a", -5).validate(&limits).is_err());
        assert!(ConformRequest::new("a", 1).validate(&limits).is_ok());
        assert!(ConformRequest::new("a", 180_000).validate(&limits).is_ok());

        let err = ConformRequest::new("a", 180_001).validate(&limits).unwrap_err();
        assert!(err.contains("180000"));
    }

    #[test]
    fn bitrate_only_checked_for_mp3() {
        let limits = RequestLimits::default();
        let mp3 = ConformRequest::new("a", 9000).with_bitrate(1000);
        assert!(mp3.validate(&limits).is_err());

        let wav = mp3.with_format(OutputFormat::Wav);
        assert!(wav.validate(&limits).is_ok());
    }

    #[test]
    fn empty_locator_rejected() {
        let limits = RequestLimits::default();
        assert!(ConformRequest::new("  ", 9000).validate(&limits).is_err());
    }
}
