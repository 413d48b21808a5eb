//! Conform result and wire response.

use serde::{Deserialize, Serialize};

use super::enums::OutputFormat;

/// Fixed tag naming the technique used by the pipeline.
pub const PIPELINE_TAG: &str = "ffmpeg_atempo_double + loudnorm2 + fades + exact_trim";

/// Outcome of a successful conform run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConformResult {
    /// Job identifier used for logs.
    pub job_id: String,
    /// Opaque identifier of the published artifact in the result store.
    pub artifact_id: String,
    /// Format of the published artifact.
    pub format: OutputFormat,
    /// Measured duration of the encoded artifact.
    pub final_duration_ms: u64,
    /// Primary stretch factor (target / input).
    pub factor: f64,
    /// Corrective stretch factor (target / measured step 1).
    pub factor_correction: f64,
    /// Measured duration of the pivot signal.
    pub input_duration_ms: u64,
    /// Measured duration after loudness normalization.
    pub post_norm_ms: u64,
}

/// Extra diagnostics carried in the response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseMeta {
    pub input_duration_ms: u64,
    pub post_norm_ms: u64,
}

/// Client-facing response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConformResponse {
    pub download_url: String,
    pub final_duration_ms: u64,
    pub factor: f64,
    pub factor_correction: f64,
    pub pipeline: String,
    pub meta: ResponseMeta,
}

impl ConformResult {
    /// Build the wire response, with the download URL rooted at `route_prefix`.
    pub fn to_response(&self, route_prefix: &str) -> ConformResponse {
        ConformResponse {
            download_url: format!(
                "{}/{}",
                route_prefix.trim_end_matches('/'),
                self.artifact_id
            ),
            final_duration_ms: self.final_duration_ms,
            factor: round6(self.factor),
            factor_correction: round6(self.factor_correction),
            pipeline: PIPELINE_TAG.to_string(),
            meta: ResponseMeta {
                input_duration_ms: self.input_duration_ms,
                post_norm_ms: self.post_norm_ms,
            },
        }
    }
}

/// Round to 6 decimal places.
fn round6(value: f64) -> f64 {
    (value * 1_000_000.0).round() / 1_000_000.0
}
