//! Two-pass EBU R128 loudness planning.
//!
//! Pass one runs loudnorm in measurement mode into a null sink; the engine
//! prints a JSON statistics block somewhere in its diagnostic stream. Pass two
//! feeds those statistics back with `linear=true` so the correction hits the
//! target without the single-pass limiter's nonlinearity, and appends short
//! linear fades so later hard cuts do not click.

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::engine::{FadeKind, Filter, FilterChain, LoudnormParams, PrintFormat};

/// Default fade length at both ends of the normalized signal.
pub const DEFAULT_FADE_MS: u64 = 10;

/// Errors from decoding the measurement pass.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LoudnessError {
    /// No `{ ... }` block in the diagnostic output.
    #[error("loudnorm analysis failed: no statistics block in engine output")]
    BlockNotFound,

    /// A block was found but could not be decoded.
    #[error("loudnorm analysis failed: {0}")]
    Malformed(String),
}

/// Loudness targets for normalization.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoudnessTarget {
    /// Integrated loudness (LUFS).
    pub integrated_lufs: f64,
    /// Loudness range (LU).
    pub loudness_range_lu: f64,
    /// True peak ceiling (dBTP).
    pub true_peak_dbtp: f64,
}

impl Default for LoudnessTarget {
    fn default() -> Self {
        Self {
            integrated_lufs: -23.0,
            loudness_range_lu: 7.0,
            true_peak_dbtp: -1.0,
        }
    }
}

/// Statistics reported by the measurement pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoudnessMeasurement {
    #[serde(deserialize_with = "stat")]
    pub input_i: f64,
    #[serde(deserialize_with = "stat")]
    pub input_lra: f64,
    #[serde(deserialize_with = "stat")]
    pub input_tp: f64,
    #[serde(deserialize_with = "stat")]
    pub input_thresh: f64,
    #[serde(deserialize_with = "stat")]
    pub target_offset: f64,
}

/// loudnorm prints numbers as JSON strings; accept both forms.
fn stat<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(v) => Ok(v),
        Raw::Text(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| serde::de::Error::custom(format!("invalid statistic '{}'", s))),
    }
}

/// Locate the statistics block: first `{` through last `}`.
pub fn find_stats_block(diagnostics: &str) -> Option<&str> {
    let start = diagnostics.find('{')?;
    let end = diagnostics.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&diagnostics[start..=end])
}

/// Decode the measurement pass diagnostics into typed statistics.
pub fn parse_measurement(diagnostics: &str) -> Result<LoudnessMeasurement, LoudnessError> {
    let block = find_stats_block(diagnostics).ok_or(LoudnessError::BlockNotFound)?;
    serde_json::from_str(block).map_err(|e| LoudnessError::Malformed(e.to_string()))
}

/// Builds the filter chains for both loudness passes.
#[derive(Debug, Clone)]
pub struct LoudnessPlanner {
    target: LoudnessTarget,
    fade_ms: u64,
}

impl Default for LoudnessPlanner {
    fn default() -> Self {
        Self::new(LoudnessTarget::default(), DEFAULT_FADE_MS)
    }
}

impl LoudnessPlanner {
    pub fn new(target: LoudnessTarget, fade_ms: u64) -> Self {
        Self { target, fade_ms }
    }

    pub fn target(&self) -> LoudnessTarget {
        self.target
    }

    /// Measurement-only pass.
    pub fn measurement_chain(&self) -> FilterChain {
        FilterChain::new().with(Filter::Loudnorm(LoudnormParams {
            target: self.target,
            measured: None,
            linear: false,
            print_format: PrintFormat::Json,
        }))
    }

    /// Corrective pass plus fade-in and fade-out.
    ///
    /// `signal_ms` is the measured duration of the signal being normalized.
    /// The fade-out ends at whichever comes first of the signal tail and
    /// `target_ms`, so a later trim to the target keeps the whole fade.
    pub fn correction_chain(
        &self,
        measured: &LoudnessMeasurement,
        signal_ms: u64,
        target_ms: u64,
    ) -> FilterChain {
        let fade_secs = self.fade_ms as f64 / 1000.0;
        let fade_end_ms = signal_ms.min(target_ms);
        let fade_out_start = fade_end_ms.saturating_sub(self.fade_ms) as f64 / 1000.0;

        FilterChain::new()
            .with(Filter::Loudnorm(LoudnormParams {
                target: self.target,
                measured: Some(*measured),
                linear: true,
                print_format: PrintFormat::Summary,
            }))
            .with(Filter::Fade {
                kind: FadeKind::In,
                start_secs: 0.0,
                duration_secs: fade_secs,
            })
            .with(Filter::Fade {
                kind: FadeKind::Out,
                start_secs: fade_out_start,
                duration_secs: fade_secs,
            })
    }
}
