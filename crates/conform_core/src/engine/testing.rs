//! Deterministic media engine for tests.
//!
//! Files written by `ScriptedEngine` contain a single marker line,
//! `scripted-audio:<ms>`, so durations survive plain file copies and can be
//! probed back without any codec. Filter effects on duration are simulated:
//! tempo divides, pad adds, trim caps. Drift can be injected per stage to
//! exercise the correction, fitting and verification paths.

use std::fs;
use std::path::Path;

use parking_lot::Mutex;

use super::filters::Filter;
use super::types::{Encoding, EngineError, EngineOutput, EngineRequest, EngineResult, OutputTarget};
use super::{MediaProbe, MediaTransform};

const MARKER: &str = "scripted-audio:";

/// Loudnorm JSON block as ffmpeg prints it, surrounded by other log noise.
pub const SAMPLE_LOUDNORM_STDERR: &str = r#"Input #0, wav, from 'step2.wav':
  Duration: 00:00:09.00, bitrate: 1536 kb/s
[Parsed_loudnorm_0 @ 0x55d0c8c0a2c0]
{
	"input_i" : "-27.61",
	"input_tp" : "-4.52",
	"input_lra" : "5.30",
	"input_thresh" : "-38.02",
	"output_i" : "-23.04",
	"output_tp" : "-1.00",
	"output_lra" : "4.70",
	"output_thresh" : "-33.41",
	"normalization_type" : "dynamic",
	"target_offset" : "0.04"
}
size=N/A time=00:00:09.00 bitrate=N/A speed= 412x
"#;

/// Scripted engine used by unit and integration tests.
pub struct ScriptedEngine {
    step1_drift_ms: i64,
    norm_drift_ms: i64,
    encode_drift_ms: i64,
    measurement_stderr: String,
    fail_on_call: Option<usize>,
    calls: Mutex<Vec<EngineRequest>>,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self {
            step1_drift_ms: 0,
            norm_drift_ms: 0,
            encode_drift_ms: 0,
            measurement_stderr: SAMPLE_LOUDNORM_STDERR.to_string(),
            fail_on_call: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Add drift to the first stretch pass output (frame quantization).
    pub fn with_step1_drift(mut self, ms: i64) -> Self {
        self.step1_drift_ms = ms;
        self
    }

    /// Add drift to the corrective loudnorm pass output.
    pub fn with_norm_drift(mut self, ms: i64) -> Self {
        self.norm_drift_ms = ms;
        self
    }

    /// Add drift to the lossy encode output (encoder padding).
    pub fn with_encode_drift(mut self, ms: i64) -> Self {
        self.encode_drift_ms = ms;
        self
    }

    /// Replace the diagnostic text returned by null-sink passes.
    pub fn with_measurement_stderr(mut self, stderr: impl Into<String>) -> Self {
        self.measurement_stderr = stderr.into();
        self
    }

    /// Fail the N-th transform call (0-based) with a command error.
    pub fn failing_on_call(mut self, index: usize) -> Self {
        self.fail_on_call = Some(index);
        self
    }

    /// All transform requests received so far, in order.
    pub fn calls(&self) -> Vec<EngineRequest> {
        self.calls.lock().clone()
    }

    /// Write a scripted clip of the given duration.
    pub fn write_clip(path: &Path, duration_ms: u64) -> std::io::Result<()> {
        fs::write(path, format!("{}{}\n", MARKER, duration_ms))
    }

    fn read_clip(path: &Path) -> EngineResult<u64> {
        let content =
            fs::read_to_string(path).map_err(|_| EngineError::InputNotFound(path.to_path_buf()))?;
        content
            .trim()
            .strip_prefix(MARKER)
            .and_then(|ms| ms.parse().ok())
            .ok_or_else(|| EngineError::InvalidDuration(content.trim().to_string()))
    }

    fn apply_drift(ms: u64, drift: i64) -> u64 {
        (ms as i64 + drift).max(0) as u64
    }
}

impl Default for ScriptedEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaTransform for ScriptedEngine {
    fn transform(&self, request: &EngineRequest) -> EngineResult<EngineOutput> {
        let (index, tempo_calls_before) = {
            let mut calls = self.calls.lock();
            let tempo_calls = calls
                .iter()
                .filter(|c| c.filters.filters().iter().any(|f| matches!(f, Filter::Tempo(_))))
                .count();
            calls.push(request.clone());
            (calls.len() - 1, tempo_calls)
        };

        if self.fail_on_call == Some(index) {
            return Err(EngineError::CommandFailed {
                tool: "ffmpeg".to_string(),
                exit_code: 1,
                stderr: format!("scripted failure on call {}", index),
            });
        }

        let mut ms = Self::read_clip(&request.input)?;
        let mut is_first_tempo = false;
        let mut is_corrective_loudnorm = false;

        for filter in request.filters.filters() {
            match filter {
                Filter::Tempo(tempo) => {
                    ms = (ms as f64 / tempo).round() as u64;
                    is_first_tempo = tempo_calls_before == 0;
                }
                Filter::Loudnorm(params) => {
                    is_corrective_loudnorm = params.measured.is_some();
                }
                Filter::Pad { duration_secs } => {
                    ms += (duration_secs * 1000.0).round() as u64;
                }
                Filter::Trim { end_secs } => {
                    ms = ms.min((end_secs * 1000.0).round() as u64);
                }
                Filter::Format { .. } | Filter::Fade { .. } | Filter::RebaseTimestamps => {}
            }
        }

        match &request.output {
            OutputTarget::Null => Ok(EngineOutput {
                stdout: String::new(),
                stderr: self.measurement_stderr.clone(),
                exit_code: 0,
            }),
            OutputTarget::File { path, encoding } => {
                if is_first_tempo {
                    ms = Self::apply_drift(ms, self.step1_drift_ms);
                }
                if is_corrective_loudnorm {
                    ms = Self::apply_drift(ms, self.norm_drift_ms);
                }
                if matches!(encoding, Encoding::Mp3 { .. }) {
                    ms = Self::apply_drift(ms, self.encode_drift_ms);
                }

                Self::write_clip(path, ms).map_err(|e| EngineError::Spawn {
                    tool: "ffmpeg".to_string(),
                    source: e,
                })?;

                Ok(EngineOutput::default())
            }
        }
    }
}

impl MediaProbe for ScriptedEngine {
    fn duration_ms(&self, path: &Path) -> EngineResult<u64> {
        Self::read_clip(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::filters::FilterChain;
    use tempfile::tempdir;

    #[test]
    fn tempo_divides_duration() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("in.wav");
        let output = dir.path().join("out.wav");
        ScriptedEngine::write_clip(&input, 10_000).unwrap();

        let engine = ScriptedEngine::new();
        let req = EngineRequest::to_file(
            &input,
            FilterChain::new().with(Filter::Tempo(1.25)),
            &output,
            Encoding::PivotPcm,
        );
        engine.transform(&req).unwrap();

        assert_eq!(engine.duration_ms(&output).unwrap(), 8_000);
        assert_eq!(engine.calls().len(), 1);
    }

    #[test]
    fn null_sink_returns_measurement_text() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("in.wav");
        ScriptedEngine::write_clip(&input, 1_000).unwrap();

        let engine = ScriptedEngine::new();
        let out = engine
            .transform(&EngineRequest::to_null(&input, FilterChain::new()))
            .unwrap();
        assert!(out.stderr.contains("\"target_offset\""));
    }

    #[test]
    fn scripted_failure_carries_stderr() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("in.wav");
        ScriptedEngine::write_clip(&input, 1_000).unwrap();

        let engine = ScriptedEngine::new().failing_on_call(0);
        let err = engine
            .transform(&EngineRequest::to_null(&input, FilterChain::new()))
            .unwrap_err();
        assert!(err.to_string().contains("scripted failure"));
    }
}
