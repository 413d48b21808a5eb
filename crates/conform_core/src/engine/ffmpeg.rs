//! FFmpeg/FFprobe backed media engine.
//!
//! Every call is a blocking child process. Exit status and both output
//! streams are captured; a non-zero exit becomes `EngineError::CommandFailed`
//! carrying the engine's stderr verbatim.

use std::path::{Path, PathBuf};
use std::process::Command;

use super::types::{EngineError, EngineOutput, EngineRequest, EngineResult, OutputTarget};
use super::{MediaProbe, MediaTransform};

/// Media engine that shells out to ffmpeg and ffprobe.
#[derive(Debug, Clone)]
pub struct FfmpegEngine {
    /// Path to ffmpeg executable (None = find in PATH).
    ffmpeg_path: Option<PathBuf>,
    /// Path to ffprobe executable (None = find in PATH).
    ffprobe_path: Option<PathBuf>,
}

impl FfmpegEngine {
    pub fn new() -> Self {
        Self {
            ffmpeg_path: None,
            ffprobe_path: None,
        }
    }

    /// Set a custom path to the ffmpeg executable.
    pub fn with_ffmpeg_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.ffmpeg_path = Some(path.into());
        self
    }

    /// Set a custom path to the ffprobe executable.
    pub fn with_ffprobe_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.ffprobe_path = Some(path.into());
        self
    }

    /// Get the ffmpeg executable path/command.
    fn ffmpeg_cmd(&self) -> &str {
        self.ffmpeg_path
            .as_ref()
            .map(|p| p.to_str().unwrap_or("ffmpeg"))
            .unwrap_or("ffmpeg")
    }

    /// Get the ffprobe executable path/command.
    fn ffprobe_cmd(&self) -> &str {
        self.ffprobe_path
            .as_ref()
            .map(|p| p.to_str().unwrap_or("ffprobe"))
            .unwrap_or("ffprobe")
    }

    /// Build the ffmpeg argument list for a request.
    pub fn build_args(request: &EngineRequest) -> Vec<String> {
        let mut args = vec![
            "-y".to_string(),
            "-hide_banner".to_string(),
            "-nostdin".to_string(),
            "-i".to_string(),
            request.input.display().to_string(),
        ];

        if !request.filters.is_empty() {
            args.push("-af".to_string());
            args.push(request.filters.to_string());
        }

        match &request.output {
            OutputTarget::Null => {
                args.extend(["-f".to_string(), "null".to_string(), "-".to_string()]);
            }
            OutputTarget::File { path, encoding } => {
                args.extend(encoding.args());
                args.push(path.display().to_string());
            }
        }

        args
    }
}

impl Default for FfmpegEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaTransform for FfmpegEngine {
    fn transform(&self, request: &EngineRequest) -> EngineResult<EngineOutput> {
        if !request.input.exists() {
            return Err(EngineError::InputNotFound(request.input.clone()));
        }

        let ffmpeg = self.ffmpeg_cmd();
        let args = Self::build_args(request);

        tracing::debug!("Running {}: {:?}", ffmpeg, args);

        let output = Command::new(ffmpeg)
            .args(&args)
            .output()
            .map_err(|e| EngineError::Spawn {
                tool: ffmpeg.to_string(),
                source: e,
            })?;

        let exit_code = output.status.code().unwrap_or(-1);
        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if !output.status.success() {
            return Err(EngineError::CommandFailed {
                tool: ffmpeg.to_string(),
                exit_code,
                stderr,
            });
        }

        Ok(EngineOutput {
            stdout,
            stderr,
            exit_code,
        })
    }
}

impl MediaProbe for FfmpegEngine {
    fn duration_ms(&self, path: &Path) -> EngineResult<u64> {
        if !path.exists() {
            return Err(EngineError::InputNotFound(path.to_path_buf()));
        }

        let ffprobe = self.ffprobe_cmd();

        let output = Command::new(ffprobe)
            .arg("-v")
            .arg("error")
            .arg("-show_entries")
            .arg("format=duration")
            .arg("-of")
            .arg("default=noprint_wrappers=1:nokey=1")
            .arg(path)
            .output()
            .map_err(|e| EngineError::Spawn {
                tool: ffprobe.to_string(),
                source: e,
            })?;

        if !output.status.success() {
            return Err(EngineError::CommandFailed {
                tool: ffprobe.to_string(),
                exit_code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            });
        }

        parse_duration_ms(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Parse ffprobe's `format=duration` output (seconds) into whole milliseconds.
pub fn parse_duration_ms(raw: &str) -> EngineResult<u64> {
    let trimmed = raw.trim();
    let secs: f64 = trimmed
        .parse()
        .map_err(|_| EngineError::InvalidDuration(trimmed.to_string()))?;

    if !secs.is_finite() || secs < 0.0 {
        return Err(EngineError::InvalidDuration(trimmed.to_string()));
    }

    Ok((secs * 1000.0).round() as u64)
}
