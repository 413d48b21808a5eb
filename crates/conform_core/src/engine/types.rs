//! Request/response types for the external media engine.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::filters::{FilterChain, PIVOT_CHANNELS, PIVOT_SAMPLE_RATE};

/// Errors from engine invocations.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The engine executable could not be started.
    #[error("Failed to run {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: io::Error,
    },

    /// The engine ran but reported failure. `stderr` is verbatim.
    #[error("{tool} failed with exit code {exit_code}: {stderr}")]
    CommandFailed {
        tool: String,
        exit_code: i32,
        stderr: String,
    },

    /// The input file does not exist.
    #[error("Input not found: {0}")]
    InputNotFound(PathBuf),

    /// The probe output could not be read as a duration.
    #[error("Failed to parse duration '{0}'")]
    InvalidDuration(String),
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Encoding applied when writing an engine output file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// Pivot PCM: 32-bit float, mono, 48 kHz.
    PivotPcm,
    /// MP3 via libmp3lame.
    Mp3 { bitrate_kbps: u32 },
}

impl Encoding {
    /// Output arguments for this encoding.
    pub fn args(&self) -> Vec<String> {
        match self {
            Encoding::PivotPcm => vec![
                "-c:a".to_string(),
                "pcm_f32le".to_string(),
                "-ac".to_string(),
                PIVOT_CHANNELS.to_string(),
                "-ar".to_string(),
                PIVOT_SAMPLE_RATE.to_string(),
            ],
            Encoding::Mp3 { bitrate_kbps } => vec![
                "-c:a".to_string(),
                "libmp3lame".to_string(),
                "-b:a".to_string(),
                format!("{}k", bitrate_kbps),
            ],
        }
    }
}

/// Where an engine invocation writes its result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    /// Discard audio (analysis-only passes).
    Null,
    /// Write an encoded file.
    File { path: PathBuf, encoding: Encoding },
}

/// One engine invocation: input, ordered filter chain, output.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineRequest {
    pub input: PathBuf,
    pub filters: FilterChain,
    pub output: OutputTarget,
}

impl EngineRequest {
    /// Request that writes a file with the given encoding.
    pub fn to_file(
        input: impl Into<PathBuf>,
        filters: FilterChain,
        path: impl Into<PathBuf>,
        encoding: Encoding,
    ) -> Self {
        Self {
            input: input.into(),
            filters,
            output: OutputTarget::File {
                path: path.into(),
                encoding,
            },
        }
    }

    /// Request whose audio goes to a null sink.
    pub fn to_null(input: impl Into<PathBuf>, filters: FilterChain) -> Self {
        Self {
            input: input.into(),
            filters,
            output: OutputTarget::Null,
        }
    }

    /// Output file path, if this request writes one.
    pub fn output_path(&self) -> Option<&Path> {
        match &self.output {
            OutputTarget::File { path, .. } => Some(path),
            OutputTarget::Null => None,
        }
    }

    /// Short description for logs.
    pub fn describe(&self) -> String {
        let output = match &self.output {
            OutputTarget::Null => "null".to_string(),
            OutputTarget::File { path, .. } => path.display().to_string(),
        };
        format!(
            "{} -af \"{}\" -> {}",
            self.input.display(),
            self.filters,
            output
        )
    }
}

/// Captured result of a successful invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineOutput {
    pub stdout: String,
    /// Diagnostic stream (where loudnorm prints its statistics).
    pub stderr: String,
    pub exit_code: i32,
}
