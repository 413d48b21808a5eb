//! Error types for the conform pipeline.
//!
//! Errors carry context that chains through layers:
//! Job → Step → Operation → Detail

use std::io;

use serde::Serialize;
use thiserror::Error;

use crate::engine::EngineError;
use crate::planning::{LoudnessError, StretchError};
use crate::source::FetchError;
use crate::store::StoreError;

/// Top-level pipeline error with job context.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// A step failed during execution.
    #[error("Job '{job_name}' failed at step '{step_name}': {source}")]
    StepFailed {
        job_name: String,
        step_name: String,
        #[source]
        source: StepError,
    },

    /// The request was rejected before any work started.
    #[error("Job '{job_name}' failed validation: {message}")]
    ValidationFailed { job_name: String, message: String },

    /// Failed to set up the job (scratch directory, logger).
    #[error("Job '{job_name}' setup failed: {message}")]
    SetupFailed { job_name: String, message: String },
}

impl PipelineError {
    pub fn step_failed(
        job_name: impl Into<String>,
        step_name: impl Into<String>,
        source: StepError,
    ) -> Self {
        Self::StepFailed {
            job_name: job_name.into(),
            step_name: step_name.into(),
            source,
        }
    }

    pub fn validation_failed(job_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ValidationFailed {
            job_name: job_name.into(),
            message: message.into(),
        }
    }

    pub fn setup_failed(job_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SetupFailed {
            job_name: job_name.into(),
            message: message.into(),
        }
    }

    /// Failure classification for callers.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::StepFailed { source, .. } => source.kind(),
            PipelineError::ValidationFailed { .. } => ErrorKind::Validation,
            PipelineError::SetupFailed { .. } => ErrorKind::Internal,
        }
    }

    /// Message without job context, suitable for clients.
    pub fn client_message(&self) -> String {
        match self {
            PipelineError::StepFailed { source, .. } => source.to_string(),
            PipelineError::ValidationFailed { message, .. } => message.clone(),
            PipelineError::SetupFailed { message, .. } => message.clone(),
        }
    }

    /// Name of the failing step, if a step failed.
    pub fn step_name(&self) -> Option<&str> {
        match self {
            PipelineError::StepFailed { step_name, .. } => Some(step_name),
            _ => None,
        }
    }
}

/// Error from a pipeline step with operation context.
#[derive(Error, Debug)]
pub enum StepError {
    /// The source clip could not be acquired.
    #[error(transparent)]
    Download(#[from] FetchError),

    /// Stretch planning rejected the durations.
    #[error(transparent)]
    Stretch(#[from] StretchError),

    /// Loudness statistics could not be obtained.
    #[error(transparent)]
    Analysis(#[from] LoudnessError),

    /// The encoded artifact missed the target duration.
    #[error("Final duration mismatch: {actual_ms} ms vs target {target_ms} ms ({deviation_ms:+} ms)")]
    Integrity {
        actual_ms: u64,
        target_ms: u64,
        deviation_ms: i64,
    },

    /// The media engine failed; the diagnostic text is kept verbatim.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// The result store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// File I/O error.
    #[error("I/O error in {operation}: {source}")]
    IoError {
        operation: String,
        #[source]
        source: io::Error,
    },

    /// Output validation failed.
    #[error("Output validation failed: {0}")]
    InvalidOutput(String),

    /// A previous step did not record what this step needs.
    #[error("Precondition not met: {0}")]
    PreconditionFailed(String),
}

impl StepError {
    pub fn integrity(actual_ms: u64, target_ms: u64, deviation_ms: i64) -> Self {
        Self::Integrity {
            actual_ms,
            target_ms,
            deviation_ms,
        }
    }

    pub fn io_error(operation: impl Into<String>, source: io::Error) -> Self {
        Self::IoError {
            operation: operation.into(),
            source,
        }
    }

    pub fn invalid_output(message: impl Into<String>) -> Self {
        Self::InvalidOutput(message.into())
    }

    pub fn precondition_failed(message: impl Into<String>) -> Self {
        Self::PreconditionFailed(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            StepError::Download(_) => ErrorKind::Download,
            // a zero-length signal has no factor inside the window
            StepError::Stretch(_) => ErrorKind::OutOfBounds,
            StepError::Analysis(_) => ErrorKind::Analysis,
            StepError::Integrity { .. } => ErrorKind::Integrity,
            StepError::Engine(_) => ErrorKind::Engine,
            StepError::Store(_)
            | StepError::IoError { .. }
            | StepError::InvalidOutput(_)
            | StepError::PreconditionFailed(_) => ErrorKind::Internal,
        }
    }
}

/// Failure taxonomy exposed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Download,
    OutOfBounds,
    Analysis,
    Integrity,
    Engine,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Download => "download",
            ErrorKind::OutOfBounds => "out_of_bounds",
            ErrorKind::Analysis => "analysis",
            ErrorKind::Integrity => "integrity",
            ErrorKind::Engine => "engine",
            ErrorKind::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result type for step operations.
pub type StepResult<T> = Result<T, StepError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;
