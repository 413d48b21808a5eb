//! Core types for the conform pipeline.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::Settings;
use crate::engine::MediaEngine;
use crate::logging::JobLogger;
use crate::models::{ConformRequest, ConformResult, OutputFormat};
use crate::planning::{DurationFit, LoudnessMeasurement};
use crate::source::SourceFetcher;
use crate::store::ResultStore;

/// Progress callback type for reporting pipeline progress.
///
/// Arguments: (step_name, percent_complete, message)
pub type ProgressCallback = Box<dyn Fn(&str, u32, &str) + Send + Sync>;

/// Read-only context passed to pipeline steps.
///
/// Contains the request and the collaborators steps call out to. Mutable
/// state goes in `JobState`.
pub struct Context {
    /// The validated request.
    pub request: ConformRequest,
    /// Service settings.
    pub settings: Settings,
    /// Job name/identifier used in logs.
    pub job_name: String,
    /// Per-invocation scratch directory.
    pub work_dir: PathBuf,
    /// Media engine (probe + transform).
    pub engine: Arc<dyn MediaEngine>,
    /// Source acquisition.
    pub fetcher: Arc<dyn SourceFetcher>,
    /// Where finished artifacts are published.
    pub store: Arc<dyn ResultStore>,
    /// Per-job logger.
    pub logger: Arc<JobLogger>,
    progress_callback: Option<ProgressCallback>,
}

impl Context {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        request: ConformRequest,
        settings: Settings,
        job_name: impl Into<String>,
        work_dir: PathBuf,
        engine: Arc<dyn MediaEngine>,
        fetcher: Arc<dyn SourceFetcher>,
        store: Arc<dyn ResultStore>,
        logger: Arc<JobLogger>,
    ) -> Self {
        Self {
            request,
            settings,
            job_name: job_name.into(),
            work_dir,
            engine,
            fetcher,
            store,
            logger,
            progress_callback: None,
        }
    }

    /// Set the progress callback.
    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Report progress to the logger and the callback (if set).
    pub fn report_progress(&self, step_name: &str, percent: u32, message: &str) {
        self.logger.progress(percent);
        if let Some(ref callback) = self.progress_callback {
            callback(step_name, percent, message);
        }
    }

    /// Target duration of this job.
    pub fn target_ms(&self) -> u64 {
        self.request.target_ms()
    }

    /// Path of a scratch file.
    pub fn scratch_path(&self, name: &str) -> PathBuf {
        self.work_dir.join(name)
    }
}

/// Pipeline stages, in the order they are reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Acquired,
    Pivoted,
    Stretched,
    Corrected,
    Measured,
    Normalized,
    Fitted,
    Encoded,
    Verified,
    Published,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Acquired => "acquired",
            Stage::Pivoted => "pivoted",
            Stage::Stretched => "stretched",
            Stage::Corrected => "corrected",
            Stage::Measured => "measured",
            Stage::Normalized => "normalized",
            Stage::Fitted => "fitted",
            Stage::Encoded => "encoded",
            Stage::Verified => "verified",
            Stage::Published => "published",
        }
    }
}

/// Mutable job state that accumulates results from pipeline steps.
///
/// Each step writes its own section once; later steps read the recorded,
/// measured values instead of re-deriving them from the request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobState {
    /// Unique job identifier.
    pub job_id: String,
    /// When the job started.
    pub started_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acquire: Option<AcquireOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pivot: Option<SignalOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stretch: Option<StretchOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correction: Option<StretchOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub measurement: Option<LoudnessMeasurement>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normalize: Option<SignalOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fit: Option<FitOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encode: Option<EncodeOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified_duration_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_id: Option<String>,
}

impl JobState {
    /// Create a new job state with the given ID.
    pub fn new(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            started_at: Some(chrono::Local::now().to_rfc3339()),
            ..Default::default()
        }
    }

    /// Furthest stage reached, if any.
    pub fn stage(&self) -> Option<Stage> {
        let reached = [
            (self.artifact_id.is_some(), Stage::Published),
            (self.verified_duration_ms.is_some(), Stage::Verified),
            (self.encode.is_some(), Stage::Encoded),
            (self.fit.is_some(), Stage::Fitted),
            (self.normalize.is_some(), Stage::Normalized),
            (self.measurement.is_some(), Stage::Measured),
            (self.correction.is_some(), Stage::Corrected),
            (self.stretch.is_some(), Stage::Stretched),
            (self.pivot.is_some(), Stage::Pivoted),
            (self.acquire.is_some(), Stage::Acquired),
        ];
        reached
            .into_iter()
            .find(|(done, _)| *done)
            .map(|(_, stage)| stage)
    }

    /// Result descriptor, once the artifact has been published.
    pub fn conform_result(&self) -> Option<ConformResult> {
        Some(ConformResult {
            job_id: self.job_id.clone(),
            artifact_id: self.artifact_id.clone()?,
            format: self.encode.as_ref()?.format,
            final_duration_ms: self.verified_duration_ms?,
            factor: self.stretch.as_ref()?.factor,
            factor_correction: self.correction.as_ref()?.factor,
            input_duration_ms: self.pivot.as_ref()?.duration_ms,
            post_norm_ms: self.normalize.as_ref()?.duration_ms,
        })
    }
}

/// Output from the Acquire step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquireOutput {
    pub path: PathBuf,
    pub bytes: u64,
}

/// A scratch signal file with its measured duration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalOutput {
    pub path: PathBuf,
    pub duration_ms: u64,
}

impl SignalOutput {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Output from a stretch pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StretchOutput {
    /// Duration factor applied (target / measured input of the pass).
    pub factor: f64,
    /// Tempo ratio requested from the engine.
    pub tempo: f64,
    pub signal: SignalOutput,
}

/// Output from the Fit step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitOutput {
    pub decision: DurationFit,
    /// Fitted signal; the normalized signal itself when no fit was needed.
    pub signal: SignalOutput,
}

/// Output from the Encode step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodeOutput {
    pub path: PathBuf,
    pub format: OutputFormat,
}

/// Result of executing a pipeline step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// Step completed successfully.
    Success,
    /// Step had nothing to do (not an error).
    Skipped(String),
}
