//! Acquire and Pivot steps - bring the source clip into the scratch
//! directory and convert it to the pivot format.

use crate::engine::{Encoding, EngineRequest, FilterChain};
use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{AcquireOutput, Context, JobState, StepOutcome};

use super::{measure_signal, require_file, run_engine};

const SOURCE_FILE: &str = "source";
const PIVOT_FILE: &str = "pivot.wav";

/// Fetches the request's source locator into scratch.
#[derive(Debug, Default)]
pub struct AcquireStep;

impl AcquireStep {
    pub fn new() -> Self {
        Self
    }
}

impl PipelineStep for AcquireStep {
    fn name(&self) -> &str {
        "Acquire"
    }

    fn description(&self) -> &str {
        "Download the source clip"
    }

    fn validate_input(&self, ctx: &Context, _state: &JobState) -> StepResult<()> {
        if !ctx.work_dir.is_dir() {
            return Err(StepError::precondition_failed(format!(
                "scratch directory {} missing",
                ctx.work_dir.display()
            )));
        }
        Ok(())
    }

    fn execute(&self, ctx: &Context, state: &mut JobState) -> StepResult<StepOutcome> {
        let path = ctx.scratch_path(SOURCE_FILE);
        ctx.logger.info(&format!("Fetching {}", ctx.request.audio_url));

        let bytes = ctx.fetcher.fetch(&ctx.request.audio_url, &path)?;
        ctx.logger.info(&format!("Fetched {} bytes", bytes));

        state.acquire = Some(AcquireOutput { path, bytes });
        Ok(StepOutcome::Success)
    }

    fn validate_output(&self, _ctx: &Context, state: &JobState) -> StepResult<()> {
        match &state.acquire {
            Some(acquired) => require_file(&acquired.path),
            None => Err(StepError::invalid_output("source not recorded")),
        }
    }
}

/// Converts the source to mono 48 kHz 32-bit float and measures it.
#[derive(Debug, Default)]
pub struct PivotStep;

impl PivotStep {
    pub fn new() -> Self {
        Self
    }
}

impl PipelineStep for PivotStep {
    fn name(&self) -> &str {
        "Pivot"
    }

    fn description(&self) -> &str {
        "Decode to the pivot format"
    }

    fn validate_input(&self, _ctx: &Context, state: &JobState) -> StepResult<()> {
        state
            .acquire
            .as_ref()
            .map(|_| ())
            .ok_or_else(|| StepError::precondition_failed("source clip not acquired"))
    }

    fn execute(&self, ctx: &Context, state: &mut JobState) -> StepResult<StepOutcome> {
        let source = state
            .acquire
            .as_ref()
            .ok_or_else(|| StepError::precondition_failed("source clip not acquired"))?;

        let output = ctx.scratch_path(PIVOT_FILE);
        let request =
            EngineRequest::to_file(&source.path, FilterChain::new(), &output, Encoding::PivotPcm);
        run_engine(ctx, &request)?;

        let signal = measure_signal(ctx, output)?;
        ctx.logger
            .info(&format!("Input duration: {} ms", signal.duration_ms));
        state.pivot = Some(signal);
        Ok(StepOutcome::Success)
    }

    fn validate_output(&self, _ctx: &Context, state: &JobState) -> StepResult<()> {
        match &state.pivot {
            Some(signal) => require_file(signal.path()),
            None => Err(StepError::invalid_output("pivot signal not recorded")),
        }
    }
}
