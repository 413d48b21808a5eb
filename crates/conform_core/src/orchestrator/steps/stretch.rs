//! Stretch and Correct steps - the two tempo passes.
//!
//! The first pass applies the bounded primary factor. Its output is
//! measured, and the second pass applies `target / measured` to cancel the
//! drift the first pass introduced.

use crate::engine::{Encoding, EngineRequest, Filter, FilterChain};
use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{Context, JobState, StepOutcome, StretchOutput};
use crate::planning::{tempo_for_factor, StretchPlanner};

use super::{measure_signal, require_file, run_engine};

const STEP1_FILE: &str = "step1.wav";
const STEP2_FILE: &str = "step2.wav";

fn planner(ctx: &Context) -> StretchPlanner {
    StretchPlanner::new(ctx.settings.stretch.bounds())
}

/// Primary stretch: `F = target / input`, rejected outside the bounds.
#[derive(Debug, Default)]
pub struct StretchStep;

impl StretchStep {
    pub fn new() -> Self {
        Self
    }
}

impl PipelineStep for StretchStep {
    fn name(&self) -> &str {
        "Stretch"
    }

    fn description(&self) -> &str {
        "Apply the primary tempo stretch"
    }

    fn validate_input(&self, _ctx: &Context, state: &JobState) -> StepResult<()> {
        state
            .pivot
            .as_ref()
            .map(|_| ())
            .ok_or_else(|| StepError::precondition_failed("pivot signal not recorded"))
    }

    fn execute(&self, ctx: &Context, state: &mut JobState) -> StepResult<StepOutcome> {
        let pivot = state
            .pivot
            .as_ref()
            .ok_or_else(|| StepError::precondition_failed("pivot signal not recorded"))?;

        // Bounds are checked before any stretch request is issued
        let factor = planner(ctx).primary_factor(pivot.duration_ms, ctx.target_ms())?;
        let tempo = tempo_for_factor(factor);
        ctx.logger.info(&format!(
            "Stretch factor {:.6} ({} ms -> {} ms), tempo {:.8}",
            factor,
            pivot.duration_ms,
            ctx.target_ms(),
            tempo
        ));

        let output = ctx.scratch_path(STEP1_FILE);
        let chain = FilterChain::new()
            .with(Filter::pivot_format())
            .with(Filter::Tempo(tempo));
        run_engine(
            ctx,
            &EngineRequest::to_file(&pivot.path, chain, &output, Encoding::PivotPcm),
        )?;

        let signal = measure_signal(ctx, output)?;
        state.stretch = Some(StretchOutput {
            factor,
            tempo,
            signal,
        });
        Ok(StepOutcome::Success)
    }

    fn validate_output(&self, _ctx: &Context, state: &JobState) -> StepResult<()> {
        match &state.stretch {
            Some(out) => require_file(out.signal.path()),
            None => Err(StepError::invalid_output("stretch pass not recorded")),
        }
    }
}

/// Corrective stretch from the measured first-pass duration.
///
/// Always runs, even when the measured drift is zero.
#[derive(Debug, Default)]
pub struct CorrectStep;

impl CorrectStep {
    pub fn new() -> Self {
        Self
    }
}

impl PipelineStep for CorrectStep {
    fn name(&self) -> &str {
        "Correct"
    }

    fn description(&self) -> &str {
        "Apply the corrective tempo stretch"
    }

    fn validate_input(&self, _ctx: &Context, state: &JobState) -> StepResult<()> {
        state
            .stretch
            .as_ref()
            .map(|_| ())
            .ok_or_else(|| StepError::precondition_failed("stretch pass not recorded"))
    }

    fn execute(&self, ctx: &Context, state: &mut JobState) -> StepResult<StepOutcome> {
        let step1 = &state
            .stretch
            .as_ref()
            .ok_or_else(|| StepError::precondition_failed("stretch pass not recorded"))?
            .signal;

        let factor = planner(ctx).correction_factor(step1.duration_ms, ctx.target_ms())?;
        let tempo = tempo_for_factor(factor);
        ctx.logger.info(&format!(
            "Correction factor {:.6} (measured {} ms)",
            factor, step1.duration_ms
        ));

        let output = ctx.scratch_path(STEP2_FILE);
        let chain = FilterChain::new().with(Filter::Tempo(tempo));
        run_engine(
            ctx,
            &EngineRequest::to_file(&step1.path, chain, &output, Encoding::PivotPcm),
        )?;

        let signal = measure_signal(ctx, output)?;
        state.correction = Some(StretchOutput {
            factor,
            tempo,
            signal,
        });
        Ok(StepOutcome::Success)
    }

    fn validate_output(&self, _ctx: &Context, state: &JobState) -> StepResult<()> {
        match &state.correction {
            Some(out) => require_file(out.signal.path()),
            None => Err(StepError::invalid_output("correction pass not recorded")),
        }
    }
}
