//! Fit step - bring the normalized signal onto the exact target.

use crate::engine::{Encoding, EngineRequest};
use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{Context, FitOutput, JobState, StepOutcome};
use crate::planning::{DurationFitter, FitAction};

use super::{measure_signal, require_file, run_engine};

const FITTED_FILE: &str = "fitted.wav";

/// Trims or pads-then-trims; issues no request within tolerance.
#[derive(Debug, Default)]
pub struct FitStep;

impl FitStep {
    pub fn new() -> Self {
        Self
    }
}

impl PipelineStep for FitStep {
    fn name(&self) -> &str {
        "Fit"
    }

    fn description(&self) -> &str {
        "Trim or pad to the exact target"
    }

    fn validate_input(&self, _ctx: &Context, state: &JobState) -> StepResult<()> {
        state
            .normalize
            .as_ref()
            .map(|_| ())
            .ok_or_else(|| StepError::precondition_failed("normalized signal not recorded"))
    }

    fn execute(&self, ctx: &Context, state: &mut JobState) -> StepResult<StepOutcome> {
        let normalized = state
            .normalize
            .as_ref()
            .ok_or_else(|| StepError::precondition_failed("normalized signal not recorded"))?;

        let fitter = DurationFitter::new(ctx.settings.fitting.fit_tolerance());
        let decision = fitter.plan(normalized.duration_ms, ctx.target_ms());

        let chain = match decision.action.filter_chain() {
            Some(chain) => chain,
            None => {
                state.fit = Some(FitOutput {
                    decision,
                    signal: normalized.clone(),
                });
                return Ok(StepOutcome::Skipped(format!(
                    "delta {} ms within tolerance",
                    decision.delta_ms
                )));
            }
        };

        match decision.action {
            FitAction::Trim { .. } => ctx
                .logger
                .info(&format!("Trimming {} ms", -decision.delta_ms)),
            FitAction::PadThenTrim { pad_ms, .. } => {
                ctx.logger.info(&format!("Padding {} ms of silence", pad_ms))
            }
            FitAction::Keep => {}
        }

        let output = ctx.scratch_path(FITTED_FILE);
        run_engine(
            ctx,
            &EngineRequest::to_file(&normalized.path, chain, &output, Encoding::PivotPcm),
        )?;

        let signal = measure_signal(ctx, output)?;
        state.fit = Some(FitOutput { decision, signal });
        Ok(StepOutcome::Success)
    }

    fn validate_output(&self, _ctx: &Context, state: &JobState) -> StepResult<()> {
        match &state.fit {
            Some(fit) => require_file(fit.signal.path()),
            None => Err(StepError::invalid_output("fit not recorded")),
        }
    }
}
