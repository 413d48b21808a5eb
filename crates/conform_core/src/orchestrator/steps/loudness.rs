//! Measure and Normalize steps - two-pass loudness normalization.

use crate::engine::{Encoding, EngineRequest};
use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{Context, JobState, StepOutcome};
use crate::planning::{parse_measurement, LoudnessPlanner};

use super::{measure_signal, require_file, run_engine};

const NORMALIZED_FILE: &str = "normalized.wav";

fn planner(ctx: &Context) -> LoudnessPlanner {
    let loudness = &ctx.settings.loudness;
    LoudnessPlanner::new(loudness.target(), loudness.fade_ms)
}

/// Runs the measurement pass into a null sink and decodes its statistics.
#[derive(Debug, Default)]
pub struct MeasureStep;

impl MeasureStep {
    pub fn new() -> Self {
        Self
    }
}

impl PipelineStep for MeasureStep {
    fn name(&self) -> &str {
        "Measure"
    }

    fn description(&self) -> &str {
        "Measure loudness"
    }

    fn validate_input(&self, _ctx: &Context, state: &JobState) -> StepResult<()> {
        state
            .correction
            .as_ref()
            .map(|_| ())
            .ok_or_else(|| StepError::precondition_failed("corrected signal not recorded"))
    }

    fn execute(&self, ctx: &Context, state: &mut JobState) -> StepResult<StepOutcome> {
        let corrected = &state
            .correction
            .as_ref()
            .ok_or_else(|| StepError::precondition_failed("corrected signal not recorded"))?
            .signal;

        let request = EngineRequest::to_null(&corrected.path, planner(ctx).measurement_chain());
        let output = run_engine(ctx, &request)?;

        let measurement = parse_measurement(&output.stderr)?;
        ctx.logger.info(&format!(
            "Measured I={:.2} LUFS, LRA={:.2} LU, TP={:.2} dBTP",
            measurement.input_i, measurement.input_lra, measurement.input_tp
        ));

        state.measurement = Some(measurement);
        Ok(StepOutcome::Success)
    }

    fn validate_output(&self, _ctx: &Context, state: &JobState) -> StepResult<()> {
        match &state.measurement {
            Some(m) if m.input_i.is_finite() && m.input_tp.is_finite() => Ok(()),
            Some(_) => Err(StepError::invalid_output("non-finite loudness statistics")),
            None => Err(StepError::invalid_output("loudness measurement not recorded")),
        }
    }
}

/// Applies the corrective loudnorm pass with fades.
#[derive(Debug, Default)]
pub struct NormalizeStep;

impl NormalizeStep {
    pub fn new() -> Self {
        Self
    }
}

impl PipelineStep for NormalizeStep {
    fn name(&self) -> &str {
        "Normalize"
    }

    fn description(&self) -> &str {
        "Apply loudness correction and fades"
    }

    fn validate_input(&self, _ctx: &Context, state: &JobState) -> StepResult<()> {
        if state.correction.is_none() || state.measurement.is_none() {
            return Err(StepError::precondition_failed(
                "corrected signal and loudness measurement required",
            ));
        }
        Ok(())
    }

    fn execute(&self, ctx: &Context, state: &mut JobState) -> StepResult<StepOutcome> {
        let (corrected, measurement) = match (&state.correction, &state.measurement) {
            (Some(c), Some(m)) => (&c.signal, m),
            _ => {
                return Err(StepError::precondition_failed(
                    "corrected signal and loudness measurement required",
                ))
            }
        };

        let chain =
            planner(ctx).correction_chain(measurement, corrected.duration_ms, ctx.target_ms());
        let output = ctx.scratch_path(NORMALIZED_FILE);
        run_engine(
            ctx,
            &EngineRequest::to_file(&corrected.path, chain, &output, Encoding::PivotPcm),
        )?;

        let signal = measure_signal(ctx, output)?;
        ctx.logger
            .info(&format!("Post-normalization duration: {} ms", signal.duration_ms));
        state.normalize = Some(signal);
        Ok(StepOutcome::Success)
    }

    fn validate_output(&self, _ctx: &Context, state: &JobState) -> StepResult<()> {
        match &state.normalize {
            Some(signal) => require_file(signal.path()),
            None => Err(StepError::invalid_output("normalized signal not recorded")),
        }
    }
}
