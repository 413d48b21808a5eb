//! Encode and Verify steps - produce the deliverable and check its length.

use std::fs;

use crate::engine::{Encoding, EngineRequest, FilterChain, MediaProbe};
use crate::models::OutputFormat;
use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{Context, EncodeOutput, JobState, StepOutcome};
use crate::planning::check_final_duration;

use super::{require_file, run_engine};

/// Encodes to the requested format (mp3 via the engine, wav as a copy).
#[derive(Debug, Default)]
pub struct EncodeStep;

impl EncodeStep {
    pub fn new() -> Self {
        Self
    }
}

impl PipelineStep for EncodeStep {
    fn name(&self) -> &str {
        "Encode"
    }

    fn description(&self) -> &str {
        "Encode the deliverable"
    }

    fn validate_input(&self, _ctx: &Context, state: &JobState) -> StepResult<()> {
        state
            .fit
            .as_ref()
            .map(|_| ())
            .ok_or_else(|| StepError::precondition_failed("fitted signal not recorded"))
    }

    fn execute(&self, ctx: &Context, state: &mut JobState) -> StepResult<StepOutcome> {
        let fitted = &state
            .fit
            .as_ref()
            .ok_or_else(|| StepError::precondition_failed("fitted signal not recorded"))?
            .signal;

        let format = ctx.request.format_out;
        let output = ctx.scratch_path(&format!("final.{}", format.extension()));

        match format {
            OutputFormat::Mp3 => {
                let encoding = Encoding::Mp3 {
                    bitrate_kbps: ctx.request.bitrate_kbps,
                };
                ctx.logger.info(&format!(
                    "Encoding mp3 at {} kbps",
                    ctx.request.bitrate_kbps
                ));
                run_engine(
                    ctx,
                    &EngineRequest::to_file(&fitted.path, FilterChain::new(), &output, encoding),
                )?;
            }
            OutputFormat::Wav => {
                fs::copy(&fitted.path, &output)
                    .map_err(|e| StepError::io_error("copying wav output", e))?;
            }
        }

        state.encode = Some(EncodeOutput {
            path: output,
            format,
        });
        Ok(StepOutcome::Success)
    }

    fn validate_output(&self, _ctx: &Context, state: &JobState) -> StepResult<()> {
        match &state.encode {
            Some(encoded) => require_file(&encoded.path),
            None => Err(StepError::invalid_output("encoded artifact not recorded")),
        }
    }
}

/// Re-measures the encoded artifact against the target.
#[derive(Debug, Default)]
pub struct VerifyStep;

impl VerifyStep {
    pub fn new() -> Self {
        Self
    }
}

impl PipelineStep for VerifyStep {
    fn name(&self) -> &str {
        "Verify"
    }

    fn description(&self) -> &str {
        "Verify the final duration"
    }

    fn validate_input(&self, _ctx: &Context, state: &JobState) -> StepResult<()> {
        state
            .encode
            .as_ref()
            .map(|_| ())
            .ok_or_else(|| StepError::precondition_failed("encoded artifact not recorded"))
    }

    fn execute(&self, ctx: &Context, state: &mut JobState) -> StepResult<StepOutcome> {
        let encoded = state
            .encode
            .as_ref()
            .ok_or_else(|| StepError::precondition_failed("encoded artifact not recorded"))?;

        let actual_ms = ctx.engine.duration_ms(&encoded.path)?;
        let target_ms = ctx.target_ms();

        check_final_duration(actual_ms, target_ms, ctx.settings.fitting.verify_tolerance())
            .map_err(|deviation| StepError::integrity(actual_ms, target_ms, deviation))?;

        ctx.logger.validation(&format!(
            "Final duration {} ms (target {} ms)",
            actual_ms, target_ms
        ));
        state.verified_duration_ms = Some(actual_ms);
        Ok(StepOutcome::Success)
    }

    fn validate_output(&self, _ctx: &Context, state: &JobState) -> StepResult<()> {
        state
            .verified_duration_ms
            .map(|_| ())
            .ok_or_else(|| StepError::invalid_output("final duration not recorded"))
    }
}
