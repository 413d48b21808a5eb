//! Publish step - hand the verified artifact to the result store.

use std::fs;

use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{Context, JobState, StepOutcome};

#[derive(Debug, Default)]
pub struct PublishStep;

impl PublishStep {
    pub fn new() -> Self {
        Self
    }
}

impl PipelineStep for PublishStep {
    fn name(&self) -> &str {
        "Publish"
    }

    fn description(&self) -> &str {
        "Store the verified artifact"
    }

    fn validate_input(&self, _ctx: &Context, state: &JobState) -> StepResult<()> {
        if state.verified_duration_ms.is_none() {
            return Err(StepError::precondition_failed(
                "artifact has not been verified",
            ));
        }
        Ok(())
    }

    fn execute(&self, ctx: &Context, state: &mut JobState) -> StepResult<StepOutcome> {
        let encoded = state
            .encode
            .as_ref()
            .ok_or_else(|| StepError::precondition_failed("encoded artifact not recorded"))?;

        let bytes =
            fs::read(&encoded.path).map_err(|e| StepError::io_error("reading artifact", e))?;
        let label = ctx.target_ms().to_string();
        let id = ctx.store.put(&bytes, encoded.format, &label)?;

        ctx.logger.success(&format!("Published {}", id));
        state.artifact_id = Some(id);
        Ok(StepOutcome::Success)
    }

    fn validate_output(&self, _ctx: &Context, state: &JobState) -> StepResult<()> {
        match &state.artifact_id {
            Some(id) if !id.is_empty() => Ok(()),
            _ => Err(StepError::invalid_output("artifact id not recorded")),
        }
    }
}
