//! Pipeline step trait definition.

use super::errors::StepResult;
use super::types::{Context, JobState, StepOutcome};

/// Trait for pipeline steps.
///
/// The pipeline runner calls these methods in order:
///
/// 1. `validate_input` - Check that earlier steps recorded what this one needs
/// 2. `execute` - Perform the step's work and record its output in `state`
/// 3. `validate_output` - Verify the recorded output (only after `Success`)
///
/// # Example
///
/// ```ignore
/// struct MeasureStep;
///
/// impl PipelineStep for MeasureStep {
///     fn name(&self) -> &str { "Measure" }
///
///     fn validate_input(&self, _ctx: &Context, state: &JobState) -> StepResult<()> {
///         state.correction.as_ref().map(|_| ()).ok_or_else(|| {
///             StepError::precondition_failed("corrected signal not recorded")
///         })
///     }
///
///     fn execute(&self, ctx: &Context, state: &mut JobState) -> StepResult<StepOutcome> {
///         state.measurement = Some(/* ... */);
///         Ok(StepOutcome::Success)
///     }
///
///     fn validate_output(&self, _ctx: &Context, state: &JobState) -> StepResult<()> {
///         Ok(())
///     }
/// }
/// ```
pub trait PipelineStep: Send + Sync {
    /// Step name (for logging and error context).
    fn name(&self) -> &str;

    /// Check preconditions before execution.
    fn validate_input(&self, ctx: &Context, state: &JobState) -> StepResult<()>;

    /// Execute the step's main work.
    ///
    /// Returns `StepOutcome::Skipped` when there was nothing to do; the
    /// step must still record whatever later steps read.
    fn execute(&self, ctx: &Context, state: &mut JobState) -> StepResult<StepOutcome>;

    /// Validate outputs after a `Success` execution.
    fn validate_output(&self, ctx: &Context, state: &JobState) -> StepResult<()>;

    /// Human-readable description of what this step does.
    fn description(&self) -> &str {
        self.name()
    }
}
