//! Pipeline orchestrator for conform jobs.
//!
//! A job is a fixed sequence of steps. Each step validates what it needs
//! from the `JobState`, runs, and records its output for the next one.
//!
//! # Architecture
//!
//! ```text
//! Pipeline
//!     ├── Step: Acquire    (fetch source)
//!     ├── Step: Pivot      (decode to float mono 48 kHz)
//!     ├── Step: Stretch    (tempo 1/F)
//!     ├── Step: Correct    (residual tempo)
//!     ├── Step: Measure    (loudnorm pass 1)
//!     ├── Step: Normalize  (loudnorm pass 2 + fades)
//!     ├── Step: Fit        (pad/trim to target)
//!     ├── Step: Encode
//!     ├── Step: Verify
//!     └── Step: Publish
//! ```
//!
//! # Example
//!
//! ```ignore
//! use conform_core::orchestrator::{create_standard_pipeline, Context, JobState};
//!
//! let ctx = Context::new(request, settings, "job", work_dir, engine, fetcher, store, logger);
//! let mut state = JobState::new("job-123");
//! let run = create_standard_pipeline().run(&ctx, &mut state)?;
//! println!("Completed: {:?}", run.steps_completed);
//! ```

mod errors;
mod pipeline;
mod service;
mod step;
pub mod steps;
mod types;

pub use errors::{ErrorKind, PipelineError, PipelineResult, StepError, StepResult};
pub use pipeline::{Pipeline, PipelineRunResult};
pub use service::ConformService;
pub use step::PipelineStep;
pub use steps::{
    AcquireStep, CorrectStep, EncodeStep, FitStep, MeasureStep, NormalizeStep, PivotStep,
    PublishStep, StretchStep, VerifyStep,
};
pub use types::{
    AcquireOutput, Context, EncodeOutput, FitOutput, JobState, ProgressCallback, SignalOutput,
    Stage, StepOutcome, StretchOutput,
};

/// Create the standard conform pipeline.
///
/// Steps run in this order:
/// 1. Acquire - fetch the source into scratch
/// 2. Pivot - decode to the working representation
/// 3. Stretch - primary tempo change toward the target
/// 4. Correct - residual tempo change from the measured length
/// 5. Measure - loudness analysis
/// 6. Normalize - linear loudness correction with edge fades
/// 7. Fit - pad and/or trim to the exact target
/// 8. Encode - produce the requested format
/// 9. Verify - re-measure the artifact
/// 10. Publish - hand the artifact to the result store
pub fn create_standard_pipeline() -> Pipeline {
    Pipeline::new()
        .with_step(AcquireStep::new())
        .with_step(PivotStep::new())
        .with_step(StretchStep::new())
        .with_step(CorrectStep::new())
        .with_step(MeasureStep::new())
        .with_step(NormalizeStep::new())
        .with_step(FitStep::new())
        .with_step(EncodeStep::new())
        .with_step(VerifyStep::new())
        .with_step(PublishStep::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_pipeline_order() {
        let pipeline = create_standard_pipeline();
        assert_eq!(
            pipeline.step_names(),
            vec![
                "Acquire", "Pivot", "Stretch", "Correct", "Measure", "Normalize", "Fit",
                "Encode", "Verify", "Publish"
            ]
        );
    }
}
