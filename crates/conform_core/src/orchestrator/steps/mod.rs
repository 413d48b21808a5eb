//! Pipeline step implementations.
//!
//! Each step is a separate module implementing the `PipelineStep` trait.
//! Steps that invoke the engine go through `run_engine` so every
//! invocation is logged the same way and its diagnostics land in the
//! logger's tail buffer.

mod acquire;
mod encode;
mod fit;
mod loudness;
mod publish;
mod stretch;

pub use acquire::{AcquireStep, PivotStep};
pub use encode::{EncodeStep, VerifyStep};
pub use fit::FitStep;
pub use loudness::{MeasureStep, NormalizeStep};
pub use publish::PublishStep;
pub use stretch::{CorrectStep, StretchStep};

use std::path::{Path, PathBuf};

use crate::engine::{EngineError, EngineOutput, EngineRequest, MediaProbe, MediaTransform};
use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::types::{Context, SignalOutput};

/// Run one engine request, logging the command and its diagnostics.
pub(crate) fn run_engine(ctx: &Context, request: &EngineRequest) -> StepResult<EngineOutput> {
    ctx.logger.command(&request.describe());

    match ctx.engine.transform(request) {
        Ok(output) => {
            ctx.logger.output_lines(&output.stderr);
            Ok(output)
        }
        Err(e) => {
            if let EngineError::CommandFailed { ref stderr, .. } = e {
                ctx.logger.output_lines(stderr);
            }
            ctx.logger.show_tail("engine");
            Err(StepError::Engine(e))
        }
    }
}

/// Measure a freshly written scratch file.
pub(crate) fn measure_signal(ctx: &Context, path: PathBuf) -> StepResult<SignalOutput> {
    let duration_ms = ctx.engine.duration_ms(&path)?;
    ctx.logger
        .debug(&format!("{}: {} ms", display_name(&path), duration_ms));
    Ok(SignalOutput { path, duration_ms })
}

/// Output validation shared by the signal-producing steps.
pub(crate) fn require_file(path: &Path) -> StepResult<()> {
    if !path.is_file() {
        return Err(StepError::invalid_output(format!(
            "{} was not written",
            path.display()
        )));
    }
    Ok(())
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}
