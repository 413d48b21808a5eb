//! External media engine boundary.
//!
//! The pipeline never touches samples itself. It describes transforms as
//! typed `EngineRequest`s and hands them to a `MediaTransform`, and it asks
//! a `MediaProbe` for durations of the files produced.
//!
//! # Architecture
//!
//! ```text
//! MediaEngine = MediaProbe + MediaTransform
//!     ├── FfmpegEngine     (ffmpeg / ffprobe child processes)
//!     └── ScriptedEngine   (deterministic simulation for tests)
//! ```

mod ffmpeg;
mod filters;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
mod types;

use std::path::Path;

pub use ffmpeg::{parse_duration_ms, FfmpegEngine};
pub use filters::{
    FadeKind, Filter, FilterChain, LoudnormParams, PrintFormat, PIVOT_CHANNELS,
    PIVOT_CHANNEL_LAYOUT, PIVOT_SAMPLE_RATE,
};
pub use types::{Encoding, EngineError, EngineOutput, EngineRequest, EngineResult, OutputTarget};

/// Queries the duration of a media asset.
pub trait MediaProbe: Send + Sync {
    /// Duration of the file in whole milliseconds.
    fn duration_ms(&self, path: &Path) -> EngineResult<u64>;
}

/// Runs one filter/encode request.
pub trait MediaTransform: Send + Sync {
    /// Execute the request, returning captured output on success.
    ///
    /// A non-success exit status is an error carrying the diagnostic text.
    fn transform(&self, request: &EngineRequest) -> EngineResult<EngineOutput>;
}

/// Everything the pipeline needs from the engine.
pub trait MediaEngine: MediaProbe + MediaTransform {}

impl<T: MediaProbe + MediaTransform> MediaEngine for T {}
