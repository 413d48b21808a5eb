//! Numeric planning for the conform pipeline.
//!
//! Pure functions and small planners that the orchestrator steps compose:
//!
//! 1. **Stretch** (`stretch`): primary factor with safety bounds, and the
//!    corrective factor computed from the measured first-pass output.
//! 2. **Loudness** (`loudness`): measurement chain, statistics parsing and
//!    the corrective `linear=true` chain with fades.
//! 3. **Fit** (`fit`): trim / pad-then-trim policy and the final integrity
//!    check.

mod fit;
mod loudness;
mod stretch;

pub use fit::{
    check_final_duration, DurationFit, DurationFitter, FitAction, FIT_TOLERANCE_MS,
    VERIFY_TOLERANCE_MS,
};
pub use loudness::{
    find_stats_block, parse_measurement, LoudnessError, LoudnessMeasurement, LoudnessPlanner,
    LoudnessTarget, DEFAULT_FADE_MS,
};
pub use stretch::{
    tempo_for_factor, StretchBounds, StretchError, StretchPlanner, MAX_STRETCH_FACTOR,
    MIN_STRETCH_FACTOR,
};
