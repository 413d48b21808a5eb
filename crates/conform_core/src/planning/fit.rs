//! Exact-duration fitting and final verification.
//!
//! Fitting never invents content: lengthening appends silence, shortening is
//! a hard cut. Padding is always followed by the same trim so pad rounding
//! cannot overshoot the target.

use serde::{Deserialize, Serialize};

use crate::engine::{Filter, FilterChain};

/// Widest no-op window for fitting. Settings may only narrow it.
pub const FIT_TOLERANCE_MS: u64 = 2;

/// Widest tolerance for the final integrity check.
pub const VERIFY_TOLERANCE_MS: u64 = 1;

/// What the fitter decided to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum FitAction {
    /// Within tolerance; no request is issued.
    Keep,
    /// Signal too long: cut to `[0, target]`.
    Trim { target_ms: u64 },
    /// Signal too short: append `pad_ms` of silence, then cut to `[0, target]`.
    PadThenTrim { pad_ms: u64, target_ms: u64 },
}

impl FitAction {
    /// Filter chain for this action, or `None` for `Keep`.
    pub fn filter_chain(&self) -> Option<FilterChain> {
        match *self {
            FitAction::Keep => None,
            FitAction::Trim { target_ms } => Some(
                FilterChain::new()
                    .with(Filter::Trim {
                        end_secs: ms_to_secs(target_ms),
                    })
                    .with(Filter::RebaseTimestamps),
            ),
            FitAction::PadThenTrim { pad_ms, target_ms } => Some(
                FilterChain::new()
                    .with(Filter::Pad {
                        duration_secs: ms_to_secs(pad_ms),
                    })
                    .with(Filter::Trim {
                        end_secs: ms_to_secs(target_ms),
                    })
                    .with(Filter::RebaseTimestamps),
            ),
        }
    }
}

/// Fit decision with the delta that drove it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DurationFit {
    /// `target - measured`, in milliseconds.
    pub delta_ms: i64,
    pub action: FitAction,
}

/// Decides how to bring a measured duration onto the target.
#[derive(Debug, Clone)]
pub struct DurationFitter {
    tolerance_ms: u64,
}

impl Default for DurationFitter {
    fn default() -> Self {
        Self::new(FIT_TOLERANCE_MS)
    }
}

impl DurationFitter {
    pub fn new(tolerance_ms: u64) -> Self {
        Self { tolerance_ms }
    }

    pub fn plan(&self, measured_ms: u64, target_ms: u64) -> DurationFit {
        let delta_ms = target_ms as i64 - measured_ms as i64;

        let action = if delta_ms.unsigned_abs() <= self.tolerance_ms {
            FitAction::Keep
        } else if delta_ms < 0 {
            FitAction::Trim { target_ms }
        } else {
            FitAction::PadThenTrim {
                pad_ms: delta_ms as u64,
                target_ms,
            }
        };

        DurationFit { delta_ms, action }
    }
}

/// Signed deviation `actual - target` when it exceeds `tolerance_ms`.
pub fn check_final_duration(actual_ms: u64, target_ms: u64, tolerance_ms: u64) -> Result<(), i64> {
    let deviation = actual_ms as i64 - target_ms as i64;
    if deviation.unsigned_abs() > tolerance_ms {
        return Err(deviation);
    }
    Ok(())
}

fn ms_to_secs(ms: u64) -> f64 {
    ms as f64 / 1000.0
}
