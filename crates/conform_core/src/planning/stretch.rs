//! Stretch factor planning.
//!
//! The stretch factor is the duration ratio `target / measured`. The engine's
//! tempo filter works in the inverse direction (a tempo of 2.0 halves the
//! duration), so the tempo requested for a factor `F` is `1 / F`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Smallest accepted primary factor.
pub const MIN_STRETCH_FACTOR: f64 = 0.80;

/// Largest accepted primary factor.
pub const MAX_STRETCH_FACTOR: f64 = 1.25;

/// Errors from stretch planning.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StretchError {
    #[error("Stretch factor {factor:.3} outside [{min},{max}]")]
    OutOfBounds { factor: f64, min: f64, max: f64 },

    #[error("Cannot stretch a {what} of zero duration")]
    ZeroDuration { what: &'static str },
}

/// Inclusive bounds on the primary stretch factor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StretchBounds {
    pub min: f64,
    pub max: f64,
}

impl Default for StretchBounds {
    fn default() -> Self {
        Self {
            min: MIN_STRETCH_FACTOR,
            max: MAX_STRETCH_FACTOR,
        }
    }
}

impl StretchBounds {
    pub fn contains(&self, factor: f64) -> bool {
        self.min <= factor && factor <= self.max
    }
}

/// Computes primary and corrective stretch factors.
#[derive(Debug, Clone, Default)]
pub struct StretchPlanner {
    bounds: StretchBounds,
}

impl StretchPlanner {
    pub fn new(bounds: StretchBounds) -> Self {
        Self { bounds }
    }

    pub fn bounds(&self) -> StretchBounds {
        self.bounds
    }

    /// Primary factor `target / input`, rejected outside the bounds.
    ///
    /// No clamping: a factor outside the window is a hard failure.
    pub fn primary_factor(&self, input_ms: u64, target_ms: u64) -> Result<f64, StretchError> {
        if input_ms == 0 {
            return Err(StretchError::ZeroDuration { what: "source" });
        }

        let factor = target_ms as f64 / input_ms as f64;
        if !self.bounds.contains(factor) {
            return Err(StretchError::OutOfBounds {
                factor,
                min: self.bounds.min,
                max: self.bounds.max,
            });
        }

        Ok(factor)
    }

    /// Corrective factor `target / measured_step1`.
    ///
    /// Never bounds-checked; drift it fails to remove is caught by the
    /// final duration verification.
    pub fn correction_factor(&self, step1_ms: u64, target_ms: u64) -> Result<f64, StretchError> {
        if step1_ms == 0 {
            return Err(StretchError::ZeroDuration {
                what: "first stretch pass",
            });
        }
        Ok(target_ms as f64 / step1_ms as f64)
    }
}

/// Tempo ratio to request from the engine for a duration factor.
pub fn tempo_for_factor(factor: f64) -> f64 {
    1.0 / factor
}
