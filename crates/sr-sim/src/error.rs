//! Error types for simulation operations.

use thiserror::Error;

/// Errors encountered during transient simulation.
///
/// None of these are recoverable mid-run: the driver stops at the first one.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimError {
    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    #[error("Numeric divergence at t={t}: {what}")]
    NumericDivergence { what: String, t: f64 },

    #[error("Level out of range at t={t}: {what} = {level}")]
    OutOfRangeLevel { what: String, level: f64, t: f64 },

    #[error("Step size underflow at t={t}: dt={dt}")]
    StepSizeUnderflow { t: f64, dt: f64 },

    #[error("Step limit of {max_steps} exceeded at t={t}")]
    MaxStepsExceeded { t: f64, max_steps: usize },

    #[error("Model error: {message}")]
    Model { message: String },
}

impl SimError {
    /// True for failures that indicate the solution ran away rather than a
    /// bad setup or a guard violation.
    pub fn is_divergence(&self) -> bool {
        matches!(
            self,
            SimError::NumericDivergence { .. }
                | SimError::StepSizeUnderflow { .. }
                | SimError::MaxStepsExceeded { .. }
        )
    }
}

pub type SimResult<T> = Result<T, SimError>;
