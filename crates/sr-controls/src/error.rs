//! Error types for control system operations.

use thiserror::Error;

/// Result type for control system operations.
pub type ControlResult<T> = Result<T, ControlError>;

/// Errors that can occur in control system operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ControlError {
    /// Invalid argument provided to a control function.
    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    /// Limits or level windows that cannot describe a valid controller.
    #[error("Configuration error: {what}")]
    Configuration { what: &'static str },

    /// Controller produced a value that is not a finite number.
    #[error("Non-finite controller output on {channel}: {value}")]
    NonFinite { channel: &'static str, value: f64 },
}
