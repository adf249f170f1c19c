//! Error types for the plant model.

use sr_controls::ControlError;
use sr_sim::SimError;

/// Errors raised while building or running the plant model.
#[derive(Debug, thiserror::Error)]
pub enum PlantError {
    #[error("Invalid configuration: {what}")]
    InvalidConfig { what: String },

    #[error("Control error: {0}")]
    Control(#[from] ControlError),

    #[error("Simulation error: {0}")]
    Simulation(#[from] SimError),
}

pub type PlantResult<T> = Result<T, PlantError>;

impl PlantError {
    /// Rejected before any integration took place.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            PlantError::InvalidConfig { .. }
                | PlantError::Control(ControlError::Configuration { .. })
                | PlantError::Control(ControlError::InvalidArg { .. })
                | PlantError::Simulation(SimError::InvalidArg { .. })
        )
    }

    /// The integration ran away (NaN/Inf, step collapse, step limit).
    pub fn is_divergence(&self) -> bool {
        matches!(self, PlantError::Simulation(e) if e.is_divergence())
    }
}
