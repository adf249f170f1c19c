//! Nominal sample period for the flow controllers.
//!
//! The integrator probes the network at times of its own choosing, so engine
//! bookkeeping never looks at integrator time. Every `step` advances the
//! controller by exactly one configured period.

use crate::error::{ControlError, ControlResult};
use serde::{Deserialize, Serialize};

/// Sample configuration for a controller.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SampleConfig {
    /// Sample period in time units.
    pub dt: f64,
}

impl SampleConfig {
    /// Create a new sample configuration.
    ///
    /// # Errors
    ///
    /// Returns error if `dt` is not positive and finite.
    pub fn new(dt: f64) -> ControlResult<Self> {
        if !(dt.is_finite() && dt > 0.0) {
            return Err(ControlError::InvalidArg {
                what: "sample period must be positive and finite",
            });
        }
        Ok(Self { dt })
    }
}

impl Default for SampleConfig {
    fn default() -> Self {
        Self { dt: 1.0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_config_creation() {
        let config = SampleConfig::new(0.1).unwrap();
        assert_eq!(config.dt, 0.1);
    }

    #[test]
    fn default_period_is_one() {
        assert_eq!(SampleConfig::default().dt, 1.0);
    }

    #[test]
    fn rejects_non_positive_period() {
        assert!(SampleConfig::new(0.0).is_err());
        assert!(SampleConfig::new(-1.0).is_err());
        assert!(SampleConfig::new(f64::NAN).is_err());
    }
}
