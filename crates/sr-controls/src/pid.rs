//! PID engine used by every flow channel.
//!
//! The engine is positional: each `step` produces an absolute output
//!
//! `u = Kc·e + I + D`, with `I += Ki·e·dt` and `D = -Kd·Δmeasurement/dt`
//!
//! where `e = setpoint - measurement` and `dt` is the nominal sample period.
//! The engine includes:
//! - Output clamping
//! - Anti-windup (integral clamped into the output limits)
//! - Derivative on measurement (no kick on setpoint changes)
//! - Sampled operation at a fixed period, independent of integrator time

use crate::error::{ControlError, ControlResult};
use crate::sampled::SampleConfig;
use serde::{Deserialize, Serialize};

/// Controller gains.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tunings {
    /// Proportional gain.
    pub kc: f64,
    /// Integral gain (per time unit).
    pub ki: f64,
    /// Derivative gain (time units).
    pub kd: f64,
}

impl Tunings {
    pub const fn new(kc: f64, ki: f64, kd: f64) -> Self {
        Self { kc, ki, kd }
    }

    /// Reject gains that are not finite numbers.
    pub fn validate(&self) -> ControlResult<()> {
        if !(self.kc.is_finite() && self.ki.is_finite() && self.kd.is_finite()) {
            return Err(ControlError::InvalidArg {
                what: "tunings must be finite",
            });
        }
        Ok(())
    }
}

impl Default for Tunings {
    /// Unit PI tuning used on every channel of the line.
    fn default() -> Self {
        Self::new(1.0, 1.0, 0.0)
    }
}

/// Closed `[low, high]` range for the controller output.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OutputLimits {
    low: f64,
    high: f64,
}

impl OutputLimits {
    /// Create output limits.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `low > high` or either bound is NaN.
    /// Infinite bounds are allowed and mean "unbounded on that side".
    pub fn new(low: f64, high: f64) -> ControlResult<Self> {
        if low.is_nan() || high.is_nan() {
            return Err(ControlError::Configuration {
                what: "output limits must not be NaN",
            });
        }
        if low > high {
            return Err(ControlError::Configuration {
                what: "output limit low must not exceed high",
            });
        }
        Ok(Self { low, high })
    }

    pub fn low(&self) -> f64 {
        self.low
    }

    pub fn high(&self) -> f64 {
        self.high
    }

    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.low, self.high)
    }

    pub fn contains(&self, value: f64) -> bool {
        (self.low..=self.high).contains(&value)
    }
}

/// Mutable controller state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PidState {
    /// Integral accumulator, already multiplied by `Ki`.
    pub integral: f64,
    /// Measurement seen by the previous step.
    pub last_input: Option<f64>,
    /// Output produced by the previous step.
    pub last_output: Option<f64>,
    /// Number of steps taken since construction or reset.
    pub steps: u64,
}

/// Stateful PID controller stepped at a fixed sample period.
#[derive(Debug, Clone, PartialEq)]
pub struct PidEngine {
    tunings: Tunings,
    limits: Option<OutputLimits>,
    sample: SampleConfig,
    setpoint: f64,
    state: PidState,
}

impl PidEngine {
    /// Create an engine with default tunings, no output limits and a zero setpoint.
    pub fn new(sample: SampleConfig) -> Self {
        Self {
            tunings: Tunings::default(),
            limits: None,
            sample,
            setpoint: 0.0,
            state: PidState::default(),
        }
    }

    /// Install tunings and, when given, output limits.
    ///
    /// `None` keeps whatever limits the engine already carries; a fresh
    /// engine carries none. Installing limits clamps the integral and the
    /// last output into the new range straight away.
    pub fn configure(&mut self, tunings: Tunings, limits: Option<OutputLimits>) {
        self.tunings = tunings;
        if let Some(limits) = limits {
            self.set_output_limits(limits);
        }
    }

    pub fn set_output_limits(&mut self, limits: OutputLimits) {
        self.state.integral = limits.clamp(self.state.integral);
        self.state.last_output = self.state.last_output.map(|u| limits.clamp(u));
        self.limits = Some(limits);
    }

    pub fn clear_output_limits(&mut self) {
        self.limits = None;
    }

    pub fn set_setpoint(&mut self, setpoint: f64) {
        self.setpoint = setpoint;
    }

    /// Advance the controller by one sample period and return the new output.
    pub fn step(&mut self, measurement: f64) -> f64 {
        let dt = self.sample.dt;
        let Tunings { kc, ki, kd } = self.tunings;

        let error = self.setpoint - measurement;
        let p_term = kc * error;

        // Anti-windup: the integral may never leave the output range.
        let mut integral = self.state.integral + ki * error * dt;
        if let Some(limits) = self.limits {
            integral = limits.clamp(integral);
        }

        let d_term = match self.state.last_input {
            Some(prev) if kd != 0.0 => -kd * (measurement - prev) / dt,
            _ => 0.0,
        };

        let output_raw = p_term + integral + d_term;
        let output = match self.limits {
            Some(limits) => limits.clamp(output_raw),
            None => output_raw,
        };

        self.state.integral = integral;
        self.state.last_input = Some(measurement);
        self.state.last_output = Some(output);
        self.state.steps += 1;
        output
    }

    /// Clear accumulated state; tunings, limits and setpoint are kept.
    pub fn reset(&mut self) {
        self.state = PidState::default();
    }

    pub fn tunings(&self) -> Tunings {
        self.tunings
    }

    pub fn output_limits(&self) -> Option<OutputLimits> {
        self.limits
    }

    pub fn setpoint(&self) -> f64 {
        self.setpoint
    }

    pub fn sample(&self) -> SampleConfig {
        self.sample
    }

    pub fn state(&self) -> &PidState {
        &self.state
    }
}

impl Default for PidEngine {
    fn default() -> Self {
        Self::new(SampleConfig::default())
    }
}
