//! Level-to-flow setpoint laws.
//!
//! Each law is a pure function of tank levels (percent full). Windows and
//! limits are checked once, when the law is built, so a bad table can never
//! reach the integrator as a division by zero.

use crate::error::{ControlError, ControlResult};
use serde::Serialize;
use sr_core::{ChannelId, TankId, lerp};

/// Tank levels in percent, indexed by [`TankId::index`].
pub type LevelVector = [f64; 4];

/// Straight line through `(level_low, sp_low)` and `(level_high, sp_high)`.
///
/// Deliberately unclamped: levels outside the window extrapolate. Output
/// clamping, where a channel has it, happens in the PID engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LinearRamp {
    level_low: f64,
    level_high: f64,
    sp_low: f64,
    sp_high: f64,
}

impl LinearRamp {
    /// Build a ramp over the level window `[level_low, level_high]`.
    ///
    /// # Errors
    ///
    /// - `level_high <= level_low` (the slope would divide by zero or flip)
    /// - `sp_low > sp_high`
    /// - any non-finite argument
    pub fn new(level_low: f64, level_high: f64, sp_low: f64, sp_high: f64) -> ControlResult<Self> {
        if ![level_low, level_high, sp_low, sp_high]
            .iter()
            .all(|v| v.is_finite())
        {
            return Err(ControlError::Configuration {
                what: "ramp endpoints must be finite",
            });
        }
        if level_high <= level_low {
            return Err(ControlError::Configuration {
                what: "level window high limit must exceed low limit",
            });
        }
        if sp_low > sp_high {
            return Err(ControlError::Configuration {
                what: "setpoint low limit must not exceed high limit",
            });
        }
        Ok(Self {
            level_low,
            level_high,
            sp_low,
            sp_high,
        })
    }

    /// Setpoint climbing from `sp_low` at `level_low` to `sp_high` at `level_high`.
    pub fn rising(&self, level: f64) -> f64 {
        lerp(level, self.level_low, self.level_high, self.sp_low, self.sp_high)
    }

    /// Setpoint falling from `sp_high` at `level_low` to `sp_low` at `level_high`.
    pub fn falling(&self, level: f64) -> f64 {
        lerp(level, self.level_high, self.level_low, self.sp_low, self.sp_high)
    }
}

/// Both candidate setpoints of the ProveUp law and the one that was chosen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProveUpSetpoint {
    /// Backs off as the IonExchange tank fills.
    pub from_ix: f64,
    /// Pushes harder as the ProveUp tank fills.
    pub from_pu: f64,
    /// The more restrictive of the two.
    pub selected: f64,
}

/// ProveUp outflow: the smaller of a downstream-level and an own-level ramp.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProveUpLaw {
    pub ix_ramp: LinearRamp,
    pub pu_ramp: LinearRamp,
}

impl ProveUpLaw {
    pub fn new(ix_ramp: LinearRamp, pu_ramp: LinearRamp) -> Self {
        Self { ix_ramp, pu_ramp }
    }

    /// Legacy table: 270..370 over IX 75..50 % and over PU 0..100 %.
    pub fn legacy() -> ControlResult<Self> {
        Ok(Self::new(
            LinearRamp::new(50.0, 75.0, 270.0, 370.0)?,
            LinearRamp::new(0.0, 100.0, 270.0, 370.0)?,
        ))
    }

    pub fn evaluate(&self, pu_level: f64, ix_level: f64) -> ProveUpSetpoint {
        let from_ix = self.ix_ramp.falling(ix_level);
        let from_pu = self.pu_ramp.rising(pu_level);
        ProveUpSetpoint {
            from_ix,
            from_pu,
            selected: from_ix.min(from_pu),
        }
    }

    pub fn setpoint(&self, pu_level: f64, ix_level: f64) -> f64 {
        self.evaluate(pu_level, ix_level).selected
    }
}

/// IonExchange outflow: rises with the IX level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IonExchangeLaw {
    pub ramp: LinearRamp,
}

impl IonExchangeLaw {
    pub fn new(ramp: LinearRamp) -> Self {
        Self { ramp }
    }

    /// Legacy table: 225..360 over IX 40..68 %.
    pub fn legacy() -> ControlResult<Self> {
        Ok(Self::new(LinearRamp::new(40.0, 68.0, 225.0, 360.0)?))
    }

    pub fn setpoint(&self, ix_level: f64) -> f64 {
        self.ramp.rising(ix_level)
    }
}

/// Polisher outflow: ratio law `level * ratio + bias`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PolisherLaw {
    pub ratio: f64,
    pub bias: f64,
}

impl PolisherLaw {
    pub fn new(ratio: f64, bias: f64) -> ControlResult<Self> {
        if !(ratio.is_finite() && bias.is_finite()) {
            return Err(ControlError::Configuration {
                what: "polisher ratio and bias must be finite",
            });
        }
        Ok(Self { ratio, bias })
    }

    /// Legacy table: 5.5 per percent plus 50.
    pub fn legacy() -> ControlResult<Self> {
        Self::new(5.5, 50.0)
    }

    pub fn setpoint(&self, pix_level: f64) -> f64 {
        pix_level * self.ratio + self.bias
    }
}

/// How the evaporator feed setpoint is chosen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaporatorMode {
    /// Fixed feed rate, level is ignored.
    #[default]
    Auto,
    /// Feed rate follows the evaporator supply level.
    Manual,
}

/// Evaporator outflow: a fixed rate in auto, a level ramp otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EvaporatorLaw {
    pub ramp: LinearRamp,
    pub auto_setpoint: f64,
    pub mode: EvaporatorMode,
}

impl EvaporatorLaw {
    pub fn new(ramp: LinearRamp, auto_setpoint: f64, mode: EvaporatorMode) -> ControlResult<Self> {
        if !auto_setpoint.is_finite() {
            return Err(ControlError::Configuration {
                what: "evaporator auto setpoint must be finite",
            });
        }
        Ok(Self {
            ramp,
            auto_setpoint,
            mode,
        })
    }

    /// Legacy table: 290..340 over 30..65 %, 315 in auto.
    pub fn legacy(mode: EvaporatorMode) -> ControlResult<Self> {
        Self::new(LinearRamp::new(30.0, 65.0, 290.0, 340.0)?, 315.0, mode)
    }

    /// Setpoint with an explicit auto flag, independent of the configured mode.
    pub fn setpoint_with(&self, evap_level: f64, auto: bool) -> f64 {
        if auto {
            self.auto_setpoint
        } else {
            self.ramp.rising(evap_level)
        }
    }

    pub fn setpoint(&self, evap_level: f64) -> f64 {
        self.setpoint_with(evap_level, self.mode == EvaporatorMode::Auto)
    }
}

/// Setpoint law of one flow channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "law", rename_all = "snake_case")]
pub enum SetpointLaw {
    ProveUp(ProveUpLaw),
    IonExchange(IonExchangeLaw),
    Polisher(PolisherLaw),
    Evaporator(EvaporatorLaw),
}

impl SetpointLaw {
    /// Legacy law for a channel; the evaporator runs in auto.
    pub fn legacy(channel: ChannelId) -> ControlResult<Self> {
        Ok(match channel {
            ChannelId::ProveUp => Self::ProveUp(ProveUpLaw::legacy()?),
            ChannelId::IonExchange => Self::IonExchange(IonExchangeLaw::legacy()?),
            ChannelId::Polisher => Self::Polisher(PolisherLaw::legacy()?),
            ChannelId::Evaporator => Self::Evaporator(EvaporatorLaw::legacy(EvaporatorMode::Auto)?),
        })
    }

    /// Channel this law belongs to.
    pub fn channel(&self) -> ChannelId {
        match self {
            Self::ProveUp(_) => ChannelId::ProveUp,
            Self::IonExchange(_) => ChannelId::IonExchange,
            Self::Polisher(_) => ChannelId::Polisher,
            Self::Evaporator(_) => ChannelId::Evaporator,
        }
    }

    pub fn setpoint(&self, levels: &LevelVector) -> f64 {
        let level = |tank: TankId| levels[tank.index()];
        match self {
            Self::ProveUp(law) => law.setpoint(level(TankId::ProveUp), level(TankId::IonExchange)),
            Self::IonExchange(law) => law.setpoint(level(TankId::IonExchange)),
            Self::Polisher(law) => law.setpoint(level(TankId::Polisher)),
            Self::Evaporator(law) => law.setpoint(level(TankId::Evaporator)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn ramp_rejects_degenerate_window() {
        let err = LinearRamp::new(40.0, 40.0, 225.0, 360.0).unwrap_err();
        assert!(matches!(err, ControlError::Configuration { .. }));
        assert!(LinearRamp::new(68.0, 40.0, 225.0, 360.0).is_err());
        assert!(LinearRamp::new(40.0, 68.0, 360.0, 225.0).is_err());
        assert!(LinearRamp::new(40.0, f64::INFINITY, 225.0, 360.0).is_err());
    }

    #[test]
    fn ion_exchange_endpoints() {
        let law = IonExchangeLaw::legacy().unwrap();
        assert_eq!(law.setpoint(40.0), 225.0);
        assert_eq!(law.setpoint(68.0), 360.0);
        assert!(close(law.setpoint(54.0), 292.5));
    }

    #[test]
    fn ion_exchange_example() {
        let law = IonExchangeLaw::legacy().unwrap();
        // Slope first, then offset: bit-identical to the legacy arithmetic.
        let expected = (135.0 / 28.0) * 23.0 + 225.0;
        assert_eq!(law.setpoint(63.0), expected);
        assert!((law.setpoint(63.0) - 335.893).abs() < 1e-3);
    }

    #[test]
    fn proveup_picks_more_restrictive() {
        let law = ProveUpLaw::legacy().unwrap();
        let sp = law.evaluate(70.0, 63.0);
        assert!(close(sp.from_ix, 318.0));
        assert!(close(sp.from_pu, 340.0));
        assert!(close(sp.selected, 318.0));
    }

    #[test]
    fn proveup_own_level_wins_when_ix_is_low() {
        let law = ProveUpLaw::legacy().unwrap();
        let sp = law.evaluate(10.0, 50.0);
        assert!(close(sp.from_ix, 370.0));
        assert!(close(sp.selected, 280.0));
    }

    #[test]
    fn proveup_ix_ramp_extrapolates() {
        // Outside the 50..75 window nothing saturates.
        let law = ProveUpLaw::legacy().unwrap();
        assert!(close(law.evaluate(100.0, 80.0).from_ix, 250.0));
    }

    #[test]
    fn polisher_example() {
        let law = PolisherLaw::legacy().unwrap();
        assert_eq!(law.setpoint(60.0), 380.0);
    }

    #[test]
    fn evaporator_manual_ramp() {
        let law = EvaporatorLaw::legacy(EvaporatorMode::Manual).unwrap();
        assert_eq!(law.setpoint(30.0), 290.0);
        assert!(close(law.setpoint(65.0), 340.0));
        assert_eq!(law.setpoint_with(30.0, true), 315.0);
    }

    #[test]
    fn law_dispatch_reads_the_right_tank() {
        let levels = [70.0, 63.0, 60.0, 30.0];
        let pu = SetpointLaw::legacy(ChannelId::ProveUp).unwrap();
        let pix = SetpointLaw::legacy(ChannelId::Polisher).unwrap();
        let evap = SetpointLaw::legacy(ChannelId::Evaporator).unwrap();
        assert!(close(pu.setpoint(&levels), 318.0));
        assert_eq!(pix.setpoint(&levels), 380.0);
        assert_eq!(evap.setpoint(&levels), 315.0);
        for channel in ChannelId::ALL {
            assert_eq!(SetpointLaw::legacy(channel).unwrap().channel(), channel);
        }
    }
}
