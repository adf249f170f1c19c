//! Plant configuration: the constant table a run is built from.

use crate::error::{PlantError, PlantResult};
use serde::Serialize;
use sr_controls::{EvaporatorLaw, EvaporatorMode, OutputLimits, SampleConfig, SetpointLaw, Tunings};
use sr_core::{ChannelId, TankId};

/// Capacity used by every tank in the line.
pub const LEGACY_TANK_CAPACITY: f64 = 8500.0;

/// Constant Precoat supply into the ProveUp tank.
pub const LEGACY_PRECOAT_INFLOW: f64 = 300.0;

/// Initial levels in percent, ProveUp → Evaporator.
pub const LEGACY_INITIAL_LEVELS: [f64; 4] = [70.0, 63.0, 60.0, 30.0];

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TankConfig {
    pub id: TankId,
    /// Scales net flow into a level rate: `dL/dt = (in - out) / capacity`.
    pub capacity: f64,
}

impl TankConfig {
    pub fn legacy(id: TankId) -> Self {
        Self {
            id,
            capacity: LEGACY_TANK_CAPACITY,
        }
    }
}

/// Everything needed to build one [`sr_controls::FlowChannel`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChannelConfig {
    pub law: SetpointLaw,
    pub tunings: Tunings,
    /// `None` leaves the engine's limits untouched on each invocation.
    pub output_limits: Option<OutputLimits>,
    /// PV the first invocation measures.
    pub initial_pv: f64,
}

impl ChannelConfig {
    /// Legacy table: unit PI tunings, limits on ProveUp and IonExchange only.
    pub fn legacy(channel: ChannelId) -> PlantResult<Self> {
        let (output_limits, initial_pv) = match channel {
            ChannelId::ProveUp => (Some(OutputLimits::new(270.0, 370.0)?), 270.0),
            ChannelId::IonExchange => (Some(OutputLimits::new(225.0, 360.0)?), 320.0),
            ChannelId::Polisher => (None, 300.0),
            ChannelId::Evaporator => (None, 315.0),
        };
        Ok(Self {
            law: SetpointLaw::legacy(channel)?,
            tunings: Tunings::default(),
            output_limits,
            initial_pv,
        })
    }

    pub fn channel(&self) -> ChannelId {
        self.law.channel()
    }
}

/// How PID engines are assigned to channels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerWiring {
    /// One engine per channel; controller state never crosses channels.
    #[default]
    Dedicated,
    /// One engine stepped by all four channels in turn.
    ///
    /// Limits installed by one channel stay in force for the next channel
    /// that installs none, and the integral carries over between channels.
    Shared,
    /// No engine at all: every flow equals its setpoint.
    Bypass,
}

impl ControllerWiring {
    /// Number of engines the network allocates.
    pub fn engine_count(self) -> usize {
        match self {
            ControllerWiring::Dedicated => ChannelId::ALL.len(),
            ControllerWiring::Shared => 1,
            ControllerWiring::Bypass => 0,
        }
    }

    /// Engine a channel is stepped on, `None` when bypassed.
    pub fn engine_index(self, channel: ChannelId) -> Option<usize> {
        match self {
            ControllerWiring::Dedicated => Some(channel.index()),
            ControllerWiring::Shared => Some(0),
            ControllerWiring::Bypass => None,
        }
    }
}

/// What to do when an accepted state has a level outside the guard band.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardPolicy {
    /// Stop the run with an out-of-range error.
    #[default]
    Reject,
    /// Clamp the level into the band, log a warning and continue.
    Clamp,
}

/// Physical level band checked on every accepted state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LevelGuard {
    pub min: f64,
    pub max: f64,
    pub policy: GuardPolicy,
}

impl Default for LevelGuard {
    fn default() -> Self {
        Self {
            min: 0.0,
            max: 100.0,
            policy: GuardPolicy::Reject,
        }
    }
}

impl LevelGuard {
    pub fn with_policy(mut self, policy: GuardPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn contains(&self, level: f64) -> bool {
        (self.min..=self.max).contains(&level)
    }
}

/// Immutable description of the whole line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlantConfig {
    /// Tanks in flow order.
    pub tanks: [TankConfig; 4],
    /// Precoat supply into the ProveUp tank.
    pub precoat_inflow: f64,
    /// Channels in evaluation order.
    pub channels: [ChannelConfig; 4],
    pub wiring: ControllerWiring,
    pub level_guard: LevelGuard,
    /// Nominal controller sample period.
    pub sample: SampleConfig,
}

impl PlantConfig {
    /// The legacy constant table with dedicated engines.
    pub fn legacy() -> PlantResult<Self> {
        Ok(Self {
            tanks: TankId::ALL.map(TankConfig::legacy),
            precoat_inflow: LEGACY_PRECOAT_INFLOW,
            channels: [
                ChannelConfig::legacy(ChannelId::ProveUp)?,
                ChannelConfig::legacy(ChannelId::IonExchange)?,
                ChannelConfig::legacy(ChannelId::Polisher)?,
                ChannelConfig::legacy(ChannelId::Evaporator)?,
            ],
            wiring: ControllerWiring::default(),
            level_guard: LevelGuard::default(),
            sample: SampleConfig::default(),
        })
    }

    pub fn with_wiring(mut self, wiring: ControllerWiring) -> Self {
        self.wiring = wiring;
        self
    }

    pub fn with_level_guard(mut self, guard: LevelGuard) -> Self {
        self.level_guard = guard;
        self
    }

    pub fn with_output_limits(mut self, channel: ChannelId, limits: Option<OutputLimits>) -> Self {
        self.channels[channel.index()].output_limits = limits;
        self
    }

    pub fn with_tunings(mut self, channel: ChannelId, tunings: Tunings) -> Self {
        self.channels[channel.index()].tunings = tunings;
        self
    }

    /// Switch the evaporator law between auto and level-following.
    pub fn with_evaporator_mode(mut self, mode: EvaporatorMode) -> PlantResult<Self> {
        let slot = &mut self.channels[ChannelId::Evaporator.index()];
        slot.law = match slot.law {
            SetpointLaw::Evaporator(law) => {
                SetpointLaw::Evaporator(EvaporatorLaw::new(law.ramp, law.auto_setpoint, mode)?)
            }
            _ => {
                return Err(PlantError::InvalidConfig {
                    what: "evaporator slot does not hold an evaporator law".to_string(),
                });
            }
        };
        Ok(self)
    }

    pub fn channel(&self, id: ChannelId) -> &ChannelConfig {
        &self.channels[id.index()]
    }

    pub fn tank(&self, id: TankId) -> &TankConfig {
        &self.tanks[id.index()]
    }

    /// Check the table before any simulation is built from it.
    pub fn validate(&self) -> PlantResult<()> {
        for (slot, tank) in TankId::ALL.iter().zip(&self.tanks) {
            if tank.id != *slot {
                return Err(PlantError::InvalidConfig {
                    what: format!("tank slot {slot} holds {}", tank.id),
                });
            }
            if !(tank.capacity.is_finite() && tank.capacity > 0.0) {
                return Err(PlantError::InvalidConfig {
                    what: format!("{} capacity must be positive, got {}", tank.id, tank.capacity),
                });
            }
        }

        if !(self.precoat_inflow.is_finite() && self.precoat_inflow >= 0.0) {
            return Err(PlantError::InvalidConfig {
                what: format!("precoat inflow must be non-negative, got {}", self.precoat_inflow),
            });
        }

        for (slot, channel) in ChannelId::ALL.iter().zip(&self.channels) {
            if channel.channel() != *slot {
                return Err(PlantError::InvalidConfig {
                    what: format!("channel slot {slot} holds the {} law", channel.channel()),
                });
            }
            channel.tunings.validate()?;
            if !channel.initial_pv.is_finite() {
                return Err(PlantError::InvalidConfig {
                    what: format!("{slot} initial PV must be finite"),
                });
            }
        }

        SampleConfig::new(self.sample.dt)?;

        let guard = &self.level_guard;
        if guard.min.is_nan() || guard.max.is_nan() || guard.min >= guard.max {
            return Err(PlantError::InvalidConfig {
                what: format!("level guard [{}, {}] is empty", guard.min, guard.max),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_table_is_valid() {
        let config = PlantConfig::legacy().unwrap();
        config.validate().unwrap();
        assert_eq!(config.wiring, ControllerWiring::Dedicated);
        assert!(config.tanks.iter().all(|t| t.capacity == 8500.0));
        assert_eq!(config.channel(ChannelId::Polisher).output_limits, None);
        assert_eq!(config.channel(ChannelId::Evaporator).initial_pv, 315.0);
        let ix = config.channel(ChannelId::IonExchange).output_limits.unwrap();
        assert_eq!((ix.low(), ix.high()), (225.0, 360.0));
    }

    #[test]
    fn engine_assignment_per_wiring() {
        assert_eq!(ControllerWiring::Dedicated.engine_count(), 4);
        assert_eq!(ControllerWiring::Shared.engine_count(), 1);
        assert_eq!(ControllerWiring::Bypass.engine_count(), 0);
        assert_eq!(
            ControllerWiring::Dedicated.engine_index(ChannelId::Polisher),
            Some(2)
        );
        assert_eq!(
            ControllerWiring::Shared.engine_index(ChannelId::Evaporator),
            Some(0)
        );
        assert_eq!(ControllerWiring::Bypass.engine_index(ChannelId::ProveUp), None);
    }

    #[test]
    fn rejects_bad_capacity() {
        let mut config = PlantConfig::legacy().unwrap();
        config.tanks[1].capacity = 0.0;
        let err = config.validate().unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("ion_exchange"));
    }

    #[test]
    fn rejects_misplaced_law() {
        let mut config = PlantConfig::legacy().unwrap();
        config.channels.swap(2, 3);
        assert!(config.validate().unwrap_err().is_configuration());
    }

    #[test]
    fn rejects_non_finite_tunings_and_seed() {
        let config = PlantConfig::legacy()
            .unwrap()
            .with_tunings(ChannelId::ProveUp, Tunings::new(f64::NAN, 1.0, 0.0));
        assert!(config.validate().unwrap_err().is_configuration());

        let mut config = PlantConfig::legacy().unwrap();
        config.channels[0].initial_pv = f64::INFINITY;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_empty_guard_and_negative_precoat() {
        let config = PlantConfig::legacy().unwrap().with_level_guard(LevelGuard {
            min: 50.0,
            max: 50.0,
            policy: GuardPolicy::Reject,
        });
        assert!(config.validate().is_err());

        let mut config = PlantConfig::legacy().unwrap();
        config.precoat_inflow = -1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_non_positive_sample_period() {
        let mut config = PlantConfig::legacy().unwrap();
        config.sample.dt = 0.0;
        assert!(config.validate().unwrap_err().is_configuration());
    }

    #[test]
    fn evaporator_mode_switch() {
        let config = PlantConfig::legacy()
            .unwrap()
            .with_evaporator_mode(EvaporatorMode::Manual)
            .unwrap();
        let levels = [0.0, 0.0, 0.0, 65.0];
        assert_eq!(config.channel(ChannelId::Evaporator).law.setpoint(&levels), 340.0);
    }

    #[test]
    fn serializes_to_json() {
        let config = PlantConfig::legacy().unwrap();
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["wiring"], "dedicated");
        assert_eq!(json["channels"][0]["law"]["law"], "prove_up");
        assert_eq!(json["level_guard"]["policy"], "reject");
    }
}
