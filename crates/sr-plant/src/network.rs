//! Tank network: the right-hand side of the level ODE.

use crate::config::{ControllerWiring, GuardPolicy, LevelGuard, PlantConfig};
use crate::error::{PlantError, PlantResult};
use crate::precoat::{ConstantInflow, InflowSource};
use nalgebra::Vector4;
use serde::Serialize;
use sr_controls::{ChannelHistory, ControlError, FlowChannel, FlowSample, LevelVector, PidEngine};
use sr_core::{ChannelId, TankId};
use sr_sim::{SimError, SimResult, TransientModel};
use std::collections::BTreeMap;
use tracing::{trace, warn};

/// Tank levels in percent, indexed by [`TankId::index`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Levels(pub Vector4<f64>);

impl Levels {
    pub fn new(levels: LevelVector) -> Self {
        Self(Vector4::from(levels))
    }

    pub fn get(&self, tank: TankId) -> f64 {
        self.0[tank.index()]
    }

    pub fn to_array(&self) -> LevelVector {
        [self.0[0], self.0[1], self.0[2], self.0[3]]
    }
}

impl AsRef<[f64]> for Levels {
    fn as_ref(&self) -> &[f64] {
        self.0.as_slice()
    }
}

impl From<LevelVector> for Levels {
    fn from(levels: LevelVector) -> Self {
        Self::new(levels)
    }
}

/// Snapshot handed to the observer after each right-hand-side evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EvaluationRecord {
    /// Zero-based evaluation counter.
    pub index: usize,
    pub t: f64,
    pub levels: LevelVector,
    pub flows: [FlowSample; 4],
    pub derivatives: LevelVector,
}

type Observer = Box<dyn FnMut(&EvaluationRecord)>;

/// Four tanks in series, each drained by a controlled flow channel.
///
/// Every call to [`TransientModel::rhs`] invokes each channel exactly once,
/// in flow order, and each invocation steps a PID engine and appends to the
/// channel history. Evaluating the right-hand side is therefore not
/// idempotent: trial stages and rejected steps advance the controllers too.
pub struct TankNetwork {
    capacities: [f64; 4],
    precoat: Box<dyn InflowSource>,
    channels: Vec<FlowChannel>,
    engines: Vec<PidEngine>,
    wiring: ControllerWiring,
    guard: LevelGuard,
    initial: Levels,
    evaluations: usize,
    observer: Option<Observer>,
}

impl TankNetwork {
    /// Build the network from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is invalid or an initial level is
    /// not finite.
    pub fn new(config: &PlantConfig, initial: Levels) -> PlantResult<Self> {
        config.validate()?;
        if let Some(level) = initial.0.iter().find(|l| !l.is_finite()) {
            return Err(PlantError::InvalidConfig {
                what: format!("initial level must be finite, got {level}"),
            });
        }

        let channels = config
            .channels
            .iter()
            .map(|c| FlowChannel::new(c.law, c.tunings, c.output_limits, c.initial_pv))
            .collect::<Result<Vec<_>, _>>()?;

        let engines = (0..config.wiring.engine_count())
            .map(|_| PidEngine::new(config.sample))
            .collect();

        Ok(Self {
            capacities: config.tanks.map(|t| t.capacity),
            precoat: Box::new(ConstantInflow(config.precoat_inflow)),
            channels,
            engines,
            wiring: config.wiring,
            guard: config.level_guard,
            initial,
            evaluations: 0,
            observer: None,
        })
    }

    /// Replace the constant Precoat supply.
    pub fn with_precoat(mut self, source: Box<dyn InflowSource>) -> Self {
        self.precoat = source;
        self
    }

    /// Register a callback run after every right-hand-side evaluation.
    pub fn set_observer(&mut self, observer: impl FnMut(&EvaluationRecord) + 'static) {
        self.observer = Some(Box::new(observer));
    }

    /// Invoke every channel once, in flow order, at the given levels.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::NumericDivergence`] if a channel produces a
    /// non-finite flow.
    pub fn invoke_channels(&mut self, t: f64, levels: &LevelVector) -> SimResult<[FlowSample; 4]> {
        let mut flows = [FlowSample { pv: 0.0, sp: 0.0 }; 4];
        for (slot, channel) in flows.iter_mut().zip(self.channels.iter_mut()) {
            let result = match self.wiring.engine_index(channel.id()) {
                Some(i) => channel.invoke(levels, &mut self.engines[i]),
                None => channel.bypass(levels),
            };
            *slot = result.map_err(|e| control_to_sim(e, t))?;
        }
        Ok(flows)
    }

    /// Level rates for the given flows: `(inflow - outflow) / capacity`.
    pub fn derivatives(&self, t: f64, flows: &[FlowSample; 4]) -> SimResult<LevelVector> {
        let precoat = self.precoat.inflow(t);
        if !precoat.is_finite() {
            return Err(SimError::NumericDivergence {
                what: format!("precoat inflow = {precoat}"),
                t,
            });
        }
        Ok(TankId::ALL.map(|tank| {
            let inflow = match tank.inflow() {
                Some(upstream) => flows[upstream.index()].pv,
                None => precoat,
            };
            let outflow = flows[tank.outflow().index()].pv;
            (inflow - outflow) / self.capacities[tank.index()]
        }))
    }

    /// Number of right-hand-side evaluations since construction or reset.
    pub fn evaluations(&self) -> usize {
        self.evaluations
    }

    pub fn wiring(&self) -> ControllerWiring {
        self.wiring
    }

    pub fn channel(&self, id: ChannelId) -> &FlowChannel {
        &self.channels[id.index()]
    }

    pub fn history(&self, id: ChannelId) -> &ChannelHistory {
        self.channel(id).history()
    }

    pub fn engines(&self) -> &[PidEngine] {
        &self.engines
    }

    /// Move all histories out, leaving the channels empty.
    pub fn take_histories(&mut self) -> BTreeMap<ChannelId, ChannelHistory> {
        self.channels
            .iter_mut()
            .map(|c| (c.id(), c.take_history()))
            .collect()
    }

    /// Return to the freshly built state: empty histories, zeroed engines.
    pub fn reset(&mut self) {
        for channel in &mut self.channels {
            channel.reset();
        }
        for engine in &mut self.engines {
            engine.reset();
            engine.clear_output_limits();
        }
        self.evaluations = 0;
    }
}

impl TransientModel for TankNetwork {
    type State = Levels;

    fn initial_state(&self) -> Levels {
        self.initial
    }

    fn rhs(&mut self, t: f64, x: &Levels) -> SimResult<Levels> {
        let levels = x.to_array();
        let flows = self.invoke_channels(t, &levels)?;
        let derivatives = self.derivatives(t, &flows)?;

        let record = EvaluationRecord {
            index: self.evaluations,
            t,
            levels,
            flows,
            derivatives,
        };
        self.evaluations += 1;
        trace!(
            t,
            evaluation = record.index,
            pu = flows[0].pv,
            ix = flows[1].pv,
            pix = flows[2].pv,
            evap = flows[3].pv,
            "rhs evaluated"
        );
        if let Some(observer) = self.observer.as_mut() {
            observer(&record);
        }
        Ok(Levels::new(derivatives))
    }

    fn add(&self, a: &Levels, b: &Levels) -> Levels {
        Levels(a.0 + b.0)
    }

    fn scale(&self, a: &Levels, scale: f64) -> Levels {
        Levels(a.0 * scale)
    }

    fn accept(&mut self, t: f64, mut x: Levels) -> SimResult<Levels> {
        for tank in TankId::ALL {
            let level = x.0[tank.index()];
            if self.guard.contains(level) {
                continue;
            }
            match self.guard.policy {
                GuardPolicy::Reject => {
                    return Err(SimError::OutOfRangeLevel {
                        what: tank.name().to_string(),
                        level,
                        t,
                    });
                }
                GuardPolicy::Clamp => {
                    let clamped = level.clamp(self.guard.min, self.guard.max);
                    warn!(t, tank = tank.name(), level, clamped, "level clamped into guard band");
                    x.0[tank.index()] = clamped;
                }
            }
        }
        Ok(x)
    }
}

fn control_to_sim(e: ControlError, t: f64) -> SimError {
    match e {
        ControlError::NonFinite { channel, value } => SimError::NumericDivergence {
            what: format!("{channel} flow = {value}"),
            t,
        },
        other => SimError::Model {
            message: other.to_string(),
        },
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn internal_flows_cancel_across_the_line(
            levels in prop::array::uniform4(0.0_f64..100.0),
        ) {
            let config = PlantConfig::legacy()
                .unwrap()
                .with_wiring(ControllerWiring::Bypass);
            let mut net = TankNetwork::new(&config, Levels::new(levels)).unwrap();
            let dx = net.rhs(0.0, &Levels::new(levels)).unwrap();

            // Equal capacities: only Precoat in and evaporator out survive the sum.
            let total: f64 = dx.0.iter().sum::<f64>() * 8500.0;
            let evap_out = net.history(ChannelId::Evaporator).pv[0];
            prop_assert!((total - (300.0 - evap_out)).abs() < 1e-9);
        }
    }
}
