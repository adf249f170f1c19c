//! Controlled flow channel: setpoint law, engine invocation and history.

use crate::error::{ControlError, ControlResult};
use crate::pid::{OutputLimits, PidEngine, Tunings};
use crate::setpoint::{LevelVector, SetpointLaw};
use serde::Serialize;
use sr_core::ChannelId;

/// Result of one channel invocation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FlowSample {
    /// Tracked process value (the flow that actually moves).
    pub pv: f64,
    /// Setpoint the engine was asked to track.
    pub sp: f64,
}

/// Append-only (PV, SP) record, one entry per invocation.
///
/// The seed PV a channel starts from is not part of the history, so both
/// series always have the same length.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChannelHistory {
    pub pv: Vec<f64>,
    pub sp: Vec<f64>,
}

impl ChannelHistory {
    pub fn push(&mut self, sample: FlowSample) {
        self.pv.push(sample.pv);
        self.sp.push(sample.sp);
    }

    pub fn len(&self) -> usize {
        self.sp.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sp.is_empty()
    }

    pub fn last(&self) -> Option<FlowSample> {
        Some(FlowSample {
            pv: *self.pv.last()?,
            sp: *self.sp.last()?,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = FlowSample> + '_ {
        self.pv
            .iter()
            .zip(&self.sp)
            .map(|(&pv, &sp)| FlowSample { pv, sp })
    }
}

/// One controlled flow in the line.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowChannel {
    id: ChannelId,
    law: SetpointLaw,
    tunings: Tunings,
    limits: Option<OutputLimits>,
    initial_pv: f64,
    history: ChannelHistory,
}

impl FlowChannel {
    /// Build a channel; the channel id is taken from the law.
    ///
    /// # Errors
    ///
    /// Returns error if the tunings or the seed PV are not finite.
    pub fn new(
        law: SetpointLaw,
        tunings: Tunings,
        limits: Option<OutputLimits>,
        initial_pv: f64,
    ) -> ControlResult<Self> {
        tunings.validate()?;
        if !initial_pv.is_finite() {
            return Err(ControlError::InvalidArg {
                what: "initial process value must be finite",
            });
        }
        Ok(Self {
            id: law.channel(),
            law,
            tunings,
            limits,
            initial_pv,
            history: ChannelHistory::default(),
        })
    }

    /// Compute the setpoint from `levels`, step `engine` once from the last
    /// recorded PV and record the result.
    ///
    /// The engine is reconfigured with this channel's tunings and limits on
    /// every call, so a shared engine picks them up before it is stepped.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::NonFinite`] if the engine output is not
    /// finite; nothing is recorded in that case.
    pub fn invoke(&mut self, levels: &LevelVector, engine: &mut PidEngine) -> ControlResult<FlowSample> {
        let sp = self.law.setpoint(levels);
        engine.configure(self.tunings, self.limits);
        engine.set_setpoint(sp);
        let pv = engine.step(self.last_pv());
        if !pv.is_finite() {
            return Err(ControlError::NonFinite {
                channel: self.id.tag(),
                value: pv,
            });
        }
        let sample = FlowSample { pv, sp };
        self.history.push(sample);
        Ok(sample)
    }

    /// Record the setpoint as the process value without stepping any engine.
    ///
    /// Models perfect tracking; the history entry has `pv == sp`.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::NonFinite`] if the setpoint is not finite.
    pub fn bypass(&mut self, levels: &LevelVector) -> ControlResult<FlowSample> {
        let sp = self.law.setpoint(levels);
        if !sp.is_finite() {
            return Err(ControlError::NonFinite {
                channel: self.id.tag(),
                value: sp,
            });
        }
        let sample = FlowSample { pv: sp, sp };
        self.history.push(sample);
        Ok(sample)
    }

    /// Setpoint only, no engine involvement and no history entry.
    pub fn setpoint(&self, levels: &LevelVector) -> f64 {
        self.law.setpoint(levels)
    }

    /// PV the next invocation will feed the engine.
    pub fn last_pv(&self) -> f64 {
        self.history.pv.last().copied().unwrap_or(self.initial_pv)
    }

    /// Drop the recorded history; the next invocation starts from the seed PV.
    pub fn reset(&mut self) {
        self.history = ChannelHistory::default();
    }

    pub fn id(&self) -> ChannelId {
        self.id
    }

    pub fn law(&self) -> &SetpointLaw {
        &self.law
    }

    pub fn tunings(&self) -> Tunings {
        self.tunings
    }

    pub fn output_limits(&self) -> Option<OutputLimits> {
        self.limits
    }

    pub fn initial_pv(&self) -> f64 {
        self.initial_pv
    }

    pub fn history(&self) -> &ChannelHistory {
        &self.history
    }

    pub fn take_history(&mut self) -> ChannelHistory {
        std::mem::take(&mut self.history)
    }
}
