//! Flow controllers for the syrup line.
//!
//! Every tank outflow is a controlled flow channel: a setpoint law maps tank
//! levels to a target flow, and a PID engine turns that target into the
//! tracked process value that actually drains the tank.
//!
//! # Architecture
//!
//! - [`PidEngine`] holds controller state (integral, last input/output) and is
//!   stepped at a fixed nominal sample period.
//! - [`SetpointLaw`] is a pure function of the level vector, one variant per
//!   channel (ProveUp, IonExchange, Polisher, Evaporator).
//! - [`FlowChannel`] pairs a law with its tunings and output limits, drives an
//!   engine once per invocation and records the (PV, SP) history.
//!
//! Engines are not owned by channels. The caller decides whether each channel
//! gets its own engine or all of them share one, which is how the plant
//! reproduces the legacy single-controller wiring.

pub mod channel;
pub mod error;
pub mod pid;
pub mod sampled;
pub mod setpoint;

pub use channel::{ChannelHistory, FlowChannel, FlowSample};
pub use error::{ControlError, ControlResult};
pub use pid::{OutputLimits, PidEngine, PidState, Tunings};
pub use sampled::SampleConfig;
pub use setpoint::{
    EvaporatorLaw, EvaporatorMode, IonExchangeLaw, LevelVector, LinearRamp, PolisherLaw,
    ProveUpLaw, ProveUpSetpoint, SetpointLaw,
};
