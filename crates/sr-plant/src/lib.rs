//! Syrup-line level ramping model.
//!
//! Four tanks in series (ProveUp → IonExchange → Polisher → Evaporator) fed
//! by a constant Precoat supply. Each tank outflow is a closed-loop flow
//! channel whose setpoint depends on tank levels, and the controllers are
//! stepped inside the ODE right-hand side.
//!
//! - [`PlantConfig`]: immutable constant table (capacities, laws, tunings, limits)
//! - [`TankNetwork`]: the right-hand side, a [`sr_sim::TransientModel`]
//! - [`SimulationRunner`]: builds the network, integrates, and reports

pub mod config;
pub mod error;
pub mod network;
pub mod precoat;
pub mod runner;

pub use config::{ChannelConfig, ControllerWiring, GuardPolicy, LevelGuard, PlantConfig, TankConfig};
pub use error::{PlantError, PlantResult};
pub use network::{EvaluationRecord, Levels, TankNetwork};
pub use precoat::{ConstantInflow, InflowSource};
pub use runner::{SimulationReport, SimulationRunner};
