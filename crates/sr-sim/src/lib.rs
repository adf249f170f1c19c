//! Transient simulation framework for syrupramp.
//!
//! Provides:
//! - `TransientModel` trait for stateful right-hand sides
//! - Fixed-step RK4 and forward Euler integrators
//! - Adaptive Dormand–Prince 5(4) integrator
//! - `run_sim` driver that lands exactly on a requested time grid and checks
//!   every accepted state

pub mod error;
pub mod integrator;
pub mod model;
pub mod sim;

// Internal modules
mod checks;

// Re-exports for public API
pub use error::{SimError, SimResult};
pub use integrator::{AdaptiveAttempt, DormandPrince54, ForwardEuler, Integrator, RK4};
pub use model::TransientModel;
pub use sim::{IntegratorType, SimOptions, SimRecord, SimStats, run_sim};
