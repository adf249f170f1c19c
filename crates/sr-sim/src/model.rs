//! TransientModel trait for pluggable dynamic systems.

use crate::error::SimResult;

/// Trait for transient (dynamic) system models.
///
/// A TransientModel must implement:
/// - State type (Clone, for snapshots; sliceable, for error norms and checks)
/// - Initial state
/// - RHS (right-hand side) computation: x_dot = f(t, x)
/// - Scalar field arithmetic for integration: add states, scale by scalar
pub trait TransientModel {
    /// State type.
    type State: Clone + AsRef<[f64]>;

    /// Return the initial state.
    fn initial_state(&self) -> Self::State;

    /// Compute state derivative dxdt = f(t, x).
    ///
    /// Takes `&mut self`: models may carry state that advances with every
    /// evaluation (controllers, counters). Integrators call this for trial
    /// stages and rejected steps too, so the number of calls is not the
    /// number of accepted steps.
    fn rhs(&mut self, t: f64, x: &Self::State) -> SimResult<Self::State>;

    /// Add two states element-wise: result = a + b.
    fn add(&self, a: &Self::State, b: &Self::State) -> Self::State;

    /// Scale a state by a scalar: result = scale * a.
    fn scale(&self, a: &Self::State, scale: f64) -> Self::State;

    /// Inspect (and optionally adjust) each accepted state.
    ///
    /// Called by the driver for the initial state and after every accepted
    /// step, after the finiteness check. Returning an error stops the run.
    fn accept(&mut self, _t: f64, x: Self::State) -> SimResult<Self::State> {
        Ok(x)
    }
}
