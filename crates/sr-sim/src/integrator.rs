//! Time integrators: fixed-step RK4 / forward Euler and adaptive Dormand–Prince 5(4).

use crate::checks::scaled_max_norm;
use crate::error::{SimError, SimResult};
use crate::model::TransientModel;

/// Trait for fixed-step time integrators.
pub trait Integrator {
    /// Advance state by one time step using the transient model.
    fn step<M: TransientModel>(
        &self,
        model: &mut M,
        t: f64,
        x: &M::State,
        dt: f64,
    ) -> SimResult<M::State>;
}

/// Classical RK4 (Runge-Kutta 4th order) integrator.
#[derive(Clone, Debug)]
pub struct RK4;

impl Integrator for RK4 {
    fn step<M: TransientModel>(
        &self,
        model: &mut M,
        t: f64,
        x: &M::State,
        dt: f64,
    ) -> SimResult<M::State> {
        let k1 = model.rhs(t, x)?;

        let x2 = model.add(x, &model.scale(&k1, 0.5 * dt));
        let k2 = model.rhs(t + 0.5 * dt, &x2)?;

        let x3 = model.add(x, &model.scale(&k2, 0.5 * dt));
        let k3 = model.rhs(t + 0.5 * dt, &x3)?;

        let x4 = model.add(x, &model.scale(&k3, dt));
        let k4 = model.rhs(t + dt, &x4)?;

        // Combine: x_new = x + (dt/6) * (k1 + 2*k2 + 2*k3 + k4)
        let k_sum = model.add(
            &model.add(&k1, &model.scale(&k2, 2.0)),
            &model.add(&model.scale(&k3, 2.0), &k4),
        );

        Ok(model.add(x, &model.scale(&k_sum, dt / 6.0)))
    }
}

/// Forward Euler (explicit, 1st order, fast for testing).
/// Calls rhs() once per step instead of 4 times (RK4).
#[derive(Clone, Debug)]
pub struct ForwardEuler;

impl Integrator for ForwardEuler {
    fn step<M: TransientModel>(
        &self,
        model: &mut M,
        t: f64,
        x: &M::State,
        dt: f64,
    ) -> SimResult<M::State> {
        let xdot = model.rhs(t, x)?;
        Ok(model.add(x, &model.scale(&xdot, dt)))
    }
}

/// Result of one adaptive step attempt.
#[derive(Clone, Debug)]
pub struct AdaptiveAttempt<S> {
    /// Fifth-order candidate state.
    pub x: S,
    /// Scaled error norm; the attempt is acceptable when `<= 1`.
    pub error_norm: f64,
}

impl<S> AdaptiveAttempt<S> {
    pub fn accepted(&self) -> bool {
        self.error_norm <= 1.0
    }
}

// Dormand–Prince 5(4) tableau.
const C: [f64; 7] = [0.0, 1.0 / 5.0, 3.0 / 10.0, 4.0 / 5.0, 8.0 / 9.0, 1.0, 1.0];

#[rustfmt::skip]
const A: [&[f64]; 6] = [
    &[1.0 / 5.0],
    &[3.0 / 40.0, 9.0 / 40.0],
    &[44.0 / 45.0, -56.0 / 15.0, 32.0 / 9.0],
    &[19372.0 / 6561.0, -25360.0 / 2187.0, 64448.0 / 6561.0, -212.0 / 729.0],
    &[9017.0 / 3168.0, -355.0 / 33.0, 46732.0 / 5247.0, 49.0 / 176.0, -5103.0 / 18656.0],
    &[35.0 / 384.0, 0.0, 500.0 / 1113.0, 125.0 / 192.0, -2187.0 / 6784.0, 11.0 / 84.0],
];

// Fifth-order weights (same as the last row of A).
const B: [f64; 6] = [35.0 / 384.0, 0.0, 500.0 / 1113.0, 125.0 / 192.0, -2187.0 / 6784.0, 11.0 / 84.0];

// Difference between fifth- and fourth-order weights.
const E: [f64; 7] = [
    71.0 / 57600.0,
    0.0,
    -71.0 / 16695.0,
    71.0 / 1920.0,
    -17253.0 / 339200.0,
    22.0 / 525.0,
    -1.0 / 40.0,
];

/// Dormand–Prince 5(4) adaptive Runge-Kutta integrator.
///
/// Seven right-hand-side evaluations per attempt, including rejected
/// attempts. The seventh stage is evaluated at the candidate state and is not
/// reused as the first stage of the next step.
#[derive(Clone, Debug)]
pub struct DormandPrince54 {
    /// Relative error tolerance.
    pub rtol: f64,
    /// Absolute error tolerance.
    pub atol: f64,
    /// Safety factor applied to the optimal step estimate.
    pub safety: f64,
    /// Smallest factor a single rejection may shrink the step by.
    pub min_factor: f64,
    /// Largest factor a single acceptance may grow the step by.
    pub max_factor: f64,
}

impl DormandPrince54 {
    pub fn new(rtol: f64, atol: f64) -> SimResult<Self> {
        if !(rtol.is_finite() && rtol >= 0.0 && atol.is_finite() && atol >= 0.0) {
            return Err(SimError::InvalidArg {
                what: "tolerances must be finite and non-negative",
            });
        }
        if rtol == 0.0 && atol == 0.0 {
            return Err(SimError::InvalidArg {
                what: "rtol and atol cannot both be zero",
            });
        }
        Ok(Self {
            rtol,
            atol,
            safety: 0.9,
            min_factor: 0.2,
            max_factor: 5.0,
        })
    }

    /// Take one trial step of size `dt` from `(t, x)`.
    pub fn attempt<M: TransientModel>(
        &self,
        model: &mut M,
        t: f64,
        x: &M::State,
        dt: f64,
    ) -> SimResult<AdaptiveAttempt<M::State>> {
        let mut k: Vec<M::State> = Vec::with_capacity(7);
        k.push(model.rhs(t, x)?);

        for (stage, row) in A.iter().enumerate() {
            let xi = combine(model, x, row, &k, dt);
            k.push(model.rhs(t + C[stage + 1] * dt, &xi)?);
        }

        let x_new = combine(model, x, &B, &k, dt);

        let mut err = model.scale(&k[0], E[0] * dt);
        for (e, ki) in E.iter().zip(&k).skip(1) {
            if *e != 0.0 {
                err = model.add(&err, &model.scale(ki, e * dt));
            }
        }

        let error_norm = scaled_max_norm(
            err.as_ref(),
            x.as_ref(),
            x_new.as_ref(),
            self.atol,
            self.rtol,
        );

        Ok(AdaptiveAttempt {
            x: x_new,
            error_norm,
        })
    }

    /// Step size to use after an attempt of size `dt` with the given error norm.
    pub fn next_dt(&self, dt: f64, error_norm: f64) -> f64 {
        let factor = if error_norm == 0.0 {
            self.max_factor
        } else {
            // Exponent 1/5: the embedded solution is 4th order.
            (self.safety * error_norm.powf(-0.2)).clamp(self.min_factor, self.max_factor)
        };
        dt * factor
    }
}

/// `x + dt * sum(coef_i * k_i)`, skipping zero coefficients.
fn combine<M: TransientModel>(model: &M, x: &M::State, coefs: &[f64], k: &[M::State], dt: f64) -> M::State {
    coefs
        .iter()
        .zip(k)
        .filter(|(c, _)| **c != 0.0)
        .fold(x.clone(), |acc, (c, ki)| model.add(&acc, &model.scale(ki, c * dt)))
}
