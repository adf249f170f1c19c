//! State checks applied by the driver.

use crate::error::{SimError, SimResult};

/// Fail with `NumericDivergence` if any component is NaN or infinite.
pub(crate) fn ensure_finite_state(t: f64, x: &[f64]) -> SimResult<()> {
    match x.iter().position(|v| !v.is_finite()) {
        None => Ok(()),
        Some(i) => Err(SimError::NumericDivergence {
            what: format!("state[{i}] = {}", x[i]),
            t,
        }),
    }
}

/// Weighted max-norm used for step acceptance: `max |e_i| / (atol + rtol * s_i)`
/// with `s_i = max(|x_i|, |y_i|)`. NaN in any component makes the norm NaN.
pub(crate) fn scaled_max_norm(err: &[f64], x: &[f64], y: &[f64], atol: f64, rtol: f64) -> f64 {
    err.iter()
        .zip(x.iter().zip(y))
        .map(|(e, (a, b))| e.abs() / (atol + rtol * a.abs().max(b.abs())))
        .fold(0.0, |acc, v| if v.is_nan() || v > acc { v } else { acc })
}
