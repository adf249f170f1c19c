//! Upstream supply feeding the ProveUp tank.

use std::fmt;

/// External inflow into the first tank.
pub trait InflowSource: fmt::Debug {
    /// Flow at integrator time `t`.
    fn inflow(&self, t: f64) -> f64;
}

/// Precoat supply at a fixed rate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstantInflow(pub f64);

impl InflowSource for ConstantInflow {
    fn inflow(&self, _t: f64) -> f64 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_ignores_time() {
        let source = ConstantInflow(300.0);
        assert_eq!(source.inflow(0.0), 300.0);
        assert_eq!(source.inflow(1.0e6), 300.0);
    }
}
