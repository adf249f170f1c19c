//! Simulation runner and result recording.

use crate::checks::ensure_finite_state;
use crate::error::{SimError, SimResult};
use crate::integrator::{DormandPrince54, ForwardEuler, Integrator, RK4};
use crate::model::TransientModel;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// Integrator selection for simulation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegratorType {
    /// Dormand–Prince 5(4) with adaptive steps (default, 7 rhs calls per attempt).
    #[default]
    DormandPrince54,
    /// 4th-order Runge-Kutta, fixed step (4 rhs calls per step).
    RK4,
    /// Forward Euler, fixed step (1 rhs call per step).
    ForwardEuler,
}

/// Options for simulation runs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimOptions {
    /// Requested output times; the first one is the initial time.
    pub times: Vec<f64>,
    /// Integrator type (default: Dormand–Prince 5(4))
    pub integrator: IntegratorType,
    /// Relative tolerance (adaptive only)
    pub rtol: f64,
    /// Absolute tolerance (adaptive only)
    pub atol: f64,
    /// Initial step for adaptive runs, the step for fixed-step runs
    pub dt: f64,
    /// Smallest step an adaptive run may shrink to
    pub min_dt: f64,
    /// Maximum number of step attempts (safety limit)
    pub max_steps: usize,
}

impl Default for SimOptions {
    fn default() -> Self {
        Self {
            times: sr_core::linspace(0.0, 1.0, 100),
            integrator: IntegratorType::default(),
            rtol: 1e-6,
            atol: 1e-8,
            dt: 1e-3,
            min_dt: 1e-12,
            max_steps: 100_000,
        }
    }
}

impl SimOptions {
    /// Default options over `n` evenly spaced points on `[t0, t1]`.
    pub fn linspace(t0: f64, t1: f64, n: usize) -> Self {
        Self {
            times: sr_core::linspace(t0, t1, n),
            ..Self::default()
        }
    }

    pub fn with_integrator(mut self, integrator: IntegratorType) -> Self {
        self.integrator = integrator;
        self
    }

    pub fn with_tolerances(mut self, rtol: f64, atol: f64) -> Self {
        self.rtol = rtol;
        self.atol = atol;
        self
    }

    pub fn with_dt(mut self, dt: f64) -> Self {
        self.dt = dt;
        self
    }

    pub fn validate(&self) -> SimResult<()> {
        if self.times.is_empty() {
            return Err(SimError::InvalidArg {
                what: "times must not be empty",
            });
        }
        if self.times.iter().any(|t| !t.is_finite()) {
            return Err(SimError::InvalidArg {
                what: "times must be finite",
            });
        }
        if self.times.windows(2).any(|w| w[1] <= w[0]) {
            return Err(SimError::InvalidArg {
                what: "times must be strictly increasing",
            });
        }
        if !(self.dt.is_finite() && self.dt > 0.0) {
            return Err(SimError::InvalidArg {
                what: "dt must be positive",
            });
        }
        if !(self.min_dt.is_finite() && self.min_dt > 0.0 && self.min_dt <= self.dt) {
            return Err(SimError::InvalidArg {
                what: "min_dt must be positive and not exceed dt",
            });
        }
        if self.max_steps == 0 {
            return Err(SimError::InvalidArg {
                what: "max_steps must be positive",
            });
        }
        Ok(())
    }
}

/// Step bookkeeping for one run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimStats {
    pub accepted_steps: usize,
    pub rejected_steps: usize,
}

/// Record of simulation results, one entry per requested time.
#[derive(Clone, Debug)]
pub struct SimRecord<S> {
    /// Time points (the requested grid)
    pub t: Vec<f64>,
    /// State snapshots
    pub x: Vec<S>,
    pub stats: SimStats,
}

/// Run a transient simulation over `opts.times`.
///
/// The integrator takes as many internal steps as it needs between requested
/// points and always lands exactly on each one. Every accepted state is
/// checked for NaN/Inf and then handed to [`TransientModel::accept`].
pub fn run_sim<M: TransientModel>(
    model: &mut M,
    opts: &SimOptions,
) -> SimResult<SimRecord<M::State>> {
    opts.validate()?;

    let adaptive = match opts.integrator {
        IntegratorType::DormandPrince54 => Some(DormandPrince54::new(opts.rtol, opts.atol)?),
        IntegratorType::RK4 | IntegratorType::ForwardEuler => None,
    };

    let t0 = opts.times[0];
    let x0 = model.initial_state();
    ensure_finite_state(t0, x0.as_ref())?;
    let mut x = model.accept(t0, x0)?;

    let mut t_record = Vec::with_capacity(opts.times.len());
    let mut x_record = Vec::with_capacity(opts.times.len());
    t_record.push(t0);
    x_record.push(x.clone());

    let mut stats = SimStats::default();
    let mut t = t0;
    let mut dt = opts.dt;

    debug!(
        integrator = ?opts.integrator,
        points = opts.times.len(),
        t_end = opts.times[opts.times.len() - 1],
        "starting transient run"
    );

    for &t_target in &opts.times[1..] {
        while t < t_target {
            if stats.accepted_steps + stats.rejected_steps >= opts.max_steps {
                return Err(SimError::MaxStepsExceeded {
                    t,
                    max_steps: opts.max_steps,
                });
            }

            let remaining = t_target - t;
            let clipped = dt >= remaining;
            let h = if clipped { remaining } else { dt };

            let x_new = match &adaptive {
                Some(dp) => {
                    let attempt = dp.attempt(model, t, &x, h)?;
                    if attempt.error_norm.is_nan() {
                        return Err(SimError::NumericDivergence {
                            what: "step error estimate is NaN".to_string(),
                            t,
                        });
                    }
                    let proposal = dp.next_dt(h, attempt.error_norm);
                    if !attempt.accepted() {
                        stats.rejected_steps += 1;
                        trace!(t, h, error_norm = attempt.error_norm, "step rejected");
                        if proposal < opts.min_dt {
                            return Err(SimError::StepSizeUnderflow { t, dt: proposal });
                        }
                        dt = proposal;
                        continue;
                    }
                    // A step shortened to land on the grid says nothing about
                    // how large the next one may be.
                    dt = if clipped { proposal.max(dt) } else { proposal };
                    if dt < opts.min_dt {
                        return Err(SimError::StepSizeUnderflow { t: t + h, dt });
                    }
                    attempt.x
                }
                None => match opts.integrator {
                    IntegratorType::ForwardEuler => ForwardEuler.step(model, t, &x, h)?,
                    _ => RK4.step(model, t, &x, h)?,
                },
            };

            t = if clipped { t_target } else { t + h };
            stats.accepted_steps += 1;
            ensure_finite_state(t, x_new.as_ref())?;
            x = model.accept(t, x_new)?;
            trace!(t, h, "step accepted");
        }

        t_record.push(t_target);
        x_record.push(x.clone());
    }

    debug!(
        accepted = stats.accepted_steps,
        rejected = stats.rejected_steps,
        "transient run finished"
    );

    Ok(SimRecord {
        t: t_record,
        x: x_record,
        stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Ramp;

    impl TransientModel for Ramp {
        type State = [f64; 1];

        fn initial_state(&self) -> Self::State {
            [0.0]
        }

        fn rhs(&mut self, _t: f64, _x: &Self::State) -> SimResult<Self::State> {
            Ok([2.0])
        }

        fn add(&self, a: &Self::State, b: &Self::State) -> Self::State {
            [a[0] + b[0]]
        }

        fn scale(&self, a: &Self::State, scale: f64) -> Self::State {
            [a[0] * scale]
        }
    }

    #[test]
    fn sim_options_defaults() {
        let opts = SimOptions::default();
        assert_eq!(opts.times.len(), 100);
        assert_eq!(opts.times[0], 0.0);
        assert_eq!(opts.times[99], 1.0);
        assert_eq!(opts.integrator, IntegratorType::DormandPrince54);
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn sim_options_invalid() {
        let bad = [
            SimOptions {
                times: vec![],
                ..SimOptions::default()
            },
            SimOptions {
                times: vec![0.0, 0.5, 0.5],
                ..SimOptions::default()
            },
            SimOptions {
                times: vec![0.0, f64::NAN],
                ..SimOptions::default()
            },
            SimOptions::default().with_dt(0.0),
            SimOptions {
                min_dt: 1.0,
                ..SimOptions::default()
            },
            SimOptions {
                max_steps: 0,
                ..SimOptions::default()
            },
        ];
        for opts in bad {
            assert!(
                matches!(run_sim(&mut Ramp, &opts), Err(SimError::InvalidArg { .. })),
                "{opts:?} should be rejected"
            );
        }
    }

    #[test]
    fn lands_on_every_requested_time() {
        for integrator in [
            IntegratorType::DormandPrince54,
            IntegratorType::RK4,
            IntegratorType::ForwardEuler,
        ] {
            let opts = SimOptions::linspace(0.0, 1.0, 7)
                .with_integrator(integrator)
                .with_dt(0.03);
            let record = run_sim(&mut Ramp, &opts).unwrap();
            assert_eq!(record.t, opts.times);
            assert_eq!(record.x.len(), 7);
            for (t, x) in record.t.iter().zip(&record.x) {
                assert!((x[0] - 2.0 * t).abs() < 1e-9, "{integrator:?} at t={t}");
            }
        }
    }

    #[test]
    fn single_point_returns_initial_state() {
        let opts = SimOptions {
            times: vec![0.25],
            ..SimOptions::default()
        };
        let record = run_sim(&mut Ramp, &opts).unwrap();
        assert_eq!(record.t, vec![0.25]);
        assert_eq!(record.x, vec![[0.0]]);
        assert_eq!(record.stats, SimStats::default());
    }

    #[test]
    fn step_limit_is_enforced() {
        let opts = SimOptions {
            max_steps: 3,
            ..SimOptions::linspace(0.0, 1.0, 2)
                .with_integrator(IntegratorType::ForwardEuler)
                .with_dt(0.01)
        };
        let err = run_sim(&mut Ramp, &opts).unwrap_err();
        assert!(matches!(err, SimError::MaxStepsExceeded { max_steps: 3, .. }));
        assert!(err.is_divergence());
    }
}
