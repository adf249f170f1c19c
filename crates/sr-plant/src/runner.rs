//! Simulation runner: builds a network, integrates it and collects a report.

use crate::config::PlantConfig;
use crate::error::{PlantError, PlantResult};
use crate::network::{EvaluationRecord, Levels, TankNetwork};
use serde::Serialize;
use sr_controls::{ChannelHistory, LevelVector};
use sr_core::{ChannelId, TankId};
use sr_sim::{SimOptions, SimStats, run_sim};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Outcome of one run.
///
/// `trajectory[i]` holds the levels at `times[i]`. The histories hold one
/// entry per right-hand-side evaluation and are not aligned with `times`;
/// use [`SimulationRunner::replay`] for per-time-point series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationReport {
    pub times: Vec<f64>,
    pub trajectory: Vec<LevelVector>,
    pub histories: BTreeMap<ChannelId, ChannelHistory>,
    pub evaluations: usize,
    pub stats: SimStats,
}

impl SimulationReport {
    /// Level of one tank at every requested time.
    pub fn level_series(&self, tank: TankId) -> Vec<f64> {
        self.trajectory.iter().map(|x| x[tank.index()]).collect()
    }

    pub fn final_levels(&self) -> Option<LevelVector> {
        self.trajectory.last().copied()
    }

    pub fn history(&self, channel: ChannelId) -> Option<&ChannelHistory> {
        self.histories.get(&channel)
    }
}

/// Runs the tank network for a fixed configuration and initial levels.
#[derive(Debug, Clone)]
pub struct SimulationRunner {
    config: PlantConfig,
    initial: Levels,
}

impl SimulationRunner {
    /// # Errors
    ///
    /// Returns a configuration error if the table is invalid or an initial
    /// level is not finite. Nothing is integrated.
    pub fn new(config: PlantConfig, initial_levels: LevelVector) -> PlantResult<Self> {
        let initial = Levels::new(initial_levels);
        // Building a network runs every construction-time check.
        TankNetwork::new(&config, initial)?;
        Ok(Self { config, initial })
    }

    pub fn config(&self) -> &PlantConfig {
        &self.config
    }

    pub fn initial_levels(&self) -> LevelVector {
        self.initial.to_array()
    }

    /// A fresh network with empty histories and zeroed engines.
    pub fn network(&self) -> PlantResult<TankNetwork> {
        TankNetwork::new(&self.config, self.initial)
    }

    /// Integrate over `options.times` and collect the report.
    ///
    /// Each call starts from fresh controller state, so repeated runs with
    /// the same inputs produce identical reports.
    pub fn run(&self, options: &SimOptions) -> PlantResult<SimulationReport> {
        let network = self.network()?;
        self.execute(network, options)
    }

    /// Like [`run`](Self::run), calling `observer` after every evaluation.
    pub fn run_observed(
        &self,
        options: &SimOptions,
        observer: impl FnMut(&EvaluationRecord) + 'static,
    ) -> PlantResult<SimulationReport> {
        let mut network = self.network()?;
        network.set_observer(observer);
        self.execute(network, options)
    }

    fn execute(&self, mut network: TankNetwork, options: &SimOptions) -> PlantResult<SimulationReport> {
        info!(
            wiring = ?self.config.wiring,
            integrator = ?options.integrator,
            points = options.times.len(),
            "running tank network"
        );

        let record = run_sim(&mut network, options).map_err(|e| {
            debug!(error = %e, evaluations = network.evaluations(), "run aborted");
            PlantError::from(e)
        })?;

        let evaluations = network.evaluations();
        info!(
            evaluations,
            accepted = record.stats.accepted_steps,
            rejected = record.stats.rejected_steps,
            "run finished"
        );

        Ok(SimulationReport {
            times: record.t,
            trajectory: record.x.iter().map(Levels::to_array).collect(),
            histories: network.take_histories(),
            evaluations,
            stats: record.stats,
        })
    }

    /// Re-evaluate fresh controllers once per reported time point.
    ///
    /// The result has exactly one entry per element of `report.times` for
    /// every channel. Controller state evolves across the replay in order,
    /// so the series differ from the in-run histories.
    pub fn replay(&self, report: &SimulationReport) -> PlantResult<BTreeMap<ChannelId, ChannelHistory>> {
        let mut network = self.network()?;
        for (t, levels) in report.times.iter().zip(&report.trajectory) {
            network.invoke_channels(*t, levels)?;
        }
        Ok(network.take_histories())
    }
}
