//! End-to-end runs of the legacy line: 100 points on [0, 1], unit PI tunings.

use sr_controls::{LinearRamp, OutputLimits, PolisherLaw, SetpointLaw};
use sr_core::{ChannelId, TankId};
use sr_plant::config::LEGACY_INITIAL_LEVELS;
use sr_plant::{
    ControllerWiring, GuardPolicy, LevelGuard, PlantConfig, PlantError, SimulationRunner,
};
use sr_sim::{IntegratorType, SimError, SimOptions};
use std::cell::Cell;
use std::rc::Rc;

fn runner(wiring: ControllerWiring) -> SimulationRunner {
    let config = PlantConfig::legacy().unwrap().with_wiring(wiring);
    SimulationRunner::new(config, LEGACY_INITIAL_LEVELS).unwrap()
}

#[test]
fn shared_wiring_completes_default_run() {
    let report = runner(ControllerWiring::Shared)
        .run(&SimOptions::default())
        .unwrap();

    assert_eq!(report.times.len(), 100);
    assert_eq!(report.trajectory.len(), 100);
    assert_eq!(report.trajectory[0], LEGACY_INITIAL_LEVELS);
    assert_eq!(report.times[99], 1.0);

    // Net flows are a few hundred units against a capacity of 8500.
    for tank in TankId::ALL {
        for level in report.level_series(tank) {
            assert!(level.is_finite());
            let start = LEGACY_INITIAL_LEVELS[tank.index()];
            assert!((level - start).abs() < 0.1, "{tank}: {level}");
        }
    }
}

#[test]
fn histories_follow_evaluations_not_time_points() {
    let report = runner(ControllerWiring::Shared)
        .run(&SimOptions::default())
        .unwrap();

    let attempts = report.stats.accepted_steps + report.stats.rejected_steps;
    assert_eq!(report.evaluations, 7 * attempts);
    assert!(report.evaluations > 100);

    for channel in ChannelId::ALL {
        let history = report.history(channel).unwrap();
        assert_eq!(history.pv.len(), history.sp.len());
        assert_eq!(history.len(), report.evaluations);
    }
}

#[test]
fn shared_flows_stay_inside_leaked_limits() {
    let report = runner(ControllerWiring::Shared)
        .run(&SimOptions::default())
        .unwrap();

    // ProveUp installs [270, 370]; everything after it runs under the
    // IonExchange range [225, 360] because nobody replaces it.
    let pu = report.history(ChannelId::ProveUp).unwrap();
    assert!(pu.pv.iter().all(|pv| (270.0..=370.0).contains(pv)));
    for channel in [ChannelId::IonExchange, ChannelId::Polisher, ChannelId::Evaporator] {
        let history = report.history(channel).unwrap();
        assert!(
            history.pv.iter().all(|pv| (225.0..=360.0).contains(pv)),
            "{channel} left the shared range"
        );
    }
}

#[test]
fn runs_are_bit_identical() {
    let runner = runner(ControllerWiring::Shared);
    let options = SimOptions::default();
    let first = runner.run(&options).unwrap();
    let second = runner.run(&options).unwrap();
    assert_eq!(first, second);
}

#[test]
fn replay_is_index_aligned() {
    let runner = runner(ControllerWiring::Shared);
    let report = runner.run(&SimOptions::default()).unwrap();
    let replay = runner.replay(&report).unwrap();

    for channel in ChannelId::ALL {
        let history = &replay[&channel];
        assert_eq!(history.pv.len(), 100);
        assert_eq!(history.sp.len(), 100);
    }
    // The first replayed setpoint is the law evaluated at the initial levels.
    let law = SetpointLaw::legacy(ChannelId::ProveUp).unwrap();
    assert_eq!(
        replay[&ChannelId::ProveUp].sp[0],
        law.setpoint(&LEGACY_INITIAL_LEVELS)
    );
}

#[test]
fn dedicated_unclamped_loops_run_away() {
    let err = runner(ControllerWiring::Dedicated)
        .run(&SimOptions::default())
        .unwrap_err();
    let ran_away = err.is_divergence()
        || matches!(err, PlantError::Simulation(SimError::OutOfRangeLevel { .. }));
    assert!(ran_away, "unexpected error: {err}");
}

#[test]
fn dedicated_with_limits_everywhere_completes() {
    let pix = OutputLimits::new(225.0, 400.0).unwrap();
    let evap = OutputLimits::new(290.0, 340.0).unwrap();
    let config = PlantConfig::legacy()
        .unwrap()
        .with_output_limits(ChannelId::Polisher, Some(pix))
        .with_output_limits(ChannelId::Evaporator, Some(evap));
    let report = SimulationRunner::new(config.clone(), LEGACY_INITIAL_LEVELS)
        .unwrap()
        .run(&SimOptions::default())
        .unwrap();

    for channel in ChannelId::ALL {
        let limits = config.channel(channel).output_limits.unwrap();
        let history = report.history(channel).unwrap();
        assert!(history.pv.iter().all(|pv| limits.contains(*pv)), "{channel}");
    }
}

#[test]
fn fixed_step_integrators_evaluate_predictably() {
    let runner = runner(ControllerWiring::Shared);

    // Grid and step are exact binary fractions: two steps per interval.
    let rk4 = SimOptions::linspace(0.0, 1.0, 5)
        .with_integrator(IntegratorType::RK4)
        .with_dt(0.125);
    let report = runner.run(&rk4).unwrap();
    assert_eq!(report.stats.accepted_steps, 8);
    assert_eq!(report.evaluations, 32);

    let euler = rk4.with_integrator(IntegratorType::ForwardEuler);
    let report = runner.run(&euler).unwrap();
    assert_eq!(report.evaluations, 8);
}

#[test]
fn observer_counts_match_report() {
    let count = Rc::new(Cell::new(0usize));
    let sink = Rc::clone(&count);
    let report = runner(ControllerWiring::Shared)
        .run_observed(&SimOptions::linspace(0.0, 0.5, 20), move |_| {
            sink.set(sink.get() + 1)
        })
        .unwrap();
    assert_eq!(count.get(), report.evaluations);
}

#[test]
fn misconfigured_laws_are_rejected_before_running() {
    // Inverted level window.
    let err = LinearRamp::new(68.0, 40.0, 225.0, 360.0).unwrap_err();
    assert!(PlantError::from(err).is_configuration());

    // Inverted output limits.
    let err = OutputLimits::new(360.0, 225.0).unwrap_err();
    assert!(PlantError::from(err).is_configuration());

    // Non-finite polisher gain.
    assert!(PolisherLaw::new(f64::NAN, 50.0).is_err());

    // A law in the wrong slot.
    let mut config = PlantConfig::legacy().unwrap();
    config.channels[0].law = SetpointLaw::legacy(ChannelId::Polisher).unwrap();
    let err = SimulationRunner::new(config, LEGACY_INITIAL_LEVELS).unwrap_err();
    assert!(err.is_configuration());
}

#[test]
fn out_of_band_initial_level_is_rejected_or_clamped() {
    let levels = [70.0, 63.0, 60.0, 120.0];

    let config = PlantConfig::legacy()
        .unwrap()
        .with_wiring(ControllerWiring::Shared);
    let err = SimulationRunner::new(config.clone(), levels)
        .unwrap()
        .run(&SimOptions::default())
        .unwrap_err();
    assert!(matches!(
        err,
        PlantError::Simulation(SimError::OutOfRangeLevel { t, .. }) if t == 0.0
    ));

    let config = config.with_level_guard(LevelGuard::default().with_policy(GuardPolicy::Clamp));
    let report = SimulationRunner::new(config, levels)
        .unwrap()
        .run(&SimOptions::linspace(0.0, 1.0, 5))
        .unwrap();
    assert_eq!(report.trajectory[0][TankId::Evaporator.index()], 100.0);
    assert!(report.trajectory.iter().all(|x| x.iter().all(|l| (0.0..=100.0).contains(l))));
}

#[test]
fn report_serializes_with_channel_keys() {
    let report = runner(ControllerWiring::Shared)
        .run(&SimOptions::linspace(0.0, 1.0, 3))
        .unwrap();
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["times"].as_array().unwrap().len(), 3);
    assert!(json["histories"]["ion_exchange"]["pv"].is_array());
    assert_eq!(json["evaluations"], report.evaluations);
}
