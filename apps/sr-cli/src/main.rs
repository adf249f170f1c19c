use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use sr_controls::{ChannelHistory, EvaporatorMode, LevelVector, SetpointLaw};
use sr_core::{ChannelId, TankId};
use sr_plant::{
    ControllerWiring, GuardPolicy, LevelGuard, PlantConfig, PlantError, SimulationReport,
    SimulationRunner,
};
use sr_sim::{IntegratorType, SimOptions};
use std::collections::BTreeMap;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sr-cli")]
#[command(about = "Syrup line tank-level ramping simulator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct LevelArgs {
    /// ProveUp level (%)
    #[arg(long, default_value_t = 70.0)]
    pu: f64,
    /// IonExchange level (%)
    #[arg(long, default_value_t = 63.0)]
    ix: f64,
    /// Polisher level (%)
    #[arg(long, default_value_t = 60.0)]
    pix: f64,
    /// Evaporator supply level (%)
    #[arg(long, default_value_t = 30.0)]
    evap: f64,
}

impl LevelArgs {
    fn levels(&self) -> LevelVector {
        [self.pu, self.ix, self.pix, self.evap]
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Integrate the tank network and print levels and flow histories
    Run {
        #[command(flatten)]
        levels: LevelArgs,
        /// End time
        #[arg(long, default_value_t = 1.0)]
        t_end: f64,
        /// Number of reported time points on [0, t_end]
        #[arg(long, default_value_t = 100)]
        points: usize,
        #[arg(long, value_enum, default_value_t = IntegratorArg::Dopri54)]
        integrator: IntegratorArg,
        /// Relative tolerance (adaptive only)
        #[arg(long, default_value_t = 1e-6)]
        rtol: f64,
        /// Absolute tolerance (adaptive only)
        #[arg(long, default_value_t = 1e-8)]
        atol: f64,
        /// Fixed step, or the first adaptive step
        #[arg(long, default_value_t = 1e-3)]
        dt: f64,
        #[arg(long, value_enum, default_value_t = WiringArg::Shared)]
        wiring: WiringArg,
        /// Evaporator feed follows its supply level instead of the fixed rate
        #[arg(long)]
        manual_evap: bool,
        #[arg(long, value_enum, default_value_t = GuardArg::Reject)]
        guard: GuardArg,
        /// Report PV/SP once per time point instead of once per evaluation
        #[arg(long)]
        replay: bool,
        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Print the four setpoints for one level vector
    Setpoints {
        #[command(flatten)]
        levels: LevelArgs,
        #[arg(long)]
        manual_evap: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum IntegratorArg {
    Dopri54,
    Rk4,
    Euler,
}

impl From<IntegratorArg> for IntegratorType {
    fn from(arg: IntegratorArg) -> Self {
        match arg {
            IntegratorArg::Dopri54 => IntegratorType::DormandPrince54,
            IntegratorArg::Rk4 => IntegratorType::RK4,
            IntegratorArg::Euler => IntegratorType::ForwardEuler,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum WiringArg {
    Shared,
    Dedicated,
    Bypass,
}

impl From<WiringArg> for ControllerWiring {
    fn from(arg: WiringArg) -> Self {
        match arg {
            WiringArg::Shared => ControllerWiring::Shared,
            WiringArg::Dedicated => ControllerWiring::Dedicated,
            WiringArg::Bypass => ControllerWiring::Bypass,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum GuardArg {
    Reject,
    Clamp,
}

impl From<GuardArg> for GuardPolicy {
    fn from(arg: GuardArg) -> Self {
        match arg {
            GuardArg::Reject => GuardPolicy::Reject,
            GuardArg::Clamp => GuardPolicy::Clamp,
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Plant(#[from] PlantError),
    #[error("JSON output failed: {0}")]
    Json(#[from] serde_json::Error),
}

type CliResult<T> = Result<T, CliError>;

#[derive(Serialize)]
struct JsonOutput<'a> {
    config: &'a PlantConfig,
    report: &'a SimulationReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    replay: Option<&'a BTreeMap<ChannelId, ChannelHistory>>,
}

fn main() -> CliResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            levels,
            t_end,
            points,
            integrator,
            rtol,
            atol,
            dt,
            wiring,
            manual_evap,
            guard,
            replay,
            json,
        } => {
            let config = plant_config(manual_evap)?
                .with_wiring(wiring.into())
                .with_level_guard(LevelGuard::default().with_policy(guard.into()));
            let options = SimOptions::linspace(0.0, t_end, points)
                .with_integrator(integrator.into())
                .with_tolerances(rtol, atol)
                .with_dt(dt);
            let options = SimOptions {
                min_dt: options.min_dt.min(dt),
                ..options
            };
            cmd_run(config, levels.levels(), &options, replay, json)
        }
        Commands::Setpoints {
            levels,
            manual_evap,
        } => cmd_setpoints(&plant_config(manual_evap)?, &levels.levels()),
    }
}

fn plant_config(manual_evap: bool) -> CliResult<PlantConfig> {
    let mode = if manual_evap {
        EvaporatorMode::Manual
    } else {
        EvaporatorMode::Auto
    };
    Ok(PlantConfig::legacy()?.with_evaporator_mode(mode)?)
}

fn cmd_run(
    config: PlantConfig,
    levels: LevelVector,
    options: &SimOptions,
    replay: bool,
    json: bool,
) -> CliResult<()> {
    info!(?levels, points = options.times.len(), "starting run");
    let runner = SimulationRunner::new(config, levels)?;
    let report = runner.run(options)?;
    let replayed = if replay {
        Some(runner.replay(&report)?)
    } else {
        None
    };

    if json {
        let output = JsonOutput {
            config: runner.config(),
            report: &report,
            replay: replayed.as_ref(),
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!(
        "Ran {} points to t = {} ({:?} wiring)",
        report.times.len(),
        report.times.last().copied().unwrap_or_default(),
        runner.config().wiring
    );
    println!(
        "  RHS evaluations: {}  accepted steps: {}  rejected steps: {}",
        report.evaluations, report.stats.accepted_steps, report.stats.rejected_steps
    );

    println!("\nLevels (%):");
    print!("{:>10}", "t");
    for tank in TankId::ALL {
        print!("{:>14}", tank.name());
    }
    println!();
    for (t, x) in report.times.iter().zip(&report.trajectory) {
        print!("{:>10.4}", t);
        for level in x {
            print!("{:>14.6}", level);
        }
        println!();
    }

    match &replayed {
        Some(histories) => print_replay(&report.times, histories),
        None => print_history_summary(&report.histories),
    }
    Ok(())
}

fn print_replay(times: &[f64], histories: &BTreeMap<ChannelId, ChannelHistory>) {
    println!("\nFlows per time point (PV / SP):");
    print!("{:>10}", "t");
    for channel in ChannelId::ALL {
        print!("{:>22}", channel.tag());
    }
    println!();
    for (i, t) in times.iter().enumerate() {
        print!("{:>10.4}", t);
        for channel in ChannelId::ALL {
            match histories.get(&channel) {
                Some(h) => print!("{:>11.3}/{:<10.3}", h.pv[i], h.sp[i]),
                None => print!("{:>22}", "-"),
            }
        }
        println!();
    }
}

fn print_history_summary(histories: &BTreeMap<ChannelId, ChannelHistory>) {
    println!("\nFlow histories (one entry per evaluation):");
    for (channel, history) in histories {
        let Some(last) = history.last() else {
            println!("  {:<5} empty", channel.tag());
            continue;
        };
        let (min, max) = history
            .pv
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &pv| {
                (lo.min(pv), hi.max(pv))
            });
        println!(
            "  {:<5} entries={:<6} pv range=[{:.3}, {:.3}]  last pv={:.3} sp={:.3}",
            channel.tag(),
            history.len(),
            min,
            max,
            last.pv,
            last.sp
        );
    }
}

fn cmd_setpoints(config: &PlantConfig, levels: &LevelVector) -> CliResult<()> {
    println!(
        "Levels: PU={} IX={} PIX={} EVAP={}",
        levels[0], levels[1], levels[2], levels[3]
    );
    for channel in &config.channels {
        let id = channel.channel();
        match channel.law {
            SetpointLaw::ProveUp(law) => {
                let sp = law.evaluate(levels[TankId::ProveUp.index()], levels[TankId::IonExchange.index()]);
                println!(
                    "  {:<5} {:.3}  (ix-limited {:.3}, pu-limited {:.3})",
                    id.tag(),
                    sp.selected,
                    sp.from_ix,
                    sp.from_pu
                );
            }
            law => println!("  {:<5} {:.3}", id.tag(), law.setpoint(levels)),
        }
    }
    Ok(())
}
