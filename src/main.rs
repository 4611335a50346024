use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::{info, warn};

use elevator_sim::simulation::{Building, DelayDistribution, LogSink, SimConfig};

#[derive(Parser)]
#[command(name = "elevator_sim")]
#[command(about = "Multi-elevator dispatch simulation")]
struct Cli {
    /// Number of floors
    #[arg(short, long, default_value = "5")]
    floors: usize,

    /// Number of elevators
    #[arg(short, long, default_value = "1")]
    elevators: usize,

    /// Number of passengers to generate
    #[arg(short, long, default_value = "10")]
    passengers: usize,

    /// Dispatch policy (first-available, round-robin, shortest-job-first)
    #[arg(short = 'a', long, default_value = "first-available")]
    policy: String,

    /// Passengers per elevator
    #[arg(short, long, default_value = "100")]
    capacity: usize,

    /// Floor where trips start and passengers leave the building
    #[arg(long, default_value = "1")]
    terminal_floor: i32,

    /// Shape of the delay before a dropped passenger picks a new trip
    #[arg(long, value_enum)]
    decision_delay: Option<DecisionDelay>,

    /// Real seconds per simulated second
    #[arg(long, default_value = "0.01")]
    time_scale: f64,

    /// Seed for reproducible runs
    #[arg(long)]
    seed: Option<u64>,

    /// Stop the run after this many wall-clock seconds
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Log every elevator movement
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum DecisionDelay {
    Fixed,
    Uniform,
    Discrete,
    Exponential,
    Normal,
}

impl DecisionDelay {
    fn distribution(self) -> DelayDistribution {
        match self {
            DecisionDelay::Fixed => DelayDistribution::Fixed(Duration::from_secs(10)),
            DecisionDelay::Uniform => DelayDistribution::Uniform {
                min: Duration::from_secs(10),
                max: Duration::from_secs(100),
            },
            DecisionDelay::Discrete => DelayDistribution::DiscreteUniform {
                min_ms: 10_000,
                max_ms: 100_000,
            },
            DecisionDelay::Exponential => DelayDistribution::Exponential {
                mean: Duration::from_secs(10),
            },
            DecisionDelay::Normal => DelayDistribution::NormalMagnitude {
                mean: Duration::from_secs(10),
                std_dev: Duration::from_secs(1),
            },
        }
    }
}

impl Cli {
    fn into_config(self) -> SimConfig {
        let defaults = SimConfig::default();
        SimConfig {
            floors: self.floors,
            elevators: self.elevators,
            passengers: self.passengers,
            capacity: self.capacity,
            policy: self.policy,
            terminal_floor: self.terminal_floor,
            decision_delay: self
                .decision_delay
                .map_or(defaults.decision_delay, DecisionDelay::distribution),
            time_scale: self.time_scale,
            seed: self.seed,
            verbose: self.verbose,
            ..defaults
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "warn,elevator_sim=debug"
    } else {
        "warn,elevator_sim=info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let timeout = cli.timeout_secs.map(Duration::from_secs);
    let config = cli.into_config();
    let sink = Arc::new(LogSink::new(config.verbose));
    let building = Building::new(config, sink).context("invalid simulation setup")?;

    if let Some(limit) = timeout {
        let stop = building.stop_handle();
        thread::Builder::new()
            .name("timeout".into())
            .spawn(move || {
                thread::sleep(limit);
                if !stop.is_triggered() {
                    warn!("Timeout of {}s reached, stopping", limit.as_secs());
                    stop.trigger();
                }
            })
            .context("failed to spawn timeout thread")?;
    }

    info!("Running elevator simulation in headless mode...");
    let report = building.run().context("simulation failed")?;
    report.log();
    Ok(())
}
