//! `randomizer` CLI: generate, replay and manage random traffic scenarios.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use scenario::config::{parse_seed, DEFAULT_VEHICLE_POOL};
use scenario::{
    EnvConfig, GenerateRequest, GenerationReport, ScenarioConfig, ScenarioGenerator, ScenarioKey,
    ScenarioReplayer, ScenarioStore, SpacingParams, WeatherParams,
};
use sim_client::{Simulator, TcpTransport};
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Parser)]
#[command(name = "randomizer", about = "Random traffic scenario generator and replayer")]
struct Cli {
    /// Simulator host (overrides SIMULATOR_HOST)
    #[arg(long, global = true)]
    host: Option<String>,
    /// Simulator port (overrides SIMULATOR_PORT)
    #[arg(long, global = true)]
    port: Option<u16>,
    /// Scenario store directory (overrides SCENARIO_STORE_DIR)
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate, run and store new scenarios.
    Run(RunArgs),
    /// Re-run a stored scenario.
    Replay {
        /// 4-digit replay key, e.g. 0003
        key: ScenarioKey,
    },
    /// List stored replay keys.
    List,
    /// Delete every stored scenario.
    Clear,
    /// Copy selected scenarios into another directory.
    Export {
        dest: PathBuf,
        #[arg(required = true)]
        keys: Vec<ScenarioKey>,
    },
    /// Replace the store with a previously exported directory.
    Import { src: PathBuf },
}

#[derive(Args)]
struct RunArgs {
    /// Ego vehicle name as registered with the simulator
    #[arg(long)]
    vehicle: String,
    #[arg(long)]
    map: String,
    #[arg(long, default_value_t = 5)]
    npcs: usize,
    /// Simulated seconds per run
    #[arg(long, default_value_t = 30.0)]
    runtime: f64,
    #[arg(long, default_value_t = 1.0)]
    timescale: f64,
    /// Seed; omitted or blank picks a random one per run
    #[arg(long)]
    seed: Option<String>,
    /// Minimum forward gap between vehicles (m)
    #[arg(long, default_value_t = 5.0)]
    min_gap: f64,
    #[arg(long, default_value_t = 10.0)]
    spawn_radius_min: f64,
    #[arg(long, default_value_t = 500.0)]
    spawn_radius_max: f64,
    /// NPC vehicle types, comma separated
    #[arg(long, value_delimiter = ',')]
    vehicles: Vec<String>,
    /// Weather values in [0, 1]; omitted values are random
    #[arg(long)]
    rain: Option<f64>,
    #[arg(long)]
    fog: Option<f64>,
    #[arg(long)]
    wetness: Option<f64>,
    /// Hour of day in [0, 24]; omitted is random
    #[arg(long)]
    time_of_day: Option<f64>,
    /// Freeze the clock at --time-of-day
    #[arg(long)]
    fixed_time: bool,
    /// Repeat the generation this many times
    #[arg(long, default_value_t = 1)]
    runs: usize,
    /// Write the generated records to a JSON file
    #[arg(long)]
    output: Option<PathBuf>,
}

impl RunArgs {
    fn request(&self) -> Result<GenerateRequest> {
        let seed = match &self.seed {
            Some(raw) => parse_seed(raw)?,
            None => None,
        };
        let vehicle_pool = if self.vehicles.is_empty() {
            DEFAULT_VEHICLE_POOL.iter().map(|s| s.to_string()).collect()
        } else {
            self.vehicles.clone()
        };
        Ok(GenerateRequest {
            vehicle_name: self.vehicle.clone(),
            npc_count: self.npcs,
            map: self.map.clone(),
            runtime: self.runtime,
            timescale: self.timescale,
            seed,
            spacing: SpacingParams {
                min_gap: self.min_gap,
                spawn_radius_min: self.spawn_radius_min,
                spawn_radius_max: self.spawn_radius_max,
            },
            vehicle_pool,
            weather: WeatherParams {
                rain: self.rain,
                fog: self.fog,
                wetness: self.wetness,
                time_of_day: self.time_of_day,
                fixed_time: self.fixed_time,
            },
        })
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let mut env = EnvConfig::from_env()?;
    if let Some(host) = cli.host {
        env.simulator_host = host;
    }
    if let Some(port) = cli.port {
        env.simulator_port = port;
    }
    let store = match cli.store.or_else(|| env.store_dir.clone()) {
        Some(dir) => ScenarioStore::open(dir),
        None => ScenarioStore::default_location(),
    };
    tracing::debug!(
        host = %env.simulator_host,
        port = env.simulator_port,
        store = %store.root().display(),
        bridge = env.bridge.is_some(),
        "configuration resolved"
    );
    let config = ScenarioConfig {
        bridge: env.bridge.clone(),
        ..Default::default()
    };

    match cli.command {
        Commands::Run(args) => run(&env, &store, config, &args)?,
        Commands::Replay { key } => {
            let mut sim = connect(&env)?;
            let report = ScenarioReplayer::new(config).replay(&mut sim, &store, key)?;
            println!("{report}");
        }
        Commands::List => list(&store)?,
        Commands::Clear => {
            store.clear()?;
            println!("Cleared {}", store.root().display());
        }
        Commands::Export { dest, keys } => {
            let count = store.export(&keys, &dest)?;
            println!("Exported {count} scenario(s) to {}", dest.display());
        }
        Commands::Import { src } => {
            let keys = store.import(&src)?;
            if keys.is_empty() {
                println!("Nothing to import from {}", src.display());
            } else {
                println!("Imported {} scenario(s) from {}", keys.len(), src.display());
            }
        }
    }

    Ok(())
}

fn connect(env: &EnvConfig) -> Result<Simulator<TcpTransport>> {
    Simulator::connect(&env.simulator_host, env.simulator_port, CONNECT_TIMEOUT).with_context(|| {
        format!(
            "connecting to simulator at {}:{}",
            env.simulator_host, env.simulator_port
        )
    })
}

fn run(env: &EnvConfig, store: &ScenarioStore, config: ScenarioConfig, args: &RunArgs) -> Result<()> {
    let request = args.request()?;
    let generator = ScenarioGenerator::new(config);
    let mut reports: Vec<GenerationReport> = Vec::with_capacity(args.runs);

    for i in 0..args.runs {
        // Fresh session per run; a halted run leaves the old one unusable.
        let mut sim = connect(env)?;
        let report = generator
            .generate(&mut sim, store, &request)
            .with_context(|| format!("run {} of {}", i + 1, args.runs))?;
        println!("{report}\n");
        reports.push(report);
    }

    if let Some(path) = &args.output {
        save_records(&reports, path)?;
        println!("Records saved to {}", path.display());
    }
    Ok(())
}

fn save_records(reports: &[GenerationReport], path: &Path) -> Result<()> {
    let records: Vec<_> = reports.iter().map(|r| &r.record).collect();
    let json = serde_json::to_string_pretty(&records)?;
    std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

fn list(store: &ScenarioStore) -> Result<()> {
    match store.list_keys() {
        Ok(keys) if keys.is_empty() => println!("Registry is empty"),
        Ok(keys) => {
            for key in keys {
                println!("{key}");
            }
        }
        Err(e) if e.is_not_found() => println!("No scenarios stored in {}", store.root().display()),
        Err(e) => return Err(e.into()),
    }
    Ok(())
}
