//! PPRL demo: train FrozenLake agents against a shared encrypted Q-table

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use pprl_core::orchestrator::{identities, run_training, TrainingSummary};
use pprl_core::report::{render_lake, render_path, write_reports};
use pprl_core::{CkksParameters, CryptoContext, EngineKind, FrozenLake, GridSize, PlaintextEngine, TrainingConfig};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "pprl-core", about = "Privacy-preserving multi-agent Q-learning on FrozenLake")]
struct Cli {
    /// Size of the Frozen Lake map
    #[arg(short = 's', long = "size", value_enum)]
    size: GridSize,

    /// Measure the wall time of every secure update
    #[arg(short = 'm', long = "measure")]
    measure: bool,

    /// JSON file with a TrainingConfig; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    agents: Option<usize>,

    /// Episodes of agent 0 per trial
    #[arg(long)]
    episodes: Option<usize>,

    #[arg(long)]
    trials: Option<usize>,

    #[arg(long)]
    epsilon: Option<f64>,

    #[arg(long)]
    seed: Option<u64>,

    #[arg(long, value_enum)]
    engine: Option<EngineKind>,

    /// Ring degree exponent for CKKS
    #[arg(long = "log-n")]
    log_n: Option<u32>,

    #[arg(long = "output-dir", default_value = ".")]
    output_dir: PathBuf,
}

impl Cli {
    fn training_config(&self) -> Result<TrainingConfig, Box<dyn Error>> {
        let mut config = match &self.config {
            Some(path) => TrainingConfig::from_json_file(path)?,
            None => TrainingConfig::default(),
        };
        if let Some(v) = self.agents {
            config.agents = v;
        }
        if let Some(v) = self.episodes {
            config.episodes = v;
        }
        if let Some(v) = self.trials {
            config.trials = v;
        }
        if let Some(v) = self.epsilon {
            config.epsilon = v;
        }
        if let Some(v) = self.seed {
            config.seed = v;
        }
        if let Some(v) = self.engine {
            config.engine = v;
        }
        if let Some(v) = self.log_n {
            config.log_n = v;
        }
        config.measure |= self.measure;
        config.validate()?;
        Ok(config)
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true))
        .init();
}

fn train(lake: &FrozenLake, config: &TrainingConfig) -> Result<TrainingSummary, Box<dyn Error>> {
    let summary = match config.engine {
        EngineKind::Ckks => {
            let mut rng = StdRng::seed_from_u64(config.seed);
            let params = CkksParameters::with_log_n(config.log_n)?;
            let ctx = CryptoContext::setup(params, &identities(config.agents), &mut rng)?;
            run_training(Arc::new(ctx), lake, config)?
        }
        EngineKind::Plain => {
            let engine = PlaintextEngine::new(4, &identities(config.agents));
            run_training(Arc::new(engine), lake, config)?
        }
    };
    Ok(summary)
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_tracing();

    let config = cli.training_config()?;
    let lake = cli.size.lake();
    info!(size = %cli.size, engine = ?config.engine, "starting");

    let summary = train(&lake, &config)?;

    let times: Vec<_> = summary.trials.iter().flat_map(|t| t.update_times.iter().copied()).collect();
    let written = write_reports(
        &cli.output_dir,
        &lake,
        config.agents,
        config.trials,
        &summary.average,
        config.measure.then_some(times.as_slice()),
    )?;
    for path in &written {
        info!(path = %path.display(), "report written");
    }

    if let Some(first) = summary.trials.first() {
        println!("Decrypted Qtable:");
        println!("{}", first.table.render(lake.width()));
        println!("\nGreedy path: {}", render_path(&first.path));
        println!("{}", render_lake(&lake, &first.path));
    }
    if let Some(t) = summary.timing {
        println!("\nSecure update timing:");
        println!("Count: {}", t.count);
        println!("Average time: {:?}", t.mean);
    }
    Ok(())
}
