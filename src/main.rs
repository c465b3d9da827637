use std::path::PathBuf;

use clap::Parser;
use flight_cancellation_predictor::config::{
    DEFAULT_FULL_PATH, DEFAULT_OUTPUT_PATH, DEFAULT_TRAINING_PATH, UNSEEN_CODE,
};
use flight_cancellation_predictor::{run, PipelineConfig, TrainConfig};
use tracing_subscriber::EnvFilter;

// Training script and entry point
// 1. Load the balanced training CSV
// 2. Explore and encode it
// 3. Split, train and evaluate the random forest
// 4. Score the full dataset and save it for visualization

#[derive(Parser)]
#[command(
    name = "flight-cancellation-predictor",
    about = "Train a flight cancellation classifier and score a full dataset"
)]
struct Cli {
    /// Labeled, balanced training CSV.
    #[arg(long, default_value = DEFAULT_TRAINING_PATH)]
    training: PathBuf,

    /// Unlabeled CSV to score.
    #[arg(long, default_value = DEFAULT_FULL_PATH)]
    full: PathBuf,

    /// Destination of the scored CSV.
    #[arg(long, default_value = DEFAULT_OUTPUT_PATH)]
    output: PathBuf,

    #[arg(long, default_value_t = 0.2)]
    test_fraction: f64,

    #[arg(long, default_value_t = 42)]
    seed: u64,

    #[arg(long, default_value_t = 100)]
    n_estimators: usize,

    /// Code used for categories never seen during training.
    #[arg(long, default_value_t = UNSEEN_CODE, allow_negative_numbers = true)]
    unseen_code: i64,
}

impl From<Cli> for PipelineConfig {
    fn from(cli: Cli) -> Self {
        PipelineConfig {
            training_path: cli.training,
            full_path: cli.full,
            output_path: cli.output,
            train: TrainConfig {
                test_fraction: cli.test_fraction,
                seed: cli.seed,
                n_estimators: cli.n_estimators,
            },
            unseen_code: cli.unseen_code,
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = PipelineConfig::from(Cli::parse());
    tracing::info!("starting training run: {:?}", config);

    run(&config).map_err(|err| {
        let stage = err.stage();
        anyhow::Error::new(err)
            .context(format!("flight cancellation run aborted during {stage} stage"))
    })?;

    tracing::info!("ML pipeline complete");
    Ok(())
}
