//! Flight cancellation classifier: trains a random forest on balanced
//! historical flights, evaluates it on a held-out split, and scores a full
//! unlabeled dataset to CSV.

pub mod config;
pub mod encoder;
pub mod error;
pub mod evaluator;
pub mod explore;
pub mod forest;
pub mod loader;
pub mod pipeline;
pub mod scorer;
pub mod trainer;

pub use config::{PipelineConfig, TrainConfig};
pub use encoder::{EncoderBundle, EncodingTable, FEATURE_NAMES};
pub use error::PipelineError;
pub use evaluator::{evaluate, Evaluation};
pub use forest::RandomForest;
pub use loader::{load_csv_file, FlightTable};
pub use pipeline::{run, RunSummary};
pub use scorer::{save_csv_file, score_frame};
pub use trainer::{train, train_test_split, TrainedModel};
