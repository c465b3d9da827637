use std::path::PathBuf;

use crate::error::{PipelineError, Result};

pub const DEFAULT_TRAINING_PATH: &str = "flights_cancellation_ml.csv";
pub const DEFAULT_FULL_PATH: &str = "flights_full_for_predictions.csv";
pub const DEFAULT_OUTPUT_PATH: &str = "flights_with_ml_predictions.csv";

/// Code assigned to categorical values never seen during training.
pub const UNSEEN_CODE: i64 = -1;

/// Split and forest parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainConfig {
    pub test_fraction: f64,
    pub seed: u64,
    pub n_estimators: usize,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            test_fraction: 0.2,
            seed: 42,
            n_estimators: 100,
        }
    }
}

impl TrainConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            return Err(PipelineError::InvalidConfig(format!(
                "test_fraction must be in (0, 1), got {}",
                self.test_fraction
            )));
        }
        if self.n_estimators == 0 {
            return Err(PipelineError::InvalidConfig(
                "n_estimators must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Everything one run needs: where to read, where to write, how to train.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub training_path: PathBuf,
    pub full_path: PathBuf,
    pub output_path: PathBuf,
    pub train: TrainConfig,
    pub unseen_code: i64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            training_path: PathBuf::from(DEFAULT_TRAINING_PATH),
            full_path: PathBuf::from(DEFAULT_FULL_PATH),
            output_path: PathBuf::from(DEFAULT_OUTPUT_PATH),
            train: TrainConfig::default(),
            unseen_code: UNSEEN_CODE,
        }
    }
}
