use ndarray::{Array1, Array2, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::config::TrainConfig;
use crate::error::{PipelineError, Result};
use crate::forest::{ForestParams, RandomForest};

/// Row indices of the two partitions, in shuffled order.
#[derive(Debug, Clone, PartialEq)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Fitted forest plus the held-out partition it has not seen.
#[derive(Debug)]
pub struct TrainedModel {
    pub forest: RandomForest,
    pub split: Split,
    pub test_records: Array2<f64>,
    pub test_labels: Array1<usize>,
}

/// Number of test rows: `ceil(n_rows * test_fraction)`.
pub fn test_size(n_rows: usize, test_fraction: f64) -> usize {
    (n_rows as f64 * test_fraction).ceil() as usize
}

pub fn train_test_split(n_rows: usize, test_fraction: f64, seed: u64) -> Result<Split> {
    let n_test = test_size(n_rows, test_fraction);
    if n_test == 0 || n_test >= n_rows {
        return Err(PipelineError::Training(format!(
            "cannot split {n_rows} rows with test fraction {test_fraction}: \
             both partitions must be non-empty"
        )));
    }

    let mut indices: Vec<usize> = (0..n_rows).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let train = indices.split_off(n_test);
    Ok(Split {
        train,
        test: indices,
    })
}

/// Splits `records`/`labels`, then fits the forest on the train partition.
pub fn train(
    records: &Array2<f64>,
    labels: &Array1<usize>,
    config: &TrainConfig,
) -> Result<TrainedModel> {
    config.validate()?;
    if records.nrows() != labels.len() {
        return Err(PipelineError::Training(format!(
            "{} feature rows but {} labels",
            records.nrows(),
            labels.len()
        )));
    }

    let split = train_test_split(records.nrows(), config.test_fraction, config.seed)?;
    tracing::info!(
        "training set: {} flights, testing set: {} flights",
        split.train.len(),
        split.test.len()
    );

    let train_records = records.select(Axis(0), &split.train);
    let train_labels = labels.select(Axis(0), &split.train);

    let cancelled = train_labels.iter().filter(|&&label| label == 1).count();
    if cancelled == 0 || cancelled == train_labels.len() {
        return Err(PipelineError::Training(format!(
            "training partition holds a single class ({cancelled} of {} cancelled)",
            train_labels.len()
        )));
    }

    tracing::info!(
        "training random forest with {} trees",
        config.n_estimators
    );
    let forest = RandomForest::fit(
        &train_records,
        &train_labels,
        &ForestParams {
            n_estimators: config.n_estimators,
            seed: config.seed,
        },
    )?;
    tracing::info!("model trained");

    Ok(TrainedModel {
        forest,
        test_records: records.select(Axis(0), &split.test),
        test_labels: labels.select(Axis(0), &split.test),
        split,
    })
}
