//! Bagged ensemble of `linfa-trees` decision trees.
//!
//! Each tree is fitted on a bootstrap sample of the training rows. The
//! positive-class probability of a row is the share of trees voting for
//! class 1. Feature importances are the impurity decrease of every split,
//! weighted by the number of bootstrap rows reaching it, normalized per tree
//! and averaged over the forest.

use linfa::prelude::*;
use linfa::Dataset;
use linfa_trees::{DecisionTree, SplitQuality, TreeNode};
use ndarray::{Array1, Array2, Axis};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::error::{PipelineError, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub seed: u64,
}

#[derive(Debug)]
pub struct RandomForest {
    trees: Vec<DecisionTree<f64, usize>>,
    n_features: usize,
    importances: Vec<f64>,
}

fn bootstrap_indices(rng: &mut ChaCha8Rng, n_rows: usize) -> Vec<usize> {
    (0..n_rows).map(|_| rng.gen_range(0..n_rows)).collect()
}

/// Adds `impurity_decrease * rows reaching the node` for every split below
/// `node`, routing `rows` the way prediction does.
fn accumulate_importance(
    node: &TreeNode<f64, usize>,
    records: &Array2<f64>,
    rows: &[usize],
    importance: &mut [f64],
) {
    if node.is_leaf() || rows.is_empty() {
        return;
    }
    let (feature, threshold, decrease) = node.split();
    importance[feature] += decrease.max(0.0) * rows.len() as f64;

    let (left, right): (Vec<usize>, Vec<usize>) = rows
        .iter()
        .partition(|&&row| records[[row, feature]] < threshold);
    let children = node.children();
    if let Some(child) = children[0] {
        accumulate_importance(child, records, &left, importance);
    }
    if let Some(child) = children[1] {
        accumulate_importance(child, records, &right, importance);
    }
}

/// Sample-weighted importances of one tree, summing to 1, or `None` when the
/// tree never split.
fn tree_importance(tree: &DecisionTree<f64, usize>, records: &Array2<f64>) -> Option<Vec<f64>> {
    let mut importance = vec![0.0; records.ncols()];
    let rows: Vec<usize> = (0..records.nrows()).collect();
    accumulate_importance(tree.root_node(), records, &rows, &mut importance);

    let total: f64 = importance.iter().sum();
    (total > 0.0).then(|| importance.iter().map(|v| v / total).collect())
}

/// Class 1 only on a strict majority, so ties go to class 0.
pub fn classify(probabilities: &Array1<f64>) -> Array1<usize> {
    probabilities.mapv(|probability| usize::from(probability > 0.5))
}

impl RandomForest {
    pub fn fit(
        records: &Array2<f64>,
        labels: &Array1<usize>,
        params: &ForestParams,
    ) -> Result<Self> {
        let (n_rows, n_features) = records.dim();
        if n_rows == 0 {
            return Err(PipelineError::Training("no training rows".to_string()));
        }
        if labels.len() != n_rows {
            return Err(PipelineError::Training(format!(
                "{} labels for {} feature rows",
                labels.len(),
                n_rows
            )));
        }
        if params.n_estimators == 0 {
            return Err(PipelineError::Training(
                "forest needs at least one tree".to_string(),
            ));
        }

        let mut rng = ChaCha8Rng::seed_from_u64(params.seed);
        let mut trees = Vec::with_capacity(params.n_estimators);
        let mut importances = vec![0.0; n_features];
        let mut split_trees = 0usize;

        for _ in 0..params.n_estimators {
            let sample = bootstrap_indices(&mut rng, n_rows);
            let sample_records = records.select(Axis(0), &sample);
            let dataset = Dataset::new(sample_records, labels.select(Axis(0), &sample));

            let tree = DecisionTree::<f64, usize>::params()
                .split_quality(SplitQuality::Gini)
                .max_depth(None)
                .fit(&dataset)
                .map_err(|err: linfa::Error| PipelineError::Training(err.to_string()))?;

            if let Some(tree_importances) = tree_importance(&tree, &dataset.records) {
                for (sum, value) in importances.iter_mut().zip(tree_importances) {
                    *sum += value;
                }
                split_trees += 1;
            }
            trees.push(tree);
        }

        if split_trees > 0 {
            importances.iter_mut().for_each(|v| *v /= split_trees as f64);
        } else {
            importances = vec![1.0 / n_features as f64; n_features];
        }

        tracing::debug!("fitted {} trees on {} rows", trees.len(), n_rows);

        Ok(Self {
            trees,
            n_features,
            importances,
        })
    }

    pub fn n_estimators(&self) -> usize {
        self.trees.len()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Share of trees voting for class 1, per row.
    pub fn predict_proba(&self, records: &Array2<f64>) -> Array1<f64> {
        let mut votes = Array1::<f64>::zeros(records.nrows());
        for tree in &self.trees {
            let predicted: Array1<usize> = tree.predict(records);
            for (vote, &class) in votes.iter_mut().zip(predicted.iter()) {
                if class == 1 {
                    *vote += 1.0;
                }
            }
        }
        votes / self.trees.len() as f64
    }

    pub fn predict(&self, records: &Array2<f64>) -> Array1<usize> {
        classify(&self.predict_proba(records))
    }

    /// Non-negative scores summing to 1, in feature order.
    pub fn feature_importances(&self) -> Vec<f64> {
        self.importances.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn separable() -> (Array2<f64>, Array1<usize>) {
        // class is decided by the second feature alone
        let records = array![
            [1.0, 0.0],
            [2.0, 0.1],
            [3.0, 0.2],
            [4.0, 0.3],
            [5.0, 0.4],
            [1.0, 5.0],
            [2.0, 5.1],
            [3.0, 5.2],
            [4.0, 5.3],
            [5.0, 5.4],
        ];
        let labels = array![0, 0, 0, 0, 0, 1, 1, 1, 1, 1];
        (records, labels)
    }

    fn params(n_estimators: usize) -> ForestParams {
        ForestParams {
            n_estimators,
            seed: 42,
        }
    }

    #[test]
    fn bootstrap_is_reproducible() {
        let a = bootstrap_indices(&mut ChaCha8Rng::seed_from_u64(7), 50);
        let b = bootstrap_indices(&mut ChaCha8Rng::seed_from_u64(7), 50);
        assert_eq!(a, b);
        assert!(a.iter().all(|&i| i < 50));
    }

    #[test]
    fn probabilities_stay_in_unit_interval() {
        let (records, labels) = separable();
        let forest = RandomForest::fit(&records, &labels, &params(25)).unwrap();
        assert_eq!(forest.n_estimators(), 25);

        let probabilities = forest.predict_proba(&records);
        assert_eq!(probabilities.len(), records.nrows());
        assert!(probabilities.iter().all(|p| (0.0..=1.0).contains(p)));
    }

    #[test]
    fn predictions_agree_with_probabilities() {
        let (records, labels) = separable();
        let forest = RandomForest::fit(&records, &labels, &params(15)).unwrap();

        let probabilities = forest.predict_proba(&records);
        let predicted = forest.predict(&records);
        for (p, class) in probabilities.iter().zip(predicted.iter()) {
            assert_eq!(*class, usize::from(*p > 0.5));
        }
    }

    #[test]
    fn importances_are_normalized() {
        let (records, labels) = separable();
        let forest = RandomForest::fit(&records, &labels, &params(20)).unwrap();

        let importances = forest.feature_importances();
        assert_eq!(importances.len(), 2);
        assert!(importances.iter().all(|&v| v >= 0.0));
        assert!((importances.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn informative_feature_dominates_noise() {
        // label follows the sign of feature 0 with 15% flipped; features 1..5 are noise
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let records = Array2::from_shape_fn((800, 5), |_| rng.gen_range(-1.0..1.0));
        let labels = Array1::from_shape_fn(800, |row| {
            let class = usize::from(records[[row, 0]] > 0.0);
            if rng.gen_bool(0.15) {
                1 - class
            } else {
                class
            }
        });

        let forest = RandomForest::fit(&records, &labels, &params(30)).unwrap();
        let importances = forest.feature_importances();

        assert!((importances.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        assert!(importances[0] > 0.45, "{importances:?}");
        for &noise in &importances[1..] {
            assert!(noise < 0.2, "{importances:?}");
        }
    }

    #[test]
    fn classify_breaks_ties_to_not_cancelled() {
        let labels = classify(&array![0.0, 0.5, 0.51, 1.0]);
        assert_eq!(labels, array![0, 0, 1, 1]);
    }

    #[test]
    fn same_seed_same_forest_output() {
        let (records, labels) = separable();
        let a = RandomForest::fit(&records, &labels, &params(10)).unwrap();
        let b = RandomForest::fit(&records, &labels, &params(10)).unwrap();
        assert_eq!(a.predict_proba(&records), b.predict_proba(&records));
    }

    #[test]
    fn rejects_mismatched_labels() {
        let (records, _) = separable();
        let err = RandomForest::fit(&records, &array![0, 1], &params(3)).unwrap_err();
        assert!(matches!(err, PipelineError::Training(_)));
    }
}
