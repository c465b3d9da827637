//! Held-out evaluation of a fitted forest.
//!
//! Metrics are derived from the confusion matrix of predicted versus true
//! labels. A zero denominator yields 0.0 for that metric.
//!
//! The counts are taken here rather than through `linfa`'s
//! `ConfusionMatrix`, which only knows the classes that were predicted and
//! drops rows whose true class is not among them.

use std::fmt;

use ndarray::{Array1, Array2};

use crate::error::{PipelineError, Result};
use crate::forest::RandomForest;

pub const CLASS_NAMES: [&str; 2] = ["Not Cancelled", "Cancelled"];

#[derive(Debug, Clone, PartialEq)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationReport {
    pub accuracy: f64,
    /// Indexed by class label.
    pub classes: [ClassMetrics; 2],
    pub macro_avg: ClassMetrics,
    pub weighted_avg: ClassMetrics,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub report: ClassificationReport,
    /// `(feature, importance)` sorted by descending importance.
    pub importances: Vec<(String, f64)>,
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator > 0 {
        numerator as f64 / denominator as f64
    } else {
        0.0
    }
}

fn harmonic_mean(precision: f64, recall: f64) -> f64 {
    if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    }
}

/// Fraction of rows where the prediction equals the label.
pub fn accuracy(predictions: &[usize], labels: &[usize]) -> Result<f64> {
    check_lengths(predictions, labels)?;
    let hits = predictions
        .iter()
        .zip(labels)
        .filter(|(pred, label)| pred == label)
        .count();
    Ok(ratio(hits, labels.len()))
}

fn check_lengths(predictions: &[usize], labels: &[usize]) -> Result<()> {
    if predictions.len() != labels.len() {
        return Err(PipelineError::Evaluation(format!(
            "{} predictions for {} labels",
            predictions.len(),
            labels.len()
        )));
    }
    Ok(())
}

fn class_metrics(class: usize, predictions: &[usize], labels: &[usize]) -> ClassMetrics {
    let mut tp = 0;
    let mut fp = 0;
    let mut fn_count = 0;
    for (&pred, &label) in predictions.iter().zip(labels) {
        match (pred == class, label == class) {
            (true, true) => tp += 1,
            (true, false) => fp += 1,
            (false, true) => fn_count += 1,
            (false, false) => {}
        }
    }

    let precision = ratio(tp, tp + fp);
    let recall = ratio(tp, tp + fn_count);
    ClassMetrics {
        precision,
        recall,
        f1: harmonic_mean(precision, recall),
        support: tp + fn_count,
    }
}

fn weighted_mean(classes: &[ClassMetrics], metric: impl Fn(&ClassMetrics) -> f64) -> f64 {
    let total: usize = classes.iter().map(|c| c.support).sum();
    if total == 0 {
        return 0.0;
    }
    classes
        .iter()
        .map(|c| metric(c) * c.support as f64)
        .sum::<f64>()
        / total as f64
}

pub fn classification_report(
    predictions: &[usize],
    labels: &[usize],
) -> Result<ClassificationReport> {
    check_lengths(predictions, labels)?;
    let classes = [
        class_metrics(0, predictions, labels),
        class_metrics(1, predictions, labels),
    ];
    let total: usize = classes.iter().map(|c| c.support).sum();

    let macro_avg = ClassMetrics {
        precision: classes.iter().map(|c| c.precision).sum::<f64>() / 2.0,
        recall: classes.iter().map(|c| c.recall).sum::<f64>() / 2.0,
        f1: classes.iter().map(|c| c.f1).sum::<f64>() / 2.0,
        support: total,
    };

    let weighted_avg = ClassMetrics {
        precision: weighted_mean(&classes, |c| c.precision),
        recall: weighted_mean(&classes, |c| c.recall),
        f1: weighted_mean(&classes, |c| c.f1),
        support: total,
    };

    Ok(ClassificationReport {
        accuracy: accuracy(predictions, labels)?,
        classes,
        macro_avg,
        weighted_avg,
    })
}

/// Pairs each importance with its feature name, highest first.
pub fn rank_importances(names: &[&str], importances: &[f64]) -> Vec<(String, f64)> {
    let mut ranked: Vec<(String, f64)> = names
        .iter()
        .zip(importances)
        .map(|(name, &score)| (name.to_string(), score))
        .collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    ranked
}

pub fn evaluate(
    forest: &RandomForest,
    test_records: &Array2<f64>,
    test_labels: &Array1<usize>,
    feature_names: &[&str],
) -> Result<Evaluation> {
    let predictions = forest.predict(test_records).to_vec();
    let labels = test_labels.to_vec();

    Ok(Evaluation {
        report: classification_report(&predictions, &labels)?,
        importances: rank_importances(feature_names, &forest.feature_importances()),
    })
}

fn write_row(f: &mut fmt::Formatter<'_>, name: &str, m: &ClassMetrics) -> fmt::Result {
    writeln!(
        f,
        "{:>14} {:>10.2} {:>10.2} {:>10.2} {:>10}",
        name, m.precision, m.recall, m.f1, m.support
    )
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:>14} {:>10} {:>10} {:>10} {:>10}",
            "", "precision", "recall", "f1-score", "support"
        )?;
        for (name, metrics) in CLASS_NAMES.iter().zip(&self.classes) {
            write_row(f, name, metrics)?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "{:>14} {:>10} {:>10} {:>10.2} {:>10}",
            "accuracy", "", "", self.accuracy, self.macro_avg.support
        )?;
        write_row(f, "macro avg", &self.macro_avg)?;
        write_row(f, "weighted avg", &self.weighted_avg)
    }
}

impl fmt::Display for Evaluation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Model accuracy: {:.2}%", self.report.accuracy * 100.0)?;
        writeln!(f)?;
        write!(f, "{}", self.report)?;
        writeln!(f)?;
        writeln!(f, "{:>16} {:>10}", "Feature", "Importance")?;
        for (name, score) in &self.importances {
            writeln!(f, "{:>16} {:>10.6}", name, score)?;
        }
        Ok(())
    }
}
