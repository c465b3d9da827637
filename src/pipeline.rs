use std::fmt;
use std::path::PathBuf;

use ndarray::Array1;

use crate::config::PipelineConfig;
use crate::encoder::{EncoderBundle, FEATURE_NAMES};
use crate::error::Result;
use crate::evaluator::{evaluate, Evaluation};
use crate::explore::{summarize, DatasetSummary};
use crate::loader::{load_csv_file, IS_CANCELLED, RECORD_COLUMNS, TRAINING_COLUMNS};
use crate::scorer::{save_csv_file, score_frame, ScoringSummary};
use crate::trainer::train;

/// Everything a run reports once it finishes.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub dataset: DatasetSummary,
    pub train_rows: usize,
    pub test_rows: usize,
    pub n_estimators: usize,
    pub evaluation: Evaluation,
    pub scoring: ScoringSummary,
    pub output_path: PathBuf,
}

fn banner(title: &str) {
    println!("\n{}\n{title}\n{}", "=".repeat(50), "=".repeat(50));
}

pub fn run(config: &PipelineConfig) -> Result<RunSummary> {
    config.train.validate()?;

    // 1. Load the balanced training table
    let training = load_csv_file(&config.training_path, &TRAINING_COLUMNS)?;

    // 2. Explore
    let dataset = summarize(&training)?;
    banner("DATA EXPLORATION");
    println!("{dataset}");

    // 3. Encode categorical columns
    let encoders = EncoderBundle::fit(&training)?;
    tracing::info!(
        "unique carriers: {}, origins: {}, destinations: {}",
        encoders.carrier.len(),
        encoders.origin.len(),
        encoders.dest.len()
    );
    let records = encoders.features(&training, config.unseen_code)?.records;
    let labels = Array1::from(training.label_column(IS_CANCELLED)?);

    // 4. Split and train
    let model = train(&records, &labels, &config.train)?;

    // 5. Evaluate on the held-out partition
    let evaluation = evaluate(
        &model.forest,
        &model.test_records,
        &model.test_labels,
        &FEATURE_NAMES,
    )?;
    banner("MODEL EVALUATION");
    println!("{evaluation}");

    // 6. Score the full dataset
    let full = load_csv_file(&config.full_path, &RECORD_COLUMNS)?;
    let mut scored = score_frame(full, &model.forest, &encoders, config.unseen_code)?;
    banner("APPLYING PREDICTIONS TO FULL DATASET");
    println!("{}", scored.summary);

    // 7. Save
    save_csv_file(&mut scored.frame, &config.output_path)?;

    let summary = RunSummary {
        dataset,
        train_rows: model.split.train.len(),
        test_rows: model.split.test.len(),
        n_estimators: model.forest.n_estimators(),
        evaluation,
        scoring: scored.summary,
        output_path: config.output_path.clone(),
    };
    banner("PROJECT SUMMARY");
    println!("{summary}");

    Ok(summary)
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Data:")?;
        writeln!(f, "  - Training samples: {}", self.train_rows)?;
        writeln!(f, "  - Testing samples: {}", self.test_rows)?;
        writeln!(f, "  - Full dataset predictions: {}", self.scoring.rows)?;
        writeln!(f)?;
        writeln!(f, "Model performance:")?;
        writeln!(f, "  - Algorithm: Random Forest Classifier")?;
        writeln!(
            f,
            "  - Accuracy: {:.2}%",
            self.evaluation.report.accuracy * 100.0
        )?;
        writeln!(f, "  - Trees: {}", self.n_estimators)?;
        writeln!(f)?;
        writeln!(f, "Output:")?;
        writeln!(f, "  - File: {}", self.output_path.display())?;
        writeln!(f)?;
        // probabilities come from balanced training data and are not recalibrated
        writeln!(
            f,
            "Note: training data was balanced ({} cancelled / {} not cancelled).",
            self.dataset.cancelled, self.dataset.not_cancelled
        )?;
        write!(
            f,
            "      Recalibrate the decision threshold for the true ~2% base rate \
             before production use."
        )
    }
}
