use std::fmt;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use polars::prelude::*;

use crate::encoder::EncoderBundle;
use crate::error::{PipelineError, Result};
use crate::forest::{classify, RandomForest};
use crate::loader::FlightTable;

pub const PREDICTION_COLUMN: &str = "CANCELLATION_PREDICTION";
pub const PROBABILITY_COLUMN: &str = "CANCELLATION_PROBABILITY";

#[derive(Debug, Clone, PartialEq)]
pub struct ScoringSummary {
    pub rows: usize,
    pub predicted_cancellations: usize,
    pub mean_probability: f64,
    pub rows_with_unseen: usize,
}

#[derive(Debug)]
pub struct ScoredTable {
    pub frame: DataFrame,
    pub summary: ScoringSummary,
}

/// Appends a predicted label and positive-class probability to every row
/// of `table`. Row count and order are preserved; unseen categories are
/// encoded as `unseen_code` rather than rejected.
pub fn score_frame(
    table: FlightTable,
    forest: &RandomForest,
    encoders: &EncoderBundle,
    unseen_code: i64,
) -> Result<ScoredTable> {
    let features = encoders.features(&table, unseen_code)?;
    if features.unseen_rows > 0 {
        tracing::warn!(
            "{} of {} rows carry categories unseen during training; encoded as {}",
            features.unseen_rows,
            table.height(),
            unseen_code
        );
    }

    let probabilities = forest.predict_proba(&features.records);
    let predictions: Vec<i64> = classify(&probabilities)
        .iter()
        .map(|&class| class as i64)
        .collect();
    let probabilities = probabilities.to_vec();

    let rows = probabilities.len();
    let summary = ScoringSummary {
        rows,
        predicted_cancellations: predictions.iter().filter(|&&p| p == 1).count(),
        mean_probability: if rows > 0 {
            probabilities.iter().sum::<f64>() / rows as f64
        } else {
            0.0
        },
        rows_with_unseen: features.unseen_rows,
    };

    let path = table.path().to_path_buf();
    let mut frame = table.into_frame();
    for name in [PREDICTION_COLUMN, PROBABILITY_COLUMN] {
        if frame.drop_in_place(name).is_ok() {
            tracing::warn!("{} already had a {} column; replacing it", path.display(), name);
        }
    }
    frame
        .with_column(Series::new(PREDICTION_COLUMN, predictions))
        .and_then(|frame| frame.with_column(Series::new(PROBABILITY_COLUMN, probabilities)))
        .map_err(|err| PipelineError::Scoring(err.to_string()))?;

    Ok(ScoredTable { frame, summary })
}

/// Writes `frame` as CSV with a header row. The file handle is closed on
/// return, whether or not the write succeeded.
pub fn save_csv_file(frame: &mut DataFrame, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let persistence = |source: io::Error| PipelineError::Persistence {
        path: path.to_path_buf(),
        source,
    };

    let file = File::create(path).map_err(persistence)?;
    let mut writer = BufWriter::new(file);
    CsvWriter::new(&mut writer)
        .finish(frame)
        .map_err(|err| persistence(io::Error::new(io::ErrorKind::Other, err)))?;
    writer.flush().map_err(persistence)?;

    tracing::info!("saved {} rows to {}", frame.height(), path.display());
    Ok(())
}

impl fmt::Display for ScoringSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Scored rows: {}", self.rows)?;
        writeln!(f, "Predicted high-risk routes: {}", self.predicted_cancellations)?;
        writeln!(
            f,
            "Average cancellation probability: {:.1}%",
            self.mean_probability * 100.0
        )?;
        write!(f, "Rows with unseen categories: {}", self.rows_with_unseen)
    }
}
