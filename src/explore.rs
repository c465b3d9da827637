//! Descriptive summary of a loaded training table.

use std::fmt;

use polars::prelude::*;

use crate::error::Result;
use crate::loader::{FlightTable, IS_CANCELLED};

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnProfile {
    pub name: String,
    pub dtype: String,
    pub null_count: usize,
    pub stats: Option<NumericStats>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NumericStats {
    pub count: usize,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DatasetSummary {
    pub rows: usize,
    pub not_cancelled: usize,
    pub cancelled: usize,
    pub columns: Vec<ColumnProfile>,
}

impl NumericStats {
    /// Sample statistics (std uses n - 1); `None` for an empty input.
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let count = values.len();
        let mean = values.iter().sum::<f64>() / count as f64;
        let std = if count < 2 {
            0.0
        } else {
            (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (count - 1) as f64).sqrt()
        };
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        Some(Self {
            count,
            mean,
            std,
            min,
            max,
        })
    }
}

fn profile_column(series: &Series) -> ColumnProfile {
    let stats = if series.dtype().is_numeric() {
        series
            .cast(&DataType::Float64)
            .ok()
            .and_then(|cast| {
                let values: Vec<f64> = cast.f64().ok()?.into_iter().flatten().collect();
                NumericStats::from_values(&values)
            })
    } else {
        None
    };

    ColumnProfile {
        name: series.name().to_string(),
        dtype: series.dtype().to_string(),
        null_count: series.null_count(),
        stats,
    }
}

/// Profiles every column and counts the class breakdown of the label.
pub fn summarize(table: &FlightTable) -> Result<DatasetSummary> {
    let labels = table.label_column(IS_CANCELLED)?;
    let cancelled = labels.iter().filter(|&&label| label == 1).count();

    Ok(DatasetSummary {
        rows: table.height(),
        not_cancelled: labels.len() - cancelled,
        cancelled,
        columns: table.frame().get_columns().iter().map(profile_column).collect(),
    })
}

impl fmt::Display for DatasetSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total rows: {}", self.rows)?;
        writeln!(f, "Cancellation breakdown:")?;
        writeln!(f, "  0 (not cancelled): {}", self.not_cancelled)?;
        writeln!(f, "  1 (cancelled):     {}", self.cancelled)?;
        writeln!(f)?;
        writeln!(
            f,
            "{:<16} {:<8} {:>6} {:>8} {:>12} {:>12} {:>12} {:>12}",
            "column", "dtype", "nulls", "count", "mean", "std", "min", "max"
        )?;
        for column in &self.columns {
            write!(
                f,
                "{:<16} {:<8} {:>6}",
                column.name, column.dtype, column.null_count
            )?;
            match &column.stats {
                Some(s) => writeln!(
                    f,
                    " {:>8} {:>12.3} {:>12.3} {:>12.3} {:>12.3}",
                    s.count, s.mean, s.std, s.min, s.max
                )?,
                None => writeln!(f)?,
            }
        }
        Ok(())
    }
}
