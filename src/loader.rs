use std::path::{Path, PathBuf};

use polars::prelude::*;

use crate::error::{PipelineError, Result};

pub const DAY_OF_WEEK: &str = "DAY_OF_WEEK";
pub const CARRIER: &str = "CARRIER";
pub const ORIGIN: &str = "ORIGIN";
pub const DEST: &str = "DEST";
pub const DISTANCE: &str = "DISTANCE";
pub const IS_CANCELLED: &str = "IS_CANCELLED";

/// Columns every flight table must carry.
pub const RECORD_COLUMNS: [&str; 5] = [DAY_OF_WEEK, CARRIER, ORIGIN, DEST, DISTANCE];

/// Columns of the labeled training table.
pub const TRAINING_COLUMNS: [&str; 6] =
    [DAY_OF_WEEK, CARRIER, ORIGIN, DEST, DISTANCE, IS_CANCELLED];

/// A loaded table together with the file it came from, so that column
/// errors can point back at their source.
#[derive(Debug, Clone)]
pub struct FlightTable {
    path: PathBuf,
    frame: DataFrame,
}

pub fn load_csv_file(path: impl AsRef<Path>, required_columns: &[&str]) -> Result<FlightTable> {
    let path = path.as_ref();

    // the reader owns the file handle and drops it once parsing ends
    let frame = CsvReader::from_path(path)
        .and_then(|reader| reader.has_header(true).finish())
        .map_err(|err| PipelineError::data_access(path, err))?;

    {
        let columns = frame.get_column_names();
        if let Some(missing) = required_columns.iter().find(|&&c| !columns.contains(&c)) {
            return Err(PipelineError::Schema {
                path: path.to_path_buf(),
                column: missing.to_string(),
            });
        }
    }

    tracing::info!(
        "loaded {} rows and {} columns from {}",
        frame.height(),
        frame.width(),
        path.display()
    );

    Ok(FlightTable {
        path: path.to_path_buf(),
        frame,
    })
}

impl FlightTable {
    pub fn new(path: impl Into<PathBuf>, frame: DataFrame) -> Self {
        Self {
            path: path.into(),
            frame,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn into_frame(self) -> DataFrame {
        self.frame
    }

    pub fn height(&self) -> usize {
        self.frame.height()
    }

    fn column(&self, name: &str) -> Result<&Series> {
        self.frame.column(name).map_err(|_| PipelineError::Schema {
            path: self.path.clone(),
            column: name.to_string(),
        })
    }

    pub(crate) fn malformed(&self, reason: impl ToString) -> PipelineError {
        PipelineError::data_access(&self.path, reason)
    }

    /// Values of `name` as strings; any dtype is cast, nulls are rejected.
    pub fn string_column(&self, name: &str) -> Result<Vec<String>> {
        let series = self
            .column(name)?
            .cast(&DataType::Utf8)
            .map_err(|err| self.malformed(err))?;
        let values = series.utf8().map_err(|err| self.malformed(err))?;

        values
            .into_iter()
            .enumerate()
            .map(|(row, value)| {
                value
                    .map(str::to_string)
                    .ok_or_else(|| self.malformed(format!("null {name} at row {}", row + 1)))
            })
            .collect()
    }

    /// Values of `name` as `f64`. Nulls and values that do not parse as
    /// numbers are rejected.
    pub fn numeric_column(&self, name: &str) -> Result<Vec<f64>> {
        let series = self
            .column(name)?
            .cast(&DataType::Float64)
            .map_err(|err| self.malformed(err))?;
        let values = series.f64().map_err(|err| self.malformed(err))?;

        values
            .into_iter()
            .enumerate()
            .map(|(row, value)| {
                value.filter(|v| v.is_finite()).ok_or_else(|| {
                    self.malformed(format!("missing or non-numeric {name} at row {}", row + 1))
                })
            })
            .collect()
    }

    /// Binary label column: every value must be 0 or 1 (booleans allowed).
    pub fn label_column(&self, name: &str) -> Result<Vec<usize>> {
        self.numeric_column(name)?
            .into_iter()
            .enumerate()
            .map(|(row, value)| match value {
                v if v == 0.0 => Ok(0),
                v if v == 1.0 => Ok(1),
                other => Err(self.malformed(format!(
                    "{name} must be 0 or 1, got {other} at row {}",
                    row + 1
                ))),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn loads_rows_in_order() {
        let file = write_csv(
            "DAY_OF_WEEK,CARRIER,ORIGIN,DEST,DISTANCE,IS_CANCELLED\n\
             1,AA,JFK,LAX,2475,0\n\
             5,DL,ATL,BOS,946,1\n",
        );
        let table = load_csv_file(file.path(), &TRAINING_COLUMNS).unwrap();

        assert_eq!(table.height(), 2);
        assert_eq!(table.string_column(CARRIER).unwrap(), vec!["AA", "DL"]);
        assert_eq!(table.numeric_column(DISTANCE).unwrap(), vec![2475.0, 946.0]);
        assert_eq!(table.label_column(IS_CANCELLED).unwrap(), vec![0, 1]);
    }

    #[test]
    fn missing_file_is_data_access_error() {
        let err = load_csv_file("does/not/exist.csv", &RECORD_COLUMNS).unwrap_err();
        assert!(matches!(err, PipelineError::DataAccess { .. }));
    }

    #[test]
    fn missing_column_is_schema_error() {
        let file = write_csv("DAY_OF_WEEK,CARRIER,ORIGIN,DISTANCE\n1,AA,JFK,100\n");
        let err = load_csv_file(file.path(), &RECORD_COLUMNS).unwrap_err();
        match err {
            PipelineError::Schema { column, .. } => assert_eq!(column, DEST),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn numeric_carrier_codes_are_read_as_strings() {
        let file = write_csv("CARRIER\n9\n10\n");
        let table = load_csv_file(file.path(), &[CARRIER]).unwrap();
        assert_eq!(table.string_column(CARRIER).unwrap(), vec!["9", "10"]);
    }

    #[test]
    fn rejects_non_binary_labels() {
        let file = write_csv("IS_CANCELLED\n0\n2\n");
        let table = load_csv_file(file.path(), &[IS_CANCELLED]).unwrap();
        let err = table.label_column(IS_CANCELLED).unwrap_err();
        assert!(matches!(err, PipelineError::DataAccess { .. }));
    }

    #[test]
    fn rejects_null_numeric_values() {
        let file = write_csv("DISTANCE,CARRIER\n100,AA\n,DL\n");
        let table = load_csv_file(file.path(), &[DISTANCE]).unwrap();
        let err = table.numeric_column(DISTANCE).unwrap_err();
        assert!(err.to_string().contains("row 2"), "{err}");
    }
}
