use std::collections::{BTreeSet, HashMap};

use ndarray::Array2;

use crate::error::Result;
use crate::loader::{FlightTable, CARRIER, DAY_OF_WEEK, DEST, DISTANCE, ORIGIN};

/// Model input columns, in the order the feature matrix is laid out.
pub const FEATURE_NAMES: [&str; 5] = [
    DAY_OF_WEEK,
    "CARRIER_ENCODED",
    "ORIGIN_ENCODED",
    "DEST_ENCODED",
    DISTANCE,
];

/// Vocabulary of one categorical column, fixed once fitted.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodingTable {
    classes: Vec<String>,
    codes: HashMap<String, i64>,
}

impl EncodingTable {
    /// Codes are dense in `[0, distinct_count)` and follow the sorted order
    /// of the distinct values.
    pub fn fit<S: AsRef<str>>(values: &[S]) -> Self {
        let classes: Vec<String> = values
            .iter()
            .map(|v| v.as_ref())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(str::to_string)
            .collect();
        let codes = classes
            .iter()
            .enumerate()
            .map(|(code, class)| (class.clone(), code as i64))
            .collect();

        Self { classes, codes }
    }

    pub fn code(&self, value: &str) -> Option<i64> {
        self.codes.get(value).copied()
    }

    /// Encodes every value; anything outside the vocabulary becomes `default`.
    pub fn encode<S: AsRef<str>>(&self, values: &[S], default: i64) -> Vec<i64> {
        values
            .iter()
            .map(|v| self.code(v.as_ref()).unwrap_or(default))
            .collect()
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

/// Encoders for the three categorical columns, fitted on the training table
/// and handed to the scorer.
#[derive(Debug, Clone, PartialEq)]
pub struct EncoderBundle {
    pub carrier: EncodingTable,
    pub origin: EncodingTable,
    pub dest: EncodingTable,
}

/// Feature matrix plus how many of its rows carried a category the encoders
/// had never seen.
#[derive(Debug, Clone)]
pub struct EncodedFeatures {
    pub records: Array2<f64>,
    pub unseen_rows: usize,
}

impl EncoderBundle {
    pub fn fit(table: &FlightTable) -> Result<Self> {
        Ok(Self {
            carrier: EncodingTable::fit(&table.string_column(CARRIER)?),
            origin: EncodingTable::fit(&table.string_column(ORIGIN)?),
            dest: EncodingTable::fit(&table.string_column(DEST)?),
        })
    }

    /// Builds the `[rows, FEATURE_NAMES.len()]` matrix for `table`. Rows with
    /// a day of week outside 1..=7 or a negative distance are rejected.
    pub fn features(&self, table: &FlightTable, unseen_code: i64) -> Result<EncodedFeatures> {
        let days = table.numeric_column(DAY_OF_WEEK)?;
        let distances = table.numeric_column(DISTANCE)?;

        for (row, (&day, &distance)) in days.iter().zip(&distances).enumerate() {
            if !(1.0..=7.0).contains(&day) || day.fract() != 0.0 {
                return Err(table.malformed(format!(
                    "{DAY_OF_WEEK} must be an integer in 1..=7, got {day} at row {}",
                    row + 1
                )));
            }
            if distance < 0.0 {
                return Err(table.malformed(format!(
                    "{DISTANCE} must be non-negative, got {distance} at row {}",
                    row + 1
                )));
            }
        }

        let carrier_names = table.string_column(CARRIER)?;
        let origin_names = table.string_column(ORIGIN)?;
        let dest_names = table.string_column(DEST)?;

        let carriers = self.carrier.encode(&carrier_names, unseen_code);
        let origins = self.origin.encode(&origin_names, unseen_code);
        let dests = self.dest.encode(&dest_names, unseen_code);

        let unseen_rows = (0..table.height())
            .filter(|&row| {
                self.carrier.code(&carrier_names[row]).is_none()
                    || self.origin.code(&origin_names[row]).is_none()
                    || self.dest.code(&dest_names[row]).is_none()
            })
            .count();

        let records = Array2::from_shape_fn((table.height(), FEATURE_NAMES.len()), |(row, col)| {
            match col {
                0 => days[row],
                1 => carriers[row] as f64,
                2 => origins[row] as f64,
                3 => dests[row] as f64,
                _ => distances[row],
            }
        });

        Ok(EncodedFeatures {
            records,
            unseen_rows,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    fn table(carriers: &[&str], days: &[i64], distances: &[f64]) -> FlightTable {
        let n = carriers.len();
        let frame = df!(
            "DAY_OF_WEEK" => days,
            "CARRIER" => carriers,
            "ORIGIN" => vec!["JFK"; n],
            "DEST" => vec!["LAX"; n],
            "DISTANCE" => distances
        )
        .unwrap();
        FlightTable::new("flights.csv", frame)
    }

    #[test]
    fn fit_is_a_bijection_onto_dense_codes() {
        let values = ["UA", "AA", "DL", "AA", "UA", "WN"];
        let table = EncodingTable::fit(&values);

        assert_eq!(table.len(), 4);
        assert_eq!(table.classes(), ["AA", "DL", "UA", "WN"]);

        let codes = table.encode(&values, -1);
        assert_eq!(codes, vec![2, 0, 1, 0, 2, 3]);

        let distinct: BTreeSet<i64> = codes.iter().copied().collect();
        assert_eq!(distinct, (0..4).collect::<BTreeSet<i64>>());
    }

    #[test]
    fn fit_does_not_depend_on_input_order() {
        let a = EncodingTable::fit(&["ORD", "ATL", "BOS"]);
        let b = EncodingTable::fit(&["BOS", "ORD", "ATL"]);
        assert_eq!(a, b);
    }

    #[test]
    fn unseen_values_take_the_default() {
        let table = EncodingTable::fit(&["AA"]);
        assert_eq!(table.code("AA"), Some(0));
        assert_eq!(table.encode(&["DL", "AA", ""], -1), vec![-1, 0, -1]);
        assert_eq!(table.encode(&["DL"], 99), vec![99]);
    }

    #[test]
    fn single_carrier_training_set() {
        let carriers = ["AA"; 10];
        let train = table(&carriers, &[1; 10], &[500.0; 10]);
        let encoders = EncoderBundle::fit(&train).unwrap();
        assert_eq!(encoders.carrier.code("AA"), Some(0));

        let full = table(&["AA", "DL"], &[3, 4], &[100.0, 200.0]);
        let features = encoders.features(&full, -1).unwrap();
        assert_eq!(features.records.shape(), &[2, 5]);
        assert_eq!(features.records[[0, 1]], 0.0);
        assert_eq!(features.records[[1, 1]], -1.0);
        assert_eq!(features.unseen_rows, 1);
    }

    #[test]
    fn feature_columns_follow_fixed_order() {
        let train = table(&["AA", "DL"], &[2, 6], &[150.0, 2500.0]);
        let encoders = EncoderBundle::fit(&train).unwrap();
        let features = encoders.features(&train, -1).unwrap().records;

        assert_eq!(features.row(1).to_vec(), vec![6.0, 1.0, 0.0, 0.0, 2500.0]);
    }

    #[test]
    fn rejects_out_of_range_records() {
        let encoders = EncoderBundle::fit(&table(&["AA"], &[1], &[10.0])).unwrap();

        let bad_day = table(&["AA"], &[8], &[10.0]);
        assert!(encoders.features(&bad_day, -1).is_err());

        let bad_distance = table(&["AA"], &[1], &[-5.0]);
        assert!(encoders.features(&bad_distance, -1).is_err());
    }
}
