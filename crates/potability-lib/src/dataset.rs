//! Tabular training data
//!
//! [`TrainingFrame`] is the raw, column-oriented view read from CSV, with
//! nulls preserved so the validator can measure missingness. [`Dataset`] is
//! the dense matrix produced after imputation.

use crate::error::TrainError;
use ndarray::{Array2, Axis};
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

/// Literal cell values treated as missing
const NULL_LITERALS: &[&str] = &["", "na", "nan", "null", "none"];

/// A single column of raw training data
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Numeric(Vec<Option<f64>>),
    Text(Vec<Option<String>>),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Numeric(v) => v.len(),
            Column::Text(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Column::Numeric(_))
    }

    /// Number of null cells
    pub fn null_count(&self) -> usize {
        match self {
            Column::Numeric(v) => v.iter().filter(|c| c.is_none()).count(),
            Column::Text(v) => v.iter().filter(|c| c.is_none()).count(),
        }
    }

    pub fn as_numeric(&self) -> Option<&[Option<f64>]> {
        match self {
            Column::Numeric(v) => Some(v),
            Column::Text(_) => None,
        }
    }

    fn from_cells(cells: Vec<Option<String>>) -> Self {
        let parsed: Option<Vec<Option<f64>>> = cells
            .iter()
            .map(|cell| match cell {
                None => Some(None),
                Some(text) => text.trim().parse::<f64>().ok().map(Some),
            })
            .collect();

        match parsed {
            Some(values) => Column::Numeric(
                values
                    .into_iter()
                    .map(|v| v.filter(|x| !x.is_nan()))
                    .collect(),
            ),
            None => Column::Text(cells),
        }
    }
}

/// Column-oriented raw training table
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingFrame {
    names: Vec<String>,
    columns: HashMap<String, Column>,
    rows: usize,
}

impl TrainingFrame {
    /// Build a frame from named columns. All columns must have equal length.
    pub fn from_columns(columns: Vec<(String, Column)>) -> Result<Self, TrainError> {
        let rows = columns.first().map(|(_, c)| c.len()).unwrap_or(0);
        if let Some((name, _)) = columns.iter().find(|(_, c)| c.len() != rows) {
            return Err(TrainError::Training(format!(
                "column '{}' length differs from {} rows",
                name, rows
            )));
        }

        let names = columns.iter().map(|(n, _)| n.clone()).collect();
        Ok(Self {
            names,
            columns: columns.into_iter().collect(),
            rows,
        })
    }

    /// Read a CSV file with a header row
    pub fn from_csv_path(path: impl AsRef<Path>) -> Result<Self, TrainError> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|source| TrainError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_reader(file)
    }

    /// Read CSV from any reader with a header row
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, TrainError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers: Vec<String> = csv_reader.headers()?.iter().map(String::from).collect();
        let mut cells: Vec<Vec<Option<String>>> = vec![Vec::new(); headers.len()];

        for record in csv_reader.records() {
            let record = record?;
            for (i, column) in cells.iter_mut().enumerate() {
                let cell = record.get(i).unwrap_or("");
                let is_null = NULL_LITERALS.contains(&cell.to_ascii_lowercase().as_str());
                column.push(if is_null { None } else { Some(cell.to_string()) });
            }
        }

        let columns = headers
            .into_iter()
            .zip(cells)
            .map(|(name, cells)| (name, Column::from_cells(cells)))
            .collect();
        Self::from_columns(columns)
    }

    pub fn len(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0 || self.names.is_empty()
    }

    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.get(name)
    }

    /// Extract features (with nulls as NaN) and binary targets.
    ///
    /// Callers validate the frame first; a non-numeric or absent column here
    /// is reported as a training error.
    pub fn to_matrix(
        &self,
        feature_names: &[&str],
        target: &str,
    ) -> Result<(Array2<f64>, Vec<u8>), TrainError> {
        let mut x = Array2::from_elem((self.rows, feature_names.len()), f64::NAN);
        for (j, name) in feature_names.iter().enumerate() {
            let values = self.numeric_column(name)?;
            for (i, value) in values.iter().enumerate() {
                if let Some(v) = value {
                    x[[i, j]] = *v;
                }
            }
        }

        let y = self
            .numeric_column(target)?
            .iter()
            .map(|v| match v {
                Some(t) if *t == 1.0 => Ok(1),
                Some(t) if *t == 0.0 => Ok(0),
                other => Err(TrainError::Training(format!(
                    "target value {:?} is not 0 or 1",
                    other
                ))),
            })
            .collect::<Result<Vec<u8>, _>>()?;

        Ok((x, y))
    }

    fn numeric_column(&self, name: &str) -> Result<&[Option<f64>], TrainError> {
        self.column(name)
            .and_then(Column::as_numeric)
            .ok_or_else(|| TrainError::Training(format!("column '{}' is not numeric", name)))
    }
}

/// Dense, imputed feature matrix with binary labels
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub features: Array2<f64>,
    pub targets: Vec<u8>,
}

impl Dataset {
    pub fn new(features: Array2<f64>, targets: Vec<u8>) -> Self {
        debug_assert_eq!(features.nrows(), targets.len());
        Self { features, targets }
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Subset of rows, in the given order
    pub fn select_rows(&self, indices: &[usize]) -> Dataset {
        Dataset {
            features: self.features.select(Axis(0), indices),
            targets: indices.iter().map(|&i| self.targets[i]).collect(),
        }
    }

    /// Count of (negative, positive) labels
    pub fn class_counts(&self) -> (usize, usize) {
        let positives = self.targets.iter().filter(|&&t| t == 1).count();
        (self.targets.len() - positives, positives)
    }
}
