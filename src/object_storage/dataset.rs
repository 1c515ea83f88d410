//! Numeric tabular datasets and their CSV encoding

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::io::Cursor;

use crate::error::{Result, ServingError};

/// A numeric table: named columns, row-major values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    /// Column names; generated as `feature_<i>` when omitted
    #[serde(default)]
    pub columns: Vec<String>,
    pub rows: Vec<Vec<f64>>,
}

impl Dataset {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<f64>>) -> Self {
        Self { columns, rows }
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_columns(&self) -> usize {
        if self.columns.is_empty() {
            self.rows.first().map(Vec::len).unwrap_or(0)
        } else {
            self.columns.len()
        }
    }

    fn column_names(&self) -> Vec<String> {
        if self.columns.is_empty() {
            (0..self.n_columns()).map(|i| format!("feature_{}", i)).collect()
        } else {
            self.columns.clone()
        }
    }

    /// Build a polars frame, rejecting ragged rows
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let names = self.column_names();
        if names.is_empty() {
            return Err(ServingError::InvalidInput("dataset has no columns".to_string()));
        }

        if let Some((i, row)) = self.rows.iter().enumerate().find(|(_, r)| r.len() != names.len()) {
            return Err(ServingError::ShapeError {
                expected: format!("{} values per row", names.len()),
                actual: format!("{} values in row {}", row.len(), i),
            });
        }

        let columns: Vec<Column> = names
            .iter()
            .enumerate()
            .map(|(j, name)| {
                let values: Vec<f64> = self.rows.iter().map(|row| row[j]).collect();
                Series::new(name.as_str().into(), values).into()
            })
            .collect();

        Ok(DataFrame::new(columns)?)
    }

    /// Read every column of `df` as f64; nulls or non-numeric cells are errors
    pub fn from_dataframe(df: &DataFrame) -> Result<Self> {
        let columns: Vec<String> = df.get_column_names().iter().map(|s| s.to_string()).collect();
        let mut rows = vec![Vec::with_capacity(columns.len()); df.height()];

        for column in df.get_columns() {
            let series = column
                .as_materialized_series()
                .cast(&DataType::Float64)
                .map_err(|e| {
                    ServingError::DataError(format!("column '{}' is not numeric: {}", column.name(), e))
                })?;
            if series.null_count() > 0 {
                return Err(ServingError::DataError(format!(
                    "column '{}' contains missing or non-numeric values",
                    column.name()
                )));
            }
            for (row, value) in rows.iter_mut().zip(series.f64()?.into_iter()) {
                row.push(value.unwrap_or(f64::NAN));
            }
        }

        Ok(Self { columns, rows })
    }

    /// Encode as CSV with a header row
    pub fn to_csv(&self) -> Result<Vec<u8>> {
        let mut df = self.to_dataframe()?;
        let mut buf = Vec::new();
        CsvWriter::new(&mut buf).include_header(true).finish(&mut df)?;
        Ok(buf)
    }

    /// Decode CSV with a header row
    pub fn from_csv(bytes: &[u8]) -> Result<Self> {
        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(1000))
            .into_reader_with_file_handle(Cursor::new(bytes))
            .finish()?;
        Self::from_dataframe(&df)
    }
}
