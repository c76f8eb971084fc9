//! Tabular values.

use num_bigint::BigInt;

use super::Value;
use crate::model::FeatureKind;

/// A row whose width does not match the table's column count.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("row {row} has {actual} cells but the table has {expected} columns")]
pub struct TableShapeError {
    pub row: usize,
    pub expected: usize,
    pub actual: usize,
}

/// Column-named rows of codec values.
///
/// Every row has exactly one cell per column.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    /// Create an empty table with the given columns.
    pub fn new<C: Into<String>>(columns: impl IntoIterator<Item = C>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Create a table from columns and rows.
    pub fn from_rows(
        columns: Vec<String>,
        rows: Vec<Vec<Value>>,
    ) -> Result<Self, TableShapeError> {
        let mut table = Self {
            columns,
            rows: Vec::with_capacity(rows.len()),
        };
        for row in rows {
            table.push_row(row)?;
        }
        Ok(table)
    }

    /// Append a row.
    pub fn push_row(&mut self, row: Vec<Value>) -> Result<(), TableShapeError> {
        if row.len() != self.columns.len() {
            return Err(TableShapeError {
                row: self.rows.len(),
                expected: self.columns.len(),
                actual: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    /// Cells of the named column, top to bottom.
    pub fn column(&self, name: &str) -> Option<impl Iterator<Item = &Value>> {
        let idx = self.columns.iter().position(|c| c == name)?;
        Some(self.rows.iter().map(move |row| &row[idx]))
    }

    /// Global feature selector with columns `Name`, `Type`, `# Unique` and
    /// `% Non-zero`.
    pub(crate) fn feature_selector<'a>(
        features: impl IntoIterator<Item = (&'a str, FeatureKind, u64, f64)>,
    ) -> Self {
        let mut table = Self::new(["Name", "Type", "# Unique", "% Non-zero"]);
        table.rows = features
            .into_iter()
            .map(|(name, kind, n_unique, nonzero)| {
                vec![
                    Value::Str(name.to_string()),
                    Value::Str(kind.as_str().to_string()),
                    Value::Int(BigInt::from(n_unique)),
                    Value::Float(nonzero),
                ]
            })
            .collect();
        table
    }
}
