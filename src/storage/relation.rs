/// In-memory relation: ordered column names plus rows of scalar values.
/// The execution pipeline consumes and produces these; each one is owned by
/// exactly one query evaluation and discarded at its end.
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::storage::value::Value;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    /// Column names, in output order
    pub columns: Vec<String>,

    /// Row-major data; every row has exactly `columns.len()` values
    pub rows: Vec<Vec<Value>>,
}

impl Relation {
    pub fn new(columns: Vec<String>) -> Self {
        Self { columns, rows: Vec::new() }
    }

    pub fn with_rows(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self { columns, rows }
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn push_row(&mut self, row: Vec<Value>) -> EngineResult<()> {
        if row.len() != self.columns.len() {
            return Err(EngineError::execution(format!(
                "row arity {} does not match {} columns",
                row.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    /// Append a copy of `source` under the name `target`.
    /// Used to surface a raw column under its canonical alias.
    pub fn duplicate_column(&mut self, source: &str, target: &str) -> EngineResult<()> {
        let idx = self.column_index(source).ok_or_else(|| {
            EngineError::execution(format!("column '{}' not found", source))
        })?;
        if self.has_column(target) {
            return Err(EngineError::execution(format!(
                "column '{}' already exists",
                target
            )));
        }
        self.columns.push(target.to_string());
        for row in &mut self.rows {
            let value = row[idx].clone();
            row.push(value);
        }
        Ok(())
    }

    /// Replace the column names positionally (final select renaming)
    pub fn set_columns(&mut self, names: Vec<String>) -> EngineResult<()> {
        if names.len() != self.columns.len() {
            return Err(EngineError::execution(format!(
                "cannot rename {} columns to {} names",
                self.columns.len(),
                names.len()
            )));
        }
        self.columns = names;
        Ok(())
    }
}
