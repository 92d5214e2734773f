/// Base-relation sources
/// The engine acquires named base relations through the RelationProvider
/// seam; a live database connection would sit behind the same trait.
use std::path::PathBuf;

use fxhash::FxHashMap;
use tracing::debug;

use crate::error::{EngineError, EngineResult};
use crate::storage::relation::Relation;
use crate::storage::value::Value;

pub trait RelationProvider {
    /// Fetch the base relation registered under `name`
    fn relation(&self, name: &str) -> EngineResult<Relation>;
}

/// In-memory relation registry
#[derive(Default)]
pub struct Catalog {
    relations: FxHashMap<String, Relation>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, relation: Relation) {
        self.relations.insert(name.into(), relation);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.relations.contains_key(name)
    }
}

impl RelationProvider for Catalog {
    fn relation(&self, name: &str) -> EngineResult<Relation> {
        self.relations
            .get(name)
            .cloned()
            .ok_or_else(|| EngineError::execution(format!("unknown relation '{}'", name)))
    }
}

/// Loads `<dir>/<name>.csv`, inferring a column type from the full column:
/// Int64 if every non-empty cell parses as an integer, Float64 if every
/// non-empty cell parses as a number, Bool for true/false columns, String
/// otherwise. Empty cells become Null.
pub struct CsvDirectoryProvider {
    dir: PathBuf,
}

impl CsvDirectoryProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[derive(Clone, Copy, PartialEq)]
enum ColumnType {
    Int64,
    Float64,
    Bool,
    String,
}

fn infer_column_type(cells: &[&str]) -> ColumnType {
    let mut ty = ColumnType::Int64;
    let mut saw_value = false;
    for cell in cells {
        if cell.is_empty() {
            continue;
        }
        saw_value = true;
        let cell_ty = if cell.parse::<i64>().is_ok() {
            ColumnType::Int64
        } else if cell.parse::<f64>().is_ok() {
            ColumnType::Float64
        } else if cell.eq_ignore_ascii_case("true") || cell.eq_ignore_ascii_case("false") {
            ColumnType::Bool
        } else {
            ColumnType::String
        };
        ty = match (ty, cell_ty) {
            (a, b) if a == b => a,
            (ColumnType::Int64, ColumnType::Float64) | (ColumnType::Float64, ColumnType::Int64) => {
                ColumnType::Float64
            }
            _ => ColumnType::String,
        };
    }
    if saw_value {
        ty
    } else {
        ColumnType::String
    }
}

fn convert_cell(cell: &str, ty: ColumnType) -> Value {
    if cell.is_empty() {
        return Value::Null;
    }
    match ty {
        ColumnType::Int64 => cell.parse::<i64>().map(Value::Int64).unwrap_or(Value::Null),
        ColumnType::Float64 => cell.parse::<f64>().map(Value::Float64).unwrap_or(Value::Null),
        ColumnType::Bool => Value::Bool(cell.eq_ignore_ascii_case("true")),
        ColumnType::String => Value::String(cell.to_string()),
    }
}

impl RelationProvider for CsvDirectoryProvider {
    fn relation(&self, name: &str) -> EngineResult<Relation> {
        let path = self.dir.join(format!("{}.csv", name));
        let mut reader = csv::Reader::from_path(&path).map_err(|e| {
            EngineError::io_with_path(e.to_string(), path.display().to_string())
        })?;

        let columns: Vec<String> = reader
            .headers()
            .map_err(EngineError::from)?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        let mut records: Vec<Vec<String>> = Vec::new();
        for record in reader.records() {
            let record = record.map_err(EngineError::from)?;
            records.push(record.iter().map(|c| c.trim().to_string()).collect());
        }

        let mut types = Vec::with_capacity(columns.len());
        for col in 0..columns.len() {
            let cells: Vec<&str> = records
                .iter()
                .map(|r| r.get(col).map(String::as_str).unwrap_or(""))
                .collect();
            types.push(infer_column_type(&cells));
        }

        let mut relation = Relation::new(columns);
        for record in &records {
            let row: Vec<Value> = types
                .iter()
                .enumerate()
                .map(|(col, ty)| convert_cell(record.get(col).map(String::as_str).unwrap_or(""), *ty))
                .collect();
            relation.push_row(row)?;
        }
        debug!(
            "loaded relation '{}' from {}: {} rows",
            name,
            path.display(),
            relation.row_count()
        );
        Ok(relation)
    }
}
