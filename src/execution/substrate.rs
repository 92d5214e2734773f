/// Tabular substrate
/// The five relational operations the execution engine consumes. The
/// in-memory implementation evaluates row-at-a-time; a remote engine could
/// sit behind the same trait.
use fxhash::{FxHashMap, FxHashSet};

use crate::error::{EngineError, EngineResult};
use crate::execution::aggregate::{windowed_aggregate, AggregateSpec};
use crate::execution::evaluator::ExpressionEvaluator;
use crate::query::expression::Expression;
use crate::storage::relation::Relation;
use crate::storage::value::Value;

pub trait Substrate {
    /// Rows satisfying the predicate, order preserved
    fn filter(&self, relation: &Relation, predicate: &Expression) -> EngineResult<Relation>;

    /// Aggregate per grouping-key partition, broadcast to every row
    fn with_windowed_aggregate(
        &self,
        relation: &Relation,
        partition: &[String],
        aggregate: &AggregateSpec,
    ) -> EngineResult<Relation>;

    /// Equi-join on shared key columns; colliding right-side columns are
    /// suffixed with the right operand's grouping-variable id
    fn inner_join(
        &self,
        left: &Relation,
        right: &Relation,
        on: &[String],
        collision_suffix: &str,
    ) -> EngineResult<Relation>;

    /// Keep exactly the named columns, in the given order
    fn project(&self, relation: &Relation, columns: &[String]) -> EngineResult<Relation>;

    /// Remove duplicate rows, keeping first occurrences
    fn distinct(&self, relation: &Relation) -> EngineResult<Relation>;
}

#[derive(Default)]
pub struct MemorySubstrate;

impl MemorySubstrate {
    pub fn new() -> Self {
        Self
    }
}

impl Substrate for MemorySubstrate {
    fn filter(&self, relation: &Relation, predicate: &Expression) -> EngineResult<Relation> {
        let evaluator = ExpressionEvaluator::new(relation);
        let mut rows = Vec::new();
        for row in &relation.rows {
            if evaluator.evaluate_bool(predicate, row)? {
                rows.push(row.clone());
            }
        }
        Ok(Relation::with_rows(relation.columns.clone(), rows))
    }

    fn with_windowed_aggregate(
        &self,
        relation: &Relation,
        partition: &[String],
        aggregate: &AggregateSpec,
    ) -> EngineResult<Relation> {
        windowed_aggregate(relation, partition, aggregate)
    }

    fn inner_join(
        &self,
        left: &Relation,
        right: &Relation,
        on: &[String],
        collision_suffix: &str,
    ) -> EngineResult<Relation> {
        let left_keys: Vec<usize> = on
            .iter()
            .map(|col| {
                left.column_index(col).ok_or_else(|| {
                    EngineError::execution(format!("join column '{}' not found in left relation", col))
                })
            })
            .collect::<EngineResult<_>>()?;
        let right_keys: Vec<usize> = on
            .iter()
            .map(|col| {
                right.column_index(col).ok_or_else(|| {
                    EngineError::execution(format!("join column '{}' not found in right relation", col))
                })
            })
            .collect::<EngineResult<_>>()?;

        // Right-side payload columns (keys are carried by the left side)
        let mut payload: Vec<(usize, String)> = Vec::new();
        let mut columns = left.columns.clone();
        for (idx, name) in right.columns.iter().enumerate() {
            if right_keys.contains(&idx) {
                continue;
            }
            let out_name = if columns.iter().any(|c| c == name) {
                format!("{}_{}", name, collision_suffix)
            } else {
                name.clone()
            };
            payload.push((idx, out_name.clone()));
            columns.push(out_name);
        }

        let mut table: FxHashMap<Vec<Value>, Vec<usize>> = FxHashMap::default();
        for (row_idx, row) in right.rows.iter().enumerate() {
            let key: Vec<Value> = right_keys.iter().map(|&idx| row[idx].clone()).collect();
            table.entry(key).or_default().push(row_idx);
        }

        let mut rows = Vec::new();
        for left_row in &left.rows {
            let key: Vec<Value> = left_keys.iter().map(|&idx| left_row[idx].clone()).collect();
            let Some(matches) = table.get(&key) else { continue };
            for &right_idx in matches {
                let mut row = left_row.clone();
                for (idx, _) in &payload {
                    row.push(right.rows[right_idx][*idx].clone());
                }
                rows.push(row);
            }
        }

        Ok(Relation::with_rows(columns, rows))
    }

    fn project(&self, relation: &Relation, columns: &[String]) -> EngineResult<Relation> {
        let indexes: Vec<usize> = columns
            .iter()
            .map(|col| {
                relation
                    .column_index(col)
                    .ok_or_else(|| EngineError::execution(format!("column '{}' not found", col)))
            })
            .collect::<EngineResult<_>>()?;

        let rows = relation
            .rows
            .iter()
            .map(|row| indexes.iter().map(|&idx| row[idx].clone()).collect())
            .collect();
        Ok(Relation::with_rows(columns.to_vec(), rows))
    }

    fn distinct(&self, relation: &Relation) -> EngineResult<Relation> {
        let mut seen: FxHashSet<Vec<Value>> = FxHashSet::default();
        let mut rows = Vec::new();
        for row in &relation.rows {
            if seen.insert(row.clone()) {
                rows.push(row.clone());
            }
        }
        Ok(Relation::with_rows(relation.columns.clone(), rows))
    }
}
