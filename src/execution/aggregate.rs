/// Windowed aggregation
/// Computes an aggregate per grouping-key partition and broadcasts the value
/// to every row of the partition under a new column; rows are never
/// collapsed here, the final distinct pass does that.
use fxhash::FxHashMap;

use crate::error::{EngineError, EngineResult};
use crate::execution::evaluator::compare_values;
use crate::query::alias::Aggregate;
use crate::storage::relation::Relation;
use crate::storage::value::Value;

#[derive(Clone, Debug)]
pub struct AggregateSpec {
    pub function: Aggregate,
    pub column: String,
    pub output: String,
}

#[derive(Default)]
struct Accumulator {
    count: i64,
    sum_int: i64,
    sum_float: f64,
    saw_float: bool,
    min: Option<Value>,
    max: Option<Value>,
}

impl Accumulator {
    fn update(&mut self, value: &Value, spec: &AggregateSpec) -> EngineResult<()> {
        if value.is_null() {
            return Ok(());
        }
        self.count += 1;

        match value {
            Value::Int64(v) => {
                self.sum_int += v;
                self.sum_float += *v as f64;
            }
            Value::Float64(v) => {
                self.saw_float = true;
                self.sum_float += v;
            }
            other => {
                if matches!(spec.function, Aggregate::Sum | Aggregate::Avg) {
                    return Err(EngineError::execution(format!(
                        "{}() over non-numeric value {} in column '{}'",
                        spec.function.name(),
                        other,
                        spec.column
                    )));
                }
            }
        }

        let is_lower = self
            .min
            .as_ref()
            .map(|m| compare_values(value, m) == Some(std::cmp::Ordering::Less))
            .unwrap_or(true);
        if is_lower {
            self.min = Some(value.clone());
        }
        let is_higher = self
            .max
            .as_ref()
            .map(|m| compare_values(value, m) == Some(std::cmp::Ordering::Greater))
            .unwrap_or(true);
        if is_higher {
            self.max = Some(value.clone());
        }
        Ok(())
    }

    fn finalize(&self, function: Aggregate) -> Value {
        match function {
            Aggregate::Count => Value::Int64(self.count),
            Aggregate::Sum => {
                if self.count == 0 {
                    Value::Null
                } else if self.saw_float {
                    Value::Float64(self.sum_float)
                } else {
                    Value::Int64(self.sum_int)
                }
            }
            Aggregate::Avg => {
                if self.count == 0 {
                    Value::Null
                } else {
                    Value::Float64(self.sum_float / self.count as f64)
                }
            }
            Aggregate::Min => self.min.clone().unwrap_or(Value::Null),
            Aggregate::Max => self.max.clone().unwrap_or(Value::Null),
        }
    }
}

/// Append `spec.output` to the relation, holding the aggregate of
/// `spec.column` over each grouping-key partition. An empty grouping key
/// treats the whole relation as one partition.
pub fn windowed_aggregate(
    relation: &Relation,
    partition: &[String],
    spec: &AggregateSpec,
) -> EngineResult<Relation> {
    let key_indexes: Vec<usize> = partition
        .iter()
        .map(|col| {
            relation
                .column_index(col)
                .ok_or_else(|| EngineError::execution(format!("column '{}' not found", col)))
        })
        .collect::<EngineResult<_>>()?;
    let value_index = relation.column_index(&spec.column).ok_or_else(|| {
        EngineError::execution(format!("column '{}' not found", spec.column))
    })?;
    if relation.has_column(&spec.output) {
        return Err(EngineError::execution(format!(
            "column '{}' already exists",
            spec.output
        )));
    }

    let mut partitions: FxHashMap<Vec<Value>, Accumulator> = FxHashMap::default();
    for row in &relation.rows {
        let key: Vec<Value> = key_indexes.iter().map(|&idx| row[idx].clone()).collect();
        partitions
            .entry(key)
            .or_default()
            .update(&row[value_index], spec)?;
    }

    let mut columns = relation.columns.clone();
    columns.push(spec.output.clone());
    let rows = relation
        .rows
        .iter()
        .map(|row| {
            let key: Vec<Value> = key_indexes.iter().map(|&idx| row[idx].clone()).collect();
            let value = partitions
                .get(&key)
                .map(|acc| acc.finalize(spec.function))
                .unwrap_or(Value::Null);
            let mut out = row.clone();
            out.push(value);
            out
        })
        .collect();

    Ok(Relation::with_rows(columns, rows))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn calls() -> Relation {
        Relation::with_rows(
            vec!["FromAC".into(), "Length".into()],
            vec![
                vec![Value::String("201".into()), Value::Int64(10)],
                vec![Value::String("201".into()), Value::Int64(20)],
                vec![Value::String("914".into()), Value::Int64(50)],
            ],
        )
    }

    fn spec(function: Aggregate) -> AggregateSpec {
        AggregateSpec {
            function,
            column: "Length".into(),
            output: "agg".into(),
        }
    }

    fn broadcast(function: Aggregate) -> Vec<Value> {
        let rel = windowed_aggregate(&calls(), &["FromAC".to_string()], &spec(function)).unwrap();
        let idx = rel.column_index("agg").unwrap();
        rel.rows.iter().map(|r| r[idx].clone()).collect()
    }

    #[test]
    fn test_sum_broadcasts_per_partition() {
        assert_eq!(
            broadcast(Aggregate::Sum),
            vec![Value::Int64(30), Value::Int64(30), Value::Int64(50)]
        );
    }

    #[test]
    fn test_max_and_count() {
        assert_eq!(
            broadcast(Aggregate::Max),
            vec![Value::Int64(20), Value::Int64(20), Value::Int64(50)]
        );
        assert_eq!(
            broadcast(Aggregate::Count),
            vec![Value::Int64(2), Value::Int64(2), Value::Int64(1)]
        );
    }

    #[test]
    fn test_avg_is_float() {
        assert_eq!(
            broadcast(Aggregate::Avg),
            vec![Value::Float64(15.0), Value::Float64(15.0), Value::Float64(50.0)]
        );
    }

    #[test]
    fn test_empty_partition_key_spans_relation() {
        let rel = windowed_aggregate(&calls(), &[], &spec(Aggregate::Sum)).unwrap();
        let idx = rel.column_index("agg").unwrap();
        assert!(rel.rows.iter().all(|r| r[idx] == Value::Int64(80)));
    }

    #[test]
    fn test_nulls_are_skipped() {
        let rel = Relation::with_rows(
            vec!["k".into(), "v".into()],
            vec![
                vec![Value::Int64(1), Value::Null],
                vec![Value::Int64(1), Value::Int64(4)],
            ],
        );
        let out = windowed_aggregate(
            &rel,
            &["k".to_string()],
            &AggregateSpec {
                function: Aggregate::Count,
                column: "v".into(),
                output: "c".into(),
            },
        )
        .unwrap();
        let idx = out.column_index("c").unwrap();
        assert_eq!(out.rows[0][idx], Value::Int64(1));
    }

    #[test]
    fn test_sum_over_strings_fails() {
        let rel = Relation::with_rows(
            vec!["k".into(), "v".into()],
            vec![vec![Value::Int64(1), Value::String("x".into())]],
        );
        let result = windowed_aggregate(
            &rel,
            &["k".to_string()],
            &AggregateSpec {
                function: Aggregate::Sum,
                column: "v".into(),
                output: "s".into(),
            },
        );
        assert!(result.is_err());
    }
}
