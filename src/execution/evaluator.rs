/// Row-wise expression evaluation
/// Binds an expression tree to a relation's column layout and evaluates it
/// one row at a time. Comparisons involving NULL are not true; arithmetic
/// coerces Int64 and Float64.
use std::cmp::Ordering;

use fxhash::FxHashMap;

use crate::error::{EngineError, EngineResult};
use crate::query::expression::{BinaryOperator, Expression, UnaryOperator};
use crate::storage::relation::Relation;
use crate::storage::value::Value;

pub struct ExpressionEvaluator {
    index: FxHashMap<String, usize>,
}

impl ExpressionEvaluator {
    pub fn new(relation: &Relation) -> Self {
        let mut index = FxHashMap::default();
        for (idx, name) in relation.columns.iter().enumerate() {
            index.entry(name.clone()).or_insert(idx);
        }
        Self { index }
    }

    /// Evaluate an expression against one row
    pub fn evaluate(&self, expr: &Expression, row: &[Value]) -> EngineResult<Value> {
        match expr {
            Expression::Column(cr) => {
                if let Some(gv) = &cr.gv {
                    return Err(EngineError::execution(format!(
                        "unresolved column reference '{}.{}'",
                        gv, cr.name
                    )));
                }
                let idx = self.index.get(&cr.name).ok_or_else(|| {
                    EngineError::execution(format!("column '{}' not found", cr.name))
                })?;
                Ok(row[*idx].clone())
            }
            Expression::Literal(value) => Ok(value.clone()),
            Expression::Aggregate { func, arg } => Err(EngineError::execution(format!(
                "unresolved aggregate call {}({})",
                func.name(),
                arg
            ))),
            Expression::UnaryOp { op, expr } => match op {
                UnaryOperator::Not => {
                    let truth = self.evaluate_bool(expr, row)?;
                    Ok(Value::Bool(!truth))
                }
                UnaryOperator::Negate => match self.evaluate(expr, row)? {
                    Value::Int64(v) => Ok(Value::Int64(-v)),
                    Value::Float64(v) => Ok(Value::Float64(-v)),
                    Value::Null => Ok(Value::Null),
                    other => Err(EngineError::execution(format!(
                        "cannot negate non-numeric value {}",
                        other
                    ))),
                },
            },
            Expression::BinaryOp { left, op, right } => self.evaluate_binary(left, *op, right, row),
        }
    }

    /// Evaluate as a predicate result: anything but true is false
    pub fn evaluate_bool(&self, expr: &Expression, row: &[Value]) -> EngineResult<bool> {
        Ok(matches!(self.evaluate(expr, row)?, Value::Bool(true)))
    }

    fn evaluate_binary(
        &self,
        left: &Expression,
        op: BinaryOperator,
        right: &Expression,
        row: &[Value],
    ) -> EngineResult<Value> {
        match op {
            BinaryOperator::And => {
                if !self.evaluate_bool(left, row)? {
                    return Ok(Value::Bool(false));
                }
                Ok(Value::Bool(self.evaluate_bool(right, row)?))
            }
            BinaryOperator::Or => {
                if self.evaluate_bool(left, row)? {
                    return Ok(Value::Bool(true));
                }
                Ok(Value::Bool(self.evaluate_bool(right, row)?))
            }
            BinaryOperator::Eq
            | BinaryOperator::NotEq
            | BinaryOperator::Lt
            | BinaryOperator::LtEq
            | BinaryOperator::Gt
            | BinaryOperator::GtEq => {
                let lhs = self.evaluate(left, row)?;
                let rhs = self.evaluate(right, row)?;
                if lhs.is_null() || rhs.is_null() {
                    return Ok(Value::Null);
                }
                let verdict = match compare_values(&lhs, &rhs) {
                    Some(ordering) => match op {
                        BinaryOperator::Eq => ordering == Ordering::Equal,
                        BinaryOperator::NotEq => ordering != Ordering::Equal,
                        BinaryOperator::Lt => ordering == Ordering::Less,
                        BinaryOperator::LtEq => ordering != Ordering::Greater,
                        BinaryOperator::Gt => ordering == Ordering::Greater,
                        BinaryOperator::GtEq => ordering != Ordering::Less,
                        _ => unreachable!("comparison arm only"),
                    },
                    // Incomparable types never satisfy a comparison
                    None => false,
                };
                Ok(Value::Bool(verdict))
            }
            BinaryOperator::Add | BinaryOperator::Subtract | BinaryOperator::Multiply | BinaryOperator::Divide => {
                let lhs = self.evaluate(left, row)?;
                let rhs = self.evaluate(right, row)?;
                arithmetic(&lhs, op, &rhs)
            }
        }
    }
}

/// Compare two values, coercing Int64 and Float64 to a common domain.
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Int64(x), Value::Float64(_)) => {
            Value::Float64(*x as f64).partial_cmp(b)
        }
        (Value::Float64(_), Value::Int64(y)) => {
            a.partial_cmp(&Value::Float64(*y as f64))
        }
        _ => a.partial_cmp(b),
    }
}

fn arithmetic(lhs: &Value, op: BinaryOperator, rhs: &Value) -> EngineResult<Value> {
    if lhs.is_null() || rhs.is_null() {
        return Ok(Value::Null);
    }
    let (Some(x), Some(y)) = (lhs.as_f64(), rhs.as_f64()) else {
        return Err(EngineError::execution(format!(
            "non-numeric operand in arithmetic: {} and {}",
            lhs, rhs
        )));
    };

    // Integer arithmetic stays integral except for division
    if let (Value::Int64(a), Value::Int64(b)) = (lhs, rhs) {
        match op {
            BinaryOperator::Add => return Ok(Value::Int64(a + b)),
            BinaryOperator::Subtract => return Ok(Value::Int64(a - b)),
            BinaryOperator::Multiply => return Ok(Value::Int64(a * b)),
            BinaryOperator::Divide => {}
            _ => unreachable!("arithmetic arm only"),
        }
    }

    let result = match op {
        BinaryOperator::Add => x + y,
        BinaryOperator::Subtract => x - y,
        BinaryOperator::Multiply => x * y,
        BinaryOperator::Divide => {
            if y == 0.0 {
                return Ok(Value::Null);
            }
            x / y
        }
        _ => unreachable!("arithmetic arm only"),
    };
    Ok(Value::Float64(result))
}
