/// Scalar values stored in relations
/// Hashing and ordering are manual: floats hash via their bit pattern and
/// order through ordered_float so relations can be grouped and deduplicated.
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Value {
    Int64(i64),
    Float64(f64),
    String(String),
    Bool(bool),
    Null,
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Numeric view of the value, coercing Int64 to Float64
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int64(v) => Some(*v as f64),
            Value::Float64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Int64(_) | Value::Float64(_))
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Int64(v) => write!(f, "{}", v),
            Value::Float64(v) => write!(f, "{}", v),
            Value::String(v) => write!(f, "{}", v),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Null => write!(f, "NULL"),
        }
    }
}

impl std::hash::Hash for Value {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        match self {
            Value::Int64(v) => {
                0u8.hash(state); // Discriminator
                v.hash(state);
            }
            Value::Float64(v) => {
                1u8.hash(state);
                v.to_bits().hash(state);
            }
            Value::String(v) => {
                2u8.hash(state);
                v.hash(state);
            }
            Value::Bool(v) => {
                3u8.hash(state);
                v.hash(state);
            }
            Value::Null => {
                4u8.hash(state);
            }
        }
    }
}

impl std::cmp::PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Int64(a), Value::Int64(b)) => a == b,
            (Value::Float64(a), Value::Float64(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Null, Value::Null) => true,
            _ => false,
        }
    }
}

impl std::cmp::Eq for Value {}

// PartialOrd within one variant only (floats use ordered_float for NaN
// handling). Cross-type numeric comparison lives in the evaluator.
impl std::cmp::PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        match (self, other) {
            (Value::Int64(a), Value::Int64(b)) => a.partial_cmp(b),
            (Value::Float64(a), Value::Float64(b)) => {
                use ordered_float::OrderedFloat;
                OrderedFloat(*a).partial_cmp(&OrderedFloat(*b))
            }
            (Value::String(a), Value::String(b)) => a.partial_cmp(b),
            (Value::Bool(a), Value::Bool(b)) => a.partial_cmp(b),
            (Value::Null, Value::Null) => Some(std::cmp::Ordering::Equal),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    fn hash_of(value: &Value) -> u64 {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_equality_is_strict_per_variant() {
        assert_eq!(Value::Int64(3), Value::Int64(3));
        assert_ne!(Value::Int64(3), Value::Float64(3.0));
        assert_eq!(Value::Null, Value::Null);
    }

    #[test]
    fn test_hash_matches_equality() {
        assert_eq!(hash_of(&Value::String("NY".into())), hash_of(&Value::String("NY".into())));
        assert_ne!(hash_of(&Value::Int64(1)), hash_of(&Value::Float64(1.0)));
    }

    #[test]
    fn test_string_ordering_is_lexicographic() {
        let lo = Value::String("96/05/31".into());
        let hi = Value::String("96/09/01".into());
        assert!(lo < hi);
    }
}
