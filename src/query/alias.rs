/// Canonical column aliases
/// Every derived column is a typed (aggregate, grouping variable, column)
/// triple; the encoded name disambiguates it across joins and the reverse
/// mapping reproduces the original select-list text.
use serde::{Deserialize, Serialize};

/// Implicit grouping variable for the unqualified base relation
pub const BASE_GV: &str = "GV0";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Aggregate {
    Sum,
    Avg,
    Count,
    Min,
    Max,
}

impl Aggregate {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "sum" => Some(Aggregate::Sum),
            "avg" => Some(Aggregate::Avg),
            "count" => Some(Aggregate::Count),
            "min" => Some(Aggregate::Min),
            "max" => Some(Aggregate::Max),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Aggregate::Sum => "sum",
            Aggregate::Avg => "avg",
            Aggregate::Count => "count",
            Aggregate::Min => "min",
            Aggregate::Max => "max",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnAlias {
    pub aggregate: Option<Aggregate>,
    pub gv: String,
    pub column: String,
}

impl ColumnAlias {
    pub fn raw(gv: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            aggregate: None,
            gv: gv.into(),
            column: column.into(),
        }
    }

    pub fn aggregated(aggregate: Aggregate, gv: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            aggregate: Some(aggregate),
            gv: gv.into(),
            column: column.into(),
        }
    }

    pub fn is_raw(&self) -> bool {
        self.aggregate.is_none()
    }

    /// Canonical relation column name, identical across parser and engine
    pub fn encode(&self) -> String {
        let aggregate = self.aggregate.map(|a| a.name()).unwrap_or("none");
        format!("{}_{}_{}", aggregate, self.gv, self.column)
    }

    /// Output name in the final relation: the select-list text this triple
    /// was parsed from, with the decoration dropped for plain base columns.
    pub fn output_name(&self) -> String {
        let reference = if self.gv == BASE_GV {
            self.column.clone()
        } else {
            format!("{}.{}", self.gv, self.column)
        };
        match self.aggregate {
            Some(aggregate) => format!("{}({})", aggregate.name(), reference),
            None => reference,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode() {
        assert_eq!(ColumnAlias::raw(BASE_GV, "FromAC").encode(), "none_GV0_FromAC");
        assert_eq!(
            ColumnAlias::aggregated(Aggregate::Sum, "R", "Length").encode(),
            "sum_R_Length"
        );
        assert_eq!(
            ColumnAlias::aggregated(Aggregate::Max, BASE_GV, "quant").encode(),
            "max_GV0_quant"
        );
    }

    #[test]
    fn test_output_name_round_trip() {
        // encode then output_name reproduces the select-list text for every
        // shape of triple
        let cases = [
            (ColumnAlias::raw(BASE_GV, "FromAC"), "FromAC"),
            (ColumnAlias::raw("R", "ToAC"), "R.ToAC"),
            (ColumnAlias::aggregated(Aggregate::Sum, BASE_GV, "Length"), "sum(Length)"),
            (ColumnAlias::aggregated(Aggregate::Sum, "R", "Length"), "sum(R.Length)"),
        ];
        for (alias, expected) in cases {
            assert_eq!(alias.output_name(), expected);
        }
    }

    #[test]
    fn test_aggregate_names() {
        for name in ["sum", "avg", "count", "min", "max"] {
            let aggregate = Aggregate::from_name(name).unwrap();
            assert_eq!(aggregate.name(), name);
        }
        assert_eq!(Aggregate::from_name("SUM"), Some(Aggregate::Sum));
        assert_eq!(Aggregate::from_name("median"), None);
    }
}
