/// Grouping-variable-scoped predicate parsing
/// Splits a clause into conditions, scopes every comparison to one grouping
/// variable, rewrites cross-variable and aggregate operands to canonical
/// alias columns, and records the dependency edges those operands induce.
use crate::error::{EngineError, EngineResult};
use crate::query::alias::{ColumnAlias, BASE_GV};
use crate::query::clauses::split_comma_list;
use crate::query::expression::{
    BinaryOperator, ColumnRef, Expression, ExpressionParser, UnaryOperator,
};

/// Parsed suchthat clause: one predicate tree per grouping variable plus the
/// cross-reference edges and derived-column triples the conditions need.
#[derive(Clone, Debug, Default)]
pub struct ParsedPredicates {
    pub per_gv: Vec<(String, Expression)>,
    pub edges: Vec<(String, String)>,
    pub referenced: Vec<ColumnAlias>,
}

pub fn parse_suchthat(text: &str, declared: &[String]) -> EngineResult<ParsedPredicates> {
    let mut parsed = ParsedPredicates::default();

    for item in split_comma_list(text) {
        let expr = ExpressionParser::parse(&item)?;
        let scope = condition_scope(&expr, &item, declared)?;
        let rewritten = rewrite_row_scoped(
            &expr,
            &scope,
            declared,
            &mut parsed.edges,
            &mut parsed.referenced,
        )?;
        match parsed.per_gv.iter_mut().find(|(gv, _)| *gv == scope) {
            Some((_, existing)) => {
                let previous = existing.clone();
                *existing = Expression::binary(previous, BinaryOperator::And, rewritten);
            }
            None => parsed.per_gv.push((scope, rewritten)),
        }
    }

    Ok(parsed)
}

/// Parse the having clause: scoped to the base grouping variable, every
/// column and aggregate reference normalized to its canonical alias. Raw
/// references to grouping-key columns stay unaliased since the combined
/// relation carries the grouping key itself.
pub fn parse_having(
    text: &str,
    declared: &[String],
    partition: &[String],
) -> EngineResult<(Expression, Vec<ColumnAlias>)> {
    let mut referenced = Vec::new();
    let mut combined: Option<Expression> = None;

    for item in split_comma_list(text) {
        let expr = ExpressionParser::parse(&item)?;
        validate_condition_shape(&expr, &item)?;
        let rewritten = rewrite_value_scoped(&expr, declared, partition, &mut referenced)?;
        combined = Some(match combined {
            Some(previous) => Expression::binary(previous, BinaryOperator::And, rewritten),
            None => rewritten,
        });
    }

    match combined {
        Some(expr) => Ok((expr, referenced)),
        None => Err(EngineError::malformed("empty having clause")),
    }
}

/// Parse the where clause: applied once to the base relation before any
/// grouping-variable processing, so it may only see base columns.
pub fn parse_where(text: &str, declared: &[String]) -> EngineResult<Expression> {
    let mut combined: Option<Expression> = None;

    for item in split_comma_list(text) {
        let expr = ExpressionParser::parse(&item)?;
        validate_condition_shape(&expr, &item)?;
        let rewritten = rewrite_base_only(&expr, declared, &item)?;
        combined = Some(match combined {
            Some(previous) => Expression::binary(previous, BinaryOperator::And, rewritten),
            None => rewritten,
        });
    }

    combined.ok_or_else(|| EngineError::malformed("empty where clause"))
}

/// Every leaf of the and/or/not structure must be a single comparison.
fn validate_condition_shape(expr: &Expression, source: &str) -> EngineResult<()> {
    let mut atoms = Vec::new();
    collect_comparisons(expr, source, &mut atoms)?;
    Ok(())
}

fn collect_comparisons<'a>(
    expr: &'a Expression,
    source: &str,
    out: &mut Vec<&'a Expression>,
) -> EngineResult<()> {
    match expr {
        Expression::BinaryOp { op, left, right }
            if matches!(op, BinaryOperator::And | BinaryOperator::Or) =>
        {
            collect_comparisons(left, source, out)?;
            collect_comparisons(right, source, out)
        }
        Expression::UnaryOp { op: UnaryOperator::Not, expr } => {
            collect_comparisons(expr, source, out)
        }
        Expression::BinaryOp { op, .. } if op.is_comparison() => {
            out.push(expr);
            Ok(())
        }
        _ => Err(EngineError::invalid_predicate(
            source,
            "condition does not split into left, operator, right",
        )),
    }
}

/// Scope of one condition: the grouping variable of the left side of its
/// first comparison. All comparisons in the condition must agree.
fn condition_scope(expr: &Expression, source: &str, declared: &[String]) -> EngineResult<String> {
    let mut atoms = Vec::new();
    collect_comparisons(expr, source, &mut atoms)?;

    let mut scope: Option<String> = None;
    for atom in atoms {
        let left = match atom {
            Expression::BinaryOp { left, .. } => left,
            _ => unreachable!("collect_comparisons only yields comparisons"),
        };
        let atom_scope = side_scope(left).unwrap_or_else(|| BASE_GV.to_string());
        match &scope {
            None => scope = Some(atom_scope),
            Some(existing) if *existing == atom_scope => {}
            Some(existing) => {
                return Err(EngineError::invalid_predicate(
                    source,
                    format!(
                        "condition mixes grouping variables '{}' and '{}'; use separate conditions",
                        existing, atom_scope
                    ),
                ))
            }
        }
    }

    let scope = scope.unwrap_or_else(|| BASE_GV.to_string());
    if !declared.iter().any(|gv| *gv == scope) {
        return Err(EngineError::unknown_gv(scope, "suchthat clause"));
    }
    Ok(scope)
}

/// First column reference decides the scope; an aggregate-only side falls
/// back to the aggregate's grouping variable.
fn side_scope(expr: &Expression) -> Option<String> {
    fn first_column(expr: &Expression) -> Option<String> {
        match expr {
            Expression::Column(cr) => Some(cr.gv.clone().unwrap_or_else(|| BASE_GV.to_string())),
            Expression::BinaryOp { left, right, .. } => {
                first_column(left).or_else(|| first_column(right))
            }
            Expression::UnaryOp { expr, .. } => first_column(expr),
            _ => None,
        }
    }
    fn first_aggregate(expr: &Expression) -> Option<String> {
        match expr {
            Expression::Aggregate { arg, .. } => {
                Some(arg.gv.clone().unwrap_or_else(|| BASE_GV.to_string()))
            }
            Expression::BinaryOp { left, right, .. } => {
                first_aggregate(left).or_else(|| first_aggregate(right))
            }
            Expression::UnaryOp { expr, .. } => first_aggregate(expr),
            _ => None,
        }
    }
    first_column(expr).or_else(|| first_aggregate(expr))
}

fn check_declared(gv: &str, declared: &[String], context: &str) -> EngineResult<()> {
    if declared.iter().any(|d| d == gv) {
        Ok(())
    } else {
        Err(EngineError::unknown_gv(gv, context))
    }
}

fn record_edge(edges: &mut Vec<(String, String)>, from: &str, to: &str) {
    let edge = (from.to_string(), to.to_string());
    if !edges.contains(&edge) {
        edges.push(edge);
    }
}

fn record_triple(referenced: &mut Vec<ColumnAlias>, triple: ColumnAlias) -> String {
    let encoded = triple.encode();
    if !referenced.contains(&triple) {
        referenced.push(triple);
    }
    encoded
}

/// Rewrite a suchthat condition for its scope: own and unqualified columns
/// become plain base-relation columns; operands belonging to another
/// grouping variable become canonical alias columns and dependency edges.
fn rewrite_row_scoped(
    expr: &Expression,
    scope: &str,
    declared: &[String],
    edges: &mut Vec<(String, String)>,
    referenced: &mut Vec<ColumnAlias>,
) -> EngineResult<Expression> {
    match expr {
        Expression::Column(cr) => match &cr.gv {
            None => Ok(Expression::Column(ColumnRef::plain(cr.name.clone()))),
            Some(gv) if gv == scope => Ok(Expression::Column(ColumnRef::plain(cr.name.clone()))),
            Some(other) => {
                check_declared(other, declared, "suchthat clause")?;
                record_edge(edges, scope, other);
                let encoded = record_triple(referenced, ColumnAlias::raw(other.clone(), cr.name.clone()));
                Ok(Expression::Column(ColumnRef::plain(encoded)))
            }
        },
        Expression::Aggregate { func, arg } => {
            let target = arg.gv.clone().unwrap_or_else(|| BASE_GV.to_string());
            check_declared(&target, declared, "suchthat clause")?;
            record_edge(edges, scope, &target);
            let encoded =
                record_triple(referenced, ColumnAlias::aggregated(*func, target, arg.name.clone()));
            Ok(Expression::Column(ColumnRef::plain(encoded)))
        }
        Expression::Literal(value) => Ok(Expression::Literal(value.clone())),
        Expression::BinaryOp { left, op, right } => Ok(Expression::binary(
            rewrite_row_scoped(left, scope, declared, edges, referenced)?,
            *op,
            rewrite_row_scoped(right, scope, declared, edges, referenced)?,
        )),
        Expression::UnaryOp { op, expr } => Ok(Expression::UnaryOp {
            op: *op,
            expr: Box::new(rewrite_row_scoped(expr, scope, declared, edges, referenced)?),
        }),
    }
}

/// Rewrite a having condition into the post-aggregation column space.
fn rewrite_value_scoped(
    expr: &Expression,
    declared: &[String],
    partition: &[String],
    referenced: &mut Vec<ColumnAlias>,
) -> EngineResult<Expression> {
    match expr {
        Expression::Column(cr) => {
            let gv = cr.gv.clone().unwrap_or_else(|| BASE_GV.to_string());
            check_declared(&gv, declared, "having clause")?;
            if gv == BASE_GV && partition.iter().any(|p| *p == cr.name) {
                // Grouping-key columns survive the combine unaliased
                return Ok(Expression::Column(ColumnRef::plain(cr.name.clone())));
            }
            let encoded = record_triple(referenced, ColumnAlias::raw(gv, cr.name.clone()));
            Ok(Expression::Column(ColumnRef::plain(encoded)))
        }
        Expression::Aggregate { func, arg } => {
            let gv = arg.gv.clone().unwrap_or_else(|| BASE_GV.to_string());
            check_declared(&gv, declared, "having clause")?;
            let encoded = record_triple(referenced, ColumnAlias::aggregated(*func, gv, arg.name.clone()));
            Ok(Expression::Column(ColumnRef::plain(encoded)))
        }
        Expression::Literal(value) => Ok(Expression::Literal(value.clone())),
        Expression::BinaryOp { left, op, right } => Ok(Expression::binary(
            rewrite_value_scoped(left, declared, partition, referenced)?,
            *op,
            rewrite_value_scoped(right, declared, partition, referenced)?,
        )),
        Expression::UnaryOp { op, expr } => Ok(Expression::UnaryOp {
            op: *op,
            expr: Box::new(rewrite_value_scoped(expr, declared, partition, referenced)?),
        }),
    }
}

/// Where runs before any grouping-variable processing: only base columns.
fn rewrite_base_only(
    expr: &Expression,
    declared: &[String],
    source: &str,
) -> EngineResult<Expression> {
    match expr {
        Expression::Column(cr) => match &cr.gv {
            None => Ok(Expression::Column(ColumnRef::plain(cr.name.clone()))),
            Some(gv) if gv == BASE_GV => Ok(Expression::Column(ColumnRef::plain(cr.name.clone()))),
            Some(other) => Err(EngineError::unknown_gv(other.clone(), "where clause")),
        },
        Expression::Aggregate { func, .. } => Err(EngineError::invalid_predicate(
            source,
            format!("{}() is not allowed in the where clause", func.name()),
        )),
        Expression::Literal(value) => Ok(Expression::Literal(value.clone())),
        Expression::BinaryOp { left, op, right } => Ok(Expression::binary(
            rewrite_base_only(left, declared, source)?,
            *op,
            rewrite_base_only(right, declared, source)?,
        )),
        Expression::UnaryOp { op, expr } => Ok(Expression::UnaryOp {
            op: *op,
            expr: Box::new(rewrite_base_only(expr, declared, source)?),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::alias::Aggregate;

    fn declared() -> Vec<String> {
        vec![BASE_GV.to_string(), "x".to_string(), "y".to_string()]
    }

    #[test]
    fn test_suchthat_scopes_by_left_side() {
        let parsed =
            parse_suchthat("x.state = 'NY' and x.quant > 15, y.state = 'NJ'", &declared()).unwrap();
        let gvs: Vec<&str> = parsed.per_gv.iter().map(|(gv, _)| gv.as_str()).collect();
        assert_eq!(gvs, vec!["x", "y"]);
        assert!(parsed.edges.is_empty());
    }

    #[test]
    fn test_unqualified_conditions_scope_to_base() {
        let parsed = parse_suchthat("quant > 0", &declared()).unwrap();
        assert_eq!(parsed.per_gv.len(), 1);
        assert_eq!(parsed.per_gv[0].0, BASE_GV);
    }

    #[test]
    fn test_cross_reference_records_edge_and_alias() {
        let parsed = parse_suchthat("x.quant > avg(y.quant)", &declared()).unwrap();
        assert_eq!(parsed.edges, vec![("x".to_string(), "y".to_string())]);
        assert_eq!(parsed.referenced, vec![ColumnAlias::aggregated(Aggregate::Avg, "y", "quant")]);
        match &parsed.per_gv[0].1 {
            Expression::BinaryOp { right, .. } => match right.as_ref() {
                Expression::Column(cr) => assert_eq!(cr.name, "avg_y_quant"),
                other => panic!("unexpected operand: {other:?}"),
            },
            other => panic!("unexpected tree: {other:?}"),
        }
    }

    #[test]
    fn test_mixed_scope_condition_is_invalid() {
        assert!(matches!(
            parse_suchthat("x.quant > 1 and y.quant > 2", &declared()),
            Err(EngineError::InvalidPredicate { .. })
        ));
    }

    #[test]
    fn test_undeclared_gv_is_rejected() {
        assert!(matches!(
            parse_suchthat("z.quant > 1", &declared()),
            Err(EngineError::UnknownGroupingVariable { .. })
        ));
    }

    #[test]
    fn test_same_gv_conditions_merge_with_and() {
        let parsed = parse_suchthat("x.quant > 1, x.state = 'NY'", &declared()).unwrap();
        assert_eq!(parsed.per_gv.len(), 1);
        assert!(matches!(
            parsed.per_gv[0].1,
            Expression::BinaryOp { op: BinaryOperator::And, .. }
        ));
    }

    #[test]
    fn test_having_rewrites_aggregates_to_aliases() {
        let partition = vec!["FromAC".to_string()];
        let declared = vec![BASE_GV.to_string(), "R".to_string()];
        let (expr, referenced) =
            parse_having("sum(R.Length)*3 > sum(Length)", &declared, &partition).unwrap();
        assert_eq!(referenced.len(), 2);
        assert_eq!(referenced[0].encode(), "sum_R_Length");
        assert_eq!(referenced[1].encode(), "sum_GV0_Length");
        let mut names = Vec::new();
        expr.collect_column_names(&mut names);
        assert_eq!(names, vec!["sum_R_Length", "sum_GV0_Length"]);
    }

    #[test]
    fn test_having_keeps_grouping_key_raw() {
        let partition = vec!["FromAC".to_string()];
        let declared = vec![BASE_GV.to_string()];
        let (expr, referenced) = parse_having("FromAC = '201'", &declared, &partition).unwrap();
        assert!(referenced.is_empty());
        let mut names = Vec::new();
        expr.collect_column_names(&mut names);
        assert_eq!(names, vec!["FromAC"]);
    }

    #[test]
    fn test_where_rejects_grouping_variables_and_aggregates() {
        assert!(matches!(
            parse_where("x.quant > 1", &declared()),
            Err(EngineError::UnknownGroupingVariable { .. })
        ));
        assert!(matches!(
            parse_where("sum(quant) > 1", &declared()),
            Err(EngineError::InvalidPredicate { .. })
        ));
    }

    #[test]
    fn test_bare_condition_is_invalid() {
        assert!(matches!(
            parse_suchthat("x.quant", &declared()),
            Err(EngineError::InvalidPredicate { .. })
        ));
    }
}
