/// Phi-operator specification
/// Structured form of one groupwise query: select triples, grouping key,
/// grouping variables, per-variable predicates, having, optional where.
use std::sync::OnceLock;

use regex::Regex;

use crate::error::{EngineError, EngineResult};
use crate::query::alias::{Aggregate, ColumnAlias, BASE_GV};
use crate::query::clauses::{split_comma_list, Clauses};
use crate::query::expression::{ColumnRef, Expression};
use crate::query::predicate;

#[derive(Clone, Debug)]
pub struct PhiOperatorSpec {
    /// Base relation named by the from clause
    pub relation_name: String,

    /// Select-list triples, in output order
    pub select: Vec<ColumnAlias>,

    /// 1 (implicit base variable) + declared grouping-variable count
    pub group_count: usize,

    /// Grouping key shared by every grouping variable
    pub partition_columns: Vec<String>,

    /// Declared grouping-variable names, excluding the implicit base
    pub grouping_variables: Vec<String>,

    /// Every derived-column triple the query needs: select list, having
    /// references, and suchthat cross-references, deduplicated
    pub aggregates: Vec<ColumnAlias>,

    /// Per-grouping-variable filter predicates, in source order
    pub predicates: Vec<(String, Expression)>,

    /// Post-aggregation filter over the combined relation
    pub having: Option<Expression>,

    /// Optional filter applied once to the base relation
    pub where_predicate: Option<Expression>,

    /// Cross-reference edges (dependent, referenced) from the suchthat clause
    pub dependencies: Vec<(String, String)>,
}

impl PhiOperatorSpec {
    pub fn predicate_for(&self, gv: &str) -> Option<&Expression> {
        self.predicates
            .iter()
            .find(|(name, _)| name == gv)
            .map(|(_, expr)| expr)
    }

    /// Triples a grouping variable must materialize under canonical aliases.
    /// Raw base-variable references to grouping-key columns are excluded:
    /// those survive as the grouping key itself.
    pub fn owned_triples(&self, gv: &str) -> Vec<&ColumnAlias> {
        self.aggregates
            .iter()
            .filter(|t| t.gv == gv && !self.is_plain_key(t))
            .collect()
    }

    /// Canonical alias names every stored relation may need downstream
    pub fn needed_alias_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        for triple in &self.aggregates {
            if self.is_plain_key(triple) {
                continue;
            }
            let encoded = triple.encode();
            if !names.contains(&encoded) {
                names.push(encoded);
            }
        }
        names
    }

    /// Column of the combined relation a select triple projects from
    pub fn select_source(&self, triple: &ColumnAlias) -> String {
        if self.is_plain_key(triple) {
            triple.column.clone()
        } else {
            triple.encode()
        }
    }

    fn is_plain_key(&self, triple: &ColumnAlias) -> bool {
        triple.is_raw()
            && triple.gv == BASE_GV
            && self.partition_columns.iter().any(|c| *c == triple.column)
    }

    /// Whether a grouping variable materializes anything at all
    pub fn is_active(&self, gv: &str) -> bool {
        !self.owned_triples(gv).is_empty()
            || self.predicate_for(gv).is_some()
            || self.dependencies.iter().any(|(c, v)| c == gv || v == gv)
    }

    /// Grouping variables that materialize anything, in declaration order
    /// with the base variable first
    pub fn materialized_gvs(&self) -> Vec<String> {
        let mut gvs = Vec::new();
        if self.is_active(BASE_GV) {
            gvs.push(BASE_GV.to_string());
        }
        for gv in &self.grouping_variables {
            if self.is_active(gv) {
                gvs.push(gv.clone());
            }
        }
        gvs
    }
}

/// Compiled form of a query: the specification plus the evaluation order and
/// join plan derived from its dependency graph.
#[derive(Clone, Debug)]
pub struct CompiledQuery {
    pub spec: PhiOperatorSpec,

    /// Grouping variables in evaluation order (dependencies first)
    pub evaluation_order: Vec<String>,

    /// Join Planner's selected subset of grouping-variable results
    pub join_set: Vec<String>,

    /// Relations actually joined into the combined result, anchor first
    pub join_participants: Vec<String>,

    /// Direct dependencies per grouping variable, aligned with evaluation
    pub dependencies: Vec<(String, Vec<String>)>,
}

impl CompiledQuery {
    pub fn dependencies_of(&self, gv: &str) -> &[String] {
        self.dependencies
            .iter()
            .find(|(name, _)| name == gv)
            .map(|(_, deps)| deps.as_slice())
            .unwrap_or(&[])
    }
}

static AGGREGATE_CALL: OnceLock<Regex> = OnceLock::new();

fn aggregate_call_re() -> &'static Regex {
    AGGREGATE_CALL.get_or_init(|| {
        Regex::new(r"^(?i)(sum|avg|count|min|max)\s*\(\s*([^()]+?)\s*\)$")
            .expect("aggregate call pattern")
    })
}

/// Build the phi-operator specification from split clauses.
pub fn build(clauses: &Clauses) -> EngineResult<PhiOperatorSpec> {
    let (partition_columns, grouping_variables) = parse_group_by(&clauses.group_by)?;

    let mut declared: Vec<String> = Vec::with_capacity(grouping_variables.len() + 1);
    declared.push(BASE_GV.to_string());
    declared.extend(grouping_variables.iter().cloned());

    let select = parse_select(&clauses.select, &declared)?;

    let parsed = if clauses.suchthat.is_empty() {
        predicate::ParsedPredicates::default()
    } else {
        predicate::parse_suchthat(&clauses.suchthat, &declared)?
    };

    let (having, having_refs) = if clauses.having.is_empty() {
        (None, Vec::new())
    } else {
        let (expr, refs) = predicate::parse_having(&clauses.having, &declared, &partition_columns)?;
        (Some(expr), refs)
    };

    let where_predicate = match &clauses.where_clause {
        Some(body) if !body.is_empty() => Some(predicate::parse_where(body, &declared)?),
        _ => None,
    };

    // Deduplicated triple set: select order, then having, then suchthat
    // cross-references
    let mut aggregates: Vec<ColumnAlias> = Vec::new();
    for triple in select.iter().chain(having_refs.iter()).chain(parsed.referenced.iter()) {
        if !aggregates.contains(triple) {
            aggregates.push(triple.clone());
        }
    }

    Ok(PhiOperatorSpec {
        relation_name: parse_from(&clauses.from)?,
        select,
        group_count: 1 + grouping_variables.len(),
        partition_columns,
        grouping_variables,
        aggregates,
        predicates: parsed.per_gv,
        having,
        where_predicate,
        dependencies: parsed.edges,
    })
}

fn parse_from(body: &str) -> EngineResult<String> {
    let name = body.trim();
    if name.is_empty() || name.contains(char::is_whitespace) {
        return Err(EngineError::malformed(format!(
            "from clause must name a single relation, got '{}'",
            body
        )));
    }
    Ok(name.to_string())
}

fn parse_group_by(body: &str) -> EngineResult<(Vec<String>, Vec<String>)> {
    let (columns_part, gvs_part) = body.split_once(':').ok_or_else(|| {
        EngineError::malformed("group by clause must declare grouping variables after ':'")
    })?;
    if gvs_part.contains(':') {
        return Err(EngineError::malformed("group by clause has more than one ':'"));
    }

    let partition_columns = split_comma_list(columns_part);
    let grouping_variables = split_comma_list(gvs_part);
    if grouping_variables.is_empty() {
        return Err(EngineError::malformed(
            "group by clause declares no grouping variables",
        ));
    }

    let mut seen: Vec<&String> = Vec::new();
    for gv in &grouping_variables {
        if gv == BASE_GV {
            return Err(EngineError::malformed(format!(
                "grouping variable name '{}' is reserved",
                BASE_GV
            )));
        }
        if seen.contains(&gv) {
            return Err(EngineError::malformed(format!(
                "duplicate grouping variable '{}'",
                gv
            )));
        }
        seen.push(gv);
    }

    Ok((partition_columns, grouping_variables))
}

fn parse_select(body: &str, declared: &[String]) -> EngineResult<Vec<ColumnAlias>> {
    let items = split_comma_list(body);
    if items.is_empty() {
        return Err(EngineError::malformed("empty select list"));
    }

    let mut select = Vec::with_capacity(items.len());
    for item in items {
        let triple = parse_select_item(&item)?;
        if !declared.iter().any(|gv| *gv == triple.gv) {
            return Err(EngineError::unknown_gv(triple.gv, "select list"));
        }
        select.push(triple);
    }
    Ok(select)
}

/// A select item is a bare column, gv.column, or agg(column reference).
fn parse_select_item(item: &str) -> EngineResult<ColumnAlias> {
    if let Some(caps) = aggregate_call_re().captures(item) {
        let func = Aggregate::from_name(&caps[1])
            .expect("pattern only matches known aggregates");
        let arg = ColumnRef::parse(caps[2].trim());
        let gv = arg.gv.unwrap_or_else(|| BASE_GV.to_string());
        return Ok(ColumnAlias::aggregated(func, gv, arg.name));
    }

    let valid = !item.is_empty()
        && item.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '.');
    if !valid {
        return Err(EngineError::malformed(format!(
            "unsupported select expression '{}'",
            item
        )));
    }
    let reference = ColumnRef::parse(item);
    let gv = reference.gv.unwrap_or_else(|| BASE_GV.to_string());
    Ok(ColumnAlias::raw(gv, reference.name))
}
