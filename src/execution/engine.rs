/// Staged execution of a compiled groupwise query
///
/// Each grouping variable is evaluated in dependency order: inline the
/// relations it depends on, prune, filter, aggregate, store. The stored
/// relations the Join Planner selected are then combined, the having filter
/// applied, and the select list projected and deduplicated. The result map
/// lives for exactly one evaluation.
use tracing::{debug, info};

use crate::error::{EngineError, EngineResult};
use crate::execution::aggregate::AggregateSpec;
use crate::execution::substrate::Substrate;
use crate::query::alias::BASE_GV;
use crate::query::phi::{CompiledQuery, PhiOperatorSpec};
use crate::storage::relation::Relation;

pub struct ExecutionEngine<'a, S: Substrate> {
    substrate: &'a S,
}

impl<'a, S: Substrate> ExecutionEngine<'a, S> {
    pub fn new(substrate: &'a S) -> Self {
        Self { substrate }
    }

    pub fn execute(&self, query: &CompiledQuery, base: Relation) -> EngineResult<Relation> {
        let spec = &query.spec;
        let partition = &spec.partition_columns;

        // The where filter runs once, before any grouping-variable work
        let base = match &spec.where_predicate {
            Some(predicate) => self
                .substrate
                .filter(&base, predicate)
                .map_err(|e| e.tagged(BASE_GV, "where"))?,
            None => base,
        };

        let needed_aliases = spec.needed_alias_names();

        // Grouping-variable result map, owned by this evaluation only
        let mut results: Vec<(String, Relation)> = Vec::new();
        for gv in &query.evaluation_order {
            let relation = self.evaluate_gv(query, gv, &base, &needed_aliases, &results)?;
            debug!(
                "evaluated grouping variable {}: {} rows, columns {:?}",
                gv,
                relation.row_count(),
                relation.columns
            );
            results.push((gv.clone(), relation));
        }

        // Combine the planned subset, anchor first
        let mut combined = match query.join_participants.first() {
            Some(first) => stored(&results, first)?.clone(),
            None => base,
        };
        for gv in query.join_participants.iter().skip(1) {
            let relation = stored(&results, gv)?;
            combined = self
                .substrate
                .inner_join(&combined, relation, partition, gv)
                .map_err(|e| e.tagged(gv, "join"))?;
            let keep = retained_columns(&combined, partition, &needed_aliases);
            combined = self
                .substrate
                .project(&combined, &keep)
                .map_err(|e| e.tagged(gv, "join"))?;
        }

        if let Some(having) = &spec.having {
            combined = self
                .substrate
                .filter(&combined, having)
                .map_err(|e| e.tagged(BASE_GV, "having"))?;
        }

        let sources: Vec<String> = spec.select.iter().map(|t| spec.select_source(t)).collect();
        combined = self
            .substrate
            .project(&combined, &sources)
            .map_err(|e| e.tagged(BASE_GV, "projection"))?;
        combined.set_columns(spec.select.iter().map(|t| t.output_name()).collect())?;

        let result = self
            .substrate
            .distinct(&combined)
            .map_err(|e| e.tagged(BASE_GV, "distinct"))?;
        info!(
            "query over '{}' produced {} rows",
            spec.relation_name,
            result.row_count()
        );
        Ok(result)
    }

    fn evaluate_gv(
        &self,
        query: &CompiledQuery,
        gv: &str,
        base: &Relation,
        needed_aliases: &[String],
        results: &[(String, Relation)],
    ) -> EngineResult<Relation> {
        let spec = &query.spec;
        let partition = &spec.partition_columns;
        let mut relation = base.clone();

        // 1. Inline already-computed dependencies on the grouping key
        for dep in query.dependencies_of(gv) {
            let dep_relation = stored(results, dep)?;
            relation = self
                .substrate
                .inner_join(&relation, dep_relation, partition, dep)
                .map_err(|e| e.tagged(gv, "dependency-join"))?;
            relation = self
                .substrate
                .distinct(&relation)
                .map_err(|e| e.tagged(gv, "dependency-join"))?;
        }

        // 2. Prune to the grouping key plus what this variable still needs
        let keep = pruned_columns(spec, gv, &relation, needed_aliases);
        relation = self
            .substrate
            .project(&relation, &keep)
            .map_err(|e| e.tagged(gv, "prune"))?;

        // 3. Filter with the variable's own predicate
        if let Some(predicate) = spec.predicate_for(gv) {
            relation = self
                .substrate
                .filter(&relation, predicate)
                .map_err(|e| e.tagged(gv, "filter"))?;
        }

        // 4. Materialize owned triples under canonical aliases
        for triple in spec.owned_triples(gv) {
            match triple.aggregate {
                Some(function) => {
                    let aggregate = AggregateSpec {
                        function,
                        column: triple.column.clone(),
                        output: triple.encode(),
                    };
                    relation = self
                        .substrate
                        .with_windowed_aggregate(&relation, partition, &aggregate)
                        .map_err(|e| e.tagged(gv, "aggregate"))?;
                }
                None => {
                    relation
                        .duplicate_column(&triple.column, &triple.encode())
                        .map_err(|e| e.tagged(gv, "aggregate"))?;
                }
            }
        }

        // 5. Store shape: grouping key plus alias columns. Broadcast makes
        // rows repeat per base row, so deduplicate before storing.
        let store = retained_columns(&relation, partition, needed_aliases);
        relation = self
            .substrate
            .project(&relation, &store)
            .map_err(|e| e.tagged(gv, "store"))?;
        self.substrate
            .distinct(&relation)
            .map_err(|e| e.tagged(gv, "store"))
    }
}

fn stored<'r>(results: &'r [(String, Relation)], gv: &str) -> EngineResult<&'r Relation> {
    results
        .iter()
        .find(|(name, _)| name == gv)
        .map(|(_, relation)| relation)
        .ok_or_else(|| {
            EngineError::execution(format!(
                "grouping variable '{}' was not evaluated before use",
                gv
            ))
        })
}

/// Columns a grouping variable's working relation must keep after inlining:
/// the grouping key, columns its predicate reads, raw columns feeding its
/// owned triples, and inherited alias columns the query still needs.
fn pruned_columns(
    spec: &PhiOperatorSpec,
    gv: &str,
    relation: &Relation,
    needed_aliases: &[String],
) -> Vec<String> {
    let mut wanted: Vec<String> = Vec::new();
    for column in &spec.partition_columns {
        if !wanted.contains(column) {
            wanted.push(column.clone());
        }
    }
    if let Some(predicate) = spec.predicate_for(gv) {
        predicate.collect_column_names(&mut wanted);
    }
    for triple in spec.owned_triples(gv) {
        if !wanted.contains(&triple.column) {
            wanted.push(triple.column.clone());
        }
    }
    for alias in needed_aliases {
        if !wanted.contains(alias) {
            wanted.push(alias.clone());
        }
    }

    relation
        .columns
        .iter()
        .filter(|c| wanted.contains(c))
        .cloned()
        .collect()
}

/// Stored/combined shape: grouping key plus needed alias columns, in the
/// relation's current order.
fn retained_columns(
    relation: &Relation,
    partition: &[String],
    needed_aliases: &[String],
) -> Vec<String> {
    relation
        .columns
        .iter()
        .filter(|c| partition.contains(c) || needed_aliases.contains(c))
        .cloned()
        .collect()
}
