/// Main engine interface
/// Compiles query text through the clause/phi/dependency/join-plan pipeline
/// and executes the compiled form against registered base relations.
use tracing::debug;

use crate::error::{EngineError, EngineResult};
use crate::execution::engine::ExecutionEngine;
use crate::execution::substrate::MemorySubstrate;
use crate::query::alias::BASE_GV;
use crate::query::clauses::split_clauses;
use crate::query::dependency::DependencyGraph;
use crate::query::join_plan::plan_join_set;
use crate::query::phi::{self, CompiledQuery};
use crate::storage::provider::{Catalog, RelationProvider};
use crate::storage::relation::Relation;

/// Compile query text into an executable form. All taxonomy errors
/// (malformed query, invalid predicate, unknown grouping variable, cyclic
/// dependency, empty join key) surface here, before any relation I/O.
pub fn compile(query: &str) -> EngineResult<CompiledQuery> {
    let clauses = split_clauses(query)?;
    let spec = phi::build(&clauses)?;

    let graph = DependencyGraph::from_spec(&spec);
    let topological = graph.topological_order()?;
    let closure = graph.transitive_closure();
    let join_set = plan_join_set(&closure);

    // Evaluation covers graph nodes plus any variable that materializes
    // select/having columns without owning a predicate
    let mut evaluation_order = topological;
    for gv in spec.materialized_gvs() {
        if !evaluation_order.contains(&gv) {
            evaluation_order.push(gv);
        }
    }

    // Join participants: the base variable anchors when it materializes,
    // then the planned set, then anything the plan leaves uncovered
    let mut participants: Vec<String> = Vec::new();
    if evaluation_order.iter().any(|gv| gv == BASE_GV) {
        participants.push(BASE_GV.to_string());
    }
    for gv in &join_set {
        if !participants.contains(gv) {
            participants.push(gv.clone());
        }
    }
    let mut covered: Vec<String> = participants.clone();
    for gv in &join_set {
        for (node, deps) in &closure {
            if node == gv {
                covered.extend(deps.iter().cloned());
            }
        }
    }
    for gv in &evaluation_order {
        if !spec.owned_triples(gv).is_empty() && !covered.contains(gv) {
            participants.push(gv.clone());
            covered.push(gv.clone());
        }
    }

    if spec.partition_columns.is_empty() && (participants.len() > 1 || graph.has_edges()) {
        return Err(EngineError::EmptyJoinKey {
            participants: if participants.len() > 1 {
                participants
            } else {
                graph.nodes().to_vec()
            },
        });
    }

    let dependencies = evaluation_order
        .iter()
        .map(|gv| (gv.clone(), graph.dependencies_of(gv).to_vec()))
        .collect();

    debug!(
        "compiled query over '{}': evaluation order {:?}, join set {:?}",
        spec.relation_name, evaluation_order, join_set
    );

    Ok(CompiledQuery {
        spec,
        evaluation_order,
        join_set,
        join_participants: participants,
        dependencies,
    })
}

/// Groupwise query engine over an in-memory substrate
pub struct MfqEngine {
    catalog: Catalog,
    provider: Option<Box<dyn RelationProvider>>,
    substrate: MemorySubstrate,
}

impl MfqEngine {
    pub fn new() -> Self {
        Self {
            catalog: Catalog::new(),
            provider: None,
            substrate: MemorySubstrate::new(),
        }
    }

    /// Engine backed by an external relation source in addition to the
    /// in-memory catalog
    pub fn with_provider(provider: Box<dyn RelationProvider>) -> Self {
        Self {
            catalog: Catalog::new(),
            provider: Some(provider),
            substrate: MemorySubstrate::new(),
        }
    }

    pub fn register_relation(&mut self, name: impl Into<String>, relation: Relation) {
        self.catalog.register(name, relation);
    }

    /// Compile and execute query text
    pub fn execute_query(&self, query: &str) -> EngineResult<Relation> {
        let compiled = compile(query)?;
        self.execute_compiled(&compiled)
    }

    /// Execute an already-compiled query. Re-running against an unchanged
    /// base relation yields an identical result.
    pub fn execute_compiled(&self, compiled: &CompiledQuery) -> EngineResult<Relation> {
        let base = self.base_relation(&compiled.spec.relation_name)?;
        ExecutionEngine::new(&self.substrate).execute(compiled, base)
    }

    fn base_relation(&self, name: &str) -> EngineResult<Relation> {
        if self.catalog.contains(name) {
            return self.catalog.relation(name);
        }
        match &self.provider {
            Some(provider) => provider.relation(name),
            None => self.catalog.relation(name),
        }
    }
}

impl Default for MfqEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_rejects_cycles_before_io() {
        let err = compile(
            "select cust\n\
             from sales\n\
             group by cust : x, y\n\
             suchthat x.quant > avg(y.quant), y.quant > avg(x.quant)\n\
             having count(x.quant) > 0",
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::CyclicDependency { .. }));
    }

    #[test]
    fn test_compile_rejects_empty_join_key() {
        let err = compile(
            "select sum(x.quant), sum(y.quant)\n\
             from sales\n\
             group by : x, y\n\
             suchthat x.state = 'NY', y.state = 'NJ'\n\
             having sum(x.quant) > 0",
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::EmptyJoinKey { .. }));
    }

    #[test]
    fn test_independent_variables_join_plan() {
        let compiled = compile(
            "select prod, cust, sum(x.quant), sum(y.quant)\n\
             from sales\n\
             group by prod, cust : x, y\n\
             suchthat x.state = 'NY' and x.quant > 15, y.state = 'NJ'\n\
             having sum(x.quant) > 0",
        )
        .unwrap();
        // No cross-references: the heuristic never short-circuits
        assert_eq!(compiled.join_set, vec!["x", "y"]);
        assert_eq!(compiled.join_participants, vec!["x", "y"]);
    }

    #[test]
    fn test_base_variable_anchors_when_it_materializes() {
        let compiled = compile(
            "select FromAC, FromTel, sum(R.Length)\n\
             from CALLS\n\
             group by FromAC, FromTel : R\n\
             suchthat R.Date > \"96/05/31\"\n\
             having sum(R.Length)*3 > sum(Length)",
        )
        .unwrap();
        assert_eq!(compiled.join_participants, vec![BASE_GV, "R"]);
        assert_eq!(compiled.evaluation_order, vec!["R", BASE_GV]);
    }

    #[test]
    fn test_single_variable_query_has_no_join_stage() {
        let compiled = compile(
            "select cust, sum(quant)\n\
             from sales\n\
             group by cust : z\n\
             suchthat quant > 0\n\
             having sum(quant) > 10",
        )
        .unwrap();
        assert_eq!(compiled.join_participants, vec![BASE_GV]);
    }

    #[test]
    fn test_unknown_relation_is_an_execution_error() {
        let engine = MfqEngine::new();
        let err = engine
            .execute_query(
                "select cust, sum(quant)\n\
                 from missing\n\
                 group by cust : z\n\
                 suchthat quant > 0\n\
                 having sum(quant) > 0",
            )
            .unwrap_err();
        assert!(matches!(err, EngineError::Execution { .. }));
    }
}
