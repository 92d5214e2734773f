/// Dependency graph over grouping variables
///
/// Nodes are the grouping variables appearing in the suchthat predicates;
/// an edge cgv -> vgv means a condition scoped to cgv references an operand
/// computed by vgv, so vgv must be evaluated first.
use crate::error::{EngineError, EngineResult};
use crate::query::alias::BASE_GV;
use crate::query::phi::PhiOperatorSpec;

#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// Grouping variables, in the order they entered the graph
    nodes: Vec<String>,

    /// Direct dependencies, aligned with `nodes`
    deps: Vec<Vec<String>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the graph from a specification's predicates and cross-reference
    /// edges.
    pub fn from_spec(spec: &PhiOperatorSpec) -> Self {
        let mut graph = Self::new();
        for (gv, _) in &spec.predicates {
            graph.add_node(gv);
        }
        for (dependent, referenced) in &spec.dependencies {
            graph.add_edge(dependent, referenced);
        }
        graph
    }

    pub fn add_node(&mut self, node: &str) {
        if !self.nodes.iter().any(|n| n == node) {
            self.nodes.push(node.to_string());
            self.deps.push(Vec::new());
        }
    }

    pub fn add_edge(&mut self, dependent: &str, referenced: &str) {
        self.add_node(dependent);
        self.add_node(referenced);
        let idx = self.index_of(dependent).expect("node was just added");
        if !self.deps[idx].iter().any(|d| d == referenced) {
            self.deps[idx].push(referenced.to_string());
        }
    }

    fn index_of(&self, node: &str) -> Option<usize> {
        self.nodes.iter().position(|n| n == node)
    }

    pub fn contains(&self, node: &str) -> bool {
        self.index_of(node).is_some()
    }

    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }

    pub fn dependencies_of(&self, node: &str) -> &[String] {
        self.index_of(node)
            .map(|idx| self.deps[idx].as_slice())
            .unwrap_or(&[])
    }

    pub fn has_edges(&self) -> bool {
        self.deps.iter().any(|d| !d.is_empty())
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Kahn-style evaluation order: repeatedly peel a node whose remaining
    /// dependencies are all satisfied, preferring the base variable on ties,
    /// then input order. Remaining nodes with no eligible pick form a cycle.
    pub fn topological_order(&self) -> EngineResult<Vec<String>> {
        let mut remaining: Vec<usize> = (0..self.nodes.len()).collect();
        let mut order = Vec::with_capacity(self.nodes.len());

        while !remaining.is_empty() {
            let eligible: Vec<usize> = remaining
                .iter()
                .copied()
                .filter(|&idx| {
                    self.deps[idx]
                        .iter()
                        .all(|dep| !remaining.iter().any(|&r| self.nodes[r] == *dep))
                })
                .collect();

            let next = match eligible.iter().find(|&&idx| self.nodes[idx] == BASE_GV) {
                Some(&idx) => idx,
                None => match eligible.first() {
                    Some(&idx) => idx,
                    None => {
                        return Err(EngineError::CyclicDependency {
                            remaining: remaining
                                .iter()
                                .map(|&idx| self.nodes[idx].clone())
                                .collect(),
                        })
                    }
                },
            };

            order.push(self.nodes[next].clone());
            remaining.retain(|&idx| idx != next);
        }

        Ok(order)
    }

    /// Full dependency set per node: union of direct dependency sets to a
    /// fixed point. Safe to call on cyclic graphs (the sets just saturate).
    pub fn transitive_closure(&self) -> Vec<(String, Vec<String>)> {
        let mut closure: Vec<Vec<String>> = self.deps.clone();

        let mut changed = true;
        while changed {
            changed = false;
            for idx in 0..self.nodes.len() {
                let current = closure[idx].clone();
                for dep in current {
                    let Some(dep_idx) = self.index_of(&dep) else { continue };
                    let additions: Vec<String> = closure[dep_idx]
                        .iter()
                        .filter(|d| !closure[idx].contains(d))
                        .cloned()
                        .collect();
                    if !additions.is_empty() {
                        closure[idx].extend(additions);
                        changed = true;
                    }
                }
            }
        }

        self.nodes
            .iter()
            .cloned()
            .zip(closure)
            .collect()
    }
}
