/// Greedy join-set selection
///
/// Picks the subset of grouping-variable results to join explicitly into
/// the combined relation. A grouping variable whose dependencies were all
/// inlined during its own evaluation carries their columns with it, so
/// committing it to the join set satisfies them for free. The heuristic is
/// greedy, not cost-based, and not guaranteed minimal.
/// Input: the transitive-closure map from the dependency graph, in node
/// order. Repeatedly commit the remaining grouping variable with the
/// largest dependency set while that set is a strict subset of the
/// still-unsatisfied set; otherwise join everything that is left.
/// Ties break by input order.
pub fn plan_join_set(closure: &[(String, Vec<String>)]) -> Vec<String> {
    let mut unsatisfied: Vec<String> = closure.iter().map(|(gv, _)| gv.clone()).collect();
    let mut join_set = Vec::new();

    while !unsatisfied.is_empty() {
        // Largest dependency set among unsatisfied variables; input order
        // wins ties
        let mut candidate: Option<&(String, Vec<String>)> = None;
        for entry in closure.iter().filter(|(gv, _)| unsatisfied.contains(gv)) {
            match candidate {
                Some((_, best)) if entry.1.len() <= best.len() => {}
                _ => candidate = Some(entry),
            }
        }
        let Some((gv, deps)) = candidate else { break };

        let strict_subset = deps.len() < unsatisfied.len()
            && deps.iter().all(|d| unsatisfied.contains(d));
        if !strict_subset {
            for gv in &unsatisfied {
                if !join_set.contains(gv) {
                    join_set.push(gv.clone());
                }
            }
            break;
        }

        join_set.push(gv.clone());
        let satisfied: Vec<String> = std::iter::once(gv.clone()).chain(deps.iter().cloned()).collect();
        unsatisfied.retain(|u| !satisfied.contains(u));
    }

    join_set
}
