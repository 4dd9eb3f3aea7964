//! Path Extractor (C6)
//!
//! From each proof DAG, enumerates the instance-supported proof paths:
//! sequences of instance-nodes whose simultaneous presence in Fs
//! constitutes one proof of the sensitive fact (§4.6).

use std::collections::HashSet;

use crate::derivation::ProofGraph;
use crate::store::{StoreResult, TupleStore};
use crate::value::DerivationNode;

/// Every derivation node backed by an actual row in `store`: `(R, k, v)`
/// for every row of every relation, where `k` is the first (subject)
/// column and `v` ranges over the remaining columns.
pub fn instance_nodes(store: &impl TupleStore) -> StoreResult<HashSet<DerivationNode>> {
    let mut nodes = HashSet::new();
    for relation in store.relations()? {
        let columns = store.columns(&relation)?;
        if columns.len() < 2 {
            continue;
        }
        for row in store.all_rows(&relation)? {
            let subject = row[0].as_text();
            for value in &row[1..] {
                nodes.insert(DerivationNode::new(relation.clone(), subject.clone(), value.as_text()));
            }
        }
    }
    Ok(nodes)
}

/// Nodes in `graph` that have no predecessor, i.e. no other node's
/// successor list points at them. These are the DAG's proof roots.
fn graph_roots(graph: &ProofGraph) -> Vec<DerivationNode> {
    let mut has_incoming: HashSet<&DerivationNode> = HashSet::new();
    for successors in graph.values() {
        for s in successors {
            has_incoming.insert(s);
        }
    }
    graph
        .keys()
        .filter(|n| !has_incoming.contains(n))
        .cloned()
        .collect()
}

/// Extracts every unique, non-empty instance-supported path through one
/// proof DAG, descending from each root. A terminal instance-node with no
/// further descendants to explore emits the accumulated path.
pub fn extract_paths(graph: &ProofGraph, instance: &HashSet<DerivationNode>) -> Vec<Vec<DerivationNode>> {
    let mut paths = Vec::new();
    let mut seen_paths: HashSet<Vec<DerivationNode>> = HashSet::new();

    for root in graph_roots(graph) {
        let mut path_so_far = Vec::new();
        descend(graph, instance, &root, &mut path_so_far, &mut paths, &mut seen_paths);
    }
    paths
}

fn descend(
    graph: &ProofGraph,
    instance: &HashSet<DerivationNode>,
    node: &DerivationNode,
    path_so_far: &mut Vec<DerivationNode>,
    paths: &mut Vec<Vec<DerivationNode>>,
    seen_paths: &mut HashSet<Vec<DerivationNode>>,
) -> bool {
    let pushed = if instance.contains(node) {
        path_so_far.push(node.clone());
        true
    } else {
        false
    };

    let mut descended = false;
    if let Some(successors) = graph.get(node) {
        for succ in successors {
            if descend(graph, instance, succ, path_so_far, paths, seen_paths) {
                descended = true;
            }
        }
    }

    if !descended && !path_so_far.is_empty() {
        if seen_paths.insert(path_so_far.clone()) {
            paths.push(path_so_far.clone());
        }
    }

    if pushed {
        path_so_far.pop();
    }
    descended || pushed
}

/// One proof group: the paths extracted across every alternative proof
/// DAG for a single sensitive root, deduplicated exactly. Each entry is
/// a candidate subset for the hitting-set selector (C7): hitting *any
/// one* of them cuts that root's inference.
pub type PathGroup = Vec<Vec<DerivationNode>>;

/// Runs C6 over every DAG produced for one (root, subject) pair and
/// folds their paths into a single group, in expansion order (§5:
/// "within a group, DAGs in expansion order"; §8 scenario 5: two rules
/// deriving the same head yield separate DAGs that fold into one group
/// of path sets).
pub fn extract_group(graphs: &[ProofGraph], instance: &HashSet<DerivationNode>) -> PathGroup {
    let mut seen = HashSet::new();
    let mut group = Vec::new();
    for graph in graphs {
        for path in extract_paths(graph, instance) {
            if seen.insert(path.clone()) {
                group.push(path);
            }
        }
    }
    group
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(r: &str, k: &str, c: &str) -> DerivationNode {
        DerivationNode::new(r, k, c)
    }

    #[test]
    fn extracts_path_through_conjunctive_leaves() {
        let root = node("Illness", "Lukas", "HIV_Positive");
        let a = node("Treatment", "Lukas", "TreatA");
        let b = node("Treatment", "Lukas", "TreatB");
        let mut graph: ProofGraph = ProofGraph::new();
        graph.insert(a.clone(), vec![root.clone()]);
        graph.insert(b.clone(), vec![root.clone()]);
        graph.insert(root.clone(), vec![]);

        let mut instance = HashSet::new();
        instance.insert(a.clone());
        instance.insert(b.clone());

        let paths = extract_paths(&graph, &instance);
        assert_eq!(paths.len(), 2);
        assert!(paths.contains(&vec![a]));
        assert!(paths.contains(&vec![b]));
    }

    #[test]
    fn empty_paths_are_discarded() {
        let root = node("Illness", "Lukas", "HIV_Positive");
        let mut graph: ProofGraph = ProofGraph::new();
        graph.insert(root, vec![]);
        let instance = HashSet::new();
        assert!(extract_paths(&graph, &instance).is_empty());
    }
}
