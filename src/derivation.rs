//! Derivation-Graph Builder (C5)
//!
//! For every sensitive root `(T, c)` and every subject `k` such that
//! `T(k, c)` exists in the chase, builds the set of backward proof DAGs
//! rooted at `T:k:c` (§4.5).
//!
//! The reference algorithm is recursive with a per-branch visited set.
//! Here it runs as an explicit worklist of stack frames instead, per
//! the design notes: a node can only legitimately re-enter its own
//! expansion through a true cycle in the rule graph (self-loop), which
//! is exactly captured by "is this node currently on the active frame
//! stack" — so a node not on the active stack has one deterministic
//! result, safe to memoize across sibling branches that happen to share
//! intermediate facts.
//!
//! The proof DAG representation flattens the conjunctive structure of a
//! rule firing into one adjacency map per merged graph, matching the
//! reference implementation's behaviour rather than a stricter AND/OR
//! graph (see the open question recorded in DESIGN.md).

use std::collections::HashMap;

use crate::rules::Atom;
use crate::store::TupleStore;
use crate::value::DerivationNode;

/// One materialised proof DAG: `child -> [successor, ...]`, i.e. an edge
/// `child -> parent` means the child is one body atom of a rule whose
/// firing yields the parent.
pub type ProofGraph = HashMap<DerivationNode, Vec<DerivationNode>>;

/// Rules indexed by head `(relation, constant) -> [body...]`, as built by
/// [`crate::rules::index_by_head`].
pub type RuleIndex = HashMap<(String, String), Vec<Vec<Atom>>>;

/// All proof DAGs for every subject of every sensitive root, in
/// root-iteration order (§5: "groups are emitted in root-iteration
/// order; within a group, DAGs in expansion order").
pub struct RootExpansion {
    pub root: DerivationNode,
    pub graphs: Vec<ProofGraph>,
}

fn leaf_graph(node: DerivationNode) -> ProofGraph {
    let mut g = ProofGraph::new();
    g.insert(node, Vec::new());
    g
}

fn add_edge(graph: &mut ProofGraph, from: &DerivationNode, to: &DerivationNode) {
    let successors = graph.entry(from.clone()).or_default();
    if !successors.contains(to) {
        successors.push(to.clone());
    }
}

fn merge_into(target: &mut ProofGraph, source: &ProofGraph) {
    for (node, successors) in source {
        let entry = target.entry(node.clone()).or_default();
        for s in successors {
            if !entry.contains(s) {
                entry.push(s.clone());
            }
        }
    }
}

/// Cartesian product over a list of candidate lists, each itself a list
/// of alternative `ProofGraph`s for one child.
fn cartesian(options: &[Vec<ProofGraph>]) -> Vec<Vec<ProofGraph>> {
    let mut result: Vec<Vec<ProofGraph>> = vec![Vec::new()];
    for opts in options {
        let mut next = Vec::with_capacity(result.len() * opts.len().max(1));
        for prefix in &result {
            for opt in opts {
                let mut combo = prefix.clone();
                combo.push(opt.clone());
                next.push(combo);
            }
        }
        result = next;
    }
    result
}

struct Frame {
    node: DerivationNode,
    depth: usize,
    /// Validated candidate bodies: each is the list of child nodes for
    /// one rule whose every body atom is present in the chase for this
    /// node's subject. Bodies that cannot fire are dropped up front.
    bodies: Vec<Vec<DerivationNode>>,
    body_idx: usize,
    child_idx: usize,
    current_child_graphs: Vec<Vec<ProofGraph>>,
    accumulated: Vec<ProofGraph>,
}

fn build_frame(
    chase: &impl TupleStore,
    rule_index: &RuleIndex,
    node: DerivationNode,
    depth: usize,
    max_depth: usize,
) -> Frame {
    if depth > max_depth {
        return Frame {
            node,
            depth,
            bodies: Vec::new(),
            body_idx: 0,
            child_idx: 0,
            current_child_graphs: Vec::new(),
            accumulated: Vec::new(),
        };
    }
    let candidate_bodies = rule_index
        .get(&(node.relation.clone(), node.constant.clone()))
        .cloned()
        .unwrap_or_default();

    let mut bodies = Vec::new();
    'bodies: for body in candidate_bodies {
        let mut children = Vec::with_capacity(body.len());
        for atom in &body {
            match crate::chase::exists_tuple(chase, &atom.relation, &node.subject, &atom.constant) {
                Ok(true) => children.push(DerivationNode::new(
                    atom.relation.clone(),
                    node.subject.clone(),
                    atom.constant.clone(),
                )),
                _ => continue 'bodies,
            }
        }
        bodies.push(children);
    }

    Frame {
        node,
        depth,
        bodies,
        body_idx: 0,
        child_idx: 0,
        current_child_graphs: Vec::new(),
        accumulated: Vec::new(),
    }
}

/// Expands a single root node into its set of proof DAGs using an
/// explicit stack of frames instead of native recursion.
pub fn expand(chase: &impl TupleStore, rule_index: &RuleIndex, root: DerivationNode, max_depth: usize) -> Vec<ProofGraph> {
    let mut memo: HashMap<DerivationNode, Vec<ProofGraph>> = HashMap::new();
    let mut on_stack: Vec<DerivationNode> = vec![root.clone()];
    let mut stack: Vec<Frame> = vec![build_frame(chase, rule_index, root, 0, max_depth)];

    loop {
        let top = stack.len() - 1;
        if stack[top].body_idx >= stack[top].bodies.len() {
            // This node is fully processed: finalize its result.
            let finished = stack.pop().unwrap();
            on_stack.pop();
            let result = if finished.accumulated.is_empty() {
                vec![leaf_graph(finished.node.clone())]
            } else {
                finished.accumulated
            };
            memo.insert(finished.node.clone(), result.clone());

            if stack.is_empty() {
                return result;
            }
            let parent_idx = stack.len() - 1;
            stack[parent_idx].current_child_graphs.push(result);
            stack[parent_idx].child_idx += 1;
            continue;
        }

        let body_len = stack[top].bodies[stack[top].body_idx].len();
        if stack[top].child_idx < body_len {
            let child = stack[top].bodies[stack[top].body_idx][stack[top].child_idx].clone();
            let depth = stack[top].depth;
            if on_stack.contains(&child) {
                stack[top].current_child_graphs.push(vec![leaf_graph(child)]);
                stack[top].child_idx += 1;
            } else if let Some(cached) = memo.get(&child) {
                stack[top].current_child_graphs.push(cached.clone());
                stack[top].child_idx += 1;
            } else {
                on_stack.push(child.clone());
                stack.push(build_frame(chase, rule_index, child, depth + 1, max_depth));
            }
            continue;
        }

        // All children of the current body resolved: merge the cartesian
        // product of their graph sets and record the edges this rule
        // firing induces.
        let body = stack[top].bodies[stack[top].body_idx].clone();
        let combos = cartesian(&stack[top].current_child_graphs);
        let node = stack[top].node.clone();
        for combo in combos {
            let mut merged = ProofGraph::new();
            for g in &combo {
                merge_into(&mut merged, g);
            }
            merged.entry(node.clone()).or_default();
            for child in &body {
                add_edge(&mut merged, child, &node);
            }
            stack[top].accumulated.push(merged);
        }
        stack[top].body_idx += 1;
        stack[top].child_idx = 0;
        stack[top].current_child_graphs.clear();
    }
}

/// Builds proof DAGs for every (root, subject) pair, in root-iteration
/// then subject-iteration order.
pub fn expand_all_roots(
    chase: &impl TupleStore,
    rule_index: &RuleIndex,
    roots: &[Atom],
    max_depth: usize,
) -> crate::store::StoreResult<Vec<RootExpansion>> {
    let mut expansions = Vec::new();
    for root in roots {
        let subjects = crate::chase::subjects_with_value(chase, &root.relation, &root.constant)?;
        let mut subjects: Vec<String> = subjects.into_iter().collect();
        subjects.sort();
        for subject in subjects {
            let node = DerivationNode::new(root.relation.clone(), subject, root.constant.clone());
            let graphs = expand(chase, rule_index, node.clone(), max_depth);
            expansions.push(RootExpansion { root: node, graphs });
        }
    }
    Ok(expansions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{index_by_head, Rule};
    use crate::store::MemoryStore;

    fn make_chase() -> MemoryStore {
        let store = MemoryStore::new();
        store.declare_relation("Treatment", &["PatientName", "Treatment"], &[]);
        store.declare_relation("Illness", &["PatientName", "Illness"], &[]);
        store.seed("Treatment", vec!["Lukas".into(), "TreatA".into()]);
        store.seed("Treatment", vec!["Lukas".into(), "TreatB".into()]);
        store.seed("Illness", vec!["Lukas".into(), "HIV_Positive".into()]);
        store
    }

    #[test]
    fn leaf_node_with_no_deriving_rule_is_a_singleton_graph() {
        let chase = make_chase();
        let index = index_by_head(&[]);
        let node = DerivationNode::new("Treatment", "Lukas", "TreatA");
        let graphs = expand(&chase, &index, node.clone(), 64);
        assert_eq!(graphs.len(), 1);
        assert_eq!(graphs[0].get(&node).unwrap().len(), 0);
    }

    #[test]
    fn conjunctive_body_yields_one_graph_with_two_leaves() {
        let chase = make_chase();
        let rules = vec![Rule {
            body: vec![
                Atom { relation: "Treatment".to_string(), constant: "TreatA".to_string() },
                Atom { relation: "Treatment".to_string(), constant: "TreatB".to_string() },
            ],
            head: Atom { relation: "Illness".to_string(), constant: "HIV_Positive".to_string() },
        }];
        let index = index_by_head(&rules);
        let root = DerivationNode::new("Illness", "Lukas", "HIV_Positive");
        let graphs = expand(&chase, &index, root.clone(), 64);
        assert_eq!(graphs.len(), 1);
        let g = &graphs[0];
        assert!(g.contains_key(&DerivationNode::new("Treatment", "Lukas", "TreatA")));
        assert!(g.contains_key(&DerivationNode::new("Treatment", "Lukas", "TreatB")));
        assert!(g.contains_key(&root));
    }

    #[test]
    fn self_loop_rule_does_not_cause_infinite_expansion() {
        let chase = MemoryStore::new();
        chase.declare_relation("Illness", &["PatientName", "Illness"], &[]);
        chase.seed("Illness", vec!["Lukas".into(), "x".into()]);
        let rules = vec![Rule {
            body: vec![Atom { relation: "Illness".to_string(), constant: "x".to_string() }],
            head: Atom { relation: "Illness".to_string(), constant: "x".to_string() },
        }];
        let index = index_by_head(&rules);
        let root = DerivationNode::new("Illness", "Lukas", "x");
        let graphs = expand(&chase, &index, root, 64);
        assert!(!graphs.is_empty());
    }

    #[test]
    fn unsupported_body_atom_contributes_no_proof_for_that_subject() {
        let chase = make_chase();
        let rules = vec![Rule {
            body: vec![Atom { relation: "Treatment".to_string(), constant: "TreatZ".to_string() }],
            head: Atom { relation: "Illness".to_string(), constant: "HIV_Positive".to_string() },
        }];
        let index = index_by_head(&rules);
        let root = DerivationNode::new("Illness", "Lukas", "HIV_Positive");
        let graphs = expand(&chase, &index, root.clone(), 64);
        // No rule body is satisfied, so the root is treated as a leaf.
        assert_eq!(graphs.len(), 1);
        assert_eq!(graphs[0].get(&root).unwrap().len(), 0);
    }
}
