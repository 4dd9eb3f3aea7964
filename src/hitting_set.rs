//! Hitting-Set Selector (C7)
//!
//! Input: groups[] where each group is a list of candidate subsets
//! (proof paths) over the universe of instance-nodes; at least one
//! subset per group must be fully selected to cut that proof (§4.7).

use std::collections::HashSet;

use crate::paths::PathGroup;
use crate::value::DerivationNode;

/// Greedy hitting set (the shipped policy): for each group, in input
/// order, drop empty subsets and pick the subset minimising the growth
/// of the running union, ties broken by input order.
pub fn greedy_hitting_set(groups: &[PathGroup]) -> HashSet<DerivationNode> {
    let mut union: HashSet<DerivationNode> = HashSet::new();
    for group in groups {
        let mut best: Option<&Vec<DerivationNode>> = None;
        let mut best_growth = usize::MAX;
        for subset in group {
            if subset.is_empty() {
                continue;
            }
            let growth = subset.iter().filter(|n| !union.contains(*n)).count();
            if growth < best_growth {
                best_growth = growth;
                best = Some(subset);
            }
        }
        if let Some(subset) = best {
            union.extend(subset.iter().cloned());
        }
    }
    union
}

/// Exact hitting set: the product over all groups, keeping the global
/// minimum `|⋃ selected|`. Only tractable for small inputs — gated
/// behind `max_groups`/`max_subsets_per_group` guards so a large run
/// never accidentally invokes it.
pub fn exact_hitting_set(
    groups: &[PathGroup],
    max_groups: usize,
    max_subsets_per_group: usize,
) -> Option<HashSet<DerivationNode>> {
    if groups.len() > max_groups || groups.iter().any(|g| g.len() > max_subsets_per_group) {
        return None;
    }
    let non_empty_groups: Vec<Vec<&Vec<DerivationNode>>> = groups
        .iter()
        .map(|g| g.iter().filter(|s| !s.is_empty()).collect())
        .collect();
    if non_empty_groups.iter().any(|g| g.is_empty()) {
        // A group with no non-empty subset can never be hit; treat as
        // unsatisfiable for the exact search and fall back to greedy.
        return None;
    }

    let mut best: Option<HashSet<DerivationNode>> = None;
    let mut choice = vec![0usize; non_empty_groups.len()];
    loop {
        let mut union: HashSet<DerivationNode> = HashSet::new();
        for (group_idx, &subset_idx) in choice.iter().enumerate() {
            union.extend(non_empty_groups[group_idx][subset_idx].iter().cloned());
        }
        let is_better = match &best {
            None => true,
            Some(b) => union.len() < b.len(),
        };
        if is_better {
            best = Some(union);
        }

        // advance choice like an odometer
        let mut i = choice.len();
        loop {
            if i == 0 {
                return best;
            }
            i -= 1;
            choice[i] += 1;
            if choice[i] < non_empty_groups[i].len() {
                break;
            }
            choice[i] = 0;
        }
    }
}
