//! Cycle detection over string-keyed directed graphs
//!
//! Used for both the step dependency relation and assembly lineage.

use std::collections::{BTreeMap, BTreeSet, HashSet};

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    OnStack,
    Done,
}

/// Find cycles with a depth-first search over a recursion stack
///
/// Each back edge yields the cycle it closes, rotated to start at its
/// lexicographically smallest node. Cycles are deduplicated on that
/// canonical form and returned sorted, so the result does not depend on
/// traversal order. Edges to unknown nodes are ignored.
pub fn find_cycles(edges: &BTreeMap<String, BTreeSet<String>>) -> Vec<Vec<String>> {
    let mut marks: BTreeMap<&str, Mark> = edges.keys().map(|k| (k.as_str(), Mark::Unvisited)).collect();
    let mut seen_cycles: HashSet<Vec<String>> = HashSet::new();
    let mut cycles = Vec::new();

    let roots: Vec<&str> = edges.keys().map(String::as_str).collect();
    for root in roots {
        if marks.get(root) != Some(&Mark::Unvisited) {
            continue;
        }
        // Iterative DFS: (node, remaining successors)
        let mut stack: Vec<(&str, Vec<&str>)> = Vec::new();
        let mut path: Vec<&str> = Vec::new();
        marks.insert(root, Mark::OnStack);
        stack.push((root, successors(edges, root)));
        path.push(root);

        while let Some((node, pending)) = stack.last_mut() {
            let node = *node;
            match pending.pop() {
                Some(next) => match marks.get(next).copied() {
                    Some(Mark::Unvisited) => {
                        marks.insert(next, Mark::OnStack);
                        stack.push((next, successors(edges, next)));
                        path.push(next);
                    }
                    Some(Mark::OnStack) => {
                        if let Some(start) = path.iter().position(|n| *n == next) {
                            let cycle: Vec<String> =
                                path[start..].iter().map(|s| s.to_string()).collect();
                            let normalized = normalize_cycle(&cycle);
                            if seen_cycles.insert(normalized.clone()) {
                                cycles.push(normalized);
                            }
                        }
                    }
                    _ => {}
                },
                None => {
                    marks.insert(node, Mark::Done);
                    stack.pop();
                    path.pop();
                }
            }
        }
    }

    cycles.sort();
    cycles
}

/// Successors in reverse order so that popping visits them ascending
fn successors<'a>(edges: &'a BTreeMap<String, BTreeSet<String>>, node: &str) -> Vec<&'a str> {
    edges
        .get(node)
        .map(|next| {
            next.iter()
                .filter(|n| edges.contains_key(n.as_str()))
                .rev()
                .map(String::as_str)
                .collect()
        })
        .unwrap_or_default()
}

/// Rotate a cycle to start at its smallest element
pub fn normalize_cycle(cycle: &[String]) -> Vec<String> {
    if cycle.is_empty() {
        return vec![];
    }

    let min_idx = cycle
        .iter()
        .enumerate()
        .min_by_key(|(_, v)| *v)
        .map(|(i, _)| i)
        .unwrap_or(0);

    let mut normalized = Vec::with_capacity(cycle.len());
    normalized.extend_from_slice(&cycle[min_idx..]);
    normalized.extend_from_slice(&cycle[..min_idx]);
    normalized
}

/// `a → b → c → a`
pub fn format_cycle(cycle: &[String]) -> String {
    let mut parts: Vec<&str> = cycle.iter().map(String::as_str).collect();
    if let Some(first) = cycle.first() {
        parts.push(first);
    }
    parts.join(" → ")
}
