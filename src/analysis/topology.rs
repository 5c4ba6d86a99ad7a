use crate::store::Array;
use std::collections::{HashMap, HashSet};

/// Performs a Topological Sort of the graph under `root` using Depth-First Search.
///
/// Returns every distinct node once, operands before their consumers, with
/// `root` last. Nodes reached through several parents are identified by
/// pointer and emitted only once.
pub fn sort(root: &Array) -> Vec<Array> {
    let mut order = Vec::new();
    let mut state: HashMap<usize, VisitState> = HashMap::new();
    let mut stack = vec![(root.clone(), false)];

    while let Some((node, expanded)) = stack.pop() {
        let key = node.key();
        if expanded {
            state.insert(key, VisitState::Visited);
            order.push(node);
            continue;
        }
        if state.contains_key(&key) {
            continue;
        }
        state.insert(key, VisitState::Visiting);

        // Reversed so the left operand is emitted first.
        let operands: Vec<Array> = node.operands().into_iter().cloned().collect();
        stack.push((node, true));
        for operand in operands.into_iter().rev() {
            if !state.contains_key(&operand.key()) {
                stack.push((operand, false));
            }
        }
    }

    order
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum VisitState {
    Visiting,
    Visited,
}

/// Nodes consumed by more than one parent (or twice by the same parent).
pub fn shared_nodes(root: &Array) -> HashSet<usize> {
    let mut uses: HashMap<usize, usize> = HashMap::new();
    for node in sort(root) {
        for operand in node.operands() {
            *uses.entry(operand.key()).or_insert(0) += 1;
        }
    }
    uses.into_iter().filter(|&(_, n)| n > 1).map(|(key, _)| key).collect()
}
