//! Graphviz export of an expression graph.
use crate::analysis::topology;
use crate::store::Array;
use petgraph::dot::{Config, Dot};
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;

pub trait ToDot {
    /// The graph as DOT text.
    fn to_dot(&self) -> String;
}

impl ToDot for Array {
    fn to_dot(&self) -> String {
        to_dot(self)
    }
}

/// Builds a `petgraph` view of the expression: one vertex per distinct node,
/// edges from operand to consumer weighted by operand position.
pub fn to_graph(root: &Array) -> DiGraph<String, usize> {
    let mut graph = DiGraph::new();
    let mut index: HashMap<usize, NodeIndex> = HashMap::new();

    for node in topology::sort(root) {
        let label = format!(
            "{} {} {}",
            node.label(),
            super::trace::format_shape(node.shape()),
            node.dtype()
        );
        let ix = graph.add_node(label);
        for (pos, operand) in node.operands().into_iter().enumerate() {
            if let Some(&from) = index.get(&operand.key()) {
                graph.add_edge(from, ix, pos);
            }
        }
        index.insert(node.key(), ix);
    }
    graph
}

pub fn to_dot(root: &Array) -> String {
    let graph = to_graph(root);
    format!("{}", Dot::with_config(&graph, &[Config::EdgeNoLabel]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{BinaryOp, Reducer};

    #[test]
    fn test_graph_shape() {
        let a = Array::ones(&[2, 2], None).unwrap();
        let b = Array::elementwise(BinaryOp::Multiply, &a, &a).unwrap();
        let c = b.aggregate(Reducer::Max, -1).unwrap();

        let graph = to_graph(&c);
        assert_eq!(graph.node_count(), 3);
        // Both operands of the product are the same vertex.
        assert_eq!(graph.edge_count(), 3);
    }

    #[test]
    fn test_dot_text() {
        let a = Array::zeros(&[4], None).unwrap();
        let b = Array::elementwise(BinaryOp::Add, &a, 1.0).unwrap();
        let dot = b.to_dot();
        assert!(dot.starts_with("digraph {"));
        assert!(dot.contains("add (4) float64"));
        assert_eq!(dot.matches("->").count(), 2);
    }
}
