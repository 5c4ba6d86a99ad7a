use crate::store::Array;
use std::collections::HashMap;
use std::fmt::{self, Write};

const UNITS: [&str; 4] = ["KiB", "MiB", "GiB", "TiB"];

/// Human readable byte count: `N B` below 1 KiB, otherwise two decimals in
/// the largest binary unit that keeps the value at or above 1 (up to TiB).
pub fn format_size(bytes: usize) -> String {
    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64;
    let mut unit = UNITS[0];
    for candidate in UNITS {
        value /= 1024.0;
        unit = candidate;
        if value < 1024.0 {
            break;
        }
    }
    format!("{:.2} {}", value, unit)
}

/// `(2, 6, 5)`; a single axis prints without a trailing comma.
pub fn format_shape(shape: &[usize]) -> String {
    let dims: Vec<String> = shape.iter().map(|d| d.to_string()).collect();
    format!("({})", dims.join(", "))
}

impl fmt::Display for Array {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<Array shape={} dtype={} size={}>",
            format_shape(self.shape()),
            self.dtype(),
            format_size(self.nbytes())
        )
    }
}

/// Renders the expression under `root` as an indented tree.
///
/// A node reached a second time is not expanded again; the line points back
/// at the level where it was first printed.
pub fn format_tree(root: &Array) -> String {
    let mut tracer = Tracer { visited_at_level: HashMap::new(), output: String::new() };
    let _ = writeln!(tracer.output, "EXPRESSION TREE for {}:", root);
    let _ = writeln!(tracer.output, "--------------------------------------------------");
    tracer.trace_node(root, 1, "");
    tracer.output
}

struct Tracer {
    visited_at_level: HashMap<usize, usize>,
    output: String,
}

impl Tracer {
    fn trace_node(&mut self, node: &Array, level: usize, prefix: &str) {
        if let Some(&first_seen) = self.visited_at_level.get(&node.key()) {
            let _ = writeln!(self.output, "{}-> (Ref to L{})", prefix, first_seen);
            return;
        }
        self.visited_at_level.insert(node.key(), level);

        let masked = if node.is_masked() { " masked" } else { "" };
        let _ = writeln!(
            self.output,
            "{}[L{}] {} {} {}{}",
            prefix,
            level,
            node.label(),
            format_shape(node.shape()),
            node.dtype(),
            masked
        );

        let children = node.operands();
        let stem = build_child_stem(prefix);
        for (i, child) in children.iter().enumerate() {
            let connector = if i == children.len() - 1 { "`--" } else { "|--" };
            self.trace_node(child, level + 1, &format!("{}{}", stem, connector));
        }
    }
}

fn build_child_stem(current_prefix: &str) -> String {
    current_prefix.replace("`--", "   ").replace("|--", "|  ")
}
