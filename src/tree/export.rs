//! Exploration tree export to DOT format

use std::fmt::Write;

use super::{ExplorationTree, VertexKind};

/// Export the exploration tree to DOT format for Graphviz
///
/// Covered vertices are green, visited ones white and candidates dashed.
pub fn export_dot(tree: &ExplorationTree) -> String {
    let mut dot = String::from("digraph ExplorationTree {\n");
    dot.push_str("  rankdir=TB;\n");
    dot.push_str("  node [shape=box, style=rounded];\n\n");

    for (id, vertex) in tree.vertices() {
        let label = match vertex.kind() {
            VertexKind::Entry => "ENTRY".to_string(),
            VertexKind::MethodEntry(method) => format!("{}", method),
            VertexKind::Branch(clause) => escape_label(&clause.to_string()),
        };
        let style = if vertex.is_covered() {
            "fillcolor=lightgreen, style=filled"
        } else if vertex.is_candidate() {
            "style=dashed"
        } else {
            ""
        };
        writeln!(dot, "  \"{}\" [label=\"{}\" {}];", id, label, style).ok();
    }

    dot.push('\n');
    for (id, vertex) in tree.vertices() {
        for child in vertex.children() {
            writeln!(dot, "  \"{}\" -> \"{}\";", id, child).ok();
        }
    }

    dot.push_str("}\n");
    dot
}

fn escape_label(label: &str) -> String {
    label.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::fixtures::diamond;
    use crate::ir::{InstId, MethodId, Program};
    use crate::symbolic::{Clause, PathClause, PathClauseKind, Predicate, SymbolicTrace, Term};
    use crate::tree::NoopObserver;

    #[test]
    fn test_export_dot() {
        let program = Program::from_bodies(vec![diamond()]);
        let mut tree = ExplorationTree::new();
        let clause = PathClause::new(
            PathClauseKind::ConditionCheck,
            InstId(1),
            Predicate::Equality { lhs: Term::Var("c".into()), rhs: Term::Bool(true) },
        );
        tree.add_trace(
            &program,
            &SymbolicTrace { method: MethodId(0), clauses: vec![Clause::Path(clause)] },
            &mut NoopObserver,
        )
        .unwrap();

        let dot = export_dot(&tree);
        assert!(dot.starts_with("digraph ExplorationTree {"));
        assert!(dot.contains("\"v0\" [label=\"ENTRY\" ];"));
        assert!(dot.contains("\"v1\" [label=\"m0\" ];"));
        assert!(dot.contains("\"v2\" [label=\"[condition@i1] c == true\" fillcolor=lightgreen, style=filled];"));
        assert!(dot.contains("\"v3\" [label=\"[condition@i1] c == false\" style=dashed];"));
        assert!(dot.contains("\"v1\" -> \"v3\";"));
    }
}
