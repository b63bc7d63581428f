//! Coverage graph export to DOT and JSON formats

use serde::Serialize;
use std::fmt::Write;

use super::{Condensation, CoverageGraph, EdgeKind};
use crate::ir::InstId;

/// Export the coverage graph to DOT format for Graphviz
///
/// Fully covered instructions are green, covered ones yellow.
pub fn export_dot(graph: &CoverageGraph, condensation: &Condensation) -> String {
    let mut dot = String::from("digraph Coverage {\n");
    dot.push_str("  rankdir=TB;\n");
    dot.push_str("  node [shape=box, style=rounded];\n\n");

    let mut nodes: Vec<InstId> = graph.instructions().collect();
    nodes.sort();

    for inst in nodes {
        let method = graph
            .method_of(inst)
            .map(|m| m.to_string())
            .unwrap_or_else(|| "?".to_string());
        let style = if condensation.is_fully_covered(inst) {
            "fillcolor=lightgreen, style=filled"
        } else if graph.is_covered(inst) {
            "fillcolor=yellow, style=filled"
        } else {
            ""
        };
        writeln!(dot, "  \"{}\" [label=\"{}#{}\" {}];", inst, method, inst, style).ok();
    }

    dot.push('\n');
    let mut edges: Vec<_> = graph.explicit_edges().collect();
    edges.sort_by_key(|(edge, _)| *edge);
    for (edge, info) in edges {
        let label = info.kind.dot_label();
        let label_attr = if label.is_empty() {
            String::new()
        } else {
            format!(", label=\"{}\"", label)
        };
        writeln!(
            dot,
            "  \"{}\" -> \"{}\" [color={}, style={}{}];",
            edge.src,
            edge.dst,
            info.kind.dot_color(),
            if info.registered { "solid" } else { "dashed" },
            label_attr
        )
        .ok();
    }

    let mut implicit: Vec<_> = graph.implicit_edges().collect();
    implicit.sort();
    for edge in implicit {
        writeln!(
            dot,
            "  \"{}\" -> \"{}\" [color={}, style=dotted, label=\"{}\"];",
            edge.src,
            edge.dst,
            EdgeKind::Exception.dot_color(),
            EdgeKind::Exception.dot_label()
        )
        .ok();
    }

    dot.push_str("}\n");
    dot
}

/// Coverage graph export for JSON serialization
#[derive(Debug, Clone, Serialize)]
pub struct CoverageExport {
    pub instructions: Vec<InstructionExport>,
    pub edges: Vec<EdgeExport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InstructionExport {
    pub id: InstId,
    pub visited: bool,
    pub covered: bool,
    pub fully_covered: bool,
    pub component: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EdgeExport {
    pub from: InstId,
    pub to: InstId,
    pub kind: String,
    pub registered: bool,
    pub covered: bool,
}

/// Export the coverage graph to a JSON-serializable structure
pub fn export_json(graph: &CoverageGraph, condensation: &Condensation) -> CoverageExport {
    let mut instructions: Vec<_> = graph
        .instructions()
        .map(|id| InstructionExport {
            id,
            visited: graph.is_visited(id),
            covered: graph.is_covered(id),
            fully_covered: condensation.is_fully_covered(id),
            component: condensation.component_of(id),
        })
        .collect();
    instructions.sort_by_key(|i| i.id);

    let mut edges: Vec<_> = graph
        .explicit_edges()
        .map(|(edge, info)| (edge, info.kind, info.registered))
        .chain(graph.implicit_edges().map(|edge| (edge, EdgeKind::Exception, false)))
        .map(|(edge, kind, registered)| EdgeExport {
            from: edge.src,
            to: edge.dst,
            kind: format!("{:?}", kind),
            registered,
            covered: graph.is_edge_covered(edge.src, edge.dst),
        })
        .collect();
    edges.sort_by_key(|e| (e.from, e.to));

    CoverageExport { instructions, edges }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::fixtures::diamond;
    use crate::ir::{BodyProvider, MethodId, Program};

    fn covered_left_branch() -> CoverageGraph {
        let program = Program::from_bodies(vec![diamond()]);
        let mut graph = CoverageGraph::new();
        graph.register_method(program.body(MethodId(0)).unwrap(), true);
        graph.consume(&[InstId(0), InstId(1), InstId(2), InstId(4)], &program);
        graph
    }

    #[test]
    fn test_export_dot() {
        let graph = covered_left_branch();
        let condensation = Condensation::build(&graph);
        let dot = export_dot(&graph, &condensation);

        assert!(dot.starts_with("digraph Coverage {"));
        assert!(dot.contains("\"i1\" -> \"i3\" [color=blue, style=solid, label=\"br\"];"));
        // i2 -> i4 -> exit is done
        assert!(dot.contains("\"i2\" [label=\"m0#i2\" fillcolor=lightgreen, style=filled];"));
        assert!(dot.contains("\"i0\" [label=\"m0#i0\" fillcolor=yellow, style=filled];"));
        assert!(dot.contains("\"i3\" [label=\"m0#i3\" ];"));
        assert!(dot.ends_with("}\n"));
    }

    #[test]
    fn test_export_json() {
        let graph = covered_left_branch();
        let condensation = Condensation::build(&graph);
        let export = export_json(&graph, &condensation);

        assert_eq!(export.instructions.len(), 5);
        assert_eq!(export.edges.len(), 5);
        let left = export.edges.iter().find(|e| e.from == InstId(1) && e.to == InstId(2)).unwrap();
        assert!(left.covered);
        assert_eq!(left.kind, "Branch");
        let right = export.edges.iter().find(|e| e.from == InstId(1) && e.to == InstId(3)).unwrap();
        assert!(!right.covered);
    }
}
