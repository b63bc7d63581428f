//! Instruction-level coverage graph
//!
//! Built incrementally: method bodies are registered as they are discovered,
//! either up front as primary targets or transitively when a trace shows a
//! call into a method nobody registered yet. Only edges of primary
//! (registered) methods count toward per-instruction coverage.
//!
//! # Coverage rules
//!
//! - An edge is covered once any trace walks it. Implicit (exception) edges
//!   are tracked separately and never counted toward instruction totals.
//! - An instruction is covered if it has no registered outgoing edges, or
//!   it was visited and all of its registered outgoing edges are covered.
//!
//! Trace data is best effort. Edges that match nothing known are dropped.

pub mod condensation;
pub mod edge;
pub mod export;

pub use condensation::Condensation;
pub use edge::{Edge, EdgeInfo, EdgeKind};
pub use export::{export_dot, export_json, CoverageExport};

use petgraph::graphmap::DiGraphMap;
use petgraph::Direction;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::trace;

use crate::ir::{BodyProvider, InstId, MethodBody, MethodId};

/// Per-instruction registered edge counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EdgeCounters {
    pub total: usize,
    pub covered: usize,
}

/// Coverage statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CoverageSummary {
    pub methods: usize,
    pub registered_methods: usize,
    pub instructions: usize,
    pub visited_instructions: usize,
    pub registered_instructions: usize,
    pub covered_instructions: usize,
    pub explicit_edges: usize,
    pub registered_edges: usize,
    pub covered_edges: usize,
    pub implicit_edges: usize,
    pub covered_implicit_edges: usize,
}

#[derive(Debug, Clone, Default)]
pub struct CoverageGraph {
    /// Explicit edges
    graph: DiGraphMap<InstId, EdgeInfo>,
    methods: HashSet<MethodId>,
    registered_methods: HashSet<MethodId>,
    /// Entry instruction of every known method, in registration order
    entries: Vec<(MethodId, InstId)>,
    owner: HashMap<InstId, MethodId>,
    implicit_edges: HashSet<Edge>,
    visited: HashSet<InstId>,
    covered_edges: HashSet<Edge>,
    covered_implicit_edges: HashSet<Edge>,
    /// Only instructions of registered methods have counters
    counters: HashMap<InstId, EdgeCounters>,
    /// Call instruction -> edge to the instruction expected after the callee returns
    call_successor: HashMap<InstId, Edge>,
}

impl CoverageGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a method body to the graph
    ///
    /// Idempotent: a method that is already known is left untouched, even
    /// if it is now offered as a primary target. Returns whether the
    /// method was added.
    pub fn register_method(&mut self, body: &MethodBody, primary: bool) -> bool {
        let method = body.method;
        if !self.methods.insert(method) {
            return false;
        }
        if primary {
            self.registered_methods.insert(method);
        }
        if let Some(entry) = body.entry() {
            self.entries.push((method, entry));
        }

        for block in &body.blocks {
            for inst in &block.instructions {
                self.graph.add_node(inst.id);
                self.owner.insert(inst.id, method);
                if primary {
                    self.counters.entry(inst.id).or_default();
                }
            }

            for pair in block.instructions.windows(2) {
                let edge = Edge::new(pair[0].id, pair[1].id);
                if pair[0].is_call() {
                    self.call_successor.insert(pair[0].id, edge);
                }
                self.add_explicit_edge(edge, EdgeKind::Sequential, primary);
            }

            if let Some(terminator) = block.terminator() {
                for &succ in &block.successors {
                    match body.first_instruction_of(succ) {
                        Some(first) => {
                            self.add_explicit_edge(Edge::new(terminator.id, first), EdgeKind::Branch, primary)
                        }
                        None => trace!(method = %method, block = succ, "successor block is missing or empty"),
                    }
                }
            }
        }

        true
    }

    fn add_explicit_edge(&mut self, edge: Edge, kind: EdgeKind, registered: bool) {
        if self.graph.contains_edge(edge.src, edge.dst) {
            return;
        }
        self.graph.add_edge(edge.src, edge.dst, EdgeInfo { kind, registered });
        if registered {
            self.counters.entry(edge.src).or_default().total += 1;
        }
    }

    /// Record one executed instruction sequence
    pub fn consume(&mut self, trace: &[InstId], provider: &dyn BodyProvider) {
        // Continuation edges of calls, keyed by the instruction that closes them
        let mut expected: HashMap<InstId, Edge> = HashMap::new();

        for pair in trace.windows(2) {
            let (src, dst) = (pair[0], pair[1]);
            self.visited.insert(src);
            self.visited.insert(dst);

            if let Some(continuation) = expected.remove(&dst) {
                self.cover_explicit(continuation);
            }

            let edge = Edge::new(src, dst);

            let known = self.graph.edge_weight(src, dst).map(|info| info.kind);
            let kind = match known {
                Some(kind) => Some(kind),
                None if self.implicit_edges.contains(&edge) => Some(EdgeKind::Exception),
                None if self.check_implicit(edge, provider) => Some(EdgeKind::Exception),
                None if self.check_call(edge, provider) => Some(EdgeKind::Call),
                None => None,
            };

            match kind {
                Some(EdgeKind::Exception) => {
                    self.covered_implicit_edges.insert(edge);
                }
                Some(kind) => {
                    if kind == EdgeKind::Call {
                        if let Some(&continuation) = self.call_successor.get(&src) {
                            expected.insert(continuation.dst, continuation);
                        }
                    }
                    self.cover_explicit(edge);
                }
                None => trace!(src = %src, dst = %dst, "ignoring unrecognized edge"),
            }
        }

        if let [single] = trace {
            self.visited.insert(*single);
        }
    }

    fn cover_explicit(&mut self, edge: Edge) {
        if !self.covered_edges.insert(edge) {
            return;
        }
        let registered = self
            .graph
            .edge_weight(edge.src, edge.dst)
            .map_or(false, |info| info.registered);
        if registered {
            if let Some(counters) = self.counters.get_mut(&edge.src) {
                counters.covered += 1;
            }
        }
    }

    /// Transfer into a handler block of another block
    fn check_implicit(&mut self, edge: Edge, provider: &dyn BodyProvider) -> bool {
        let (Some(src), Some(dst)) = (provider.locate(edge.src), provider.locate(edge.dst)) else {
            return false;
        };
        if src.block_key() != dst.block_key() && dst.block.is_handler() {
            trace!(src = %edge.src, dst = %edge.dst, "discovered exception edge");
            self.implicit_edges.insert(edge);
            return true;
        }
        false
    }

    /// Call instruction into some method body; registers the callee if needed
    fn check_call(&mut self, edge: Edge, provider: &dyn BodyProvider) -> bool {
        let Some(src) = provider.locate(edge.src) else {
            return false;
        };
        if !src.instruction.is_call() {
            return false;
        }
        let Some(callee) = provider.locate(edge.dst).and_then(|dst| provider.body(dst.method)) else {
            return false;
        };

        if self.register_method(callee, false) {
            trace!(method = %callee.method, "registered callee discovered from trace");
        }
        let registered =
            self.registered_methods.contains(&src.method) && self.registered_methods.contains(&callee.method);
        trace!(src = %edge.src, dst = %edge.dst, registered, "discovered call edge");
        self.add_explicit_edge(edge, EdgeKind::Call, registered);
        true
    }

    /// Whether an instruction has nothing left to cover
    pub fn is_covered(&self, inst: InstId) -> bool {
        match self.counters.get(&inst) {
            None => true,
            Some(counters) => {
                counters.total == 0 || (self.visited.contains(&inst) && counters.covered >= counters.total)
            }
        }
    }

    /// Whether an edge has nothing left to cover
    ///
    /// Edges outside registered methods are trivially covered.
    pub fn is_edge_covered(&self, src: InstId, dst: InstId) -> bool {
        let edge = Edge::new(src, dst);
        if self.implicit_edges.contains(&edge) {
            return self.covered_implicit_edges.contains(&edge);
        }
        self.covered_edges.contains(&edge) || !self.is_registered_edge(src, dst)
    }

    pub fn is_registered_edge(&self, src: InstId, dst: InstId) -> bool {
        self.graph.edge_weight(src, dst).map_or(false, |info| info.registered)
    }

    pub fn is_visited(&self, inst: InstId) -> bool {
        self.visited.contains(&inst)
    }

    pub fn is_known_method(&self, method: MethodId) -> bool {
        self.methods.contains(&method)
    }

    pub fn is_registered_method(&self, method: MethodId) -> bool {
        self.registered_methods.contains(&method)
    }

    pub fn method_of(&self, inst: InstId) -> Option<MethodId> {
        self.owner.get(&inst).copied()
    }

    pub fn counters(&self, inst: InstId) -> Option<EdgeCounters> {
        self.counters.get(&inst).copied()
    }

    /// Entry instructions of registered methods
    pub fn entries(&self) -> Vec<InstId> {
        self.entries
            .iter()
            .filter(|(method, _)| self.registered_methods.contains(method))
            .map(|&(_, entry)| entry)
            .collect()
    }

    /// Successors over registered explicit edges
    pub fn successors(&self, inst: InstId) -> Vec<InstId> {
        if !self.graph.contains_node(inst) {
            return vec![];
        }
        self.graph
            .neighbors_directed(inst, Direction::Outgoing)
            .filter(|&dst| self.is_registered_edge(inst, dst))
            .collect()
    }

    /// Predecessors over registered explicit edges
    pub fn predecessors(&self, inst: InstId) -> Vec<InstId> {
        if !self.graph.contains_node(inst) {
            return vec![];
        }
        self.graph
            .neighbors_directed(inst, Direction::Incoming)
            .filter(|&src| self.is_registered_edge(src, inst))
            .collect()
    }

    /// All explicit edges with their weights
    pub fn explicit_edges(&self) -> impl Iterator<Item = (Edge, EdgeInfo)> + '_ {
        self.graph.all_edges().map(|(src, dst, info)| (Edge::new(src, dst), *info))
    }

    pub fn implicit_edges(&self) -> impl Iterator<Item = Edge> + '_ {
        self.implicit_edges.iter().copied()
    }

    pub fn instructions(&self) -> impl Iterator<Item = InstId> + '_ {
        self.graph.nodes()
    }

    pub fn summary(&self) -> CoverageSummary {
        let registered_edges = self.graph.all_edges().filter(|(_, _, info)| info.registered).count();
        CoverageSummary {
            methods: self.methods.len(),
            registered_methods: self.registered_methods.len(),
            instructions: self.graph.node_count(),
            visited_instructions: self.visited.len(),
            registered_instructions: self.counters.len(),
            covered_instructions: self.counters.keys().filter(|&&inst| self.is_covered(inst)).count(),
            explicit_edges: self.graph.edge_count(),
            registered_edges,
            covered_edges: self.covered_edges.len(),
            implicit_edges: self.implicit_edges.len(),
            covered_implicit_edges: self.covered_implicit_edges.len(),
        }
    }
}
