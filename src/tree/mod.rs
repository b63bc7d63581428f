//! Exploration tree of observed and pending branch decisions
//!
//! The tree is rooted in a single `Entry` vertex whose children are one
//! `MethodEntry` per explored method. Every other vertex is a branch
//! decision. A vertex's accumulated state is the concatenation of its
//! ancestors' deltas, so it is rebuilt on demand by walking parent links.
//!
//! # Vertex lifecycle
//!
//! ```text
//!   candidate (unvisited) --walked by a trace--> visited --subtree exhausted--> covered
//! ```
//!
//! Siblings appear all at once the first time a decision point is reached
//! (the vertex is *expanded*). Unvisited siblings are reported to the
//! [`CandidatesObserver`] as candidates; a later trace walking one of them
//! invalidates it.

pub mod branches;
pub mod export;

pub use branches::{expected_instruction, other_branches};
pub use export::export_dot;

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, warn};

use crate::error::Result;
use crate::ir::{BodyProvider, MethodId};
use crate::symbolic::{Clause, PathClause, Predicate, SymbolicState, SymbolicTrace};

/// Index of a vertex in the tree arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct VertexId(pub(crate) usize);

impl VertexId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for VertexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VertexKind {
    Entry,
    MethodEntry(MethodId),
    Branch(PathClause),
}

#[derive(Debug, Clone)]
pub struct Vertex {
    kind: VertexKind,
    parent: Option<VertexId>,
    method: Option<MethodId>,
    /// Clauses added on the edge from the parent, own path clause last
    delta: Vec<Clause>,
    /// Size of the accumulated state
    clause_count: usize,
    children: Vec<VertexId>,
    by_clause: HashMap<PathClause, VertexId>,
    visited: bool,
    covered: bool,
    covered_children: usize,
}

impl Vertex {
    fn new(kind: VertexKind, parent: Option<VertexId>, method: Option<MethodId>) -> Self {
        Self {
            kind,
            parent,
            method,
            delta: Vec::new(),
            clause_count: 0,
            children: Vec::new(),
            by_clause: HashMap::new(),
            visited: true,
            covered: false,
            covered_children: 0,
        }
    }

    pub fn kind(&self) -> &VertexKind {
        &self.kind
    }

    pub fn parent(&self) -> Option<VertexId> {
        self.parent
    }

    pub fn method(&self) -> Option<MethodId> {
        self.method
    }

    /// Branch decision of this vertex
    pub fn clause(&self) -> Option<&PathClause> {
        match &self.kind {
            VertexKind::Branch(clause) => Some(clause),
            _ => None,
        }
    }

    pub fn delta(&self) -> &[Clause] {
        &self.delta
    }

    /// Number of clauses in the accumulated state
    pub fn state_size(&self) -> usize {
        self.clause_count
    }

    pub fn children(&self) -> &[VertexId] {
        &self.children
    }

    pub fn is_expanded(&self) -> bool {
        !self.children.is_empty()
    }

    pub fn is_visited(&self) -> bool {
        self.visited
    }

    pub fn is_covered(&self) -> bool {
        self.covered
    }

    /// Unvisited branch vertex
    pub fn is_candidate(&self) -> bool {
        !self.visited && matches!(self.kind, VertexKind::Branch(_))
    }

    pub fn covered_children(&self) -> usize {
        self.covered_children
    }
}

/// Receives candidate lifecycle events from [`ExplorationTree::add_trace`]
pub trait CandidatesObserver {
    /// An unvisited sibling was created by expansion
    fn on_new_candidate(&mut self, id: VertexId, vertex: &Vertex);

    /// A previously unvisited vertex was walked by a trace
    fn on_candidate_invalidate(&mut self, id: VertexId, vertex: &Vertex);
}

/// Observer that ignores every event
pub struct NoopObserver;

impl CandidatesObserver for NoopObserver {
    fn on_new_candidate(&mut self, _id: VertexId, _vertex: &Vertex) {}

    fn on_candidate_invalidate(&mut self, _id: VertexId, _vertex: &Vertex) {}
}

/// Tree statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TreeSummary {
    pub vertices: usize,
    pub methods: usize,
    pub visited: usize,
    pub candidates: usize,
    pub covered: usize,
    pub covered_methods: usize,
}

#[derive(Debug, Clone)]
pub struct ExplorationTree {
    vertices: Vec<Vertex>,
    methods: HashMap<MethodId, VertexId>,
}

impl Default for ExplorationTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ExplorationTree {
    pub const ROOT: VertexId = VertexId(0);

    pub fn new() -> Self {
        Self {
            vertices: vec![Vertex::new(VertexKind::Entry, None, None)],
            methods: HashMap::new(),
        }
    }

    pub fn root(&self) -> VertexId {
        Self::ROOT
    }

    pub fn vertex(&self, id: VertexId) -> Option<&Vertex> {
        self.vertices.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.len() <= 1
    }

    pub fn method_entry(&self, method: MethodId) -> Option<VertexId> {
        self.methods.get(&method).copied()
    }

    pub fn vertices(&self) -> impl Iterator<Item = (VertexId, &Vertex)> {
        self.vertices.iter().enumerate().map(|(i, v)| (VertexId(i), v))
    }

    pub fn candidates(&self) -> impl Iterator<Item = (VertexId, &Vertex)> {
        self.vertices().filter(|(_, v)| v.is_candidate())
    }

    /// Accumulated state of a vertex: every clause on the path from the root
    pub fn state(&self, id: VertexId) -> SymbolicState {
        let mut chain = Vec::new();
        let mut current = Some(id);
        while let Some(v) = current {
            let Some(vertex) = self.vertices.get(v.0) else { break };
            chain.push(vertex);
            current = vertex.parent;
        }

        let clauses = chain
            .iter()
            .rev()
            .flat_map(|vertex| vertex.delta.iter().cloned())
            .collect();
        SymbolicState::from_clauses(clauses)
    }

    /// Merge one symbolic trace into the tree
    ///
    /// Walks the trace from the method's entry vertex, expanding decision
    /// points reached for the first time and reporting candidates to
    /// `observer`. Stops early when the walk enters a covered subtree.
    ///
    /// On error the vertices already created stay in place; the failing
    /// decision point itself is left unexpanded.
    pub fn add_trace(
        &mut self,
        provider: &dyn BodyProvider,
        trace: &SymbolicTrace,
        observer: &mut dyn CandidatesObserver,
    ) -> Result<()> {
        let mut current = self.ensure_method_entry(trace.method);
        let mut pending: Vec<Clause> = Vec::new();

        for clause in &trace.clauses {
            let path = match clause {
                Clause::State(_) => {
                    pending.push(clause.clone());
                    continue;
                }
                Clause::Path(path) => path,
            };

            if self.vertices[current.0].covered {
                debug!(vertex = %current, "trace entered a covered subtree");
                return Ok(());
            }

            if !self.vertices[current.0].is_expanded() {
                self.expand(current, &pending, path, provider, observer)?;
            }

            let next = match self.find_child(current, path) {
                Some(child) => {
                    if !self.vertices[child.0].visited {
                        self.vertices[child.0].visited = true;
                        observer.on_candidate_invalidate(child, &self.vertices[child.0]);
                    }
                    child
                }
                None => {
                    debug!(vertex = %current, clause = %path, "decision outside known alternatives");
                    self.add_child(current, &pending, path.clone(), true)
                }
            };

            pending.clear();
            current = next;
        }

        let end = &self.vertices[current.0];
        if !end.is_expanded() {
            if !end.covered {
                self.mark_covered(current);
            }
        } else if !end.covered {
            warn!(vertex = %current, "trace ended at an expanded vertex");
        }
        Ok(())
    }

    fn ensure_method_entry(&mut self, method: MethodId) -> VertexId {
        if let Some(&id) = self.methods.get(&method) {
            return id;
        }
        let id = VertexId(self.vertices.len());
        self.vertices
            .push(Vertex::new(VertexKind::MethodEntry(method), Some(Self::ROOT), Some(method)));
        self.vertices[Self::ROOT.0].children.push(id);
        self.methods.insert(method, id);
        id
    }

    fn expand(
        &mut self,
        parent: VertexId,
        pending: &[Clause],
        taken: &PathClause,
        provider: &dyn BodyProvider,
        observer: &mut dyn CandidatesObserver,
    ) -> Result<()> {
        let alternatives = other_branches(taken, provider)?;

        self.add_child(parent, pending, taken.clone(), true);
        for alternative in alternatives {
            if self.vertices[parent.0].by_clause.contains_key(&alternative) {
                continue;
            }
            let id = self.add_child(parent, pending, alternative, false);
            observer.on_new_candidate(id, &self.vertices[id.0]);
        }
        Ok(())
    }

    fn find_child(&self, parent: VertexId, clause: &PathClause) -> Option<VertexId> {
        let vertex = &self.vertices[parent.0];
        if let Some(&id) = vertex.by_clause.get(clause) {
            return Some(id);
        }

        // A default arm taken after expansion from a case value matches the `!in` sibling
        let Predicate::DefaultSwitch { cond } = &clause.predicate else {
            return None;
        };
        vertex.children.iter().copied().find(|child| {
            matches!(
                self.vertices[child.0].clause(),
                Some(PathClause { kind, instruction, predicate: Predicate::NotIn { lhs, .. } })
                    if *kind == clause.kind && *instruction == clause.instruction && lhs == cond
            )
        })
    }

    fn add_child(&mut self, parent: VertexId, pending: &[Clause], clause: PathClause, visited: bool) -> VertexId {
        let mut delta = pending.to_vec();
        delta.push(Clause::Path(clause.clone()));

        let id = VertexId(self.vertices.len());
        let parent_vertex = &mut self.vertices[parent.0];
        parent_vertex.children.push(id);
        parent_vertex.by_clause.insert(clause.clone(), id);

        let mut vertex = Vertex::new(VertexKind::Branch(clause), Some(parent), parent_vertex.method);
        vertex.clause_count = parent_vertex.clause_count + delta.len();
        vertex.delta = delta;
        vertex.visited = visited;
        self.vertices.push(vertex);
        id
    }

    /// Mark a leaf covered and propagate upward
    ///
    /// A visited vertex becomes covered once every child is covered.
    /// Propagation never reaches the `Entry` root.
    fn mark_covered(&mut self, leaf: VertexId) {
        self.vertices[leaf.0].covered = true;

        let mut current = leaf;
        while let Some(parent) = self.vertices[current.0].parent {
            if parent == Self::ROOT {
                break;
            }
            let vertex = &mut self.vertices[parent.0];
            vertex.covered_children += 1;
            if !(vertex.visited && vertex.covered_children == vertex.children.len()) {
                break;
            }
            vertex.covered = true;
            current = parent;
        }
    }

    pub fn summary(&self) -> TreeSummary {
        let mut summary = TreeSummary {
            vertices: self.vertices.len(),
            methods: self.methods.len(),
            ..Default::default()
        };
        for vertex in &self.vertices {
            if vertex.visited {
                summary.visited += 1;
            }
            if vertex.is_candidate() {
                summary.candidates += 1;
            }
            if vertex.covered {
                summary.covered += 1;
                if matches!(vertex.kind, VertexKind::MethodEntry(_)) {
                    summary.covered_methods += 1;
                }
            }
        }
        summary
    }
}
