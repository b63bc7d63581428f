//! Candidate priority queue
//!
//! Candidates are ordered lexicographically by:
//!
//! 1. whether the decision is already covered (uncovered first)
//! 2. whether everything reachable after it is covered (not fully covered first)
//! 3. state size times the kind weight (smaller first)
//!
//! Ties break on vertex index, oldest first.

use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};

use crate::config::KindWeights;
use crate::coverage::{Condensation, CoverageGraph};
use crate::ir::BodyProvider;
use crate::tree::{expected_instruction, Vertex, VertexId};

#[derive(Debug, Clone, Copy, Serialize)]
pub struct CandidateKey {
    pub covered: bool,
    pub fully_covered: bool,
    pub score: f64,
    pub vertex: VertexId,
}

impl CandidateKey {
    /// Key of a candidate vertex against the current coverage state
    ///
    /// Returns None for vertices without a branch decision.
    pub fn rank(
        id: VertexId,
        vertex: &Vertex,
        graph: &CoverageGraph,
        condensation: &Condensation,
        provider: &dyn BodyProvider,
        weights: &KindWeights,
    ) -> Option<Self> {
        let clause = vertex.clause()?;
        let expected = expected_instruction(clause, provider);
        let covered = match expected {
            Some(dst) => graph.is_edge_covered(clause.instruction, dst),
            None => graph.is_covered(clause.instruction),
        };
        let fully_covered = condensation.is_fully_covered(expected.unwrap_or(clause.instruction));

        Some(Self {
            covered,
            fully_covered,
            score: vertex.state_size() as f64 * weights.weight(clause.kind),
            vertex: id,
        })
    }
}

impl Ord for CandidateKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.covered
            .cmp(&other.covered)
            .then(self.fully_covered.cmp(&other.fully_covered))
            .then(self.score.total_cmp(&other.score))
            .then(self.vertex.cmp(&other.vertex))
    }
}

impl PartialOrd for CandidateKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for CandidateKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for CandidateKey {}

/// Ordered set of candidates with removal by vertex
#[derive(Debug, Clone, Default)]
pub struct CandidateQueue {
    ordered: BTreeSet<CandidateKey>,
    keys: HashMap<VertexId, CandidateKey>,
}

impl CandidateQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or re-key a candidate
    pub fn insert(&mut self, key: CandidateKey) {
        if let Some(old) = self.keys.insert(key.vertex, key) {
            self.ordered.remove(&old);
        }
        self.ordered.insert(key);
    }

    /// Remove a candidate; absent vertices are ignored
    pub fn remove(&mut self, vertex: VertexId) -> Option<CandidateKey> {
        let key = self.keys.remove(&vertex)?;
        self.ordered.remove(&key);
        Some(key)
    }

    pub fn pop(&mut self) -> Option<CandidateKey> {
        let key = self.ordered.pop_first()?;
        self.keys.remove(&key.vertex);
        Some(key)
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    /// Candidates in priority order
    pub fn iter(&self) -> impl Iterator<Item = &CandidateKey> {
        self.ordered.iter()
    }

    /// Recompute every key; candidates for which `rank` yields None are dropped
    pub fn rekey(&mut self, mut rank: impl FnMut(VertexId) -> Option<CandidateKey>) {
        let vertices: Vec<VertexId> = self.keys.keys().copied().collect();
        self.ordered.clear();
        self.keys.clear();
        for vertex in vertices {
            if let Some(key) = rank(vertex) {
                self.insert(key);
            }
        }
    }
}
