//! Candidate scheduling
//!
//! [`PathSelector`] owns the coverage graph, its condensation, the
//! exploration tree and the candidate queue. Traces are fed in, candidates
//! come out in priority order as symbolic states ready for the solver.
//!
//! Coverage-dependent priorities are refreshed lazily: instruction traces
//! only mark the selector dirty, and the next call to [`PathSelector::next`]
//! rebuilds the condensation and re-keys every live candidate.

pub mod queue;

pub use queue::{CandidateKey, CandidateQueue};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;
use tracing::{debug, info, trace};

use crate::config::{KindWeights, SelectorConfig};
use crate::coverage::{Condensation, CoverageGraph};
use crate::error::Result;
use crate::ir::{BodyProvider, InstId, MethodId};
use crate::symbolic::{PathClause, PathClauseKind, SymbolicState, SymbolicTrace};
use crate::tree::{other_branches, CandidatesObserver, ExplorationTree, Vertex, VertexId};

/// The candidate most recently returned by [`PathSelector::next`]
#[derive(Debug, Clone, Serialize)]
pub struct SelectedCandidate {
    pub key: CandidateKey,
    pub method: Option<MethodId>,
    pub kind: PathClauseKind,
    pub clause: PathClause,
    pub state_size: usize,
    /// blake3 of the branch decisions leading here
    pub fingerprint: String,
}

/// Keeps the queue in step with the tree while a trace is merged
struct Ranker<'a> {
    queue: &'a mut CandidateQueue,
    graph: &'a CoverageGraph,
    condensation: &'a Condensation,
    provider: &'a dyn BodyProvider,
    weights: &'a KindWeights,
}

impl CandidatesObserver for Ranker<'_> {
    fn on_new_candidate(&mut self, id: VertexId, vertex: &Vertex) {
        if let Some(key) = CandidateKey::rank(id, vertex, self.graph, self.condensation, self.provider, self.weights) {
            trace!(vertex = %id, score = key.score, "new candidate");
            self.queue.insert(key);
        }
    }

    fn on_candidate_invalidate(&mut self, id: VertexId, _vertex: &Vertex) {
        if self.queue.remove(id).is_some() {
            trace!(vertex = %id, "candidate walked by a trace");
        }
    }
}

#[derive(Debug)]
pub struct PathSelector<P: BodyProvider> {
    provider: P,
    config: SelectorConfig,
    graph: CoverageGraph,
    condensation: Condensation,
    tree: ExplorationTree,
    queue: CandidateQueue,
    needs_update: bool,
    last_candidate: Option<SelectedCandidate>,
    rng: StdRng,
}

impl<P: BodyProvider> PathSelector<P> {
    pub fn new(provider: P, config: SelectorConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        Self {
            provider,
            config,
            graph: CoverageGraph::new(),
            condensation: Condensation::default(),
            tree: ExplorationTree::new(),
            queue: CandidateQueue::new(),
            needs_update: false,
            last_candidate: None,
            rng,
        }
    }

    /// Add a method's body to the coverage graph
    ///
    /// Primary methods count toward coverage. Returns false if the method
    /// was already known or the provider has no body for it.
    pub fn register_method(&mut self, method: MethodId, primary: bool) -> bool {
        let Some(body) = self.provider.body(method) else {
            debug!(%method, "no body to register");
            return false;
        };
        let added = self.graph.register_method(body, primary);
        if added {
            self.needs_update = true;
        }
        added
    }

    /// Record the concrete instructions of one execution
    pub fn add_instruction_trace(&mut self, trace: &[InstId]) {
        self.graph.consume(trace, &self.provider);
        self.needs_update = true;
    }

    /// Merge the symbolic trace of one execution into the exploration tree
    ///
    /// New candidates are keyed against the coverage state as of the last
    /// recomputation.
    pub fn add_execution_trace(&mut self, trace: &SymbolicTrace) -> Result<()> {
        let mut ranker = Ranker {
            queue: &mut self.queue,
            graph: &self.graph,
            condensation: &self.condensation,
            provider: &self.provider,
            weights: &self.config.weights,
        };
        self.tree.add_trace(&self.provider, trace, &mut ranker)
    }

    /// Rebuild the condensation and re-key every candidate if coverage changed
    ///
    /// Returns true if anything was recomputed.
    pub fn recompute_coverage(&mut self) -> bool {
        if !self.needs_update {
            return false;
        }

        self.condensation = Condensation::build(&self.graph);
        let (tree, graph, condensation, provider, weights) =
            (&self.tree, &self.graph, &self.condensation, &self.provider, &self.config.weights);
        self.queue.rekey(|id| {
            let vertex = tree.vertex(id)?;
            if !vertex.is_candidate() {
                return None;
            }
            CandidateKey::rank(id, vertex, graph, condensation, provider, weights)
        });
        self.needs_update = false;

        info!(
            components = self.condensation.len(),
            candidates = self.queue.len(),
            "recomputed coverage"
        );
        true
    }

    pub fn has_next(&self) -> bool {
        !self.queue.is_empty()
    }

    /// Pop the highest-priority candidate and return its accumulated state
    pub fn next(&mut self) -> Option<SymbolicState> {
        self.recompute_coverage();

        let key = self.queue.pop()?;
        let vertex = self.tree.vertex(key.vertex)?;
        let clause = vertex.clause()?.clone();
        let state = self.tree.state(key.vertex);

        debug!(
            vertex = %key.vertex,
            kind = clause.kind.as_str(),
            size = state.size(),
            covered = key.covered,
            fully_covered = key.fully_covered,
            "selected candidate"
        );

        self.last_candidate = Some(SelectedCandidate {
            key,
            method: vertex.method(),
            kind: clause.kind,
            clause,
            state_size: state.size(),
            fingerprint: state.path_fingerprint(),
        });
        Some(state)
    }

    pub fn last_candidate(&self) -> Option<&SelectedCandidate> {
        self.last_candidate.as_ref()
    }

    /// Pick one alternative of `clause` uniformly at random
    ///
    /// Returns Ok(None) if the decision has no alternatives.
    pub fn reverse(&mut self, clause: &PathClause) -> Result<Option<PathClause>> {
        let alternatives = other_branches(clause, &self.provider)?;
        Ok(alternatives.choose(&mut self.rng).cloned())
    }

    /// Live candidates in priority order, as of the last recomputation
    pub fn pending(&self) -> impl Iterator<Item = &CandidateKey> {
        self.queue.iter()
    }

    pub fn pending_len(&self) -> usize {
        self.queue.len()
    }

    pub fn log_summary(&self) {
        let coverage = self.graph.summary();
        let tree = self.tree.summary();
        info!(
            covered_instructions = coverage.covered_instructions,
            registered_instructions = coverage.registered_instructions,
            vertices = tree.vertices,
            candidates = self.queue.len(),
            "exploration state"
        );
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn config(&self) -> &SelectorConfig {
        &self.config
    }

    pub fn graph(&self) -> &CoverageGraph {
        &self.graph
    }

    pub fn condensation(&self) -> &Condensation {
        &self.condensation
    }

    pub fn tree(&self) -> &ExplorationTree {
        &self.tree
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::fixtures::diamond;
    use crate::ir::Program;
    use crate::symbolic::{Clause, Predicate, Term};

    fn cond(value: bool) -> Clause {
        Clause::Path(PathClause::new(
            PathClauseKind::ConditionCheck,
            InstId(1),
            Predicate::Equality { lhs: Term::Var("c".into()), rhs: Term::Bool(value) },
        ))
    }

    fn selector() -> PathSelector<Program> {
        let mut selector = PathSelector::new(Program::from_bodies(vec![diamond()]), SelectorConfig::default());
        assert!(selector.register_method(MethodId(0), true));
        selector
    }

    #[test]
    fn test_register_unknown_method() {
        let mut selector = selector();
        assert!(!selector.register_method(MethodId(7), true));
        assert!(!selector.register_method(MethodId(0), true));
    }

    #[test]
    fn test_next_returns_candidate_state() {
        let mut selector = selector();
        selector.add_execution_trace(&SymbolicTrace { method: MethodId(0), clauses: vec![cond(true)] }).unwrap();
        selector.add_instruction_trace(&[InstId(0), InstId(1), InstId(2), InstId(4)]);
        assert!(selector.has_next());

        let state = selector.next().unwrap();
        assert_eq!(state.clauses, vec![cond(false)]);
        let last = selector.last_candidate().unwrap();
        assert_eq!(last.method, Some(MethodId(0)));
        assert!(!last.key.covered);
        assert!(!last.key.fully_covered);
        assert_eq!(last.fingerprint, state.path_fingerprint());
        assert!(!selector.has_next());
        assert!(selector.next().is_none());
    }

    #[test]
    fn test_recompute_only_when_dirty() {
        let mut selector = selector();
        assert!(selector.recompute_coverage());
        assert!(!selector.recompute_coverage());
        selector.add_instruction_trace(&[InstId(0)]);
        assert!(selector.recompute_coverage());
    }

    #[test]
    fn test_rekey_after_coverage_changes() {
        let mut selector = selector();
        selector.add_execution_trace(&SymbolicTrace { method: MethodId(0), clauses: vec![cond(true)] }).unwrap();
        selector.add_instruction_trace(&[InstId(0), InstId(1), InstId(2), InstId(4)]);
        selector.recompute_coverage();
        assert!(!selector.pending().next().unwrap().covered);

        // another execution takes the false side without a symbolic trace
        selector.add_instruction_trace(&[InstId(0), InstId(1), InstId(3), InstId(4)]);
        selector.recompute_coverage();
        let key = selector.pending().next().unwrap();
        assert!(key.covered);
        assert!(key.fully_covered);
    }

    #[test]
    fn test_reverse_is_seeded() {
        let mut selector = selector();
        let alternative = selector.reverse(cond(true).as_path().unwrap()).unwrap().unwrap();
        assert_eq!(alternative.predicate, Predicate::Equality { lhs: Term::Var("c".into()), rhs: Term::Bool(false) });
    }
}
