// cexplore: Coverage-guided exploration scheduling
//
// Tracks instruction coverage of a program under test, keeps a tree of
// observed and pending branch decisions, and orders the pending ones so
// the solver is handed the most promising path first.

pub mod cli;
pub mod config;
pub mod coverage;
pub mod error;
pub mod ir;
pub mod output;
pub mod scheduler;
pub mod session;
pub mod symbolic;
pub mod tree;

pub use config::{KindWeights, SelectorConfig};
pub use coverage::{Condensation, CoverageGraph};
pub use error::{ExploreError, Result};
pub use ir::{BodyProvider, InstId, MethodBody, MethodId, Program};
pub use scheduler::{CandidateKey, PathSelector, SelectedCandidate};
pub use session::Session;
pub use symbolic::{Clause, PathClause, PathClauseKind, Predicate, SymbolicState, SymbolicTrace};
pub use tree::{CandidatesObserver, ExplorationTree, VertexId};
