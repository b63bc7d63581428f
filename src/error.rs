//! Errors raised by the exploration core
//!
//! Coverage bookkeeping never fails; bad instrumentation data is dropped.
//! The variants here are contract violations by the trace producer: a
//! decision the core has no safe way to negate.

use thiserror::Error;

use crate::ir::InstId;
use crate::symbolic::Predicate;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExploreError {
    #[error("unexpected predicate in {context}: {predicate}")]
    UnsupportedPredicate { context: &'static str, predicate: Predicate },

    #[error("unexpected instruction {instruction} for a condition clause")]
    UnexpectedInstruction { instruction: InstId },

    #[error("instruction {instruction} is unknown to the body provider")]
    UnknownInstruction { instruction: InstId },
}

pub type Result<T, E = ExploreError> = std::result::Result<T, E>;
