//! Symbolic traces: clauses, predicates and accumulated states

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ir::{InstId, MethodId};

/// Symbolic term appearing in a predicate
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Term {
    Var(String),
    Bool(bool),
    Int(i64),
    /// Term the core does not interpret
    Opaque(String),
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Var(name) => write!(f, "{}", name),
            Term::Bool(b) => write!(f, "{}", b),
            Term::Int(v) => write!(f, "{}", v),
            Term::Opaque(text) => write!(f, "{}", text),
        }
    }
}

/// Predicate shapes produced by the trace collector
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Predicate {
    /// `lhs == rhs`
    Equality { lhs: Term, rhs: Term },
    /// `lhs != rhs`
    Inequality { lhs: Term, rhs: Term },
    /// The default arm of a switch on `cond` was taken
    DefaultSwitch { cond: Term },
    /// `lhs` is none of `values`
    NotIn { lhs: Term, values: Vec<i64> },
    /// Effect the core only carries along
    Opaque { text: String },
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Equality { lhs, rhs } => write!(f, "{} == {}", lhs, rhs),
            Predicate::Inequality { lhs, rhs } => write!(f, "{} != {}", lhs, rhs),
            Predicate::DefaultSwitch { cond } => write!(f, "default({})", cond),
            Predicate::NotIn { lhs, values } => {
                let values: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                write!(f, "{} !in {{{}}}", lhs, values.join(", "))
            }
            Predicate::Opaque { text } => write!(f, "{}", text),
        }
    }
}

/// Branch-kind taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathClauseKind {
    /// Generic condition: two-way branch or switch dispatch
    ConditionCheck,
    NullCheck,
    TypeCheck,
    OverloadCheck,
    BoundsCheck,
}

impl PathClauseKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PathClauseKind::ConditionCheck => "condition",
            PathClauseKind::NullCheck => "null-check",
            PathClauseKind::TypeCheck => "type-check",
            PathClauseKind::OverloadCheck => "overload-check",
            PathClauseKind::BoundsCheck => "bounds-check",
        }
    }
}

/// A branch decision
///
/// Also the key distinguishing siblings in the exploration tree.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PathClause {
    pub kind: PathClauseKind,
    /// Concrete branch instruction that produced the decision
    pub instruction: InstId,
    pub predicate: Predicate,
}

impl PathClause {
    pub fn new(kind: PathClauseKind, instruction: InstId, predicate: Predicate) -> Self {
        Self { kind, instruction, predicate }
    }

    /// Same decision point, different outcome
    pub fn with_predicate(&self, predicate: Predicate) -> Self {
        Self { kind: self.kind, instruction: self.instruction, predicate }
    }
}

impl fmt::Display for PathClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}@{}] {}", self.kind.as_str(), self.instruction, self.predicate)
    }
}

/// Non-branching symbolic effect
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StateClause {
    pub instruction: InstId,
    pub predicate: Predicate,
}

/// One element of a symbolic trace
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "clause", rename_all = "snake_case")]
pub enum Clause {
    Path(PathClause),
    State(StateClause),
}

impl Clause {
    pub fn as_path(&self) -> Option<&PathClause> {
        match self {
            Clause::Path(p) => Some(p),
            Clause::State(_) => None,
        }
    }
}

/// Symbolic trace of one execution of one method
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolicTrace {
    pub method: MethodId,
    pub clauses: Vec<Clause>,
}

/// Accumulated state handed to the solver
///
/// `clauses` holds every clause in order (path clauses included);
/// `path` holds only the branch decisions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SymbolicState {
    pub clauses: Vec<Clause>,
    pub path: Vec<PathClause>,
}

impl SymbolicState {
    pub fn from_clauses(clauses: Vec<Clause>) -> Self {
        let path = clauses.iter().filter_map(Clause::as_path).cloned().collect();
        Self { clauses, path }
    }

    pub fn size(&self) -> usize {
        self.clauses.len()
    }

    /// Stable fingerprint of the branch decisions, hex encoded
    pub fn path_fingerprint(&self) -> String {
        let mut hasher = blake3::Hasher::new();

        // Include length to prevent collisions
        hasher.update(&(self.path.len() as u64).to_le_bytes());

        // Tagged encoding; Display output is ambiguous across term types
        for clause in &self.path {
            let encoded = serde_json::to_vec(clause).unwrap_or_else(|_| clause.to_string().into_bytes());
            hasher.update(&(encoded.len() as u64).to_le_bytes());
            hasher.update(&encoded);
        }

        hasher.finalize().to_hex().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bool_clause(inst: u32, value: bool) -> PathClause {
        PathClause::new(
            PathClauseKind::ConditionCheck,
            InstId(inst),
            Predicate::Equality { lhs: Term::Var("c".into()), rhs: Term::Bool(value) },
        )
    }

    #[test]
    fn test_state_from_clauses_splits_path() {
        let effect = Clause::State(StateClause {
            instruction: InstId(0),
            predicate: Predicate::Opaque { text: "x = 1".into() },
        });
        let state = SymbolicState::from_clauses(vec![effect, Clause::Path(bool_clause(1, true))]);

        assert_eq!(state.size(), 2);
        assert_eq!(state.path, vec![bool_clause(1, true)]);
    }

    #[test]
    fn test_fingerprint_distinguishes_paths() {
        let a = SymbolicState::from_clauses(vec![Clause::Path(bool_clause(1, true))]);
        let b = SymbolicState::from_clauses(vec![Clause::Path(bool_clause(1, false))]);
        let a2 = SymbolicState::from_clauses(vec![Clause::Path(bool_clause(1, true))]);

        assert_ne!(a.path_fingerprint(), b.path_fingerprint());
        assert_eq!(a.path_fingerprint(), a2.path_fingerprint());
        assert_eq!(a.path_fingerprint().len(), 64);
    }

    #[test]
    fn test_fingerprint_separates_terms_that_print_alike() {
        let with_rhs = |rhs: Term| {
            SymbolicState::from_clauses(vec![Clause::Path(PathClause::new(
                PathClauseKind::ConditionCheck,
                InstId(2),
                Predicate::Equality { lhs: Term::Var("x".into()), rhs },
            ))])
        };
        let int = with_rhs(Term::Int(1));
        let var = with_rhs(Term::Var("1".into()));
        let opaque = with_rhs(Term::Opaque("1".into()));

        assert_eq!(int.path[0].to_string(), var.path[0].to_string());
        assert_ne!(int.path_fingerprint(), var.path_fingerprint());
        assert_ne!(var.path_fingerprint(), opaque.path_fingerprint());

        let mimic = SymbolicState::from_clauses(vec![Clause::Path(PathClause::new(
            PathClauseKind::ConditionCheck,
            InstId(2),
            Predicate::Opaque { text: "x == 1".into() },
        ))]);
        assert_eq!(mimic.path[0].to_string(), int.path[0].to_string());
        assert_ne!(mimic.path_fingerprint(), int.path_fingerprint());
    }

    #[test]
    fn test_display() {
        let clause = PathClause::new(
            PathClauseKind::ConditionCheck,
            InstId(4),
            Predicate::NotIn { lhs: Term::Var("x".into()), values: vec![1, 2] },
        );
        assert_eq!(clause.to_string(), "[condition@i4] x !in {1, 2}");
    }

    #[test]
    fn test_clause_json_shape() {
        let json = r#"{"clause":"path","kind":"null_check","instruction":3,
            "predicate":{"type":"equality","lhs":{"type":"var","value":"p"},"rhs":{"type":"bool","value":false}}}"#;
        let clause: Clause = serde_json::from_str(json).unwrap();
        let path = clause.as_path().unwrap();
        assert_eq!(path.kind, PathClauseKind::NullCheck);
        assert_eq!(path.instruction, InstId(3));
    }
}
