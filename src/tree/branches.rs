//! Alternatives of an observed branch decision
//!
//! | kind | alternatives |
//! |---|---|
//! | null / type / overload / bounds check | the negated boolean predicate |
//! | condition on a two-way branch | the negated boolean predicate |
//! | condition on a switch, default taken | `cond == v` for every case value |
//! | condition on a switch, `x == k` taken | `x == v` for every other case value, plus `x !in cases` |
//!
//! Predicates of any other shape cannot be negated safely and are rejected.

use tracing::error;

use crate::error::{ExploreError, Result};
use crate::ir::{BlockId, BodyProvider, InstId, InstKind};
use crate::symbolic::{PathClause, PathClauseKind, Predicate, Term};

/// Every outcome of `clause`'s decision point except the observed one
pub fn other_branches(clause: &PathClause, provider: &dyn BodyProvider) -> Result<Vec<PathClause>> {
    let predicates = match clause.kind {
        PathClauseKind::NullCheck
        | PathClauseKind::TypeCheck
        | PathClauseKind::OverloadCheck
        | PathClauseKind::BoundsCheck => vec![reverse_bool_cond(&clause.predicate)?],
        PathClauseKind::ConditionCheck => match provider.locate(clause.instruction) {
            Some(located) => match located.instruction.switch_values() {
                Some(values) => other_switch_branches(&clause.predicate, &values)?,
                None if matches!(located.instruction.kind, InstKind::Branch { .. }) => {
                    vec![reverse_bool_cond(&clause.predicate)?]
                }
                None => {
                    error!(instruction = %clause.instruction, "unexpected instruction for a condition clause");
                    return Err(ExploreError::UnexpectedInstruction { instruction: clause.instruction });
                }
            },
            // Without a body, only a boolean shape tells us what the decision was
            None if is_bool_cond(&clause.predicate) => vec![reverse_bool_cond(&clause.predicate)?],
            None => {
                error!(instruction = %clause.instruction, "condition clause on an unknown instruction");
                return Err(ExploreError::UnknownInstruction { instruction: clause.instruction });
            }
        },
    };

    Ok(predicates
        .into_iter()
        .map(|predicate| clause.with_predicate(predicate))
        .collect())
}

fn is_bool_cond(predicate: &Predicate) -> bool {
    matches!(
        predicate,
        Predicate::Equality { rhs: Term::Bool(_), .. } | Predicate::Inequality { rhs: Term::Bool(_), .. }
    )
}

fn reverse_bool_cond(predicate: &Predicate) -> Result<Predicate> {
    match predicate {
        Predicate::Equality { lhs, rhs: Term::Bool(value) } => Ok(Predicate::Equality {
            lhs: lhs.clone(),
            rhs: Term::Bool(!value),
        }),
        Predicate::Inequality { lhs, rhs: Term::Bool(value) } => Ok(Predicate::Inequality {
            lhs: lhs.clone(),
            rhs: Term::Bool(!value),
        }),
        other => {
            error!(predicate = %other, "unexpected predicate in bool cond");
            Err(ExploreError::UnsupportedPredicate { context: "bool cond", predicate: other.clone() })
        }
    }
}

/// `values` must be sorted and deduplicated
fn other_switch_branches(predicate: &Predicate, values: &[i64]) -> Result<Vec<Predicate>> {
    match predicate {
        Predicate::DefaultSwitch { cond } => Ok(values
            .iter()
            .map(|&v| Predicate::Equality { lhs: cond.clone(), rhs: Term::Int(v) })
            .collect()),
        Predicate::Equality { lhs, rhs: Term::Int(taken) } => {
            let mut alternatives: Vec<Predicate> = values
                .iter()
                .filter(|&v| v != taken)
                .map(|&v| Predicate::Equality { lhs: lhs.clone(), rhs: Term::Int(v) })
                .collect();
            alternatives.push(Predicate::NotIn { lhs: lhs.clone(), values: values.to_vec() });
            Ok(alternatives)
        }
        other => {
            error!(predicate = %other, "unexpected predicate in switch clause");
            Err(ExploreError::UnsupportedPredicate { context: "switch clause", predicate: other.clone() })
        }
    }
}

/// First instruction the decision leads to, if the body says
pub fn expected_instruction(clause: &PathClause, provider: &dyn BodyProvider) -> Option<InstId> {
    let located = provider.locate(clause.instruction)?;
    let target: BlockId = match (&located.instruction.kind, &clause.predicate) {
        (InstKind::Branch { true_target, false_target }, Predicate::Equality { rhs: Term::Bool(b), .. }) => {
            if *b { *true_target } else { *false_target }
        }
        (InstKind::Branch { true_target, false_target }, Predicate::Inequality { rhs: Term::Bool(b), .. }) => {
            if *b { *false_target } else { *true_target }
        }
        (_, Predicate::Equality { rhs: Term::Int(v), .. }) => located.instruction.switch_target(*v)?,
        (_, Predicate::DefaultSwitch { .. }) | (_, Predicate::NotIn { .. }) => {
            located.instruction.switch_default()?
        }
        _ => return None,
    };
    provider.first_in_block_of(clause.instruction, target)
}
