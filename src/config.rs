//! Selector configuration

use serde::{Deserialize, Serialize};

use crate::symbolic::PathClauseKind;

/// Per-kind multipliers applied to a candidate's state size
///
/// Lower weights are explored first.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KindWeights {
    pub condition: f64,
    pub null_check: f64,
    pub bounds_check: f64,
    pub type_check: f64,
    pub overload_check: f64,
}

impl Default for KindWeights {
    fn default() -> Self {
        Self {
            condition: 1.0,
            null_check: 1.0,
            bounds_check: 3.0,
            type_check: 3.5,
            overload_check: 4.0,
        }
    }
}

impl KindWeights {
    pub fn weight(&self, kind: PathClauseKind) -> f64 {
        match kind {
            PathClauseKind::ConditionCheck => self.condition,
            PathClauseKind::NullCheck => self.null_check,
            PathClauseKind::BoundsCheck => self.bounds_check,
            PathClauseKind::TypeCheck => self.type_check,
            PathClauseKind::OverloadCheck => self.overload_check,
        }
    }
}

/// Path selector options
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    pub weights: KindWeights,
    /// Seed for choosing among alternatives in `reverse`
    pub seed: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_weights() {
        let weights = KindWeights::default();
        assert_eq!(weights.weight(PathClauseKind::NullCheck), 1.0);
        assert_eq!(weights.weight(PathClauseKind::ConditionCheck), 1.0);
        assert_eq!(weights.weight(PathClauseKind::BoundsCheck), 3.0);
        assert_eq!(weights.weight(PathClauseKind::TypeCheck), 3.5);
        assert_eq!(weights.weight(PathClauseKind::OverloadCheck), 4.0);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: SelectorConfig = serde_json::from_str(r#"{"weights":{"null_check":2.0}}"#).unwrap();
        assert_eq!(config.seed, 0);
        assert_eq!(config.weights.null_check, 2.0);
        assert_eq!(config.weights.type_check, 3.5);
    }
}
