//! Exploration sessions stored as JSON
//!
//! A session bundles method bodies, the target methods and the executions
//! observed so far. Replaying it rebuilds the selector state.
//!
//! ```json
//! {
//!   "methods": [{"method": 0, "name": "f", "blocks": [...]}],
//!   "targets": [0],
//!   "executions": [{"instructions": [0, 1, 2], "traces": [{"method": 0, "clauses": [...]}]}],
//!   "config": {"seed": 7}
//! }
//! ```

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

use crate::config::SelectorConfig;
use crate::ir::{BodyProvider, InstId, MethodBody, MethodId, Program};
use crate::scheduler::PathSelector;
use crate::symbolic::SymbolicTrace;

/// Everything observed during one execution of the program under test
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Execution {
    #[serde(default)]
    pub instructions: Vec<InstId>,
    #[serde(default)]
    pub traces: Vec<SymbolicTrace>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Session {
    pub methods: Vec<MethodBody>,
    /// Primary methods; all methods when empty
    #[serde(default)]
    pub targets: Vec<MethodId>,
    #[serde(default)]
    pub executions: Vec<Execution>,
    #[serde(default)]
    pub config: SelectorConfig,
}

impl Session {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read session file {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("Invalid session file {}", path.display()))
    }

    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("Failed to parse session JSON")
    }

    /// Build a selector and replay every recorded execution into it
    ///
    /// `seed` overrides the seed stored in the session.
    pub fn replay(self, seed: Option<u64>) -> Result<PathSelector<Program>> {
        let mut config = self.config;
        if let Some(seed) = seed {
            config.seed = seed;
        }

        let targets: Vec<MethodId> = if self.targets.is_empty() {
            self.methods.iter().map(|body| body.method).collect()
        } else {
            self.targets
        };

        let mut selector = PathSelector::new(Program::from_bodies(self.methods), config);
        for method in targets {
            if selector.provider().body(method).is_none() {
                bail!("Target method {} has no body in the session", method);
            }
            selector.register_method(method, true);
        }

        for (index, execution) in self.executions.iter().enumerate() {
            for trace in &execution.traces {
                selector
                    .add_execution_trace(trace)
                    .with_context(|| format!("Execution {} has an unusable trace for {}", index, trace.method))?;
            }
            selector.add_instruction_trace(&execution.instructions);
            debug!(execution = index, pending = selector.pending_len(), "replayed execution");
        }
        selector.recompute_coverage();

        info!(
            executions = self.executions.len(),
            candidates = selector.pending_len(),
            "session replayed"
        );
        Ok(selector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIAMOND: &str = r#"{
        "methods": [{
            "method": 0,
            "name": "choose",
            "blocks": [
                {"id": 0, "instructions": [{"id": 0, "kind": {"type": "plain"}},
                    {"id": 1, "kind": {"type": "branch", "true_target": 1, "false_target": 2}}], "successors": [1, 2]},
                {"id": 1, "instructions": [{"id": 2, "kind": {"type": "plain"}}], "successors": [3]},
                {"id": 2, "instructions": [{"id": 3, "kind": {"type": "plain"}}], "successors": [3]},
                {"id": 3, "instructions": [{"id": 4, "kind": {"type": "return"}}]}
            ]
        }],
        "executions": [{
            "instructions": [0, 1, 2, 4],
            "traces": [{"method": 0, "clauses": [{"clause": "path", "kind": "condition_check", "instruction": 1,
                "predicate": {"type": "equality", "lhs": {"type": "var", "value": "c"}, "rhs": {"type": "bool", "value": true}}}]}]
        }]
    }"#;

    #[test]
    fn test_replay_session() {
        let session = Session::from_json(DIAMOND).unwrap();
        assert_eq!(session.methods[0].name, "choose");

        let mut selector = session.replay(Some(3)).unwrap();
        assert_eq!(selector.config().seed, 3);
        assert!(selector.provider().body(MethodId(0)).is_some());
        assert!(selector.graph().is_registered_method(MethodId(0)));
        assert_eq!(selector.pending_len(), 1);

        let state = selector.next().unwrap();
        assert_eq!(state.path.len(), 1);
        assert!(!selector.has_next());
    }

    #[test]
    fn test_unknown_target_rejected() {
        let mut session = Session::from_json(DIAMOND).unwrap();
        session.targets = vec![MethodId(9)];
        let err = session.replay(None).unwrap_err();
        assert!(err.to_string().contains("m9"));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Session::load(&dir.path().join("absent.json")).unwrap_err();
        assert!(err.to_string().contains("Failed to read session file"));
    }

    #[test]
    fn test_malformed_json() {
        assert!(Session::from_json("{\"methods\": 3}").is_err());
    }
}
