//! Integration tests for the cexplore commands
//!
//! These are smoke tests that verify:
//! - CLI parsing works correctly
//! - Commands run against a session file without panicking
//! - Output format is correct (human/json/pretty)
//! - Missing or malformed sessions fail with the documented exit codes

use std::path::PathBuf;
use std::process::Command;
use tempfile::TempDir;

const SESSION: &str = r#"{
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
    "targets": [0],
    "executions": [{
        "instructions": [0, 1, 2, 4],
        "traces": [{"method": 0, "clauses": [{"clause": "path", "kind": "condition_check", "instruction": 1,
            "predicate": {"type": "equality", "lhs": {"type": "var", "value": "c"}, "rhs": {"type": "bool", "value": true}}}]}]
    }]
}"#;

/// Test context holding a session file in a temporary directory
struct TestContext {
    bin: PathBuf,
    session_path: PathBuf,
    _temp_dir: TempDir,
}

impl TestContext {
    fn new() -> Self {
        Self::with_session(SESSION)
    }

    fn with_session(contents: &str) -> Self {
        let temp_dir = TempDir::new().unwrap();
        let session_path = temp_dir.path().join("session.json");
        std::fs::write(&session_path, contents).unwrap();

        Self {
            bin: PathBuf::from(env!("CARGO_BIN_EXE_cexplore")),
            session_path,
            _temp_dir: temp_dir,
        }
    }

    fn run_command(&self, args: &[&str]) -> TestOutput {
        let output = Command::new(&self.bin)
            .args(args)
            .arg("--session")
            .arg(&self.session_path)
            .env_remove("CEXPLORE_SESSION")
            .env_remove("RUST_LOG")
            .output()
            .expect("Failed to run cexplore");

        TestOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            code: output.status.code(),
        }
    }
}

struct TestOutput {
    stdout: String,
    stderr: String,
    code: Option<i32>,
}

impl TestOutput {
    fn json(&self) -> serde_json::Value {
        serde_json::from_str(self.stdout.trim()).unwrap_or_else(|e| panic!("invalid JSON ({}): {}", e, self.stdout))
    }
}

#[test]
fn test_schedule_human() {
    let ctx = TestContext::new();
    let out = ctx.run_command(&["schedule"]);

    assert_eq!(out.code, Some(0), "stderr: {}", out.stderr);
    assert!(out.stdout.contains("1 candidate(s), 0 remaining"));
    assert!(out.stdout.contains("[condition@i1] c == false"));
}

#[test]
fn test_schedule_json() {
    let ctx = TestContext::new();
    let out = ctx.run_command(&["schedule", "--with-path", "--output", "json"]);

    assert_eq!(out.code, Some(0), "stderr: {}", out.stderr);
    let json = out.json();
    assert_eq!(json["tool"], "cexplore");
    let scheduled = json["data"]["scheduled"].as_array().unwrap();
    assert_eq!(scheduled.len(), 1);
    assert_eq!(scheduled[0]["kind"], "condition");
    assert_eq!(scheduled[0]["covered"], false);
    assert_eq!(scheduled[0]["path"][0], "[condition@i1] c == false");
    assert_eq!(json["data"]["remaining"], 0);
}

#[test]
fn test_status_pretty() {
    let ctx = TestContext::new();
    let out = ctx.run_command(&["status", "--output", "pretty"]);

    assert_eq!(out.code, Some(0), "stderr: {}", out.stderr);
    assert!(out.stdout.contains('\n'));
    let json = out.json();
    assert_eq!(json["data"]["coverage"]["registered_methods"], 1);
    assert_eq!(json["data"]["coverage"]["instructions"], 5);
    assert_eq!(json["data"]["candidates"], 1);
    assert_eq!(json["data"]["tree"]["methods"], 1);
}

#[test]
fn test_tree_dot() {
    let ctx = TestContext::new();
    let out = ctx.run_command(&["tree", "--format", "dot"]);

    assert_eq!(out.code, Some(0), "stderr: {}", out.stderr);
    assert!(out.stdout.starts_with("digraph ExplorationTree {"));
    assert!(out.stdout.contains("style=dashed"));
}

#[test]
fn test_tree_human() {
    let ctx = TestContext::new();
    let out = ctx.run_command(&["tree"]);

    assert_eq!(out.code, Some(0), "stderr: {}", out.stderr);
    assert!(out.stdout.starts_with("v0 ENTRY [visited]"));
    assert!(out.stdout.contains("    v3 [condition@i1] c == false [candidate]"));
}

#[test]
fn test_graph_formats() {
    let ctx = TestContext::new();

    let dot = ctx.run_command(&["graph", "--format", "dot"]);
    assert_eq!(dot.code, Some(0), "stderr: {}", dot.stderr);
    assert!(dot.stdout.contains("\"i1\" -> \"i3\""));

    let json = ctx.run_command(&["graph", "--format", "json"]).json();
    assert_eq!(json["data"]["instructions"].as_array().unwrap().len(), 5);

    let human = ctx.run_command(&["graph"]);
    assert!(human.stdout.starts_with("Coverage Graph:"));
}

#[test]
fn test_missing_session() {
    let ctx = TestContext::new();
    let out = Command::new(&ctx.bin)
        .args(["status", "--output", "json", "--session", "/nonexistent/session.json"])
        .env_remove("CEXPLORE_SESSION")
        .output()
        .unwrap();

    assert_eq!(out.status.code(), Some(4));
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("\"code\":\"E001\""));
}

#[test]
fn test_malformed_session() {
    let ctx = TestContext::with_session("{\"methods\": 42}");
    let out = ctx.run_command(&["status"]);

    assert_eq!(out.code, Some(5));
    assert!(out.stderr.contains("Invalid session file"));
}
