// CLI command definitions for the cexplore binary

use clap::{Parser, Subcommand, ValueEnum};

/// cexplore - Coverage-guided exploration scheduler
///
/// Replays recorded executions of a program under test and reports which
/// unexplored branch decisions should be handed to the solver next.
#[derive(Parser, Debug, Clone)]
#[command(name = "cexplore")]
#[command(author, version, about)]
#[command(long_about = "cexplore replays a recorded exploration session and schedules candidates.

A session is a JSON file holding method bodies, target methods and the
instruction and symbolic traces of every execution observed so far.

Candidates are ordered by:
  1. uncovered decisions first
  2. decisions leading to code that can still gain coverage first
  3. shorter, cheaper states first (state size x branch-kind weight)")]
pub struct Cli {
    /// Path to the session file
    #[arg(global = true, long, env = "CEXPLORE_SESSION")]
    pub session: Option<String>,

    /// Output format
    #[arg(global = true, long, value_enum, default_value_t = OutputFormat::Human)]
    pub output: OutputFormat,

    /// Seed for random choices (overrides the session config)
    #[arg(global = true, long)]
    pub seed: Option<u64>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Output format options
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text output
    Human,
    /// Compact JSON for programmatic consumption
    Json,
    /// Formatted JSON with indentation
    Pretty,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Pop the next candidates in priority order
    Schedule(ScheduleArgs),

    /// Show coverage and exploration statistics
    Status(StatusArgs),

    /// Show the exploration tree
    Tree(TreeArgs),

    /// Show the instruction coverage graph
    Graph(GraphArgs),
}

// ============================================================================
// Scheduling Commands
// ============================================================================

#[derive(Parser, Debug, Clone)]
pub struct ScheduleArgs {
    /// Maximum number of candidates to pop
    #[arg(long, default_value_t = 10)]
    pub limit: usize,

    /// Show the branch decisions leading to each candidate
    #[arg(long)]
    pub with_path: bool,
}

// ============================================================================
// Query Commands
// ============================================================================

#[derive(Parser, Debug, Clone, Copy)]
pub struct StatusArgs {}

#[derive(Parser, Debug, Clone)]
pub struct TreeArgs {
    /// Output format
    #[arg(long, value_enum)]
    pub format: Option<ExportFormat>,
}

#[derive(Parser, Debug, Clone)]
pub struct GraphArgs {
    /// Output format
    #[arg(long, value_enum)]
    pub format: Option<ExportFormat>,
}

/// Graph output format
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// Human-readable text
    Human,
    /// Graphviz DOT format
    Dot,
    /// JSON export
    Json,
}

// ============================================================================
// Utility Functions
// ============================================================================

/// Resolve the session path from multiple sources
///
/// Priority: CLI arg > CEXPLORE_SESSION env var > default "./session.json"
pub fn resolve_session_path(cli_session: Option<String>) -> anyhow::Result<String> {
    match cli_session {
        Some(path) => Ok(path),
        None => std::env::var("CEXPLORE_SESSION")
            .or_else(|_| Ok("./session.json".to_string())),
    }
}

// ============================================================================
// Command Handlers
// ============================================================================

pub mod cmds {
    use super::*;
    use crate::coverage::{self, CoverageSummary};
    use crate::ir::{MethodId, Program};
    use crate::output;
    use crate::scheduler::PathSelector;
    use crate::session::Session;
    use crate::tree::{self, ExplorationTree, TreeSummary, VertexKind};
    use anyhow::Result;
    use serde::Serialize;
    use std::path::Path;

    /// Print a response in the selected format
    fn emit<T: Serialize>(format: OutputFormat, data: T, human: impl FnOnce(&T)) {
        match format {
            OutputFormat::Human => human(&data),
            OutputFormat::Json => println!("{}", output::JsonResponse::new(data).to_json()),
            OutputFormat::Pretty => println!("{}", output::JsonResponse::new(data).to_pretty_json()),
        }
    }

    fn fail(cli: &Cli, error: output::JsonError, hint: Option<&str>, code: i32) -> ! {
        if cli.output == OutputFormat::Human {
            output::error(&error.message);
            if let Some(hint) = hint {
                output::info(&format!("Hint: {}", hint));
            }
        } else {
            println!("{}", output::JsonResponse::new(error).to_json());
        }
        std::process::exit(code);
    }

    /// Load the session and replay it, exiting on failure
    fn open_session(cli: &Cli) -> Result<PathSelector<Program>> {
        let path = super::resolve_session_path(cli.session.clone())?;

        if !Path::new(&path).exists() {
            fail(
                cli,
                output::JsonError::session_not_found(&path),
                Some(output::R_HINT_SESSION),
                output::EXIT_FILE_NOT_FOUND,
            );
        }

        let session = match Session::load(Path::new(&path)) {
            Ok(session) => session,
            Err(e) => fail(
                cli,
                output::JsonError::invalid_session(&format!("{:#}", e)),
                Some(output::R_HINT_SCHEMA),
                output::EXIT_VALIDATION,
            ),
        };

        match session.replay(cli.seed) {
            Ok(selector) => Ok(selector),
            Err(e) => fail(
                cli,
                output::JsonError::unusable_trace(&format!("{:#}", e)),
                None,
                output::EXIT_VALIDATION,
            ),
        }
    }

    /// One scheduled candidate
    #[derive(Debug, Clone, Serialize)]
    pub struct ScheduledCandidate {
        pub rank: usize,
        pub vertex: usize,
        pub method: Option<MethodId>,
        pub kind: &'static str,
        pub clause: String,
        pub covered: bool,
        pub fully_covered: bool,
        pub score: f64,
        pub state_size: usize,
        pub fingerprint: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub path: Option<Vec<String>>,
    }

    #[derive(Debug, Clone, Serialize)]
    pub struct ScheduleReport {
        pub scheduled: Vec<ScheduledCandidate>,
        pub remaining: usize,
    }

    pub fn schedule(args: ScheduleArgs, cli: &Cli) -> Result<()> {
        let mut selector = open_session(cli)?;

        let mut scheduled = Vec::new();
        while scheduled.len() < args.limit {
            let Some(state) = selector.next() else { break };
            let Some(last) = selector.last_candidate() else { break };
            scheduled.push(ScheduledCandidate {
                rank: scheduled.len() + 1,
                vertex: last.key.vertex.index(),
                method: last.method,
                kind: last.kind.as_str(),
                clause: last.clause.to_string(),
                covered: last.key.covered,
                fully_covered: last.key.fully_covered,
                score: last.key.score,
                state_size: last.state_size,
                fingerprint: last.fingerprint.clone(),
                path: args
                    .with_path
                    .then(|| state.path.iter().map(|clause| clause.to_string()).collect()),
            });
        }

        let report = ScheduleReport { scheduled, remaining: selector.pending_len() };
        emit(cli.output, report, |report| {
            if report.scheduled.is_empty() {
                output::info("No candidates left to explore");
                return;
            }
            output::header(&format!("{} candidate(s), {} remaining", report.scheduled.len(), report.remaining));
            for c in &report.scheduled {
                let method = c.method.map(|m| m.to_string()).unwrap_or_else(|| "?".to_string());
                println!(
                    "  {:>3}. v{} {} {}  score={} size={} covered={} fully_covered={}",
                    c.rank, c.vertex, method, c.clause, c.score, c.state_size, c.covered, c.fully_covered
                );
                for clause in c.path.iter().flatten() {
                    println!("         {}", clause);
                }
            }
        });
        Ok(())
    }

    #[derive(Debug, Clone, Serialize)]
    pub struct StatusReport {
        pub coverage: CoverageSummary,
        pub tree: TreeSummary,
        pub components: usize,
        pub candidates: usize,
    }

    pub fn status(_args: StatusArgs, cli: &Cli) -> Result<()> {
        let selector = open_session(cli)?;

        let report = StatusReport {
            coverage: selector.graph().summary(),
            tree: selector.tree().summary(),
            components: selector.condensation().len(),
            candidates: selector.pending_len(),
        };
        selector.log_summary();

        emit(cli.output, report, |r| {
            println!("Exploration Status:");
            println!("  methods: {} ({} registered)", r.coverage.methods, r.coverage.registered_methods);
            println!(
                "  instructions: {} covered of {} registered ({} visited)",
                r.coverage.covered_instructions, r.coverage.registered_instructions, r.coverage.visited_instructions
            );
            println!("  edges: {} covered of {} registered", r.coverage.covered_edges, r.coverage.registered_edges);
            println!(
                "  implicit edges: {} ({} covered)",
                r.coverage.implicit_edges, r.coverage.covered_implicit_edges
            );
            println!("  components: {}", r.components);
            println!(
                "  tree: {} vertices, {} covered, {} of {} methods exhausted",
                r.tree.vertices, r.tree.covered, r.tree.covered_methods, r.tree.methods
            );
            println!("  candidates: {}", r.candidates);
        });
        Ok(())
    }

    /// Tree vertex for JSON serialization
    #[derive(Debug, Clone, Serialize)]
    pub struct VertexExport {
        pub id: usize,
        pub parent: Option<usize>,
        pub label: String,
        pub visited: bool,
        pub covered: bool,
        pub state_size: usize,
    }

    fn vertex_label(kind: &VertexKind) -> String {
        match kind {
            VertexKind::Entry => "ENTRY".to_string(),
            VertexKind::MethodEntry(method) => method.to_string(),
            VertexKind::Branch(clause) => clause.to_string(),
        }
    }

    fn print_tree(tree: &ExplorationTree) {
        let mut stack = vec![(tree.root(), 0usize)];
        while let Some((id, depth)) = stack.pop() {
            let Some(vertex) = tree.vertex(id) else { continue };
            let status = if vertex.is_covered() {
                "covered"
            } else if vertex.is_visited() {
                "visited"
            } else {
                "candidate"
            };
            println!("{}{} {} [{}]", "  ".repeat(depth), id, vertex_label(vertex.kind()), status);
            for &child in vertex.children().iter().rev() {
                stack.push((child, depth + 1));
            }
        }
    }

    pub fn tree(args: TreeArgs, cli: &Cli) -> Result<()> {
        let selector = open_session(cli)?;
        let tree = selector.tree();

        match args.format.unwrap_or(ExportFormat::Human) {
            ExportFormat::Dot => print!("{}", tree::export_dot(tree)),
            ExportFormat::Human => print_tree(tree),
            ExportFormat::Json => {
                let vertices: Vec<VertexExport> = tree
                    .vertices()
                    .map(|(id, v)| VertexExport {
                        id: id.index(),
                        parent: v.parent().map(|p| p.index()),
                        label: vertex_label(v.kind()),
                        visited: v.is_visited(),
                        covered: v.is_covered(),
                        state_size: v.state_size(),
                    })
                    .collect();
                let format = if cli.output == OutputFormat::Human { OutputFormat::Json } else { cli.output };
                emit(format, vertices, |_| {});
            }
        }
        Ok(())
    }

    pub fn graph(args: GraphArgs, cli: &Cli) -> Result<()> {
        let selector = open_session(cli)?;
        let (graph, condensation) = (selector.graph(), selector.condensation());

        match args.format.unwrap_or(ExportFormat::Human) {
            ExportFormat::Dot => print!("{}", coverage::export_dot(graph, condensation)),
            ExportFormat::Json => {
                let format = if cli.output == OutputFormat::Human { OutputFormat::Json } else { cli.output };
                emit(format, coverage::export_json(graph, condensation), |_| {});
            }
            ExportFormat::Human => {
                let export = coverage::export_json(graph, condensation);
                println!("Coverage Graph:");
                for inst in &export.instructions {
                    let component = inst.component.map(|c| format!("c{}", c)).unwrap_or_else(|| "-".to_string());
                    println!(
                        "  {} {} visited={} covered={} fully_covered={}",
                        inst.id, component, inst.visited, inst.covered, inst.fully_covered
                    );
                }
                for edge in &export.edges {
                    println!(
                        "  {} -> {} {}{}{}",
                        edge.from,
                        edge.to,
                        edge.kind,
                        if edge.registered { "" } else { " (unregistered)" },
                        if edge.covered { " covered" } else { "" }
                    );
                }
            }
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
