// cexplore: Coverage-guided exploration scheduling
//
// Replays a recorded exploration session and reports the candidates the
// solver should try next.

use anyhow::Result;
use clap::Parser;

use concolic_explorer::cli::{self, Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    // Run the appropriate command
    run_command(cli)?;

    Ok(())
}

fn run_command(cli: Cli) -> Result<()> {
    match cli.command.clone() {
        Commands::Schedule(args) => cli::cmds::schedule(args, &cli)?,
        Commands::Status(args) => cli::cmds::status(args, &cli)?,
        Commands::Tree(args) => cli::cmds::tree(args, &cli)?,
        Commands::Graph(args) => cli::cmds::graph(args, &cli)?,
    }
    Ok(())
}
