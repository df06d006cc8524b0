mod commands;
mod context;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "stack")]
#[command(about = "Declare resource graphs in KDL, then plan and apply them", long_about = None)]
struct Cli {
    /// Stack file to use instead of project discovery
    #[arg(short, long, global = true, env = "STACKFLOW_FILE")]
    file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the stack and print a summary
    Validate,
    /// Show what apply would change
    Plan {
        /// Print the plan as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the resource graph in apply order
    Graph {
        /// Print the canonical JSON form
        #[arg(long, conflicts_with = "dot")]
        json: bool,
        /// Print a Graphviz digraph
        #[arg(long)]
        dot: bool,
    },
    /// Materialize the stack
    Apply {
        /// Apply without stopping at the plan
        #[arg(short, long)]
        yes: bool,
    },
    /// Print the outputs of the last apply
    Outputs {
        /// Print outputs as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete every resource of the stack
    Destroy {
        /// Destroy without stopping at the summary
        #[arg(short, long)]
        yes: bool,
    },
    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if matches!(cli.command, Commands::Version) {
        println!("stackflow {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let settings = stackflow_config::Settings::load()?;

    // Logs go to stderr so JSON output stays clean
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.log_level.as_deref().unwrap_or("warn")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let file = cli.file.as_deref();
    match cli.command {
        Commands::Validate => commands::validate::handle(file).await?,
        Commands::Plan { json } => commands::plan::handle(file, settings, json).await?,
        Commands::Graph { json, dot } => commands::graph::handle(file, json, dot).await?,
        Commands::Apply { yes } => commands::apply::handle(file, settings, yes).await?,
        Commands::Outputs { json } => commands::outputs::handle(file, settings, json).await?,
        Commands::Destroy { yes } => commands::destroy::handle(file, settings, yes).await?,
        Commands::Version => {}
    }

    Ok(())
}
