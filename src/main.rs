//! `manp` command line: load a graph description, propagate noise bounds,
//! and export them for parameter selection.

use std::error::Error;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use manp_core::{propagate, report, AnalysisConfig, Graph};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "manp")]
#[command(about = "Propagate squared MANP noise bounds through an FHE operation graph")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log every computed bound
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the bound of every operation
    Analyze {
        /// JSON graph description
        #[arg(long, short)]
        graph: PathBuf,

        /// JSON analysis config (fresh noise, override table)
        #[arg(long, short)]
        config: Option<PathBuf>,

        /// Write the bounds as CSV here instead of stdout
        #[arg(long)]
        csv: Option<PathBuf>,
    },

    /// Print the validated graph
    Dump {
        #[arg(long, short)]
        graph: PathBuf,

        #[arg(long, short)]
        config: Option<PathBuf>,
    },
}

fn load(graph: &Path, config: Option<&Path>) -> Result<Graph, Box<dyn Error>> {
    let config = match config {
        Some(path) => AnalysisConfig::from_file(path)?,
        None => AnalysisConfig::default(),
    };
    let registry = config.registry()?;
    let graph = Graph::from_json(&fs::read_to_string(graph)?, &registry)?;
    Ok(graph)
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Commands::Analyze { graph: path, config, csv } => {
            let graph = load(&path, config.as_deref())?;
            let bounds = propagate(&graph)?;
            match csv {
                Some(out) => {
                    report::write_csv(File::create(&out)?, &graph, &bounds)?;
                    info!(path = %out.display(), "bounds written");
                }
                None => report::write_csv(io::stdout().lock(), &graph, &bounds)?,
            }
        }
        Commands::Dump { graph: path, config } => {
            let graph = load(&path, config.as_deref())?;
            println!("{graph}");
        }
    }
    Ok(())
}
