//! # Interchange-atlas CLI
//!
//! Command-line interface for the interchange-atlas library.
//! Turns a fetched OSM input bundle into the interchange catalog JSON.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{error, info};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use interchange_atlas::{run_pipeline_with_progress, write_catalog, InputBundle, PipelineConfig};

mod cli;

/// Command-line interface for interchange-atlas
#[derive(Parser)]
#[command(name = "interchange-atlas")]
#[command(about = "Builds a catalog of motorway interchanges from OpenStreetMap ramp data")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline on an input bundle
    Build {
        /// Input bundle (JSON element sets and external records)
        #[arg(long)]
        input: PathBuf,

        /// Pipeline configuration; defaults apply when omitted
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output file path, or "-" for stdout
        #[arg(long, default_value = "-")]
        output: String,

        /// Enable verbose logging
        #[arg(short, long)]
        verbose: bool,
    },
    /// Validate a pipeline configuration file
    CheckConfig {
        /// Configuration file to validate
        path: PathBuf,
    },
}

/// Output destination types
#[derive(Debug, PartialEq)]
enum OutputDestination {
    File(PathBuf),
    Stdout,
}

/// Resolve output destination from CLI arguments
fn resolve_output(output: &str) -> OutputDestination {
    if output == "-" || output.is_empty() {
        OutputDestination::Stdout
    } else {
        OutputDestination::File(PathBuf::from(output))
    }
}

fn main() {
    let cli = Cli::parse();

    let verbose = matches!(cli.command, Commands::Build { verbose: true, .. });
    let default_filter = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .target(env_logger::Target::Stderr)
        .init();

    if let Err(e) = run(cli) {
        error!("❌ Error: {e:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Build {
            input,
            config,
            output,
            verbose: _,
        } => build(&input, config.as_deref(), resolve_output(&output)),
        Commands::CheckConfig { path } => {
            PipelineConfig::load(&path).with_context(|| format!("Invalid config {}", path.display()))?;
            eprintln!("✅ {} is valid", path.display());
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    match path {
        Some(path) => {
            PipelineConfig::load(path).with_context(|| format!("Failed to load config {}", path.display()))
        }
        None => Ok(PipelineConfig::default()),
    }
}

fn build(input: &Path, config: Option<&Path>, output: OutputDestination) -> Result<()> {
    let config = load_config(config)?;
    let bundle =
        InputBundle::load(input).with_context(|| format!("Failed to read input bundle {}", input.display()))?;

    let mut progress = match output {
        OutputDestination::File(_) => cli::ProgressManager::new(&format!("🛣️  Building catalog from {}", input.display())),
        OutputDestination::Stdout => cli::ProgressManager::hidden(),
    };
    let interchanges = run_pipeline_with_progress(&bundle, &config, |stage| progress.stage(stage))?;
    progress.finish(interchanges.len());

    match output {
        OutputDestination::File(path) => {
            let file = File::create(&path).with_context(|| format!("Failed to create {}", path.display()))?;
            let mut writer = BufWriter::new(file);
            write_catalog(&mut writer, &interchanges)?;
            writer.flush()?;
            info!("Wrote {} interchanges to {}", interchanges.len(), path.display());
        }
        OutputDestination::Stdout => {
            let stdout = io::stdout();
            let mut writer = BufWriter::new(stdout.lock());
            write_catalog(&mut writer, &interchanges)?;
            writeln!(writer)?;
            writer.flush()?;
        }
    }
    Ok(())
}
