//! Adoptrack CLI — run adoption analysis stages over a snapshot store.
//!
//! Each subcommand runs one stage against the configured data directory and
//! prints the written artifact path; `analyze` chains all of them.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use adoptrack_core::{AnalysisConfig, ArtifactStore, Pipeline, COMPARATIVE_PREFIX, QUALITY_PREFIX};
use adoptrack_core::insights::{insights_prefix, velocity_prefix};

/// Adoptrack: cross-validated technology adoption analysis
#[derive(Parser, Debug)]
#[command(name = "adoptrack", version, about, long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the data directory from the configuration
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Validate source agreement and flag hype for every list
    Validate,
    /// Compute adoption velocity for one list (all lists if omitted)
    Velocity {
        /// List key, e.g. enterprise_ai
        list: Option<String>,
    },
    /// Generate strategic insights for one list (all lists if omitted)
    Insights {
        /// List key, e.g. enterprise_ai
        list: Option<String>,
    },
    /// Compare adoption patterns across the first two lists
    Compare,
    /// Run the full pipeline: validate, velocity, insights, compare
    Analyze,
    /// Show the latest artifact for each stage
    Artifacts,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    let mut config =
        AnalysisConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = data_dir;
    }
    tracing::debug!(
        data_dir = %config.data_dir.display(),
        lists = config.lists.len(),
        "configuration loaded"
    );

    let pipeline = Pipeline::new(&config);

    match cli.command {
        Commands::Validate => {
            let path = pipeline.run_quality()?;
            println!("wrote {}", path.display());
        }
        Commands::Velocity { list } => {
            for key in selected_lists(&config, list)? {
                let path = pipeline.run_velocity(&key)?;
                println!("wrote {}", path.display());
            }
        }
        Commands::Insights { list } => {
            for key in selected_lists(&config, list)? {
                let path = pipeline.run_insights(&key)?;
                println!("wrote {}", path.display());
            }
        }
        Commands::Compare => {
            let path = pipeline.run_comparative()?;
            println!("wrote {}", path.display());
        }
        Commands::Analyze => {
            let summary = pipeline.run();
            for stage in &summary.stages {
                match (&stage.artifact, &stage.error) {
                    (Some(path), _) => println!("{:<24} ok    {}", stage.stage, path.display()),
                    (None, Some(error)) => println!("{:<24} FAIL  {}", stage.stage, error),
                    (None, None) => println!("{:<24} ok", stage.stage),
                }
            }
            println!(
                "{} of {} stages succeeded",
                summary.succeeded(),
                summary.stages.len()
            );
            if !summary.all_succeeded() {
                anyhow::bail!("{} stage(s) failed", summary.failed());
            }
        }
        Commands::Artifacts => {
            let store = ArtifactStore::new(config.processed_dir());
            let mut prefixes = vec![QUALITY_PREFIX.to_string()];
            for list in &config.lists {
                prefixes.push(velocity_prefix(&list.key));
                prefixes.push(insights_prefix(&list.key));
            }
            prefixes.push(COMPARATIVE_PREFIX.to_string());
            for prefix in prefixes {
                match store.latest_path(&prefix) {
                    Some(path) => println!("{:<24} {}", prefix, path.display()),
                    None => println!("{:<24} (none)", prefix),
                }
            }
        }
    }

    Ok(())
}

/// Resolve one named list or all configured lists, in configuration order.
fn selected_lists(config: &AnalysisConfig, list: Option<String>) -> anyhow::Result<Vec<String>> {
    match list {
        Some(key) => {
            if config.list(&key).is_none() {
                anyhow::bail!(
                    "unknown list '{}'; configured lists: {}",
                    key,
                    config
                        .lists
                        .iter()
                        .map(|l| l.key.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                );
            }
            Ok(vec![key])
        }
        None => Ok(config.lists.iter().map(|l| l.key.clone()).collect()),
    }
}
