//! Precipitation pipeline CLI.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use precip_pipeline::{Pipeline, PipelineConfig, Stage};

/// Precipitation pipeline
#[derive(Parser, Debug)]
#[command(name = "precip-pipeline")]
#[command(about = "Site reports, area series and climatologies from monthly precipitation grids")]
struct Args {
    /// YAML configuration file
    #[arg(short, long, env = "PRECIP_CONFIG")]
    config: Option<PathBuf>,

    /// Root directory (overrides the configuration)
    #[arg(short, long, env = "PRECIP_ROOT")]
    root: Option<PathBuf>,

    /// Log level
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    log_level: String,

    /// Emit JSON log lines
    #[arg(long, env = "PRECIP_JSON_LOGS")]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum Command {
    /// Per-site monthly reports
    Sites,
    /// Area-averaged series and annual totals
    Area,
    /// Annual and monthly climatologies
    Climatology,
    /// Every stage in order
    All,
}

impl Command {
    fn stages(self) -> Vec<Stage> {
        match self {
            Command::Sites => vec![Stage::Sites],
            Command::Area => vec![Stage::Area],
            Command::Climatology => vec![Stage::Climatology],
            Command::All => Stage::ALL.to_vec(),
        }
    }
}

fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    let subscriber = fmt().with_env_filter(filter).with_target(true).with_level(true);
    if args.json_logs {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    let mut config = match &args.config {
        Some(path) => PipelineConfig::from_yaml(path)?,
        None => PipelineConfig::from_env(),
    };
    if let Some(root) = args.root {
        config.root = root;
    }

    info!(
        root = %config.root.display(),
        variable = %config.variable,
        region = %config.region,
        "Starting precipitation pipeline"
    );

    let pipeline = Pipeline::new(config).context("Invalid pipeline configuration")?;
    let summaries = pipeline
        .run(&args.command.stages())
        .with_context(|| format!("{:?} run failed", args.command))?;

    for (stage, summary) in &summaries {
        info!(
            stage = %stage,
            produced = summary.produced_count(),
            skipped = summary.skipped_count(),
            summary = %serde_json::to_string(summary).unwrap_or_default(),
            "Run summary"
        );
    }

    Ok(())
}
