use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use meter_anomaly::batch::BatchRunner;
use meter_anomaly::config::{PipelineConfig, Strategy};
use meter_anomaly::consensus::{CombinationRule, UnavailablePolicy};
use meter_anomaly::core::{Dialect, ValueType};
use meter_anomaly::detection::DetectorKind;
use meter_anomaly::report::render_batch_report;

#[derive(Parser)]
#[command(name = "meter-anomaly")]
#[command(author, version, about = "Consensus anomaly scoring for meter time series")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Settings that override the configuration file.
#[derive(clap::Args, Default)]
pub struct Overrides {
    /// Dataset dialect (datamill, helios, queensland)
    #[arg(short, long)]
    pub dataset: Option<Dialect>,

    /// Value column (daily or total)
    #[arg(long)]
    pub value_type: Option<ValueType>,

    /// Expected anomaly fraction for learned detectors
    #[arg(long)]
    pub contamination: Option<f64>,

    /// Z-score threshold for validation and the threshold rule
    #[arg(short, long)]
    pub z_threshold: Option<f64>,

    /// Rolling window size in rows
    #[arg(short, long)]
    pub window: Option<usize>,

    /// Combination rule (all_agree or any_flag)
    #[arg(long)]
    pub combination: Option<CombinationRule>,

    /// Gate learned detectors with the z-score
    #[arg(long)]
    pub validate: bool,

    /// Detector preset (rule_based or learned)
    #[arg(short, long)]
    pub strategy: Option<Strategy>,

    /// Comma-separated detector list, overriding the strategy
    #[arg(long, value_delimiter = ',')]
    pub detectors: Vec<DetectorKind>,

    /// Leave unavailable detectors out of the vote
    #[arg(long)]
    pub exclude_unavailable: bool,

    /// Score the first difference of the value column
    #[arg(long)]
    pub difference: bool,

    /// Model store directory
    #[arg(long)]
    pub store: Option<PathBuf>,

    /// Random seed
    #[arg(long)]
    pub seed: Option<u64>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Score every CSV file in a folder
    Detect {
        /// Folder of input files
        folder: PathBuf,

        #[command(flatten)]
        overrides: Overrides,

        /// Use learned models from the store instead of fitting per file
        #[arg(long)]
        models: bool,

        /// Write per-file flag tables to this directory
        #[arg(short, long)]
        export: Option<PathBuf>,

        /// Print per-file reports as JSON lines
        #[arg(long)]
        json: bool,
    },

    /// Fit learned detectors on a folder and save them to the store
    Train {
        /// Folder of training files
        folder: PathBuf,

        #[command(flatten)]
        overrides: Overrides,
    },

    /// Print a configuration file with every default filled in
    GenConfig {
        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

pub fn run_command(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => PipelineConfig::from_file(path)?,
        None => PipelineConfig::default(),
    };

    match cli.command {
        Commands::Detect {
            folder,
            overrides,
            models,
            export,
            json,
        } => cmd_detect(apply(config, overrides), folder, models, export, json),
        Commands::Train { folder, overrides } => cmd_train(apply(config, overrides), folder),
        Commands::GenConfig { output } => cmd_gen_config(config, output),
    }
}

fn apply(mut config: PipelineConfig, overrides: Overrides) -> PipelineConfig {
    if let Some(dataset) = overrides.dataset {
        config.dataset = dataset;
    }
    if let Some(value_type) = overrides.value_type {
        config.value_type = value_type;
    }
    if let Some(contamination) = overrides.contamination {
        config.contamination = contamination;
    }
    if overrides.z_threshold.is_some() {
        config.z_score_threshold = overrides.z_threshold;
    }
    if overrides.window.is_some() {
        config.window_size = overrides.window;
    }
    if let Some(combination) = overrides.combination {
        config.combination = combination;
    }
    if let Some(strategy) = overrides.strategy {
        config.strategy = strategy;
    }
    if !overrides.detectors.is_empty() {
        config.detectors = Some(overrides.detectors);
    }
    if let Some(seed) = overrides.seed {
        config.seed = seed;
    }
    if overrides.store.is_some() {
        config.model_store = overrides.store;
    }
    config.validate |= overrides.validate;
    config.difference |= overrides.difference;
    if overrides.exclude_unavailable {
        config.unavailable = UnavailablePolicy::Exclude;
    }
    config
}

fn cmd_detect(
    mut config: PipelineConfig,
    folder: PathBuf,
    models: bool,
    export: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    if models && config.model_store.is_none() {
        bail!("--models needs a model store (--store or model_store in the config)");
    }
    if !models {
        // Without --models learned detectors are fit on each file.
        config.model_store = None;
    }
    if export.is_some() {
        config.export_dir = export;
    }

    let runner = BatchRunner::new(config)?;
    let report = runner
        .run(&folder)
        .with_context(|| format!("scoring {}", folder.display()))?;

    if json {
        for file in &report.files {
            println!("{}", serde_json::to_string(file)?);
        }
    } else {
        print!("{}", render_batch_report(&report));
    }
    Ok(())
}

fn cmd_train(config: PipelineConfig, folder: PathBuf) -> Result<()> {
    let runner = BatchRunner::new(config)?;
    let summary = runner
        .train(&folder)
        .with_context(|| format!("training on {}", folder.display()))?;

    println!(
        "Trained on {} files ({} rows)",
        summary.files_used, summary.rows
    );
    for (kind, path) in &summary.saved {
        println!("  {}: {}", kind, path.display());
    }
    for (kind, err) in &summary.failed {
        println!("  {}: failed ({})", kind, err);
    }
    for failure in &summary.skipped_files {
        println!("Skipped {}: {}", failure.path.display(), failure.error);
    }
    if summary.saved.is_empty() {
        bail!("no model was trained");
    }
    Ok(())
}

fn cmd_gen_config(config: PipelineConfig, output: Option<PathBuf>) -> Result<()> {
    let content = config.to_toml_string()?;
    match output {
        Some(path) => {
            std::fs::write(&path, content)
                .with_context(|| format!("writing {}", path.display()))?;
            println!("Configuration written to {}", path.display());
        }
        None => print!("{content}"),
    }
    Ok(())
}
