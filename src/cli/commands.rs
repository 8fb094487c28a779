//! Command implementations for the groundtruth CLI.

use log::debug;

use crate::cli::args::*;
use crate::cli::output::*;
use crate::config::{self, OutputOptions, RadialConfig, TopKConfig};
use crate::error::{GroundTruthError, Result};
use crate::metric::MetricSpace;
use crate::pipeline;
use crate::storage::StorageConfig;

/// Execute a CLI command.
pub fn execute_command(args: GroundTruthArgs) -> Result<()> {
    let threads = args.threads.unwrap_or_else(num_cpus::get);
    if threads == 0 {
        return Err(GroundTruthError::invalid_config(
            "thread count must be at least 1",
        ));
    }
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("groundtruth-{i}"))
        .build()
        .map_err(|e| GroundTruthError::other(format!("failed to build thread pool: {e}")))?;
    debug!("using {threads} worker threads");

    pool.install(|| match &args.command {
        Command::Radial(radial_args) => run_radial(radial_args, &args),
        Command::TopK(topk_args) => run_topk(topk_args, &args),
        Command::Import(import_args) => import(import_args, &args),
        Command::Inspect(inspect_args) => inspect(inspect_args, &args),
    })
}

fn output_options(write: &WriteArgs) -> OutputOptions {
    OutputOptions {
        overwrite: write.overwrite,
        storage: StorageConfig {
            sync_writes: write.sync_writes,
            use_locking: !write.no_lock,
            ..StorageConfig::default()
        },
    }
}

/// Metric space named on the command line, if any.
fn parse_space(metric: Option<&str>, convention: Option<&str>) -> Result<Option<MetricSpace>> {
    metric.map(|m| MetricSpace::parse(m, convention)).transpose()
}

fn missing_argument(name: &str) -> GroundTruthError {
    GroundTruthError::invalid_config(format!("{name} is required without --config"))
}

/// Build the radial config: JSON file first, then command-line values.
fn radial_config(args: &RadialArgs) -> Result<RadialConfig> {
    let space = parse_space(args.metric.as_deref(), args.convention.as_deref())?;

    let mut config = match &args.config {
        Some(path) => config::load_json::<RadialConfig, _>(path)?,
        None => {
            let threshold = args.threshold.ok_or_else(|| missing_argument("THRESHOLD"))?;
            let space = space.ok_or_else(|| missing_argument("METRIC"))?;
            RadialConfig::new(threshold, space.metric(), space.convention())
        }
    };
    if let Some(threshold) = args.threshold {
        config.threshold = threshold;
    }
    if let Some(space) = space {
        config.metric = space.metric();
        config.convention = space.convention();
    }
    if let Some(max_length) = args.max_length {
        config.max_length = max_length;
    }
    if args.sequential {
        config.parallel = false;
    }
    config.validate()?;
    Ok(config)
}

fn topk_config(args: &TopKArgs) -> Result<TopKConfig> {
    let space = parse_space(args.metric.as_deref(), args.convention.as_deref())?;

    let mut config = match &args.config {
        Some(path) => config::load_json::<TopKConfig, _>(path)?,
        None => {
            let space = space.ok_or_else(|| missing_argument("METRIC"))?;
            TopKConfig::new(space.metric(), space.convention())
        }
    };
    if let Some(space) = space {
        config.metric = space.metric();
        config.convention = space.convention();
    }
    if let Some(rank) = args.rank {
        config.rank = rank;
    }
    if args.sequential {
        config.parallel = false;
    }
    config.validate()?;
    Ok(config)
}

/// Generate radial ground truth.
fn run_radial(args: &RadialArgs, cli_args: &GroundTruthArgs) -> Result<()> {
    let config = radial_config(args)?;
    if cli_args.verbosity() > 1 {
        println!(
            "Radial ground truth: {} -> {}",
            args.input.display(),
            args.output.display()
        );
        println!("Metric: {}", config.space()?);
        println!("Threshold: {}", config.threshold);
    }

    let report = pipeline::run_radial(
        &args.input,
        &args.output,
        &config,
        &output_options(&args.write),
    )?;
    output_result("Radial ground truth written", &report, cli_args)
}

/// Derive rank-k thresholds.
fn run_topk(args: &TopKArgs, cli_args: &GroundTruthArgs) -> Result<()> {
    let config = topk_config(args)?;
    if cli_args.verbosity() > 1 {
        println!(
            "Rank-k thresholds: {} -> {}",
            args.input.display(),
            args.output.display()
        );
        println!("Metric: {}", config.space()?);
        println!("Rank: {}", config.rank);
    }

    let report = pipeline::run_topk(
        &args.input,
        &args.output,
        &config,
        &output_options(&args.write),
    )?;
    output_result("Rank-k thresholds written", &report, cli_args)
}

/// Import a vector file.
fn import(args: &ImportArgs, cli_args: &GroundTruthArgs) -> Result<()> {
    if cli_args.verbosity() > 1 {
        println!("Importing {} as '{}'", args.file.display(), args.key);
    }

    let report = pipeline::import_vecs(
        &args.file,
        &args.container,
        &args.key,
        args.format_hint,
        args.limit,
        &output_options(&args.write),
    )?;
    output_result("Import finished", &report, cli_args)
}

/// List container contents.
fn inspect(args: &InspectArgs, cli_args: &GroundTruthArgs) -> Result<()> {
    let report = pipeline::inspect(&args.container, &OutputOptions::default())?;
    output_result("Container contents", &report, cli_args)
}
