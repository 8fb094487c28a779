//! Command line argument parsing using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

use crate::dataset::vecs::VecsFormat;

/// groundtruth - exact ground truth for approximate nearest neighbor benchmarks
#[derive(Parser, Debug, Clone)]
#[command(name = "groundtruth")]
#[command(about = "Generate radial and rank-k ground truth for ANN benchmark datasets")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = None)]
pub struct GroundTruthArgs {
    /// Verbosity level (0=quiet, 1=normal, 2=verbose, 3=debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (overrides verbose)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output format
    #[arg(short = 'f', long = "format", default_value = "human", global = true)]
    pub output_format: OutputFormat,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Worker threads for per-query computation (default: number of CPUs)
    #[arg(short = 't', long, global = true, env = "GROUNDTRUTH_THREADS")]
    pub threads: Option<usize>,

    #[command(subcommand)]
    pub command: Command,
}

impl GroundTruthArgs {
    /// Get the effective verbosity level
    pub fn verbosity(&self) -> u8 {
        if self.quiet {
            0
        } else {
            match self.verbose {
                0 => 1,
                n => n,
            }
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Compute the padded radial neighbor matrix (max_distance_neighbors)
    Radial(RadialArgs),

    /// Derive per-query distance and score thresholds at a fixed rank
    #[command(name = "topk")]
    TopK(TopKArgs),

    /// Import an .fvecs/.ivecs/.bvecs file into a container
    Import(ImportArgs),

    /// List the datasets stored in a container
    Inspect(InspectArgs),
}

/// Flags shared by the commands that write results.
#[derive(Args, Debug, Clone, Default)]
pub struct WriteArgs {
    /// Replace output datasets that already exist
    #[arg(long)]
    pub overwrite: bool,

    /// fsync every dataset file as it is written
    #[arg(long)]
    pub sync_writes: bool,

    /// Skip the exclusive writer lock on the output container
    #[arg(long)]
    pub no_lock: bool,
}

/// Arguments for a radial run
#[derive(Args, Debug, Clone)]
pub struct RadialArgs {
    /// Input container directory (must hold `train` and `test`)
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Output container directory; may equal INPUT
    #[arg(value_name = "OUTPUT")]
    pub output: PathBuf,

    /// Inclusive distance cutoff; optional with --config
    #[arg(
        value_name = "THRESHOLD",
        allow_negative_numbers = true,
        required_unless_present = "config"
    )]
    pub threshold: Option<f32>,

    /// Distance metric (l2_squared, cosine, inner_product); optional with --config
    #[arg(value_name = "METRIC", required_unless_present = "config")]
    pub metric: Option<String>,

    /// Inner-product engine convention (faiss or lucene)
    #[arg(value_name = "CONVENTION")]
    pub convention: Option<String>,

    /// Maximum neighbors kept per query
    #[arg(long)]
    pub max_length: Option<usize>,

    /// JSON file with a radial configuration; values given on the command line win
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Process queries on a single thread
    #[arg(long)]
    pub sequential: bool,

    #[command(flatten)]
    pub write: WriteArgs,
}

/// Arguments for a rank-k run
#[derive(Args, Debug, Clone)]
pub struct TopKArgs {
    /// Input container directory (must hold `train`, `test` and `neighbors`)
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Output container directory; may equal INPUT
    #[arg(value_name = "OUTPUT")]
    pub output: PathBuf,

    /// Distance metric (l2_squared, cosine, inner_product); optional with --config
    #[arg(value_name = "METRIC", required_unless_present = "config")]
    pub metric: Option<String>,

    /// Inner-product engine convention (faiss or lucene)
    #[arg(value_name = "CONVENTION")]
    pub convention: Option<String>,

    /// 0-based neighbor column to read (default 99)
    #[arg(short, long)]
    pub rank: Option<usize>,

    /// JSON file with a rank-k configuration; values given on the command line win
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Process queries on a single thread
    #[arg(long)]
    pub sequential: bool,

    #[command(flatten)]
    pub write: WriteArgs,
}

/// Arguments for importing a vector file
#[derive(Args, Debug, Clone)]
pub struct ImportArgs {
    /// Vector file to read
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Container directory to write into (created if missing)
    #[arg(value_name = "CONTAINER")]
    pub container: PathBuf,

    /// Dataset key, e.g. train, test or neighbors
    #[arg(value_name = "KEY")]
    pub key: String,

    /// File format; guessed from the extension when omitted
    #[arg(long, value_enum)]
    pub format_hint: Option<VecsFormat>,

    /// Import at most this many vectors
    #[arg(short, long)]
    pub limit: Option<usize>,

    #[command(flatten)]
    pub write: WriteArgs,
}

/// Arguments for inspecting a container
#[derive(Args, Debug, Clone)]
pub struct InspectArgs {
    /// Container directory
    #[arg(value_name = "CONTAINER")]
    pub container: PathBuf,
}

/// Output formats
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    /// Human-readable format
    Human,
    /// JSON format
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_radial_command() {
        let args = GroundTruthArgs::try_parse_from([
            "groundtruth",
            "radial",
            "data/in",
            "data/out",
            "0.5",
            "cosine",
            "--max-length",
            "100",
        ])
        .unwrap();

        if let Command::Radial(radial) = args.command {
            assert_eq!(radial.input, PathBuf::from("data/in"));
            assert_eq!(radial.output, PathBuf::from("data/out"));
            assert_eq!(radial.threshold, Some(0.5));
            assert_eq!(radial.metric.as_deref(), Some("cosine"));
            assert_eq!(radial.convention, None);
            assert_eq!(radial.max_length, Some(100));
            assert!(!radial.write.overwrite);
        } else {
            panic!("Expected Radial command");
        }
    }

    #[test]
    fn test_radial_negative_threshold() {
        let args = GroundTruthArgs::try_parse_from([
            "groundtruth",
            "radial",
            "in",
            "out",
            "-0.25",
            "inner_product",
            "faiss",
        ])
        .unwrap();

        if let Command::Radial(radial) = args.command {
            assert_eq!(radial.threshold, Some(-0.25));
            assert_eq!(radial.convention.as_deref(), Some("faiss"));
        } else {
            panic!("Expected Radial command");
        }
    }

    #[test]
    fn test_topk_command() {
        let args = GroundTruthArgs::try_parse_from([
            "groundtruth",
            "-vv",
            "topk",
            "in",
            "in",
            "inner_product",
            "lucene",
            "--rank",
            "9",
            "--overwrite",
        ])
        .unwrap();

        assert_eq!(args.verbosity(), 2);
        if let Command::TopK(topk) = args.command {
            assert_eq!(topk.rank, Some(9));
            assert_eq!(topk.convention.as_deref(), Some("lucene"));
            assert!(topk.write.overwrite);
        } else {
            panic!("Expected TopK command");
        }
    }

    #[test]
    fn test_missing_arguments_rejected() {
        assert!(GroundTruthArgs::try_parse_from(["groundtruth", "radial", "in", "out"]).is_err());
        assert!(GroundTruthArgs::try_parse_from(["groundtruth", "topk", "in"]).is_err());
        assert!(
            GroundTruthArgs::try_parse_from(["groundtruth", "radial", "in", "out", "abc", "l2"])
                .is_err()
        );
    }

    #[test]
    fn test_config_file_makes_positionals_optional() {
        let args =
            GroundTruthArgs::try_parse_from(["groundtruth", "radial", "in", "out", "-c", "r.json"])
                .unwrap();
        if let Command::Radial(radial) = args.command {
            assert_eq!(radial.threshold, None);
            assert_eq!(radial.metric, None);
        } else {
            panic!("Expected Radial command");
        }

        let args = GroundTruthArgs::try_parse_from([
            "groundtruth",
            "topk",
            "in",
            "out",
            "--config",
            "k.json",
        ])
        .unwrap();
        assert!(matches!(args.command, Command::TopK(topk) if topk.metric.is_none()));
    }

    #[test]
    fn test_import_command() {
        let args = GroundTruthArgs::try_parse_from([
            "groundtruth",
            "import",
            "sift_base.fvecs",
            "sift",
            "train",
            "--limit",
            "1000",
        ])
        .unwrap();

        if let Command::Import(import) = args.command {
            assert_eq!(import.key, "train");
            assert_eq!(import.limit, Some(1000));
            assert_eq!(import.format_hint, None);
        } else {
            panic!("Expected Import command");
        }
    }

    #[test]
    fn test_global_flags() {
        let args = GroundTruthArgs::try_parse_from([
            "groundtruth",
            "inspect",
            "sift",
            "--format",
            "json",
            "--pretty",
            "-q",
            "--threads",
            "4",
        ])
        .unwrap();

        assert_eq!(args.output_format, OutputFormat::Json);
        assert!(args.pretty);
        assert_eq!(args.verbosity(), 0);
        assert_eq!(args.threads, Some(4));
    }
}
