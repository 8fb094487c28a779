//! Output formatting for CLI commands.

use serde::Serialize;

use crate::cli::args::{GroundTruthArgs, OutputFormat};
use crate::error::{GroundTruthError, Result};
use crate::pipeline::{ImportReport, InspectReport, RadialRunReport, TopKRunReport};
use crate::stats::ScalarStats;

/// Reports that know how to print themselves for a terminal.
pub trait HumanOutput {
    fn print_human(&self);
}

/// Output a result in the specified format.
pub fn output_result<T: Serialize + HumanOutput>(
    message: &str,
    result: &T,
    args: &GroundTruthArgs,
) -> Result<()> {
    match args.output_format {
        OutputFormat::Human => {
            output_human(message, result, args);
            Ok(())
        }
        OutputFormat::Json => output_json(result, args),
    }
}

/// The failure line printed by the binary, in the chosen output format.
pub fn format_error(error: &GroundTruthError, format: OutputFormat) -> String {
    match format {
        OutputFormat::Human => format!("Error [{}]: {error}", error.kind_name()),
        OutputFormat::Json => serde_json::json!({
            "error": error.kind_name(),
            "message": error.to_string(),
        })
        .to_string(),
    }
}

/// Output in human-readable format.
fn output_human<T: HumanOutput>(message: &str, result: &T, args: &GroundTruthArgs) {
    if args.verbosity() == 0 {
        return;
    }
    println!("{message}");
    println!();
    result.print_human();
}

/// Output in JSON format.
fn output_json<T: Serialize>(result: &T, args: &GroundTruthArgs) -> Result<()> {
    let json = if args.pretty {
        serde_json::to_string_pretty(result)?
    } else {
        serde_json::to_string(result)?
    };

    println!("{json}");
    Ok(())
}

fn print_keys(label: &str, keys: &[String]) {
    if keys.is_empty() {
        println!("{label}: (none)");
    } else {
        println!("{label}: {}", keys.join(", "));
    }
}

fn print_scalar_stats(title: &str, stats: &ScalarStats) {
    println!();
    println!("{title}:");
    println!("  mean:   {:.6}", stats.mean);
    println!("  median: {:.6}", stats.median);
    println!("  min:    {:.6}", stats.min);
    println!("  max:    {:.6}", stats.max);
    println!("  std:    {:.6}", stats.std);
    if stats.nan_count > 0 {
        println!("  NaN:    {}", stats.nan_count);
    }
}

impl HumanOutput for RadialRunReport {
    fn print_human(&self) {
        println!("Radial Ground Truth:");
        println!("════════════════════");
        println!("Input: {}", self.input);
        println!("Output: {}", self.output);
        println!("Metric: {}", self.metric);
        println!("Threshold: {}", self.threshold);
        println!("Max length: {}", self.max_length);
        println!("Queries: {} (training vectors: {})", self.num_queries, self.num_train);

        println!();
        println!("Neighbors per query:");
        println!("  mean:   {:.2}", self.stats.mean);
        println!("  median: {}", self.stats.median);
        println!("  min:    {}", self.stats.min);
        println!("  max:    {}", self.stats.max);
        println!("  empty:  {}", self.stats.num_zero_neighbors);
        if self.nan_distances > 0 {
            println!("  NaN distances: {}", self.nan_distances);
        }

        println!();
        print_keys("Copied", &self.copied_keys);
        print_keys("Written", &self.written_keys);
        println!("Time: {}ms", self.duration_ms);
    }
}

impl HumanOutput for TopKRunReport {
    fn print_human(&self) {
        println!("Rank-k Thresholds:");
        println!("══════════════════");
        println!("Input: {}", self.input);
        println!("Output: {}", self.output);
        println!("Metric: {}", self.metric);
        println!("Rank: {}", self.rank);
        println!("Queries: {}", self.num_queries);

        print_scalar_stats("Distance", &self.distance_stats);
        print_scalar_stats("Score", &self.score_stats);

        println!();
        print_keys("Copied", &self.copied_keys);
        print_keys("Written", &self.written_keys);
        println!("Time: {}ms", self.duration_ms);
    }
}

impl HumanOutput for ImportReport {
    fn print_human(&self) {
        println!(
            "{} -> {}/{} ({}x{} {})",
            self.source, self.container, self.key, self.rows, self.cols, self.dtype
        );
    }
}

impl HumanOutput for InspectReport {
    fn print_human(&self) {
        println!("Container: {}", self.container);
        if self.datasets.is_empty() {
            println!("(no datasets)");
            return;
        }
        let width = self
            .datasets
            .iter()
            .map(|d| d.key.len())
            .max()
            .unwrap_or(0);
        for dataset in &self.datasets {
            println!(
                "  {:<width$}  {:>4}  {} x {}",
                dataset.key, dataset.dtype.name(), dataset.rows, dataset.cols
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_error_names_the_kind() {
        let error = GroundTruthError::rank_out_of_range("rank 99 >= 10 columns");
        assert_eq!(
            format_error(&error, OutputFormat::Human),
            "Error [RankOutOfRange]: Rank out of range: rank 99 >= 10 columns"
        );

        let json: serde_json::Value =
            serde_json::from_str(&format_error(&error, OutputFormat::Json)).unwrap();
        assert_eq!(json["error"], "RankOutOfRange");
        assert_eq!(json["message"], error.to_string());
    }
}
