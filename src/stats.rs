//! Run statistics.
//!
//! Statistics are reductions over the complete per-query sequence, computed
//! once after every row exists. Nothing is accumulated while rows are being
//! produced, so parallel and sequential runs report the same numbers.

use serde::{Deserialize, Serialize};

/// Aggregates over the neighbor-set sizes of a radial run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeighborCountStats {
    /// Number of queries.
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub min: usize,
    pub max: usize,
    /// Queries with no neighbor inside the threshold.
    pub num_zero_neighbors: usize,
}

impl NeighborCountStats {
    /// Reduce a sequence of per-query result sizes. An empty sequence yields
    /// all-zero statistics.
    pub fn from_counts(counts: &[usize]) -> Self {
        if counts.is_empty() {
            return NeighborCountStats {
                count: 0,
                mean: 0.0,
                median: 0.0,
                min: 0,
                max: 0,
                num_zero_neighbors: 0,
            };
        }

        let values: Vec<f64> = counts.iter().map(|&c| c as f64).collect();

        NeighborCountStats {
            count: counts.len(),
            mean: mean(&values),
            median: median(values),
            min: counts.iter().copied().min().unwrap_or(0),
            max: counts.iter().copied().max().unwrap_or(0),
            num_zero_neighbors: counts.iter().filter(|&&c| c == 0).count(),
        }
    }
}

/// Aggregates over one per-query scalar series of a rank-k run.
///
/// NaN entries (for example cosine distances against zero vectors) are
/// counted in `nan_count` and left out of the other aggregates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalarStats {
    /// Number of values, NaNs included.
    pub count: usize,
    pub nan_count: usize,
    pub mean: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
    /// Population standard deviation.
    pub std: f64,
}

impl ScalarStats {
    pub fn from_values(values: &[f32]) -> Self {
        let finite: Vec<f64> = values
            .iter()
            .filter(|v| !v.is_nan())
            .map(|&v| v as f64)
            .collect();
        let nan_count = values.len() - finite.len();

        if finite.is_empty() {
            return ScalarStats {
                count: values.len(),
                nan_count,
                mean: 0.0,
                median: 0.0,
                min: 0.0,
                max: 0.0,
                std: 0.0,
            };
        }

        let mean = mean(&finite);
        let variance =
            finite.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / finite.len() as f64;
        let min = finite.iter().copied().fold(f64::INFINITY, f64::min);
        let max = finite.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        ScalarStats {
            count: values.len(),
            nan_count,
            mean,
            median: median(finite),
            min,
            max,
            std: variance.sqrt(),
        }
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Median of a non-empty sequence; the two middle values are averaged when
/// the length is even.
fn median(mut values: Vec<f64>) -> f64 {
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}
