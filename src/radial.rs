//! Radial threshold ground truth.
//!
//! For every query, all training vectors whose distance is at most the
//! threshold are collected, ordered by distance (ties keep training order),
//! cut to `max_length`, and stored left-justified in a fixed-width row padded
//! with [`SENTINEL`]. Truncation happens after sorting, so an over-full
//! result keeps exactly the `max_length` closest neighbors.

use std::cmp::Ordering;
use std::time::Instant;

use log::{debug, info, warn};
use rayon::prelude::*;

use crate::config::RadialConfig;
use crate::dataset::{Matrix, SENTINEL};
use crate::error::{GroundTruthError, Result};
use crate::metric::{MetricSpace, PreparedTraining};
use crate::stats::NeighborCountStats;

/// N_query x max_length neighbor indices, sentinel-padded on the right.
#[derive(Debug, Clone, PartialEq)]
pub struct PaddedNeighborMatrix {
    inner: Matrix<i64>,
}

impl PaddedNeighborMatrix {
    /// An all-sentinel matrix. Fails if `rows * width` overflows.
    pub fn new(rows: usize, width: usize) -> Result<Self> {
        Ok(PaddedNeighborMatrix {
            inner: Matrix::filled(rows, width, SENTINEL)?,
        })
    }

    /// Write one query's result into row `i`. Fails if the result is wider
    /// than the matrix.
    pub fn set_row(&mut self, i: usize, neighbors: &[usize]) -> Result<()> {
        let width = self.width();
        if neighbors.len() > width {
            return Err(GroundTruthError::shape_mismatch(format!(
                "{} neighbors do not fit a row of width {width}",
                neighbors.len()
            )));
        }
        let row = self.inner.row_mut(i);
        for (cell, &idx) in row.iter_mut().zip(neighbors) {
            *cell = idx as i64;
        }
        row[neighbors.len()..].fill(SENTINEL);
        Ok(())
    }

    pub fn rows(&self) -> usize {
        self.inner.rows()
    }

    pub fn width(&self) -> usize {
        self.inner.cols()
    }

    /// Full padded row `i`.
    pub fn row(&self, i: usize) -> &[i64] {
        self.inner.row(i)
    }

    /// The valid (non-sentinel) prefix of row `i`.
    pub fn neighbors(&self, i: usize) -> &[i64] {
        let row = self.inner.row(i);
        let len = row.iter().position(|&v| v == SENTINEL).unwrap_or(row.len());
        &row[..len]
    }

    /// True when every row is a run of valid indices followed only by
    /// sentinels.
    pub fn is_well_formed(&self) -> bool {
        self.inner.iter_rows().all(|row| {
            let valid = row.iter().position(|&v| v == SENTINEL).unwrap_or(row.len());
            row[..valid].iter().all(|&v| v >= 0) && row[valid..].iter().all(|&v| v == SENTINEL)
        })
    }

    pub fn as_matrix(&self) -> &Matrix<i64> {
        &self.inner
    }

    pub fn into_matrix(self) -> Matrix<i64> {
        self.inner
    }
}

/// Result of a radial run.
#[derive(Debug, Clone)]
pub struct RadialOutput {
    pub neighbors: PaddedNeighborMatrix,
    pub stats: NeighborCountStats,
    /// Distances that came out NaN (cosine against a zero vector). They never
    /// satisfy the threshold.
    pub nan_distances: usize,
}

/// Per-query outcome before padding.
struct QueryResult {
    indices: Vec<usize>,
    nan_distances: usize,
}

/// Generates the padded radial neighbor matrix.
#[derive(Debug, Clone)]
pub struct RadialThresholdGenerator {
    space: MetricSpace,
    threshold: f32,
    max_length: usize,
    parallel: bool,
}

impl RadialThresholdGenerator {
    pub fn new(space: MetricSpace, threshold: f32, max_length: usize) -> Self {
        RadialThresholdGenerator {
            space,
            threshold,
            max_length,
            parallel: true,
        }
    }

    /// Build from a validated config.
    pub fn from_config(config: &RadialConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(config.space()?, config.threshold, config.max_length)
            .with_parallel(config.parallel))
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn space(&self) -> MetricSpace {
        self.space
    }

    /// Ranked, truncated neighbors of a single query.
    pub fn query_neighbors(
        &self,
        query: &[f32],
        train: &PreparedTraining<'_>,
    ) -> Result<Vec<usize>> {
        Ok(self.rank_query(query, train)?.indices)
    }

    fn rank_query(&self, query: &[f32], train: &PreparedTraining<'_>) -> Result<QueryResult> {
        let distances = self.space.distances(query, train)?;

        let nan_distances = distances.iter().filter(|d| d.is_nan()).count();
        let mut indices: Vec<usize> = distances
            .iter()
            .enumerate()
            .filter(|&(_, &d)| d <= self.threshold)
            .map(|(i, _)| i)
            .collect();

        // Stable sort: equal distances keep ascending training order.
        indices.sort_by(|&a, &b| {
            distances[a]
                .partial_cmp(&distances[b])
                .unwrap_or(Ordering::Equal)
        });
        indices.truncate(self.max_length);

        Ok(QueryResult {
            indices,
            nan_distances,
        })
    }

    /// Run over every query row of `test`.
    pub fn generate(&self, train: &Matrix<f32>, test: &Matrix<f32>) -> Result<RadialOutput> {
        if self.max_length == 0 {
            return Err(GroundTruthError::invalid_config(
                "max_length must be at least 1",
            ));
        }
        if train.cols() != test.cols() {
            return Err(GroundTruthError::shape_mismatch(format!(
                "training vectors have dimension {}, query vectors have {}",
                train.cols(),
                test.cols()
            )));
        }
        // Sized before the scan; an oversized max_length fails here.
        let mut neighbors =
            PaddedNeighborMatrix::new(test.rows(), self.max_length).map_err(|_| {
                GroundTruthError::invalid_config(format!(
                    "max_length {} is too large for {} queries",
                    self.max_length,
                    test.rows()
                ))
            })?;
        if train.is_empty() {
            warn!("training set is empty; every query will have zero neighbors");
        }

        info!(
            "radial ground truth: {} queries x {} train, metric={}, threshold={}, max_length={}",
            test.rows(),
            train.rows(),
            self.space,
            self.threshold,
            self.max_length
        );
        let start = Instant::now();
        let prepared = self.space.prepare(train);

        let run = |i: usize| -> Result<QueryResult> {
            let result = self.rank_query(test.row(i), &prepared)?;
            if result.nan_distances > 0 {
                warn!(
                    "query {i}: {} distances are NaN (zero-norm vector?)",
                    result.nan_distances
                );
            }
            debug!("query {i} done: {} neighbors", result.indices.len());
            Ok(result)
        };

        let results: Vec<QueryResult> = if self.parallel {
            (0..test.rows()).into_par_iter().map(run).collect::<Result<_>>()?
        } else {
            (0..test.rows()).map(run).collect::<Result<_>>()?
        };

        for (i, result) in results.iter().enumerate() {
            neighbors.set_row(i, &result.indices)?;
        }

        let counts: Vec<usize> = results.iter().map(|r| r.indices.len()).collect();
        let stats = NeighborCountStats::from_counts(&counts);
        let nan_distances = results.iter().map(|r| r.nan_distances).sum();

        info!(
            "radial ground truth done in {:.2?}: mean {:.2}, median {}, min {}, max {}, empty {}",
            start.elapsed(),
            stats.mean,
            stats.median,
            stats.min,
            stats.max,
            stats.num_zero_neighbors
        );

        Ok(RadialOutput {
            neighbors,
            stats,
            nan_distances,
        })
    }
}

/// Compute the padded neighbor matrix and neighbor-count statistics.
pub fn generate(
    train: &Matrix<f32>,
    test: &Matrix<f32>,
    space: MetricSpace,
    threshold: f32,
    max_length: usize,
) -> Result<(PaddedNeighborMatrix, NeighborCountStats)> {
    let output = RadialThresholdGenerator::new(space, threshold, max_length).generate(train, test)?;
    Ok((output.neighbors, output.stats))
}
