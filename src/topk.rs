//! Rank-k threshold derivation from existing k-NN ground truth.
//!
//! The `neighbors` dataset is already ranked, so column `rank` holds each
//! query's (rank+1)-th nearest training vector. Its distance and score become
//! the per-query thresholds a benchmark harness compares against.

use std::time::Instant;

use log::{debug, info, warn};
use rayon::prelude::*;

use crate::config::TopKConfig;
use crate::dataset::Matrix;
use crate::error::{GroundTruthError, Result};
use crate::metric::MetricSpace;
use crate::stats::ScalarStats;

/// Per-query threshold series and their statistics.
#[derive(Debug, Clone)]
pub struct TopKOutput {
    /// N_query distances at the derivation rank.
    pub distances: Vec<f32>,
    /// Scores of `distances`, index aligned.
    pub scores: Vec<f32>,
    pub distance_stats: ScalarStats,
    pub score_stats: ScalarStats,
}

impl TopKOutput {
    /// Distances as an N_query x 1 column.
    pub fn distance_column(&self) -> Matrix<f32> {
        Matrix::column(self.distances.clone())
    }

    /// Scores as an N_query x 1 column.
    pub fn score_column(&self) -> Matrix<f32> {
        Matrix::column(self.scores.clone())
    }
}

/// Reads the neighbor at a fixed rank and evaluates it with a metric space.
#[derive(Debug, Clone)]
pub struct RankThresholdDeriver {
    space: MetricSpace,
    rank: usize,
    parallel: bool,
}

impl RankThresholdDeriver {
    pub fn new(space: MetricSpace, rank: usize) -> Self {
        RankThresholdDeriver {
            space,
            rank,
            parallel: true,
        }
    }

    pub fn from_config(config: &TopKConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(config.space()?, config.rank).with_parallel(config.parallel))
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Check that the three inputs line up before any distance is computed.
    fn check_shapes(
        &self,
        train: &Matrix<f32>,
        test: &Matrix<f32>,
        neighbors: &Matrix<i64>,
    ) -> Result<()> {
        if self.rank >= neighbors.cols() {
            return Err(GroundTruthError::rank_out_of_range(format!(
                "rank {} but neighbors has only {} columns",
                self.rank,
                neighbors.cols()
            )));
        }
        if neighbors.rows() != test.rows() {
            return Err(GroundTruthError::shape_mismatch(format!(
                "neighbors has {} rows, test has {}",
                neighbors.rows(),
                test.rows()
            )));
        }
        if train.cols() != test.cols() {
            return Err(GroundTruthError::shape_mismatch(format!(
                "training vectors have dimension {}, query vectors have {}",
                train.cols(),
                test.cols()
            )));
        }
        Ok(())
    }

    fn neighbor_at_rank(
        &self,
        neighbors: &Matrix<i64>,
        query: usize,
        n_train: usize,
    ) -> Result<usize> {
        let index = neighbors.row(query)[self.rank];
        usize::try_from(index)
            .ok()
            .filter(|&i| i < n_train)
            .ok_or_else(|| {
                GroundTruthError::shape_mismatch(format!(
                    "query {query}: neighbor index {index} at rank {} is outside 0..{n_train}",
                    self.rank
                ))
            })
    }

    /// Derive the per-query distance and score at the configured rank.
    pub fn derive(
        &self,
        train: &Matrix<f32>,
        test: &Matrix<f32>,
        neighbors: &Matrix<i64>,
    ) -> Result<TopKOutput> {
        self.check_shapes(train, test, neighbors)?;

        info!(
            "rank-k thresholds: {} queries, rank {}, metric={}",
            test.rows(),
            self.rank,
            self.space
        );
        let start = Instant::now();

        let run = |i: usize| -> Result<f32> {
            let index = self.neighbor_at_rank(neighbors, i, train.rows())?;
            let distance = self.space.distance(test.row(i), train.row(index))?;
            debug!("query {i}: neighbor {index} at distance {distance}");
            Ok(distance)
        };

        let distances: Vec<f32> = if self.parallel {
            (0..test.rows()).into_par_iter().map(run).collect::<Result<_>>()?
        } else {
            (0..test.rows()).map(run).collect::<Result<_>>()?
        };
        let scores = self.space.scores(&distances);

        let distance_stats = ScalarStats::from_values(&distances);
        let score_stats = ScalarStats::from_values(&scores);
        if distance_stats.nan_count > 0 {
            warn!(
                "{} rank-{} distances are NaN (zero-norm vector?)",
                distance_stats.nan_count, self.rank
            );
        }

        info!(
            "rank-k done in {:.2?}: distance mean {:.4} ({:.4}..{:.4}), score mean {:.4}",
            start.elapsed(),
            distance_stats.mean,
            distance_stats.min,
            distance_stats.max,
            score_stats.mean
        );

        Ok(TopKOutput {
            distances,
            scores,
            distance_stats,
            score_stats,
        })
    }
}

/// Per-query distances and scores at `rank` plus their statistics.
pub fn derive(
    train: &Matrix<f32>,
    test: &Matrix<f32>,
    neighbors: &Matrix<i64>,
    rank: usize,
    space: MetricSpace,
) -> Result<(Vec<f32>, Vec<f32>, ScalarStats, ScalarStats)> {
    let output = RankThresholdDeriver::new(space, rank).derive(train, test, neighbors)?;
    Ok((
        output.distances,
        output.scores,
        output.distance_stats,
        output.score_stats,
    ))
}
