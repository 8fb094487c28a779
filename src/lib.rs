//! # groundtruth
//!
//! Exact ground truth for approximate nearest neighbor benchmarks.
//!
//! ## Features
//!
//! - L2-squared, cosine and inner-product distances with SIMD kernels
//! - Faiss and Lucene inner-product sign conventions
//! - Radial (threshold) neighbor sets in a fixed-width padded matrix
//! - Rank-k distance and score thresholds from existing k-NN ground truth
//! - Keyed, checksummed dataset containers with copy-then-add output
//! - Parallel per-query computation on rayon
//!
//! ## Example
//!
//! ```
//! use groundtruth::dataset::Matrix;
//! use groundtruth::metric::MetricSpace;
//! use groundtruth::radial;
//!
//! # fn main() -> groundtruth::error::Result<()> {
//! let train = Matrix::from_rows(vec![vec![0.0f32, 0.0], vec![1.0, 0.0], vec![5.0, 5.0]])?;
//! let test = Matrix::from_rows(vec![vec![0.0f32, 0.0]])?;
//! let space = MetricSpace::parse("l2_squared", None)?;
//!
//! let (neighbors, stats) = radial::generate(&train, &test, space, 1.0, 4)?;
//! assert_eq!(neighbors.row(0), &[0, 1, -1, -1]);
//! assert_eq!(stats.max, 2);
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod dataset;
pub mod error;
pub mod metric;
pub mod pipeline;
pub mod radial;
pub mod stats;
pub mod storage;
pub mod topk;
pub mod util;

pub mod prelude {
    pub use crate::config::{OutputOptions, RadialConfig, TopKConfig};
    pub use crate::dataset::{DatasetContainer, Matrix};
    pub use crate::error::{GroundTruthError, Result};
    pub use crate::metric::{DistanceMetric, EngineConvention, MetricSpace};
    pub use crate::radial::{PaddedNeighborMatrix, RadialThresholdGenerator};
    pub use crate::stats::{NeighborCountStats, ScalarStats};
    pub use crate::topk::RankThresholdDeriver;
}

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
