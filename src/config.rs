//! Run configuration for the two pipelines.
//!
//! Configs are plain serde structs so they can be loaded from a JSON file and
//! then overridden by command-line values.

use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{GroundTruthError, Result};
use crate::metric::{DistanceMetric, EngineConvention, MetricSpace};
use crate::storage::StorageConfig;

/// Default width of the padded radial neighbor matrix.
pub const DEFAULT_MAX_LENGTH: usize = 10_000;

/// Default derivation rank: the 100th neighbor, 0-based.
pub const DEFAULT_RANK: usize = 99;

fn default_max_length() -> usize {
    DEFAULT_MAX_LENGTH
}

fn default_rank() -> usize {
    DEFAULT_RANK
}

fn default_parallel() -> bool {
    true
}

/// Configuration of a radial threshold run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RadialConfig {
    /// Inclusive distance cutoff.
    pub threshold: f32,

    /// Maximum neighbors kept per query (row width of the output).
    #[serde(default = "default_max_length")]
    pub max_length: usize,

    pub metric: DistanceMetric,

    /// Required when `metric` is inner product.
    #[serde(default)]
    pub convention: Option<EngineConvention>,

    /// Process queries on the rayon pool.
    #[serde(default = "default_parallel")]
    pub parallel: bool,
}

impl RadialConfig {
    pub fn new(
        threshold: f32,
        metric: DistanceMetric,
        convention: Option<EngineConvention>,
    ) -> Self {
        RadialConfig {
            threshold,
            max_length: DEFAULT_MAX_LENGTH,
            metric,
            convention,
            parallel: true,
        }
    }

    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = max_length;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// The metric space this config describes.
    pub fn space(&self) -> Result<MetricSpace> {
        MetricSpace::new(self.metric, self.convention)
    }

    pub fn validate(&self) -> Result<()> {
        if self.threshold.is_nan() {
            return Err(GroundTruthError::invalid_config("threshold must not be NaN"));
        }
        if self.max_length == 0 {
            return Err(GroundTruthError::invalid_config(
                "max_length must be at least 1",
            ));
        }
        self.space().map(|_| ())
    }
}

/// Configuration of a rank-k threshold run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopKConfig {
    /// 0-based column of the existing neighbor matrix to read.
    #[serde(default = "default_rank")]
    pub rank: usize,

    pub metric: DistanceMetric,

    #[serde(default)]
    pub convention: Option<EngineConvention>,

    #[serde(default = "default_parallel")]
    pub parallel: bool,
}

impl TopKConfig {
    pub fn new(metric: DistanceMetric, convention: Option<EngineConvention>) -> Self {
        TopKConfig {
            rank: DEFAULT_RANK,
            metric,
            convention,
            parallel: true,
        }
    }

    pub fn with_rank(mut self, rank: usize) -> Self {
        self.rank = rank;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn space(&self) -> Result<MetricSpace> {
        MetricSpace::new(self.metric, self.convention)
    }

    pub fn validate(&self) -> Result<()> {
        self.space().map(|_| ())
    }
}

/// Options controlling how results are written back.
#[derive(Debug, Clone, Default)]
pub struct OutputOptions {
    /// Replace existing output datasets instead of failing.
    pub overwrite: bool,

    pub storage: StorageConfig,
}

/// Load a JSON config file.
pub fn load_json<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<T> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|e| {
        GroundTruthError::invalid_config(format!("cannot read {}: {e}", path.display()))
    })?;
    Ok(serde_json::from_str(&text)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_radial_defaults() {
        let config = RadialConfig::new(1.5, DistanceMetric::L2Squared, None);
        assert_eq!(config.max_length, DEFAULT_MAX_LENGTH);
        assert!(config.parallel);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_radial_validation() {
        let zero_width = RadialConfig::new(1.0, DistanceMetric::Cosine, None).with_max_length(0);
        assert!(matches!(
            zero_width.validate(),
            Err(GroundTruthError::InvalidConfig(_))
        ));

        let nan = RadialConfig::new(f32::NAN, DistanceMetric::Cosine, None);
        assert!(nan.validate().is_err());

        let ip = RadialConfig::new(0.0, DistanceMetric::InnerProduct, None);
        assert!(matches!(
            ip.validate(),
            Err(GroundTruthError::UnsupportedMetric(_))
        ));
    }

    #[test]
    fn test_topk_defaults() {
        let config = TopKConfig::new(DistanceMetric::Cosine, None);
        assert_eq!(config.rank, 99);
        assert_eq!(config.with_rank(9).rank, 9);
    }

    #[test]
    fn test_load_json_applies_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("radial.json");
        fs::write(
            &path,
            r#"{"threshold": 0.25, "metric": "inner_product", "convention": "lucene"}"#,
        )
        .unwrap();

        let config: RadialConfig = load_json(&path).unwrap();
        assert_eq!(config.threshold, 0.25);
        assert_eq!(config.metric, DistanceMetric::InnerProduct);
        assert_eq!(config.convention, Some(EngineConvention::Lucene));
        assert_eq!(config.max_length, DEFAULT_MAX_LENGTH);
        assert!(config.parallel);
    }

    #[test]
    fn test_load_json_rejects_unknown_metric() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("topk.json");
        fs::write(&path, r#"{"metric": "hamming"}"#).unwrap();

        let result: Result<TopKConfig> = load_json(&path);
        assert!(matches!(result, Err(GroundTruthError::Json(_))));
    }
}
