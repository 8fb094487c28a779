//! Distance metrics and engine sign conventions.
//!
//! Every distance produced here follows one rule: a smaller value means a
//! more similar pair. For inner product the raw dot product has to be
//! oriented first, and the two supported engines disagree on the sign; that
//! choice is captured once by [`EngineConvention`] inside a [`MetricSpace`]
//! rather than in each pipeline.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::dataset::Matrix;
use crate::error::{GroundTruthError, Result};
use crate::util::simd;

/// Distance metric used to compare vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    /// Sum of squared component differences.
    L2Squared,
    /// 1 - cosine similarity, in [0, 2].
    Cosine,
    /// Oriented dot product; sign set by the engine convention.
    InnerProduct,
}

impl DistanceMetric {
    /// Get the canonical name of this metric.
    pub fn name(&self) -> &'static str {
        match self {
            DistanceMetric::L2Squared => "l2_squared",
            DistanceMetric::Cosine => "cosine",
            DistanceMetric::InnerProduct => "inner_product",
        }
    }

    /// Parse a metric from its name or a common alias.
    pub fn parse_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "l2_squared" | "l2" | "l2sq" => Ok(DistanceMetric::L2Squared),
            "cosine" | "cosinesimil" => Ok(DistanceMetric::Cosine),
            "inner_product" | "innerproduct" | "ip" | "dot_product" => {
                Ok(DistanceMetric::InnerProduct)
            }
            _ => Err(GroundTruthError::unsupported_metric(format!(
                "'{s}' (expected one of l2_squared, cosine, inner_product)"
            ))),
        }
    }
}

impl FromStr for DistanceMetric {
    type Err = GroundTruthError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse_str(s)
    }
}

impl std::fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// How an engine orients inner-product distances.
///
/// `Faiss` reports `-dot` so that larger dot products become smaller
/// distances. `Lucene` reports `+dot` unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineConvention {
    Faiss,
    Lucene,
}

impl EngineConvention {
    pub fn name(&self) -> &'static str {
        match self {
            EngineConvention::Faiss => "faiss",
            EngineConvention::Lucene => "lucene",
        }
    }

    /// Parse a convention name. `producer_a` / `producer_b` are accepted as
    /// aliases for `faiss` / `lucene`.
    pub fn parse_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "faiss" | "producer_a" => Ok(EngineConvention::Faiss),
            "lucene" | "nmslib" | "producer_b" => Ok(EngineConvention::Lucene),
            _ => Err(GroundTruthError::unsupported_metric(format!(
                "unknown engine convention '{s}' (expected faiss or lucene)"
            ))),
        }
    }

    /// Orient a raw dot product into a distance.
    #[inline]
    pub fn orient(&self, dot: f32) -> f32 {
        match self {
            EngineConvention::Faiss => -dot,
            EngineConvention::Lucene => dot,
        }
    }
}

impl FromStr for EngineConvention {
    type Err = GroundTruthError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse_str(s)
    }
}

impl std::fmt::Display for EngineConvention {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A metric together with the convention needed to evaluate it.
///
/// Construction fails with `UnsupportedMetric` when the metric is inner
/// product and no convention is given. Conventions passed with other metrics
/// are kept but have no effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricSpace {
    metric: DistanceMetric,
    convention: Option<EngineConvention>,
}

impl MetricSpace {
    pub fn new(metric: DistanceMetric, convention: Option<EngineConvention>) -> Result<Self> {
        if metric == DistanceMetric::InnerProduct && convention.is_none() {
            return Err(GroundTruthError::unsupported_metric(
                "inner_product requires an engine convention (faiss or lucene)",
            ));
        }
        Ok(MetricSpace { metric, convention })
    }

    /// Parse metric and optional convention names.
    pub fn parse(metric: &str, convention: Option<&str>) -> Result<Self> {
        let metric = DistanceMetric::parse_str(metric)?;
        let convention = convention.map(EngineConvention::parse_str).transpose()?;
        Self::new(metric, convention)
    }

    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    pub fn convention(&self) -> Option<EngineConvention> {
        self.convention
    }

    fn ip_convention(&self) -> EngineConvention {
        // Checked in `new`; the fallback is unreachable.
        self.convention.unwrap_or(EngineConvention::Faiss)
    }

    /// Distance between two vectors of equal length.
    pub fn distance(&self, a: &[f32], b: &[f32]) -> Result<f32> {
        if a.len() != b.len() {
            return Err(GroundTruthError::shape_mismatch(format!(
                "vector dimensions differ: {} vs {}",
                a.len(),
                b.len()
            )));
        }

        Ok(match self.metric {
            DistanceMetric::L2Squared => simd::l2_squared(a, b),
            DistanceMetric::Cosine => {
                cosine_distance(simd::dot(a, b), simd::norm(a), simd::norm(b))
            }
            DistanceMetric::InnerProduct => self.ip_convention().orient(simd::dot(a, b)),
        })
    }

    /// Precompute per-row data for repeated distance computations against
    /// `train`.
    pub fn prepare<'a>(&self, train: &'a Matrix<f32>) -> PreparedTraining<'a> {
        let norms = match self.metric {
            DistanceMetric::Cosine => Some(train.iter_rows().map(simd::norm).collect()),
            _ => None,
        };
        PreparedTraining { matrix: train, norms }
    }

    /// Distance vector from `query` to every row of the training set, index
    /// aligned with the training rows.
    pub fn distances(&self, query: &[f32], train: &PreparedTraining<'_>) -> Result<Vec<f32>> {
        if query.len() != train.dimension() {
            return Err(GroundTruthError::shape_mismatch(format!(
                "query has dimension {}, training vectors have {}",
                query.len(),
                train.dimension()
            )));
        }

        let rows = train.matrix.iter_rows();
        Ok(match (self.metric, &train.norms) {
            (DistanceMetric::L2Squared, _) => rows.map(|t| simd::l2_squared(query, t)).collect(),
            (DistanceMetric::Cosine, norms) => {
                let query_norm = simd::norm(query);
                rows.enumerate()
                    .map(|(i, t)| {
                        let t_norm = norms.as_ref().map_or_else(|| simd::norm(t), |n| n[i]);
                        cosine_distance(simd::dot(query, t), query_norm, t_norm)
                    })
                    .collect()
            }
            (DistanceMetric::InnerProduct, _) => {
                let convention = self.ip_convention();
                rows.map(|t| convention.orient(simd::dot(query, t))).collect()
            }
        })
    }

    /// Map a distance to a similarity score for reporting.
    ///
    /// - l2_squared: `1 / (1 + d)`
    /// - cosine: `(2 - d) / 2`
    /// - inner_product, faiss: `1 / (1 + d)` when `d >= 0`, else `1 - d`
    /// - inner_product, lucene: `1 + d` when `d > 0`, else `1 / (1 - d)`
    pub fn score(&self, distance: f32) -> f32 {
        match self.metric {
            DistanceMetric::L2Squared => 1.0 / (1.0 + distance),
            DistanceMetric::Cosine => (2.0 - distance) / 2.0,
            DistanceMetric::InnerProduct => match self.ip_convention() {
                EngineConvention::Faiss => {
                    if distance >= 0.0 {
                        1.0 / (1.0 + distance)
                    } else {
                        1.0 - distance
                    }
                }
                EngineConvention::Lucene => {
                    if distance > 0.0 {
                        1.0 + distance
                    } else {
                        1.0 / (1.0 - distance)
                    }
                }
            },
        }
    }

    /// Scores for a whole distance vector.
    pub fn scores(&self, distances: &[f32]) -> Vec<f32> {
        distances.iter().map(|&d| self.score(d)).collect()
    }
}

impl std::fmt::Display for MetricSpace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.metric, self.convention) {
            (DistanceMetric::InnerProduct, Some(c)) => write!(f, "inner_product/{c}"),
            (metric, _) => write!(f, "{metric}"),
        }
    }
}

/// Training matrix plus cached per-row norms (cosine only).
#[derive(Debug)]
pub struct PreparedTraining<'a> {
    matrix: &'a Matrix<f32>,
    norms: Option<Vec<f32>>,
}

impl PreparedTraining<'_> {
    pub fn len(&self) -> usize {
        self.matrix.rows()
    }

    pub fn is_empty(&self) -> bool {
        self.matrix.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.matrix.cols()
    }

    pub fn row(&self, i: usize) -> &[f32] {
        self.matrix.row(i)
    }
}

/// `1 - dot / (|a| |b|)`. A zero norm yields NaN or an infinity; the caller
/// decides how to report it.
#[inline]
fn cosine_distance(dot: f32, norm_a: f32, norm_b: f32) -> f32 {
    1.0 - dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn space(metric: DistanceMetric, convention: Option<EngineConvention>) -> MetricSpace {
        MetricSpace::new(metric, convention).unwrap()
    }

    #[test]
    fn test_parse_metric_names() {
        assert_eq!(
            DistanceMetric::parse_str("l2_squared").unwrap(),
            DistanceMetric::L2Squared
        );
        assert_eq!(
            "COSINE".parse::<DistanceMetric>().unwrap(),
            DistanceMetric::Cosine
        );
        assert_eq!(
            DistanceMetric::parse_str("innerproduct").unwrap(),
            DistanceMetric::InnerProduct
        );
        assert!(matches!(
            DistanceMetric::parse_str("hamming"),
            Err(GroundTruthError::UnsupportedMetric(_))
        ));
    }

    #[test]
    fn test_parse_convention_aliases() {
        assert_eq!(
            EngineConvention::parse_str("producer_a").unwrap(),
            EngineConvention::Faiss
        );
        assert_eq!(
            EngineConvention::parse_str("Lucene").unwrap(),
            EngineConvention::Lucene
        );
        assert!(EngineConvention::parse_str("annoy").is_err());
    }

    #[test]
    fn test_inner_product_requires_convention() {
        assert!(matches!(
            MetricSpace::new(DistanceMetric::InnerProduct, None),
            Err(GroundTruthError::UnsupportedMetric(_))
        ));
        assert!(MetricSpace::parse("cosine", None).is_ok());
        assert!(MetricSpace::parse("inner_product", Some("faiss")).is_ok());
        assert!(MetricSpace::parse("inner_product", Some("bogus")).is_err());
    }

    #[test]
    fn test_self_distance_is_minimum() {
        let v = [0.3f32, -1.2, 2.5, 0.0];
        let others = [[1.0f32, 0.0, 0.0, 0.0], [0.3, -1.2, 2.4, 0.1], [-0.3, 1.2, -2.5, 0.0]];

        let l2 = space(DistanceMetric::L2Squared, None);
        assert_eq!(l2.distance(&v, &v).unwrap(), 0.0);

        let cos = space(DistanceMetric::Cosine, None);
        let self_cos = cos.distance(&v, &v).unwrap();
        assert!(self_cos.abs() < 1e-6);
        for o in &others {
            assert!(cos.distance(&v, o).unwrap() >= self_cos - 1e-6);
        }

        // Among vectors of equal norm, faiss inner product is minimized by the
        // vector itself: -|v|^2.
        let ip = space(DistanceMetric::InnerProduct, Some(EngineConvention::Faiss));
        let self_ip = ip.distance(&v, &v).unwrap();
        let norm_sq: f32 = v.iter().map(|x| x * x).sum();
        assert!((self_ip + norm_sq).abs() < 1e-5);
        let flipped = [-0.3f32, 1.2, -2.5, 0.0];
        assert!(ip.distance(&v, &flipped).unwrap() > self_ip);
    }

    #[test]
    fn test_inner_product_sign_convention() {
        let a = [1.0f32, 2.0];
        let b = [3.0f32, 4.0];
        let faiss = space(DistanceMetric::InnerProduct, Some(EngineConvention::Faiss));
        let lucene = space(DistanceMetric::InnerProduct, Some(EngineConvention::Lucene));

        assert_eq!(faiss.distance(&a, &b).unwrap(), -11.0);
        assert_eq!(lucene.distance(&a, &b).unwrap(), 11.0);
    }

    #[test]
    fn test_cosine_zero_norm_is_not_masked() {
        let cos = space(DistanceMetric::Cosine, None);
        let d = cos.distance(&[0.0, 0.0], &[1.0, 0.0]).unwrap();
        assert!(d.is_nan());
    }

    #[test]
    fn test_dimension_mismatch() {
        let l2 = space(DistanceMetric::L2Squared, None);
        assert!(matches!(
            l2.distance(&[1.0, 2.0], &[1.0]),
            Err(GroundTruthError::ShapeMismatch(_))
        ));

        let train = Matrix::from_rows(vec![vec![1.0f32, 2.0, 3.0]]).unwrap();
        let prepared = l2.prepare(&train);
        assert!(matches!(
            l2.distances(&[1.0, 2.0], &prepared),
            Err(GroundTruthError::ShapeMismatch(_))
        ));
    }

    #[test]
    fn test_distances_match_pairwise() {
        let train = Matrix::from_rows(vec![
            vec![0.0f32, 0.0],
            vec![1.0, 0.0],
            vec![0.0, 1.0],
            vec![5.0, 5.0],
        ])
        .unwrap();
        let query = [0.5f32, 0.25];

        for s in [
            space(DistanceMetric::L2Squared, None),
            space(DistanceMetric::Cosine, None),
            space(DistanceMetric::InnerProduct, Some(EngineConvention::Faiss)),
            space(DistanceMetric::InnerProduct, Some(EngineConvention::Lucene)),
        ] {
            let prepared = s.prepare(&train);
            let batch = s.distances(&query, &prepared).unwrap();
            assert_eq!(batch.len(), train.rows());
            for (i, d) in batch.iter().enumerate() {
                let single = s.distance(&query, train.row(i)).unwrap();
                if d.is_nan() {
                    assert!(single.is_nan());
                } else {
                    assert!((d - single).abs() < 1e-6, "{s} row {i}");
                }
            }
        }
    }

    #[test]
    fn test_standard_scores() {
        let l2 = space(DistanceMetric::L2Squared, None);
        assert_eq!(l2.score(0.0), 1.0);
        assert_eq!(l2.score(1.0), 0.5);

        let cos = space(DistanceMetric::Cosine, None);
        assert_eq!(cos.score(0.0), 1.0);
        assert_eq!(cos.score(2.0), 0.0);
        assert_eq!(cos.scores(&[1.0, 0.5]), vec![0.5, 0.75]);
    }

    #[test]
    fn test_inner_product_scores_around_zero() {
        let faiss = space(DistanceMetric::InnerProduct, Some(EngineConvention::Faiss));
        assert_eq!(faiss.score(0.0), 1.0);
        assert_eq!(faiss.score(3.0), 0.25);
        assert_eq!(faiss.score(-3.0), 4.0);

        let lucene = space(DistanceMetric::InnerProduct, Some(EngineConvention::Lucene));
        assert_eq!(lucene.score(0.0), 1.0);
        assert_eq!(lucene.score(3.0), 4.0);
        assert_eq!(lucene.score(-3.0), 0.25);
    }

    #[test]
    fn test_display() {
        assert_eq!(space(DistanceMetric::Cosine, None).to_string(), "cosine");
        assert_eq!(
            space(DistanceMetric::InnerProduct, Some(EngineConvention::Lucene)).to_string(),
            "inner_product/lucene"
        );
    }
}
