//! Error types for the groundtruth library.
//!
//! All failures are represented by [`GroundTruthError`]. The first four
//! variants form the run-level taxonomy reported to benchmark operators:
//! a missing dataset key, a dimensionality mismatch, an unsupported metric
//! (or a missing inner-product convention), and a rank beyond the available
//! neighbor columns. Every error aborts the current run; none are retried.
//!
//! # Examples
//!
//! ```
//! use groundtruth::error::{GroundTruthError, Result};
//!
//! fn example_operation() -> Result<()> {
//!     Err(GroundTruthError::missing_input("train"))
//! }
//!
//! match example_operation() {
//!     Ok(_) => println!("Success"),
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

use std::io;

use thiserror::Error;

/// The main error type for groundtruth operations.
#[derive(Error, Debug)]
pub enum GroundTruthError {
    /// A required dataset key is absent from the container.
    #[error("Missing input: {0}")]
    MissingInput(String),

    /// Training and query vectors (or neighbor rows) do not line up.
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    /// Metric name not recognized, or inner product without a convention.
    #[error("Unsupported metric: {0}")]
    UnsupportedMetric(String),

    /// Requested rank exceeds the available neighbor columns.
    #[error("Rank out of range: {0}")]
    RankOutOfRange(String),

    /// An output key would overwrite an existing dataset.
    #[error("Dataset already exists: {0}")]
    DatasetExists(String),

    /// Stored dataset failed header or checksum validation.
    #[error("Corrupted dataset: {0}")]
    Corrupted(String),

    /// Invalid run configuration (threshold, max length, thread count, ...).
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Storage-related errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error for other cases
    #[error("Error: {0}")]
    Other(String),
}

/// Result type alias for operations that may fail with GroundTruthError.
pub type Result<T> = std::result::Result<T, GroundTruthError>;

impl GroundTruthError {
    /// Create a new missing input error.
    pub fn missing_input<S: Into<String>>(key: S) -> Self {
        GroundTruthError::MissingInput(key.into())
    }

    /// Create a new shape mismatch error.
    pub fn shape_mismatch<S: Into<String>>(msg: S) -> Self {
        GroundTruthError::ShapeMismatch(msg.into())
    }

    /// Create a new unsupported metric error.
    pub fn unsupported_metric<S: Into<String>>(msg: S) -> Self {
        GroundTruthError::UnsupportedMetric(msg.into())
    }

    /// Create a new rank out of range error.
    pub fn rank_out_of_range<S: Into<String>>(msg: S) -> Self {
        GroundTruthError::RankOutOfRange(msg.into())
    }

    /// Create a new dataset exists error.
    pub fn dataset_exists<S: Into<String>>(key: S) -> Self {
        GroundTruthError::DatasetExists(key.into())
    }

    /// Create a new corrupted dataset error.
    pub fn corrupted<S: Into<String>>(msg: S) -> Self {
        GroundTruthError::Corrupted(msg.into())
    }

    /// Create a new invalid config error.
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        GroundTruthError::InvalidConfig(msg.into())
    }

    /// Create a new storage error.
    pub fn storage<S: Into<String>>(msg: S) -> Self {
        GroundTruthError::Storage(msg.into())
    }

    /// Create a new generic error.
    pub fn other<S: Into<String>>(msg: S) -> Self {
        GroundTruthError::Other(msg.into())
    }

    /// Short name of the error kind, printed on the binary's failure line.
    pub fn kind_name(&self) -> &'static str {
        match self {
            GroundTruthError::MissingInput(_) => "MissingInput",
            GroundTruthError::ShapeMismatch(_) => "ShapeMismatch",
            GroundTruthError::UnsupportedMetric(_) => "UnsupportedMetric",
            GroundTruthError::RankOutOfRange(_) => "RankOutOfRange",
            GroundTruthError::DatasetExists(_) => "DatasetExists",
            GroundTruthError::Corrupted(_) => "Corrupted",
            GroundTruthError::InvalidConfig(_) => "InvalidConfig",
            GroundTruthError::Storage(_) => "Storage",
            GroundTruthError::Io(_) => "Io",
            GroundTruthError::Json(_) => "Json",
            GroundTruthError::Other(_) => "Other",
        }
    }
}
