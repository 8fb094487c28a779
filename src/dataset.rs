//! Keyed dataset containers holding rectangular numeric arrays.
//!
//! A container maps dataset names (`train`, `test`, `neighbors`, ...) to
//! row-major matrices of `f32` vectors or `i64` indices. Containers are backed
//! by any [`Storage`](crate::storage::Storage); each dataset lives in its own
//! `<key>.ds` object.

pub mod container;
pub mod matrix;
pub mod vecs;

pub use container::{DatasetContainer, DatasetInfo, DType};
pub use matrix::Matrix;

/// Training vectors (N_train x D).
pub const TRAIN_KEY: &str = "train";
/// Query vectors (N_query x D).
pub const TEST_KEY: &str = "test";
/// Ranked k-NN ground truth (N_query x k).
pub const NEIGHBORS_KEY: &str = "neighbors";
/// Padded radial neighbor matrix written by the radial generator.
pub const RADIAL_NEIGHBORS_KEY: &str = "max_distance_neighbors";
/// Per-query distance at the derivation rank.
pub const TOPK_DISTANCE_KEY: &str = "max_distance_topk100";
/// Per-query score at the derivation rank.
pub const TOPK_SCORE_KEY: &str = "min_score_topk100";

/// Cell value marking an unused slot in a padded neighbor row.
pub const SENTINEL: i64 = -1;
