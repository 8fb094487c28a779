//! Vectorized numeric kernels built on the `wide` crate.
//!
//! Each kernel walks the inputs eight lanes at a time with `f32x8` and folds
//! the remainder with scalar arithmetic. Callers guarantee equal lengths.

use wide::f32x8;

const LANES: usize = 8;

#[inline]
fn load(chunk: &[f32]) -> f32x8 {
    let mut lanes = [0.0f32; LANES];
    lanes.copy_from_slice(chunk);
    f32x8::new(lanes)
}

#[inline]
fn horizontal_sum(v: f32x8) -> f32 {
    v.to_array().iter().sum()
}

/// Dot product of two equal-length slices.
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());

    let a_chunks = a.chunks_exact(LANES);
    let b_chunks = b.chunks_exact(LANES);
    let a_rem = a_chunks.remainder();
    let b_rem = b_chunks.remainder();

    let mut acc = f32x8::splat(0.0);
    for (x, y) in a_chunks.zip(b_chunks) {
        acc = acc + load(x) * load(y);
    }

    let tail: f32 = a_rem.iter().zip(b_rem).map(|(x, y)| x * y).sum();
    horizontal_sum(acc) + tail
}

/// Squared Euclidean distance of two equal-length slices.
pub fn l2_squared(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());

    let a_chunks = a.chunks_exact(LANES);
    let b_chunks = b.chunks_exact(LANES);
    let a_rem = a_chunks.remainder();
    let b_rem = b_chunks.remainder();

    let mut acc = f32x8::splat(0.0);
    for (x, y) in a_chunks.zip(b_chunks) {
        let diff = load(x) - load(y);
        acc = acc + diff * diff;
    }

    let tail: f32 = a_rem
        .iter()
        .zip(b_rem)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum();
    horizontal_sum(acc) + tail
}

/// Euclidean norm.
pub fn norm(a: &[f32]) -> f32 {
    dot(a, a).sqrt()
}

/// Scalar reference implementations.
pub mod scalar {
    pub fn dot(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    pub fn l2_squared(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum()
    }
}
