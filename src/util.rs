//! Shared utility modules.

pub mod simd;
