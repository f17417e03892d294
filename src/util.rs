//! Shared utility modules used across segcore components.

pub mod bitset;
pub mod simd;
