//! Benchmark support crate for gradflip.
//!
//! Provides seeded attack scenarios and parameter types used by the
//! Criterion benchmarks for the surrogate gradient and the full attack loop.

pub mod error;
pub mod params;
pub mod scenario;
