//! Application layer for Points-to Analysis
//!
//! - **PointsToAnalyzer**: full pipeline plus incremental re-solve
//! - **GenerationContext** / **SharedGeneration**: constraint generation,
//!   single-writer or across worker threads

pub mod analyzer;
pub mod generation;

pub use analyzer::{special_constraints, PointsToAnalyzer};
pub use generation::{GenerationContext, SharedGeneration};
