/*
 * pta-core - Inclusion-Based Points-to Analysis
 *
 * Feature-First Hexagonal Architecture:
 * - features/points_to/ : Node space, constraints, offline optimizer, solver, queries
 * - config/             : Presets, checks, YAML
 * - errors              : Crate error type
 *
 * Performance:
 * - Sparse bitmaps for points-to sets
 * - Offline graph reduction before solving
 * - Rayon for constraint deduplication
 */

#![allow(clippy::new_without_default)] // Default impl not always needed
#![allow(clippy::type_complexity)] // Grouping keys are tuples of vectors
#![allow(clippy::len_without_is_empty)] // Node space is never empty

// ═══════════════════════════════════════════════════════════════════════════
// Module Exports
// ═══════════════════════════════════════════════════════════════════════════

/// Configuration system
pub mod config;

/// Error types
pub mod errors;

/// Feature modules
pub mod features;

// ═══════════════════════════════════════════════════════════════════════════
// Re-exports for Public API
// ═══════════════════════════════════════════════════════════════════════════

pub use config::{ExternalPolicy, Preset, PtaConfig};
pub use errors::{PtaError, Result};
pub use features::points_to::{
    CallSite, Constraint, ConstraintKind, ConstraintSink, NodeIndex, PointsTo, PointsToAnalyzer,
    PointsToGraph, PointsToQuery, SharedGeneration, SolveStatus,
};
