//! Domain models for Points-to Analysis
//!
//! Core abstractions independent of the solving algorithm:
//! - Node: dense indices, special nodes, function records
//! - Constraint: ADDR_OF, COPY, LOAD, STORE and call sites
//! - PointsToGraph: solved relation and query surface

pub mod constraint;
pub mod node;
pub mod points_to_graph;

pub use constraint::{CallSite, Constraint, ConstraintKind, ConstraintSet};
pub use node::{
    FunctionNodes, NodeIndex, NodeInfo, NodeKind, FIRST_REGULAR_NODE, NULL_OBJECT, NULL_PTR,
    UNIVERSAL_OBJ, UNIVERSAL_PTR,
};
pub use points_to_graph::{GraphStats, PointsTo, PointsToGraph, SolveStats, SolveStatus};
