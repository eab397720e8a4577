//! # Points-to Analysis
//!
//! Andersen-style inclusion-based pointer analysis: flow-, field- and
//! context-insensitive.
//! - **Node Space**: dense indices for values and objects, functions as
//!   records of call-ABI slots
//! - **Offline Optimizer**: pointer/location equivalence and COPY-cycle
//!   collapse before solving
//! - **Solver**: worklist with difference propagation, lazy cycle detection
//!   and on-the-fly binding of calls
//! - **Query API**: `points_to`, `allocation_sites`, `may_alias`, `must_alias`
//!
//! ## Academic References
//! - Andersen, L. O. "Program Analysis and Specialization for C" (PhD 1994)
//! - Hardekopf & Lin "The Ant and the Grasshopper" (PLDI 2007)
//! - Hardekopf & Lin "Exploiting Pointer and Location Equivalence" (SAS 2007)
//!
//! ## Usage
//! ```text
//! use pta_core::features::points_to::{PointsToAnalyzer, ConstraintSink};
//!
//! let mut analyzer = PointsToAnalyzer::new(PtaConfig::default())?;
//! let mut cx = analyzer.generation();
//! let (p, _) = cx.add_allocation("p", "malloc@3")?;
//! let q = cx.create_value_node("q");
//! cx.add_constraint(Constraint::copy(q, p))?;
//!
//! let graph = analyzer.solve()?;
//! assert!(graph.may_alias(p, q));
//! ```

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod ports;

// Re-exports for public API
pub use application::{GenerationContext, PointsToAnalyzer, SharedGeneration};
pub use domain::constraint::{CallSite, Constraint, ConstraintKind, ConstraintSet};
pub use domain::node::{FunctionNodes, NodeIndex, NodeKind};
pub use domain::points_to_graph::{PointsTo, PointsToGraph, SolveStats, SolveStatus};
pub use ports::{ConstraintSink, PointsToQuery};
// Re-export infrastructure (internal use - prefer application layer)
#[doc(hidden)]
pub use infrastructure::andersen_solver::AndersenSolver;
#[doc(hidden)]
pub use infrastructure::node_factory::NodeFactory;
#[doc(hidden)]
pub use infrastructure::sparse_bitmap::SparseBitmap;
