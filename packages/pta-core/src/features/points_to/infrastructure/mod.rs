//! Infrastructure layer for Points-to Analysis
//!
//! - **SparseBitmap**: block-sparse points-to sets
//! - **UnionFind**: merge relation with caller-chosen representatives
//! - **NodeFactory**: node space (allocation, key memo, function records)
//! - **SccDetector**: iterative Tarjan
//! - **OfflineOptimizer**: cycle collapse, pointer and location equivalence
//! - **AndersenSolver**: worklist solver with lazy cycle detection

pub mod andersen_solver;
pub mod node_factory;
pub mod offline_optimizer;
pub mod scc_detector;
pub mod sparse_bitmap;
pub mod union_find;

pub use andersen_solver::{AndersenConfig, AndersenSolver, AndersenStats};
pub use node_factory::NodeFactory;
pub use offline_optimizer::{OfflineOptimizer, OptimizeStats};
pub use scc_detector::{tarjan_scc, SccResult};
pub use sparse_bitmap::SparseBitmap;
pub use union_find::UnionFind;
