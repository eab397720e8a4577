//! Error types for pta-core
//!
//! Contract violations (indices that were never allocated, merge chains that
//! do not terminate) are reported here. "Not found" lookups are `Option`s,
//! and "unknown" points-to results are a query outcome, not an error.

use crate::config::error::ConfigError;
use crate::features::points_to::domain::node::NodeIndex;
use thiserror::Error;

/// Main error type for pta-core operations
#[derive(Debug, Error)]
pub enum PtaError {
    /// A node index that the node space never handed out
    #[error("Unknown node index {index} (only {allocated} nodes allocated)")]
    UnknownNode { index: NodeIndex, allocated: usize },

    /// Following representatives from `index` did not reach a fixed point
    #[error("Merge chain starting at node {index} does not terminate")]
    MergeChainCycle { index: NodeIndex },

    /// ADDR_OF whose location is a value node; only objects have addresses
    #[error("Address of node {node} taken, but it is not an object")]
    AddressOfValue { node: NodeIndex },

    /// A function record was requested for a node that is not a function object
    #[error("Node {0} is not a function object")]
    NotAFunction(NodeIndex),

    /// A query was issued before any solve completed
    #[error("Points-to graph queried before solving")]
    NotSolved,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON export error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PtaError {
    /// Create an unknown-node error
    pub fn unknown_node(index: NodeIndex, allocated: usize) -> Self {
        PtaError::UnknownNode { index, allocated }
    }
}

/// Result type alias for pta-core operations
pub type Result<T> = std::result::Result<T, PtaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = PtaError::unknown_node(42, 10);
        assert_eq!(
            err.to_string(),
            "Unknown node index 42 (only 10 nodes allocated)"
        );

        let err = PtaError::MergeChainCycle { index: 7 };
        assert!(err.to_string().contains("does not terminate"));
    }

    #[test]
    fn test_config_error_conversion() {
        let err: PtaError = ConfigError::PointerSize(3).into();
        assert!(matches!(err, PtaError::Config(_)));
    }
}
