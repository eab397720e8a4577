//! Node identities
//!
//! Every value-like entity (variables, call-ABI argument/return/vararg slots)
//! and every object-like entity (allocation sites, globals, functions) gets a
//! dense `NodeIndex`. Four special nodes are pre-allocated at fixed indices.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Dense node identifier
pub type NodeIndex = u32;

/// Universal pointer: may point to anything
pub const UNIVERSAL_PTR: NodeIndex = 0;
/// Universal object: escape sentinel, points to itself
pub const UNIVERSAL_OBJ: NodeIndex = 1;
/// Null pointer
pub const NULL_PTR: NodeIndex = 2;
/// Null object
pub const NULL_OBJECT: NodeIndex = 3;
/// Number of pre-allocated special nodes
pub const FIRST_REGULAR_NODE: NodeIndex = 4;

/// Role of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    /// Storage location holding a pointer
    Value,
    /// Abstract memory object
    Object,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Value => "value",
            NodeKind::Object => "object",
        }
    }
}

/// Per-node metadata kept by the node space
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub kind: NodeKind,

    /// Source entity identity (None for synthetic call-ABI slots)
    pub key: Option<String>,

    /// Bookkeeping node: solved like any other, never reported as an allocation site
    pub synthetic: bool,
}

impl NodeInfo {
    #[inline]
    pub fn value(key: Option<String>) -> Self {
        Self {
            kind: NodeKind::Value,
            key,
            synthetic: false,
        }
    }

    #[inline]
    pub fn object(key: Option<String>) -> Self {
        Self {
            kind: NodeKind::Object,
            key,
            synthetic: false,
        }
    }

    #[inline]
    pub fn synthetic(mut self) -> Self {
        self.synthetic = true;
        self
    }

    #[inline]
    pub fn is_object(&self) -> bool {
        self.kind == NodeKind::Object
    }
}

/// Is `index` one of the four pre-allocated special nodes?
#[inline]
pub fn is_special(index: NodeIndex) -> bool {
    index < FIRST_REGULAR_NODE
}

/// Function modeled as a struct of synthetic fields
///
/// `base` is the function's object node (its address-taken identity).
/// An indirect call `f(a, b)` becomes `COPY(args[0], a)`, `COPY(args[1], b)`
/// and `COPY(result, ret)` against whichever `base` flows into `f`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionNodes {
    pub base: NodeIndex,
    pub ret: NodeIndex,
    pub vararg: NodeIndex,
    pub args: Vec<NodeIndex>,
    pub variadic: bool,
}

impl FunctionNodes {
    /// Formal argument `k`, if already created
    #[inline]
    pub fn arg(&self, k: usize) -> Option<NodeIndex> {
        self.args.get(k).copied()
    }

    #[inline]
    pub fn arity(&self) -> usize {
        self.args.len()
    }

    /// Every node belonging to this function's call ABI
    pub fn slots(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        [self.ret, self.vararg].into_iter().chain(self.args.iter().copied())
    }

    /// COPY edges `(src, dst)` binding a call to this function
    ///
    /// Actual `k` flows into formal `k`; actuals past the declared formals flow
    /// into the vararg node. A formal with no pointer actual (missing, or
    /// `None`) receives the universal pointer. The return node flows into
    /// `result`.
    pub fn call_edges(
        &self,
        actuals: &[Option<NodeIndex>],
        result: Option<NodeIndex>,
    ) -> Vec<(NodeIndex, NodeIndex)> {
        let mut edges = Vec::with_capacity(self.args.len().max(actuals.len()) + 1);
        for (k, &formal) in self.args.iter().enumerate() {
            let src = actuals.get(k).copied().flatten().unwrap_or(UNIVERSAL_PTR);
            edges.push((src, formal));
        }
        for actual in actuals.iter().skip(self.args.len()).flatten() {
            edges.push((*actual, self.vararg));
        }
        if let Some(result) = result {
            edges.push((self.ret, result));
        }
        edges
    }
}

impl fmt::Display for FunctionNodes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fn#{} ret={} va={} args={:?}", self.base, self.ret, self.vararg, self.args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_special_indices_are_distinct() {
        let specials = [UNIVERSAL_PTR, UNIVERSAL_OBJ, NULL_PTR, NULL_OBJECT];
        for (i, a) in specials.iter().enumerate() {
            assert!(is_special(*a));
            for b in &specials[i + 1..] {
                assert_ne!(a, b);
            }
        }
        assert!(!is_special(FIRST_REGULAR_NODE));
    }

    #[test]
    fn test_call_edges() {
        let f = FunctionNodes {
            base: 10,
            ret: 11,
            vararg: 12,
            args: vec![13, 14],
            variadic: true,
        };

        // f(20, <int>, 21, 22) -> 30
        let edges = f.call_edges(&[Some(20), None, Some(21), Some(22)], Some(30));
        assert_eq!(edges, vec![(20, 13), (UNIVERSAL_PTR, 14), (21, 12), (22, 12), (11, 30)]);

        // f() with no result: both formals become universal
        let edges = f.call_edges(&[], None);
        assert_eq!(edges, vec![(UNIVERSAL_PTR, 13), (UNIVERSAL_PTR, 14)]);
        assert_eq!(f.slots().collect::<Vec<_>>(), vec![11, 12, 13, 14]);
    }

    #[test]
    fn test_node_info_builders() {
        let info = NodeInfo::object(Some("malloc@12".to_string())).synthetic();
        assert!(info.is_object());
        assert!(info.synthetic);
        assert_eq!(info.kind.as_str(), "object");
    }
}
