//! Node Space
//!
//! Hands out dense node indices for values and objects, memoized by source
//! key, and owns the merge relation produced by the optimizer and the solver.
//!
//! Two merge relations are kept apart:
//! - *content* merges (union-find): nodes whose points-to sets are equal share
//!   one representative set holder
//! - *location* merges: objects that always appear together in every
//!   points-to set are represented by one element inside those sets
//!
//! Functions are explicit records (`FunctionNodes`) keyed by their object node.

use super::union_find::UnionFind;
use crate::errors::{PtaError, Result};
use crate::features::points_to::domain::constraint::{Constraint, ConstraintKind};
use crate::features::points_to::domain::node::{
    is_special, FunctionNodes, NodeIndex, NodeInfo, FIRST_REGULAR_NODE, NULL_OBJECT, NULL_PTR,
    UNIVERSAL_OBJ, UNIVERSAL_PTR,
};
use rustc_hash::FxHashMap;
use tracing::debug;

/// Node allocator, key memo tables and merge relation
#[derive(Debug, Clone)]
pub struct NodeFactory {
    /// Metadata per node, indexed by `NodeIndex`
    nodes: Vec<NodeInfo>,

    /// Value namespace: key → node
    value_nodes: FxHashMap<String, NodeIndex>,

    /// Object namespace: key → node
    object_nodes: FxHashMap<String, NodeIndex>,

    /// Function records keyed by the function's object node
    functions: FxHashMap<NodeIndex, FunctionNodes>,

    /// Content merge relation
    merges: UnionFind,

    /// Location representative for merged objects (absent = itself)
    location_rep: FxHashMap<NodeIndex, NodeIndex>,

    /// Location representative → all objects it stands for (itself included)
    location_members: FxHashMap<NodeIndex, Vec<NodeIndex>>,
}

impl Default for NodeFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeFactory {
    /// Create a node space with the four special nodes pre-allocated
    pub fn new() -> Self {
        let mut factory = Self {
            nodes: Vec::new(),
            value_nodes: FxHashMap::default(),
            object_nodes: FxHashMap::default(),
            functions: FxHashMap::default(),
            merges: UnionFind::default(),
            location_rep: FxHashMap::default(),
            location_members: FxHashMap::default(),
        };

        let specials = [
            (UNIVERSAL_PTR, NodeInfo::value(Some("<universal-ptr>".to_string()))),
            (UNIVERSAL_OBJ, NodeInfo::object(Some("<universal-obj>".to_string()))),
            (NULL_PTR, NodeInfo::value(Some("<null-ptr>".to_string()))),
            (NULL_OBJECT, NodeInfo::object(Some("<null-obj>".to_string()))),
        ];
        for (index, info) in specials {
            let allocated = factory.alloc(info.synthetic());
            debug_assert_eq!(allocated, index);
        }
        debug_assert_eq!(factory.len(), FIRST_REGULAR_NODE as usize);
        factory
    }

    fn alloc(&mut self, info: NodeInfo) -> NodeIndex {
        let index = self.nodes.len() as NodeIndex;
        self.nodes.push(info);
        self.merges.make_set(index);
        index
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Creation and lookup
    // ═══════════════════════════════════════════════════════════════════════

    /// Value node for `key`, created on first request
    pub fn create_value_node(&mut self, key: &str) -> NodeIndex {
        if let Some(&index) = self.value_nodes.get(key) {
            return index;
        }
        let index = self.alloc(NodeInfo::value(Some(key.to_string())));
        self.value_nodes.insert(key.to_string(), index);
        index
    }

    /// Object node for `key`, created on first request
    pub fn create_object_node(&mut self, key: &str) -> NodeIndex {
        if let Some(&index) = self.object_nodes.get(key) {
            return index;
        }
        let index = self.alloc(NodeInfo::object(Some(key.to_string())));
        self.object_nodes.insert(key.to_string(), index);
        index
    }

    /// Fresh bookkeeping object; never memoized, never an allocation site
    pub fn create_synthetic_object(&mut self, label: &str) -> NodeIndex {
        self.alloc(NodeInfo::object(Some(label.to_string())).synthetic())
    }

    /// Fresh anonymous value node (temporaries, call results)
    pub fn create_temp_value(&mut self) -> NodeIndex {
        self.alloc(NodeInfo::value(None))
    }

    pub fn get_value_node_for(&self, key: &str) -> Option<NodeIndex> {
        self.value_nodes.get(key).copied()
    }

    pub fn get_object_node_for(&self, key: &str) -> Option<NodeIndex> {
        self.object_nodes.get(key).copied()
    }

    /// Source key a node was created for
    pub fn key_for(&self, index: NodeIndex) -> Option<&str> {
        self.nodes.get(index as usize).and_then(|n| n.key.as_deref())
    }

    pub fn info(&self, index: NodeIndex) -> Option<&NodeInfo> {
        self.nodes.get(index as usize)
    }

    /// Number of allocated nodes
    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Never true: the special nodes are always present
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Fail with `UnknownNode` unless `index` was handed out by this node space
    #[inline]
    pub fn check(&self, index: NodeIndex) -> Result<()> {
        if (index as usize) < self.nodes.len() {
            Ok(())
        } else {
            Err(PtaError::unknown_node(index, self.nodes.len()))
        }
    }

    /// Fail unless both operands exist and an ADDR_OF names an object
    pub fn check_constraint(&self, constraint: &Constraint) -> Result<()> {
        self.check(constraint.dst)?;
        self.check(constraint.src)?;
        if constraint.kind == ConstraintKind::AddrOf && !self.is_object(constraint.src) {
            return Err(PtaError::AddressOfValue { node: constraint.src });
        }
        Ok(())
    }

    #[inline]
    pub fn is_object(&self, index: NodeIndex) -> bool {
        self.nodes.get(index as usize).is_some_and(NodeInfo::is_object)
    }

    #[inline]
    pub fn universal_ptr(&self) -> NodeIndex {
        UNIVERSAL_PTR
    }

    #[inline]
    pub fn universal_obj(&self) -> NodeIndex {
        UNIVERSAL_OBJ
    }

    #[inline]
    pub fn null_ptr(&self) -> NodeIndex {
        NULL_PTR
    }

    #[inline]
    pub fn null_object(&self) -> NodeIndex {
        NULL_OBJECT
    }

    /// Objects standing for real allocation or definition sites
    pub fn allocation_sites(&self) -> Vec<NodeIndex> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(i, n)| n.is_object() && !n.synthetic && !is_special(*i as NodeIndex))
            .map(|(i, _)| i as NodeIndex)
            .collect()
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Functions
    // ═══════════════════════════════════════════════════════════════════════

    /// Record for function `key`, growing it to at least `arity` formals
    ///
    /// The function's object node is created if needed. `variadic` is sticky.
    pub fn declare_function(&mut self, key: &str, arity: usize, variadic: bool) -> &FunctionNodes {
        let base = self.create_object_node(key);
        let mut record = match self.functions.remove(&base) {
            Some(record) => record,
            None => {
                let ret = self.create_temp_value();
                let vararg = self.create_temp_value();
                debug!(function = key, base, ret, vararg, "Created function record");
                FunctionNodes {
                    base,
                    ret,
                    vararg,
                    args: Vec::new(),
                    variadic: false,
                }
            }
        };
        while record.args.len() < arity {
            let formal = self.create_temp_value();
            record.args.push(formal);
        }
        record.variadic |= variadic;
        self.functions.entry(base).or_insert(record)
    }

    pub fn get_return_node_for(&mut self, key: &str) -> NodeIndex {
        self.declare_function(key, 0, false).ret
    }

    pub fn get_vararg_node_for(&mut self, key: &str) -> NodeIndex {
        self.declare_function(key, 0, false).vararg
    }

    /// Formal `k` of function `key` (formals `0..=k` are created as needed)
    pub fn get_arg_node_for(&mut self, key: &str, k: usize) -> NodeIndex {
        let record = self.declare_function(key, k + 1, false);
        record.args[k]
    }

    /// Record for a function object node
    pub fn function_record(&self, base: NodeIndex) -> Option<&FunctionNodes> {
        self.functions.get(&base)
    }

    /// Like `function_record`, but a contract violation when absent
    pub fn expect_function(&self, base: NodeIndex) -> Result<&FunctionNodes> {
        self.check(base)?;
        self.functions.get(&base).ok_or(PtaError::NotAFunction(base))
    }

    pub fn is_function(&self, index: NodeIndex) -> bool {
        self.functions.contains_key(&index)
    }

    pub fn functions(&self) -> impl Iterator<Item = &FunctionNodes> {
        self.functions.values()
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Merge relation
    // ═══════════════════════════════════════════════════════════════════════

    /// Representative of `index`, compressing the chain
    #[inline]
    pub fn get_merge_target(&mut self, index: NodeIndex) -> NodeIndex {
        self.merges.find(index)
    }

    /// Representative of `index` without mutation
    ///
    /// Fails if `index` was never allocated or its chain does not terminate.
    pub fn merge_target(&self, index: NodeIndex) -> Result<NodeIndex> {
        self.check(index)?;
        self.merges
            .find_checked(index)
            .ok_or(PtaError::MergeChainCycle { index })
    }

    /// Merge the points-to set holder of `from` into that of `into`
    ///
    /// Returns false if they already share a representative.
    pub fn merge(&mut self, into: NodeIndex, from: NodeIndex) -> bool {
        let merged = self.merges.merge(into, from);
        if merged {
            debug!(into, from, "Merged nodes");
        }
        merged
    }

    /// Representative of every node, fully compressed
    pub fn merge_targets(&mut self) -> Vec<NodeIndex> {
        self.merges.roots()
    }

    /// Number of distinct representatives
    pub fn rep_count(&self) -> usize {
        self.merges.set_count()
    }

    /// Location representative of an object
    #[inline]
    pub fn location_rep(&self, object: NodeIndex) -> NodeIndex {
        self.location_rep.get(&object).copied().unwrap_or(object)
    }

    /// Make `into` stand for `from` (and everything `from` stood for) inside points-to sets
    pub fn merge_location(&mut self, into: NodeIndex, from: NodeIndex) -> bool {
        let into = self.location_rep(into);
        let from = self.location_rep(from);
        if into == from {
            return false;
        }

        let moved = self.location_members.remove(&from).unwrap_or_else(|| vec![from]);
        for &member in &moved {
            self.location_rep.insert(member, into);
        }
        self.location_members
            .entry(into)
            .or_insert_with(|| vec![into])
            .extend(moved);
        debug!(into, from, "Merged locations");
        true
    }

    /// Objects a location representative stands for
    pub fn location_members(&self, rep: NodeIndex) -> Vec<NodeIndex> {
        self.location_members
            .get(&rep)
            .cloned()
            .unwrap_or_else(|| vec![rep])
    }

    /// Location representatives that stand for more than one object
    pub fn location_classes(&self) -> &FxHashMap<NodeIndex, Vec<NodeIndex>> {
        &self.location_members
    }

    /// Forget all content and location merges
    pub fn reset_merges(&mut self) {
        self.merges.reset();
        self.location_rep.clear();
        self.location_members.clear();
    }
}
