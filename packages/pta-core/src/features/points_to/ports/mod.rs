//! Ports (Interfaces) for Points-to Analysis
//!
//! - **ConstraintSink** (inbound): what a constraint-generation front end
//!   needs: node creation, function records, constraint append. Call-site
//!   and symbol helpers are provided on top of the required methods.
//! - **PointsToQuery** (outbound): read-only questions asked after a solve.
//!
//! # Example (Generic - Zero-cost)
//! ```ignore
//! fn lower_assignment<S: ConstraintSink>(sink: &mut S) -> Result<()> {
//!     let (p, _) = sink.add_allocation("p", "malloc@12")?;
//!     let q = sink.create_value_node("q");
//!     sink.add_constraint(Constraint::copy(q, p))
//! }
//! ```

use crate::config::ExternalPolicy;
use crate::errors::Result;
use crate::features::points_to::domain::constraint::{CallSite, Constraint};
use crate::features::points_to::domain::node::{FunctionNodes, NodeIndex, UNIVERSAL_OBJ};
use crate::features::points_to::domain::points_to_graph::{PointsTo, PointsToGraph};

// ============================================================================
// Inbound
// ============================================================================

/// Receiver of nodes and constraints during generation
pub trait ConstraintSink {
    /// Value node for `key` (idempotent)
    fn create_value_node(&mut self, key: &str) -> NodeIndex;

    /// Object node for `key` (idempotent)
    fn create_object_node(&mut self, key: &str) -> NodeIndex;

    /// Fresh bookkeeping object, never reported as an allocation site
    fn create_synthetic_object(&mut self, label: &str) -> NodeIndex;

    /// Fresh anonymous value node
    fn create_temp_value(&mut self) -> NodeIndex;

    /// Function record for `key`, grown to at least `arity` formals
    fn declare_function(&mut self, key: &str, arity: usize, variadic: bool) -> FunctionNodes;

    /// Append one constraint; both operands must be allocated nodes
    fn add_constraint(&mut self, constraint: Constraint) -> Result<()>;

    /// Append one indirect call site; every operand must be an allocated node
    fn add_call_site(&mut self, call: CallSite) -> Result<()>;

    /// What undefined symbols point to
    fn external_policy(&self) -> ExternalPolicy;

    // ------------------------------------------------------------------------
    // Provided helpers
    // ------------------------------------------------------------------------

    fn return_node(&mut self, function: &str) -> NodeIndex {
        self.declare_function(function, 0, false).ret
    }

    fn vararg_node(&mut self, function: &str) -> NodeIndex {
        self.declare_function(function, 0, false).vararg
    }

    fn arg_node(&mut self, function: &str, k: usize) -> NodeIndex {
        let record = self.declare_function(function, k + 1, false);
        record.args[k]
    }

    /// Global `key`: its symbol points to its storage
    ///
    /// Storage of a global defined elsewhere holds whatever the outside world
    /// put there, so under `ExternalPolicy::Universal` it also receives the
    /// universal object's contents. Returns (value, object).
    fn add_global(&mut self, key: &str, has_definition: bool) -> Result<(NodeIndex, NodeIndex)> {
        let value = self.create_value_node(key);
        let object = self.create_object_node(key);
        self.add_constraint(Constraint::addr_of(value, object))?;
        if !has_definition && self.external_policy() == ExternalPolicy::Universal {
            self.add_constraint(Constraint::copy(object, UNIVERSAL_OBJ))?;
        }
        Ok((value, object))
    }

    /// Function `key`: its symbol points to the function object
    fn add_function(&mut self, key: &str, arity: usize, variadic: bool) -> Result<FunctionNodes> {
        let value = self.create_value_node(key);
        let function = self.declare_function(key, arity, variadic);
        self.add_constraint(Constraint::addr_of(value, function.base))?;
        Ok(function)
    }

    /// `value_key = &site_key`; returns (value, object)
    fn add_allocation(&mut self, value_key: &str, site_key: &str) -> Result<(NodeIndex, NodeIndex)> {
        let value = self.create_value_node(value_key);
        let object = self.create_object_node(site_key);
        self.add_constraint(Constraint::addr_of(value, object))?;
        Ok((value, object))
    }

    /// `result = callee(actuals...)` with a statically known callee
    ///
    /// Recorded as a call site through a pointer that holds only the callee,
    /// so formals declared after this call are still bound when solving.
    /// Returns the callee pointer.
    fn add_direct_call(
        &mut self,
        callee: &str,
        actuals: &[Option<NodeIndex>],
        result: Option<NodeIndex>,
    ) -> Result<NodeIndex> {
        let function = self.declare_function(callee, 0, false);
        let callee_ptr = self.create_temp_value();
        self.add_constraint(Constraint::addr_of(callee_ptr, function.base))?;
        self.add_call_site(CallSite::new(callee_ptr, actuals.to_vec(), result))?;
        Ok(callee_ptr)
    }

    /// `result = (*callee_ptr)(actuals...)`, bound while solving
    fn add_indirect_call(
        &mut self,
        callee_ptr: NodeIndex,
        actuals: Vec<Option<NodeIndex>>,
        result: Option<NodeIndex>,
    ) -> Result<()> {
        self.add_call_site(CallSite::new(callee_ptr, actuals, result))
    }

    /// `return value;` inside `function`
    fn add_return(&mut self, function: &str, value: NodeIndex) -> Result<()> {
        let ret = self.return_node(function);
        self.add_constraint(Constraint::copy(ret, value))
    }
}

// ============================================================================
// Outbound
// ============================================================================

/// Read-only queries over a solved graph
///
/// # Example
/// ```ignore
/// fn report<Q: PointsToQuery>(query: &Q, p: NodeIndex, q: NodeIndex) {
///     if query.may_alias(p, q) { /* ... */ }
/// }
/// ```
pub trait PointsToQuery: Send + Sync {
    fn points_to(&self, node: NodeIndex) -> PointsTo;

    fn allocation_sites(&self) -> &[NodeIndex];

    fn may_alias(&self, a: NodeIndex, b: NodeIndex) -> bool;

    fn must_alias(&self, a: NodeIndex, b: NodeIndex) -> bool;

    /// False for a result cut short by the iteration bound
    fn is_complete(&self) -> bool;
}

impl PointsToQuery for PointsToGraph {
    fn points_to(&self, node: NodeIndex) -> PointsTo {
        PointsToGraph::points_to(self, node)
    }

    fn allocation_sites(&self) -> &[NodeIndex] {
        PointsToGraph::allocation_sites(self)
    }

    fn may_alias(&self, a: NodeIndex, b: NodeIndex) -> bool {
        PointsToGraph::may_alias(self, a, b)
    }

    fn must_alias(&self, a: NodeIndex, b: NodeIndex) -> bool {
        PointsToGraph::must_alias(self, a, b)
    }

    fn is_complete(&self) -> bool {
        PointsToGraph::is_complete(self)
    }
}
