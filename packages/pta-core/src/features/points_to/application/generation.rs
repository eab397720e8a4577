//! Constraint generation contexts
//!
//! - `GenerationContext`: borrows the analyzer's node space and pending
//!   constraint store mutably. One writer, checked by the borrow checker.
//! - `SharedGeneration`: cloneable handle for parallel front ends (one clone
//!   per rayon worker). Node space and constraint store each sit behind their
//!   own lock; no method ever holds both locks at once.
//!
//! Both implement `ConstraintSink`, so front ends are written once against
//! the trait.

use super::analyzer::{special_constraints, PointsToAnalyzer};
use crate::config::{ExternalPolicy, PtaConfig};
use crate::errors::Result;
use crate::features::points_to::domain::constraint::{CallSite, Constraint, ConstraintSet};
use crate::features::points_to::domain::node::{FunctionNodes, NodeIndex};
use crate::features::points_to::infrastructure::node_factory::NodeFactory;
use crate::features::points_to::ports::ConstraintSink;
use parking_lot::Mutex;
use std::sync::Arc;

/// Single-writer generation handle
pub struct GenerationContext<'a> {
    nodes: &'a mut NodeFactory,
    constraints: &'a mut ConstraintSet,
    policy: ExternalPolicy,
}

impl<'a> GenerationContext<'a> {
    pub(crate) fn new(
        nodes: &'a mut NodeFactory,
        constraints: &'a mut ConstraintSet,
        policy: ExternalPolicy,
    ) -> Self {
        Self {
            nodes,
            constraints,
            policy,
        }
    }

    /// Read access to the node space (lookups, `key_for`)
    pub fn nodes(&self) -> &NodeFactory {
        self.nodes
    }
}

impl ConstraintSink for GenerationContext<'_> {
    fn create_value_node(&mut self, key: &str) -> NodeIndex {
        self.nodes.create_value_node(key)
    }

    fn create_object_node(&mut self, key: &str) -> NodeIndex {
        self.nodes.create_object_node(key)
    }

    fn create_synthetic_object(&mut self, label: &str) -> NodeIndex {
        self.nodes.create_synthetic_object(label)
    }

    fn create_temp_value(&mut self) -> NodeIndex {
        self.nodes.create_temp_value()
    }

    fn declare_function(&mut self, key: &str, arity: usize, variadic: bool) -> FunctionNodes {
        self.nodes.declare_function(key, arity, variadic).clone()
    }

    fn add_constraint(&mut self, constraint: Constraint) -> Result<()> {
        self.nodes.check_constraint(&constraint)?;
        self.constraints.add(constraint);
        Ok(())
    }

    fn add_call_site(&mut self, call: CallSite) -> Result<()> {
        for operand in call.operands() {
            self.nodes.check(operand)?;
        }
        self.constraints.add_call_site(call);
        Ok(())
    }

    fn external_policy(&self) -> ExternalPolicy {
        self.policy
    }
}

/// Generation handle shared across worker threads
///
/// # Example
/// ```ignore
/// let shared = SharedGeneration::new(PtaConfig::default())?;
/// units.par_iter().try_for_each(|unit| lower(unit, &mut shared.clone()))?;
/// let mut analyzer = shared.into_analyzer()?;
/// analyzer.solve()?;
/// ```
#[derive(Clone)]
pub struct SharedGeneration {
    config: Arc<PtaConfig>,
    nodes: Arc<Mutex<NodeFactory>>,
    constraints: Arc<Mutex<ConstraintSet>>,
}

impl SharedGeneration {
    pub fn new(config: PtaConfig) -> Result<Self> {
        config.validate()?;
        let mut constraints = ConstraintSet::new();
        for c in special_constraints() {
            constraints.add(c);
        }
        Ok(Self {
            config: Arc::new(config),
            nodes: Arc::new(Mutex::new(NodeFactory::new())),
            constraints: Arc::new(Mutex::new(constraints)),
        })
    }

    /// Lookup without creating
    pub fn get_value_node_for(&self, key: &str) -> Option<NodeIndex> {
        self.nodes.lock().get_value_node_for(key)
    }

    pub fn get_object_node_for(&self, key: &str) -> Option<NodeIndex> {
        self.nodes.lock().get_object_node_for(key)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.lock().len()
    }

    pub fn constraint_count(&self) -> usize {
        self.constraints.lock().len()
    }

    /// End generation and hand everything to an analyzer
    ///
    /// Clones that are still alive keep working on their own copy; nothing
    /// they add afterwards reaches the analyzer.
    pub fn into_analyzer(self) -> Result<PointsToAnalyzer> {
        let config = Arc::try_unwrap(self.config).unwrap_or_else(|shared| (*shared).clone());
        let nodes = Arc::try_unwrap(self.nodes)
            .map(Mutex::into_inner)
            .unwrap_or_else(|shared| shared.lock().clone());
        let constraints = Arc::try_unwrap(self.constraints)
            .map(Mutex::into_inner)
            .unwrap_or_else(|shared| shared.lock().clone());
        PointsToAnalyzer::from_parts(config, nodes, constraints)
    }
}

impl ConstraintSink for SharedGeneration {
    fn create_value_node(&mut self, key: &str) -> NodeIndex {
        self.nodes.lock().create_value_node(key)
    }

    fn create_object_node(&mut self, key: &str) -> NodeIndex {
        self.nodes.lock().create_object_node(key)
    }

    fn create_synthetic_object(&mut self, label: &str) -> NodeIndex {
        self.nodes.lock().create_synthetic_object(label)
    }

    fn create_temp_value(&mut self) -> NodeIndex {
        self.nodes.lock().create_temp_value()
    }

    fn declare_function(&mut self, key: &str, arity: usize, variadic: bool) -> FunctionNodes {
        self.nodes.lock().declare_function(key, arity, variadic).clone()
    }

    fn add_constraint(&mut self, constraint: Constraint) -> Result<()> {
        self.nodes.lock().check_constraint(&constraint)?;
        self.constraints.lock().add(constraint);
        Ok(())
    }

    fn add_call_site(&mut self, call: CallSite) -> Result<()> {
        {
            let nodes = self.nodes.lock();
            for operand in call.operands() {
                nodes.check(operand)?;
            }
        }
        self.constraints.lock().add_call_site(call);
        Ok(())
    }

    fn external_policy(&self) -> ExternalPolicy {
        self.config.external_policy
    }
}
