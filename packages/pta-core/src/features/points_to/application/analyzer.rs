//! High-Level Points-to Analyzer
//!
//! Owns the node space and constraint store and drives a run:
//! generation → dedup → offline optimization → solve → queries.
//!
//! # Usage
//! ```text
//! use pta_core::features::points_to::{PointsToAnalyzer, ConstraintSink};
//!
//! let mut analyzer = PointsToAnalyzer::new(PtaConfig::default())?;
//! analyzer.add_alloc("x", "alloc:1")?;
//! analyzer.add_copy("y", "x")?;
//!
//! analyzer.solve()?;
//! assert!(analyzer.may_alias(x, y)?);
//! ```
//!
//! Constraints added after a solve are pending until the next `solve()`,
//! which folds them into the existing fixpoint. `solve_fresh()` forgets all
//! merges and solver state and starts over.

use super::generation::GenerationContext;
use crate::config::PtaConfig;
use crate::errors::{PtaError, Result};
use crate::features::points_to::domain::constraint::{CallSite, Constraint, ConstraintKind, ConstraintSet};
use crate::features::points_to::domain::node::{
    NodeIndex, NULL_OBJECT, NULL_PTR, UNIVERSAL_OBJ, UNIVERSAL_PTR,
};
use crate::features::points_to::domain::points_to_graph::{
    PointsTo, PointsToGraph, SolveStats, SolveStatus,
};
use crate::features::points_to::infrastructure::andersen_solver::{AndersenConfig, AndersenSolver};
use crate::features::points_to::infrastructure::node_factory::NodeFactory;
use crate::features::points_to::infrastructure::offline_optimizer::{rewrite_to_reps, OfflineOptimizer};
use std::sync::Arc;
use tracing::{info, warn};

/// Constraints every analysis starts from
///
/// The universal pointer points to the universal object, which points to
/// itself and absorbs everything stored through it. The null pointer points
/// to the null object.
pub fn special_constraints() -> [Constraint; 4] {
    [
        Constraint::addr_of(UNIVERSAL_PTR, UNIVERSAL_OBJ),
        Constraint::addr_of(UNIVERSAL_OBJ, UNIVERSAL_OBJ),
        Constraint::store(UNIVERSAL_OBJ, UNIVERSAL_OBJ),
        Constraint::addr_of(NULL_PTR, NULL_OBJECT),
    ]
}

/// High-level points-to analyzer
pub struct PointsToAnalyzer {
    /// Configuration
    config: PtaConfig,

    /// Node space and merge relation
    nodes: NodeFactory,

    /// Every constraint already handed to the solver, as generated
    constraints: ConstraintSet,

    /// Added since the last solve
    pending: ConstraintSet,

    /// Live solver state, kept for incremental solves
    solver: Option<AndersenSolver>,

    /// Last solved graph
    graph: Option<Arc<PointsToGraph>>,

    stats: SolveStats,
}

impl PointsToAnalyzer {
    /// Create an analyzer with the special nodes and constraints in place
    pub fn new(config: PtaConfig) -> Result<Self> {
        let mut pending = ConstraintSet::new();
        for c in special_constraints() {
            pending.add(c);
        }
        Self::from_parts(config, NodeFactory::new(), pending)
    }

    pub(crate) fn from_parts(config: PtaConfig, nodes: NodeFactory, pending: ConstraintSet) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            nodes,
            constraints: ConstraintSet::new(),
            pending,
            solver: None,
            graph: None,
            stats: SolveStats::default(),
        })
    }

    pub fn config(&self) -> &PtaConfig {
        &self.config
    }

    /// Node space (lookups, function records, merge relation)
    pub fn nodes(&self) -> &NodeFactory {
        &self.nodes
    }

    /// Single-writer generation handle
    pub fn generation(&mut self) -> GenerationContext<'_> {
        GenerationContext::new(&mut self.nodes, &mut self.pending, self.config.external_policy)
    }

    /// Constraints waiting for the next solve
    pub fn pending_len(&self) -> usize {
        self.pending.len() + self.pending.call_sites.len()
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Constraint Building API
    // ═══════════════════════════════════════════════════════════════════════

    /// Append `kind(dst, src)`; both must be allocated nodes
    pub fn add_constraint(&mut self, kind: ConstraintKind, dst: NodeIndex, src: NodeIndex) -> Result<()> {
        let constraint = Constraint::new(kind, dst, src);
        self.nodes.check_constraint(&constraint)?;
        self.pending.add(constraint);
        Ok(())
    }

    pub fn add_call_site(&mut self, call: CallSite) -> Result<()> {
        for operand in call.operands() {
            self.nodes.check(operand)?;
        }
        self.pending.add_call_site(call);
        Ok(())
    }

    /// var = &location (keys name a value and an object)
    pub fn add_alloc(&mut self, var: &str, location: &str) -> Result<()> {
        let var = self.nodes.create_value_node(var);
        let location = self.nodes.create_object_node(location);
        self.add_constraint(ConstraintKind::AddrOf, var, location)
    }

    /// lhs = rhs
    pub fn add_copy(&mut self, lhs: &str, rhs: &str) -> Result<()> {
        let (lhs, rhs) = self.value_pair(lhs, rhs);
        self.add_constraint(ConstraintKind::Copy, lhs, rhs)
    }

    /// lhs = *rhs
    pub fn add_load(&mut self, lhs: &str, rhs: &str) -> Result<()> {
        let (lhs, rhs) = self.value_pair(lhs, rhs);
        self.add_constraint(ConstraintKind::Load, lhs, rhs)
    }

    /// *lhs = rhs
    pub fn add_store(&mut self, lhs: &str, rhs: &str) -> Result<()> {
        let (lhs, rhs) = self.value_pair(lhs, rhs);
        self.add_constraint(ConstraintKind::Store, lhs, rhs)
    }

    fn value_pair(&mut self, lhs: &str, rhs: &str) -> (NodeIndex, NodeIndex) {
        (self.nodes.create_value_node(lhs), self.nodes.create_value_node(rhs))
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Solving
    // ═══════════════════════════════════════════════════════════════════════

    /// Solve everything added so far
    ///
    /// The first call runs the full pipeline. Later calls fold pending
    /// constraints into the existing fixpoint (and resume a partial one).
    pub fn solve(&mut self) -> Result<Arc<PointsToGraph>> {
        match self.solver.take() {
            None => self.solve_full(),
            Some(solver) => self.solve_incremental(solver),
        }
    }

    /// Forget merges and solver state, then run the full pipeline again
    pub fn solve_fresh(&mut self) -> Result<Arc<PointsToGraph>> {
        self.nodes.reset_merges();
        self.solver = None;
        self.graph = None;
        self.stats = SolveStats::default();

        let mut all = std::mem::take(&mut self.constraints);
        all.append(&mut self.pending);
        self.pending = all;
        self.solve_full()
    }

    fn solve_full(&mut self) -> Result<Arc<PointsToGraph>> {
        self.constraints.append(&mut self.pending);
        let duplicates = self.constraints.dedup();
        info!(
            constraints = self.constraints.len(),
            call_sites = self.constraints.call_sites.len(),
            duplicates,
            "Deduplicated constraints"
        );
        self.stats.duplicates_removed += duplicates;

        let mut reduced = self.constraints.clone();
        let optimizer = OfflineOptimizer::new(&self.config);
        let optimize = optimizer.run(&mut self.nodes, &mut reduced);
        self.stats.offline_sccs = optimize.offline_sccs;
        self.stats.cycle_merges = optimize.cycle_merges;
        self.stats.pointer_merges = optimize.pointer_merges;
        self.stats.location_merges = optimize.location_merges;
        self.stats.optimize_ms = optimize.duration_ms;

        let mut solver = AndersenSolver::new(AndersenConfig::from(&self.config));
        solver.add_constraints(&mut self.nodes, &reduced);
        let status = solver.solve(&mut self.nodes);
        self.finish(solver, status)
    }

    fn solve_incremental(&mut self, mut solver: AndersenSolver) -> Result<Arc<PointsToGraph>> {
        let mut batch = std::mem::take(&mut self.pending);
        let duplicates = batch.dedup();
        self.stats.duplicates_removed += duplicates;

        let mut rewritten = batch.clone();
        rewrite_to_reps(&mut self.nodes, &mut rewritten);
        info!(
            constraints = batch.len(),
            call_sites = batch.call_sites.len(),
            "Folding new constraints into existing solution"
        );
        self.constraints.append(&mut batch);

        solver.add_constraints(&mut self.nodes, &rewritten);
        let status = solver.solve(&mut self.nodes);
        self.finish(solver, status)
    }

    fn finish(&mut self, solver: AndersenSolver, status: SolveStatus) -> Result<Arc<PointsToGraph>> {
        let solved = solver.stats();
        self.stats.nodes = self.nodes.len();
        self.stats.addr_of = self.constraints.addr_of_count;
        self.stats.copy = self.constraints.copy_count;
        self.stats.load = self.constraints.load_count;
        self.stats.store = self.constraints.store_count;
        self.stats.call_sites = self.constraints.call_sites.len();
        self.stats.online_cycles = solved.online_cycles;
        self.stats.online_merges = solved.online_merges;
        self.stats.iterations = solved.iterations;
        self.stats.propagations = solved.propagations;
        self.stats.calls_bound = solved.calls_bound;
        self.stats.solve_ms = solved.duration_ms;

        let sets = solver.snapshot(&mut self.nodes);
        let mut graph = PointsToGraph::build(&mut self.nodes, sets, status, self.stats.clone());

        if self.config.verify_fixpoint && status.is_converged() {
            let violations = graph.violations(&self.constraints);
            for c in violations.iter().take(10) {
                warn!(constraint = %c, "Constraint does not hold after solving");
            }
            self.stats.fixpoint_violations = violations.len();
            graph.stats_mut().fixpoint_violations = violations.len();
        }

        self.solver = Some(solver);
        let graph = Arc::new(graph);
        self.graph = Some(Arc::clone(&graph));
        Ok(graph)
    }

    pub fn stats(&self) -> &SolveStats {
        &self.stats
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Queries
    // ═══════════════════════════════════════════════════════════════════════

    /// Last solved graph
    pub fn graph(&self) -> Result<&Arc<PointsToGraph>> {
        self.graph.as_ref().ok_or(PtaError::NotSolved)
    }

    /// Objects `node` may point to
    ///
    /// `Unknown` for a node created after the last solve.
    pub fn points_to(&self, node: NodeIndex) -> Result<PointsTo> {
        self.nodes.check(node)?;
        Ok(self.graph()?.points_to(node))
    }

    /// Points-to set of the value node for `key`, else of the object node
    pub fn points_to_key(&self, key: &str) -> Result<PointsTo> {
        let graph = self.graph()?;
        let node = self
            .nodes
            .get_value_node_for(key)
            .or_else(|| self.nodes.get_object_node_for(key));
        Ok(node.map_or(PointsTo::Unknown, |n| graph.points_to(n)))
    }

    pub fn allocation_sites(&self) -> Result<&[NodeIndex]> {
        Ok(self.graph()?.allocation_sites())
    }

    pub fn may_alias(&self, a: NodeIndex, b: NodeIndex) -> Result<bool> {
        self.nodes.check(a)?;
        self.nodes.check(b)?;
        Ok(self.graph()?.may_alias(a, b))
    }

    pub fn must_alias(&self, a: NodeIndex, b: NodeIndex) -> Result<bool> {
        self.nodes.check(a)?;
        self.nodes.check(b)?;
        Ok(self.graph()?.must_alias(a, b))
    }

    /// Representative of `node` under the current merge relation
    pub fn get_merge_target(&self, node: NodeIndex) -> Result<NodeIndex> {
        self.nodes.merge_target(node)
    }

    /// Every constraint (solved and pending), one per line
    pub fn dump_constraints(&self) -> String {
        let mut out = self.constraints.dump();
        out.push_str(&self.pending.dump());
        out
    }

    /// Solved sets, one line per node
    pub fn dump_points_to(&self) -> Result<String> {
        Ok(self.graph()?.dump_points_to())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Preset;
    use crate::features::points_to::ports::ConstraintSink;
    use pretty_assertions::assert_eq;

    fn analyzer() -> PointsToAnalyzer {
        PointsToAnalyzer::new(PtaConfig::default()).unwrap()
    }

    fn known(v: &[NodeIndex]) -> PointsTo {
        PointsTo::Known(v.to_vec())
    }

    #[test]
    fn test_query_before_solve() {
        let a = analyzer();
        assert!(matches!(a.points_to(UNIVERSAL_PTR), Err(PtaError::NotSolved)));
        assert!(matches!(a.allocation_sites(), Err(PtaError::NotSolved)));
    }

    #[test]
    fn test_special_nodes_after_solve() {
        let mut a = analyzer();
        a.solve().unwrap();
        assert_eq!(a.points_to(UNIVERSAL_PTR).unwrap(), known(&[UNIVERSAL_OBJ]));
        assert_eq!(a.points_to(UNIVERSAL_OBJ).unwrap(), known(&[UNIVERSAL_OBJ]));
        assert_eq!(a.points_to(NULL_PTR).unwrap(), known(&[NULL_OBJECT]));
        assert_eq!(a.points_to(NULL_OBJECT).unwrap(), known(&[]));
    }

    #[test]
    fn test_copy_union() {
        let mut a = analyzer();
        a.add_alloc("v1", "o1").unwrap();
        a.add_alloc("v2", "o2").unwrap();
        a.add_copy("v3", "v1").unwrap();
        a.add_copy("v3", "v2").unwrap();
        a.solve().unwrap();

        let o1 = a.nodes().get_object_node_for("o1").unwrap();
        let o2 = a.nodes().get_object_node_for("o2").unwrap();
        assert_eq!(a.points_to_key("v3").unwrap(), known(&[o1, o2]));
        assert_eq!(a.points_to_key("nope").unwrap(), PointsTo::Unknown);
    }

    #[test]
    fn test_unknown_node_is_error() {
        let mut a = analyzer();
        a.solve().unwrap();
        assert!(matches!(a.points_to(4242), Err(PtaError::UnknownNode { index: 4242, .. })));
        assert!(a.add_constraint(ConstraintKind::Copy, 0, 4242).is_err());
    }

    #[test]
    fn test_incremental_solve() {
        let mut a = analyzer();
        a.add_alloc("p", "o1").unwrap();
        a.add_copy("q", "p").unwrap();
        a.solve().unwrap();

        // created after the solve: not covered yet
        let r = a.generation().create_value_node("r");
        assert_eq!(a.points_to(r).unwrap(), PointsTo::Unknown);

        a.add_alloc("p", "o2").unwrap();
        a.add_copy("r", "q").unwrap();
        assert!(a.has_pending());
        a.solve().unwrap();

        let o1 = a.nodes().get_object_node_for("o1").unwrap();
        let o2 = a.nodes().get_object_node_for("o2").unwrap();
        assert!(a.points_to(r).unwrap().contains(o1));
        assert!(a.points_to(r).unwrap().contains(o2));
        assert!(a.points_to_key("q").unwrap().contains(o2));
    }

    #[test]
    fn test_solve_fresh_matches_incremental_superset() {
        let mut a = analyzer();
        a.add_alloc("p", "o1").unwrap();
        a.add_copy("q", "p").unwrap();
        a.solve().unwrap();
        a.add_store("q", "p").unwrap();
        a.solve().unwrap();
        let incremental = a.points_to_key("o1").unwrap();

        a.solve_fresh().unwrap();
        let fresh = a.points_to_key("o1").unwrap();
        for o in fresh.objects().unwrap() {
            assert!(incremental.contains(*o));
        }
        assert!(fresh.contains(a.nodes().get_object_node_for("o1").unwrap()));
    }

    #[test]
    fn test_iteration_bound_flags_partial() {
        let config = PtaConfig::from_preset(Preset::Custom).max_iterations(Some(1));
        let mut a = PointsToAnalyzer::new(config).unwrap();
        for i in 0..5 {
            a.add_copy(&format!("v{}", i + 1), &format!("v{i}")).unwrap();
        }
        a.add_alloc("v0", "o").unwrap();
        let graph = a.solve().unwrap();
        assert!(!graph.is_complete());

        // resuming finishes the job
        let mut graph = a.solve().unwrap();
        while !graph.is_complete() {
            graph = a.solve().unwrap();
        }
        let o = a.nodes().get_object_node_for("o").unwrap();
        assert_eq!(a.points_to_key("v5").unwrap(), known(&[o]));
    }

    #[test]
    fn test_verify_fixpoint_reports_no_violations() {
        let config = PtaConfig::from_preset(Preset::Thorough);
        let mut a = PointsToAnalyzer::new(config).unwrap();
        a.add_alloc("p", "o1").unwrap();
        a.add_alloc("v", "o2").unwrap();
        a.add_store("p", "v").unwrap();
        a.add_load("w", "p").unwrap();
        let graph = a.solve().unwrap();
        assert_eq!(graph.stats().fixpoint_violations, 0);
        assert!(graph.is_complete());
    }

    #[test]
    fn test_dump_constraints() {
        let mut a = analyzer();
        a.add_copy("a", "b").unwrap();
        let dump = a.dump_constraints();
        assert!(dump.contains("0 = &1"));
        assert!(dump.contains("*1 = 1"));
        assert!(dump.contains("4 = 5"));
    }
}
