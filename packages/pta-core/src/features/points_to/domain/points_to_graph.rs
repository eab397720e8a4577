//! Points-to Graph
//!
//! Immutable result of a solve: node → set of object nodes.
//!
//! Every node resolves through the merge relation snapshot taken at the end
//! of the solve; sets are stored once per representative, with merged
//! locations already expanded back to the objects they stand for.

use super::constraint::{Constraint, ConstraintKind, ConstraintSet};
use super::node::{NodeIndex, NULL_OBJECT, UNIVERSAL_OBJ};
use crate::errors::Result;
use crate::features::points_to::infrastructure::node_factory::NodeFactory;
use crate::features::points_to::infrastructure::sparse_bitmap::SparseBitmap;
use rustc_hash::FxHashMap;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;

/// Whether a solve reached its fixpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum SolveStatus {
    /// Every constraint holds
    Converged,
    /// Stopped by the iteration bound; sets may be missing elements
    Partial { iterations: usize },
}

impl SolveStatus {
    #[inline]
    pub fn is_converged(&self) -> bool {
        matches!(self, SolveStatus::Converged)
    }
}

/// Result of a points-to query
///
/// `Unknown` means the graph has no entry for the node at all (it was created
/// after the solve, or its key was never seen). It is not the same as a known
/// empty set, and callers usually treat it conservatively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PointsTo {
    Unknown,
    Known(Vec<NodeIndex>),
}

impl PointsTo {
    #[inline]
    pub fn is_known(&self) -> bool {
        matches!(self, PointsTo::Known(_))
    }

    /// May point to anything (the set holds the universal object)
    pub fn is_universal(&self) -> bool {
        matches!(self, PointsTo::Known(set) if set.contains(&UNIVERSAL_OBJ))
    }

    /// Objects, if known
    pub fn objects(&self) -> Option<&[NodeIndex]> {
        match self {
            PointsTo::Known(set) => Some(set),
            PointsTo::Unknown => None,
        }
    }

    pub fn contains(&self, object: NodeIndex) -> bool {
        self.objects().is_some_and(|set| set.contains(&object))
    }
}

/// Statistics for a whole analysis run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SolveStats {
    pub nodes: usize,
    pub addr_of: usize,
    pub copy: usize,
    pub load: usize,
    pub store: usize,
    pub call_sites: usize,
    pub duplicates_removed: usize,
    pub offline_sccs: usize,
    pub cycle_merges: usize,
    pub pointer_merges: usize,
    pub location_merges: usize,
    pub online_cycles: usize,
    pub online_merges: usize,
    pub iterations: usize,
    pub propagations: usize,
    pub calls_bound: usize,
    pub fixpoint_violations: usize,
    pub optimize_ms: f64,
    pub solve_ms: f64,
}

/// Shape of the solved graph
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GraphStats {
    pub total_nodes: usize,
    pub representatives: usize,
    pub non_empty_sets: usize,
    pub total_edges: usize,
    pub max_points_to_size: usize,
    pub avg_points_to_size: f64,
    pub universal_sets: usize,
}

/// Solved points-to relation
#[derive(Debug, Clone)]
pub struct PointsToGraph {
    /// Representative of every node known at solve time
    reps: Vec<NodeIndex>,

    /// Representative → objects (location classes expanded)
    sets: FxHashMap<NodeIndex, SparseBitmap>,

    allocation_sites: Vec<NodeIndex>,

    /// Source key per node, for dumps
    keys: Vec<Option<String>>,

    status: SolveStatus,
    stats: SolveStats,
    empty: SparseBitmap,
}

impl PointsToGraph {
    /// Freeze solver output against the node space's merge relation
    pub fn build(
        nodes: &mut NodeFactory,
        sets: FxHashMap<NodeIndex, SparseBitmap>,
        status: SolveStatus,
        stats: SolveStats,
    ) -> Self {
        let reps = nodes.merge_targets();
        let classes = nodes.location_classes();

        let sets = if classes.is_empty() {
            sets
        } else {
            sets.into_iter()
                .map(|(rep, set)| {
                    let expanded = set
                        .iter()
                        .flat_map(|o| match classes.get(&o) {
                            Some(members) => members.clone(),
                            None => vec![o],
                        })
                        .collect();
                    (rep, expanded)
                })
                .collect()
        };

        let keys = (0..nodes.len() as NodeIndex)
            .map(|i| nodes.key_for(i).map(str::to_string))
            .collect();

        Self {
            reps,
            sets,
            allocation_sites: nodes.allocation_sites(),
            keys,
            status,
            stats,
            empty: SparseBitmap::new(),
        }
    }

    /// Number of nodes covered
    #[inline]
    pub fn node_count(&self) -> usize {
        self.reps.len()
    }

    /// Representative of `node`, if covered
    #[inline]
    pub fn rep(&self, node: NodeIndex) -> Option<NodeIndex> {
        self.reps.get(node as usize).copied()
    }

    /// Raw set of `node`, if covered
    pub fn points_to_set(&self, node: NodeIndex) -> Option<&SparseBitmap> {
        let rep = self.rep(node)?;
        Some(self.sets.get(&rep).unwrap_or(&self.empty))
    }

    /// Objects `node` may point to, in ascending order
    pub fn points_to(&self, node: NodeIndex) -> PointsTo {
        match self.points_to_set(node) {
            Some(set) => PointsTo::Known(set.iter().collect()),
            None => PointsTo::Unknown,
        }
    }

    /// Objects that stand for real allocation or definition sites
    pub fn allocation_sites(&self) -> &[NodeIndex] {
        &self.allocation_sites
    }

    /// May `a` and `b` point to a common object?
    ///
    /// The null object is ignored. A node that points to the universal object
    /// aliases every node with a non-null target, and an uncovered node
    /// aliases everything.
    pub fn may_alias(&self, a: NodeIndex, b: NodeIndex) -> bool {
        let (Some(sa), Some(sb)) = (self.points_to_set(a), self.points_to_set(b)) else {
            return true;
        };
        let null = SparseBitmap::singleton(NULL_OBJECT);
        let sa = sa.difference(&null);
        let sb = sb.difference(&null);

        if sa.is_empty() || sb.is_empty() {
            return false;
        }
        sa.contains(UNIVERSAL_OBJ) || sb.contains(UNIVERSAL_OBJ) || sa.intersects(&sb)
    }

    /// Do `a` and `b` certainly refer to the same object?
    ///
    /// True for the same node, or when both point to exactly one, identical,
    /// non-null and non-universal object.
    pub fn must_alias(&self, a: NodeIndex, b: NodeIndex) -> bool {
        if a == b {
            return self.rep(a).is_some();
        }
        let (Some(sa), Some(sb)) = (self.points_to_set(a), self.points_to_set(b)) else {
            return false;
        };
        sa.len() == 1
            && sa == sb
            && !sa.contains(NULL_OBJECT)
            && !sa.contains(UNIVERSAL_OBJ)
    }

    pub fn status(&self) -> SolveStatus {
        self.status
    }

    /// False when the solve stopped at its iteration bound
    pub fn is_complete(&self) -> bool {
        self.status.is_converged()
    }

    pub fn stats(&self) -> &SolveStats {
        &self.stats
    }

    pub(crate) fn stats_mut(&mut self) -> &mut SolveStats {
        &mut self.stats
    }

    pub fn key_for(&self, node: NodeIndex) -> Option<&str> {
        self.keys.get(node as usize).and_then(|k| k.as_deref())
    }

    /// Does `constraint` hold in this graph?
    pub fn check_constraint(&self, constraint: &Constraint) -> bool {
        let set = |n: NodeIndex| self.points_to_set(n).unwrap_or(&self.empty);
        let (dst, src) = (constraint.dst, constraint.src);
        match constraint.kind {
            ConstraintKind::AddrOf => set(dst).contains(src),
            ConstraintKind::Copy => set(src).is_subset_of(set(dst)),
            ConstraintKind::Load => set(src).iter().all(|o| set(o).is_subset_of(set(dst))),
            ConstraintKind::Store => set(dst).iter().all(|o| set(src).is_subset_of(set(o))),
        }
    }

    /// Constraints that do not hold; empty for a converged solve
    pub fn violations(&self, constraints: &ConstraintSet) -> Vec<Constraint> {
        constraints
            .iter()
            .filter(|c| !self.check_constraint(c))
            .copied()
            .collect()
    }

    /// Statistics about the solved sets
    pub fn graph_stats(&self) -> GraphStats {
        let mut reps: Vec<NodeIndex> = self.reps.clone();
        reps.sort_unstable();
        reps.dedup();

        let sizes: Vec<usize> = self
            .sets
            .values()
            .map(SparseBitmap::len)
            .filter(|&len| len > 0)
            .collect();
        let total: usize = sizes.iter().sum();

        GraphStats {
            total_nodes: self.reps.len(),
            representatives: reps.len(),
            non_empty_sets: sizes.len(),
            total_edges: total,
            max_points_to_size: sizes.iter().copied().max().unwrap_or(0),
            avg_points_to_size: if sizes.is_empty() {
                0.0
            } else {
                total as f64 / sizes.len() as f64
            },
            universal_sets: self
                .sets
                .values()
                .filter(|s| s.contains(UNIVERSAL_OBJ))
                .count(),
        }
    }

    fn label(&self, node: NodeIndex) -> String {
        match self.key_for(node) {
            Some(key) => format!("{node}({key})"),
            None => node.to_string(),
        }
    }

    /// One line per node with a non-empty set, ascending by node
    pub fn dump_points_to(&self) -> String {
        let mut out = String::new();
        for node in 0..self.reps.len() as NodeIndex {
            let Some(set) = self.points_to_set(node) else {
                continue;
            };
            if set.is_empty() {
                continue;
            }
            let objects: Vec<String> = set.iter().map(|o| self.label(o)).collect();
            let _ = writeln!(out, "{} -> {{{}}}", self.label(node), objects.join(", "));
        }
        out
    }

    /// JSON export: status, statistics, representatives and sets
    pub fn to_json(&self) -> Result<String> {
        #[derive(Serialize)]
        struct Export<'a> {
            status: SolveStatus,
            stats: &'a SolveStats,
            allocation_sites: &'a [NodeIndex],
            merged: BTreeMap<NodeIndex, NodeIndex>,
            points_to: BTreeMap<NodeIndex, Vec<NodeIndex>>,
        }

        let export = Export {
            status: self.status,
            stats: &self.stats,
            allocation_sites: &self.allocation_sites,
            merged: self
                .reps
                .iter()
                .enumerate()
                .filter(|(i, &rep)| *i as NodeIndex != rep)
                .map(|(i, &rep)| (i as NodeIndex, rep))
                .collect(),
            points_to: self
                .sets
                .iter()
                .filter(|(_, set)| !set.is_empty())
                .map(|(&rep, set)| (rep, set.iter().collect()))
                .collect(),
        };
        Ok(serde_json::to_string_pretty(&export)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// v1 → {o1}, v2 → {o1, o2}, v3 merged into v1, v4 → {null}, u → {universal}
    fn sample() -> (PointsToGraph, [NodeIndex; 7]) {
        let mut nodes = NodeFactory::new();
        let v1 = nodes.create_value_node("v1");
        let v2 = nodes.create_value_node("v2");
        let v3 = nodes.create_value_node("v3");
        let v4 = nodes.create_value_node("v4");
        let u = nodes.create_value_node("u");
        let o1 = nodes.create_object_node("o1");
        let o2 = nodes.create_object_node("o2");
        nodes.merge(v1, v3);

        let mut sets = FxHashMap::default();
        sets.insert(v1, SparseBitmap::singleton(o1));
        sets.insert(v2, [o1, o2].into_iter().collect());
        sets.insert(v4, SparseBitmap::singleton(NULL_OBJECT));
        sets.insert(u, SparseBitmap::singleton(UNIVERSAL_OBJ));

        let graph = PointsToGraph::build(&mut nodes, sets, SolveStatus::Converged, SolveStats::default());
        (graph, [v1, v2, v3, v4, u, o1, o2])
    }

    #[test]
    fn test_points_to_resolves_merges() {
        let (graph, [v1, v2, v3, _, _, o1, o2]) = sample();
        assert_eq!(graph.points_to(v1), PointsTo::Known(vec![o1]));
        assert_eq!(graph.points_to(v3), PointsTo::Known(vec![o1]));
        assert_eq!(graph.points_to(v2), PointsTo::Known(vec![o1, o2]));
        assert_eq!(graph.points_to(o1), PointsTo::Known(vec![]));
        assert_eq!(graph.points_to(1000), PointsTo::Unknown);
        assert_eq!(graph.allocation_sites(), &[o1, o2]);
    }

    #[test]
    fn test_may_alias() {
        let (graph, [v1, v2, v3, v4, u, o1, _]) = sample();
        assert!(graph.may_alias(v1, v2));
        assert!(graph.may_alias(v1, v3));
        assert!(!graph.may_alias(v4, v4));
        assert!(!graph.may_alias(v1, o1));
        assert!(graph.may_alias(u, v2));
        assert!(graph.may_alias(1000, v1));
    }

    #[test]
    fn test_must_alias() {
        let (graph, [v1, v2, v3, v4, u, _, _]) = sample();
        assert!(graph.must_alias(v1, v3));
        assert!(!graph.must_alias(v1, v2));
        assert!(!graph.must_alias(v4, v4.wrapping_add(100)));
        assert!(!graph.must_alias(u, u.wrapping_add(100)));
        assert!(graph.must_alias(v2, v2));
    }

    #[test]
    fn test_check_constraint() {
        let (graph, [v1, v2, _, _, _, o1, o2]) = sample();
        assert!(graph.check_constraint(&Constraint::addr_of(v1, o1)));
        assert!(!graph.check_constraint(&Constraint::addr_of(v1, o2)));
        assert!(graph.check_constraint(&Constraint::copy(v2, v1)));
        assert!(!graph.check_constraint(&Constraint::copy(v1, v2)));
        // *v2 is empty everywhere, so loading from it holds trivially
        assert!(graph.check_constraint(&Constraint::load(v1, v2)));
        assert!(!graph.check_constraint(&Constraint::store(v2, v1)));
    }

    #[test]
    fn test_graph_stats() {
        let (graph, _) = sample();
        let stats = graph.graph_stats();
        assert_eq!(
            stats,
            GraphStats {
                total_nodes: 11,
                representatives: 10,
                non_empty_sets: 4,
                total_edges: 5,
                max_points_to_size: 2,
                avg_points_to_size: 1.25,
                universal_sets: 1,
            }
        );
    }

    #[test]
    fn test_dump_and_json() {
        let (graph, _) = sample();
        let dump = graph.dump_points_to();
        assert!(dump.contains("4(v1) -> {9(o1)}"));
        assert!(dump.contains("6(v3) -> {9(o1)}"));

        let json = graph.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["status"]["status"], "converged");
        assert_eq!(value["merged"]["6"], 4);
        assert_eq!(value["points_to"]["5"], serde_json::json!([9, 10]));
    }
}
