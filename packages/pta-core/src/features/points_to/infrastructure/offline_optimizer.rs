//! Offline Constraint Graph Optimizer
//!
//! Shrinks the constraint graph before solving:
//! - Cycle collapse: SCCs of the COPY subgraph end with equal sets
//! - Pointer equivalence: value nodes labeled by the (sorted, deduplicated)
//!   set of address-taken objects and opaque nodes they copy from; equal
//!   non-empty labels mean equal points-to sets
//! - Location equivalence: objects whose address is taken by exactly the same
//!   nodes always occur together; with equal direct contents they collapse to
//!   one element and one content node
//!
//! Each pass records merges in the node space and the constraint set is then
//! rewritten to representatives. Passes repeat until a round merges nothing,
//! so running the optimizer again on its own output is a no-op.
//!
//! # References
//! - Hardekopf & Lin "Exploiting Pointer and Location Equivalence to
//!   Optimize Pointer Analysis" (SAS 2007)
//! - Rountev & Chandra "Off-line Variable Substitution for Scaling
//!   Points-to Analysis" (PLDI 2000)

use super::node_factory::NodeFactory;
use super::scc_detector::tarjan_scc;
use crate::config::PtaConfig;
use crate::features::points_to::domain::constraint::{ConstraintKind, ConstraintSet};
use crate::features::points_to::domain::node::{is_special, NodeIndex};
use rustc_hash::FxHashMap;
use serde::Serialize;
use std::time::Instant;
use tracing::{debug, info};

/// Statistics for one optimizer run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OptimizeStats {
    pub rounds: usize,
    pub offline_sccs: usize,
    pub cycle_merges: usize,
    pub pointer_merges: usize,
    pub location_merges: usize,
    pub constraints_before: usize,
    pub constraints_after: usize,
    pub duration_ms: f64,
}

impl OptimizeStats {
    pub fn total_merges(&self) -> usize {
        self.cycle_merges + self.pointer_merges + self.location_merges
    }
}

/// Offline optimizer driven by the `enable_*` switches of `PtaConfig`
#[derive(Debug, Clone, Copy)]
pub struct OfflineOptimizer {
    cycles: bool,
    pointer_equivalence: bool,
    location_equivalence: bool,
}

impl OfflineOptimizer {
    pub fn new(config: &PtaConfig) -> Self {
        Self {
            cycles: config.enable_offline_cycles,
            pointer_equivalence: config.enable_pointer_equivalence,
            location_equivalence: config.enable_location_equivalence,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.cycles || self.pointer_equivalence || self.location_equivalence
    }

    /// Run all enabled passes to a fixed point
    pub fn run(&self, nodes: &mut NodeFactory, constraints: &mut ConstraintSet) -> OptimizeStats {
        let start = Instant::now();
        let mut stats = OptimizeStats {
            constraints_before: constraints.len(),
            ..Default::default()
        };

        rewrite_to_reps(nodes, constraints);

        if self.is_enabled() {
            loop {
                stats.rounds += 1;
                let mut merged = 0;

                if self.cycles {
                    let (sccs, merges) = collapse_copy_cycles(nodes, constraints);
                    stats.offline_sccs += sccs;
                    stats.cycle_merges += merges;
                    merged += merges;
                    rewrite_to_reps(nodes, constraints);
                }

                if self.pointer_equivalence {
                    let merges = pointer_equivalence(nodes, constraints);
                    stats.pointer_merges += merges;
                    merged += merges;
                    rewrite_to_reps(nodes, constraints);
                }

                if self.location_equivalence {
                    let merges = location_equivalence(nodes, constraints);
                    stats.location_merges += merges;
                    merged += merges;
                    rewrite_to_reps(nodes, constraints);
                }

                debug!(round = stats.rounds, merged, "Offline optimization round");
                if merged == 0 {
                    break;
                }
            }
        }

        stats.constraints_after = constraints.len();
        stats.duration_ms = start.elapsed().as_secs_f64() * 1000.0;
        info!(
            rounds = stats.rounds,
            sccs = stats.offline_sccs,
            cycle_merges = stats.cycle_merges,
            pointer_merges = stats.pointer_merges,
            location_merges = stats.location_merges,
            before = stats.constraints_before,
            after = stats.constraints_after,
            duration_ms = stats.duration_ms,
            "Offline optimization finished"
        );
        stats
    }
}

/// Rewrite every operand to its representative; returns constraints removed
pub fn rewrite_to_reps(nodes: &mut NodeFactory, constraints: &mut ConstraintSet) -> usize {
    let reps = nodes.merge_targets();
    let content = |n: NodeIndex| reps.get(n as usize).copied().unwrap_or(n);
    let nodes = &*nodes;
    constraints.rewrite(content, |o| nodes.location_rep(o))
}

/// Collapse SCCs of the COPY subgraph; returns (components, merges)
fn collapse_copy_cycles(nodes: &mut NodeFactory, constraints: &ConstraintSet) -> (usize, usize) {
    let edges: Vec<(u32, u32)> = constraints
        .by_kind(ConstraintKind::Copy)
        .map(|c| (c.src, c.dst))
        .collect();
    if edges.is_empty() {
        return (0, 0);
    }

    let result = tarjan_scc(&edges);
    let mut merges = 0;
    for component in &result.sccs {
        let rep = component[0];
        for &member in &component[1..] {
            if nodes.merge(rep, member) {
                merges += 1;
            }
        }
    }
    (result.sccs.len(), merges)
}

/// Label atoms: an address-taken location, or an opaque node's whole set
#[inline]
fn adr(location: NodeIndex) -> u64 {
    (location as u64) << 1
}

#[inline]
fn opaque(node: NodeIndex) -> u64 {
    ((node as u64) << 1) | 1
}

/// Nodes whose sets can grow through edges the solver discovers while
/// running (loads, stores into objects, indirect call bindings), or that
/// are special. Their label is opaque: only themselves.
fn opaque_nodes(nodes: &NodeFactory, constraints: &ConstraintSet, reps: &[NodeIndex]) -> Vec<bool> {
    let rep = |n: NodeIndex| reps.get(n as usize).copied().unwrap_or(n) as usize;
    let mut opaque = vec![false; nodes.len()];

    for i in 0..nodes.len() as NodeIndex {
        if is_special(i) || nodes.is_object(i) {
            opaque[rep(i)] = true;
        }
    }
    for function in nodes.functions() {
        for slot in function.slots() {
            opaque[rep(slot)] = true;
        }
    }
    for c in constraints.by_kind(ConstraintKind::Load) {
        opaque[rep(c.dst)] = true;
    }
    for call in &constraints.call_sites {
        if let Some(result) = call.result {
            opaque[rep(result)] = true;
        }
    }
    opaque
}

/// Hash-based value numbering over the COPY graph
fn pointer_equivalence(nodes: &mut NodeFactory, constraints: &ConstraintSet) -> usize {
    let reps = nodes.merge_targets();
    let mut opaque_flags = opaque_nodes(nodes, constraints, &reps);

    let mut preds: FxHashMap<NodeIndex, Vec<NodeIndex>> = FxHashMap::default();
    let mut edges = Vec::new();
    for c in constraints.by_kind(ConstraintKind::Copy) {
        preds.entry(c.dst).or_default().push(c.src);
        edges.push((c.src, c.dst));
    }
    let mut addrs: FxHashMap<NodeIndex, Vec<NodeIndex>> = FxHashMap::default();
    for c in constraints.by_kind(ConstraintKind::AddrOf) {
        addrs.entry(c.dst).or_default().push(c.src);
    }

    // Cycles left uncollapsed get no structural label
    let copy_graph = tarjan_scc(&edges);
    for component in &copy_graph.sccs {
        for &member in component {
            opaque_flags[member as usize] = true;
        }
    }

    // Interned label sets; label 0 is the empty set
    let mut interner: FxHashMap<Vec<u64>, u32> = FxHashMap::default();
    let mut sets: Vec<Vec<u64>> = vec![Vec::new()];
    interner.insert(Vec::new(), 0);
    let mut labels: Vec<Option<u32>> = vec![None; nodes.len()];

    // Nodes without copy predecessors first, then the copy graph in topological order
    let order: Vec<NodeIndex> = (0..nodes.len() as NodeIndex)
        .filter(|&n| reps[n as usize] == n && !preds.contains_key(&n))
        .chain(copy_graph.topological().flatten().copied())
        .collect();

    for n in order {
        if labels[n as usize].is_some() {
            continue;
        }
        let mut atoms: Vec<u64> = if opaque_flags[n as usize] {
            vec![opaque(n)]
        } else {
            let mut atoms: Vec<u64> = addrs
                .get(&n)
                .into_iter()
                .flatten()
                .map(|&o| adr(o))
                .collect();
            for &p in preds.get(&n).into_iter().flatten() {
                let label = labels[p as usize].unwrap_or(0) as usize;
                atoms.extend_from_slice(&sets[label]);
            }
            atoms
        };
        atoms.sort_unstable();
        atoms.dedup();

        let next = sets.len() as u32;
        let label = *interner.entry(atoms.clone()).or_insert(next);
        if label == next {
            sets.push(atoms);
        }
        labels[n as usize] = Some(label);
    }

    // Group by label, keeping the smallest index as representative
    let mut groups: FxHashMap<u32, NodeIndex> = FxHashMap::default();
    let mut merges = 0;
    for n in 0..nodes.len() as NodeIndex {
        let Some(label) = labels[n as usize] else {
            continue;
        };
        if label == 0 {
            continue;
        }
        match groups.get(&label) {
            Some(&rep) => {
                if nodes.merge(rep, n) {
                    debug!(rep, node = n, label, "Pointer-equivalent nodes merged");
                    merges += 1;
                }
            }
            None => {
                groups.insert(label, n);
            }
        }
    }
    merges
}

/// Merge objects that always occur together and hold the same direct contents
fn location_equivalence(nodes: &mut NodeFactory, constraints: &ConstraintSet) -> usize {
    let reps = nodes.merge_targets();

    let candidate = |o: NodeIndex| {
        !is_special(o)
            && nodes.is_object(o)
            && !nodes.is_function(o)
            && reps[o as usize] == o
            && nodes.location_rep(o) == o
    };

    // Dynamic inflow other than stores disqualifies an object
    let mut dynamic = vec![false; nodes.len()];
    for c in constraints.by_kind(ConstraintKind::Load) {
        dynamic[c.dst as usize] = true;
    }
    for call in &constraints.call_sites {
        if let Some(result) = call.result {
            dynamic[result as usize] = true;
        }
    }
    for function in nodes.functions() {
        for slot in function.slots() {
            dynamic[reps[slot as usize] as usize] = true;
        }
    }

    #[derive(Default)]
    struct Signature {
        taken_by: Vec<NodeIndex>,
        copies: Vec<NodeIndex>,
        addresses: Vec<NodeIndex>,
    }

    let mut signatures: FxHashMap<NodeIndex, Signature> = FxHashMap::default();
    for c in constraints.iter() {
        match c.kind {
            ConstraintKind::AddrOf => {
                if candidate(c.src) {
                    signatures.entry(c.src).or_default().taken_by.push(c.dst);
                }
                if candidate(c.dst) {
                    signatures.entry(c.dst).or_default().addresses.push(c.src);
                }
            }
            ConstraintKind::Copy => {
                if candidate(c.dst) {
                    signatures.entry(c.dst).or_default().copies.push(c.src);
                }
            }
            ConstraintKind::Load | ConstraintKind::Store => {}
        }
    }

    let mut groups: FxHashMap<(Vec<NodeIndex>, Vec<NodeIndex>, Vec<NodeIndex>), Vec<NodeIndex>> =
        FxHashMap::default();
    for (object, mut sig) in signatures {
        if sig.taken_by.is_empty() || dynamic[object as usize] {
            continue;
        }
        for list in [&mut sig.taken_by, &mut sig.copies, &mut sig.addresses] {
            list.sort_unstable();
            list.dedup();
        }
        groups
            .entry((sig.taken_by, sig.copies, sig.addresses))
            .or_default()
            .push(object);
    }

    let mut merges = 0;
    let mut classes: Vec<Vec<NodeIndex>> = groups.into_values().filter(|g| g.len() > 1).collect();
    classes.sort_unstable();
    for mut class in classes {
        class.sort_unstable();
        let rep = class[0];
        for &member in &class[1..] {
            nodes.merge(rep, member);
            if nodes.merge_location(rep, member) {
                merges += 1;
            }
        }
    }
    merges
}
