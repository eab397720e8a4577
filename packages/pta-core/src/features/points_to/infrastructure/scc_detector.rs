//! Strongly Connected Component Detection
//!
//! Tarjan's algorithm over an edge list, iterative so that long copy chains
//! cannot overflow the call stack. Used by the offline optimizer (cycles in
//! the COPY subgraph) and by the solver's lazy cycle detection.
//!
//! In a constraint graph like
//!   x ⊇ y, y ⊇ z, z ⊇ x (cycle)
//! all variables in the cycle end with the same points-to set.
//!
//! # References
//! - Tarjan, R. "Depth-First Search and Linear Graph Algorithms" (1972)
//! - Nuutila, E. "On Finding the Strongly Connected Components" (1994)

use rustc_hash::FxHashMap;
use std::cmp::min;

/// Result of SCC detection
#[derive(Debug, Clone, Default)]
pub struct SccResult {
    /// Member → representative (smallest member), cycles only
    pub var_to_rep: FxHashMap<u32, u32>,

    /// Components with more than one member, each sorted
    pub sccs: Vec<Vec<u32>>,

    /// Every component in emission order: a component is emitted only after
    /// every component reachable from it, so this is reverse topological order
    pub components: Vec<Vec<u32>>,

    /// Statistics
    pub stats: SccStats,
}

#[derive(Debug, Clone, Default)]
pub struct SccStats {
    pub total_nodes: usize,
    pub total_edges: usize,
    pub scc_count: usize,
    pub largest_scc: usize,
    pub collapsed_nodes: usize,
}

impl SccResult {
    /// Components ordered so that every edge goes from an earlier to a later one
    pub fn topological(&self) -> impl Iterator<Item = &Vec<u32>> {
        self.components.iter().rev()
    }
}

/// Tarjan's SCC algorithm over `(src, dst)` edges
///
/// Time: O(V + E)
/// Space: O(V)
pub fn tarjan_scc(edges: &[(u32, u32)]) -> SccResult {
    let mut adj: FxHashMap<u32, Vec<u32>> = FxHashMap::default();
    for &(src, dst) in edges {
        adj.entry(src).or_default().push(dst);
        adj.entry(dst).or_default();
    }
    for succs in adj.values_mut() {
        succs.sort_unstable();
        succs.dedup();
    }

    let mut roots: Vec<u32> = adj.keys().copied().collect();
    roots.sort_unstable();

    let mut state = TarjanState::default();
    for &root in &roots {
        if !state.index.contains_key(&root) {
            state.run(root, &adj);
        }
    }

    let mut var_to_rep = FxHashMap::default();
    let mut sccs = Vec::new();
    let mut collapsed = 0;
    for component in &state.components {
        if component.len() > 1 {
            let rep = component[0];
            for &member in component {
                var_to_rep.insert(member, rep);
            }
            collapsed += component.len() - 1;
            sccs.push(component.clone());
        }
    }

    let largest = state.components.iter().map(Vec::len).max().unwrap_or(0);

    SccResult {
        var_to_rep,
        stats: SccStats {
            total_nodes: roots.len(),
            total_edges: edges.len(),
            scc_count: sccs.len(),
            largest_scc: largest,
            collapsed_nodes: collapsed,
        },
        sccs,
        components: state.components,
    }
}

#[derive(Default)]
struct TarjanState {
    index: FxHashMap<u32, usize>,
    lowlink: FxHashMap<u32, usize>,
    on_stack: FxHashMap<u32, bool>,
    stack: Vec<u32>,
    current_index: usize,
    components: Vec<Vec<u32>>,
}

impl TarjanState {
    fn visit(&mut self, v: u32) {
        self.index.insert(v, self.current_index);
        self.lowlink.insert(v, self.current_index);
        self.current_index += 1;
        self.stack.push(v);
        self.on_stack.insert(v, true);
    }

    fn lower(&mut self, v: u32, candidate: usize) {
        if let Some(low) = self.lowlink.get_mut(&v) {
            *low = min(*low, candidate);
        }
    }

    fn run(&mut self, root: u32, adj: &FxHashMap<u32, Vec<u32>>) {
        // (node, next successor position)
        let mut frames: Vec<(u32, usize)> = vec![(root, 0)];
        self.visit(root);

        while let Some(&(v, pos)) = frames.last() {
            let succs = adj.get(&v).map(Vec::as_slice).unwrap_or(&[]);

            if let Some(&w) = succs.get(pos) {
                if let Some(frame) = frames.last_mut() {
                    frame.1 += 1;
                }
                match self.index.get(&w).copied() {
                    None => {
                        self.visit(w);
                        frames.push((w, 0));
                    }
                    Some(w_index) => {
                        if self.on_stack.get(&w).copied().unwrap_or(false) {
                            self.lower(v, w_index);
                        }
                    }
                }
                continue;
            }

            frames.pop();
            let v_low = self.lowlink[&v];
            if let Some(&(parent, _)) = frames.last() {
                self.lower(parent, v_low);
            }

            if v_low == self.index[&v] {
                let mut component = Vec::new();
                while let Some(w) = self.stack.pop() {
                    self.on_stack.insert(w, false);
                    component.push(w);
                    if w == v {
                        break;
                    }
                }
                component.sort_unstable();
                self.components.push(component);
            }
        }
    }
}
