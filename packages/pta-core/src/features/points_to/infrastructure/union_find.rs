//! Union-Find (Disjoint Set Union) for the Merge Relation
//!
//! Dense parent array over node indices with:
//! - Path compression: O(α(n)) amortized `find`
//! - Explicit representative: `merge(into, from)` keeps `into` as the root,
//!   so the caller decides which index survives (the optimizer and solver
//!   always keep the smaller index, which keeps the special nodes canonical)
//!
//! # References
//! - Tarjan, R. E. "Efficiency of a Good But Not Linear Set Union Algorithm" (1975)

use serde::{Deserialize, Serialize};

/// Union-Find with path compression and caller-chosen representatives
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UnionFind {
    /// Parent pointers (self-loop = root)
    parent: Vec<u32>,

    /// Size of each set (only valid for roots)
    size: Vec<u32>,

    /// Number of disjoint sets
    set_count: usize,
}

impl UnionFind {
    /// Create a new Union-Find with n elements (0..n-1)
    pub fn new(n: usize) -> Self {
        Self {
            parent: (0..n as u32).collect(),
            size: vec![1; n],
            set_count: n,
        }
    }

    /// Ensure element exists in the structure
    pub fn make_set(&mut self, x: u32) {
        let old_len = self.parent.len();
        let new_len = x as usize + 1;
        if new_len > old_len {
            self.parent.extend(old_len as u32..new_len as u32);
            self.size.resize(new_len, 1);
            self.set_count += new_len - old_len;
        }
    }

    /// Number of elements
    #[inline]
    pub fn len(&self) -> usize {
        self.parent.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }

    /// Number of disjoint sets
    #[inline]
    pub fn set_count(&self) -> usize {
        self.set_count
    }

    /// Find the representative of x with path compression
    ///
    /// Elements outside the structure are their own representative.
    pub fn find(&mut self, x: u32) -> u32 {
        if x as usize >= self.parent.len() {
            return x;
        }

        let mut root = x;
        while self.parent[root as usize] != root {
            root = self.parent[root as usize];
        }

        let mut cur = x;
        while cur != root {
            let next = self.parent[cur as usize];
            self.parent[cur as usize] = root;
            cur = next;
        }
        root
    }

    /// Find without compression, giving up after `len()` hops
    ///
    /// Returns `None` when the chain does not terminate, which only happens if
    /// the parent array was corrupted.
    pub fn find_checked(&self, x: u32) -> Option<u32> {
        if x as usize >= self.parent.len() {
            return Some(x);
        }

        let mut cur = x;
        for _ in 0..=self.parent.len() {
            let parent = self.parent[cur as usize];
            if parent == cur {
                return Some(cur);
            }
            cur = parent;
        }
        None
    }

    /// Merge the set of `from` into the set of `into`
    ///
    /// The root of `into` stays the representative. Returns false if both
    /// were already in the same set.
    pub fn merge(&mut self, into: u32, from: u32) -> bool {
        self.make_set(into.max(from));
        let root_into = self.find(into);
        let root_from = self.find(from);
        if root_into == root_from {
            return false;
        }

        self.parent[root_from as usize] = root_into;
        self.size[root_into as usize] += self.size[root_from as usize];
        self.set_count -= 1;
        true
    }

    /// Check if x and y are in the same set
    #[inline]
    pub fn connected(&mut self, x: u32, y: u32) -> bool {
        self.find(x) == self.find(y)
    }

    /// Size of the set containing x
    pub fn set_size(&mut self, x: u32) -> usize {
        if x as usize >= self.parent.len() {
            return 1;
        }
        let root = self.find(x);
        self.size[root as usize] as usize
    }

    /// Representative of every element, fully compressed
    pub fn roots(&mut self) -> Vec<u32> {
        (0..self.parent.len() as u32).map(|x| self.find(x)).collect()
    }

    /// Forget all merges, keeping the element count
    pub fn reset(&mut self) {
        let n = self.parent.len();
        *self = Self::new(n);
    }
}
