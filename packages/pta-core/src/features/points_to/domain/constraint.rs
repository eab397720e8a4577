//! Points-to Analysis Constraints
//!
//! Four constraint kinds following Andersen's formulation:
//! - ADDR_OF: dst = &src   → pts(dst) ⊇ {src}
//! - COPY:    dst = src    → pts(dst) ⊇ pts(src)
//! - LOAD:    dst = *src   → ∀o ∈ pts(src): pts(dst) ⊇ pts(o)
//! - STORE:   *dst = src   → ∀o ∈ pts(dst): pts(o) ⊇ pts(src)
//!
//! Indirect call sites are kept beside the constraints; the solver turns them
//! into COPY edges once the callee's points-to set names concrete functions.

use super::node::NodeIndex;
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Constraint types for points-to analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ConstraintKind {
    /// dst = &src
    AddrOf,
    /// dst = src
    Copy,
    /// dst = *src
    Load,
    /// *dst = src
    Store,
}

impl ConstraintKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConstraintKind::AddrOf => "ADDR_OF",
            ConstraintKind::Copy => "COPY",
            ConstraintKind::Load => "LOAD",
            ConstraintKind::Store => "STORE",
        }
    }
}

/// A single constraint. Immutable once created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Constraint {
    pub kind: ConstraintKind,
    pub dst: NodeIndex,
    pub src: NodeIndex,
}

impl Constraint {
    #[inline]
    pub fn new(kind: ConstraintKind, dst: NodeIndex, src: NodeIndex) -> Self {
        Self { kind, dst, src }
    }

    /// dst = &src
    #[inline]
    pub fn addr_of(dst: NodeIndex, src: NodeIndex) -> Self {
        Self::new(ConstraintKind::AddrOf, dst, src)
    }

    /// dst = src
    #[inline]
    pub fn copy(dst: NodeIndex, src: NodeIndex) -> Self {
        Self::new(ConstraintKind::Copy, dst, src)
    }

    /// dst = *src
    #[inline]
    pub fn load(dst: NodeIndex, src: NodeIndex) -> Self {
        Self::new(ConstraintKind::Load, dst, src)
    }

    /// *dst = src
    #[inline]
    pub fn store(dst: NodeIndex, src: NodeIndex) -> Self {
        Self::new(ConstraintKind::Store, dst, src)
    }

    /// LOAD or STORE
    #[inline]
    pub fn is_complex(&self) -> bool {
        matches!(self.kind, ConstraintKind::Load | ConstraintKind::Store)
    }

    /// Same constraint with both operands mapped through `f`
    #[inline]
    pub fn map(self, mut f: impl FnMut(NodeIndex) -> NodeIndex) -> Self {
        Self::new(self.kind, f(self.dst), f(self.src))
    }

    /// COPY(x, x) has no effect
    #[inline]
    pub fn is_trivial(&self) -> bool {
        self.kind == ConstraintKind::Copy && self.dst == self.src
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ConstraintKind::AddrOf => write!(f, "{} = &{}", self.dst, self.src),
            ConstraintKind::Copy => write!(f, "{} = {}", self.dst, self.src),
            ConstraintKind::Load => write!(f, "{} = *{}", self.dst, self.src),
            ConstraintKind::Store => write!(f, "*{} = {}", self.dst, self.src),
        }
    }
}

/// A call through a function pointer
///
/// `actuals[k] == None` marks a non-pointer (or unmodeled) actual; the matching
/// formal then receives the universal pointer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CallSite {
    pub callee: NodeIndex,
    pub actuals: Vec<Option<NodeIndex>>,
    pub result: Option<NodeIndex>,
}

impl CallSite {
    pub fn new(callee: NodeIndex, actuals: Vec<Option<NodeIndex>>, result: Option<NodeIndex>) -> Self {
        Self {
            callee,
            actuals,
            result,
        }
    }

    /// Every node this call site mentions
    pub fn operands(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        std::iter::once(self.callee)
            .chain(self.actuals.iter().flatten().copied())
            .chain(self.result)
    }

    pub fn map(&self, mut f: impl FnMut(NodeIndex) -> NodeIndex) -> Self {
        Self {
            callee: f(self.callee),
            actuals: self.actuals.iter().map(|a| a.map(&mut f)).collect(),
            result: self.result.map(&mut f),
        }
    }
}

impl fmt::Display for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(result) = self.result {
            write!(f, "{} = ", result)?;
        }
        write!(f, "(*{})(", self.callee)?;
        for (i, actual) in self.actuals.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            match actual {
                Some(a) => write!(f, "{}", a)?,
                None => write!(f, "_")?,
            }
        }
        write!(f, ")")
    }
}

/// Constraint store with statistics
///
/// Append-only until solved. `dedup` removes structural duplicates.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConstraintSet {
    /// All constraints
    pub constraints: Vec<Constraint>,

    /// Call sites (direct and indirect)
    pub call_sites: Vec<CallSite>,

    /// Statistics
    pub addr_of_count: usize,
    pub copy_count: usize,
    pub load_count: usize,
    pub store_count: usize,
}

impl ConstraintSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            constraints: Vec::with_capacity(capacity),
            ..Default::default()
        }
    }

    /// Add a constraint and update statistics
    pub fn add(&mut self, constraint: Constraint) {
        self.count(constraint.kind, 1);
        self.constraints.push(constraint);
    }

    /// Add a call site
    pub fn add_call_site(&mut self, call: CallSite) {
        self.call_sites.push(call);
    }

    /// Move everything out of `other` into `self`
    pub fn append(&mut self, other: &mut ConstraintSet) {
        for c in other.constraints.drain(..) {
            self.add(c);
        }
        self.call_sites.append(&mut other.call_sites);
        other.recount();
    }

    fn count(&mut self, kind: ConstraintKind, delta: usize) {
        match kind {
            ConstraintKind::AddrOf => self.addr_of_count += delta,
            ConstraintKind::Copy => self.copy_count += delta,
            ConstraintKind::Load => self.load_count += delta,
            ConstraintKind::Store => self.store_count += delta,
        }
    }

    fn recount(&mut self) {
        self.addr_of_count = 0;
        self.copy_count = 0;
        self.load_count = 0;
        self.store_count = 0;
        for i in 0..self.constraints.len() {
            let kind = self.constraints[i].kind;
            self.count(kind, 1);
        }
    }

    /// Remove structural duplicates (and COPY(x, x)). Returns how many were removed.
    ///
    /// Order is normalized (sorted) afterwards.
    pub fn dedup(&mut self) -> usize {
        let before = self.constraints.len() + self.call_sites.len();

        self.constraints.retain(|c| !c.is_trivial());
        #[cfg(feature = "parallel")]
        self.constraints.par_sort_unstable();
        #[cfg(not(feature = "parallel"))]
        self.constraints.sort_unstable();
        self.constraints.dedup();

        self.call_sites.sort_unstable();
        self.call_sites.dedup();

        self.recount();
        before - (self.constraints.len() + self.call_sites.len())
    }

    /// Rewrite operands to representatives, then dedup
    ///
    /// `content` maps a node to the node holding its points-to set. The source
    /// of an ADDR_OF is an element, not a set holder, so it goes through
    /// `location` instead and keeps its object identity.
    pub fn rewrite(
        &mut self,
        mut content: impl FnMut(NodeIndex) -> NodeIndex,
        mut location: impl FnMut(NodeIndex) -> NodeIndex,
    ) -> usize {
        for c in self.constraints.iter_mut() {
            *c = match c.kind {
                ConstraintKind::AddrOf => Constraint::addr_of(content(c.dst), location(c.src)),
                _ => c.map(&mut content),
            };
        }
        for call in self.call_sites.iter_mut() {
            *call = call.map(&mut content);
        }
        self.dedup()
    }

    /// Total number of constraints
    #[inline]
    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    /// Check if empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty() && self.call_sites.is_empty()
    }

    /// Iterate over constraints
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &Constraint> {
        self.constraints.iter()
    }

    /// Get constraints by kind
    pub fn by_kind(&self, kind: ConstraintKind) -> impl Iterator<Item = &Constraint> {
        self.constraints.iter().filter(move |c| c.kind == kind)
    }

    /// Highest node index mentioned, if any
    pub fn max_node(&self) -> Option<NodeIndex> {
        self.constraints
            .iter()
            .flat_map(|c| [c.dst, c.src])
            .chain(self.call_sites.iter().flat_map(|cs| cs.operands().collect::<Vec<_>>()))
            .max()
    }

    /// One constraint per line, in the `dst = *src` notation
    pub fn dump(&self) -> String {
        let mut out = String::new();
        for c in &self.constraints {
            out.push_str(&c.to_string());
            out.push('\n');
        }
        for call in &self.call_sites {
            out.push_str(&call.to_string());
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors() {
        let c = Constraint::addr_of(1, 10);
        assert_eq!(c.kind, ConstraintKind::AddrOf);
        assert_eq!(c.dst, 1);
        assert_eq!(c.src, 10);
        assert!(!c.is_complex());

        assert!(Constraint::load(1, 2).is_complex());
        assert!(Constraint::store(1, 2).is_complex());
        assert!(!Constraint::copy(1, 2).is_complex());
    }

    #[test]
    fn test_display() {
        assert_eq!(Constraint::addr_of(5, 6).to_string(), "5 = &6");
        assert_eq!(Constraint::copy(5, 6).to_string(), "5 = 6");
        assert_eq!(Constraint::load(5, 6).to_string(), "5 = *6");
        assert_eq!(Constraint::store(5, 6).to_string(), "*5 = 6");

        let call = CallSite::new(9, vec![Some(4), None], Some(7));
        assert_eq!(call.to_string(), "7 = (*9)(4, _)");
    }

    #[test]
    fn test_constraint_set_counts() {
        let mut set = ConstraintSet::new();
        set.add(Constraint::addr_of(1, 10));
        set.add(Constraint::copy(2, 1));
        set.add(Constraint::load(3, 2));

        assert_eq!(set.len(), 3);
        assert_eq!(set.addr_of_count, 1);
        assert_eq!(set.copy_count, 1);
        assert_eq!(set.load_count, 1);
        assert_eq!(set.store_count, 0);
    }

    #[test]
    fn test_dedup_removes_duplicates_and_self_copies() {
        let mut set = ConstraintSet::new();
        set.add(Constraint::copy(2, 1));
        set.add(Constraint::copy(2, 1));
        set.add(Constraint::copy(3, 3));
        set.add(Constraint::store(2, 1));
        set.add_call_site(CallSite::new(4, vec![Some(1)], None));
        set.add_call_site(CallSite::new(4, vec![Some(1)], None));

        let removed = set.dedup();
        assert_eq!(removed, 3);
        assert_eq!(set.len(), 2);
        assert_eq!(set.copy_count, 1);
        assert_eq!(set.store_count, 1);
        assert_eq!(set.call_sites.len(), 1);
    }

    #[test]
    fn test_rewrite_through_representatives() {
        let mut set = ConstraintSet::new();
        set.add(Constraint::copy(5, 6));
        set.add(Constraint::copy(7, 6));
        set.add(Constraint::load(8, 6));

        set.add(Constraint::addr_of(6, 7));

        // 6 and 7 merged into 5; ADDR_OF keeps its element
        let removed = set.rewrite(|n| if n == 6 || n == 7 { 5 } else { n }, |n| n);
        assert_eq!(removed, 2);
        assert_eq!(
            set.constraints,
            vec![Constraint::addr_of(5, 7), Constraint::load(8, 5)]
        );
    }

    #[test]
    fn test_max_node() {
        let mut set = ConstraintSet::new();
        assert_eq!(set.max_node(), None);
        set.add(Constraint::copy(2, 1));
        set.add_call_site(CallSite::new(4, vec![None], Some(11)));
        assert_eq!(set.max_node(), Some(11));
    }
}
