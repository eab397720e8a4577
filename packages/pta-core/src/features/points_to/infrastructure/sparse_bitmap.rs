//! Sparse Bitmap for Points-to Sets
//!
//! Sorted list of `(block, word)` pairs: block `b` holds elements
//! `b*64 .. b*64+63` in one `u64`. Only non-empty words are stored, so two
//! bitmaps are equal as sets iff they are structurally equal.
//!
//! # Performance Characteristics
//! - Insert/Contains: O(log B) binary search over blocks
//! - Union/Intersects/Difference: O(B1 + B2) merge over blocks
//! - Memory: O(B) where B = number of non-empty 64-element blocks
//!
//! # References
//! - Hardekopf & Lin "The Ant and the Grasshopper" (PLDI 2007), sparse bitvector sets

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

const WORD_BITS: u32 = 64;

#[inline]
fn split(element: u32) -> (u32, u64) {
    (element / WORD_BITS, 1u64 << (element % WORD_BITS))
}

/// Sparse bitmap over dense `u32` indices
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SparseBitmap {
    /// (block index, bits), sorted by block, no zero words
    blocks: Vec<(u32, u64)>,
}

impl SparseBitmap {
    /// Create an empty bitmap
    #[inline]
    pub fn new() -> Self {
        Self { blocks: Vec::new() }
    }

    /// Create from a single element
    #[inline]
    pub fn singleton(element: u32) -> Self {
        let (block, bit) = split(element);
        Self {
            blocks: vec![(block, bit)],
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Basic Operations
    // ═══════════════════════════════════════════════════════════════════════

    /// Insert an element. Returns true if element was not present.
    #[inline]
    pub fn insert(&mut self, element: u32) -> bool {
        let (block, bit) = split(element);
        match self.blocks.binary_search_by_key(&block, |&(b, _)| b) {
            Ok(pos) => {
                let word = &mut self.blocks[pos].1;
                let changed = *word & bit == 0;
                *word |= bit;
                changed
            }
            Err(pos) => {
                self.blocks.insert(pos, (block, bit));
                true
            }
        }
    }

    /// Check if element is present
    #[inline]
    pub fn contains(&self, element: u32) -> bool {
        let (block, bit) = split(element);
        match self.blocks.binary_search_by_key(&block, |&(b, _)| b) {
            Ok(pos) => self.blocks[pos].1 & bit != 0,
            Err(_) => false,
        }
    }

    /// Number of elements
    #[inline]
    pub fn len(&self) -> usize {
        self.blocks
            .iter()
            .map(|&(_, w)| w.count_ones() as usize)
            .sum()
    }

    /// Check if empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Clear all elements
    #[inline]
    pub fn clear(&mut self) {
        self.blocks.clear();
    }

    /// Iterate over elements in ascending order
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.blocks.iter().flat_map(|&(block, word)| BitIter {
            base: block * WORD_BITS,
            word,
        })
    }

    /// Smallest element
    #[inline]
    pub fn first(&self) -> Option<u32> {
        self.blocks
            .first()
            .map(|&(block, word)| block * WORD_BITS + word.trailing_zeros())
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Set Operations
    // ═══════════════════════════════════════════════════════════════════════

    /// Union: self = self ∪ other. Returns true if self grew.
    pub fn union_with(&mut self, other: &SparseBitmap) -> bool {
        if other.is_empty() {
            return false;
        }
        if self.is_empty() {
            self.blocks = other.blocks.clone();
            return true;
        }

        let mut changed = false;
        let mut result = Vec::with_capacity(self.blocks.len().max(other.blocks.len()));
        let (mut i, mut j) = (0, 0);

        while i < self.blocks.len() && j < other.blocks.len() {
            let (a_block, a_word) = self.blocks[i];
            let (b_block, b_word) = other.blocks[j];
            match a_block.cmp(&b_block) {
                Ordering::Less => {
                    result.push((a_block, a_word));
                    i += 1;
                }
                Ordering::Greater => {
                    result.push((b_block, b_word));
                    changed = true;
                    j += 1;
                }
                Ordering::Equal => {
                    let merged = a_word | b_word;
                    changed |= merged != a_word;
                    result.push((a_block, merged));
                    i += 1;
                    j += 1;
                }
            }
        }
        result.extend_from_slice(&self.blocks[i..]);
        if j < other.blocks.len() {
            changed = true;
            result.extend_from_slice(&other.blocks[j..]);
        }

        if changed {
            self.blocks = result;
        }
        changed
    }

    /// Elements of self that are not in other
    pub fn difference(&self, other: &SparseBitmap) -> SparseBitmap {
        let mut blocks = Vec::new();
        let mut j = 0;
        for &(block, word) in &self.blocks {
            while j < other.blocks.len() && other.blocks[j].0 < block {
                j += 1;
            }
            let remaining = if j < other.blocks.len() && other.blocks[j].0 == block {
                word & !other.blocks[j].1
            } else {
                word
            };
            if remaining != 0 {
                blocks.push((block, remaining));
            }
        }
        SparseBitmap { blocks }
    }

    /// Check if sets intersect (faster than computing full intersection)
    pub fn intersects(&self, other: &SparseBitmap) -> bool {
        let (mut i, mut j) = (0, 0);
        while i < self.blocks.len() && j < other.blocks.len() {
            let (a_block, a_word) = self.blocks[i];
            let (b_block, b_word) = other.blocks[j];
            match a_block.cmp(&b_block) {
                Ordering::Less => i += 1,
                Ordering::Greater => j += 1,
                Ordering::Equal => {
                    if a_word & b_word != 0 {
                        return true;
                    }
                    i += 1;
                    j += 1;
                }
            }
        }
        false
    }

    /// Check if self is subset of other
    pub fn is_subset_of(&self, other: &SparseBitmap) -> bool {
        self.difference(other).is_empty()
    }
}

impl FromIterator<u32> for SparseBitmap {
    fn from_iter<I: IntoIterator<Item = u32>>(iter: I) -> Self {
        let mut bitmap = SparseBitmap::new();
        for element in iter {
            bitmap.insert(element);
        }
        bitmap
    }
}

/// Iterator over set bits of one word
struct BitIter {
    base: u32,
    word: u64,
}

impl Iterator for BitIter {
    type Item = u32;

    #[inline]
    fn next(&mut self) -> Option<u32> {
        if self.word == 0 {
            return None;
        }
        let offset = self.word.trailing_zeros();
        self.word &= self.word - 1;
        Some(self.base + offset)
    }
}
