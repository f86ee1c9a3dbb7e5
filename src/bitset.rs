//! Arbitrary-width bitset encoding of a tree's subsplit-DAG node set.
//!
//! # Overview
//! Every tree exported from a subsplit DAG is a set of DAG node indices. We
//! encode such a set as one (conceptually unbounded) integer: bit `j` is set
//! exactly when node `j` belongs to the tree.
//!
//! # Example
//! Node list `[5, 2, 0, 1]` → `0b100111` (bits 0, 1, 2 and 5 set) = 39.
//!
//! Node indices can be far beyond 64, so the bits live in `Vec<u64>` words.
//! The vector never carries trailing all-zero words, which keeps equality and
//! hashing value-based: two bitsets holding the same node set are equal no
//! matter how they were built.

/// A compact, growable bitset over subsplit-DAG node indices.
///
/// Internally stores bits in `Vec<u64>` words, low word first. The last word,
/// if any, is always non-zero.
#[derive(Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Bitset(Vec<u64>);

/// The subsplit-DAG node set of one tree, as an arbitrary-precision integer.
pub type EncodedTree = Bitset;

impl Bitset {
    /// Creates the empty bitset (the integer `0`).
    pub fn new() -> Self {
        Bitset(Vec::new())
    }

    /// Encodes a collection of node indices.
    ///
    /// Order and duplicates in `indices` do not matter.
    ///
    /// # Example
    /// ```
    /// # use rust_python_nni_walk::bitset::Bitset;
    /// let bs = Bitset::from_indices([5, 2, 0, 1]);
    /// assert_eq!(bs.words(), &[39]);
    /// ```
    pub fn from_indices<I: IntoIterator<Item = usize>>(indices: I) -> Self {
        let mut bitset = Bitset::new();
        for idx in indices {
            bitset.set(idx);
        }
        bitset
    }

    /// Sets the bit at the given index to 1, growing the word vector if needed.
    ///
    /// # Example
    /// ```
    /// # use rust_python_nni_walk::bitset::Bitset;
    /// let mut bs = Bitset::new();
    /// bs.set(0);
    /// bs.set(64);
    /// assert_eq!(bs.words(), &[1, 1]);
    /// ```
    #[inline]
    pub fn set(&mut self, idx: usize) {
        let word = idx >> 6;     // Equivalent to idx / 64
        let bit = idx & 63;      // Equivalent to idx % 64
        if word >= self.0.len() {
            self.0.resize(word + 1, 0);
        }
        self.0[word] |= 1u64 << bit;
    }

    /// Returns whether the bit at `idx` is set.
    #[inline]
    pub fn contains(&self, idx: usize) -> bool {
        self.0
            .get(idx >> 6)
            .is_some_and(|w| (w >> (idx & 63)) & 1 == 1)
    }

    /// Decodes the bitset back into node indices, in ascending order.
    ///
    /// # Example
    /// ```
    /// # use rust_python_nni_walk::bitset::Bitset;
    /// let bs = Bitset::from_indices([70, 3, 0]);
    /// assert_eq!(bs.ones(), vec![0, 3, 70]);
    /// ```
    pub fn ones(&self) -> Vec<usize> {
        let mut out = Vec::with_capacity(self.count_ones());
        for (w, &word) in self.0.iter().enumerate() {
            let mut rest = word;
            while rest != 0 {
                let bit = rest.trailing_zeros() as usize;
                out.push((w << 6) | bit);
                rest &= rest - 1;
            }
        }
        out
    }

    /// Counts the number of set bits (population count).
    #[inline]
    pub fn count_ones(&self) -> usize {
        self.0.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Population count of `self XOR other`: the number of node indices in
    /// exactly one of the two sets.
    ///
    /// # Example
    /// ```
    /// # use rust_python_nni_walk::bitset::Bitset;
    /// let a = Bitset::from_indices([0, 1, 2]);
    /// let b = Bitset::from_indices([1, 2, 100]);
    /// assert_eq!(a.xor_count_ones(&b), 2);
    /// ```
    pub fn xor_count_ones(&self, other: &Bitset) -> usize {
        let (long, short) = if self.0.len() >= other.0.len() {
            (&self.0, &other.0)
        } else {
            (&other.0, &self.0)
        };
        let shared: usize = long
            .iter()
            .zip(short)
            .map(|(a, b)| (a ^ b).count_ones() as usize)
            .sum();
        let tail: usize = long[short.len()..]
            .iter()
            .map(|w| w.count_ones() as usize)
            .sum();
        shared + tail
    }

    /// True for the encoding of the empty node set.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Raw words, low word first, without trailing zero words.
    #[inline]
    pub fn words(&self) -> &[u64] {
        &self.0
    }
}
