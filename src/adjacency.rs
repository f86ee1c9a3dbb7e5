//! Pairwise NNI-adjacency test on encoded trees.
//!
//! Two trees count as one nearest-neighbor interchange apart when their
//! encodings differ in at most [`NNI_THRESHOLD`] bits. This holds for the
//! fixed-width subsplit representation written by the subsplit-DAG exporter,
//! where one NNI swaps a bounded number of DAG nodes; it is not a general
//! topological NNI test.

use crate::bitset::EncodedTree;

/// Maximum number of differing subsplit-DAG nodes between NNI neighbors.
pub const NNI_THRESHOLD: usize = 10;

/// True iff `popcount(a XOR b) <= NNI_THRESHOLD`.
#[inline]
pub fn is_nni_adjacent(a: &EncodedTree, b: &EncodedTree) -> bool {
    a.xor_count_ones(b) <= NNI_THRESHOLD
}

/// All pairs `(j, k)` with `k > j` whose trees are NNI-adjacent.
///
/// Pure in its inputs, so calls for different `j` can run concurrently and
/// their results be concatenated in any order.
pub fn find_adjacent_from(j: usize, universe: &[EncodedTree]) -> Vec<(usize, usize)> {
    let Some(this) = universe.get(j) else {
        return Vec::new();
    };
    universe[j + 1..]
        .iter()
        .enumerate()
        .filter(|(_, other)| is_nni_adjacent(this, other))
        .map(|(offset, _)| (j, j + 1 + offset))
        .collect()
}
