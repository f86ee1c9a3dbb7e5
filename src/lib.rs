//! Crate root: lightweight module orchestration and public re-exports.
//!
//! Modules:
//! - `error`: the crate-wide `WalkError`.
//! - `bitset`: arbitrary-width encoding of a tree's subsplit-DAG node set.
//! - `io`: reading tree-representation files and writing walk results.
//! - `alignment`: FASTA alignments and informative-site reduction.
//! - `scoring`: log-likelihood or negated parsimony scores per tree.
//! - `adjacency`: the bit-difference NNI-adjacency test.
//! - `graph`: candidate graph over the top scored trees.
//! - `traversal`: best-first neighbor walk over the graph.
//! - `walk`: end-to-end driver used by the binary and the bindings.
//! - `api`: Python bindings via `pyo3` (gated behind "python" feature).

pub mod adjacency;
pub mod alignment;
pub mod bitset;
pub mod error;
pub mod graph;
pub mod io;
pub mod scoring;
pub mod traversal;
pub mod walk;

#[cfg(feature = "python")]
pub mod api;

// Re-export frequently used types & functions
pub use adjacency::{NNI_THRESHOLD, find_adjacent_from, is_nni_adjacent};
pub use bitset::{Bitset, EncodedTree};
pub use error::{Result, WalkError};
pub use graph::{CandidateGraph, build, capped_vertex_count};
pub use io::{load_trees, write_walk};
pub use traversal::max_weight_neighbor_traversal;
pub use walk::{WalkConfig, WalkResult, run_walk};
