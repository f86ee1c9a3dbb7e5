//! Best-first walk over the candidate graph.
//!
//! The walk starts from the highest-scoring vertex plus any seed vertices and
//! repeatedly visits the best-scoring vertex adjacent to something already
//! visited. A vertex is therefore only ever reached through a neighbor, and
//! components holding neither a seed nor the global maximum are never visited.
//!
//! ```text
//!   visited   = [argmax] ++ seeds
//!   frontier  = neighbors(visited) \ visited          (max-heap on score)
//!   loop: v = pop_max(frontier); visited.push(v);
//!         frontier += neighbors(v) \ (visited ∪ frontier)
//! ```

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::bitset::Bitset;
use crate::graph::CandidateGraph;

/// Heap entry: higher score first, lower index first on equal scores.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    score: f64,
    idx: usize,
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then_with(|| other.idx.cmp(&self.idx))
    }
}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

/// Unvisited vertices adjacent to the visited set.
struct Frontier<'g> {
    graph: &'g CandidateGraph,
    heap: BinaryHeap<Candidate>,
    /// Visited or queued; a vertex enters the heap at most once.
    seen: Bitset,
}

impl<'g> Frontier<'g> {
    fn new(graph: &'g CandidateGraph) -> Self {
        Frontier { graph, heap: BinaryHeap::new(), seen: Bitset::new() }
    }

    /// Record `idx` as seen. Returns false if it already was.
    fn mark(&mut self, idx: usize) -> bool {
        if self.seen.contains(idx) {
            return false;
        }
        self.seen.set(idx);
        true
    }

    fn push_neighbors_of(&mut self, idx: usize) {
        for &n in self.graph.neighbors(idx) {
            if self.mark(n) {
                self.heap.push(Candidate { score: self.graph.score(n), idx: n });
            }
        }
    }

    fn pop(&mut self) -> Option<usize> {
        self.heap.pop().map(|c| c.idx)
    }
}

/// Index of the first vertex with maximal score.
fn argmax(graph: &CandidateGraph) -> Option<usize> {
    (0..graph.vertex_count()).reduce(|best, idx| {
        if graph.score(idx).total_cmp(&graph.score(best)) == Ordering::Greater {
            idx
        } else {
            best
        }
    })
}

/// Visit vertices best-first along graph edges, starting from the top-scoring
/// vertex and `seeds`.
///
/// Returns vertex indices in visitation order without duplicates. An empty
/// graph yields an empty list.
pub fn max_weight_neighbor_traversal(graph: &CandidateGraph, seeds: &[usize]) -> Vec<usize> {
    let Some(start) = argmax(graph) else {
        return Vec::new();
    };

    let mut frontier = Frontier::new(graph);
    let mut visited = Vec::with_capacity(graph.vertex_count());

    let mut initial: Vec<usize> = Vec::with_capacity(seeds.len() + 1);
    if !seeds.contains(&start) {
        initial.push(start);
    }
    initial.extend(seeds.iter().copied().filter(|&s| s < graph.vertex_count()));
    for idx in initial {
        if frontier.mark(idx) {
            visited.push(idx);
        }
    }

    for &idx in &visited {
        frontier.push_neighbors_of(idx);
    }

    while let Some(idx) = frontier.pop() {
        visited.push(idx);
        frontier.push_neighbors_of(idx);
    }
    visited
}
