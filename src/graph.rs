//! Undirected candidate graph over the best-scoring trees.
//!
//! Vertices live in a contiguous arena indexed `0..vertex_count`, in the
//! caller's preference order (best score first after sorting). Edges are index
//! pairs into that arena, found by the NNI-adjacency test in parallel.

use std::collections::HashMap;

use log::debug;
use rayon::prelude::*;

use crate::adjacency::find_adjacent_from;
use crate::bitset::EncodedTree;

#[derive(Debug, Clone, PartialEq)]
pub struct Vertex {
    pub tree: EncodedTree,
    pub score: f64,
}

/// Read-only graph of trees joined by NNI-adjacency.
#[derive(Debug, Clone, Default)]
pub struct CandidateGraph {
    vertices: Vec<Vertex>,
    /// Each edge once, as `(j, k)` with `j < k`.
    edges: Vec<(usize, usize)>,
    neighbors: Vec<Vec<usize>>,
}

impl CandidateGraph {
    /// Assemble a graph from vertices and `(j, k)`, `j < k` index pairs.
    pub fn from_parts(vertices: Vec<Vertex>, mut edges: Vec<(usize, usize)>) -> Self {
        edges.sort_unstable();
        edges.dedup();
        let mut neighbors = vec![Vec::new(); vertices.len()];
        for &(j, k) in &edges {
            neighbors[j].push(k);
            neighbors[k].push(j);
        }
        CandidateGraph { vertices, edges, neighbors }
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn vertex(&self, idx: usize) -> &Vertex {
        &self.vertices[idx]
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn edges(&self) -> &[(usize, usize)] {
        &self.edges
    }

    pub fn neighbors(&self, idx: usize) -> &[usize] {
        &self.neighbors[idx]
    }

    pub fn score(&self, idx: usize) -> f64 {
        self.vertices[idx].score
    }

    /// Indices of every vertex whose tree appears in `trees`, ascending.
    pub fn find_vertices(&self, trees: &[EncodedTree]) -> Vec<usize> {
        let mut by_tree: HashMap<&EncodedTree, Vec<usize>> = HashMap::new();
        for (idx, v) in self.vertices.iter().enumerate() {
            by_tree.entry(&v.tree).or_default().push(idx);
        }
        let mut found: Vec<usize> = trees
            .iter()
            .filter_map(|t| by_tree.get(t))
            .flatten()
            .copied()
            .collect();
        found.sort_unstable();
        found.dedup();
        found
    }
}

/// Number of vertices to keep out of `total` sorted trees.
///
/// `max_ratio > 0` keeps `floor(max_ratio * total)`, `max_count > 0` keeps at
/// most `max_count`; with both, the smaller wins. Non-positive caps are off.
pub fn capped_vertex_count(total: usize, max_count: usize, max_ratio: f64) -> usize {
    let mut count = total;
    if max_ratio > 0.0 {
        count = count.min((max_ratio * total as f64).floor() as usize);
    }
    if max_count > 0 {
        count = count.min(max_count);
    }
    count
}

/// Build the graph over the first `vertex_count` trees and scores.
///
/// `trees` and `scores` are index-aligned and of equal length. Edge discovery
/// runs one forward scan per vertex on the current rayon pool.
pub fn build(trees: &[EncodedTree], scores: &[f64], vertex_count: usize) -> CandidateGraph {
    debug_assert_eq!(trees.len(), scores.len(), "trees and scores must be index-aligned");
    let n = vertex_count.min(trees.len());
    let universe = &trees[..n];

    let vertices: Vec<Vertex> = universe
        .iter()
        .zip(&scores[..n])
        .map(|(tree, &score)| Vertex { tree: tree.clone(), score })
        .collect();

    let edges: Vec<(usize, usize)> = (0..n.saturating_sub(1))
        .into_par_iter()
        .map(|j| find_adjacent_from(j, universe))
        .collect::<Vec<_>>()
        .into_iter()
        .flatten()
        .collect();

    debug!("candidate graph: {n} vertices, {} edges", edges.len());
    CandidateGraph::from_parts(vertices, edges)
}
