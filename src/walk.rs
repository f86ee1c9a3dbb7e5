//! End-to-end NNI likelihood walk: load, score, build, traverse, write.

use std::path::PathBuf;
use std::time::Instant;

use log::info;

use crate::bitset::EncodedTree;
use crate::error::{Result, WalkError};
use crate::graph::{CandidateGraph, build, capped_vertex_count};
use crate::io::{load_trees, parse_tree_file, write_walk};
use crate::scoring::{ScoreMode, ScoringContext, ScoringOptions, resolve_scores, sort_by_score_descending};
use crate::traversal::max_weight_neighbor_traversal;

#[derive(Debug, Clone)]
pub struct WalkConfig {
    /// Tree-representation file exported from the subsplit DAG.
    pub sdag_rep_path: PathBuf,
    /// Where to write the visited trees; nothing is written when `None`.
    pub output_path: Option<PathBuf>,
    /// Unscored trees that must start the walk alongside the best tree.
    pub extra_trees_path: Option<PathBuf>,
    /// Keep at most this many top trees (0 = no cap).
    pub max_tree_count: usize,
    /// Keep at most this fraction of the trees (0.0 = no cap).
    pub max_tree_ratio: f64,
    pub scoring: ScoringOptions,
}

impl WalkConfig {
    pub fn new(sdag_rep_path: impl Into<PathBuf>) -> Self {
        WalkConfig {
            sdag_rep_path: sdag_rep_path.into(),
            output_path: None,
            extra_trees_path: None,
            max_tree_count: 0,
            max_tree_ratio: 0.0,
            scoring: ScoringOptions::likelihood(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WalkResult {
    pub graph: CandidateGraph,
    /// Graph vertex indices in visitation order.
    pub visited: Vec<usize>,
    /// Seed vertices matched from the extra-trees file.
    pub seeds: Vec<usize>,
    /// Trees read before capping.
    pub tree_count: usize,
}

impl WalkResult {
    /// Visited trees and their scores, in visitation order.
    pub fn visited_trees(&self) -> impl Iterator<Item = (&EncodedTree, f64)> + '_ {
        self.visited.iter().map(|&v| {
            let vertex = self.graph.vertex(v);
            (&vertex.tree, vertex.score)
        })
    }
}

/// Run the whole walk described by `config`.
///
/// Configuration errors surface before any file is read.
pub fn run_walk(config: &WalkConfig) -> Result<WalkResult> {
    let mode = config.scoring.mode()?;
    if !config.max_tree_ratio.is_finite() {
        return Err(WalkError::InvalidConfiguration(format!(
            "max tree ratio must be finite, got {}",
            config.max_tree_ratio
        )));
    }

    let t0 = Instant::now();
    let context = match mode {
        ScoreMode::Parsimony => Some(ScoringContext::from_options(&config.scoring)?),
        ScoreMode::Likelihood => None,
    };
    let records = parse_tree_file(&config.sdag_rep_path, mode == ScoreMode::Likelihood)?;
    let extras = match &config.extra_trees_path {
        Some(path) => load_trees(path, false)?.0,
        None => Vec::new(),
    };
    info!(
        "Read {} trees and {} extra trees in {:.3}s",
        records.len(),
        extras.len(),
        t0.elapsed().as_secs_f64()
    );

    let t1 = Instant::now();
    let scores = resolve_scores(&records, mode, context.as_ref())?;
    let trees: Vec<EncodedTree> = records.into_iter().map(|r| r.tree).collect();
    let (trees, scores) = sort_by_score_descending(trees, scores);
    info!("Scoring ({mode:?}) {:.3}s", t1.elapsed().as_secs_f64());

    let t2 = Instant::now();
    let tree_count = trees.len();
    let vertex_count = capped_vertex_count(tree_count, config.max_tree_count, config.max_tree_ratio);
    let graph = build(&trees, &scores, vertex_count);
    drop(trees);
    info!(
        "Built graph with {} vertices and {} edges in {:.3}s",
        graph.vertex_count(),
        graph.edge_count(),
        t2.elapsed().as_secs_f64()
    );

    let t3 = Instant::now();
    let seeds = graph.find_vertices(&extras);
    let visited = max_weight_neighbor_traversal(&graph, &seeds);
    info!(
        "Visited {} of {} vertices from {} seeds in {:.3}s",
        visited.len(),
        graph.vertex_count(),
        seeds.len(),
        t3.elapsed().as_secs_f64()
    );

    if let Some(output_path) = &config.output_path {
        let t4 = Instant::now();
        write_walk(output_path, &graph, &visited)?;
        info!("Writing to output {:.3}s", t4.elapsed().as_secs_f64());
    }

    Ok(WalkResult { graph, visited, seeds, tree_count })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_fixture(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file.flush().unwrap();
        file
    }

    const SCENARIO: &str = "0,1,2,,-10.0\n3,4,,-5.0\n5,6,7,8,9,10,11,,-1.0\n";

    #[test]
    fn test_end_to_end_scenario() {
        let input = write_fixture(SCENARIO);
        let output = NamedTempFile::new().unwrap();
        let config = WalkConfig {
            output_path: Some(output.path().to_path_buf()),
            ..WalkConfig::new(input.path())
        };

        let result = run_walk(&config).unwrap();
        assert_eq!(result.tree_count, 3);
        // distances: 9, 10 and 5, all within the threshold
        assert_eq!(result.graph.edges(), &[(0, 1), (0, 2), (1, 2)]);
        assert_eq!(result.visited, vec![0, 1, 2]);

        let written = std::fs::read_to_string(output.path()).unwrap();
        assert_eq!(written, "5,6,7,8,9,10,11,-1.0\n3,4,-5.0\n0,1,2,-10.0\n");
    }

    #[test]
    fn test_extra_trees_seed_disconnected_vertices() {
        let input = write_fixture("0,1,-1.0\n0,2,-2.0\n40,41,42,43,44,45,46,47,48,49,50,51,-3.0\n");
        let extras = write_fixture("51,50,49,48,47,46,45,44,43,42,41,40,\n99,\n");
        let config = WalkConfig {
            extra_trees_path: Some(extras.path().to_path_buf()),
            ..WalkConfig::new(input.path())
        };

        let result = run_walk(&config).unwrap();
        assert_eq!(result.seeds, vec![2]);
        assert_eq!(result.visited, vec![0, 2, 1]);

        let without = run_walk(&WalkConfig::new(input.path())).unwrap();
        assert_eq!(without.visited, vec![0, 1]);
    }

    #[test]
    fn test_caps_limit_vertices() {
        let input = write_fixture(SCENARIO);
        let config = WalkConfig { max_tree_count: 1, ..WalkConfig::new(input.path()) };
        let result = run_walk(&config).unwrap();
        assert_eq!(result.visited, vec![0]);
        assert_eq!(result.visited_trees().next().unwrap().1, -1.0);
    }

    #[test]
    fn test_zero_vertices_gives_empty_walk() {
        let input = write_fixture(SCENARIO);
        let output = NamedTempFile::new().unwrap();
        let config = WalkConfig {
            max_tree_ratio: 0.1,
            output_path: Some(output.path().to_path_buf()),
            ..WalkConfig::new(input.path())
        };
        let result = run_walk(&config).unwrap();
        assert!(result.graph.is_empty());
        assert!(result.visited.is_empty());
        assert_eq!(std::fs::read_to_string(output.path()).unwrap(), "");
    }

    #[test]
    fn test_invalid_configuration_fails_before_reading() {
        let mut config = WalkConfig::new("/nonexistent/trees.csv");
        config.scoring.parsimony = true;
        assert!(matches!(run_walk(&config), Err(WalkError::InvalidConfiguration(_))));

        config.scoring = ScoringOptions { parsimony: true, ..Default::default() };
        assert!(matches!(run_walk(&config), Err(WalkError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_parsimony_walk() {
        // Trees 0 and 2 are adjacent; tree 1 is dropped by the sentinel.
        let input = write_fixture(&format!("0,1,2,\n7,{},\n0,1,3,\n", u64::MAX));
        let newick = write_fixture("((A,C),(B,D));\n((A,B),(C,D));\n((A,B),(C,D));\n");
        let alignment = write_fixture(">A\nAAT\n>B\nAAT\n>C\nCCT\n>D\nCCT\n");
        let config = WalkConfig {
            scoring: ScoringOptions::parsimony(newick.path(), alignment.path()),
            ..WalkConfig::new(input.path())
        };

        let result = run_walk(&config).unwrap();
        let scored: Vec<(Vec<usize>, f64)> = result.visited_trees().map(|(t, s)| (t.ones(), s)).collect();
        assert_eq!(scored, vec![(vec![0, 1, 3], -2.0), (vec![0, 1, 2], -4.0)]);
    }
}
