use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use flate2::Compression;
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use itertools::Itertools;
use log::{debug, warn};

use crate::bitset::EncodedTree;
use crate::error::{Result, WalkError};
use crate::graph::CandidateGraph;
use crate::scoring::sort_by_score_descending;

/// Index the subsplit-DAG exporter writes for a subsplit it does not know (`SIZE_MAX`).
pub const INVALID_NODE_INDEX: u64 = u64::MAX;

/// Largest node index accepted from a file. A tree is a bitset over node
/// indices, so a larger index would need a proportionally large allocation.
pub const MAX_NODE_INDEX: u64 = 1 << 28;

/// One accepted line of a tree-representation file.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeRecord {
    /// 0-based physical line of the source file.
    pub line_index: usize,
    pub tree: EncodedTree,
    /// Parsed score slot; `None` when scores were not requested.
    pub score: Option<f64>,
}

fn is_gz(path: &Path) -> bool {
    path.to_string_lossy().ends_with(".gz")
}

/// Open a file for buffered line reading, gunzipping `*.gz` paths.
pub fn open_reader<P: AsRef<Path>>(path: P) -> Result<Box<dyn BufRead>> {
    let p = path.as_ref();
    let f = File::open(p).map_err(|e| WalkError::io(p, e))?;
    if is_gz(p) {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(f))))
    } else {
        Ok(Box::new(BufReader::new(f)))
    }
}

/// Parse one line into its encoded tree and score slot.
///
/// The last comma separated field is the score slot; everything before it is
/// the node index list. Without scores the slot must be empty, so every
/// unscored line ends with a comma. Returns `Ok(None)` when the line mentions
/// [`INVALID_NODE_INDEX`].
fn parse_line(line: &str, with_scores: bool) -> std::result::Result<Option<(EncodedTree, Option<f64>)>, String> {
    let Some((indices, score_slot)) = line.rsplit_once(',') else {
        return Err("missing trailing comma before the score slot".to_owned());
    };

    let mut nodes = Vec::new();
    for field in indices.split(',').map(str::trim).filter(|f| !f.is_empty()) {
        let idx: u64 = field
            .parse()
            .map_err(|e| format!("node index {field:?}: {e}"))?;
        if idx == INVALID_NODE_INDEX {
            return Ok(None);
        }
        if idx > MAX_NODE_INDEX {
            return Err(format!("node index {idx} exceeds {MAX_NODE_INDEX}"));
        }
        let idx = usize::try_from(idx).map_err(|e| format!("node index {field:?}: {e}"))?;
        nodes.push(idx);
    }

    let slot = score_slot.trim();
    let score = if with_scores {
        let value: f64 = slot.parse().map_err(|e| format!("score {slot:?}: {e}"))?;
        Some(value)
    } else if !slot.is_empty() {
        return Err(format!("unexpected value {slot:?} in score slot"));
    } else {
        None
    };

    Ok(Some((EncodedTree::from_indices(nodes), score)))
}

/// Read every tree of a tree-representation file, in file order.
///
/// Lines carrying the invalid-subsplit sentinel are dropped. Blank lines are
/// skipped. Any other unparsable line aborts the read.
pub fn parse_tree_file<P: AsRef<Path>>(path: P, with_scores: bool) -> Result<Vec<TreeRecord>> {
    let p = path.as_ref();
    let reader = open_reader(p)?;

    let mut records = Vec::new();
    let mut dropped = 0usize;
    for (line_index, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| WalkError::io(p, e))?;
        let trimmed = line.trim_end_matches(['\n', '\r']);
        if trimmed.trim().is_empty() {
            continue;
        }
        match parse_line(trimmed, with_scores) {
            Ok(Some((tree, score))) => records.push(TreeRecord { line_index, tree, score }),
            Ok(None) => dropped += 1,
            Err(reason) => {
                return Err(WalkError::MalformedLine {
                    path: p.to_path_buf(),
                    line_number: line_index + 1,
                    line: trimmed.to_owned(),
                    reason,
                });
            }
        }
    }

    if dropped > 0 {
        warn!("{}: skipped {dropped} trees outside the known subsplit DAG", p.display());
    }
    debug!("{}: read {} trees", p.display(), records.len());
    Ok(records)
}

/// Load encoded trees and their scores.
///
/// With `with_scores`, both vectors come back jointly sorted by descending
/// score. Without, the trees keep file order and every score is `0.0`.
pub fn load_trees<P: AsRef<Path>>(path: P, with_scores: bool) -> Result<(Vec<EncodedTree>, Vec<f64>)> {
    let records = parse_tree_file(path, with_scores)?;
    let (trees, scores): (Vec<_>, Vec<_>) = records
        .into_iter()
        .map(|r| (r.tree, r.score.unwrap_or(0.0)))
        .unzip();
    if with_scores {
        Ok(sort_by_score_descending(trees, scores))
    } else {
        Ok((trees, scores))
    }
}

/// Read a file of newick topologies, one per line, keeping physical line positions.
pub fn read_newick_lines<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
    let p = path.as_ref();
    open_reader(p)?
        .lines()
        .map(|line| {
            line.map(|l| l.trim().to_owned())
                .map_err(|e| WalkError::io(p, e))
        })
        .collect()
}

/// Format a score the way Python's `repr` prints a float.
///
/// Shortest round-trip digits, always with a decimal point or an exponent.
/// Exponents carry a sign and at least two digits (`1e-05`, `-1.5e+16`).
pub fn format_score(score: f64) -> String {
    if score.is_nan() {
        return "nan".to_owned();
    }
    let text = format!("{score:?}");
    match text.split_once('e') {
        Some((mantissa, exp)) => {
            let (sign, digits) = match exp.strip_prefix('-') {
                Some(digits) => ('-', digits),
                None => ('+', exp),
            };
            format!("{mantissa}e{sign}{digits:0>2}")
        }
        None => text,
    }
}

/// Write the visited vertices in visitation order.
///
/// Each line holds the decoded node indices, a comma, and the vertex score.
/// If `path` ends with `.gz`, the output is gzip-compressed.
pub fn write_walk<P: AsRef<Path>>(path: P, graph: &CandidateGraph, visited: &[usize]) -> Result<()> {
    let p = path.as_ref();
    let write_all = || -> std::io::Result<()> {
        let f = File::create(p)?;
        let mut out: Box<dyn Write> = if is_gz(p) {
            Box::new(BufWriter::new(GzEncoder::new(f, Compression::default())))
        } else {
            Box::new(BufWriter::new(f))
        };

        for &v in visited {
            let vertex = graph.vertex(v);
            writeln!(
                &mut out,
                "{},{}",
                vertex.tree.ones().iter().join(","),
                format_score(vertex.score)
            )?;
        }
        out.flush()
    };
    write_all().map_err(|e| WalkError::io(p, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::build;
    use tempfile::NamedTempFile;

    fn write_fixture(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_scored_load_sorts_descending() {
        let file = write_fixture("0,1,2,-10.0\n3,4,-5.0\n5,6,7,8,9,10,11,-1.0\n");
        let (trees, scores) = load_trees(file.path(), true).unwrap();
        assert_eq!(scores, vec![-1.0, -5.0, -10.0]);
        assert_eq!(trees[0].ones(), vec![5, 6, 7, 8, 9, 10, 11]);
        assert_eq!(trees[1].ones(), vec![3, 4]);
        assert_eq!(trees[2].ones(), vec![0, 1, 2]);
    }

    #[test]
    fn test_empty_index_fields_are_skipped() {
        let file = write_fixture("0,1,2,,-10.0\n3,4,,-5.0\n5,6,7,8,9,10,11,,-1.0\n");
        let (trees, scores) = load_trees(file.path(), true).unwrap();
        assert_eq!(scores, vec![-1.0, -5.0, -10.0]);
        assert_eq!(trees[1].ones(), vec![3, 4]);
    }

    #[test]
    fn test_scores_stay_attached_to_their_trees() {
        let lines = [("1,2", -3.5), ("7,9", -0.25), ("4", -12.0), ("0,8,130", -1.75), ("5,6", -2.0)];
        let content: String = lines.iter().map(|(t, s)| format!("{t},{s}\n")).collect();
        let file = write_fixture(&content);

        let (trees, scores) = load_trees(file.path(), true).unwrap();
        assert!(scores.windows(2).all(|w| w[0] >= w[1]));
        for (tree, score) in trees.iter().zip(&scores) {
            let (orig, _) = lines.iter().find(|(_, s)| s == score).unwrap();
            let expected: Vec<usize> = orig.split(',').map(|x| x.parse().unwrap()).collect();
            assert_eq!(tree.ones(), expected);
        }
    }

    #[test]
    fn test_sentinel_lines_are_dropped() {
        let sentinel = u64::MAX;
        for content in [
            format!("1,2,3,\n4,{sentinel},5,\n"),
            format!("4,{sentinel},5,\n1,2,3,\n"),
        ] {
            let file = write_fixture(&content);
            let (trees, _) = load_trees(file.path(), false).unwrap();
            assert_eq!(trees.len(), 1);
            assert_eq!(trees[0].ones(), vec![1, 2, 3]);
        }

        let file = write_fixture(&format!("1,{sentinel},-2.0\n3,-4.0\n"));
        let (trees, scores) = load_trees(file.path(), true).unwrap();
        assert_eq!(trees.len(), 1);
        assert_eq!(scores, vec![-4.0]);
    }

    #[test]
    fn test_unscored_load_keeps_file_order() {
        let file = write_fixture("9,8,\n1,\n5,3,\n");
        let (trees, scores) = load_trees(file.path(), false).unwrap();
        let decoded: Vec<Vec<usize>> = trees.iter().map(|t| t.ones()).collect();
        assert_eq!(decoded, vec![vec![8, 9], vec![1], vec![3, 5]]);
        assert_eq!(scores, vec![0.0; 3]);
    }

    #[test]
    fn test_malformed_line_reports_location() {
        let file = write_fixture("1,2,-1.0\n1,x,-2.0\n");
        match load_trees(file.path(), true) {
            Err(WalkError::MalformedLine { line_number, line, .. }) => {
                assert_eq!(line_number, 2);
                assert_eq!(line, "1,x,-2.0");
            }
            other => panic!("expected MalformedLine, got {other:?}"),
        }

        let file = write_fixture("1,2,oops\n");
        assert!(matches!(load_trees(file.path(), true), Err(WalkError::MalformedLine { .. })));

        let file = write_fixture("12\n");
        assert!(matches!(load_trees(file.path(), false), Err(WalkError::MalformedLine { .. })));
    }

    #[test]
    fn test_unscored_line_without_trailing_comma_is_malformed() {
        let file = write_fixture("4,5,\n1,2,3\n");
        match load_trees(file.path(), false) {
            Err(WalkError::MalformedLine { line_number, reason, .. }) => {
                assert_eq!(line_number, 2);
                assert!(reason.contains("score slot"), "{reason}");
            }
            other => panic!("expected MalformedLine, got {other:?}"),
        }

        let file = write_fixture("1,2,3, \n");
        let (trees, _) = load_trees(file.path(), false).unwrap();
        assert_eq!(trees[0].ones(), vec![1, 2, 3]);
    }

    #[test]
    fn test_oversized_node_index_is_malformed() {
        for line in [format!("{},-1.0\n", u64::MAX - 1), format!("3,{},-1.0\n", MAX_NODE_INDEX + 1)] {
            let file = write_fixture(&line);
            match load_trees(file.path(), true) {
                Err(WalkError::MalformedLine { line_number, reason, .. }) => {
                    assert_eq!(line_number, 1);
                    assert!(reason.contains("exceeds"), "{reason}");
                }
                other => panic!("expected MalformedLine, got {other:?}"),
            }
        }

        let file = write_fixture(&format!("{MAX_NODE_INDEX},-1.0\n"));
        let (trees, _) = load_trees(file.path(), true).unwrap();
        assert_eq!(trees[0].ones(), vec![MAX_NODE_INDEX as usize]);
    }

    #[test]
    fn test_format_score_matches_python_repr() {
        assert_eq!(format_score(-1.0), "-1.0");
        assert_eq!(format_score(-2.5), "-2.5");
        assert_eq!(format_score(0.1), "0.1");
        assert_eq!(format_score(-1234.5678), "-1234.5678");
        assert_eq!(format_score(1e-5), "1e-05");
        assert_eq!(format_score(-1e16), "-1e+16");
        assert_eq!(format_score(1.5e20), "1.5e+20");
        assert_eq!(format_score(2.5e-300), "2.5e-300");
        assert_eq!(format_score(f64::NEG_INFINITY), "-inf");
        assert_eq!(format_score(f64::NAN), "nan");
    }

    #[test]
    fn test_gz_input_round_trip() {
        let file = NamedTempFile::with_suffix(".gz").unwrap();
        {
            let mut enc = GzEncoder::new(File::create(file.path()).unwrap(), Compression::default());
            enc.write_all(b"0,1,-2.0\n2,3,-1.0\n").unwrap();
            enc.finish().unwrap();
        }
        let (trees, scores) = load_trees(file.path(), true).unwrap();
        assert_eq!(scores, vec![-1.0, -2.0]);
        assert_eq!(trees[0].ones(), vec![2, 3]);
    }

    #[test]
    fn test_write_walk_format() {
        let trees = vec![EncodedTree::from_indices([3, 4]), EncodedTree::from_indices([0, 1, 2])];
        let graph = build(&trees, &[-1.0, -2.5], 2);
        let out = NamedTempFile::new().unwrap();
        write_walk(out.path(), &graph, &[1, 0]).unwrap();
        let written = std::fs::read_to_string(out.path()).unwrap();
        assert_eq!(written, "0,1,2,-2.5\n3,4,-1.0\n");
    }
}
