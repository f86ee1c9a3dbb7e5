//! Python binding layer for the NNI walk.
//!
//! Provides Python functions to run the walk on a tree-representation file
//! and to encode/decode subsplit-DAG node sets.

use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use std::path::PathBuf;

use crate::bitset::EncodedTree;
use crate::error::WalkError;
use crate::scoring::ScoringOptions;
use crate::walk::{WalkConfig, run_walk};

fn to_py_err(e: WalkError) -> PyErr {
    PyValueError::new_err(e.to_string())
}

/// Walk best-first over NNI-adjacent trees.
///
/// Args:
///     sdag_rep_path: Tree-representation file (node indices plus trailing score field per line)
///     output_path: Where to write the visited trees (default: None, nothing written)
///     extra_trees_path: Unscored trees to start the walk with (default: None)
///     max_tree_count: Use only the best N trees, 0 disables (default: 0)
///     max_tree_ratio: Use only this fraction of the best trees, 0 disables (default: 0.0)
///     likelihood: Score by the log-likelihood field (default: True)
///     parsimony: Score by negated parsimony (default: False)
///     newick_path: Newick topologies matching the input lines, for parsimony
///     alignment_path: FASTA alignment, for parsimony
///
/// Returns:
///     A tuple of (trees, scores) in visitation order, each tree a sorted list of node indices
///
/// Raises:
///     ValueError: On malformed input, contradictory options, or scorer failure
#[pyfunction]
#[pyo3(signature = (
    sdag_rep_path,
    output_path=None,
    extra_trees_path=None,
    max_tree_count=0,
    max_tree_ratio=0.0,
    likelihood=true,
    parsimony=false,
    newick_path=None,
    alignment_path=None,
))]
#[allow(clippy::too_many_arguments)]
fn nni_walk(
    sdag_rep_path: PathBuf,
    output_path: Option<PathBuf>,
    extra_trees_path: Option<PathBuf>,
    max_tree_count: usize,
    max_tree_ratio: f64,
    likelihood: bool,
    parsimony: bool,
    newick_path: Option<PathBuf>,
    alignment_path: Option<PathBuf>,
) -> PyResult<(Vec<Vec<usize>>, Vec<f64>)> {
    let config = WalkConfig {
        sdag_rep_path,
        output_path,
        extra_trees_path,
        max_tree_count,
        max_tree_ratio,
        scoring: ScoringOptions {
            likelihood,
            parsimony,
            newick_path,
            alignment_path,
            parsimony_command: None,
        },
    };

    let result = run_walk(&config).map_err(to_py_err)?;
    Ok(result.visited_trees().map(|(tree, score)| (tree.ones(), score)).unzip())
}

/// Encode a list of node indices as a Python int (bit j set iff j is listed).
#[pyfunction]
fn encode_tree(py: Python<'_>, node_indices: Vec<usize>) -> PyResult<Py<PyAny>> {
    let tree = EncodedTree::from_indices(node_indices);
    let bytes: Vec<u8> = tree.words().iter().flat_map(|w| w.to_le_bytes()).collect();
    let int_type = py.get_type::<pyo3::types::PyInt>();
    let value = int_type.call_method1("from_bytes", (bytes, "little"))?;
    Ok(value.unbind())
}

/// Decode a non-negative Python int into its ascending node indices.
#[pyfunction]
fn decode_tree(value: &Bound<'_, PyAny>) -> PyResult<Vec<usize>> {
    if value.lt(0)? {
        return Err(PyValueError::new_err("encoded trees are non-negative"));
    }
    let bits: usize = value.call_method0("bit_length")?.extract()?;
    let bytes: Vec<u8> = value
        .call_method1("to_bytes", (bits.div_ceil(8), "little"))?
        .extract()?;
    let indices = bytes
        .iter()
        .enumerate()
        .flat_map(|(i, &b)| (0..8).filter(move |k| (b >> k) & 1 == 1).map(move |k| i * 8 + k))
        .collect();
    Ok(indices)
}

/// Python module definition
#[pymodule]
fn rust_python_nni_walk(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(nni_walk, m)?)?;
    m.add_function(wrap_pyfunction!(encode_tree, m)?)?;
    m.add_function(wrap_pyfunction!(decode_tree, m)?)?;
    Ok(())
}
