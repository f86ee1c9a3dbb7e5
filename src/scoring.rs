//! Per-tree scores: log-likelihoods read from the input, or negated parsimony.
//!
//! Both modes produce "higher is better" scores so that the graph walk can
//! always prefer the maximum.
//!
//! # Parsimony
//! Parsimony is computed over the informative columns of an alignment only;
//! constant columns add the same cost (zero) to every topology. The built-in
//! [`FitchScorer`] uses Hartigan's generalisation of Fitch's algorithm so
//! that unrooted newick strings with a trifurcating root score correctly:
//!
//! ```text
//! cost(node) = Σ children cost + (#children − max multiplicity of a state)
//! ```

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use log::{debug, info};
use phylotree::tree::Tree as PhyloTree;
use rayon::prelude::*;
use tempfile::NamedTempFile;

use crate::alignment::Alignment;
use crate::bitset::EncodedTree;
use crate::error::{Result, WalkError};
use crate::io::{TreeRecord, read_newick_lines};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreMode {
    Likelihood,
    Parsimony,
}

/// Caller-facing scoring switches, validated by [`ScoringOptions::mode`].
#[derive(Debug, Clone, Default)]
pub struct ScoringOptions {
    pub likelihood: bool,
    pub parsimony: bool,
    /// One newick topology per line, aligned with the tree-representation file.
    pub newick_path: Option<PathBuf>,
    pub alignment_path: Option<PathBuf>,
    /// External program used instead of the built-in Fitch scorer.
    pub parsimony_command: Option<PathBuf>,
}

impl ScoringOptions {
    pub fn likelihood() -> Self {
        ScoringOptions { likelihood: true, ..Default::default() }
    }

    pub fn parsimony(newick_path: impl Into<PathBuf>, alignment_path: impl Into<PathBuf>) -> Self {
        ScoringOptions {
            parsimony: true,
            newick_path: Some(newick_path.into()),
            alignment_path: Some(alignment_path.into()),
            ..Default::default()
        }
    }

    pub fn mode(&self) -> Result<ScoreMode> {
        match (self.likelihood, self.parsimony) {
            (true, true) => Err(WalkError::InvalidConfiguration(
                "likelihood and parsimony scoring are mutually exclusive".to_owned(),
            )),
            (false, false) => Err(WalkError::InvalidConfiguration(
                "one of likelihood or parsimony scoring must be selected".to_owned(),
            )),
            (true, false) => Ok(ScoreMode::Likelihood),
            (false, true) => {
                if self.newick_path.is_none() || self.alignment_path.is_none() {
                    return Err(WalkError::InvalidConfiguration(
                        "parsimony scoring needs both a newick path and an alignment path".to_owned(),
                    ));
                }
                Ok(ScoreMode::Parsimony)
            }
        }
    }
}

/// Computes the raw parsimony score of one topology.
///
/// Implementations are shared read-only across rayon workers.
pub trait ParsimonyScorer: Sync {
    fn name(&self) -> &str;
    fn score(&self, newick: &str) -> Result<u64>;
}

/// Built-in Fitch/Hartigan parsimony over a reduced alignment.
pub struct FitchScorer {
    /// Per taxon, one state mask per informative site.
    leaf_masks: HashMap<String, Vec<u64>>,
    num_sites: usize,
}

impl FitchScorer {
    /// Build a scorer from a full alignment; constant columns are dropped here.
    pub fn new(alignment: &Alignment) -> Result<Self> {
        let reduced = alignment.reduce_to_informative();
        let num_sites = reduced.num_sites();

        // Per column, give each distinct character its own bit
        let mut state_bits: Vec<HashMap<u8, u32>> = vec![HashMap::new(); num_sites];
        for name in reduced.names() {
            let Some(seq) = reduced.sequence(name) else { continue };
            for (site, &c) in seq.iter().enumerate() {
                let next = state_bits[site].len() as u32;
                state_bits[site].entry(c).or_insert(next);
            }
        }
        if let Some(site) = state_bits.iter().position(|m| m.len() > 64) {
            return Err(WalkError::tool(
                "fitch",
                format!("informative site {site} has more than 64 distinct states"),
            ));
        }

        let leaf_masks = reduced
            .names()
            .iter()
            .filter_map(|name| {
                let seq = reduced.sequence(name)?;
                let masks = seq
                    .iter()
                    .enumerate()
                    .map(|(site, c)| 1u64 << state_bits[site][c])
                    .collect();
                Some((name.clone(), masks))
            })
            .collect();

        debug!("fitch scorer: {num_sites} informative of {} sites", alignment.num_sites());
        Ok(FitchScorer { leaf_masks, num_sites })
    }

    pub fn num_sites(&self) -> usize {
        self.num_sites
    }

    /// Post-order pass returning the state masks of `node_id`, accumulating changes into `cost`.
    fn node_masks(&self, tree: &PhyloTree, node_id: usize, cost: &mut u64) -> Result<Vec<u64>> {
        let node = tree.get(&node_id).map_err(|e| WalkError::tool("fitch", e.to_string()))?;

        if node.children.is_empty() {
            let name = node.name.as_deref().unwrap_or_default();
            return self
                .leaf_masks
                .get(name)
                .cloned()
                .ok_or_else(|| WalkError::tool("fitch", format!("taxon {name:?} is missing from the alignment")));
        }

        let mut children = node
            .children
            .iter()
            .map(|&child| self.node_masks(tree, child, cost))
            .collect::<Result<Vec<_>>>()?;
        if children.len() == 1 {
            return Ok(children.swap_remove(0));
        }

        let degree = children.len() as u64;
        let mut masks = Vec::with_capacity(self.num_sites);
        for site in 0..self.num_sites {
            let union = children.iter().fold(0u64, |acc, c| acc | c[site]);
            let mut best = 0u64;
            let mut best_mask = 0u64;
            let mut rest = union;
            while rest != 0 {
                let bit = rest & rest.wrapping_neg();
                let count = children.iter().filter(|c| c[site] & bit != 0).count() as u64;
                if count > best {
                    best = count;
                    best_mask = bit;
                } else if count == best {
                    best_mask |= bit;
                }
                rest &= rest - 1;
            }
            *cost += degree - best;
            masks.push(best_mask);
        }
        Ok(masks)
    }
}

impl ParsimonyScorer for FitchScorer {
    fn name(&self) -> &str {
        "fitch"
    }

    fn score(&self, newick: &str) -> Result<u64> {
        let tree = PhyloTree::from_newick(newick)
            .map_err(|e| WalkError::tool("fitch", format!("cannot parse newick {newick:?}: {e}")))?;
        let root = tree.get_root().map_err(|e| WalkError::tool("fitch", e.to_string()))?;
        let mut cost = 0;
        self.node_masks(&tree, root, &mut cost)?;
        Ok(cost)
    }
}

/// Runs `PROGRAM <reduced-alignment.fasta>` per topology, newick on stdin,
/// and reads one integer parsimony score from stdout.
pub struct CommandScorer {
    program: PathBuf,
    label: String,
    alignment_file: NamedTempFile,
}

impl CommandScorer {
    pub fn new(program: impl Into<PathBuf>, alignment: &Alignment) -> Result<Self> {
        let program = program.into();
        let label = program.display().to_string();
        let mut alignment_file =
            NamedTempFile::with_suffix(".fasta").map_err(|e| WalkError::io(std::env::temp_dir(), e))?;
        let path = alignment_file.path().to_path_buf();
        alignment
            .reduce_to_informative()
            .write_fasta(alignment_file.as_file_mut())
            .map_err(|e| WalkError::io(path, e))?;
        Ok(CommandScorer { program, label, alignment_file })
    }

    pub fn alignment_path(&self) -> &Path {
        self.alignment_file.path()
    }
}

impl ParsimonyScorer for CommandScorer {
    fn name(&self) -> &str {
        &self.label
    }

    fn score(&self, newick: &str) -> Result<u64> {
        let fail = |message: String| WalkError::tool(self.label.clone(), message);

        let mut child = Command::new(&self.program)
            .arg(self.alignment_file.path())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| fail(format!("cannot start: {e}")))?;

        // stdin is dropped before waiting so the program sees end of input
        let written = match child.stdin.take() {
            Some(mut stdin) => writeln!(stdin, "{newick}"),
            None => Ok(()),
        };

        let output = child.wait_with_output().map_err(|e| fail(e.to_string()))?;
        if let Err(e) = written {
            return Err(fail(format!("cannot write topology ({}): {e}", output.status)));
        }
        if !output.status.success() {
            return Err(fail(format!(
                "exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        stdout
            .trim()
            .parse::<u64>()
            .map_err(|e| fail(format!("unusable output {:?}: {e}", stdout.trim())))
    }
}

/// Everything parsimony scoring needs besides the trees themselves.
pub struct ScoringContext {
    topologies: Vec<String>,
    scorer: Box<dyn ParsimonyScorer>,
}

impl ScoringContext {
    pub fn new(topologies: Vec<String>, scorer: Box<dyn ParsimonyScorer>) -> Self {
        ScoringContext { topologies, scorer }
    }

    /// Load the topology and alignment sources named by validated options.
    pub fn from_options(options: &ScoringOptions) -> Result<Self> {
        let (Some(newick_path), Some(alignment_path)) = (&options.newick_path, &options.alignment_path) else {
            return Err(WalkError::InvalidConfiguration(
                "parsimony scoring needs both a newick path and an alignment path".to_owned(),
            ));
        };
        let topologies = read_newick_lines(newick_path)?;
        let alignment = Alignment::from_fasta(alignment_path)?;
        info!(
            "Read {} topologies and {} aligned sequences of length {}",
            topologies.len(),
            alignment.num_sequences(),
            alignment.num_sites()
        );

        let scorer: Box<dyn ParsimonyScorer> = match &options.parsimony_command {
            Some(program) => Box::new(CommandScorer::new(program, &alignment)?),
            None => Box::new(FitchScorer::new(&alignment)?),
        };
        Ok(ScoringContext::new(topologies, scorer))
    }
}

/// Resolve one score per record, index-aligned with `records`.
///
/// Parsimony runs in parallel on the current rayon pool; the first failing
/// topology aborts the whole phase.
pub fn resolve_scores(records: &[TreeRecord], mode: ScoreMode, context: Option<&ScoringContext>) -> Result<Vec<f64>> {
    match mode {
        ScoreMode::Likelihood => records
            .iter()
            .map(|r| {
                r.score.ok_or_else(|| {
                    WalkError::InvalidConfiguration(format!(
                        "tree on line {} carries no log-likelihood",
                        r.line_index + 1
                    ))
                })
            })
            .collect(),
        ScoreMode::Parsimony => {
            let Some(context) = context else {
                return Err(WalkError::InvalidConfiguration(
                    "parsimony scoring requested without topologies and alignment".to_owned(),
                ));
            };
            info!("Scoring {} topologies with {}", records.len(), context.scorer.name());
            records
                .par_iter()
                .map(|r| {
                    let newick = context
                        .topologies
                        .get(r.line_index)
                        .filter(|nwk| !nwk.is_empty())
                        .ok_or_else(|| {
                            WalkError::tool(
                                context.scorer.name(),
                                format!("no newick topology for line {}", r.line_index + 1),
                            )
                        })?;
                    let raw = context.scorer.score(newick)?;
                    Ok(-(raw as f64))
                })
                .collect()
        }
    }
}

/// Jointly sort trees and scores by descending score; ties keep input order.
pub fn sort_by_score_descending(trees: Vec<EncodedTree>, scores: Vec<f64>) -> (Vec<EncodedTree>, Vec<f64>) {
    let mut pairs: Vec<(EncodedTree, f64)> = trees.into_iter().zip(scores).collect();
    pairs.sort_by(|a, b| b.1.total_cmp(&a.1));
    pairs.into_iter().unzip()
}
