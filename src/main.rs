use clap::{ArgAction, Parser};
use log::{LevelFilter, info};
use rust_python_nni_walk::error::WalkError;
use rust_python_nni_walk::scoring::ScoringOptions;
use rust_python_nni_walk::walk::{WalkConfig, run_walk};
use std::path::PathBuf;
use std::time::Instant;

/// Find a list of trees that are nearest neighbor interchanges of each other
/// with high likelihood (or low parsimony), walking best-first from the top tree.
#[derive(Parser, Debug)]
#[command(name = "nni-walk", version, about = "Best-first NNI walk over subsplit-DAG trees")]
struct Args {
    /// Tree-representation file: comma separated sDAG node indices plus a trailing score field per line
    sdag_rep_path: PathBuf,

    /// Output path for the visited trees (gzip-compressed if it ends in .gz)
    output_path: PathBuf,

    /// Unscored trees to start the walk with, alongside the best tree
    #[arg(long = "extra-trees-path")]
    extra_trees_path: Option<PathBuf>,

    /// Use only the best N trees (0 disables the cap)
    #[arg(long = "max-tree-count", default_value_t = 0)]
    max_tree_count: usize,

    /// Use only this fraction of the best trees (0 disables the cap)
    #[arg(long = "max-tree-ratio", default_value_t = 0.0)]
    max_tree_ratio: f64,

    /// Score trees by negated parsimony instead of the log-likelihood field
    #[arg(long = "parsimony", default_value_t = false)]
    parsimony: bool,

    /// Newick topologies, one per line, matching the lines of SDAG_REP_PATH
    #[arg(long = "newick-path")]
    newick_path: Option<PathBuf>,

    /// FASTA alignment used for parsimony scoring
    #[arg(long = "alignment-path")]
    alignment_path: Option<PathBuf>,

    /// External parsimony program, run as `PROGRAM <alignment>` with the newick on stdin
    #[arg(long = "parsimony-command", requires = "parsimony")]
    parsimony_command: Option<PathBuf>,

    /// Number of worker threads (defaults to all available cores)
    #[arg(short = 'j', long = "jobs")]
    jobs: Option<usize>,

    /// Quiet mode: only warnings and errors are logged
    #[arg(short = 'q', long = "quiet", default_value_t = false)]
    quiet: bool,

    /// More log output; repeat for trace level
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, conflicts_with = "quiet")]
    verbose: u8,
}

impl Args {
    fn log_level(&self) -> LevelFilter {
        match (self.quiet, self.verbose) {
            (true, _) => LevelFilter::Warn,
            (false, 0) => LevelFilter::Info,
            (false, 1) => LevelFilter::Debug,
            (false, _) => LevelFilter::Trace,
        }
    }

    fn into_config(self) -> WalkConfig {
        WalkConfig {
            sdag_rep_path: self.sdag_rep_path,
            output_path: Some(self.output_path),
            extra_trees_path: self.extra_trees_path,
            max_tree_count: self.max_tree_count,
            max_tree_ratio: self.max_tree_ratio,
            scoring: ScoringOptions {
                likelihood: !self.parsimony,
                parsimony: self.parsimony,
                newick_path: self.newick_path,
                alignment_path: self.alignment_path,
                parsimony_command: self.parsimony_command,
            },
        }
    }
}

fn exit_code(err: &WalkError) -> i32 {
    match err {
        WalkError::MalformedLine { .. } | WalkError::InvalidConfiguration(_) | WalkError::MalformedAlignment { .. } => 2,
        WalkError::ExternalTool { .. } => 3,
        WalkError::Io { .. } => 4,
    }
}

fn main() {
    let args = Args::parse();

    env_logger::Builder::new()
        .filter_level(args.log_level())
        .parse_default_env()
        .init();

    if let Some(jobs) = args.jobs {
        if let Err(e) = rayon::ThreadPoolBuilder::new().num_threads(jobs).build_global() {
            eprintln!("Failed to configure {jobs} worker threads: {e}");
            std::process::exit(2);
        }
    }

    let t0 = Instant::now();
    let config = args.into_config();
    match run_walk(&config) {
        Ok(result) => {
            info!(
                "Kept {} of {} trees in {:.3}s",
                result.visited.len(),
                result.tree_count,
                t0.elapsed().as_secs_f64()
            );
        }
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(exit_code(&e));
        }
    }
}
