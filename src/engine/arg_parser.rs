use clap::Parser;
use std::path::PathBuf;

use crate::{ReducerKind, StrategyChoice};

struct DefaultArgs;

impl DefaultArgs {
    pub const DIR: &'static str = ".";
}

/// Concurrent directory tree aggregation.
#[derive(Clone, Parser)]
#[command(name = "treesum")]
#[command(about = "Aggregate a directory tree (total size by default) with a choice of concurrency strategies.")]
pub struct Cli {
    /// Root directory. Default: current directory.
    #[arg(value_name = "DIR", default_value = DefaultArgs::DIR)]
    pub dir: PathBuf,

    /// Strategy: sequential, pool-recursive, completion-queue, completion-relay, queue,
    /// fork-join, or `all` to run each one and compare totals. Default: fork-join.
    #[arg(long, short = 's', value_parser = clap::value_parser!(StrategyChoice))]
    pub strategy: Option<StrategyChoice>,

    /// Worker threads. Default: available parallelism, capped by the open-file limit.
    #[arg(long, short = 'j', value_parser = clap::value_parser!(usize))]
    pub threads: Option<usize>,

    /// Deadline for each run in seconds. Default: none.
    #[arg(long, short = 't', value_parser = clap::value_parser!(f64))]
    pub timeout: Option<f64>,

    /// Seconds a pool-recursive task waits on one subdirectory before giving up. Default: 30.
    /// A subtree that takes longer fails the run; raise this for large or slow trees.
    #[arg(long, value_parser = clap::value_parser!(f64))]
    pub task_timeout: Option<f64>,

    /// Per-file reduction: bytes, count, or digest. Default: bytes.
    #[arg(long, short = 'r', value_parser = clap::value_parser!(ReducerKind))]
    pub reducer: Option<ReducerKind>,

    /// Run each strategy N times and report min / max / average time.
    #[arg(long, short = 'n', value_parser = clap::value_parser!(usize))]
    pub repeat: Option<usize>,

    /// Print the directory tree (hidden directories skipped) before aggregating.
    #[arg(long, num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub tree: Option<bool>,

    /// Print the report as JSON.
    #[arg(long, num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub json: Option<bool>,

    /// List every recorded I/O error that was skipped.
    #[arg(long, short = 'l', num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub list_errors: Option<bool>,

    /// Verbose output.
    #[arg(long, short = 'v', num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub verbose: Option<bool>,
}
