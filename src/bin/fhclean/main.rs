mod cleanup;
mod config;
mod stats;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::{CommandFactory, Parser};
use clap_complete::Shell;

use crate::cleanup::Cleanup;
use crate::config::Config;

#[derive(Parser)]
#[command(
    author,
    version,
    name = env!("CARGO_BIN_NAME"),
    about = "Clean up duplicate files created by Windows File History"
)]
pub struct Args {
    /// Optional input directory to clean
    #[arg(value_hint = clap::ValueHint::DirPath)]
    path: Option<PathBuf>,

    /// Delete duplicates instead of moving them to quarantine
    #[arg(short, long)]
    purge: bool,

    /// Keep timestamped names for the kept files
    #[arg(short, long)]
    keep_names: bool,

    /// Quarantine directory name inside the cleaned root
    #[arg(short, long, name = "NAME")]
    quarantine_dir: Option<String>,

    /// Recurse into subdirectories
    #[arg(short, long)]
    recurse: bool,

    /// Only print changes without touching any files
    #[arg(short = 'n', long)]
    dryrun: bool,

    /// Maximum number of worker threads for directory processing
    #[arg(short, long, name = "COUNT")]
    threads: Option<usize>,

    /// Generate shell completion
    #[arg(short = 'l', long, name = "SHELL")]
    completion: Option<Shell>,

    /// Print verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    if let Some(ref shell) = args.completion {
        return fhclean::generate_shell_completion(*shell, Args::command(), true, env!("CARGO_BIN_NAME"));
    }

    let start = Instant::now();
    let root = fhclean::resolve_input_path(args.path.as_deref())?;
    let config = Config::from_args(args)?;
    if let Some(threads) = config.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("Failed to configure the worker thread pool")?;
    }
    let dryrun = config.dryrun;

    let stats = Cleanup::new(root, config).run();
    stats.print_summary(start.elapsed(), dryrun);

    if stats.failures > 0 {
        anyhow::bail!("{} operation(s) failed", stats.failures);
    }
    Ok(())
}
