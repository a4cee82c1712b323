use std::path::PathBuf;

use gradekit_core::{action, print_success};
use tokio_util::sync::CancellationToken;

use super::{GlobalArgs, SubcmdResult};
use crate::util;

#[derive(Debug, clap::Args)]
pub struct Args {
    /// Title or key of the test suite
    pub suite: String,

    /// Folder holding one subfolder per student
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Sub-path searched inside each student folder
    #[arg(long)]
    pub code_path: Option<String>,

    /// Per-execution time limit in milliseconds (0: no limit)
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Number of submissions graded concurrently
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Save the results as JSON to this file
    #[arg(short, long)]
    pub archive: Option<PathBuf>,

    /// Write a text report to this file
    #[arg(long)]
    pub report: Option<PathBuf>,
}

pub async fn exec(args: &Args, global: &GlobalArgs) -> SubcmdResult {
    let mut cfg = global.load_config()?;
    if let Some(root) = &args.root {
        cfg.paths.root = Some(util::absolutize(root));
    }
    if let Some(code_path) = &args.code_path {
        cfg.paths.code_path = code_path.clone();
    }
    if let Some(ms) = args.timeout_ms {
        cfg.run.timeout_ms = ms;
    }
    if let Some(jobs) = args.jobs {
        cfg.run.jobs = jobs;
    }
    let repo = action::open_repository(&cfg)?;

    let cancel = CancellationToken::new();
    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::warn!("Interrupted. Stopping the run...");
                cancel.cancel();
            }
        })
    };
    let res = action::run_suite(&cfg, &repo, &args.suite, cancel).await;
    ctrl_c.abort();
    let archive = res?;

    if let Some(path) = &args.archive {
        action::save_archive(&archive, path)?;
        print_success!("Saved archive to {}", path.to_string_lossy());
    }
    if let Some(path) = &args.report {
        action::write_report(&archive, path)?;
        print_success!("Wrote report to {}", path.to_string_lossy());
    }
    Ok(())
}
