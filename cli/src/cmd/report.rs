use std::path::PathBuf;

use gradekit_core::action;

use super::{GlobalArgs, SubcmdResult};

#[derive(Debug, clap::Args)]
pub struct Args {
    /// Archive saved with `run --archive`
    archive: PathBuf,
}

pub fn exec(args: &Args, _: &GlobalArgs) -> SubcmdResult {
    let archive = action::load_archive(&args.archive)?;
    action::print_report(&archive);
    Ok(())
}
