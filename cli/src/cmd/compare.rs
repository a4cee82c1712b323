use std::path::PathBuf;

use gradekit_core::action;

use super::{GlobalArgs, SubcmdResult};

#[derive(Debug, clap::Args)]
pub struct Args {
    a: PathBuf,
    b: PathBuf,
}

pub fn exec(args: &Args, _: &GlobalArgs) -> SubcmdResult {
    action::compare_archives(&args.a, &args.b)
}
