use gradekit_core::{action, print_success};
use std::path::PathBuf;

use super::{GlobalArgs, SubcmdResult};
use crate::util;

#[derive(Debug, clap::Args)]
pub struct Args {
    #[arg(default_value = "./")]
    dir: PathBuf,
}

pub fn exec(args: &Args, _: &GlobalArgs) -> SubcmdResult {
    let config_file = action::init_project(&args.dir)?;
    print_success!(
        "Successfully initialized gradekit project. (config: {})",
        util::replace_homedir_to_tilde(config_file).to_string_lossy()
    );
    Ok(())
}
