use std::path::PathBuf;

use anyhow::Context as _;
use colored::Colorize;
use gradekit_core::{action, print_success};

use super::{GlobalArgs, SubcmdResult};
use crate::util;

#[derive(Debug, clap::Args)]
pub struct Args {
    #[command(subcommand)]
    pub action: Action,
}

#[derive(Debug, clap::Subcommand)]
pub enum Action {
    /// Create and save an empty suite
    New { title: String },

    /// Append test cases (by key) to a suite
    Add {
        suite: String,
        #[arg(required = true)]
        keys: Vec<String>,
    },

    /// Remove test cases (by key) from a suite
    Rm {
        suite: String,
        #[arg(required = true)]
        keys: Vec<String>,
    },

    /// Delete a suite file. Its test cases are kept
    Delete { suite: String },

    /// Copy a suite file from elsewhere into the storage folder
    Import { file: PathBuf },

    #[command(alias("ls"))]
    List,

    Show { suite: String },
}

pub fn exec(args: &Args, global: &GlobalArgs) -> SubcmdResult {
    let cfg = global.load_config()?;
    let mut repo = action::open_repository(&cfg)?;

    match &args.action {
        Action::New { title } => {
            let suite = repo
                .create_suite(title)
                .with_context(|| format!("Failed to create test suite '{}'", title))?;
            print_success!("Created test suite '{}' (key: {})", suite.title(), suite.key());
        }
        Action::Add { suite, keys } => {
            let suite = action::add_cases_to_suite(&mut repo, suite, keys)?;
            print_success!("'{}' now has {} test case(s)", suite.title(), suite.len());
        }
        Action::Rm { suite, keys } => {
            let suite = action::remove_cases_from_suite(&mut repo, suite, keys)?;
            print_success!("'{}' now has {} test case(s)", suite.title(), suite.len());
        }
        Action::Delete { suite } => {
            let suite = repo
                .delete_suite(suite)
                .with_context(|| format!("Failed to delete test suite '{}'", suite))?;
            print_success!("Deleted test suite '{}'", suite.title());
        }
        Action::Import { file } => {
            let file = util::absolutize(file);
            let suite = repo
                .load_suite_file(&file)
                .with_context(|| format!("Failed to load test suite {:?}", file))?;
            let path = repo.save_suite(&suite)?;
            print_success!(
                "Imported test suite '{}' into {}",
                suite.title(),
                util::replace_homedir_to_tilde(path).to_string_lossy()
            );
        }
        Action::List => {
            for suite in repo.suites() {
                println!("{}  ({} case(s))", suite.title().bold(), suite.len());
            }
        }
        Action::Show { suite } => {
            let suite = action::find_suite(&repo, suite)?;
            println!("{}", suite.title().bold());
            for key in suite.case_keys() {
                match repo.case(key) {
                    Some(case) => println!("  {}  {}", key, case.title.as_str().dimmed()),
                    None => println!("  {}  {}", key, "(missing)".bright_red()),
                }
            }
        }
    }
    Ok(())
}
