use anyhow::Context as _;
use colored::Colorize;
use gradekit_core::{
    action, print_success,
    testing::{sanitize_filename, TestCase},
};

use super::{ArgValueType, GlobalArgs, SubcmdResult};

#[derive(Debug, clap::Args)]
pub struct Args {
    #[command(subcommand)]
    pub action: Action,
}

#[derive(Debug, clap::Subcommand)]
pub enum Action {
    /// Save a test case, replacing one with the same title
    Add {
        #[arg(short, long)]
        title: String,

        #[arg(short = 'T', long = "type", value_enum, default_value_t)]
        value_type: ArgValueType,

        #[arg(short, long, default_value = "")]
        input: String,

        #[arg(short, long)]
        expected: String,
    },

    #[command(alias("ls"))]
    List,

    Show {
        key: String,
    },

    Rm {
        key: String,
    },
}

pub fn exec(args: &Args, global: &GlobalArgs) -> SubcmdResult {
    let cfg = global.load_config()?;
    let mut repo = action::open_repository(&cfg)?;

    match &args.action {
        Action::Add {
            title,
            value_type,
            input,
            expected,
        } => {
            let case = TestCase::new(title.as_str(), (*value_type).into(), input.as_str(), expected.as_str());
            let key = case.key();
            let path = action::add_case(&mut repo, case)?;
            print_success!(
                "Saved test case '{}' (key: {}, file: {})",
                title,
                key,
                path.to_string_lossy()
            );
        }
        Action::List => {
            let width = repo.case_keys().iter().map(String::len).max().unwrap_or(0);
            for case in repo.cases() {
                println!(
                    "{:width$}  {:7}  {}",
                    case.key().as_str().bold(),
                    case.value_type.to_string(),
                    case.title,
                    width = width
                );
            }
        }
        Action::Show { key } => {
            let case = repo
                .case(key)
                .or_else(|| repo.case(&sanitize_filename(key)))
                .with_context(|| format!("No such test case '{}'", key))?;
            println!("{} {}", "title   :".cyan(), case.title);
            println!("{} {}", "type    :".cyan(), case.value_type);
            println!("{} {}", "input   :".cyan(), case.input);
            println!("{} {}", "expected:".cyan(), case.expected);
        }
        Action::Rm { key } => {
            let case = repo
                .delete_case(key)
                .with_context(|| format!("Failed to delete test case '{}'", key))?;
            print_success!("Deleted test case '{}'", case.title);
        }
    }
    Ok(())
}
