pub mod case;
pub mod compare;
pub mod init;
pub mod report;
pub mod run;
pub mod suite;

use std::path::PathBuf;

use gradekit_core::Config;

use crate::util;

#[derive(Debug, clap::Parser)]
#[command(author, version, about, long_about = None)]
pub struct GlobalArgs {
    #[command(subcommand)]
    pub subcmd: Subcommand,

    /// Config file to use instead of searching gradekit.toml from the current dir upwards
    #[arg(short = 'C', long, global = true)]
    pub config: Option<PathBuf>,

    /// More log output (-v: info, -vv: debug). RUST_LOG overrides this
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Debug, clap::Subcommand)]
pub enum Subcommand {
    Init(init::Args),
    Case(case::Args),
    Suite(suite::Args),

    #[command(alias("r"))]
    Run(run::Args),

    Report(report::Args),
    Compare(compare::Args),
}

pub type SubcmdResult = anyhow::Result<()>;

impl GlobalArgs {
    pub async fn exec_subcmd(&self) -> SubcmdResult {
        use Subcommand::*;
        match &self.subcmd {
            Init(args) => init::exec(args, self),
            Case(args) => case::exec(args, self),
            Suite(args) => suite::exec(args, self),
            Run(args) => run::exec(args, self).await,
            Report(args) => report::exec(args, self),
            Compare(args) => compare::exec(args, self),
        }
    }

    pub fn log_level(&self) -> log::LevelFilter {
        match self.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        }
    }

    pub fn load_config(&self) -> anyhow::Result<Config> {
        match &self.config {
            Some(path) => Config::from_toml_file(util::absolutize(path)),
            None => Config::from_file_finding_in_ancestors(util::current_dir()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, clap::ValueEnum)]
#[clap(rename_all = "PascalCase")]
pub enum ArgValueType {
    #[default]
    String,
    Boolean,
    Int,
    Double,
}

impl From<ArgValueType> for gradekit_core::testing::ValueType {
    fn from(value: ArgValueType) -> Self {
        use gradekit_core::testing::ValueType;
        use ArgValueType::*;
        match value {
            String => ValueType::String,
            Boolean => ValueType::Boolean,
            Int => ValueType::Int,
            Double => ValueType::Double,
        }
    }
}
