use std::io::Write as _;

use clap::Parser;
use colored::Colorize;
use gradekit_cli::cmd::GlobalArgs;
use gradekit_core::style::ColorTheme;

#[tokio::main]
async fn main() {
    let app = GlobalArgs::parse();
    init_logger(app.log_level());
    app.exec_subcmd().await.unwrap_or_else(|e| {
        eprintln!("Error: {:?}", e);
        std::process::exit(1);
    });
}

/// `RUST_LOG` wins over the level chosen with `-v`.
fn init_logger(default_level: log::LevelFilter) {
    env_logger::Builder::new()
        .filter_level(default_level)
        .parse_env("RUST_LOG")
        .format(|buf, record| {
            let level = record.level();
            writeln!(
                buf,
                "{} {}",
                format!("[{}]", level).color(level.color()).bold(),
                record.args()
            )
        })
        .init();
}
