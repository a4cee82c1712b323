use std::collections::HashMap;

use colored::{Color, ColoredString, Colorize};
use crossterm::terminal;

use crate::archive::{ComparisonRow, Standing};
use crate::testing::{Status, TestResult};

#[macro_export]
macro_rules! print_success {
    ($fmt:literal, $($e:tt)*) => {
        use ::colored::Colorize as _;
        println!("{}", format!($fmt, $($e)*).green())
    }
}

pub fn is_truecolor_supported() -> bool {
    let Ok(v) = std::env::var("COLORTERM") else {
        return false
    };
    matches!(v.as_str(), "truecolor" | "24bit")
}

pub trait ColorTheme {
    fn color(&self) -> Color;
}

impl ColorTheme for log::Level {
    fn color(&self) -> Color {
        use log::Level::*;
        match self {
            Error => Color::BrightRed,
            Warn => Color::BrightYellow,
            Info => Color::Cyan,
            Debug => Color::Magenta,
            Trace => Color::Blue,
        }
    }
}

impl ColorTheme for Status {
    fn color(&self) -> Color {
        use Status::*;
        if !self::is_truecolor_supported() {
            return match self {
                Passed => Color::Green,
                Failed => Color::Yellow,
                CompileError => Color::Blue,
                RuntimeError => Color::Magenta,
                Timeout => Color::Red,
                Skipped => Color::BrightBlack,
            };
        }

        let (r, g, b) = match self {
            Passed => (30, 180, 40),
            Failed => (210, 138, 4),
            CompileError => (40, 110, 210),
            RuntimeError => (171, 40, 200),
            Timeout => (220, 42, 42),
            Skipped => (110, 110, 110),
        };
        Color::TrueColor { r, g, b }
    }
}

pub fn status_badge(status: Status) -> ColoredString {
    let fg = if is_truecolor_supported() {
        Color::TrueColor {
            r: 255,
            g: 255,
            b: 255,
        }
    } else {
        Color::BrightWhite
    };
    format!(" {} ", status)
        .on_color(status.color())
        .bold()
        .color(fg)
}

fn terminal_cols() -> usize {
    let (cols, _) = terminal::size().unwrap_or((60, 40));
    cols.max(20) as usize
}

/// One line per student plus a totals line.
pub fn print_run_summary(results: &[TestResult]) {
    let mut per_student: Vec<(&str, usize, usize)> = Vec::new();
    for r in results.iter().filter(|r| !r.is_skipped()) {
        match per_student.last_mut() {
            Some((name, passed, total)) if *name == r.student => {
                *passed += (r.status == Status::Passed) as usize;
                *total += 1;
            }
            _ => per_student.push((r.student.as_str(), (r.status == Status::Passed) as usize, 1)),
        }
    }

    let width = results.iter().map(|r| r.student.len()).max().unwrap_or(0);
    println!();
    for (name, passed, total) in &per_student {
        let score = format!("{}/{}", passed, total);
        let score = if passed == total {
            score.green()
        } else if *passed == 0 {
            score.bright_red()
        } else {
            score.yellow()
        };
        println!("  {:width$}  {}", name, score, width = width);
    }
    for r in results.iter().filter(|r| r.is_skipped()) {
        println!("  {:width$}  {}", r.student, status_badge(r.status), width = width);
    }

    let bar = "-".repeat(5);
    print!("\n{} ", bar);

    let count: HashMap<Status, usize> = results.iter().fold(HashMap::new(), |mut count, r| {
        *count.entry(r.status).or_default() += 1;
        count
    });
    let num_pairs = results.iter().filter(|r| !r.is_skipped()).count();
    let num_passed = *count.get(&Status::Passed).unwrap_or(&0);

    if num_passed == num_pairs {
        print!("{}", format!("All {} results passed ✨", num_pairs).green());
    } else {
        let mut statuses: Vec<_> = count
            .iter()
            .filter(|(&status, _)| status != Status::Passed)
            .collect();
        statuses.sort();
        let detail_msg = statuses
            .into_iter()
            .map(|(&status, &cnt)| {
                format!(
                    "{}{}{}",
                    status_badge(status),
                    "x".dimmed(),
                    cnt.to_string().bold().bright_white(),
                )
            })
            .collect::<Vec<String>>()
            .join(", ");
        let summary_msg = format!("{}/{} results passed", num_passed, num_pairs);
        print!("{} ({})", summary_msg.bright_red(), detail_msg);
    }
    println!(" {}", bar);
}

pub fn print_result_detail(res: &TestResult) {
    let cols = terminal_cols();

    const BOLD_LINE: &str = "━";
    const THIN_LINE: &str = "─";

    let bold_bar = BOLD_LINE.repeat(cols).blue().bold();

    println!(
        "\n{} / {}: {}\n{}",
        res.student.bright_yellow().bold(),
        res.case_title.bright_yellow(),
        status_badge(res.status),
        bold_bar,
    );

    fn print_sub_title(s: &str, cols: usize) {
        println!(
            "{}{}",
            s.cyan().bold(),
            THIN_LINE.repeat(cols.saturating_sub(s.len() + 1)).bright_black(),
        )
    }

    fn print_lines(s: &str) {
        if s.is_empty() {
            println!("{}", "<EMPTY>".magenta().dimmed());
            return;
        }
        for line in s.lines() {
            let trimmed = line.trim_end();
            print!("{}", trimmed);

            let num_trailing_whitespace = line.len() - trimmed.len();
            if num_trailing_whitespace > 0 {
                print!(
                    "{}{}",
                    " ".repeat(num_trailing_whitespace).on_red(),
                    "(Trailing whitespace)".bright_red().bold()
                );
            }
            println!();
        }
    }

    print_sub_title("[expected]", cols);
    print_lines(&res.expected);

    print_sub_title("[actual]", cols);
    print_lines(&res.actual);

    println!("{}", bold_bar);
}

fn standing_color(s: Standing) -> Color {
    match s {
        Standing::NoSubmission => Color::BrightBlack,
        Standing::CompileError => Status::CompileError.color(),
        Standing::Score { .. } => match s.ratio() {
            Some(r) if r >= 1.0 => Color::Green,
            Some(r) if r > 0.0 => Color::Yellow,
            _ => Color::BrightRed,
        },
    }
}

pub fn print_comparison(rows: &[ComparisonRow], a_label: &str, b_label: &str) {
    const STANDING_WIDTH: usize = 18;
    let width = rows
        .iter()
        .map(|row| row.student.len())
        .max()
        .unwrap_or(0)
        .max("Student".len());

    println!(
        "{}  {}  {}",
        format!("{:width$}", "Student", width = width).bold(),
        format!("{:sw$}", a_label, sw = STANDING_WIDTH).bold(),
        b_label.bold(),
    );
    for row in rows {
        // pad before coloring, escape codes would break the alignment
        let a = format!("{:sw$}", row.a.to_string(), sw = STANDING_WIDTH);
        println!(
            "{:width$}  {}  {}",
            row.student,
            a.color(standing_color(row.a)),
            row.b.to_string().color(standing_color(row.b)),
            width = width
        );
    }
}
