use std::{
    collections::{BTreeMap, BTreeSet, HashSet},
    fmt::{self, Write as _},
    path::{Path, PathBuf},
};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

use crate::storage::Result;
use crate::testing::{Status, TestResult};

/// Where and with what a run happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunMeta {
    pub suite_title: String,
    pub root: PathBuf,
    pub code_path: String,
}

/// One run's results bundled with its metadata.
///
/// The result list is owned by the archive; readers get copies or a
/// read-only slice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultArchive {
    meta: RunMeta,
    created_at: DateTime<Local>,
    results: Vec<TestResult>,
    total_cases: usize,
}

impl ResultArchive {
    /// `total_cases: None` derives the count from the distinct case titles of
    /// the non-skipped results. Passing the suite's case count is more
    /// accurate when some case produced no result at all.
    pub fn new(meta: RunMeta, results: Vec<TestResult>, total_cases: Option<usize>) -> Self {
        let total_cases = total_cases.unwrap_or_else(|| {
            results
                .iter()
                .filter(|r| !r.is_skipped())
                .map(|r| r.case_title.as_str())
                .collect::<HashSet<_>>()
                .len()
        });
        Self {
            meta,
            created_at: Local::now(),
            results,
            total_cases,
        }
    }

    pub fn meta(&self) -> &RunMeta {
        &self.meta
    }

    pub fn suite_title(&self) -> &str {
        &self.meta.suite_title
    }

    pub fn created_at(&self) -> DateTime<Local> {
        self.created_at
    }

    pub fn total_cases(&self) -> usize {
        self.total_cases
    }

    /// Owned copy of the results.
    pub fn results(&self) -> Vec<TestResult> {
        self.results.clone()
    }

    pub fn results_view(&self) -> &[TestResult] {
        &self.results
    }

    pub fn students(&self) -> BTreeSet<&str> {
        self.results.iter().map(|r| r.student.as_str()).collect()
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        fsutil::write_json_with_mkdir(path, self)?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Ok(fsutil::read_json_with_deserialize(path)?)
    }

    pub fn standing(&self, student: &str) -> Standing {
        let graded: Vec<&TestResult> = self
            .results
            .iter()
            .filter(|r| r.student == student && !r.is_skipped())
            .collect();
        if graded.is_empty() {
            return Standing::NoSubmission;
        }
        if graded.iter().all(|r| r.status == Status::CompileError) {
            return Standing::CompileError;
        }
        Standing::Score {
            passed: graded.iter().filter(|r| r.status == Status::Passed).count(),
            total: self.total_cases,
        }
    }

    pub fn render_report(&self) -> String {
        let mut s = String::new();
        let code_path = if self.meta.code_path.is_empty() {
            "(none)"
        } else {
            &self.meta.code_path
        };
        let _ = writeln!(s, "Test suite : {}", self.meta.suite_title);
        let _ = writeln!(s, "Root folder: {}", self.meta.root.to_string_lossy());
        let _ = writeln!(s, "Code path  : {}", code_path);
        let _ = writeln!(s, "Created at : {}", self.created_at.format("%Y-%m-%d %H:%M:%S"));
        let _ = writeln!(s, "Test cases : {}", self.total_cases);

        s.push_str("\n[Results]\n");
        for r in &self.results {
            let _ = writeln!(s, "{}", r.display_line());
            if matches!(r.status, Status::Failed | Status::RuntimeError | Status::Timeout) {
                let _ = writeln!(s, "    expected: {}", r.expected.replace('\n', "\n              "));
                let _ = writeln!(s, "    actual  : {}", r.actual.replace('\n', "\n              "));
            }
        }

        s.push_str("\n[Scores]\n");
        let students = self.students();
        let width = students.iter().map(|name| name.len()).max().unwrap_or(0);
        for student in students {
            let _ = writeln!(s, "{:width$}  {}", student, self.standing(student), width = width);
        }

        let tally = self.tally();
        let tally: Vec<String> = Status::iter()
            .filter_map(|st| tally.get(&st).map(|n| format!("{} x{}", st, n)))
            .collect();
        let _ = writeln!(s, "\n[Tally]\n{}", tally.join(", "));
        s
    }

    pub fn write_report(&self, path: impl AsRef<Path>) -> Result<()> {
        fsutil::write_with_mkdir(path, self.render_report())?;
        Ok(())
    }

    pub fn tally(&self) -> BTreeMap<Status, usize> {
        self.results.iter().fold(BTreeMap::new(), |mut count, r| {
            *count.entry(r.status).or_default() += 1;
            count
        })
    }
}

/// How one student did in one archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Standing {
    NoSubmission,
    CompileError,
    Score { passed: usize, total: usize },
}

impl Standing {
    pub fn ratio(&self) -> Option<f64> {
        match *self {
            Standing::Score { passed, total } if total > 0 => Some(passed as f64 / total as f64),
            Standing::Score { .. } => Some(0.0),
            _ => None,
        }
    }
}

impl fmt::Display for Standing {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Standing::NoSubmission => write!(f, "No submission"),
            Standing::CompileError => write!(f, "COMPILE ERROR"),
            Standing::Score { passed, total } => write!(
                f,
                "{}/{} ({:.1}%)",
                passed,
                total,
                self.ratio().unwrap_or(0.0) * 100.0
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComparisonRow {
    pub student: String,
    pub a: Standing,
    pub b: Standing,
}

/// One row per student appearing in either archive, sorted by name.
pub fn compare(a: &ResultArchive, b: &ResultArchive) -> Vec<ComparisonRow> {
    let students: BTreeSet<&str> = a.students().union(&b.students()).copied().collect();
    students
        .into_iter()
        .map(|student| ComparisonRow {
            student: student.to_owned(),
            a: a.standing(student),
            b: b.standing(student),
        })
        .collect()
}
