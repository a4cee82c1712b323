use serde::{Deserialize, Serialize};

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumIter,
)]
pub enum Status {
    #[strum(serialize = "PASSED")]
    #[serde(rename = "PASSED")]
    Passed,

    #[strum(serialize = "FAILED")]
    #[serde(rename = "FAILED")]
    Failed,

    #[strum(serialize = "COMPILE ERROR")]
    #[serde(rename = "COMPILE ERROR")]
    CompileError,

    #[strum(serialize = "RUNTIME ERROR")]
    #[serde(rename = "RUNTIME ERROR")]
    RuntimeError,

    #[strum(serialize = "TIMEOUT")]
    #[serde(rename = "TIMEOUT")]
    Timeout,

    #[strum(serialize = "SKIPPED")]
    #[serde(rename = "SKIPPED")]
    Skipped,
}

/// Outcome of one (submission, test case) pair, or the placeholder for a skipped submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestResult {
    pub student: String,
    pub case_title: String,
    pub status: Status,
    pub actual: String,
    pub expected: String,
}

impl TestResult {
    pub const SKIPPED_CASE_TITLE: &str = "N/A";

    pub fn new(
        student: impl Into<String>,
        case_title: impl Into<String>,
        status: Status,
        actual: impl Into<String>,
        expected: impl Into<String>,
    ) -> Self {
        Self {
            student: student.into(),
            case_title: case_title.into(),
            status,
            actual: actual.into(),
            expected: expected.into(),
        }
    }

    pub fn skipped(student: impl Into<String>) -> Self {
        Self::new(student, Self::SKIPPED_CASE_TITLE, Status::Skipped, "", "")
    }

    pub fn is_skipped(&self) -> bool {
        self.status == Status::Skipped
    }

    /// ```
    /// use gradekit_core::testing::{Status, TestResult};
    ///
    /// let r = TestResult::new("alice", "Sum", Status::Passed, "7", "7");
    /// assert_eq!(r.display_line(), "alice | Sum | PASSED");
    /// assert_eq!(TestResult::skipped("bob").display_line(), "bob | SKIPPED");
    /// ```
    pub fn display_line(&self) -> String {
        if self.is_skipped() {
            format!("{} | {}", self.student, self.status)
        } else {
            format!("{} | {} | {}", self.student, self.case_title, self.status)
        }
    }
}
