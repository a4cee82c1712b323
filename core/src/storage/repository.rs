use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use super::error::{PersistenceError, Result};
use crate::testing::{TestCase, TestSuite};

/// File-backed store of test cases and test suites.
///
/// ```text
/// <storage root>/
///   test-cases/<key>.testcase
///   test-suites/<key>.suite
/// ```
///
/// Both folder names are matched ignoring case; they are created with the
/// canonical casing on first write.
#[derive(Debug, Clone)]
pub struct CaseSuiteRepository {
    root: PathBuf,
    cases: BTreeMap<String, TestCase>,
    /// File each case was last read from or written to, by key.
    case_files: BTreeMap<String, PathBuf>,
    suites: Vec<TestSuite>,
}

impl CaseSuiteRepository {
    const CASES_DIR_NAME: &str = "test-cases";
    const SUITES_DIR_NAME: &str = "test-suites";

    /// Empty repository rooted at `root`; nothing is read.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            cases: BTreeMap::new(),
            case_files: BTreeMap::new(),
            suites: Vec::new(),
        }
    }

    /// Opens the repository and loads every case and suite file found.
    /// Unreadable or malformed files are logged and skipped.
    pub fn open(root: impl Into<PathBuf>) -> Self {
        let mut repo = Self::new(root);
        repo.load_all();
        repo
    }

    pub fn storage_root(&self) -> &Path {
        &self.root
    }

    pub fn cases_dir(&self) -> Option<PathBuf> {
        fsutil::find_dir_ignore_case(&self.root, Self::CASES_DIR_NAME)
    }

    pub fn suites_dir(&self) -> Option<PathBuf> {
        fsutil::find_dir_ignore_case(&self.root, Self::SUITES_DIR_NAME)
    }

    fn dir_for_write(&self, name: &str) -> Result<PathBuf> {
        if let Some(dir) = fsutil::find_dir_ignore_case(&self.root, name) {
            return Ok(dir);
        }
        let dir = self.root.join(name);
        fsutil::mkdir_all(&dir)?;
        Ok(dir)
    }

    pub fn load_all(&mut self) {
        self.cases.clear();
        self.case_files.clear();
        self.suites.clear();

        for file in Self::list_files(self.cases_dir(), TestCase::FILE_EXT) {
            match Self::read_case_file(&file) {
                Ok(case) => {
                    self.case_files.insert(case.key(), file);
                    self.cases.insert(case.key(), case);
                }
                Err(e) => log::warn!("Skipping test case: {:#}", e),
            }
        }
        for file in Self::list_files(self.suites_dir(), TestSuite::FILE_EXT) {
            match Self::read_suite_file(&file) {
                Ok(suite) => self.upsert_suite(suite),
                Err(e) => log::warn!("Skipping test suite: {:#}", e),
            }
        }
        log::debug!(
            "Loaded {} test case(s) and {} test suite(s) from {}",
            self.cases.len(),
            self.suites.len(),
            self.root.to_string_lossy()
        );
    }

    fn list_files(dir: Option<PathBuf>, ext: &str) -> Vec<PathBuf> {
        let Some(dir) = dir else {
            return Vec::new()
        };
        let pattern = match glob::Pattern::new(&format!("*.{}", ext)) {
            Ok(pattern) => pattern,
            Err(e) => {
                log::error!("{}", e);
                return Vec::new();
            }
        };
        fsutil::list_files_matching(&dir, &pattern).unwrap_or_else(|e| {
            log::warn!("{:#}", e);
            Vec::new()
        })
    }

    pub fn read_case_file(path: impl AsRef<Path>) -> Result<TestCase> {
        let path = path.as_ref();
        let contents = fsutil::read_to_string(path)?;
        TestCase::from_file_contents(&contents)
            .ok_or_else(|| PersistenceError::MalformedCase(path.to_owned()))
    }

    pub fn read_suite_file(path: impl AsRef<Path>) -> Result<TestSuite> {
        let path = path.as_ref();
        let contents = fsutil::read_to_string(path)?;
        TestSuite::from_file_contents(&contents)
            .ok_or_else(|| PersistenceError::MalformedSuite(path.to_owned()))
    }

    // ---- test cases ----

    pub fn cases(&self) -> impl Iterator<Item = &TestCase> + '_ {
        self.cases.values()
    }

    pub fn case_keys(&self) -> Vec<String> {
        self.cases.keys().cloned().collect()
    }

    pub fn case(&self, key: &str) -> Option<&TestCase> {
        self.cases.get(key)
    }

    /// Writes the case file and registers the case, replacing any case with the same key.
    /// Text fields are trimmed before writing, matching what a later load reads back.
    pub fn save_case(&mut self, case: TestCase) -> Result<PathBuf> {
        let case = case.normalized();
        if case.title.is_empty() {
            return Err(PersistenceError::BlankTitle);
        }
        for (field, value) in [
            ("title", &case.title),
            ("input", &case.input),
            ("expected output", &case.expected),
        ] {
            if value.contains('\n') || value.contains('\r') {
                return Err(PersistenceError::MultiLineField { field });
            }
        }

        let path = self
            .dir_for_write(Self::CASES_DIR_NAME)?
            .join(case.filename());
        fsutil::write(&path, case.to_file_contents())?;
        log::info!("Saved test case {}", path.to_string_lossy());
        if let Some(old) = self.case_files.insert(case.key(), path.clone()) {
            if old != path && old.exists() {
                fsutil::remove_file(&old)?;
            }
        }
        self.cases.insert(case.key(), case);
        Ok(path)
    }

    /// Removes the case file. Suites referencing the case are left dangling.
    pub fn delete_case(&mut self, key: &str) -> Result<TestCase> {
        let case = self
            .cases
            .remove(key)
            .ok_or_else(|| PersistenceError::NoSuchCase(key.to_owned()))?;
        let path = self
            .case_files
            .remove(key)
            .or_else(|| self.cases_dir().map(|dir| dir.join(case.filename())));
        match path {
            Some(path) if path.exists() => fsutil::remove_file(&path)?,
            _ => log::warn!("File of test case '{}' was already gone", case.title),
        }
        Ok(case)
    }

    // ---- test suites ----

    pub fn suites(&self) -> &[TestSuite] {
        &self.suites
    }

    /// Looks a suite up by exact title, then by key.
    pub fn suite(&self, name: &str) -> Option<&TestSuite> {
        self.suites
            .iter()
            .find(|s| s.title() == name)
            .or_else(|| self.suites.iter().find(|s| s.key() == name))
    }

    /// Creates, saves and registers an empty suite.
    pub fn create_suite(&mut self, title: &str) -> Result<TestSuite> {
        let suite = TestSuite::new(title);
        if suite.title().is_empty() {
            return Err(PersistenceError::BlankTitle);
        }
        if self.suites.iter().any(|s| s.key() == suite.key()) {
            return Err(PersistenceError::SuiteExists(suite.title().to_owned()));
        }
        self.save_suite(&suite)?;
        Ok(suite)
    }

    /// Writes the suite file and registers a copy, replacing any suite with the same key.
    pub fn save_suite(&mut self, suite: &TestSuite) -> Result<PathBuf> {
        if suite.title().is_empty() {
            return Err(PersistenceError::BlankTitle);
        }
        if suite.title().contains('\n') || suite.title().contains('\r') {
            return Err(PersistenceError::MultiLineField { field: "title" });
        }
        let path = self
            .dir_for_write(Self::SUITES_DIR_NAME)?
            .join(suite.filename());
        fsutil::write(&path, suite.to_file_contents())?;
        log::info!("Saved test suite {}", path.to_string_lossy());
        self.upsert_suite(suite.clone());
        Ok(path)
    }

    /// Loads one suite file from anywhere and registers it. Errors propagate.
    pub fn load_suite_file(&mut self, path: impl AsRef<Path>) -> Result<TestSuite> {
        let suite = Self::read_suite_file(path)?;
        self.upsert_suite(suite.clone());
        Ok(suite)
    }

    pub fn delete_suite(&mut self, name: &str) -> Result<TestSuite> {
        let key = self
            .suite(name)
            .map(TestSuite::key)
            .ok_or_else(|| PersistenceError::NoSuchSuite(name.to_owned()))?;
        let idx = self
            .suites
            .iter()
            .position(|s| s.key() == key)
            .ok_or_else(|| PersistenceError::NoSuchSuite(name.to_owned()))?;
        let suite = self.suites.remove(idx);
        if let Some(dir) = self.suites_dir() {
            let path = dir.join(suite.filename());
            if path.exists() {
                fsutil::remove_file(&path)?;
            }
        }
        Ok(suite)
    }

    fn upsert_suite(&mut self, suite: TestSuite) {
        match self.suites.iter_mut().find(|s| s.key() == suite.key()) {
            Some(slot) => *slot = suite,
            None => self.suites.push(suite),
        }
    }

    /// Cases referenced by `suite`, in suite order. Dangling references are dropped.
    pub fn resolve(&self, suite: &TestSuite) -> Vec<TestCase> {
        suite
            .case_keys()
            .iter()
            .filter_map(|key| {
                let case = self.cases.get(key);
                if case.is_none() {
                    log::debug!(
                        "Test suite '{}' references missing test case '{}'",
                        suite.title(),
                        key
                    );
                }
                case.cloned()
            })
            .collect()
    }
}
