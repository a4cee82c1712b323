pub mod error {
    #[allow(unused_imports)]
    pub(crate) use anyhow::{anyhow, bail, ensure, Context as _};
    pub use anyhow::{Error, Result};
}
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use colored::Colorize;
use error::*;
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;

use crate::archive::{self, ResultArchive};
use crate::config::Config;
use crate::coordinator::{ExecutionCoordinator, Progress, RunOptions, RunRecord, RunRequest};
use crate::storage::{CaseSuiteRepository, PersistenceError};
use crate::style;
use crate::testing::{Status, TestCase, TestResult, TestSuite};

pub fn init_project(dir: impl AsRef<Path>) -> Result<PathBuf> {
    Config::init_with_example(dir).context("Failed to init gradekit project")
}

pub fn open_repository(cfg: &Config) -> Result<CaseSuiteRepository> {
    let dir = cfg.storage_dir()?;
    log::info!("Loading test cases and suites from {}", dir.to_string_lossy());
    let repo = CaseSuiteRepository::open(dir);
    log::debug!(
        "Loaded {} test case(s) and {} suite(s) from {:?}",
        repo.case_keys().len(),
        repo.suites().len(),
        repo.storage_root()
    );
    Ok(repo)
}

pub fn add_case(repo: &mut CaseSuiteRepository, case: TestCase) -> Result<PathBuf> {
    let title = case.title.clone();
    repo.save_case(case)
        .with_context(|| format!("Failed to save test case '{}'", title))
}

pub fn find_suite(repo: &CaseSuiteRepository, name: &str) -> Result<TestSuite> {
    repo.suite(name)
        .cloned()
        .ok_or_else(|| PersistenceError::NoSuchSuite(name.to_owned()).into())
}

/// Appends existing cases to a suite and saves it. Keys already present are
/// reported and left where they are.
pub fn add_cases_to_suite(
    repo: &mut CaseSuiteRepository,
    suite_name: &str,
    keys: &[String],
) -> Result<TestSuite> {
    let mut suite = find_suite(repo, suite_name)?;
    for key in keys {
        let case = repo
            .case(key)
            .ok_or_else(|| PersistenceError::NoSuchCase(key.to_owned()))?;
        if !suite.add_case(case) {
            log::warn!("'{}' is already in suite '{}'", key, suite.title());
        }
    }
    repo.save_suite(&suite)
        .with_context(|| format!("Failed to save test suite '{}'", suite.title()))?;
    Ok(suite)
}

pub fn remove_cases_from_suite(
    repo: &mut CaseSuiteRepository,
    suite_name: &str,
    keys: &[String],
) -> Result<TestSuite> {
    let mut suite = find_suite(repo, suite_name)?;
    for key in keys {
        ensure!(
            suite.remove(key),
            "'{}' is not in suite '{}'",
            key,
            suite.title()
        );
    }
    repo.save_suite(&suite)
        .with_context(|| format!("Failed to save test suite '{}'", suite.title()))?;
    Ok(suite)
}

/// Progress bar over the submission × case matrix.
struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    fn new() -> Self {
        let style = ProgressStyle::with_template("{spinner} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ");
        let bar = ProgressBar::new(0).with_style(style);
        bar.enable_steady_tick(Duration::from_millis(80));
        Self { bar }
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl Progress for BarProgress {
    fn on_start(&self, pairs: usize) {
        self.bar.set_length(pairs as u64);
    }

    fn on_result(&self, res: &TestResult) {
        if res.status != Status::Passed {
            self.bar.println(format!(
                "{} {} / {}",
                style::status_badge(res.status),
                res.student,
                res.case_title.cyan()
            ));
        }
        self.bar
            .set_message(format!("{} / {}", res.student, res.case_title));
        self.bar.inc(1);
    }
}

/// Runs the named suite with the settings in `cfg`, prints failure details
/// and a summary, and returns the run as an archive.
pub async fn run_suite(
    cfg: &Config,
    repo: &CaseSuiteRepository,
    suite_name: &str,
    cancel: CancellationToken,
) -> Result<ResultArchive> {
    let suite = find_suite(repo, suite_name)?;
    let options = RunOptions {
        jobs: cfg.run.jobs,
        source_ext: cfg.toolchain.source_ext.clone(),
        cancel,
    };
    log::info!(
        "compiler={:?} runtime={:?} timeout={:?} jobs={}",
        cfg.toolchain.compiler,
        cfg.toolchain.runtime,
        cfg.run.timeout(),
        options.jobs
    );

    let progress = Arc::new(BarProgress::new());
    let mut coordinator =
        ExecutionCoordinator::new(cfg.process_toolchain(), options).progress(progress.clone());
    let request = RunRequest {
        suite: Some(suite),
        root: cfg.paths.root.clone(),
        code_path: cfg.paths.code_path.clone(),
    };
    let res = coordinator.run(request, repo).await;
    progress.finish();
    let results = res.with_context(|| format!("Failed to run test suite '{}'", suite_name))?;

    results
        .iter()
        .filter(|r| matches!(r.status, Status::Failed | Status::RuntimeError | Status::Timeout))
        .for_each(style::print_result_detail);
    style::print_run_summary(&results);

    coordinator
        .last_run()
        .map(RunRecord::to_archive)
        .context("Run finished without a record")
}

pub fn save_archive(archive: &ResultArchive, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    archive
        .save(path)
        .with_context(|| format!("Failed to save archive to {:?}", path))
}

pub fn load_archive(path: impl AsRef<Path>) -> Result<ResultArchive> {
    let path = path.as_ref();
    ResultArchive::load(path).with_context(|| format!("Failed to load archive {:?}", path))
}

pub fn write_report(archive: &ResultArchive, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    archive
        .write_report(path)
        .with_context(|| format!("Failed to write report to {:?}", path))
}

pub fn print_report(archive: &ResultArchive) {
    print!("{}", archive.render_report());
}

pub fn compare_archives(a: impl AsRef<Path>, b: impl AsRef<Path>) -> Result<()> {
    let (a_path, b_path) = (a.as_ref(), b.as_ref());
    let a = load_archive(a_path)?;
    let b = load_archive(b_path)?;
    let label = |path: &Path, archive: &ResultArchive| {
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        format!("{} ({})", name, archive.suite_title())
    };
    style::print_comparison(
        &archive::compare(&a, &b),
        &label(a_path, &a),
        &label(b_path, &b),
    );
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::testing::ValueType;

    fn repo_with_cases(dir: &Path) -> CaseSuiteRepository {
        let mut repo = CaseSuiteRepository::new(dir);
        for title in ["one", "two"] {
            add_case(&mut repo, TestCase::new(title, ValueType::String, "", title)).unwrap();
        }
        repo.create_suite("Basics").unwrap();
        repo
    }

    #[test]
    fn suite_membership_is_edited_and_saved() {
        let tmp = tempfile::tempdir().unwrap();
        let mut repo = repo_with_cases(tmp.path());

        let keys = vec!["one".to_owned(), "two".to_owned(), "one".to_owned()];
        let suite = add_cases_to_suite(&mut repo, "Basics", &keys).unwrap();
        assert_eq!(suite.case_keys(), ["one", "two"]);

        let suite = remove_cases_from_suite(&mut repo, "Basics", &["one".to_owned()]).unwrap();
        assert_eq!(suite.case_keys(), ["two"]);

        let reloaded = CaseSuiteRepository::open(tmp.path());
        assert_eq!(find_suite(&reloaded, "Basics").unwrap().case_keys(), ["two"]);
    }

    #[test]
    fn unknown_names_are_errors() {
        let tmp = tempfile::tempdir().unwrap();
        let mut repo = repo_with_cases(tmp.path());

        assert!(add_cases_to_suite(&mut repo, "Basics", &["three".to_owned()]).is_err());
        assert!(add_cases_to_suite(&mut repo, "Nope", &["one".to_owned()]).is_err());
        assert!(remove_cases_from_suite(&mut repo, "Basics", &["one".to_owned()]).is_err());
    }

    #[tokio::test]
    async fn run_fails_fast_without_root() {
        let tmp = tempfile::tempdir().unwrap();
        let mut repo = repo_with_cases(tmp.path());
        add_cases_to_suite(&mut repo, "Basics", &["one".to_owned()]).unwrap();

        let cfg = Config::default();
        let err = run_suite(&cfg, &repo, "Basics", CancellationToken::new())
            .await
            .unwrap_err();
        assert!(format!("{:#}", err).contains("Root folder not set"), "{:#}", err);
    }
}
