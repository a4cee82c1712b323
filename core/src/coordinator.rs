use std::{path::PathBuf, sync::Arc};

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::{
    archive::{ResultArchive, RunMeta},
    error::{ConfigError, DiscoveryError, RunError},
    storage::CaseSuiteRepository,
    submission::{self, Submission},
    testing::{
        outputs_match, Execution, ExitKind, ProgramRunner, Status, TestCase, TestResult,
        TestSuite, Toolchain,
    },
};

/// What to run. Everything the coordinator needs is passed in explicitly.
#[derive(Debug, Clone, Default)]
pub struct RunRequest {
    pub suite: Option<TestSuite>,
    pub root: Option<PathBuf>,
    pub code_path: String,
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Number of submissions graded at the same time. `0` is treated as `1`.
    pub jobs: usize,
    pub source_ext: String,
    pub cancel: CancellationToken,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            jobs: 1,
            source_ext: "java".to_owned(),
            cancel: CancellationToken::new(),
        }
    }
}

/// Observer notified while a run progresses. Calls may come from several tasks.
pub trait Progress: Send + Sync {
    fn on_start(&self, _pairs: usize) {}
    fn on_result(&self, _result: &TestResult) {}
}

pub struct NoProgress;

impl Progress for NoProgress {}

/// Everything kept from the last successful run.
#[derive(Debug, Clone)]
pub struct RunRecord {
    meta: RunMeta,
    matrix: Vec<TestResult>,
    skipped: Vec<String>,
    total_cases: usize,
}

impl RunRecord {
    pub fn meta(&self) -> &RunMeta {
        &self.meta
    }

    /// Pairwise results only, in submission-major order.
    pub fn matrix_results(&self) -> &[TestResult] {
        &self.matrix
    }

    pub fn skipped(&self) -> &[String] {
        &self.skipped
    }

    pub fn total_cases(&self) -> usize {
        self.total_cases
    }

    /// Pairwise results followed by one `SKIPPED` entry per skipped folder.
    pub fn results(&self) -> Vec<TestResult> {
        self.matrix
            .iter()
            .cloned()
            .chain(self.skipped.iter().map(TestResult::skipped))
            .collect()
    }

    pub fn find_result(&self, student: &str, case_title: &str) -> Option<&TestResult> {
        self.matrix
            .iter()
            .find(|r| r.student == student && r.case_title == case_title)
    }

    pub fn to_archive(&self) -> ResultArchive {
        ResultArchive::new(self.meta.clone(), self.results(), Some(self.total_cases))
    }
}

/// Grades every discovered submission against every case of a suite.
pub struct ExecutionCoordinator<T> {
    runner: Arc<ProgramRunner<T>>,
    options: RunOptions,
    progress: Arc<dyn Progress>,
    last_run: Option<RunRecord>,
}

impl<T: Toolchain + 'static> ExecutionCoordinator<T> {
    pub fn new(toolchain: T, options: RunOptions) -> Self {
        let runner = ProgramRunner::new(toolchain).cancel_token(options.cancel.clone());
        Self {
            runner: Arc::new(runner),
            options,
            progress: Arc::new(NoProgress),
            last_run: None,
        }
    }

    pub fn progress(mut self, progress: Arc<dyn Progress>) -> Self {
        self.progress = progress;
        self
    }

    pub fn last_run(&self) -> Option<&RunRecord> {
        self.last_run.as_ref()
    }

    pub fn last_run_meta(&self) -> Option<&RunMeta> {
        self.last_run.as_ref().map(RunRecord::meta)
    }

    pub fn find_result(&self, student: &str, case_title: &str) -> Option<&TestResult> {
        self.last_run.as_ref()?.find_result(student, case_title)
    }

    /// Runs the suite against every submission under the root.
    ///
    /// Returns the pairwise results followed by the `SKIPPED` entries. Nothing
    /// is spawned unless all preconditions hold. The previous record is kept
    /// when the run fails.
    pub async fn run(
        &mut self,
        request: RunRequest,
        repo: &CaseSuiteRepository,
    ) -> Result<Vec<TestResult>, RunError> {
        let RunRequest {
            suite,
            root,
            code_path,
        } = request;

        let suite = suite.ok_or(ConfigError::NoSuiteSelected)?;
        let root = root.ok_or(ConfigError::RootUnset)?;
        if !root.is_dir() {
            return Err(DiscoveryError::RootNotDirectory(root).into());
        }
        let discovery = submission::discover(&root, &code_path, &self.options.source_ext)?;
        if discovery.is_empty() {
            return Err(DiscoveryError::NoSubmissions(root).into());
        }
        let cases = repo.resolve(&suite);
        if cases.is_empty() {
            return Err(RunError::Resolution {
                suite: suite.title().to_owned(),
            });
        }

        log::info!(
            "Running '{}' ({} cases) on {} submissions, {} skipped",
            suite.title(),
            cases.len(),
            discovery.submissions.len(),
            discovery.skipped.len()
        );
        self.progress
            .on_start(discovery.submissions.len() * cases.len());

        let total_cases = cases.len();
        let cases: Arc<[TestCase]> = cases.into();
        let matrix = if self.options.jobs > 1 {
            self.grade_parallel(discovery.submissions, cases).await?
        } else {
            self.grade_sequential(discovery.submissions, &cases).await?
        };
        if self.options.cancel.is_cancelled() {
            return Err(RunError::Interrupted);
        }

        let record = RunRecord {
            meta: RunMeta {
                suite_title: suite.title().to_owned(),
                root,
                code_path,
            },
            matrix,
            skipped: discovery.skipped,
            total_cases,
        };
        let results = record.results();
        self.last_run = Some(record);
        Ok(results)
    }

    async fn grade_sequential(
        &self,
        submissions: Vec<Submission>,
        cases: &[TestCase],
    ) -> Result<Vec<TestResult>, RunError> {
        let mut results = Vec::with_capacity(submissions.len() * cases.len());
        for mut sub in submissions {
            let graded = grade_submission(&self.runner, &mut sub, cases, self.progress.as_ref())
                .await
                .ok_or(RunError::Interrupted)?;
            results.extend(graded);
        }
        Ok(results)
    }

    /// Grades up to `jobs` submissions at once. Each task keeps its own buffer
    /// and the buffers are concatenated in discovery order.
    async fn grade_parallel(
        &self,
        submissions: Vec<Submission>,
        cases: Arc<[TestCase]>,
    ) -> Result<Vec<TestResult>, RunError> {
        let semaphore = Arc::new(Semaphore::new(self.options.jobs));
        let handles: Vec<_> = submissions
            .into_iter()
            .map(|mut sub| {
                let runner = Arc::clone(&self.runner);
                let progress = Arc::clone(&self.progress);
                let cases = Arc::clone(&cases);
                let semaphore = Arc::clone(&semaphore);
                tokio::spawn(async move {
                    let _permit = semaphore.acquire_owned().await.ok()?;
                    grade_submission(&runner, &mut sub, &cases, progress.as_ref()).await
                })
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len() * cases.len());
        let mut interrupted = false;
        for handle in handles {
            match handle.await {
                Ok(Some(graded)) => results.extend(graded),
                Ok(None) => interrupted = true,
                Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
                Err(e) => {
                    log::warn!("Grading task did not finish: {}", e);
                    interrupted = true;
                }
            }
        }
        if interrupted {
            return Err(RunError::Interrupted);
        }
        Ok(results)
    }
}

/// All results for one submission in case order, or `None` if the run was
/// cancelled before it finished.
async fn grade_submission<T: Toolchain>(
    runner: &ProgramRunner<T>,
    sub: &mut Submission,
    cases: &[TestCase],
    progress: &dyn Progress,
) -> Option<Vec<TestResult>> {
    let cancel = runner.get_cancel_token();
    let mut results = Vec::with_capacity(cases.len());
    for case in cases {
        if cancel.is_cancelled() {
            log::info!("Stopped before grading {}", sub.name());
            return None;
        }
        let (status, actual) = if runner.ensure_compiled(sub).await {
            let exec = runner.run(sub, &case.input).await;
            (classify(&exec, case), exec.output)
        } else {
            (Status::CompileError, String::new())
        };
        log::debug!("{} | {} | {}", sub.name(), case.title, status);

        let result = TestResult::new(sub.name(), &case.title, status, actual, &case.expected);
        progress.on_result(&result);
        results.push(result);
    }
    Some(results)
}

/// Status of a finished execution of a compiled program.
///
/// A timeout wins over everything else. Any other end than a zero exit code
/// is a runtime error, whatever the output. Only then is the output compared.
pub fn classify(exec: &Execution, case: &TestCase) -> Status {
    match exec.exit {
        ExitKind::TimedOut => Status::Timeout,
        ExitKind::Exited(0) => {
            if outputs_match(&exec.output, &case.expected, case.value_type) {
                Status::Passed
            } else {
                Status::Failed
            }
        }
        _ => Status::RuntimeError,
    }
}

#[cfg(test)]
mod test {
    use std::{
        path::Path,
        sync::{
            atomic::{AtomicUsize, Ordering},
            Mutex,
        },
    };

    use async_trait::async_trait;

    use super::*;
    use crate::testing::ValueType;

    /// Behaviour is chosen by markers in the program's source:
    /// `COMPILE_ERROR`, `CRASH` (right output, exit 1), `HANG` (times out),
    /// `DOUBLE` (prints twice the input). Anything else prints `0`.
    #[derive(Default)]
    struct FakeToolchain {
        compiles: AtomicUsize,
        executions: AtomicUsize,
    }

    impl FakeToolchain {
        fn source(dir: &Path, program_name: &str) -> String {
            fsutil::read_to_string(dir.join(format!("{}.java", program_name))).unwrap_or_default()
        }
    }

    #[async_trait]
    impl Toolchain for FakeToolchain {
        async fn compile(&self, source_file: &Path, _: &CancellationToken) -> bool {
            self.compiles.fetch_add(1, Ordering::SeqCst);
            !fsutil::read_to_string(source_file)
                .unwrap()
                .contains("COMPILE_ERROR")
        }

        async fn execute(
            &self,
            source_dir: &Path,
            program_name: &str,
            input: &str,
            _: &CancellationToken,
        ) -> Execution {
            self.executions.fetch_add(1, Ordering::SeqCst);
            let src = Self::source(source_dir, program_name);
            let doubled = input.trim().parse::<i32>().map(|n| n * 2).unwrap_or(0);
            let (output, exit) = if src.contains("CRASH") {
                (doubled.to_string(), ExitKind::Exited(1))
            } else if src.contains("HANG") {
                (doubled.to_string(), ExitKind::TimedOut)
            } else if src.contains("DOUBLE") {
                (doubled.to_string(), ExitKind::Exited(0))
            } else {
                ("0".to_owned(), ExitKind::Exited(0))
            };
            Execution { output, exit }
        }
    }

    struct Fixture {
        _tmp: tempfile::TempDir,
        root: PathBuf,
        repo: CaseSuiteRepository,
        suite: TestSuite,
    }

    fn program(marker: &str) -> String {
        format!(
            "public class Main {{\n    public static void main(String[] args) {{}}\n}}\n// {}\n",
            marker
        )
    }

    fn fixture(students: &[(&str, Option<&str>)]) -> Fixture {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("submissions");
        fsutil::mkdir_all(&root).unwrap();
        for (name, marker) in students {
            let dir = root.join(name);
            fsutil::mkdir_all(&dir).unwrap();
            if let Some(marker) = marker {
                fsutil::write(dir.join("Main.java"), program(marker)).unwrap();
            }
        }

        let mut repo = CaseSuiteRepository::new(tmp.path().join("storage"));
        let mut suite = TestSuite::new("Doubling");
        for (title, input, expected) in [("double 2", "2", "4"), ("double 5", "5", "10")] {
            let case = TestCase::new(title, ValueType::Int, input, expected);
            suite.add_case(&case);
            repo.save_case(case).unwrap();
        }
        Fixture {
            _tmp: tmp,
            root,
            repo,
            suite,
        }
    }

    fn request(f: &Fixture) -> RunRequest {
        RunRequest {
            suite: Some(f.suite.clone()),
            root: Some(f.root.clone()),
            code_path: String::new(),
        }
    }

    fn statuses(results: &[TestResult]) -> Vec<(&str, &str, Status)> {
        results
            .iter()
            .map(|r| (r.student.as_str(), r.case_title.as_str(), r.status))
            .collect()
    }

    #[test]
    fn classify_priority() {
        let case = TestCase::new("c", ValueType::String, "", "ok");
        let exec = |output: &str, exit| Execution {
            output: output.to_owned(),
            exit,
        };
        assert_eq!(classify(&exec("ok", ExitKind::Exited(0)), &case), Status::Passed);
        assert_eq!(classify(&exec("no", ExitKind::Exited(0)), &case), Status::Failed);
        assert_eq!(classify(&exec("ok", ExitKind::Exited(3)), &case), Status::RuntimeError);
        assert_eq!(classify(&exec("ok", ExitKind::Signalled), &case), Status::RuntimeError);
        assert_eq!(classify(&exec("ok", ExitKind::TimedOut), &case), Status::Timeout);
        assert_eq!(classify(&Execution::error("boom"), &case), Status::RuntimeError);
    }

    #[tokio::test]
    async fn preconditions_are_checked_in_order() {
        let f = fixture(&[("alice", Some("DOUBLE"))]);
        let mut coord = ExecutionCoordinator::new(FakeToolchain::default(), RunOptions::default());

        let err = coord.run(RunRequest::default(), &f.repo).await.unwrap_err();
        assert!(matches!(err, RunError::Configuration(ConfigError::NoSuiteSelected)));

        let err = coord
            .run(RunRequest { root: None, ..request(&f) }, &f.repo)
            .await
            .unwrap_err();
        assert!(matches!(err, RunError::Configuration(ConfigError::RootUnset)));

        let missing = f.root.join("missing");
        let err = coord
            .run(RunRequest { root: Some(missing), ..request(&f) }, &f.repo)
            .await
            .unwrap_err();
        assert!(matches!(err, RunError::Discovery(DiscoveryError::RootNotDirectory(_))));

        let err = coord
            .run(RunRequest { code_path: "src".to_owned(), ..request(&f) }, &f.repo)
            .await
            .unwrap_err();
        assert!(matches!(err, RunError::Discovery(DiscoveryError::NoSubmissions(_))));

        let mut dangling = TestSuite::new("Dangling");
        dangling.add("no_such_case");
        let err = coord
            .run(RunRequest { suite: Some(dangling), ..request(&f) }, &f.repo)
            .await
            .unwrap_err();
        assert!(matches!(err, RunError::Resolution { ref suite } if suite == "Dangling"));

        assert_eq!(coord.toolchain_counts(), (0, 0));
        assert!(coord.last_run().is_none());
    }

    #[tokio::test]
    async fn grades_the_whole_matrix() {
        let f = fixture(&[
            ("alice", Some("DOUBLE")),
            ("bob", Some("DOUBLE COMPILE_ERROR")),
            ("carol", Some("CRASH")),
            ("dave", Some("HANG")),
            ("erin", None),
            ("frank", Some("WRONG")),
        ]);
        let mut coord = ExecutionCoordinator::new(FakeToolchain::default(), RunOptions::default());
        let results = coord.run(request(&f), &f.repo).await.unwrap();

        use Status::*;
        assert_eq!(
            statuses(&results),
            [
                ("alice", "double 2", Passed),
                ("alice", "double 5", Passed),
                ("bob", "double 2", CompileError),
                ("bob", "double 5", CompileError),
                ("carol", "double 2", RuntimeError),
                ("carol", "double 5", RuntimeError),
                ("dave", "double 2", Timeout),
                ("dave", "double 5", Timeout),
                ("frank", "double 2", Failed),
                ("frank", "double 5", Failed),
                ("erin", "N/A", Skipped),
            ]
        );
        assert_eq!(results[2].actual, "");
        assert_eq!(results[2].expected, "4");
        assert_eq!(results[8].actual, "0");

        // compiled once per submission, executed only when compiled
        assert_eq!(coord.toolchain_counts(), (5, 8));

        let record = coord.last_run().unwrap();
        assert_eq!(record.matrix_results().len(), 10);
        assert_eq!(record.skipped(), ["erin"]);
        assert_eq!(
            coord.find_result("carol", "double 5").map(|r| r.status),
            Some(RuntimeError)
        );
        assert!(coord.find_result("erin", "double 2").is_none());

        let meta = coord.last_run_meta().unwrap();
        assert_eq!(meta.suite_title, "Doubling");
        assert_eq!(meta.root, f.root);

        let archive = record.to_archive();
        assert_eq!(archive.total_cases(), 2);
        assert_eq!(archive.results(), results);
    }

    #[tokio::test]
    async fn dangling_references_are_dropped() {
        let mut f = fixture(&[("alice", Some("DOUBLE"))]);
        f.suite.add("deleted_case");
        let mut coord = ExecutionCoordinator::new(FakeToolchain::default(), RunOptions::default());
        let results = coord.run(request(&f), &f.repo).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(coord.last_run().unwrap().total_cases(), 2);
    }

    #[tokio::test]
    async fn parallel_run_matches_sequential_order() {
        let students: Vec<(String, Option<&str>)> = (0..8)
            .map(|i| {
                let marker = ["DOUBLE", "COMPILE_ERROR", "CRASH", "WRONG"][i % 4];
                (format!("student{:02}", i), Some(marker))
            })
            .collect();
        let students: Vec<(&str, Option<&str>)> =
            students.iter().map(|(n, m)| (n.as_str(), *m)).collect();
        let f = fixture(&students);

        let mut seq = ExecutionCoordinator::new(FakeToolchain::default(), RunOptions::default());
        let expected = seq.run(request(&f), &f.repo).await.unwrap();

        let options = RunOptions {
            jobs: 3,
            ..RunOptions::default()
        };
        let mut par = ExecutionCoordinator::new(FakeToolchain::default(), options);
        let actual = par.run(request(&f), &f.repo).await.unwrap();

        assert_eq!(actual, expected);
        assert_eq!(par.toolchain_counts(), seq.toolchain_counts());
    }

    #[tokio::test]
    async fn progress_sees_every_pair() {
        #[derive(Default)]
        struct Recorder {
            pairs: AtomicUsize,
            seen: Mutex<Vec<String>>,
        }
        impl Progress for Recorder {
            fn on_start(&self, pairs: usize) {
                self.pairs.store(pairs, Ordering::SeqCst);
            }
            fn on_result(&self, result: &TestResult) {
                self.seen.lock().unwrap().push(result.display_line());
            }
        }

        let f = fixture(&[("alice", Some("DOUBLE")), ("bob", None)]);
        let recorder = Arc::new(Recorder::default());
        let mut coord = ExecutionCoordinator::new(FakeToolchain::default(), RunOptions::default())
            .progress(recorder.clone());
        coord.run(request(&f), &f.repo).await.unwrap();

        assert_eq!(recorder.pairs.load(Ordering::SeqCst), 2);
        assert_eq!(
            *recorder.seen.lock().unwrap(),
            ["alice | double 2 | PASSED", "alice | double 5 | PASSED"]
        );
    }

    #[tokio::test]
    async fn cancelled_run_is_interrupted() {
        let f = fixture(&[("alice", Some("DOUBLE")), ("bob", Some("DOUBLE"))]);
        for jobs in [1, 2] {
            let options = RunOptions {
                jobs,
                ..RunOptions::default()
            };
            options.cancel.cancel();
            let mut coord = ExecutionCoordinator::new(FakeToolchain::default(), options);

            let err = coord.run(request(&f), &f.repo).await.unwrap_err();
            assert!(matches!(err, RunError::Interrupted));
            assert_eq!(coord.toolchain_counts(), (0, 0));
            assert!(coord.last_run().is_none());
        }
    }

    impl ExecutionCoordinator<FakeToolchain> {
        fn toolchain_counts(&self) -> (usize, usize) {
            let tc = self.runner.toolchain();
            (
                tc.compiles.load(Ordering::SeqCst),
                tc.executions.load(Ordering::SeqCst),
            )
        }
    }
}
