#![cfg(unix)]

use std::path::{Path, PathBuf};

use gradekit_core::{
    action,
    archive::{self, ResultArchive, Standing},
    coordinator::{ExecutionCoordinator, RunOptions, RunRequest},
    storage::CaseSuiteRepository,
    testing::{ProcessToolchain, Status, TestCase, ValueType},
    Config,
};
use tokio_util::sync::CancellationToken;

/// Fails on sources containing `COMPILE_ERROR`.
const COMPILER: &str = r#"grep -q COMPILE_ERROR "$0" && { echo "Main.java:1: error" >&2; exit 1; }; exit 0"#;

/// Adds two numbers, or greets a name.
const RUNTIME: &str = r#"
read a b || true
case "$a" in
  [0-9]*) echo $((a + b)) ;;
  *) echo "Hello $a" ;;
esac
"#;

const MAIN: &str = "public class Main {\n    public static void main(String[] args) {}\n}\n";

struct Project {
    _tmp: tempfile::TempDir,
    dir: PathBuf,
}

impl Project {
    fn root(&self) -> PathBuf {
        self.dir.join("submissions")
    }

    fn storage(&self) -> PathBuf {
        self.dir.join("grading")
    }
}

fn write(path: impl AsRef<Path>, contents: &str) {
    fsutil::write_with_mkdir(path, contents).unwrap();
}

/// alice passes, bob does not compile, carol has no source file.
fn project() -> Project {
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path().to_owned();
    let project = Project { _tmp: tmp, dir };

    let root = project.root();
    write(root.join("alice/Main.java"), MAIN);
    write(root.join("bob/Main.java"), &format!("{}// COMPILE_ERROR\n", MAIN));
    write(root.join("carol/README.md"), "forgot to upload");

    let mut repo = CaseSuiteRepository::new(project.storage());
    let mut suite = repo.create_suite("Week 1").unwrap();
    for case in [
        TestCase::new("Sum", ValueType::Int, "3 4", "7"),
        TestCase::new("Greeting", ValueType::String, "World", "Hello World"),
    ] {
        suite.add_case(&case);
        repo.save_case(case).unwrap();
    }
    repo.save_suite(&suite).unwrap();
    project
}

fn toolchain() -> ProcessToolchain {
    ProcessToolchain::new(
        vec!["sh".into(), "-c".into(), COMPILER.into()],
        vec!["sh".into(), "-c".into(), RUNTIME.into()],
    )
}

#[tokio::test]
async fn grades_a_class_and_archives_the_run() {
    let project = project();
    let repo = CaseSuiteRepository::open(project.storage());
    let suite = repo.suite("Week 1").cloned();
    assert!(suite.is_some());

    let mut coordinator = ExecutionCoordinator::new(toolchain(), RunOptions::default());
    let results = coordinator
        .run(
            RunRequest {
                suite,
                root: Some(project.root()),
                code_path: String::new(),
            },
            &repo,
        )
        .await
        .unwrap();

    let lines: Vec<String> = results.iter().map(|r| r.display_line()).collect();
    assert_eq!(
        lines,
        [
            "alice | Sum | PASSED",
            "alice | Greeting | PASSED",
            "bob | Sum | COMPILE ERROR",
            "bob | Greeting | COMPILE ERROR",
            "carol | SKIPPED",
        ]
    );
    assert_eq!(results[1].actual, "Hello World");

    let archive = coordinator.last_run().unwrap().to_archive();
    assert_eq!(archive.total_cases(), 2);
    assert_eq!(archive.standing("alice"), Standing::Score { passed: 2, total: 2 });
    assert_eq!(archive.standing("bob"), Standing::CompileError);
    assert_eq!(archive.standing("carol"), Standing::NoSubmission);

    let path = project.dir.join("archives/week1.json");
    archive.save(&path).unwrap();
    let loaded = ResultArchive::load(&path).unwrap();
    assert_eq!(loaded, archive);
    assert_eq!(loaded.meta().root, project.root());

    let report_path = project.dir.join("archives/week1.txt");
    loaded.write_report(&report_path).unwrap();
    let report = fsutil::read_to_string(&report_path).unwrap();
    assert!(report.contains("bob | Greeting | COMPILE ERROR"));
    assert!(report.contains("alice  2/2 (100.0%)"));
}

#[tokio::test]
async fn runs_through_the_project_config() {
    let project = project();
    write(
        project.dir.join(Config::FILENAME),
        &format!(
            "[paths]\nroot = \"./submissions\"\nstorage = \"./grading\"\n\n\
             [toolchain]\ncompiler = [\"sh\", \"-c\", {:?}]\nruntime = [\"sh\", \"-c\", {:?}]\n\n\
             [run]\njobs = 2\n",
            COMPILER, RUNTIME
        ),
    );

    let cfg = Config::from_file_finding_in_ancestors(project.root().join("alice")).unwrap();
    let repo = action::open_repository(&cfg).unwrap();
    let archive = action::run_suite(&cfg, &repo, "Week 1", CancellationToken::new())
        .await
        .unwrap();

    let statuses: Vec<Status> = archive.results().iter().map(|r| r.status).collect();
    assert_eq!(
        statuses,
        [
            Status::Passed,
            Status::Passed,
            Status::CompileError,
            Status::CompileError,
            Status::Skipped,
        ]
    );

    // bob fixes the build, alice regresses
    write(project.root().join("bob/Main.java"), MAIN);
    write(project.root().join("alice/Main.java"), "class Main {}\n");
    let second = action::run_suite(&cfg, &repo, "Week 1", CancellationToken::new())
        .await
        .unwrap();

    let rows = archive::compare(&archive, &second);
    let table: Vec<(String, String, String)> = rows
        .iter()
        .map(|r| (r.student.clone(), r.a.to_string(), r.b.to_string()))
        .collect();
    assert_eq!(
        table,
        [
            ("alice".into(), "2/2 (100.0%)".into(), "No submission".into()),
            ("bob".into(), "COMPILE ERROR".into(), "2/2 (100.0%)".into()),
            ("carol".into(), "No submission".into(), "No submission".into()),
        ]
    );
}
