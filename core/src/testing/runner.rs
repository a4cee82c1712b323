use std::{
    future::Future,
    io,
    path::Path,
    process::{ExitStatus, Stdio},
    time::Duration,
};

use async_trait::async_trait;
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader},
    process::{ChildStdin, Command},
};
use tokio_util::sync::CancellationToken;

use crate::submission::{CompileState, Submission};

/// How an execution ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExitKind {
    Exited(i32),
    /// Terminated without an exit code (e.g. by a signal).
    Signalled,
    TimedOut,
    Interrupted,
    LaunchFailed,
}

impl ExitKind {
    pub fn code(&self) -> Option<i32> {
        match self {
            ExitKind::Exited(code) => Some(*code),
            _ => None,
        }
    }

    pub fn is_success(&self) -> bool {
        *self == ExitKind::Exited(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Execution {
    /// Merged stdout and stderr, lines joined with `\n`.
    pub output: String,
    pub exit: ExitKind,
}

impl Execution {
    pub fn error(msg: impl std::fmt::Display) -> Self {
        Self {
            output: format!("ERROR: {}", msg),
            exit: ExitKind::LaunchFailed,
        }
    }

    fn interrupted() -> Self {
        Self {
            output: "ERROR: Execution interrupted".to_owned(),
            exit: ExitKind::Interrupted,
        }
    }
}

/// External compiler and runtime. Implementations never fail: every problem
/// is reported as a failed compile or as an [`Execution`].
#[async_trait]
pub trait Toolchain: Send + Sync {
    /// Returns `true` on success.
    async fn compile(&self, source_file: &Path, cancel: &CancellationToken) -> bool;

    async fn execute(
        &self,
        source_dir: &Path,
        program_name: &str,
        input: &str,
        cancel: &CancellationToken,
    ) -> Execution;
}

/// Runs the configured compiler and runtime as child processes.
///
/// The compiler is invoked as `<compiler...> <absolute source path>`, the
/// runtime as `<runtime...> -cp <source dir> <program name>`.
#[derive(Debug, Clone)]
pub struct ProcessToolchain {
    compiler: Vec<String>,
    runtime: Vec<String>,
    execution_time_limit: Option<Duration>,
    compile_time_limit: Option<Duration>,
}

impl Default for ProcessToolchain {
    fn default() -> Self {
        Self::new(vec!["javac".to_owned()], vec!["java".to_owned()])
    }
}

impl ProcessToolchain {
    const DEFAULT_EXEC_TIME_LIMIT: Duration = Duration::from_secs(10);
    const DEFAULT_COMPILE_TIME_LIMIT: Duration = Duration::from_secs(60);

    pub fn new(compiler: Vec<String>, runtime: Vec<String>) -> Self {
        Self {
            compiler,
            runtime,
            execution_time_limit: Some(Self::DEFAULT_EXEC_TIME_LIMIT),
            compile_time_limit: Some(Self::DEFAULT_COMPILE_TIME_LIMIT),
        }
    }

    /// `None` disables the limit.
    pub fn execution_time_limit(mut self, limit: Option<Duration>) -> Self {
        self.execution_time_limit = limit;
        self
    }

    pub fn compile_time_limit(mut self, limit: Option<Duration>) -> Self {
        self.compile_time_limit = limit;
        self
    }

    pub fn get_exec_time_limit(&self) -> Option<Duration> {
        self.execution_time_limit
    }

    fn command(argv: &[String]) -> io::Result<Command> {
        let (program, args) = argv.split_first().ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "empty command line")
        })?;
        let mut cmd = Command::new(program);
        cmd.args(args).kill_on_drop(true);
        Ok(cmd)
    }
}

#[async_trait]
impl Toolchain for ProcessToolchain {
    async fn compile(&self, source_file: &Path, cancel: &CancellationToken) -> bool {
        let source_file = match fsutil::canonicalize_path(source_file) {
            Ok(path) => path,
            Err(e) => {
                log::warn!("{:#}", e);
                return false;
            }
        };
        let mut proc = match Self::command(&self.compiler).and_then(|mut cmd| {
            cmd.arg(&source_file)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .spawn()
        }) {
            Ok(proc) => proc,
            Err(e) => {
                log::warn!("Failed to spawn compiler {:?}: {}", self.compiler, e);
                return false;
            }
        };

        let (exit, diagnostics) =
            wait_with_merged_output(&mut proc, "", self.compile_time_limit, cancel).await;
        if !diagnostics.is_empty() {
            log::debug!(
                "Compiler output for {}:\n{}",
                source_file.to_string_lossy(),
                diagnostics
            );
        }
        match exit {
            ExitKind::Exited(0) => true,
            ExitKind::Exited(code) => {
                log::info!(
                    "Compile error: {} (exitcode={})",
                    source_file.to_string_lossy(),
                    code
                );
                false
            }
            other => {
                log::warn!(
                    "Failed to compile {}: {:?}",
                    source_file.to_string_lossy(),
                    other
                );
                false
            }
        }
    }

    async fn execute(
        &self,
        source_dir: &Path,
        program_name: &str,
        input: &str,
        cancel: &CancellationToken,
    ) -> Execution {
        let classpath = fsutil::canonicalize_path(source_dir).unwrap_or_else(|_| source_dir.to_owned());

        let spawned = Self::command(&self.runtime).and_then(|mut cmd| {
            cmd.arg("-cp")
                .arg(&classpath)
                .arg(program_name)
                .stdin(Stdio::piped())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .spawn()
        });
        let mut proc = match spawned {
            Ok(proc) => proc,
            Err(e) => return Execution::error(e),
        };

        let (exit, output) =
            wait_with_merged_output(&mut proc, input, self.execution_time_limit, cancel).await;
        match exit {
            ExitKind::Interrupted => Execution::interrupted(),
            ExitKind::LaunchFailed => Execution::error(output),
            exit => Execution { output, exit },
        }
    }
}

/// Feeds `input` to stdin while reading stdout and stderr concurrently into one
/// capture until the child exits. The time limit and cancellation cover all of it.
/// On timeout or cancellation the child is killed and the partial capture kept.
/// For `LaunchFailed`, the returned string is the error message.
async fn wait_with_merged_output(
    proc: &mut tokio::process::Child,
    input: &str,
    limit: Option<Duration>,
    cancel: &CancellationToken,
) -> (ExitKind, String) {
    let stdin = proc.stdin.take();
    let (Some(stdout), Some(stderr)) = (proc.stdout.take(), proc.stderr.take()) else {
        return (ExitKind::LaunchFailed, "Failed to open stdout/stderr".to_owned())
    };

    enum Waited {
        Done(io::Result<ExitStatus>),
        TimedOut,
        Cancelled,
    }

    let mut lines = Vec::new();
    let waited = {
        let fut = async {
            let (_, captured) = tokio::join!(
                feed_stdin(stdin, input),
                capture_merged(stdout, stderr, &mut lines)
            );
            captured?;
            proc.wait().await
        };
        tokio::select! {
            res = with_time_limit(limit, fut) => match res {
                Some(res) => Waited::Done(res),
                None => Waited::TimedOut,
            },
            _ = cancel.cancelled() => Waited::Cancelled,
        }
    };

    let exit = match waited {
        Waited::Done(Ok(status)) => match status.code() {
            Some(code) => ExitKind::Exited(code),
            None => ExitKind::Signalled,
        },
        Waited::Done(Err(e)) => {
            kill(proc).await;
            let msg = format!("Failed to communicate with subprocess: {}", e);
            return (ExitKind::LaunchFailed, msg);
        }
        Waited::TimedOut => ExitKind::TimedOut,
        Waited::Cancelled => ExitKind::Interrupted,
    };
    if matches!(exit, ExitKind::TimedOut | ExitKind::Interrupted) {
        kill(proc).await;
    }
    (exit, lines.join("\n"))
}

/// Dropping the handle at the end gives the child EOF.
async fn feed_stdin(stdin: Option<ChildStdin>, input: &str) {
    let Some(mut stdin) = stdin else { return };
    if input.is_empty() {
        return;
    }
    if let Err(e) = stdin.write_all(input.as_bytes()).await {
        log::debug!("Failed to pass input to subprocess: {}", e);
    }
}

async fn kill(proc: &mut tokio::process::Child) {
    proc.kill()
        .await
        .unwrap_or_else(|e| log::warn!("Failed to kill process: {:#}", e));
}

async fn with_time_limit<F: Future>(limit: Option<Duration>, fut: F) -> Option<F::Output> {
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut).await.ok(),
        None => Some(fut.await),
    }
}

async fn capture_merged<O, E>(stdout: O, stderr: E, sink: &mut Vec<String>) -> io::Result<()>
where
    O: AsyncRead + Unpin,
    E: AsyncRead + Unpin,
{
    let mut out = BufReader::new(stdout).split(b'\n');
    let mut err = BufReader::new(stderr).split(b'\n');
    let (mut out_open, mut err_open) = (true, true);

    while out_open || err_open {
        tokio::select! {
            seg = out.next_segment(), if out_open => match seg? {
                Some(line) => sink.push(decode_line(line)),
                None => out_open = false,
            },
            seg = err.next_segment(), if err_open => match seg? {
                Some(line) => sink.push(decode_line(line)),
                None => err_open = false,
            },
        }
    }
    Ok(())
}

fn decode_line(mut bytes: Vec<u8>) -> String {
    if bytes.last() == Some(&b'\r') {
        bytes.pop();
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Compiles (at most once per submission) and runs submissions through a [`Toolchain`].
#[derive(Debug, Clone)]
pub struct ProgramRunner<T> {
    toolchain: T,
    cancel: CancellationToken,
}

impl<T: Toolchain> ProgramRunner<T> {
    pub fn new(toolchain: T) -> Self {
        Self {
            toolchain,
            cancel: CancellationToken::new(),
        }
    }

    pub fn cancel_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn get_cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn toolchain(&self) -> &T {
        &self.toolchain
    }

    /// Invokes the compiler and records the outcome on the submission.
    pub async fn compile(&self, submission: &mut Submission) -> bool {
        log::info!("Compiling {}", submission.source_file().to_string_lossy());
        let ok = self
            .toolchain
            .compile(submission.source_file(), &self.cancel)
            .await;
        submission.set_compile_state(if ok {
            CompileState::Succeeded
        } else {
            CompileState::Failed
        });
        ok
    }

    /// Memoized compile: the compiler runs only on the first call.
    pub async fn ensure_compiled(&self, submission: &mut Submission) -> bool {
        match submission.compile_state() {
            CompileState::Untried => self.compile(submission).await,
            CompileState::Succeeded => true,
            CompileState::Failed => false,
        }
    }

    /// Runs an already compiled submission with `input` on stdin.
    pub async fn run(&self, submission: &mut Submission, input: &str) -> Execution {
        if submission.compile_state() != CompileState::Succeeded {
            return Execution::error(format!("{} is not compiled", submission.name()));
        }
        let exec = self
            .toolchain
            .execute(
                submission.source_dir(),
                submission.program_name(),
                input,
                &self.cancel,
            )
            .await;
        submission.set_last_exit_code(exec.exit.code());
        exec
    }
}
