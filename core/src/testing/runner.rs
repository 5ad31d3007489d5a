use std::{
    collections::HashMap,
    ffi::OsString,
    io,
    path::{Path, PathBuf},
    process::{ExitStatus, Stdio},
    time::Duration,
};

use anyhow::Context as _;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tempfile::TempDir;
use tokio::{
    io::AsyncWriteExt as _,
    process::{Child, Command},
    time::Instant,
};

use super::result::{ExecutionResult, FailureKind};
use crate::{cancel::CancelToken, str_interp::CommandTemplate, Language};

/// How a language turns a source file into something runnable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Strategy {
    /// Run the source with an interpreter.
    Interpreted,
    /// Compile to a native executable in the scratch dir.
    Native,
    /// Copy the source into the scratch dir, compile there and run the unit by name.
    Bytecode,
    /// Hand the source to a toolchain that runs it directly.
    Managed,
}

impl Strategy {
    pub fn of(language: Language) -> Option<Self> {
        use Language::*;
        match language {
            Python | Php => Some(Strategy::Interpreted),
            C | Cpp | Rust => Some(Strategy::Native),
            Java => Some(Strategy::Bytecode),
            JavaScript | TypeScript | Go => Some(Strategy::Managed),
            Unknown => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolchainCommand {
    #[serde(default)]
    pub compile: Option<CommandTemplate>,
    pub run: CommandTemplate,
}

impl ToolchainCommand {
    /// Variables a template may reference.
    pub const VARIABLES: [&str; 4] = ["src", "exe", "dir", "unit"];

    /// Referenced variables outside [`Self::VARIABLES`], in order of appearance.
    pub fn unknown_variables(&self) -> Vec<&str> {
        self.compile
            .iter()
            .chain([&self.run])
            .flat_map(|t| t.variables())
            .filter(|v| !Self::VARIABLES.iter().any(|known| known == v))
            .collect()
    }

    pub fn builtin(language: Language) -> Option<Self> {
        use Language::*;
        let (compile, run) = match language {
            Python => (None, "python3 #{src}"),
            Php => (None, "php #{src}"),
            C => (Some("gcc -o #{exe} #{src}"), "#{exe}"),
            Cpp => (Some("g++ -o #{exe} #{src}"), "#{exe}"),
            Rust => (Some("rustc -o #{exe} #{src}"), "#{exe}"),
            Java => (Some("javac -d #{dir} #{src}"), "java -cp #{dir} #{unit}"),
            JavaScript => (None, "node #{src}"),
            TypeScript => (None, "npx --yes tsx #{src}"),
            Go => (None, "go run #{src}"),
            Unknown => return None,
        };
        // builtin templates are covered by `builtin_templates_parse`
        let parse = |s: &str| CommandTemplate::parse(s).ok();
        Some(Self {
            compile: match compile {
                Some(s) => Some(parse(s)?),
                None => None,
            },
            run: parse(run)?,
        })
    }
}

/// A solution made ready to execute. Owns the scratch directory, which is
/// removed when the build is dropped.
#[derive(Debug)]
pub struct Build {
    argv: Vec<OsString>,
    cwd: Option<PathBuf>,
    scratch: Option<TempDir>,
}

impl Build {
    pub fn new(argv: Vec<OsString>) -> Self {
        Self {
            argv,
            cwd: None,
            scratch: None,
        }
    }

    pub fn argv(&self) -> &[OsString] {
        &self.argv
    }

    pub fn scratch_dir(&self) -> Option<&Path> {
        self.scratch.as_ref().map(TempDir::path)
    }

    pub fn command_line(&self) -> String {
        display_argv(&self.argv)
    }
}

/// Compiles (if needed) and executes a solution. Implementations never
/// return errors: every fault becomes a failing `ExecutionResult`.
#[async_trait]
pub trait Runner: Send + Sync {
    async fn build(&self, source: &Path) -> Result<Build, ExecutionResult>;

    async fn execute(&self, build: &Build, input: &str) -> ExecutionResult;

    async fn run(&self, source: &Path, input: &str) -> ExecutionResult {
        match self.build(source).await {
            Ok(build) => self.execute(&build, input).await,
            Err(failed) => failed,
        }
    }
}

/// Dispatch target for `Language::Unknown`.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsupportedRunner;

impl UnsupportedRunner {
    pub const DIAGNOSTIC: &str = "unsupported language";
}

#[async_trait]
impl Runner for UnsupportedRunner {
    async fn build(&self, _source: &Path) -> Result<Build, ExecutionResult> {
        Err(ExecutionResult::failure(
            FailureKind::Unsupported,
            Self::DIAGNOSTIC,
        ))
    }

    async fn execute(&self, _build: &Build, _input: &str) -> ExecutionResult {
        ExecutionResult::failure(FailureKind::Unsupported, Self::DIAGNOSTIC)
    }
}

#[derive(Debug, Clone)]
pub struct ToolchainRunner {
    language: Language,
    strategy: Strategy,
    cmd: ToolchainCommand,
    time_limit: Duration,
    compile_time_limit: Duration,
    cancel: CancelToken,
}

impl ToolchainRunner {
    pub const DEFAULT_TIME_LIMIT: Duration = Duration::from_millis(5000);
    pub const DEFAULT_COMPILE_TIME_LIMIT: Duration = Duration::from_secs(30);
    const EXE_NAME: &str = "program";

    pub fn new(language: Language, strategy: Strategy, cmd: ToolchainCommand) -> Self {
        Self {
            language,
            strategy,
            cmd,
            time_limit: Self::DEFAULT_TIME_LIMIT,
            compile_time_limit: Self::DEFAULT_COMPILE_TIME_LIMIT,
            cancel: CancelToken::new(),
        }
    }

    /// Runner with the builtin toolchain, or `None` for `Language::Unknown`.
    pub fn for_language(language: Language) -> Option<Self> {
        let strategy = Strategy::of(language)?;
        let cmd = ToolchainCommand::builtin(language)?;
        Some(Self::new(language, strategy, cmd))
    }

    pub fn command(mut self, cmd: ToolchainCommand) -> Self {
        self.cmd = cmd;
        self
    }

    pub fn time_limit(mut self, limit: Duration) -> Self {
        self.time_limit = limit;
        self
    }

    pub fn compile_time_limit(mut self, limit: Duration) -> Self {
        self.compile_time_limit = limit;
        self
    }

    pub fn cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn get_strategy(&self) -> Strategy {
        self.strategy
    }

    pub fn get_command(&self) -> &ToolchainCommand {
        &self.cmd
    }

    async fn try_build(&self, source: &Path) -> anyhow::Result<Result<Build, ExecutionResult>> {
        let scratch = tempfile::Builder::new()
            .prefix("dojo_")
            .tempdir()
            .context("Failed to create scratch dir")?;

        let src = if self.strategy == Strategy::Bytecode {
            // javac names its output after the declared class, so compile a private copy
            let file_name = source
                .file_name()
                .with_context(|| format!("Not a file path: {:?}", source))?;
            let copied = scratch.path().join(file_name);
            fsutil::copy_file(source, &copied)?;
            copied
        } else {
            source.to_owned()
        };

        let unit = src.file_stem().unwrap_or_default().to_owned();
        let exe = scratch.path().join(Self::EXE_NAME);
        let vars: HashMap<&str, OsString> = HashMap::from([
            ("src", src.clone().into_os_string()),
            ("exe", exe.into_os_string()),
            ("dir", scratch.path().as_os_str().to_owned()),
            ("unit", unit),
        ]);
        let cwd = (self.strategy == Strategy::Bytecode).then(|| scratch.path().to_owned());

        if let Some(compile) = &self.cmd.compile {
            let argv = compile.expand(&vars)?;
            log::info!("Compiling {}: {}", self.language, display_argv(&argv));

            let outcome = run_process(
                &argv,
                cwd.as_deref(),
                None,
                self.compile_time_limit,
                &self.cancel,
            )
            .await?;

            match outcome {
                ProcessOutcome::Exited {
                    status,
                    stdout,
                    stderr,
                    ..
                } if !status.success() => {
                    // some compilers report on stdout
                    let msg = if stderr.trim().is_empty() { stdout } else { stderr };
                    return Ok(Err(ExecutionResult::failure(
                        FailureKind::Compile,
                        format!("{}\n{}", describe_status(status), msg.trim_end()),
                    )));
                }
                ProcessOutcome::Exited { .. } => (),
                ProcessOutcome::TimedOut(limit) => {
                    return Ok(Err(ExecutionResult::failure(
                        FailureKind::Compile,
                        format!("compilation timeout after {}ms", limit.as_millis()),
                    )));
                }
                ProcessOutcome::Cancelled => {
                    return Ok(Err(ExecutionResult::failure(
                        FailureKind::Cancelled,
                        "cancelled",
                    )));
                }
            }
        }

        let argv = self.cmd.run.expand(&vars)?;
        Ok(Ok(Build {
            argv,
            cwd,
            scratch: Some(scratch),
        }))
    }

    async fn try_execute(&self, build: &Build, input: &str) -> anyhow::Result<ExecutionResult> {
        let outcome = run_process(
            &build.argv,
            build.cwd.as_deref(),
            Some(input.as_bytes()),
            self.time_limit,
            &self.cancel,
        )
        .await?;

        let res = match outcome {
            ProcessOutcome::Exited {
                status,
                stdout,
                stderr,
                elapsed,
            } => {
                if status.success() {
                    ExecutionResult::success(stdout, elapsed)
                } else {
                    let mut diagnostic = describe_status(status);
                    if !stderr.trim().is_empty() {
                        diagnostic.push('\n');
                        diagnostic.push_str(stderr.trim_end());
                    }
                    ExecutionResult::failure(FailureKind::Runtime, diagnostic)
                        .with_stdout(stdout)
                        .with_elapsed(elapsed)
                }
            }
            ProcessOutcome::TimedOut(limit) => ExecutionResult::failure(
                FailureKind::Timeout,
                format!("timeout after {}ms", limit.as_millis()),
            )
            .with_elapsed(limit),
            ProcessOutcome::Cancelled => {
                ExecutionResult::failure(FailureKind::Cancelled, "cancelled")
            }
        };
        Ok(res)
    }
}

#[async_trait]
impl Runner for ToolchainRunner {
    async fn build(&self, source: &Path) -> Result<Build, ExecutionResult> {
        match self.try_build(source).await {
            Ok(res) => res,
            Err(e) => Err(ExecutionResult::failure(
                FailureKind::Compile,
                format!("{:#}", e),
            )),
        }
    }

    async fn execute(&self, build: &Build, input: &str) -> ExecutionResult {
        self.try_execute(build, input)
            .await
            .unwrap_or_else(|e| ExecutionResult::failure(FailureKind::Runtime, format!("{:#}", e)))
    }
}

#[derive(Debug)]
enum ProcessOutcome {
    Exited {
        status: ExitStatus,
        stdout: String,
        stderr: String,
        elapsed: Duration,
    },
    TimedOut(Duration),
    Cancelled,
}

async fn run_process(
    argv: &[OsString],
    cwd: Option<&Path>,
    input: Option<&[u8]>,
    time_limit: Duration,
    cancel: &CancelToken,
) -> anyhow::Result<ProcessOutcome> {
    if cancel.is_cancelled() {
        return Ok(ProcessOutcome::Cancelled);
    }
    let (program, args) = argv.split_first().context("Empty command line")?;

    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(if input.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }
    // own process group, so toolchains that fork the solution (`go run`, `npx tsx`)
    // can be stopped as a whole
    #[cfg(unix)]
    cmd.process_group(0);

    let mut proc = cmd
        .spawn()
        .with_context(|| format!("Failed to spawn '{}'", display_argv(argv)))?;
    // the group outlives its leader, so keep the id even after the child is reaped
    let pgid = proc.id();
    let stdin = proc.stdin.take();
    let mut stdout = proc.stdout.take().context("Failed to open stdout")?;
    let mut stderr = proc.stderr.take().context("Failed to open stderr")?;

    let mut stdout_buf = Vec::new();
    let mut stderr_buf = Vec::new();

    enum Waited {
        Done(io::Result<ExitStatus>),
        TimedOut,
        Cancelled,
    }

    let start_at = Instant::now();
    let waited = {
        let feed = async move {
            if let (Some(mut stdin), Some(input)) = (stdin, input) {
                match stdin.write_all(input).await {
                    // the program exited without reading all of its input
                    Err(e) if e.kind() == io::ErrorKind::BrokenPipe => (),
                    res => res?,
                }
                // stdin is dropped here so the program sees EOF
            }
            Ok::<_, io::Error>(())
        };
        let communicate = async {
            tokio::try_join!(
                feed,
                tokio::io::copy(&mut stdout, &mut stdout_buf),
                tokio::io::copy(&mut stderr, &mut stderr_buf),
                proc.wait()
            )
            .map(|(_, _, _, status)| status)
        };

        tokio::select! {
            res = tokio::time::timeout(time_limit, communicate) => match res {
                Ok(res) => Waited::Done(res),
                Err(_) => Waited::TimedOut,
            },
            _ = cancel.cancelled() => Waited::Cancelled,
        }
    };
    let elapsed = start_at.elapsed();

    match waited {
        Waited::Done(res) => {
            let status = res.context("Failed to communicate with subprocess")?;
            log::debug!(
                "'{}' exited ({}) in {}ms",
                display_argv(argv),
                status,
                elapsed.as_millis()
            );
            Ok(ProcessOutcome::Exited {
                status,
                stdout: String::from_utf8_lossy(&stdout_buf).into_owned(),
                stderr: String::from_utf8_lossy(&stderr_buf).into_owned(),
                elapsed,
            })
        }
        Waited::TimedOut => {
            terminate(&mut proc, pgid, "timed out").await;
            Ok(ProcessOutcome::TimedOut(time_limit))
        }
        Waited::Cancelled => {
            terminate(&mut proc, pgid, "cancelled").await;
            Ok(ProcessOutcome::Cancelled)
        }
    }
}

/// Kills `proc` together with everything it started, then reaps it.
async fn terminate(proc: &mut Child, pgid: Option<u32>, reason: &str) {
    #[cfg(not(unix))]
    let _ = pgid;

    #[cfg(unix)]
    match kill_process_group(pgid) {
        Ok(()) => {
            if let Err(e) = proc.wait().await {
                log::warn!("Failed to reap {} process: {:#}", reason, e);
            }
            return;
        }
        Err(e) => log::warn!("Failed to kill process group of {} process: {:#}", reason, e),
    }

    if let Err(e) = proc.kill().await {
        log::warn!("Failed to kill {} process: {:#}", reason, e);
    }
}

#[cfg(unix)]
fn kill_process_group(pgid: Option<u32>) -> anyhow::Result<()> {
    use nix::{
        sys::signal::{killpg, Signal},
        unistd::Pid,
    };

    let pgid = pgid.context("Process exited before its id was known")?;
    killpg(Pid::from_raw(i32::try_from(pgid)?), Signal::SIGKILL)
        .with_context(|| format!("killpg({}) failed", pgid))
}

fn describe_status(status: ExitStatus) -> String {
    match status.code() {
        Some(code) => format!("exited with code {}", code),
        None => "terminated by signal".to_owned(),
    }
}

fn display_argv(argv: &[OsString]) -> String {
    argv.iter()
        .map(|s| s.to_string_lossy())
        .collect::<Vec<_>>()
        .join(" ")
}
