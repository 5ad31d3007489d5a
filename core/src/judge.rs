use std::{
    fs, io,
    path::{Path, PathBuf},
};

use futures::stream::{self, StreamExt as _};

use crate::{
    cancel::CancelToken,
    config::{Config, JudgeConfig},
    error::{Error, Result},
    report::Reporter,
    testing::{
        load_groups, Build, CaseOutcome, ExecutionResult, FailureKind, GroupReport, RunReport,
        Runner, TestCase, ToolchainCommand, ToolchainRunner, UnsupportedRunner, Verdict,
    },
    Language,
};

/// Compares outputs ignoring only leading and trailing whitespace.
pub fn compare(actual: &str, expected: &str) -> bool {
    actual.trim() == expected.trim()
}

pub fn classify(res: &ExecutionResult, expected: &str) -> Verdict {
    match res.failure {
        Some(FailureKind::Compile | FailureKind::Unsupported) => Verdict::CompileError,
        Some(_) => Verdict::RuntimeError,
        None if !res.succeeded => Verdict::RuntimeError,
        None if compare(&res.stdout, expected) => Verdict::Accepted,
        None => Verdict::WrongAnswer,
    }
}

fn make_outcome(case: &TestCase, res: ExecutionResult) -> CaseOutcome {
    CaseOutcome {
        name: case.name.clone(),
        verdict: classify(&res, &case.expected),
        actual: res.stdout,
        expected: case.expected.clone(),
        diagnostic: res.diagnostic,
        elapsed: res.elapsed,
    }
}

pub struct Judge {
    solution: PathBuf,
    language: Language,
    cfg: JudgeConfig,
    toolchain: Option<ToolchainCommand>,
    cancel: CancelToken,
    runner: Option<Box<dyn Runner>>,
}

impl Judge {
    pub fn new(solution: impl Into<PathBuf>, cfg: &Config) -> Self {
        let solution = solution.into();
        let language = Language::detect(&solution);
        Self {
            toolchain: cfg.find_toolchain(language).cloned(),
            solution,
            language,
            cfg: cfg.judge.clone(),
            cancel: CancelToken::new(),
            runner: None,
        }
    }

    /// Replaces the runner chosen from the detected language.
    pub fn with_runner(mut self, runner: Box<dyn Runner>) -> Self {
        self.runner = Some(runner);
        self
    }

    pub fn cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn solution(&self) -> &Path {
        &self.solution
    }

    /// Name of the testcase directory for this solution.
    pub fn base_name(&self) -> String {
        self.solution
            .file_stem()
            .unwrap_or_default()
            .to_string_lossy()
            .into_owned()
    }

    fn make_runner(&self) -> Box<dyn Runner> {
        let Some(runner) = ToolchainRunner::for_language(self.language) else {
            return Box::new(UnsupportedRunner);
        };
        let runner = runner
            .time_limit(self.cfg.time_limit())
            .compile_time_limit(self.cfg.compile_time_limit())
            .cancel_token(self.cancel.clone());
        match &self.toolchain {
            Some(cmd) => Box::new(runner.command(cmd.clone())),
            None => Box::new(runner),
        }
    }

    fn check_solution_readable(&self) -> Result<()> {
        let meta = fs::metadata(&self.solution)
            .map_err(|e| Error::UnreadableSolution(self.solution.clone(), e))?;
        if !meta.is_file() {
            return Err(Error::UnreadableSolution(
                self.solution.clone(),
                io::Error::new(io::ErrorKind::InvalidInput, "not a regular file"),
            ));
        }
        fs::File::open(&self.solution)
            .map(drop)
            .map_err(|e| Error::UnreadableSolution(self.solution.clone(), e))
    }

    /// Judges the solution against every testcase group.
    ///
    /// Only harness faults are returned as errors. Cancellation yields a
    /// partial report with `cancelled` set.
    pub async fn judge(&self, reporter: &mut dyn Reporter) -> Result<RunReport> {
        self.check_solution_readable()?;
        let groups = load_groups(&self.cfg.root, &self.base_name())?;

        let owned_runner;
        let runner: &dyn Runner = match &self.runner {
            Some(r) => r.as_ref(),
            None => {
                owned_runner = self.make_runner();
                owned_runner.as_ref()
            }
        };

        let mut report = RunReport::new(&self.solution, self.language);
        reporter.on_start(&self.solution, self.language).map_err(Error::Report)?;
        log::info!(
            "Judging {:?} as {} ({} groups)",
            self.solution,
            self.language,
            groups.len()
        );

        let num_cases: usize = groups.iter().map(|g| g.len()).sum();
        let build: Option<std::result::Result<Build, ExecutionResult>> =
            if self.cfg.compile_once && num_cases > 0 {
                Some(runner.build(&self.solution).await)
            } else {
                None
            };
        if let Some(Ok(b)) = &build {
            log::info!("Running: {}", b.command_line());
        }

        let parallel = self.cfg.parallel.max(1);
        let solution = self.solution.as_path();

        for group in &groups {
            if self.cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
            reporter.on_group_start(group).map_err(Error::Report)?;

            let build = &build;
            let mut results = stream::iter(&group.cases)
                .map(|case| async move {
                    let res = match build {
                        Some(Ok(b)) => runner.execute(b, &case.input).await,
                        Some(Err(failed)) => failed.clone(),
                        None => runner.run(solution, &case.input).await,
                    };
                    (case, res)
                })
                .buffered(parallel);

            let mut g = GroupReport::new(&group.name);
            while let Some((case, res)) = results.next().await {
                if res.is_cancelled() {
                    report.cancelled = true;
                    continue;
                }
                log::debug!(
                    "Testcase {}/{} finished in {}ms",
                    group.name,
                    case.name,
                    res.elapsed.as_millis()
                );
                let outcome = make_outcome(case, res);
                reporter.on_case(&group.name, &outcome).map_err(Error::Report)?;
                g.push(outcome);
            }

            reporter.on_group_end(&g).map_err(Error::Report)?;
            report.push_group(g);
        }

        reporter.on_finish(&report).map_err(Error::Report)?;
        Ok(report)
    }
}
