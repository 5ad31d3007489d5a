use std::{path::PathBuf, time::Duration};

use serde::Serialize;

use crate::Language;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, strum::Display)]
pub enum FailureKind {
    Unsupported,
    Compile,
    Runtime,
    Timeout,
    Cancelled,
}

/// Outcome of compiling and running one solution against one input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub stdout: String,
    pub succeeded: bool,
    pub diagnostic: Option<String>,
    pub failure: Option<FailureKind>,
    pub elapsed: Duration,
}

impl ExecutionResult {
    pub fn success(stdout: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            stdout: stdout.into(),
            succeeded: true,
            diagnostic: None,
            failure: None,
            elapsed,
        }
    }

    pub fn failure(kind: FailureKind, diagnostic: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            succeeded: false,
            diagnostic: Some(diagnostic.into()),
            failure: Some(kind),
            elapsed: Duration::ZERO,
        }
    }

    pub fn with_stdout(mut self, stdout: impl Into<String>) -> Self {
        self.stdout = stdout.into();
        self
    }

    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed = elapsed;
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.failure == Some(FailureKind::Cancelled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, strum::Display)]
pub enum Verdict {
    #[strum(serialize = "AC")]
    Accepted,
    #[strum(serialize = "WA")]
    WrongAnswer,
    #[strum(serialize = "CE")]
    CompileError,
    #[strum(serialize = "RE")]
    RuntimeError,
}

impl Verdict {
    pub fn is_accepted(self) -> bool {
        self == Verdict::Accepted
    }

    pub fn description(self) -> &'static str {
        use Verdict::*;
        match self {
            Accepted => "right answer",
            WrongAnswer => "wrong answer",
            CompileError => "compilation error",
            RuntimeError => "execution error",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Tally {
    pub correct: usize,
    pub wrong: usize,
}

impl Tally {
    pub fn record(&mut self, verdict: Verdict) {
        if verdict.is_accepted() {
            self.correct += 1;
        } else {
            self.wrong += 1;
        }
    }

    pub fn total(&self) -> usize {
        self.correct + self.wrong
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaseOutcome {
    pub name: String,
    pub verdict: Verdict,
    pub actual: String,
    pub expected: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<String>,
    #[serde(serialize_with = "serialize_millis")]
    pub elapsed: Duration,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GroupReport {
    pub name: String,
    pub cases: Vec<CaseOutcome>,
    pub tally: Tally,
}

impl GroupReport {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn push(&mut self, outcome: CaseOutcome) {
        self.tally.record(outcome.verdict);
        self.cases.push(outcome);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub solution: PathBuf,
    pub language: Language,
    pub groups: Vec<GroupReport>,
    pub tally: Tally,
    pub cancelled: bool,
}

impl RunReport {
    pub fn new(solution: impl Into<PathBuf>, language: Language) -> Self {
        Self {
            solution: solution.into(),
            language,
            groups: Vec::new(),
            tally: Tally::default(),
            cancelled: false,
        }
    }

    pub fn push_group(&mut self, group: GroupReport) {
        self.tally.correct += group.tally.correct;
        self.tally.wrong += group.tally.wrong;
        self.groups.push(group);
    }

    pub fn outcomes(&self) -> impl Iterator<Item = &CaseOutcome> {
        self.groups.iter().flat_map(|g| g.cases.iter())
    }
}

fn serialize_millis<S>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_u64(d.as_millis() as u64)
}
