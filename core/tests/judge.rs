use std::{path::Path, time::Duration};

use async_trait::async_trait;
use tempfile::TempDir;

use dojo_core::{
    report::{Reporter, Silent, TreeReporter},
    testing::{
        Build, CaseOutcome, ExecutionResult, FailureKind, GroupReport, Runner, Tally, TestGroup,
        Verdict,
    },
    CancelToken, Config, Error, Judge, Language,
};

/// Builds `<root>/templates/<problem>/...` plus the solution file `<root>/<solution>`.
fn workspace(solution: &str, source: &str, fixtures: &[(&str, &str)]) -> (TempDir, Config) {
    let tmp = tempfile::tempdir().unwrap();
    fsutil::write(tmp.path().join(solution), source).unwrap();
    for (path, contents) in fixtures {
        fsutil::write_with_mkdir(tmp.path().join("templates").join(path), contents).unwrap();
    }
    let mut cfg = Config::default();
    cfg.judge.root = tmp.path().join("templates");
    cfg.judge.timeout_ms = 2000;
    (tmp, cfg)
}

const COUNTING_FIXTURES: &[(&str, &str)] = &[
    ("postes/1/1.in", "5\n10 20 70 90 40"),
    ("postes/1/1.sol", "2 2"),
    ("postes/1/2.in", "3\n50 84 85"),
    ("postes/1/2.sol", "0 2\n"),
    ("postes/2/1.in", "1\n49"),
    ("postes/2/1.sol", "1 0"),
];

const COUNTING_PY: &str = r#"
n = int(input())
xs = list(map(int, input().split()))
a = sum(1 for x in xs if x < 50)
b = sum(1 for x in xs if 50 <= x < 85)
print(a, b)
"#;

/// Prints a fixed answer, or fails when `answer` is `None`.
struct FakeRunner {
    answer: Option<&'static str>,
}

impl FakeRunner {
    fn answering(answer: &'static str) -> Self {
        Self {
            answer: Some(answer),
        }
    }

    fn failing() -> Self {
        Self { answer: None }
    }
}

#[async_trait]
impl Runner for FakeRunner {
    async fn build(&self, _source: &Path) -> Result<Build, ExecutionResult> {
        Ok(Build::new(Vec::new()))
    }

    async fn execute(&self, _build: &Build, _input: &str) -> ExecutionResult {
        match self.answer {
            Some(out) => ExecutionResult::success(out, Duration::from_millis(1)),
            None => ExecutionResult::failure(FailureKind::Runtime, "exited with code 1"),
        }
    }
}

#[derive(Default)]
struct Recorder {
    events: Vec<String>,
}

impl Reporter for Recorder {
    fn on_start(&mut self, _solution: &Path, language: Language) -> std::io::Result<()> {
        self.events.push(format!("start {}", language));
        Ok(())
    }

    fn on_group_start(&mut self, group: &TestGroup) -> std::io::Result<()> {
        self.events.push(format!("group {}", group.name));
        Ok(())
    }

    fn on_case(&mut self, group: &str, outcome: &CaseOutcome) -> std::io::Result<()> {
        self.events
            .push(format!("case {}/{} {}", group, outcome.name, outcome.verdict));
        Ok(())
    }

    fn on_group_end(&mut self, group: &GroupReport) -> std::io::Result<()> {
        self.events.push(format!(
            "end {} {}/{}",
            group.name, group.tally.correct, group.tally.wrong
        ));
        Ok(())
    }

    fn on_finish(&mut self, report: &dojo_core::testing::RunReport) -> std::io::Result<()> {
        self.events
            .push(format!("finish {}/{}", report.tally.correct, report.tally.wrong));
        Ok(())
    }
}

#[tokio::test]
async fn every_case_is_reported_once_in_order() {
    let (tmp, cfg) = workspace("postes.py", "", COUNTING_FIXTURES);
    let judge = Judge::new(tmp.path().join("postes.py"), &cfg)
        .with_runner(Box::new(FakeRunner::answering("2 2\n")));

    let mut rec = Recorder::default();
    let report = judge.judge(&mut rec).await.unwrap();

    assert_eq!(
        rec.events,
        [
            "start python",
            "group 1",
            "case 1/1 AC",
            "case 1/2 WA",
            "end 1 1/1",
            "group 2",
            "case 2/1 WA",
            "end 2 0/1",
            "finish 1/2",
        ]
    );
    assert_eq!(report.tally, Tally { correct: 1, wrong: 2 });
    assert!(!report.cancelled);
}

#[tokio::test]
async fn always_failing_solution_counts_everything_wrong() {
    let (tmp, cfg) = workspace("postes.py", "", COUNTING_FIXTURES);
    let judge = Judge::new(tmp.path().join("postes.py"), &cfg)
        .with_runner(Box::new(FakeRunner::failing()));

    let report = judge.judge(&mut Silent).await.unwrap();

    for g in &report.groups {
        assert_eq!(g.tally.correct, 0);
        assert_eq!(g.tally.wrong, g.cases.len());
        assert!(g.cases.iter().all(|c| c.verdict == Verdict::RuntimeError));
    }
    let sum: usize = report.groups.iter().map(|g| g.tally.wrong).sum();
    assert_eq!(report.tally.wrong, sum);
    assert_eq!(report.tally.wrong, 3);
}

#[tokio::test]
async fn judging_twice_gives_identical_tallies() {
    let (tmp, cfg) = workspace("postes.py", "", COUNTING_FIXTURES);
    let judge = Judge::new(tmp.path().join("postes.py"), &cfg)
        .with_runner(Box::new(FakeRunner::answering("0 2")));

    let first = judge.judge(&mut Silent).await.unwrap();
    let second = judge.judge(&mut Silent).await.unwrap();
    assert_eq!(first.tally, second.tally);
    assert_eq!(
        first.groups.iter().map(|g| g.tally).collect::<Vec<_>>(),
        second.groups.iter().map(|g| g.tally).collect::<Vec<_>>()
    );
}

#[tokio::test]
async fn parallel_judging_keeps_case_order() {
    let fixtures: Vec<(String, String)> = (1..=12)
        .flat_map(|i| {
            [
                (format!("p/1/{}.in", i), i.to_string()),
                (format!("p/1/{}.sol", i), "x".to_owned()),
            ]
        })
        .collect();
    let fixtures: Vec<(&str, &str)> = fixtures
        .iter()
        .map(|(a, b)| (a.as_str(), b.as_str()))
        .collect();
    let (tmp, mut cfg) = workspace("p.py", "", &fixtures);
    cfg.judge.parallel = 4;

    let runner = FakeRunner::answering("x");
    let judge = Judge::new(tmp.path().join("p.py"), &cfg).with_runner(Box::new(runner));
    let report = judge.judge(&mut Silent).await.unwrap();

    let names: Vec<_> = report.outcomes().map(|o| o.name.clone()).collect();
    let want: Vec<_> = (1..=12).map(|i| i.to_string()).collect();
    assert_eq!(names, want);
    assert_eq!(report.tally, Tally { correct: 12, wrong: 0 });
}

#[tokio::test]
async fn empty_group_and_no_group() {
    let (tmp, cfg) = workspace("p.py", "", &[("p/1/1.in", "orphan"), ("q/.keep", "")]);

    let mut rec = Recorder::default();
    Judge::new(tmp.path().join("p.py"), &cfg)
        .with_runner(Box::new(FakeRunner::answering("")))
        .judge(&mut rec)
        .await
        .unwrap();
    assert_eq!(rec.events, ["start python", "group 1", "end 1 0/0", "finish 0/0"]);

    fsutil::write(tmp.path().join("q.py"), "").unwrap();
    let mut rec = Recorder::default();
    Judge::new(tmp.path().join("q.py"), &cfg)
        .with_runner(Box::new(FakeRunner::answering("")))
        .judge(&mut rec)
        .await
        .unwrap();
    assert_eq!(rec.events, ["start python", "finish 0/0"]);
}

#[tokio::test]
async fn missing_fixture_root_is_harness_fault() {
    let (tmp, cfg) = workspace("nothing.py", "", &[]);
    let err = Judge::new(tmp.path().join("nothing.py"), &cfg)
        .judge(&mut Silent)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::FixtureNotFound(_)), "{:?}", err);
}

#[tokio::test]
async fn missing_solution_is_harness_fault() {
    let (tmp, cfg) = workspace("other.py", "", COUNTING_FIXTURES);
    let err = Judge::new(tmp.path().join("postes.py"), &cfg)
        .judge(&mut Silent)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::UnreadableSolution(..)), "{:?}", err);
}

#[tokio::test]
async fn unknown_language_fails_every_case() {
    let (tmp, cfg) = workspace(
        "postes.rb",
        "puts 1",
        &[("postes/1/1.in", "1"), ("postes/1/1.sol", "1"), ("postes/1/2.in", "2"), ("postes/1/2.sol", "2")],
    );
    let report = Judge::new(tmp.path().join("postes.rb"), &cfg)
        .judge(&mut Silent)
        .await
        .unwrap();

    assert_eq!(report.language, Language::Unknown);
    assert_eq!(report.tally, Tally { correct: 0, wrong: 2 });
    for o in report.outcomes() {
        assert_eq!(o.verdict, Verdict::CompileError);
        assert_eq!(o.diagnostic.as_deref(), Some("unsupported language"));
    }
}

#[tokio::test]
async fn cancelled_run_returns_partial_report() {
    let (tmp, cfg) = workspace("postes.py", "", COUNTING_FIXTURES);
    let token = CancelToken::new();
    token.cancel();

    let runner = FakeRunner::answering("2 2");
    let report = Judge::new(tmp.path().join("postes.py"), &cfg)
        .with_runner(Box::new(runner))
        .cancel_token(token)
        .judge(&mut Silent)
        .await
        .unwrap();
    assert!(report.cancelled);
    assert_eq!(report.tally.total(), 0);
}

// The following run real python3 processes.

#[tokio::test]
async fn counting_solution_is_accepted() {
    let (tmp, cfg) = workspace("postes.py", COUNTING_PY, COUNTING_FIXTURES);
    let report = Judge::new(tmp.path().join("postes.py"), &cfg)
        .judge(&mut Silent)
        .await
        .unwrap();
    dbg!(&report);

    let first = &report.groups[0].cases[0];
    assert_eq!(first.name, "1");
    assert_eq!(first.verdict, Verdict::Accepted);
    assert_eq!(first.actual, "2 2\n");
    assert_eq!(report.tally, Tally { correct: 3, wrong: 0 });
}

#[tokio::test]
async fn compiling_per_case_gives_same_result() {
    let (tmp, mut cfg) = workspace("postes.py", COUNTING_PY, COUNTING_FIXTURES);
    cfg.judge.compile_once = false;
    let report = Judge::new(tmp.path().join("postes.py"), &cfg)
        .judge(&mut Silent)
        .await
        .unwrap();
    assert_eq!(report.tally, Tally { correct: 3, wrong: 0 });
}

#[tokio::test]
async fn hanging_solution_is_stopped() {
    let (tmp, mut cfg) = workspace(
        "hang.py",
        "while True: pass",
        &[("hang/1/1.in", ""), ("hang/1/1.sol", ""), ("hang/1/2.in", ""), ("hang/1/2.sol", "")],
    );
    cfg.judge.timeout_ms = 300;

    let started = std::time::Instant::now();
    let report = Judge::new(tmp.path().join("hang.py"), &cfg)
        .judge(&mut Silent)
        .await
        .unwrap();

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(report.tally, Tally { correct: 0, wrong: 2 });
    for o in report.outcomes() {
        assert_eq!(o.verdict, Verdict::RuntimeError);
        assert!(o.diagnostic.as_deref().unwrap().starts_with("timeout"));
    }
}

#[tokio::test]
async fn tree_report_for_real_run() {
    let (tmp, cfg) = workspace("postes.py", COUNTING_PY, COUNTING_FIXTURES);
    let mut reporter = TreeReporter::new(Vec::new());
    Judge::new(tmp.path().join("postes.py"), &cfg)
        .judge(&mut reporter)
        .await
        .unwrap();
    let text = String::from_utf8(reporter.into_inner()).unwrap();
    assert!(text.contains("out: 2 2\n"), "{}", text);
    assert!(text.contains("correct: 3"), "{}", text);
    assert!(text.contains("wrong: 0"), "{}", text);
}
