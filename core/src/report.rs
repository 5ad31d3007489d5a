//! Renderers for judge progress and results.
//!
//! The judge drives a [`Reporter`] with one event per case and one summary per
//! group; renderers decide what to do with them.

use std::{
    io::{self, Write},
    path::Path,
    time::Duration,
};

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use crate::{
    style,
    testing::{CaseOutcome, GroupReport, RunReport, Tally, TestGroup},
    Language,
};

pub trait Reporter {
    fn on_start(&mut self, _solution: &Path, _language: Language) -> io::Result<()> {
        Ok(())
    }

    fn on_group_start(&mut self, _group: &TestGroup) -> io::Result<()> {
        Ok(())
    }

    fn on_case(&mut self, _group: &str, _outcome: &CaseOutcome) -> io::Result<()> {
        Ok(())
    }

    fn on_group_end(&mut self, _group: &GroupReport) -> io::Result<()> {
        Ok(())
    }

    fn on_finish(&mut self, _report: &RunReport) -> io::Result<()> {
        Ok(())
    }
}

/// Ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct Silent;

impl Reporter for Silent {}

/// Tree-style console report.
pub struct TreeReporter<W: Write> {
    out: W,
    progress: Option<ProgressBar>,
    show_progress: bool,
}

impl<W: Write> TreeReporter<W> {
    const RULE_WIDTH: usize = 46;

    pub fn new(out: W) -> Self {
        Self {
            out,
            progress: None,
            show_progress: false,
        }
    }

    /// Shows a spinner on stderr while a group is being judged.
    pub fn with_progress(mut self, enabled: bool) -> Self {
        self.show_progress = enabled;
        self
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn emit(&mut self, lines: &[String]) -> io::Result<()> {
        let out = &mut self.out;
        let mut write_all = || -> io::Result<()> {
            for line in lines {
                writeln!(out, "{}", line)?;
            }
            out.flush()
        };
        match &self.progress {
            Some(bar) => bar.suspend(write_all),
            None => write_all(),
        }
    }

    fn tally_lines(indent: &str, tally: &Tally) -> [String; 2] {
        [
            format!("{}├── {}", indent, format!("correct: {}", tally.correct).green()),
            format!("{}└── {}", indent, format!("wrong: {}", tally.wrong).red()),
        ]
    }
}

impl<W: Write> Reporter for TreeReporter<W> {
    fn on_start(&mut self, solution: &Path, language: Language) -> io::Result<()> {
        let name = solution.file_stem().unwrap_or_default().to_string_lossy();
        self.emit(&[
            format!("{} / (language: {})", name.bold(), language),
            "│".to_owned(),
        ])
    }

    fn on_group_start(&mut self, group: &TestGroup) -> io::Result<()> {
        self.emit(&["│".to_owned(), format!("├── group {}", group.name.bold())])?;

        if self.show_progress {
            let bar = ProgressBar::new(group.len() as u64).with_style(
                ProgressStyle::default_bar()
                    .template("{spinner} {msg} [{pos}/{len}]")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            bar.set_message(format!("Judging group {} ...", group.name));
            bar.enable_steady_tick(Duration::from_millis(80));
            self.progress = Some(bar);
        }
        Ok(())
    }

    fn on_case(&mut self, _group: &str, outcome: &CaseOutcome) -> io::Result<()> {
        let mut lines = vec![format!(
            "    ├── {} / {} {} [{}ms]",
            outcome.name,
            style::verdict_icon(outcome.verdict),
            outcome.verdict.description(),
            outcome.elapsed.as_millis(),
        )];
        match &outcome.diagnostic {
            Some(diagnostic) if !outcome.verdict.is_accepted() => {
                lines.push(format!("        └── error: {}", diagnostic.trim_end()));
            }
            _ => {
                lines.push(format!("        ├── out: {}", outcome.actual.trim_end()));
                lines.push(format!("        └── answer: {}", outcome.expected.trim_end()));
            }
        }
        self.emit(&lines)?;

        if let Some(bar) = &self.progress {
            bar.inc(1);
        }
        Ok(())
    }

    fn on_group_end(&mut self, group: &GroupReport) -> io::Result<()> {
        if let Some(bar) = self.progress.take() {
            bar.finish_and_clear();
        }
        let [correct, wrong] = Self::tally_lines("        ", &group.tally);
        self.emit(&["    └── statistics group".to_owned(), correct, wrong])
    }

    fn on_finish(&mut self, report: &RunReport) -> io::Result<()> {
        let [correct, wrong] = Self::tally_lines("        ", &report.tally);
        let mut lines = vec![
            String::new(),
            "-".repeat(Self::RULE_WIDTH),
            "    └── statistics total".to_owned(),
            correct,
            wrong,
        ];
        if report.cancelled {
            lines.push("(cancelled: partial report)".bright_yellow().to_string());
        }
        self.emit(&lines)
    }
}

/// Writes the whole run report as pretty JSON once judging has finished.
pub struct JsonReporter<W: Write> {
    out: W,
}

impl<W: Write> JsonReporter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Reporter for JsonReporter<W> {
    fn on_finish(&mut self, report: &RunReport) -> io::Result<()> {
        serde_json::to_writer_pretty(&mut self.out, report)?;
        writeln!(self.out)?;
        self.out.flush()
    }
}
