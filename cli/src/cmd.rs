use std::{
    io::{self, IsTerminal as _},
    path::{Path, PathBuf},
};

use anyhow::Context as _;
use colored::Colorize;
use strum::IntoEnumIterator;

use dojo_core::{
    config::EnvOverrides,
    report::{JsonReporter, Reporter, TreeReporter},
    testing::ToolchainRunner,
    CancelToken, Config, Judge, Language,
};

#[derive(Debug, clap::Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Solution source file, e.g. `postes.py`.
    #[arg(required_unless_present_any = ["languages", "example_config"])]
    pub solution: Option<PathBuf>,

    /// Testcase root directory.
    #[arg(short, long, value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Per-case time limit in milliseconds.
    #[arg(short, long, value_name = "MS")]
    pub timeout: Option<u64>,

    /// Number of cases run concurrently within a group.
    #[arg(short = 'j', long, value_name = "N")]
    pub parallel: Option<usize>,

    #[arg(short, long, value_enum, default_value = "text")]
    pub format: Format,

    /// Config file to use instead of the nearest `dojo.toml`.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[arg(long)]
    pub no_color: bool,

    /// Print the supported languages and their commands, then exit.
    #[arg(long)]
    pub languages: bool,

    /// Print an example `dojo.toml`, then exit.
    #[arg(long)]
    pub example_config: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
#[clap(rename_all = "lower")]
pub enum Format {
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Finished,
    Cancelled,
}

impl Args {
    pub async fn exec(&self) -> anyhow::Result<Completion> {
        if self.example_config {
            print!("{}", Config::example_toml());
            return Ok(Completion::Finished);
        }

        let cfg = self.load_config()?;
        if self.languages {
            print_languages(&cfg);
            return Ok(Completion::Finished);
        }

        let Some(solution) = &self.solution else {
            anyhow::bail!("No solution file given");
        };
        judge(solution, &cfg, self.format).await
    }

    /// Config file, then `DOJO_*` environment, then command line flags.
    pub fn load_config(&self) -> anyhow::Result<Config> {
        let cur_dir = std::env::current_dir().context("Failed to get current dir")?;
        let cfg = Config::load(cur_dir, self.config.as_deref())?.with_env(EnvOverrides::from_env()?);
        Ok(self.apply(cfg))
    }

    pub fn apply(&self, mut cfg: Config) -> Config {
        if let Some(root) = &self.root {
            cfg.judge.root = root.clone();
        }
        if let Some(ms) = self.timeout {
            cfg.judge.timeout_ms = ms;
        }
        if let Some(n) = self.parallel {
            cfg.judge.parallel = n;
        }
        cfg
    }
}

async fn judge(solution: &Path, cfg: &Config, format: Format) -> anyhow::Result<Completion> {
    let token = CancelToken::new();
    let judge = Judge::new(solution, cfg).cancel_token(token.clone());

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupted, stopping running cases ...");
            token.cancel();
        }
    });

    let stdout = io::stdout();
    let mut reporter: Box<dyn Reporter> = match format {
        Format::Text => {
            let progress = stdout.is_terminal();
            Box::new(TreeReporter::new(stdout).with_progress(progress))
        }
        Format::Json => Box::new(JsonReporter::new(stdout)),
    };

    let report = judge
        .judge(reporter.as_mut())
        .await
        .with_context(|| format!("Failed to judge {:?}", solution))?;

    Ok(if report.cancelled {
        Completion::Cancelled
    } else {
        Completion::Finished
    })
}

fn print_languages(cfg: &Config) {
    for lang in Language::iter() {
        let Some(mut runner) = ToolchainRunner::for_language(lang) else {
            continue;
        };
        let mut origin = String::new();
        if let Some(cmd) = cfg.find_toolchain(lang) {
            runner = runner.command(cmd.clone());
            origin = " (dojo.toml)".dimmed().to_string();
        }
        let cmd = runner.get_command();

        println!("{} [{}]{}", lang.to_string().bold(), runner.get_strategy(), origin);
        if let Some(compile) = &cmd.compile {
            println!("    compile: {}", compile);
        }
        println!("    run:     {}", cmd.run);
    }
}
