use std::{io, path::PathBuf};

pub type Result<T> = ::std::result::Result<T, Error>;

/// Harness-level faults. Anything that happens while compiling or running a
/// solution is reported through `ExecutionResult` instead.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Testcase directory not found: '{0}'")]
    FixtureNotFound(PathBuf),

    #[error("Cannot read solution file '{0}': {1}")]
    UnreadableSolution(PathBuf, #[source] io::Error),

    #[error("Invalid config TOML '{path}': {source}")]
    InvalidConfig {
        path: PathBuf,

        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid environment override: {0}")]
    InvalidEnv(#[from] envy::Error),

    #[error("Cannot write report: {0}")]
    Report(#[source] io::Error),

    #[error(transparent)]
    Fs(#[from] fsutil::Error),
}
