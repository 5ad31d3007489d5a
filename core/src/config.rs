use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    time::Duration,
};

use rust_embed::RustEmbed;
use serde::Deserialize;
use strum::IntoEnumIterator;

use crate::{
    error::{Error, Result},
    testing::ToolchainCommand,
    Language,
};

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    #[serde(skip)]
    pub source_config_file: Option<PathBuf>,
    pub judge: JudgeConfig,
    /// Per-language command overrides, keyed by the lower-case language name.
    pub toolchain: BTreeMap<String, ToolchainCommand>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct JudgeConfig {
    pub root: PathBuf,
    pub timeout_ms: u64,
    pub compile_timeout_ms: u64,
    pub parallel: usize,
    pub compile_once: bool,
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("templates"),
            timeout_ms: 5000,
            compile_timeout_ms: 30_000,
            parallel: 1,
            compile_once: true,
        }
    }
}

impl JudgeConfig {
    pub fn time_limit(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn compile_time_limit(&self) -> Duration {
        Duration::from_millis(self.compile_timeout_ms)
    }
}

/// `DOJO_*` environment variables layered over the config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct EnvOverrides {
    pub root: Option<PathBuf>,
    pub timeout_ms: Option<u64>,
    pub parallel: Option<usize>,
}

impl EnvOverrides {
    pub const PREFIX: &str = "DOJO_";

    pub fn from_env() -> Result<Self> {
        Ok(envy::prefixed(Self::PREFIX).from_env::<Self>()?)
    }

    pub fn from_vars<I>(vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        Ok(envy::prefixed(Self::PREFIX).from_iter::<_, Self>(vars)?)
    }
}

#[derive(RustEmbed)]
#[folder = "assets/"]
struct Asset;

impl Config {
    pub const FILENAME: &str = "dojo.toml";

    pub fn example_toml() -> String {
        Asset::get(Self::FILENAME)
            .map(|file| String::from_utf8_lossy(file.data.as_ref()).into_owned())
            .unwrap_or_default()
    }

    pub fn from_toml(s: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(s)
    }

    pub fn from_toml_file(filepath: PathBuf) -> Result<Self> {
        let toml = fsutil::read_to_string(&filepath)?;
        let mut cfg = Self::from_toml(&toml).map_err(|source| Error::InvalidConfig {
            path: filepath.clone(),
            source,
        })?;
        for (key, cmd) in &cfg.toolchain {
            if !Language::iter().any(|lang| lang.is_known() && lang.config_key() == key) {
                log::warn!("Unknown language '{}' in [toolchain] of {:?}", key, filepath);
            }
            for var in cmd.unknown_variables() {
                log::warn!(
                    "Unknown variable '{}' in [toolchain.{}] of {:?} (available: {})",
                    var,
                    key,
                    filepath,
                    ToolchainCommand::VARIABLES.join(", ")
                );
            }
        }
        cfg.source_config_file = Some(filepath);
        Ok(cfg)
    }

    /// Find config file in ancestor dirs, including current dir.
    pub fn find_file_in_ancestors(cur_dir: impl AsRef<Path>) -> Option<PathBuf> {
        cur_dir
            .as_ref()
            .ancestors()
            .map(|dir| dir.join(Self::FILENAME))
            .find(|path| path.is_file())
    }

    /// Loads `explicit` if given, else the nearest `dojo.toml`, else defaults.
    pub fn load(cur_dir: impl AsRef<Path>, explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(p) => Some(p.to_owned()),
            None => Self::find_file_in_ancestors(cur_dir),
        };
        match path {
            Some(path) => {
                log::info!("Using config {:?}", path);
                Self::from_toml_file(path)
            }
            None => Ok(Self::default()),
        }
    }

    pub fn with_env(mut self, env: EnvOverrides) -> Self {
        let EnvOverrides {
            root,
            timeout_ms,
            parallel,
        } = env;
        if let Some(root) = root {
            self.judge.root = root;
        }
        if let Some(ms) = timeout_ms {
            self.judge.timeout_ms = ms;
        }
        if let Some(n) = parallel {
            self.judge.parallel = n;
        }
        self
    }

    pub fn find_toolchain(&self, language: Language) -> Option<&ToolchainCommand> {
        self.toolchain.get(language.config_key())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::str_interp::CommandTemplate;

    #[test]
    fn example_toml_should_be_parsable() {
        let toml = Config::example_toml();
        let cfg = dbg!(Config::from_toml(&toml)).unwrap();

        let Config {
            source_config_file,
            judge,
            toolchain,
        } = cfg;

        assert_eq!(source_config_file, None);
        assert_eq!(judge, JudgeConfig::default());
        assert_eq!(
            toolchain["cpp"],
            ToolchainCommand {
                compile: Some(CommandTemplate::parse("g++ -O2 -o #{exe} #{src}").unwrap()),
                run: CommandTemplate::parse("#{exe}").unwrap(),
            }
        );
    }

    #[test]
    fn empty_toml_is_default() {
        let cfg = Config::from_toml("").unwrap();
        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.judge.root, Path::new("templates"));
        assert_eq!(cfg.find_toolchain(Language::Cpp), None);
    }

    #[test]
    fn partial_judge_table() {
        let cfg = Config::from_toml("[judge]\ntimeout_ms = 250\n").unwrap();
        assert_eq!(cfg.judge.time_limit(), Duration::from_millis(250));
        assert_eq!(cfg.judge.parallel, 1);
        assert!(cfg.judge.compile_once);
    }

    #[test]
    fn invalid_template_is_rejected() {
        let res = Config::from_toml("[toolchain.python]\nrun = \"python3 #{src\"\n");
        assert!(dbg!(res).is_err());
    }

    #[test]
    fn env_overrides_apply() {
        let env = EnvOverrides::from_vars([
            ("DOJO_ROOT".to_owned(), "fixtures".to_owned()),
            ("DOJO_PARALLEL".to_owned(), "4".to_owned()),
            ("UNRELATED".to_owned(), "x".to_owned()),
        ])
        .unwrap();
        let cfg = Config::default().with_env(env);
        assert_eq!(cfg.judge.root, Path::new("fixtures"));
        assert_eq!(cfg.judge.parallel, 4);
        assert_eq!(cfg.judge.timeout_ms, 5000);
    }

    #[test]
    fn find_and_load_from_ancestors() {
        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join("a/b");
        fsutil::mkdir_all(&nested).unwrap();
        fsutil::write(
            tmp.path().join(Config::FILENAME),
            "[judge]\nroot = \"cases\"\nparallel = 2\n",
        )
        .unwrap();

        let cfg = Config::load(&nested, None).unwrap();
        assert_eq!(cfg.judge.root, Path::new("cases"));
        assert_eq!(cfg.source_config_file, Some(tmp.path().join(Config::FILENAME)));
    }
}
