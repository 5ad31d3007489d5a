use std::io::Write;

use colored::Colorize;
use dojo_core::style::ColorTheme;

pub const DEFAULT_FILTER: &str = "warn";

/// Installs the global logger. `RUST_LOG` overrides [`DEFAULT_FILTER`].
pub fn init() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(DEFAULT_FILTER))
        .format(|buf, record| {
            let level = record.level();
            writeln!(
                buf,
                "{} {}",
                format!("[{}]", level).color(level.color()).bold(),
                record.args()
            )
        })
        .init();
}
