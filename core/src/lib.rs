pub mod cancel;
pub mod config;
pub mod error;
pub mod judge;
pub mod lang;
pub mod report;
pub mod str_interp;
pub mod style;
pub mod testing;

pub use crate::cancel::CancelToken;
pub use crate::config::Config;
pub use crate::error::{Error, Result};
pub use crate::judge::Judge;
pub use crate::lang::Language;
