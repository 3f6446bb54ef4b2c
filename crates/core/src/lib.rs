pub mod config;
pub mod error;
pub mod paths;
pub mod types;

pub use config::{
    Config, FilterConfig, FilterKind, FilterSpec, LogConfig, PathsConfig, ScrollConfig,
    SelectorConfig, TimingConfig,
};
pub use error::{Error, Result};
pub use paths::Paths;
pub use types::{truncate, Account, Clock, SystemClock};
