use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("CDP error: {0}")]
    Cdp(String),

    #[error("Navigation error: {0}")]
    Navigation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Timeout: {0}")]
    Timeout(String),
}

impl Error {
    /// Element-not-yet-present style failures that a bounded retry may fix.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::NotFound(_) | Error::Timeout(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
