use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BenchError {
    #[error("I/O Error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("HTTP Error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("YAML Error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("JSON Error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Regex Error: {0}")]
    RegexError(#[from] regex::Error),

    #[error("Parse Error: {0}")]
    ParseError(String),

    #[error("Config Error: {0}")]
    ConfigError(String),

    /// Two endpoints in one source share a name.
    #[error("proxy {0} is the duplicate name")]
    DuplicateEndpoint(String),

    #[error("Connection Error: {0}")]
    ConnectionError(String),

    #[error("unexpected status {0}")]
    StatusError(u16),

    #[error("Timeout Error: deadline of {0:?} exceeded")]
    TimeoutError(Duration),
}

pub type Result<T> = std::result::Result<T, BenchError>;
