//! Error types for the fleet manager's core subsystems.

use thiserror::Error;

/// Errors that can arise while talking to the marketplace node daemon.
#[derive(Debug, Error)]
pub enum MarketplaceError {
    #[error("request to node daemon failed: {0}")]
    Transport(#[from] anyhow::Error),
    #[error("node daemon returned an error status: {0}")]
    BadStatus(String),
}

/// Errors produced while loading or reloading fleet configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required config keys: {0:?}")]
    MissingKeys(Vec<String>),
    #[error("could not parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: ParseErrorKind,
    },
    #[error("invalid price '{0}': {1}")]
    InvalidPrice(String, String),
}

/// Wraps the underlying YAML parse error so `ConfigError` can derive
/// `PartialEq`, which `serde_yaml::Error` itself does not support.
#[derive(Debug)]
pub struct ParseErrorKind(pub String);

impl std::fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl PartialEq for ParseErrorKind {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for ParseErrorKind {}

impl std::error::Error for ParseErrorKind {}

impl From<serde_yaml::Error> for ParseErrorKind {
    fn from(error: serde_yaml::Error) -> Self {
        ParseErrorKind(error.to_string())
    }
}
