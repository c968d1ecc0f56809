use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while reading a `key=value` configuration file (and its
/// command-line overrides).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("couldn't find cfg file for program name '{0}'")]
    CfgFileNotFound(String),
    #[error("missing required key '{0}'")]
    MissingKey(String),
    #[error("key '{key}' has value '{value}' that doesn't parse as {expected}")]
    BadValue {
        key: String,
        value: String,
        expected: &'static str,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Top-level error type shared by both cores.
///
/// Library code returns this directly; only the binaries' `main` flattens
/// it into an opaque diagnostic via `anyhow`.
#[derive(Debug, Error)]
pub enum SimError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("{file}: {detail}")]
    Parse { file: PathBuf, detail: String },

    #[error("invariant violation: {0}")]
    Invariant(String),

    #[error("numeric degeneracy: {0}")]
    Degenerate(String),
}

pub type SimResult<T> = Result<T, SimError>;
