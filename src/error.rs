use std::path::PathBuf;
use thiserror::Error;

/// Why a candidate reference was excluded from the vote.
#[derive(Error, Debug)]
pub enum CandidateError {
    #[error("failed to open {dataset} in {path}: {reason:#}")]
    Open {
        path: PathBuf,
        dataset: String,
        reason: anyhow::Error,
    },
    #[error("alignment failed: {0:#}")]
    Align(anyhow::Error),
    #[error("alignment task panicked: {0}")]
    Panicked(String),
}

/// Operator or programmer misconfiguration, reported before any work starts.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration: {0}")]
    Parse(String),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
