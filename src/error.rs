use std::path::PathBuf;

use thiserror::Error;

/// How a single generation attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The server streamed a record with `done = true`.
    Success,
    /// The deadline fired before the server finished.
    Timeout,
    /// The body ended without a usable `done = true` record.
    ParseFailure,
    /// The transport could not be set up; nothing was sent.
    InitFailure,
    /// The server answered with an error status or the connection broke.
    TransportFailure,
}

/// Failure of one fetch attempt.
///
/// None of these are surfaced to callers of the pipeline; the worker logs
/// them and leaves the cached completion untouched.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("failed to initialize transport: {0}")]
    Init(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("response ended before a done record")]
    Incomplete,
    #[error("deadline exceeded")]
    Timeout,
}

impl FetchError {
    /// Classifies the error into the attempt [`Outcome`].
    pub fn outcome(&self) -> Outcome {
        match self {
            FetchError::Init(_) => Outcome::InitFailure,
            FetchError::Transport(_) => Outcome::TransportFailure,
            FetchError::Incomplete => Outcome::ParseFailure,
            FetchError::Timeout => Outcome::Timeout,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_builder() {
            FetchError::Init(e.to_string())
        } else {
            FetchError::Transport(e.to_string())
        }
    }
}

/// Errors produced while loading a [`PipelineConfig`](crate::PipelineConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config syntax: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Errors raised while constructing a pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to start runtime: {0}")]
    Runtime(#[from] std::io::Error),
}
