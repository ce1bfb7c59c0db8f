//! Error taxonomy shared by every generator operation.

use std::time::Duration;
use thiserror::Error;

/// Errors raised by configuration, lifecycle and sinks.
#[derive(Debug, Error)]
pub enum GeneratorError {
    /// A parameter failed validation at construction or mutation.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    /// `start` was called while a run was still active.
    #[error("generator is already running")]
    AlreadyRunning,
    /// The output device or file failed. Fatal to the current run.
    #[error("sink error: {0}")]
    Sink(String),
    /// The background activity did not acknowledge cancellation in time.
    #[error("generation activity did not stop within {0:?}")]
    StopTimeout(Duration),
}

impl GeneratorError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        GeneratorError::InvalidParameter(message.into())
    }

    pub(crate) fn sink(message: impl Into<String>) -> Self {
        GeneratorError::Sink(message.into())
    }
}

impl From<hound::Error> for GeneratorError {
    fn from(err: hound::Error) -> Self {
        GeneratorError::Sink(format!("wav writer: {err}"))
    }
}

impl From<std::io::Error> for GeneratorError {
    fn from(err: std::io::Error) -> Self {
        GeneratorError::Sink(format!("io: {err}"))
    }
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, GeneratorError>;
