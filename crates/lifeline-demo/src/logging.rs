#![forbid(unsafe_code)]

//! Global tracing subscriber for the demo binary.

use std::fmt;
use tracing_subscriber::EnvFilter;

/// Logging could not be set up.
#[derive(Debug)]
pub enum LogInitError {
    /// The filter directive did not parse.
    Filter(String),
    /// A global subscriber was already installed.
    AlreadySet(String),
}

impl fmt::Display for LogInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Filter(msg) => write!(f, "invalid log filter: {msg}"),
            Self::AlreadySet(msg) => write!(f, "logging already initialised: {msg}"),
        }
    }
}

impl std::error::Error for LogInitError {}

/// Build the filter: `RUST_LOG` when set, `level` otherwise.
pub fn filter(level: &str) -> Result<EnvFilter, LogInitError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(level).map_err(|err| LogInitError::Filter(err.to_string())),
    }
}

/// Install the global subscriber. Logs go to stderr so that stdout carries
/// only the report.
pub fn init(level: &str, json: bool) -> Result<(), LogInitError> {
    let filter = filter(level)?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    let result = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    result.map_err(|err| LogInitError::AlreadySet(err.to_string()))
}
