//! Error types for the lifecycle engine

use thiserror::Error;

use stevedore_core::naming::InvalidIdentifier;
use stevedore_gateway::GatewayError;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors raised by deploy, delete, monitoring and streaming operations
#[derive(Debug, Error)]
pub enum EngineError {
    /// A remote command failed; propagated as-is, never retried here
    #[error(transparent)]
    Command(#[from] GatewayError),

    /// Caller-supplied env vars collide with reserved names
    #[error("runtime env vars conflict with reserved names: {}", .names.join(", "))]
    ConfigConflict { names: Vec<String> },

    /// An externally influenced field failed the allow-list check
    #[error(transparent)]
    InvalidName(#[from] InvalidIdentifier),

    /// The engine configuration cannot support the requested operation
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Operation that the docker daemon backend does not implement
    #[error("{0} is not supported on the docker daemon backend")]
    Unsupported(&'static str),

    /// A job failed its readiness wait, optionally with recent logs
    #[error("{}", probe_failure_message(.reason, .logs))]
    Probe {
        reason: String,
        logs: Option<String>,
    },
}

fn probe_failure_message(reason: &str, logs: &Option<String>) -> String {
    match logs {
        Some(logs) => format!("{reason}\nJob logs:\n{logs}"),
        None => reason.to_string(),
    }
}

/// Upper bound for error summaries attached to job descriptors
const ERROR_SUMMARY_LIMIT: usize = 256;

/// Condenses an error message into a short single-line summary
///
/// Descriptors surface these to operators; full stack traces and log dumps
/// must not leak through.
pub(crate) fn truncate_error(message: &str) -> String {
    let flat = message.replace('\n', " ");
    if flat.chars().count() <= ERROR_SUMMARY_LIMIT {
        flat
    } else {
        let cut: String = flat.chars().take(ERROR_SUMMARY_LIMIT).collect();
        format!("{cut}...")
    }
}
