//! Error types for the gateway access layer

use thiserror::Error;

use crate::TERMINATED_EXIT_CODE;

/// Result type alias for gateway operations
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Errors raised when executing commands through the remote gateway
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The remote command ran and exited non-zero
    #[error("remote command {command:?} failed with exit code {exit_code}: {stdout}")]
    CommandFailed {
        command: String,
        exit_code: i32,
        stdout: String,
    },

    /// HTTP request to the gateway failed
    #[error("gateway request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// Gateway returned an error status code
    #[error("gateway error (status {status}): {message}")]
    ApiError { status: u16, message: String },

    /// Failed to parse the gateway response
    #[error("failed to parse gateway response: {0}")]
    ParseError(String),
}

impl GatewayError {
    /// Create an API error from status code and message
    pub fn api_error(status: u16, message: impl Into<String>) -> Self {
        Self::ApiError {
            status,
            message: message.into(),
        }
    }

    /// Exit code of the remote command, if it ran at all
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::CommandFailed { exit_code, .. } => Some(*exit_code),
            _ => None,
        }
    }

    /// True when the remote process was killed with SIGTERM on purpose
    ///
    /// This is the expected shutdown path for tailing commands whose
    /// underlying process the engine tears down.
    pub fn is_termination(&self) -> bool {
        self.exit_code() == Some(TERMINATED_EXIT_CODE)
    }
}

/// Errors raised when probing a job's health endpoints
#[derive(Debug, Error)]
pub enum ProbeError {
    /// HTTP request to the job failed
    #[error("health request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Job answered with a non-success status
    #[error("job responded with status {status}: {body}")]
    BadStatus { status: u16, body: String },

    /// Readiness was not reached within the probe deadline
    #[error("job did not become ready within {waited_secs}s: {last_error}")]
    TimedOut { waited_secs: u64, last_error: String },
}
