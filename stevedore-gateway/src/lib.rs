//! Stevedore Gateway
//!
//! HTTP access layer for a remote docker host reachable only through a
//! constrained remote-execution gateway (no daemon socket access).
//!
//! This crate provides:
//! - `RemoteExecutor` / `GatewayClient`: run one command on the remote
//!   host and capture its stdout
//! - `JobProbe` / `HttpJobProbe`: readiness/liveness checks against a
//!   job's own endpoints, routed through the gateway's forwarding path
//!   when one is configured
//! - Prometheus text scraping for the job's last-call metric

pub mod error;
pub mod metrics;
pub mod probe;

pub use error::{GatewayError, ProbeError, Result};
pub use probe::{GatewayForwarding, HttpJobProbe, JobProbe};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Header carrying the gateway auth token
pub const GATEWAY_TOKEN_HEADER: &str = "X-Gateway-Token";

/// Header carrying a job's network-internal name on forwarded requests
pub const JOB_INTERNAL_NAME_HEADER: &str = "X-Job-Internal-Name";

/// Exit code the gateway reports for a process killed with SIGTERM
///
/// Signal-terminated processes are reported as the negative signal number.
pub const TERMINATED_EXIT_CODE: i32 = -15;

/// Executes a single command on the remote host
///
/// One call, one remote process, captured stdout. No retries and no state:
/// callers decide what a failure means.
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    /// Runs `command` on the remote host, returning trimmed stdout
    ///
    /// Fails with `GatewayError::CommandFailed` on non-zero exit.
    async fn execute(&self, command: &str, workdir: Option<&str>) -> Result<String>;
}

/// HTTP client for the remote-execution gateway
#[derive(Debug, Clone)]
pub struct GatewayClient {
    /// Base URL of the gateway (e.g., "https://gateway.example.com")
    base_url: String,
    /// Token sent with every execution request
    token: String,
    /// HTTP client instance
    client: Client,
}

#[derive(Debug, Serialize)]
struct ExecuteRequest<'a> {
    command: &'a str,
    workdir: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct ExecuteResponse {
    stdout: String,
    exit_code: i32,
}

impl GatewayClient {
    /// Create a new gateway client
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.into(),
            client: Client::new(),
        }
    }

    /// Create a gateway client with a custom HTTP client
    ///
    /// This allows configuring timeouts, proxies, TLS settings, etc.
    pub fn with_client(
        base_url: impl Into<String>,
        token: impl Into<String>,
        client: Client,
    ) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.into(),
            client,
        }
    }

    /// Get the base URL of the gateway
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl RemoteExecutor for GatewayClient {
    async fn execute(&self, command: &str, workdir: Option<&str>) -> Result<String> {
        let url = format!("{}/api/v1/execute", self.base_url);
        debug!("Executing remote command: {}", command);

        let response = self
            .client
            .post(&url)
            .header(GATEWAY_TOKEN_HEADER, &self.token)
            .json(&ExecuteRequest { command, workdir })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(GatewayError::api_error(status.as_u16(), error_text));
        }

        let body: ExecuteResponse = response.json().await.map_err(|e| {
            GatewayError::ParseError(format!("Failed to parse execution response: {}", e))
        })?;

        if body.exit_code != 0 {
            return Err(GatewayError::CommandFailed {
                command: command.to_string(),
                exit_code: body.exit_code,
                stdout: body.stdout,
            });
        }

        Ok(body.stdout.trim().to_string())
    }
}
