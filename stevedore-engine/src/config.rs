//! Deployer configuration
//!
//! Values the host orchestrator supplies once and the deployer injects
//! into every job it starts. Loading (YAML, env) stays on the
//! orchestrator side; this struct is the interface.

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Orchestrator-wide settings read by the deployer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployerConfig {
    /// URL under which jobs reach the orchestrator's pub endpoint
    pub internal_pub_url: String,

    /// Hostname (and port) of the docker registry holding job images
    pub docker_registry: String,

    /// Registry namespace job images live under
    pub docker_registry_namespace: String,

    /// Header name jobs use to propagate request tracing ids
    #[serde(default = "default_tracing_header")]
    pub tracing_header: String,

    /// Whether jobs should export OpenTelemetry traces
    #[serde(default)]
    pub open_telemetry_enabled: bool,

    /// Collector endpoint, required when telemetry is enabled
    #[serde(default)]
    pub open_telemetry_endpoint: Option<String>,
}

fn default_tracing_header() -> String {
    "X-Request-Tracing-Id".to_string()
}

impl DeployerConfig {
    pub fn new(
        internal_pub_url: impl Into<String>,
        docker_registry: impl Into<String>,
        docker_registry_namespace: impl Into<String>,
    ) -> Self {
        Self {
            internal_pub_url: internal_pub_url.into(),
            docker_registry: docker_registry.into(),
            docker_registry_namespace: docker_registry_namespace.into(),
            tracing_header: default_tracing_header(),
            open_telemetry_enabled: false,
            open_telemetry_endpoint: None,
        }
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<()> {
        if self.internal_pub_url.is_empty() {
            return Err(EngineError::InvalidConfig(
                "internal_pub_url cannot be empty".to_string(),
            ));
        }
        if self.docker_registry.is_empty() {
            return Err(EngineError::InvalidConfig(
                "docker_registry cannot be empty".to_string(),
            ));
        }
        if self.docker_registry_namespace.is_empty() {
            return Err(EngineError::InvalidConfig(
                "docker_registry_namespace cannot be empty".to_string(),
            ));
        }
        if self.open_telemetry_enabled && self.open_telemetry_endpoint.is_none() {
            return Err(EngineError::InvalidConfig(
                "open_telemetry_endpoint is required when telemetry is enabled".to_string(),
            ));
        }
        Ok(())
    }
}
