//! Infrastructure target configuration

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration of one remote docker host
///
/// Supplied externally (the host orchestrator loads it from its plugin
/// config); read-only for the engine. Identifies which remote engine and
/// remote-execution gateway to use.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InfrastructureConfig {
    /// IP or domain name of the docker host, e.g. "1.2.3.4"
    pub hostname: String,
    /// DOCKER_HOST value for direct-engine access, e.g. "ssh://dev-host"
    #[serde(default)]
    pub docker_host_uri: Option<String>,
    /// Base URL of the remote-execution gateway
    #[serde(default)]
    pub remote_gateway_url: Option<String>,
    /// Token authenticating commands sent through the gateway
    #[serde(default)]
    pub remote_gateway_token: Option<String>,
}

/// Invalid infrastructure target configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("remote gateway url and token must be configured together")]
    IncompleteGateway,
    #[error("hostname of the docker host must be set")]
    MissingHostname,
}

impl InfrastructureConfig {
    /// True when commands should be routed through the remote gateway
    pub fn has_gateway(&self) -> bool {
        self.remote_gateway_url.is_some() && self.remote_gateway_token.is_some()
    }

    /// Validates the target configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.remote_gateway_url.is_some() != self.remote_gateway_token.is_some() {
            return Err(ConfigError::IncompleteGateway);
        }
        // Direct-engine mode builds job addresses from the hostname
        if !self.has_gateway() && self.hostname.is_empty() {
            return Err(ConfigError::MissingHostname);
        }
        Ok(())
    }
}
