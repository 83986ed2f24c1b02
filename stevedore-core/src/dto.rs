//! Request DTOs exchanged with the host orchestrator

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::domain::job::Manifest;

/// Inputs for deploying one job generation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployRequest {
    pub manifest: Manifest,
    /// Image tag to deploy
    pub tag: String,
    /// Caller-supplied environment variables for the job containers
    #[serde(default)]
    pub runtime_env_vars: HashMap<String, String>,
    /// Auth token issued by the orchestrator for this job
    pub auth_token: String,
    /// Number of containers to start for this job (1 or 2)
    #[serde(default = "default_containers_num")]
    pub containers_num: usize,
}

fn default_containers_num() -> usize {
    1
}

impl DeployRequest {
    pub fn new(manifest: Manifest, tag: impl Into<String>, auth_token: impl Into<String>) -> Self {
        Self {
            manifest,
            tag: tag.into(),
            runtime_env_vars: HashMap::new(),
            auth_token: auth_token.into(),
            containers_num: 1,
        }
    }
}

/// Parameters of one log-tailing session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSessionRequest {
    pub job_name: String,
    pub job_version: String,
    /// Number of historical lines to replay when the session opens
    #[serde(default)]
    pub tail: Option<u32>,
}
