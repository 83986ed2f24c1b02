//! Job domain types

use serde::{Deserialize, Serialize};

/// Observation of a deployed job workload
///
/// Produced by the deployer after a successful deploy and by the monitor
/// during discovery. Immutable once returned for a given observation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobDescriptor {
    pub name: String,
    pub version: String,
    pub status: JobStatus,
    /// Epoch seconds
    pub create_time: i64,
    /// Epoch seconds
    pub update_time: i64,
    /// Address the job listens on, as seen from the container network,
    /// e.g. "job-demo-1:7000" or "dev-host:7003" in direct-engine mode
    pub internal_address: String,
    /// Short failure summary when status is Error
    pub error: Option<String>,
    /// Name of the infrastructure target this job runs on
    pub infrastructure_target: String,
    /// Last call timestamp scraped from the job's metrics endpoint
    pub last_call_time: Option<i64>,
}

/// Health classification of a job workload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Running,
    Error,
}

/// Job manifest supplied by the host orchestrator
///
/// Opaque input from the engine's point of view; only the identity fields
/// are read here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub name: String,
    pub version: String,
}

/// Secret bundle for a job
///
/// Interface type only: the docker daemon backend does not support secret
/// management and always rejects these.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobSecrets {
    pub secrets: std::collections::HashMap<String, serde_json::Value>,
}
