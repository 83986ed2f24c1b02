//! Shared test doubles
//!
//! A scripted executor standing in for the remote gateway and a canned
//! probe, used by the deployer, monitor and streamer tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use stevedore_core::domain::job::JobDescriptor;
use stevedore_core::domain::target::InfrastructureConfig;
use stevedore_gateway::probe::{AliveCallback, JobProbe};
use stevedore_gateway::{GatewayError, ProbeError, RemoteExecutor};

use crate::config::DeployerConfig;

#[derive(Debug, Clone)]
enum ScriptedResponse {
    Stdout(String),
    Failure { exit_code: i32, stdout: String },
}

/// Remote executor replaying scripted responses and recording commands
///
/// Responses are consumed in push order; once the script runs dry every
/// further command succeeds with empty stdout.
pub struct FakeExecutor {
    responses: Mutex<VecDeque<ScriptedResponse>>,
    commands: Mutex<Vec<String>>,
}

impl FakeExecutor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(VecDeque::new()),
            commands: Mutex::new(Vec::new()),
        })
    }

    pub fn push_stdout(&self, stdout: &str) {
        self.responses
            .lock()
            .unwrap()
            .push_back(ScriptedResponse::Stdout(stdout.to_string()));
    }

    pub fn push_failure(&self, exit_code: i32, stdout: &str) {
        self.responses
            .lock()
            .unwrap()
            .push_back(ScriptedResponse::Failure {
                exit_code,
                stdout: stdout.to_string(),
            });
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }

    pub fn command_count(&self) -> usize {
        self.commands.lock().unwrap().len()
    }
}

#[async_trait]
impl RemoteExecutor for FakeExecutor {
    async fn execute(&self, command: &str, _workdir: Option<&str>) -> Result<String, GatewayError> {
        self.commands.lock().unwrap().push(command.to_string());
        let response = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(ScriptedResponse::Stdout(String::new()));
        match response {
            ScriptedResponse::Stdout(stdout) => Ok(stdout),
            ScriptedResponse::Failure { exit_code, stdout } => Err(GatewayError::CommandFailed {
                command: command.to_string(),
                exit_code,
                stdout,
            }),
        }
    }
}

/// Probe answering from canned state instead of HTTP
pub struct FakeProbe {
    /// Job names whose quick check fails
    pub unhealthy: Vec<String>,
    /// Whether readiness waits succeed
    pub ready: bool,
    /// Last probe error reported by a failed readiness wait
    pub ready_error: String,
    /// Last-call timestamp reported for healthy jobs
    pub last_call: Option<i64>,
}

impl Default for FakeProbe {
    fn default() -> Self {
        Self {
            unhealthy: Vec::new(),
            ready: true,
            ready_error: "job was never reached".to_string(),
            last_call: None,
        }
    }
}

#[async_trait]
impl JobProbe for FakeProbe {
    async fn quick_check(&self, job: &JobDescriptor) -> Result<(), ProbeError> {
        if self.unhealthy.contains(&job.name) {
            return Err(ProbeError::BadStatus {
                status: 500,
                body: "Internal Server Error".to_string(),
            });
        }
        Ok(())
    }

    async fn wait_until_ready(
        &self,
        _job: &JobDescriptor,
        _deployment_timestamp: i64,
        on_alive: Option<AliveCallback>,
    ) -> Result<(), ProbeError> {
        if let Some(callback) = &on_alive {
            callback();
        }
        if self.ready {
            Ok(())
        } else {
            Err(ProbeError::TimedOut {
                waited_secs: 1,
                last_error: self.ready_error.clone(),
            })
        }
    }

    async fn last_call_time(&self, _job: &JobDescriptor) -> Result<Option<i64>, ProbeError> {
        Ok(self.last_call)
    }
}

/// Gateway-mode infrastructure target
pub fn test_infra() -> InfrastructureConfig {
    InfrastructureConfig {
        hostname: String::new(),
        docker_host_uri: None,
        remote_gateway_url: Some("https://gateway.example.com".to_string()),
        remote_gateway_token: Some("gateway-secret".to_string()),
    }
}

pub fn test_deployer_config() -> DeployerConfig {
    DeployerConfig::new("http://pub:7005/pub", "registry.example.com", "jobs")
}
