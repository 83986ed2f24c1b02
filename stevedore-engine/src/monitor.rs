//! Job monitor
//!
//! Discovers running job containers on the remote host and classifies
//! their health: a container exists, then its HTTP endpoints answer, then
//! its metrics reveal when it was last called. Probe failures are
//! isolated per job so one broken workload never hides the others.

use std::sync::{Arc, LazyLock};

use chrono::Utc;
use regex::Regex;
use tracing::{debug, warn};

use stevedore_core::domain::job::{JobDescriptor, JobStatus};
use stevedore_core::domain::target::InfrastructureConfig;
use stevedore_core::naming::{JOB_INTERNAL_PORT, resource_name};
use stevedore_gateway::RemoteExecutor;
use stevedore_gateway::probe::{AliveCallback, JobProbe};

use crate::commands::DockerCli;
use crate::error::{EngineError, Result, truncate_error};

/// Lines fetched when enriching a failed readiness wait with logs
pub const RECENT_LOGS_TAIL: u32 = 20;

/// Fixed fields of a discovery line; ports text trails and is matched
/// separately because it varies between platforms
static DISCOVERY_LINE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<resource>job-\S+) (?P<name>\S+) (?P<version>\S+) (?P<ports>.*)$")
        .expect("constant regex pattern is valid")
});

static PUBLISHED_PORT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"0\.0\.0\.0:(?P<port>\d+)->7000/tcp").expect("constant regex pattern is valid")
});

/// One job container matched out of the discovery listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredContainer {
    pub resource_name: String,
    pub job_name: String,
    pub job_version: String,
    pub published_port: Option<u16>,
}

/// Parses one discovery listing line
///
/// Returns `None` for lines that do not match the fixed-field pattern;
/// the listing may contain unrelated containers, so a mismatch skips the
/// line rather than failing the listing.
pub fn parse_discovery_line(line: &str) -> Option<DiscoveredContainer> {
    let captures = DISCOVERY_LINE_PATTERN.captures(line)?;
    let published_port = PUBLISHED_PORT_PATTERN
        .captures(&captures["ports"])
        .and_then(|port_captures| port_captures["port"].parse().ok());
    Some(DiscoveredContainer {
        resource_name: captures["resource"].to_string(),
        job_name: captures["name"].to_string(),
        job_version: captures["version"].to_string(),
        published_port,
    })
}

/// Discovers and health-classifies jobs on one infrastructure target
pub struct Monitor {
    target_name: String,
    infra: InfrastructureConfig,
    cli: DockerCli,
    executor: Arc<dyn RemoteExecutor>,
    probe: Arc<dyn JobProbe>,
}

impl Monitor {
    pub fn new(
        target_name: impl Into<String>,
        infra: InfrastructureConfig,
        executor: Arc<dyn RemoteExecutor>,
        probe: Arc<dyn JobProbe>,
    ) -> Self {
        Self {
            target_name: target_name.into(),
            cli: DockerCli::new(&infra),
            infra,
            executor,
            probe,
        }
    }

    /// Lists all job containers with their health classification
    ///
    /// One discovery command, one pass. Each discovered job is probed
    /// independently; a probe failure downgrades that job to Error with a
    /// short summary and the listing continues.
    pub async fn list_jobs(&self) -> Result<Vec<JobDescriptor>> {
        let output = self
            .executor
            .execute(&self.cli.ps_discovery(), None)
            .await?;

        let mut jobs = Vec::new();
        for line in output.lines() {
            let line = line.trim();
            let Some(found) = parse_discovery_line(line) else {
                if !line.is_empty() {
                    debug!("Skipping unrecognized container line: {}", line);
                }
                continue;
            };
            let Some(internal_address) = self.discovery_address(&found)? else {
                debug!(
                    "Skipping container {} without a published job port",
                    found.resource_name
                );
                continue;
            };

            let now = Utc::now().timestamp();
            let mut job = JobDescriptor {
                name: found.job_name,
                version: found.job_version,
                status: JobStatus::Running,
                create_time: now,
                update_time: now,
                internal_address,
                error: None,
                infrastructure_target: self.target_name.clone(),
                last_call_time: None,
            };

            match self.check_health(&job).await {
                Ok(last_call_time) => job.last_call_time = last_call_time,
                Err(reason) => {
                    let summary = truncate_error(&reason);
                    warn!(
                        "Job {} v{} is in bad condition: {}",
                        job.name, job.version, summary
                    );
                    job.status = JobStatus::Error;
                    job.error = Some(summary);
                }
            }
            jobs.push(job);
        }
        Ok(jobs)
    }

    /// Address a discovered job is reachable on, or `None` to skip it
    fn discovery_address(&self, found: &DiscoveredContainer) -> Result<Option<String>> {
        if self.infra.has_gateway() {
            // The gateway forwards to the container's network-internal name
            return Ok(Some(format!(
                "{}:{}",
                found.resource_name, JOB_INTERNAL_PORT
            )));
        }
        if self.infra.hostname.is_empty() {
            return Err(EngineError::InvalidConfig(
                "hostname of the docker host must be set".to_string(),
            ));
        }
        Ok(found
            .published_port
            .map(|port| format!("{}:{}", self.infra.hostname, port)))
    }

    async fn check_health(&self, job: &JobDescriptor) -> std::result::Result<Option<i64>, String> {
        self.probe
            .quick_check(job)
            .await
            .map_err(|e| e.to_string())?;
        self.probe
            .last_call_time(job)
            .await
            .map_err(|e| e.to_string())
    }

    /// Blocks until the job answers its readiness probe or the probe
    /// budget runs out
    ///
    /// On failure the error carries the probe reason and, unless
    /// `logs_on_error` is disabled, a recent log excerpt, so a bad deploy
    /// can be diagnosed without a separate log fetch.
    pub async fn wait_until_operational(
        &self,
        job: &JobDescriptor,
        deployment_timestamp: i64,
        on_alive: Option<AliveCallback>,
        logs_on_error: bool,
    ) -> Result<()> {
        match self
            .probe
            .wait_until_ready(job, deployment_timestamp, on_alive)
            .await
        {
            Ok(()) => Ok(()),
            Err(probe_error) => {
                let logs = if logs_on_error {
                    match self.read_recent_logs(job, RECENT_LOGS_TAIL).await {
                        Ok(logs) => Some(logs),
                        Err(log_error) => {
                            warn!(
                                "Failed to fetch logs of failing job {} v{}: {}",
                                job.name, job.version, log_error
                            );
                            None
                        }
                    }
                } else {
                    None
                };
                Err(EngineError::Probe {
                    reason: probe_error.to_string(),
                    logs,
                })
            }
        }
    }

    /// Fetches a bounded tail of the job's entrypoint container logs
    pub async fn read_recent_logs(&self, job: &JobDescriptor, tail: u32) -> Result<String> {
        let container = resource_name(&job.name, &job.version);
        Ok(self
            .executor
            .execute(&self.cli.logs(&container, Some(tail), None, None), None)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeExecutor, FakeProbe, test_infra};

    fn monitor(
        infra: InfrastructureConfig,
        executor: Arc<FakeExecutor>,
        probe: FakeProbe,
    ) -> Monitor {
        Monitor::new("remote-docker", infra, executor, Arc::new(probe))
    }

    #[test]
    fn test_parse_discovery_line() {
        let found = parse_discovery_line("job-demo-1 demo 1 0.0.0.0:7003->7000/tcp")
            .expect("line should match");
        assert_eq!(found.resource_name, "job-demo-1");
        assert_eq!(found.job_name, "demo");
        assert_eq!(found.job_version, "1");
        assert_eq!(found.published_port, Some(7003));
    }

    #[test]
    fn test_parse_discovery_line_dual_stack_ports() {
        // Some platforms publish both v4 and v6 bindings
        let found = parse_discovery_line(
            "job-demo-1 demo 1 0.0.0.0:7000->7000/tcp, :::7000->7000/tcp",
        )
        .expect("line should match");
        assert_eq!(found.published_port, Some(7000));
    }

    #[test]
    fn test_parse_discovery_line_mismatches() {
        assert!(parse_discovery_line("").is_none());
        assert!(parse_discovery_line("unrelated-container").is_none());
        assert!(parse_discovery_line("other-thing foo 1 0.0.0.0:80->80/tcp").is_none());
    }

    #[tokio::test]
    async fn test_list_jobs_isolates_probe_failures() {
        let executor = FakeExecutor::new();
        executor.push_stdout(
            "job-demo-1 demo 1 0.0.0.0:7003->7000/tcp\n\
             job-faulty-2 faulty 2 0.0.0.0:7013->7000/tcp",
        );
        let probe = FakeProbe {
            unhealthy: vec!["faulty".to_string()],
            last_call: Some(1693389000),
            ..FakeProbe::default()
        };

        let jobs = monitor(test_infra(), executor, probe)
            .list_jobs()
            .await
            .expect("listing should succeed");

        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].name, "demo");
        assert_eq!(jobs[0].status, JobStatus::Running);
        assert_eq!(jobs[0].last_call_time, Some(1693389000));
        assert!(jobs[0].error.is_none());

        assert_eq!(jobs[1].name, "faulty");
        assert_eq!(jobs[1].status, JobStatus::Error);
        let error = jobs[1].error.as_deref().expect("error summary attached");
        assert!(!error.is_empty());
        assert!(error.len() <= 260);
    }

    #[tokio::test]
    async fn test_list_jobs_gateway_addresses() {
        let executor = FakeExecutor::new();
        executor.push_stdout("job-demo-1 demo 1 0.0.0.0:7003->7000/tcp");

        let jobs = monitor(test_infra(), executor, FakeProbe::default())
            .list_jobs()
            .await
            .expect("listing should succeed");
        assert_eq!(jobs[0].internal_address, "job-demo-1:7000");
    }

    #[tokio::test]
    async fn test_list_jobs_direct_mode_addresses() {
        let executor = FakeExecutor::new();
        executor.push_stdout("job-demo-1 demo 1 0.0.0.0:7003->7000/tcp");
        let infra = InfrastructureConfig {
            hostname: "dev-host".to_string(),
            docker_host_uri: Some("ssh://dev-host".to_string()),
            remote_gateway_url: None,
            remote_gateway_token: None,
        };

        let jobs = monitor(infra, executor, FakeProbe::default())
            .list_jobs()
            .await
            .expect("listing should succeed");
        assert_eq!(jobs[0].internal_address, "dev-host:7003");
    }

    #[tokio::test]
    async fn test_list_jobs_direct_mode_requires_hostname() {
        let executor = FakeExecutor::new();
        executor.push_stdout("job-demo-1 demo 1 0.0.0.0:7003->7000/tcp");
        let infra = InfrastructureConfig {
            hostname: String::new(),
            docker_host_uri: Some("ssh://dev-host".to_string()),
            remote_gateway_url: None,
            remote_gateway_token: None,
        };

        let result = monitor(infra, executor, FakeProbe::default()).list_jobs().await;
        assert!(matches!(result, Err(EngineError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_list_jobs_skips_unparsed_lines() {
        let executor = FakeExecutor::new();
        executor.push_stdout(
            "some-sidecar-container\n\
             job-demo-1 demo 1 0.0.0.0:7003->7000/tcp",
        );

        let jobs = monitor(test_infra(), executor, FakeProbe::default())
            .list_jobs()
            .await
            .expect("listing should succeed");
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].name, "demo");
    }

    #[tokio::test]
    async fn test_wait_until_operational_embeds_probe_error_and_logs() {
        let executor = FakeExecutor::new();
        executor.push_stdout("model file missing\nexited with code 1");
        let probe = FakeProbe {
            ready: false,
            ready_error: "readiness endpoint answered 500".to_string(),
            ..FakeProbe::default()
        };
        let mon = monitor(test_infra(), Arc::clone(&executor), probe);
        let job = mon_descriptor();

        let error = mon
            .wait_until_operational(&job, 1693389000, None, true)
            .await
            .expect_err("wait should fail");

        let message = error.to_string();
        assert!(message.contains("readiness endpoint answered 500"));
        assert!(message.contains("model file missing"));

        let commands = executor.commands();
        assert_eq!(commands.len(), 1);
        assert!(commands[0].contains(r#"logs "job-demo-1" --tail 20"#));
    }

    #[tokio::test]
    async fn test_wait_until_operational_can_suppress_log_fetch() {
        let executor = FakeExecutor::new();
        let probe = FakeProbe {
            ready: false,
            ready_error: "connection refused".to_string(),
            ..FakeProbe::default()
        };
        let mon = monitor(test_infra(), Arc::clone(&executor), probe);

        let error = mon
            .wait_until_operational(&mon_descriptor(), 1693389000, None, false)
            .await
            .expect_err("wait should fail");

        assert!(error.to_string().contains("connection refused"));
        assert!(!error.to_string().contains("Job logs"));
        assert!(executor.commands().is_empty());
    }

    fn mon_descriptor() -> JobDescriptor {
        JobDescriptor {
            name: "demo".to_string(),
            version: "1".to_string(),
            status: JobStatus::Running,
            create_time: 0,
            update_time: 0,
            internal_address: "job-demo-1:7000".to_string(),
            error: None,
            infrastructure_target: "remote-docker".to_string(),
            last_call_time: None,
        }
    }
}
