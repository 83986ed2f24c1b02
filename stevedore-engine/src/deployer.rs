//! Job deployer
//!
//! Orchestrates container creation and removal for a job on the remote
//! docker host. Deploys are idempotent by construction: a deploy of
//! (job, version) first removes any previous generation with the same
//! deterministic names, so at most one live generation exists per version.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, LazyLock};

use chrono::Utc;
use regex::Regex;
use tracing::{debug, info};

use stevedore_core::domain::job::{JobDescriptor, JobSecrets, JobStatus};
use stevedore_core::domain::target::InfrastructureConfig;
use stevedore_core::dto::DeployRequest;
use stevedore_core::env::{conflicting_names, merge_env_vars};
use stevedore_core::naming::{
    JOB_NETWORK, container_name, image_name, internal_address, resource_name, validate_env_name,
    validate_image_tag, validate_job_name, validate_job_version,
};
use stevedore_gateway::{GatewayError, RemoteExecutor};

use crate::commands::DockerCli;
use crate::config::DeployerConfig;
use crate::error::{EngineError, Result};

/// Upper bound of containers per job generation
pub const MAX_JOB_CONTAINERS: usize = 2;

/// Published-port range scanned by legacy port allocation
const JOB_PORT_BASE: u16 = 7000;
const JOB_PORT_LIMIT: u16 = 8000;
const JOB_PORT_STEP: usize = 10;

/// Ordered env-var contribution from a trusted orchestrator extension
pub type EnvVarHook = Arc<dyn Fn(&DeployerConfig) -> HashMap<String, String> + Send + Sync>;

static PORT_BINDING_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r":(\d+)->").expect("constant regex pattern is valid"));

/// Deploys and tears down job containers on one infrastructure target
pub struct Deployer {
    target_name: String,
    config: DeployerConfig,
    cli: DockerCli,
    executor: Arc<dyn RemoteExecutor>,
    env_hooks: Vec<EnvVarHook>,
}

impl Deployer {
    pub fn new(
        target_name: impl Into<String>,
        infra: &InfrastructureConfig,
        config: DeployerConfig,
        executor: Arc<dyn RemoteExecutor>,
        env_hooks: Vec<EnvVarHook>,
    ) -> Self {
        Self {
            target_name: target_name.into(),
            config,
            cli: DockerCli::new(infra),
            executor,
            env_hooks,
        }
    }

    /// Deploys one generation of a job as detached containers
    ///
    /// Any remote failure aborts and propagates; containers already
    /// started by a failed multi-container deploy are not rolled back
    /// here, the next deploy's stale-generation cleanup converges them.
    pub async fn deploy(&self, request: &DeployRequest) -> Result<JobDescriptor> {
        let job_name = &request.manifest.name;
        let job_version = &request.manifest.version;
        validate_job_name(job_name)?;
        validate_job_version(job_version)?;
        validate_image_tag(&request.tag)?;
        if !(1..=MAX_JOB_CONTAINERS).contains(&request.containers_num) {
            return Err(EngineError::InvalidConfig(format!(
                "containers_num must be between 1 and {MAX_JOB_CONTAINERS}, got {}",
                request.containers_num
            )));
        }

        let deployment_timestamp = Utc::now().timestamp();
        let reserved = self.reserved_env_vars(request, deployment_timestamp);

        // Fatal pre-flight: reject before any remote command runs
        let conflicts = conflicting_names(&reserved, &request.runtime_env_vars);
        if !conflicts.is_empty() {
            return Err(EngineError::ConfigConflict { names: conflicts });
        }
        for name in request.runtime_env_vars.keys() {
            validate_env_name(name)?;
        }

        // Hooks come from trusted extensions: they may override runtime
        // vars and each other left to right, but never the reserved set
        let mut env_vars = request.runtime_env_vars.clone();
        for hook in &self.env_hooks {
            env_vars = merge_env_vars(env_vars, hook(&self.config));
        }
        let env_vars = merge_env_vars(env_vars, reserved);

        if self.exists(job_name, job_version).await? {
            info!(
                "Removing previous generation of job {} v{}",
                job_name, job_version
            );
            self.delete(job_name, job_version).await?;
        }

        self.ensure_network().await?;

        for index in 0..request.containers_num {
            let container = container_name(job_name, job_version, index);
            let image = image_name(
                &self.config.docker_registry,
                &self.config.docker_registry_namespace,
                job_name,
                &request.tag,
                index,
            );
            info!("Starting container {} from image {}", container, image);
            self.executor
                .execute(
                    &self
                        .cli
                        .run_detached(&container, &image, &env_vars, job_name, job_version),
                    None,
                )
                .await?;
        }

        info!(
            "Job {} v{} deployed on target {}",
            job_name, job_version, self.target_name
        );

        Ok(JobDescriptor {
            name: job_name.clone(),
            version: job_version.clone(),
            status: JobStatus::Running,
            create_time: deployment_timestamp,
            update_time: deployment_timestamp,
            internal_address: internal_address(job_name, job_version),
            error: None,
            infrastructure_target: self.target_name.clone(),
            last_call_time: None,
        })
    }

    /// Env vars the system injects into every job container
    fn reserved_env_vars(
        &self,
        request: &DeployRequest,
        deployment_timestamp: i64,
    ) -> HashMap<String, String> {
        let job_name = &request.manifest.name;
        let job_version = &request.manifest.version;

        let mut reserved = HashMap::from([
            ("PUB_URL".to_string(), self.config.internal_pub_url.clone()),
            ("JOB_NAME".to_string(), job_name.clone()),
            ("AUTH_TOKEN".to_string(), request.auth_token.clone()),
            (
                "JOB_DEPLOYMENT_TIMESTAMP".to_string(),
                deployment_timestamp.to_string(),
            ),
            (
                "REQUEST_TRACING_HEADER".to_string(),
                self.config.tracing_header.clone(),
            ),
        ]);
        if self.config.open_telemetry_enabled {
            reserved.insert(
                "OPENTELEMETRY_ENDPOINT".to_string(),
                self.config
                    .open_telemetry_endpoint
                    .clone()
                    .unwrap_or_default(),
            );
        }
        if request.containers_num > 1 {
            reserved.insert(
                "JOB_USER_MODULE_HOSTNAME".to_string(),
                container_name(job_name, job_version, 1),
            );
        }
        reserved
    }

    /// Creates the shared job network, tolerating one that already exists
    async fn ensure_network(&self) -> Result<()> {
        match self
            .executor
            .execute(&self.cli.network_create(JOB_NETWORK), None)
            .await
        {
            Ok(_) => Ok(()),
            // Exit code 1 is "network already exists"
            Err(GatewayError::CommandFailed { exit_code: 1, .. }) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Deletes all containers of a (job, version), idempotently
    ///
    /// Deleting a job that does not exist is a no-op, not an error.
    pub async fn delete(&self, job_name: &str, job_version: &str) -> Result<()> {
        validate_job_name(job_name)?;
        validate_job_version(job_version)?;
        for index in 0..MAX_JOB_CONTAINERS {
            let container = container_name(job_name, job_version, index);
            self.delete_container_if_exists(&container).await?;
        }
        Ok(())
    }

    /// Checks whether the job's entrypoint container exists
    pub async fn exists(&self, job_name: &str, job_version: &str) -> Result<bool> {
        validate_job_name(job_name)?;
        validate_job_version(job_version)?;
        self.container_exists(&container_name(job_name, job_version, 0))
            .await
    }

    async fn container_exists(&self, container: &str) -> Result<bool> {
        let output = self
            .executor
            .execute(&self.cli.ps_names(container), None)
            .await?;
        Ok(output.lines().any(|line| line.trim() == container))
    }

    async fn delete_container_if_exists(&self, container: &str) -> Result<()> {
        if self.container_exists(container).await? {
            self.executor
                .execute(&self.cli.rm_forced(container), None)
                .await?;
            debug!("Container {} removed", container);
        }
        Ok(())
    }

    /// Returns the next unoccupied published port for a job
    ///
    /// Legacy direct-engine mode only. Scans existing bindings and picks
    /// the lowest free port in the range; an exhausted range falls back
    /// to the ceiling value instead of failing.
    pub async fn allocate_job_port(&self) -> Result<u16> {
        let output = self.executor.execute(&self.cli.ps_ports(), None).await?;
        let mut occupied: HashSet<u16> = HashSet::new();
        for line in output.lines() {
            let line = line.trim();
            if !line.starts_with("job-") {
                continue;
            }
            for capture in PORT_BINDING_PATTERN.captures_iter(line) {
                if let Ok(port) = capture[1].parse() {
                    occupied.insert(port);
                }
            }
        }
        for port in (JOB_PORT_BASE..JOB_PORT_LIMIT).step_by(JOB_PORT_STEP) {
            if !occupied.contains(&port) {
                return Ok(port);
            }
        }
        Ok(JOB_PORT_LIMIT)
    }

    /// Secret management is not available on this backend
    pub fn save_job_secrets(
        &self,
        _job_name: &str,
        _job_version: &str,
        _secrets: &JobSecrets,
    ) -> Result<()> {
        Err(EngineError::Unsupported("secret management"))
    }

    /// Secret management is not available on this backend
    pub fn get_job_secrets(&self, _job_name: &str, _job_version: &str) -> Result<JobSecrets> {
        Err(EngineError::Unsupported("secret management"))
    }
}
