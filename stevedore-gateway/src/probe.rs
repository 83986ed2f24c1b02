//! Job health probing
//!
//! Readiness and liveness checks run against a job's own HTTP endpoints.
//! The probing process is never assumed to share a network with the job
//! containers: when a remote gateway is configured, every request goes
//! through its forwarding path with the gateway token and the job's
//! internal name as headers.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::debug;

use stevedore_core::domain::job::JobDescriptor;

use crate::error::ProbeError;
use crate::metrics;
use crate::{GATEWAY_TOKEN_HEADER, JOB_INTERNAL_NAME_HEADER};

/// Callback fired once when a waited-on job first reports liveness
pub type AliveCallback = Arc<dyn Fn() + Send + Sync>;

/// Health and readiness checks for one job
#[async_trait]
pub trait JobProbe: Send + Sync {
    /// One-shot health check, used during discovery
    async fn quick_check(&self, job: &JobDescriptor) -> Result<(), ProbeError>;

    /// Blocks until the deployed generation reports ready or the probe
    /// deadline elapses
    ///
    /// `deployment_timestamp` selects the generation: the job only
    /// answers the readiness path for the generation it was started as.
    async fn wait_until_ready(
        &self,
        job: &JobDescriptor,
        deployment_timestamp: i64,
        on_alive: Option<AliveCallback>,
    ) -> Result<(), ProbeError>;

    /// Scrapes the job's metrics endpoint for the last-call timestamp
    async fn last_call_time(&self, job: &JobDescriptor) -> Result<Option<i64>, ProbeError>;
}

/// Retry/backoff policy for the readiness wait
#[derive(Debug, Clone)]
pub struct ProbeSettings {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub deadline: Duration,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            deadline: Duration::from_secs(120),
        }
    }
}

/// Gateway forwarding endpoint for reaching jobs from outside their network
#[derive(Debug, Clone)]
pub struct GatewayForwarding {
    pub url: String,
    pub token: String,
}

/// HTTP implementation of `JobProbe`
#[derive(Debug, Clone)]
pub struct HttpJobProbe {
    client: reqwest::Client,
    gateway: Option<GatewayForwarding>,
    settings: ProbeSettings,
}

impl HttpJobProbe {
    pub fn new(gateway: Option<GatewayForwarding>) -> Self {
        Self::with_settings(gateway, ProbeSettings::default())
    }

    pub fn with_settings(gateway: Option<GatewayForwarding>, settings: ProbeSettings) -> Self {
        Self {
            client: reqwest::Client::new(),
            gateway,
            settings,
        }
    }

    /// Base URL for the job: direct in-network address, or the gateway
    /// forwarding path keyed by job name and version
    fn job_base_url(&self, job: &JobDescriptor) -> String {
        match &self.gateway {
            Some(forwarding) => format!(
                "{}/remote/forward/{}/{}",
                forwarding.url.trim_end_matches('/'),
                job.name,
                job.version
            ),
            None => format!("http://{}", job.internal_address),
        }
    }

    async fn get(&self, job: &JobDescriptor, path: &str) -> Result<reqwest::Response, ProbeError> {
        let url = format!("{}{}", self.job_base_url(job), path);
        let mut request = self.client.get(&url);
        if let Some(forwarding) = &self.gateway {
            request = request
                .header(GATEWAY_TOKEN_HEADER, &forwarding.token)
                .header(JOB_INTERNAL_NAME_HEADER, &job.internal_address);
        }
        Ok(request.send().await?)
    }

    async fn check(&self, job: &JobDescriptor, path: &str) -> Result<(), ProbeError> {
        let response = self.get(job, path).await?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ProbeError::BadStatus {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl JobProbe for HttpJobProbe {
    async fn quick_check(&self, job: &JobDescriptor) -> Result<(), ProbeError> {
        self.check(job, "/health").await
    }

    async fn wait_until_ready(
        &self,
        job: &JobDescriptor,
        deployment_timestamp: i64,
        on_alive: Option<AliveCallback>,
    ) -> Result<(), ProbeError> {
        let ready_path = format!("/ready/{}", deployment_timestamp);
        let started = Instant::now();
        let mut delay = self.settings.initial_delay;
        let mut alive_seen = false;
        let mut last_error = String::from("job was never reached");

        loop {
            if !alive_seen && self.check(job, "/live").await.is_ok() {
                alive_seen = true;
                debug!("Job {} v{} is alive", job.name, job.version);
                if let Some(callback) = &on_alive {
                    callback();
                }
            }

            match self.check(job, &ready_path).await {
                Ok(()) => return Ok(()),
                Err(e) => last_error = e.to_string(),
            }

            if started.elapsed() + delay > self.settings.deadline {
                return Err(ProbeError::TimedOut {
                    waited_secs: started.elapsed().as_secs(),
                    last_error,
                });
            }

            tokio::time::sleep(delay).await;
            delay = (delay * 2).min(self.settings.max_delay);
        }
    }

    async fn last_call_time(&self, job: &JobDescriptor) -> Result<Option<i64>, ProbeError> {
        let response = self.get(job, "/metrics").await?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ProbeError::BadStatus {
                status: status.as_u16(),
                body,
            });
        }
        let body = response.text().await?;
        Ok(metrics::read_last_call_timestamp(&body))
    }
}
