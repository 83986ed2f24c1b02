//! Stevedore Engine
//!
//! Container workload lifecycle engine for remote docker hosts reached
//! through a constrained remote-execution gateway. The engine covers the
//! full job lifecycle on each configured infrastructure target:
//! - `Deployer`: start a job's containers with deterministic names and
//!   injected env vars, and tear them down idempotently
//! - `Monitor`: discover running jobs and classify their health
//! - `LogStreamer`: tail live container logs through polling sessions

pub mod commands;
pub mod config;
pub mod deployer;
pub mod error;
pub mod monitor;
pub mod streamer;

#[cfg(test)]
mod test_support;

pub use config::DeployerConfig;
pub use deployer::{Deployer, EnvVarHook, MAX_JOB_CONTAINERS};
pub use error::{EngineError, Result};
pub use monitor::Monitor;
pub use streamer::{LineCallback, LogStreamer};

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use stevedore_core::domain::target::InfrastructureConfig;
use stevedore_gateway::probe::GatewayForwarding;
use stevedore_gateway::{GatewayClient, HttpJobProbe, RemoteExecutor};

/// Lifecycle components bound to one infrastructure target
pub struct InfrastructureHandle {
    pub deployer: Deployer,
    pub monitor: Monitor,
    pub streamer: LogStreamer,
}

/// Builds a lifecycle handle for every configured infrastructure target
///
/// Every target must carry a complete remote gateway configuration; the
/// command strings support a direct DOCKER_HOST mode, but without a
/// gateway there is nowhere to execute them from here.
pub fn build_targets(
    config: &DeployerConfig,
    targets: &HashMap<String, InfrastructureConfig>,
    env_hooks: Vec<EnvVarHook>,
) -> Result<HashMap<String, InfrastructureHandle>> {
    config.validate()?;

    let mut handles = HashMap::new();
    for (target_name, infra) in targets {
        infra
            .validate()
            .map_err(|e| EngineError::InvalidConfig(format!("target {target_name}: {e}")))?;
        let (Some(gateway_url), Some(gateway_token)) =
            (&infra.remote_gateway_url, &infra.remote_gateway_token)
        else {
            return Err(EngineError::InvalidConfig(format!(
                "target {target_name}: remote gateway must be configured"
            )));
        };

        let executor: Arc<dyn RemoteExecutor> =
            Arc::new(GatewayClient::new(gateway_url, gateway_token));
        let probe = Arc::new(HttpJobProbe::new(Some(GatewayForwarding {
            url: gateway_url.clone(),
            token: gateway_token.clone(),
        })));

        info!("Configuring infrastructure target {}", target_name);
        handles.insert(
            target_name.clone(),
            InfrastructureHandle {
                deployer: Deployer::new(
                    target_name.clone(),
                    infra,
                    config.clone(),
                    Arc::clone(&executor),
                    env_hooks.clone(),
                ),
                monitor: Monitor::new(
                    target_name.clone(),
                    infra.clone(),
                    Arc::clone(&executor),
                    probe,
                ),
                streamer: LogStreamer::new(infra, executor),
            },
        );
    }
    Ok(handles)
}
