//! Docker command construction
//!
//! Builds the exact command strings sent to the remote host. The flags and
//! format strings here are a compatibility surface: the discovery parser
//! in `monitor` matches this output, so the two must stay in lockstep.

use std::collections::HashMap;

use stevedore_core::domain::target::InfrastructureConfig;
use stevedore_core::naming::{JOB_NETWORK, RESOURCE_PREFIX};

/// Docker binary exposed to gateway command sessions on the remote host
const REMOTE_DOCKER_BIN: &str = "/opt/docker";

/// Builds docker CLI command strings for one infrastructure target
#[derive(Debug, Clone)]
pub struct DockerCli {
    docker_host: Option<String>,
}

impl DockerCli {
    pub fn new(infra: &InfrastructureConfig) -> Self {
        Self {
            docker_host: infra.docker_host_uri.clone(),
        }
    }

    /// Command prefix: plain docker pointed at a DOCKER_HOST in legacy
    /// direct-engine mode, otherwise the gateway-local binary
    fn bin(&self) -> String {
        match &self.docker_host {
            Some(host) => format!("DOCKER_HOST={host} docker"),
            None => REMOTE_DOCKER_BIN.to_string(),
        }
    }

    pub fn network_create(&self, network: &str) -> String {
        format!("{} network create {}", self.bin(), network)
    }

    pub fn run_detached(
        &self,
        container_name: &str,
        image: &str,
        env_vars: &HashMap<String, String>,
        job_name: &str,
        job_version: &str,
    ) -> String {
        // Env vars sorted so redeploys issue byte-identical commands
        let mut names: Vec<&String> = env_vars.keys().collect();
        names.sort();
        let env_args: String = names
            .iter()
            .map(|name| format!(" --env {}={}", name, shell_quote(&env_vars[*name])))
            .collect();

        format!(
            "{} run -d --name {}{} --pull always --network={} --label job-name={} --label job-version={} {}",
            self.bin(),
            container_name,
            env_args,
            JOB_NETWORK,
            job_name,
            job_version,
            image,
        )
    }

    /// Exact-name existence listing
    pub fn ps_names(&self, container_name: &str) -> String {
        format!(
            r#"{} ps -a --filter "name=^/{}$" --format "{{{{.Names}}}}""#,
            self.bin(),
            container_name
        )
    }

    /// Discovery listing of all job containers
    ///
    /// Ports go last: their text varies between platforms, so the parser
    /// anchors on the fixed fields in front of them.
    pub fn ps_discovery(&self) -> String {
        format!(
            r#"{} ps -a --filter "name=^/{}" --format '{{{{.Names}}}} {{{{ .Label "job-name" }}}} {{{{ .Label "job-version" }}}} {{{{.Ports}}}}'"#,
            self.bin(),
            RESOURCE_PREFIX
        )
    }

    /// Name/port listing used by legacy port allocation
    pub fn ps_ports(&self) -> String {
        format!(
            r#"{} ps --filter "name=^/{}" --format "{{{{.Names}}}} {{{{.Ports}}}}""#,
            self.bin(),
            RESOURCE_PREFIX
        )
    }

    pub fn rm_forced(&self, container_name: &str) -> String {
        format!("{} rm -f {}", self.bin(), container_name)
    }

    pub fn logs(
        &self,
        container_name: &str,
        tail: Option<u32>,
        since: Option<&str>,
        until: Option<&str>,
    ) -> String {
        let mut cmd = format!(r#"{} logs "{}""#, self.bin(), container_name);
        if let Some(tail) = tail {
            cmd.push_str(&format!(" --tail {tail}"));
        }
        if let Some(since) = since {
            cmd.push_str(&format!(" --since {since}"));
        }
        if let Some(until) = until {
            cmd.push_str(&format!(" --until {until}"));
        }
        cmd
    }
}

/// Quotes a value for safe embedding in a shell command line
pub fn shell_quote(value: &str) -> String {
    let safe = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '/' | ':' | '=' | '@'));
    if safe {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', r"'\''"))
    }
}
