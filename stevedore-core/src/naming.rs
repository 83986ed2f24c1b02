//! Deterministic resource naming
//!
//! Pure functions deriving container and image names from job identity.
//! No time, no randomness: redeploying the same (job, version) always
//! yields the same names, which is what makes idempotent replacement of a
//! previous generation possible.

use thiserror::Error;

/// Port a job listens on inside its container
pub const JOB_INTERNAL_PORT: u16 = 7000;

/// Name prefix shared by all job containers
pub const RESOURCE_PREFIX: &str = "job-";

/// Shared docker network joining job containers
pub const JOB_NETWORK: &str = "stevedore_default";

/// Entrypoint resource name for a (job, version) pair
pub fn resource_name(job_name: &str, job_version: &str) -> String {
    format!("{RESOURCE_PREFIX}{job_name}-{job_version}")
}

/// Container name for one index of a (job, version) pair
///
/// Index 0 is the entrypoint container and carries the bare resource name.
pub fn container_name(job_name: &str, job_version: &str, index: usize) -> String {
    let resource = resource_name(job_name, job_version);
    if index == 0 {
        resource
    } else {
        format!("{resource}-{index}")
    }
}

/// Image reference for one container index of a job
///
/// Containers beyond the entrypoint use an index-suffixed tag.
pub fn image_name(
    registry: &str,
    namespace: &str,
    job_name: &str,
    tag: &str,
    index: usize,
) -> String {
    if index == 0 {
        format!("{registry}/{namespace}/{RESOURCE_PREFIX}{job_name}:{tag}")
    } else {
        format!("{registry}/{namespace}/{RESOURCE_PREFIX}{job_name}:{tag}-{index}")
    }
}

/// Network-internal address of a job's entrypoint container
pub fn internal_address(job_name: &str, job_version: &str) -> String {
    format!("{}:{}", resource_name(job_name, job_version), JOB_INTERNAL_PORT)
}

/// A field value failed the allow-list check
///
/// Job name, version and tag all end up embedded in remote command strings,
/// so anything outside the allow-list is rejected before any command is
/// built.
#[derive(Debug, Error)]
#[error("invalid {field} {value:?}: only {allowed} characters are allowed")]
pub struct InvalidIdentifier {
    pub field: &'static str,
    pub value: String,
    pub allowed: &'static str,
}

fn validate(
    field: &'static str,
    value: &str,
    allowed: &'static str,
    first: fn(char) -> bool,
    rest: fn(char) -> bool,
) -> Result<(), InvalidIdentifier> {
    let mut chars = value.chars();
    let valid = match chars.next() {
        Some(c) => first(c) && chars.all(rest),
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(InvalidIdentifier {
            field,
            value: value.to_string(),
            allowed,
        })
    }
}

pub fn validate_job_name(value: &str) -> Result<(), InvalidIdentifier> {
    validate(
        "job name",
        value,
        "[a-z0-9-]",
        |c| c.is_ascii_lowercase() || c.is_ascii_digit(),
        |c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-',
    )
}

pub fn validate_job_version(value: &str) -> Result<(), InvalidIdentifier> {
    validate(
        "job version",
        value,
        "[a-zA-Z0-9._-]",
        |c| c.is_ascii_alphanumeric(),
        |c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'),
    )
}

pub fn validate_image_tag(value: &str) -> Result<(), InvalidIdentifier> {
    validate(
        "image tag",
        value,
        "[a-zA-Z0-9._-]",
        |c| c.is_ascii_alphanumeric() || c == '_',
        |c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'),
    )
}

pub fn validate_env_name(value: &str) -> Result<(), InvalidIdentifier> {
    validate(
        "env var name",
        value,
        "[A-Za-z0-9_]",
        |c| c.is_ascii_alphabetic() || c == '_',
        |c| c.is_ascii_alphanumeric() || c == '_',
    )
}
