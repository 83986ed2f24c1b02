//! Environment variable set handling
//!
//! Job containers receive a merge of caller-supplied vars, reserved system
//! vars and plugin-contributed vars. Reserved/user collisions are detected
//! here so the deployer can abort before touching the remote host.

use std::collections::HashMap;

/// Merges two env var maps, values from `overrides` winning
pub fn merge_env_vars(
    base: HashMap<String, String>,
    overrides: HashMap<String, String>,
) -> HashMap<String, String> {
    let mut merged = base;
    merged.extend(overrides);
    merged
}

/// Names present in both maps, sorted for stable error messages
pub fn conflicting_names(
    reserved: &HashMap<String, String>,
    user: &HashMap<String, String>,
) -> Vec<String> {
    let mut conflicts: Vec<String> = user
        .keys()
        .filter(|name| reserved.contains_key(*name))
        .cloned()
        .collect();
    conflicts.sort();
    conflicts
}
