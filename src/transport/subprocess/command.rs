//! Provider command building
//!
//! Resolves the executable and assembles the child command with an
//! allowlisted environment: only configured parent variables pass through,
//! loader-affecting variables are always stripped.

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use tokio::process::Command;

use crate::config::ClientConfig;
use crate::error::{AcpError, Result};

use super::config::BLOCKED_ENV_VARS;

/// Resolve the configured executable to an absolute path
///
/// A bare name is looked up on PATH; a path is used as-is if it exists.
///
/// # Errors
/// Returns error if the executable cannot be found
pub fn resolve_executable(config: &ClientConfig) -> Result<PathBuf> {
    let exe = &config.executable;
    if exe.components().count() > 1 {
        if exe.exists() && exe.is_file() {
            return Ok(exe.clone());
        }
        return Err(AcpError::ExecutableNotFound(exe.display().to_string()));
    }

    which::which(exe).map_err(|_| AcpError::ExecutableNotFound(exe.display().to_string()))
}

/// Build the child command with arguments and merged environment
///
/// # Errors
/// Returns error if the executable cannot be resolved
pub fn build_command(config: &ClientConfig) -> Result<Command> {
    let path = resolve_executable(config)?;
    let mut cmd = Command::new(path);
    cmd.args(&config.args);

    cmd.env_clear();
    cmd.envs(merged_env(config));

    Ok(cmd)
}

/// Merge the parent-environment allowlist with the explicit env map
///
/// Explicit entries win over passthrough entries; blocked variables are
/// dropped from both.
pub fn merged_env(config: &ClientConfig) -> HashMap<String, String> {
    let mut merged = HashMap::new();

    for name in &config.env_passthrough {
        if BLOCKED_ENV_VARS.contains(&name.as_str()) {
            continue;
        }
        if let Ok(value) = env::var(name) {
            merged.insert(name.clone(), value);
        }
    }

    for (key, value) in &config.env {
        if BLOCKED_ENV_VARS.contains(&key.as_str()) {
            log::warn!("dropping blocked environment variable {key}");
            continue;
        }
        merged.insert(key.clone(), value.clone());
    }

    merged
}
