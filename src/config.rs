//! Client configuration
//!
//! One [`ClientConfig`] is constructed per provider profile and owned
//! exclusively by one client/transport pair; it is never shared.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::types::identifiers::ProviderId;

/// Default advisory connect budget in seconds
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default per-request timeout in seconds (lifecycle calls other than prompt)
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

/// Parent environment variables passed through when no allowlist is given
pub const DEFAULT_ENV_PASSTHROUGH: &[&str] = &[
    "PATH", "HOME", "USER", "SHELL", "TERM", "LANG", "LC_ALL", "TMPDIR",
];

/// Wire dialect the provider speaks
///
/// Selects the codec used to build lifecycle params and normalize results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireDialect {
    /// The prompt result itself carries text, tool calls, finish reason, usage
    Flat,
    /// The prompt result carries only a stop marker; content arrives as
    /// session-update notifications
    Streaming,
}

/// What to do when `session/new` rejects an injected optional capability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Drop one optional field at a time and retry until accepted
    Degrade,
    /// Single attempt; any failure propagates
    Fail,
}

/// Configuration for one provider profile
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Provider profile this configuration belongs to
    pub provider_id: ProviderId,
    /// Provider executable (absolute path or bare name resolved via PATH)
    pub executable: PathBuf,
    /// Arguments passed to the executable
    pub args: Vec<String>,
    /// Parent environment variable names passed through to the child
    pub env_passthrough: Vec<String>,
    /// Extra environment variables set for the child
    pub env: HashMap<String, String>,
    /// Advisory connect budget in seconds for outer callers; spawning
    /// itself is synchronous and never waits on this
    pub connect_timeout_secs: u64,
    /// Seconds to wait for lifecycle responses (prompt is always unbounded)
    pub request_timeout_secs: u64,
    /// Advisory retry budget for outer callers; this stack never retries
    pub max_retries: u32,
    /// Advisory backoff description for outer callers
    pub backoff: Option<String>,
    /// Advisory circuit-breaker flag for outer callers
    pub circuit_breaker: bool,
    /// Capability-rejection handling for `session/new`
    pub failure_policy: FailurePolicy,
    /// Wire dialect the provider speaks
    pub dialect: WireDialect,
}

impl ClientConfig {
    /// Create a configuration with defaults for the given executable
    pub fn new(provider_id: impl Into<ProviderId>, executable: impl Into<PathBuf>) -> Self {
        Self {
            provider_id: provider_id.into(),
            executable: executable.into(),
            args: Vec::new(),
            env_passthrough: DEFAULT_ENV_PASSTHROUGH
                .iter()
                .map(ToString::to_string)
                .collect(),
            env: HashMap::new(),
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            max_retries: 0,
            backoff: None,
            circuit_breaker: false,
            failure_policy: FailurePolicy::Degrade,
            dialect: WireDialect::Streaming,
        }
    }

    /// Create a new builder
    #[must_use]
    pub fn builder(provider_id: impl Into<ProviderId>, executable: impl Into<PathBuf>) -> ClientConfigBuilder {
        ClientConfigBuilder {
            config: Self::new(provider_id, executable),
        }
    }
}

/// Builder for [`ClientConfig`]
#[derive(Debug)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Set the argument list
    #[must_use]
    pub fn args(mut self, args: Vec<String>) -> Self {
        self.config.args = args;
        self
    }

    /// Add one argument
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.config.args.push(arg.into());
        self
    }

    /// Replace the parent-environment allowlist
    #[must_use]
    pub fn env_passthrough(mut self, names: Vec<String>) -> Self {
        self.config.env_passthrough = names;
        self
    }

    /// Set one extra child environment variable
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.env.insert(key.into(), value.into());
        self
    }

    /// Set the advisory connect budget in seconds
    #[must_use]
    pub const fn connect_timeout_secs(mut self, secs: u64) -> Self {
        self.config.connect_timeout_secs = secs;
        self
    }

    /// Set the lifecycle request timeout in seconds
    #[must_use]
    pub const fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    /// Set the advisory retry budget
    #[must_use]
    pub const fn max_retries(mut self, retries: u32) -> Self {
        self.config.max_retries = retries;
        self
    }

    /// Set the advisory backoff description
    #[must_use]
    pub fn backoff(mut self, description: impl Into<String>) -> Self {
        self.config.backoff = Some(description.into());
        self
    }

    /// Set the advisory circuit-breaker flag
    #[must_use]
    pub const fn circuit_breaker(mut self, enabled: bool) -> Self {
        self.config.circuit_breaker = enabled;
        self
    }

    /// Set the capability-rejection policy
    #[must_use]
    pub const fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.config.failure_policy = policy;
        self
    }

    /// Set the wire dialect
    #[must_use]
    pub const fn dialect(mut self, dialect: WireDialect) -> Self {
        self.config.dialect = dialect;
        self
    }

    /// Build the configuration
    #[must_use]
    pub fn build(self) -> ClientConfig {
        self.config
    }
}
