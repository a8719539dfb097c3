//! Generation request passed to [`Client::generate`](crate::client::Client::generate)
//!
//! Carries the prompt, the optional injected capabilities (skills, MCP
//! servers) the degrade ladder may strip, and correlation ids threaded
//! through interactions and telemetry.

use serde_json::{Map, Value};

/// One conversation turn to run against the provider
#[derive(Debug, Clone, Default)]
pub struct GenerateRequest {
    /// The user prompt text
    pub prompt: String,
    /// Optional system prompt
    pub system_prompt: Option<String>,
    /// Skill references to inject into `session/new` (optional capability)
    pub skills: Vec<Value>,
    /// MCP server references to inject into `session/new` (optional capability)
    pub mcp_servers: Vec<Value>,
    /// Conversation id threaded into interactions
    pub conversation_id: Option<String>,
    /// Run id threaded into interactions
    pub run_id: Option<String>,
    /// Trace id threaded into interactions
    pub trace_id: Option<String>,
    /// Extra provider-specific parameters merged into `session/prompt` params
    pub extra_params: Map<String, Value>,
}

impl GenerateRequest {
    /// Create a request with just a prompt
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Self::default()
        }
    }

    /// Create a new builder
    #[must_use]
    pub fn builder() -> GenerateRequestBuilder {
        GenerateRequestBuilder::default()
    }
}

/// Builder for [`GenerateRequest`]
#[derive(Debug, Default)]
pub struct GenerateRequestBuilder {
    request: GenerateRequest,
}

impl GenerateRequestBuilder {
    /// Set the prompt text
    #[must_use]
    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.request.prompt = prompt.into();
        self
    }

    /// Set the system prompt
    #[must_use]
    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.request.system_prompt = Some(prompt.into());
        self
    }

    /// Set the skill references
    #[must_use]
    pub fn skills(mut self, skills: Vec<Value>) -> Self {
        self.request.skills = skills;
        self
    }

    /// Add one skill reference
    #[must_use]
    pub fn add_skill(mut self, skill: Value) -> Self {
        self.request.skills.push(skill);
        self
    }

    /// Set the MCP server references
    #[must_use]
    pub fn mcp_servers(mut self, servers: Vec<Value>) -> Self {
        self.request.mcp_servers = servers;
        self
    }

    /// Set the conversation id
    #[must_use]
    pub fn conversation_id(mut self, id: impl Into<String>) -> Self {
        self.request.conversation_id = Some(id.into());
        self
    }

    /// Set the run id
    #[must_use]
    pub fn run_id(mut self, id: impl Into<String>) -> Self {
        self.request.run_id = Some(id.into());
        self
    }

    /// Set the trace id
    #[must_use]
    pub fn trace_id(mut self, id: impl Into<String>) -> Self {
        self.request.trace_id = Some(id.into());
        self
    }

    /// Merge one extra provider-specific prompt parameter
    #[must_use]
    pub fn extra_param(mut self, key: impl Into<String>, value: Value) -> Self {
        self.request.extra_params.insert(key.into(), value);
        self
    }

    /// Build the request
    #[must_use]
    pub fn build(self) -> GenerateRequest {
        self.request
    }
}
