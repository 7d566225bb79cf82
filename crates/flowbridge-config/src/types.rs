//! Configuration types.

use serde::{Deserialize, Serialize};

use crate::{ConfigError, Result};

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowbridgeConfig {
    /// How to launch and talk to the bridge process.
    pub server: ServerConfig,
}

impl FlowbridgeConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Merge another config on top of this one (other takes priority).
    pub fn merge(&mut self, other: FlowbridgeConfig) {
        self.server.merge(other.server);
    }

    /// Check every set value.
    pub fn validate(&self) -> Result<()> {
        self.server.validate()
    }
}

/// Transport mode the bridge uses to reach the remote server.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum BridgeTransport {
    /// Server-sent events (`--sse`).
    #[default]
    Sse,
    /// Streamable HTTP (`--streamableHttp`).
    StreamableHttp,
}

impl BridgeTransport {
    /// Command-line flag selecting this transport.
    pub fn flag(&self) -> &'static str {
        match self {
            Self::Sse => "--sse",
            Self::StreamableHttp => "--streamableHttp",
        }
    }
}

/// The `[server]` section.
///
/// Unset fields are filled from built-in defaults by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bridge executable.
    pub command: Option<String>,
    /// Arguments placed before the transport flag.
    pub args: Option<Vec<String>>,
    /// Transport mode flag.
    pub transport: Option<BridgeTransport>,
    /// Remote endpoint passed after the transport flag.
    pub endpoint: Option<String>,
    /// Environment variables as `[key, value]` pairs.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<[String; 2]>,
    /// Upper bound on the readiness wait, in milliseconds.
    pub ready_timeout_ms: Option<u64>,
    /// Timeout for requests that wait for a reply, in milliseconds.
    pub request_timeout_ms: Option<u64>,
    /// Send the MCP initialize handshake on connect.
    pub initialize: Option<bool>,
}

impl ServerConfig {
    /// Merge another section on top of this one, field by field.
    pub fn merge(&mut self, other: ServerConfig) {
        if other.command.is_some() {
            self.command = other.command;
        }
        if other.args.is_some() {
            self.args = other.args;
        }
        if other.transport.is_some() {
            self.transport = other.transport;
        }
        if other.endpoint.is_some() {
            self.endpoint = other.endpoint;
        }
        if !other.env.is_empty() {
            self.env = other.env;
        }
        if other.ready_timeout_ms.is_some() {
            self.ready_timeout_ms = other.ready_timeout_ms;
        }
        if other.request_timeout_ms.is_some() {
            self.request_timeout_ms = other.request_timeout_ms;
        }
        if other.initialize.is_some() {
            self.initialize = other.initialize;
        }
    }

    /// Environment variables as tuples.
    pub fn env_pairs(&self) -> Vec<(String, String)> {
        self.env
            .iter()
            .map(|[k, v]| (k.clone(), v.clone()))
            .collect()
    }

    /// Check the endpoint URL and the command.
    pub fn validate(&self) -> Result<()> {
        if let Some(endpoint) = &self.endpoint {
            let url = url::Url::parse(endpoint).map_err(|e| ConfigError::InvalidEndpoint {
                endpoint: endpoint.clone(),
                reason: e.to_string(),
            })?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(ConfigError::InvalidEndpoint {
                    endpoint: endpoint.clone(),
                    reason: format!("unsupported scheme '{}'", url.scheme()),
                });
            }
        }
        if let Some(command) = &self.command
            && command.trim().is_empty()
        {
            return Err(ConfigError::InvalidValue {
                field: "server.command".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        if self.ready_timeout_ms == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "server.ready_timeout_ms".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}
