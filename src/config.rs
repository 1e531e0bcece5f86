use crate::error::{InferenceError, InferenceResult};
use crate::models::Role;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 11434;
pub const DEFAULT_MODEL: &str = "llama3.1:8b";
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_METADATA_TIMEOUT_MS: u64 = 5_000;

/// Label vocabulary used when a conversation is flattened into a prompt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoleLabels {
    #[default]
    Spanish,
    English,
}

impl RoleLabels {
    pub fn label(self, role: Role) -> &'static str {
        match (self, role) {
            (RoleLabels::Spanish, Role::User) => "Usuario",
            (RoleLabels::Spanish, Role::Assistant) => "Asistente",
            (RoleLabels::English, Role::User) => "User",
            (RoleLabels::English, Role::Assistant) => "Assistant",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "spanish" | "es" => Some(RoleLabels::Spanish),
            "english" | "en" => Some(RoleLabels::English),
            _ => None,
        }
    }
}

/// Connection parameters for one inference server.
///
/// Built once (defaults, environment, or a JSON file) and handed to
/// [`InferenceClient::new`](crate::InferenceClient::new), which validates it
/// and keeps its own copy for the rest of its life.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    host: String,
    port: u16,
    default_model: String,
    timeout_ms: u64,
    metadata_timeout_ms: u64,
    role_labels: RoleLabels,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            default_model: DEFAULT_MODEL.to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            metadata_timeout_ms: DEFAULT_METADATA_TIMEOUT_MS,
            role_labels: RoleLabels::default(),
        }
    }
}

impl ClientConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - OLLAMA_HOST, OLLAMA_PORT: server address
    /// - OLLAMA_MODEL: default model
    /// - OLLAMA_TIMEOUT_MS, OLLAMA_METADATA_TIMEOUT_MS: timeouts
    /// - OLLAMA_ROLE_LABELS: `spanish` or `english`
    pub fn from_env() -> InferenceResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> InferenceResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(host) = lookup("OLLAMA_HOST") {
            let (host, port) = split_host(&host)?;
            config.host = host;
            if let Some(port) = port {
                config.port = port;
            }
        }
        if let Some(port) = lookup("OLLAMA_PORT") {
            config.port = parse_var("OLLAMA_PORT", &port)?;
        }
        if let Some(model) = lookup("OLLAMA_MODEL") {
            config.default_model = model;
        }
        if let Some(timeout) = lookup("OLLAMA_TIMEOUT_MS") {
            config.timeout_ms = parse_var("OLLAMA_TIMEOUT_MS", &timeout)?;
        }
        if let Some(timeout) = lookup("OLLAMA_METADATA_TIMEOUT_MS") {
            config.metadata_timeout_ms = parse_var("OLLAMA_METADATA_TIMEOUT_MS", &timeout)?;
        }
        if let Some(labels) = lookup("OLLAMA_ROLE_LABELS") {
            config.role_labels = RoleLabels::parse(&labels).ok_or_else(|| {
                InferenceError::Configuration(format!(
                    "OLLAMA_ROLE_LABELS must be `spanish` or `english`, got `{}`",
                    labels
                ))
            })?;
        }
        Ok(config)
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_metadata_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.metadata_timeout_ms = timeout_ms;
        self
    }

    pub fn with_role_labels(mut self, labels: RoleLabels) -> Self {
        self.role_labels = labels;
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    pub fn role_labels(&self) -> RoleLabels {
        self.role_labels
    }

    /// Bound applied to every generation call.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Bound applied to listing, health and introspection calls. Never longer
    /// than the generation timeout.
    pub fn metadata_timeout(&self) -> Duration {
        Duration::from_millis(self.metadata_timeout_ms.min(self.timeout_ms))
    }

    pub fn validate(&self) -> InferenceResult<()> {
        if self.host.trim().is_empty() {
            return Err(InferenceError::Configuration("host must not be empty".into()));
        }
        if self.port == 0 {
            return Err(InferenceError::Configuration(
                "port must be between 1 and 65535".into(),
            ));
        }
        if self.default_model.trim().is_empty() {
            return Err(InferenceError::Configuration(
                "default model must not be empty".into(),
            ));
        }
        if self.timeout_ms == 0 || self.metadata_timeout_ms == 0 {
            return Err(InferenceError::Configuration(
                "timeouts must be positive".into(),
            ));
        }
        self.base_url().map_err(|e| {
            InferenceError::Configuration(format!(
                "host `{}` is not a valid address: {}",
                self.host, e
            ))
        })?;
        Ok(())
    }

    /// `http://{host}:{port}`, with IPv6 literals bracketed.
    pub fn base_url(&self) -> InferenceResult<Url> {
        let host = if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        };
        Ok(Url::parse(&format!("http://{}:{}", host, self.port))?)
    }
}

/// Accept `host`, `host:port`, `[v6]:port` and `http://host[:port]`, the forms
/// Ollama itself takes in OLLAMA_HOST. A bare IPv6 literal keeps all its colons.
fn split_host(raw: &str) -> InferenceResult<(String, Option<u16>)> {
    let raw = raw.trim();
    let authority = raw
        .strip_prefix("http://")
        .or_else(|| raw.strip_prefix("https://"))
        .unwrap_or(raw)
        .trim_end_matches('/');

    if let Some(rest) = authority.strip_prefix('[') {
        let (host, after) = rest.split_once(']').ok_or_else(|| {
            InferenceError::Configuration(format!("OLLAMA_HOST has an unclosed `[`: `{}`", raw))
        })?;
        let port = match after.strip_prefix(':') {
            Some(port) => Some(parse_var("OLLAMA_HOST", port)?),
            None if after.is_empty() => None,
            None => {
                return Err(InferenceError::Configuration(format!(
                    "OLLAMA_HOST has an invalid value: `{}`",
                    raw
                )))
            }
        };
        return Ok((host.to_string(), port));
    }

    match authority.split_once(':') {
        Some((host, port)) if !port.contains(':') => {
            Ok((host.to_string(), Some(parse_var("OLLAMA_HOST", port)?)))
        }
        _ => Ok((authority.to_string(), None)),
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, value: &str) -> InferenceResult<T> {
    value.trim().parse().map_err(|_| {
        InferenceError::Configuration(format!("{} has an invalid value: `{}`", name, value))
    })
}
