use crate::config::{AgentSettings, ClientSettings, ServerSettings};
use crate::utils::error::Result;
use crate::utils::validation::Validate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::LazyLock;

static ENV_VAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("env var pattern"));

/// File form of the relay configuration. Every section is optional.
///
/// ```toml
/// [server]
/// port = 3001
/// cors_origins = ["http://localhost:5173"]
///
/// [agent]
/// command = "agentcore"
/// working_dir = "${HOME}/bank-agent"
///
/// [client]
/// base_url = "http://localhost:3001"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub server: ServerSettings,
    pub agent: AgentSettings,
    pub client: ClientSettings,
}

impl RelayConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed = Self::substitute_env_vars(content);
        Ok(toml::from_str(&processed)?)
    }

    /// Replace `${VAR}` with the variable's value. Unset variables stay as written.
    fn substitute_env_vars(content: &str) -> String {
        ENV_VAR
            .replace_all(content, |caps: &regex::Captures| {
                let name = &caps[1];
                std::env::var(name).unwrap_or_else(|_| format!("${{{}}}", name))
            })
            .into_owned()
    }

    /// Environment variables override values from the file.
    pub fn apply_env(&mut self) -> Result<()> {
        self.server.apply_env()?;
        self.agent.apply_env()?;
        if let Ok(url) = std::env::var("BACKEND_URL") {
            self.client.base_url = url;
        }
        if let Ok(url) = std::env::var("GATEWAY_URL") {
            self.client.gateway_url = Some(url);
        }
        if let Ok(token) = std::env::var("AGENT_RELAY_TOKEN") {
            self.client.auth_token = Some(token);
        }
        Ok(())
    }
}

impl Validate for RelayConfig {
    fn validate(&self) -> Result<()> {
        self.server.validate()?;
        self.agent.validate()?;
        self.client.validate()
    }
}
