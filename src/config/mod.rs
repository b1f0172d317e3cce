#[cfg(feature = "cli")]
pub mod cli;
pub mod server;
pub mod toml_config;

use crate::utils::error::Result;
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use server::{AgentSettings, ServerSettings};
pub use toml_config::RelayConfig;

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:3001";

/// Settings for talking to the relay backend and the cloud gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    pub base_url: String,
    pub gateway_url: Option<String>,
    pub auth_token: Option<String>,
    pub poll_max_attempts: u32,
    pub poll_interval_ms: u64,
    pub stream_timeout_secs: u64,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BACKEND_URL.to_string(),
            gateway_url: None,
            auth_token: None,
            poll_max_attempts: 120,
            poll_interval_ms: 2000,
            stream_timeout_secs: 120,
        }
    }
}

impl ClientSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn stream_timeout(&self) -> Duration {
        Duration::from_secs(self.stream_timeout_secs)
    }
}

impl Validate for ClientSettings {
    fn validate(&self) -> Result<()> {
        validation::validate_url("client.base_url", &self.base_url)?;
        if let Some(gateway) = &self.gateway_url {
            validation::validate_url("client.gateway_url", gateway)?;
        }
        validation::validate_positive_number(
            "client.poll_max_attempts",
            u64::from(self.poll_max_attempts),
            1,
        )?;
        validation::validate_range("client.poll_interval_ms", self.poll_interval_ms, 10, 60_000)?;
        validation::validate_positive_number("client.stream_timeout_secs", self.stream_timeout_secs, 1)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_defaults_match_polling_contract() {
        let settings = ClientSettings::default();
        assert_eq!(settings.poll_max_attempts, 120);
        assert_eq!(settings.poll_interval(), Duration::from_secs(2));
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_client_rejects_bad_gateway_url() {
        let settings = ClientSettings {
            gateway_url: Some("not a url".to_string()),
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }
}
