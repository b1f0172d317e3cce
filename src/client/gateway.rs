use crate::config::ClientSettings;
use crate::core::extract;
use crate::utils::error::{RelayError, Result};
use reqwest::Client;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct GatewayResponse {
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Asks the agent through the cloud API gateway instead of the relay backend.
#[derive(Debug, Clone)]
pub struct GatewayClient {
    http: Client,
    url: String,
}

impl GatewayClient {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            url: url.into(),
        }
    }

    pub fn from_settings(settings: &ClientSettings) -> Result<Self> {
        settings
            .gateway_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .map(Self::new)
            .ok_or_else(|| RelayError::config("Gateway URL not configured"))
    }

    /// Answer text with markdown formatting removed.
    pub async fn ask(&self, prompt: &str) -> Result<String> {
        let response = self
            .http
            .post(&self.url)
            .json(&serde_json::json!({ "prompt": prompt }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RelayError::ApiError {
                status: status.as_u16(),
                message: format!("HTTP error! status: {}", status.as_u16()),
            });
        }

        let body: GatewayResponse = response.json().await?;
        match body.response {
            Some(text) => Ok(extract::strip_markdown(&text)),
            None => Err(RelayError::ApiError {
                status: status.as_u16(),
                message: body.error.unwrap_or_else(|| "Unknown error".to_string()),
            }),
        }
    }
}
