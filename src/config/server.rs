use crate::utils::error::{RelayError, Result};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 3001;
pub const DEFAULT_AGENT_COMMAND: &str = "agentcore";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Allowed browser origins; `*` allows any.
    pub cors_origins: Vec<String>,
    pub request_timeout_secs: u64,
    /// Finished jobs are dropped after this long.
    pub job_retention_secs: u64,
    pub json_logs: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            cors_origins: vec!["*".to_string()],
            request_timeout_secs: 330,
            job_retention_secs: 3600,
            json_logs: false,
        }
    }
}

impl ServerSettings {
    /// Overlay `HOST`, `PORT`, `CORS_ORIGINS`, `REQUEST_TIMEOUT_SECS`,
    /// `JOB_RETENTION_SECS` and `LOG_FORMAT=json` when set.
    pub fn apply_env(&mut self) -> Result<()> {
        if let Some(host) = env_string("HOST") {
            self.host = host;
        }
        if let Some(port) = env_parse("PORT")? {
            self.port = port;
        }
        if let Some(origins) = env_string("CORS_ORIGINS") {
            self.cors_origins = split_list(&origins);
        }
        if let Some(secs) = env_parse("REQUEST_TIMEOUT_SECS")? {
            self.request_timeout_secs = secs;
        }
        if let Some(secs) = env_parse("JOB_RETENTION_SECS")? {
            self.job_retention_secs = secs;
        }
        if let Some(format) = env_string("LOG_FORMAT") {
            self.json_logs = format.eq_ignore_ascii_case("json");
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn job_retention(&self) -> Duration {
        Duration::from_secs(self.job_retention_secs)
    }

    pub fn allows_any_origin(&self) -> bool {
        self.cors_origins.is_empty() || self.cors_origins.iter().any(|o| o == "*")
    }
}

impl Validate for ServerSettings {
    fn validate(&self) -> Result<()> {
        validation::validate_non_empty_string("server.host", &self.host)?;
        validation::validate_positive_number("server.port", u64::from(self.port), 1)?;
        validation::validate_positive_number("server.request_timeout_secs", self.request_timeout_secs, 1)?;
        if !self.allows_any_origin() {
            for origin in &self.cors_origins {
                validation::validate_url("server.cors_origins", origin)?;
            }
        }
        Ok(())
    }
}

/// How the agent CLI is launched.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    pub command: String,
    /// Arguments placed before the JSON payload.
    pub args: Vec<String>,
    /// Directory holding the agent project; the CLI runs from here.
    pub working_dir: Option<PathBuf>,
    pub timeout_secs: u64,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            command: DEFAULT_AGENT_COMMAND.to_string(),
            args: vec!["invoke".to_string()],
            working_dir: None,
            timeout_secs: 300,
        }
    }
}

impl AgentSettings {
    /// Overlay `AGENT_COMMAND`, `AGENT_ARGS` (whitespace separated),
    /// `AGENT_DIR` and `AGENT_TIMEOUT_SECS` when set.
    pub fn apply_env(&mut self) -> Result<()> {
        if let Some(command) = env_string("AGENT_COMMAND") {
            self.command = command;
        }
        if let Some(args) = env_string("AGENT_ARGS") {
            self.args = args.split_whitespace().map(String::from).collect();
        }
        if let Some(dir) = env_string("AGENT_DIR") {
            self.working_dir = Some(PathBuf::from(dir));
        }
        if let Some(secs) = env_parse("AGENT_TIMEOUT_SECS")? {
            self.timeout_secs = secs;
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Validate for AgentSettings {
    fn validate(&self) -> Result<()> {
        validation::validate_non_empty_string("agent.command", &self.command)?;
        validation::validate_positive_number("agent.timeout_secs", self.timeout_secs, 1)?;
        if let Some(dir) = &self.working_dir {
            if !dir.is_dir() {
                return Err(RelayError::InvalidConfigValueError {
                    field: "agent.working_dir".to_string(),
                    value: dir.display().to_string(),
                    reason: "Directory does not exist".to_string(),
                });
            }
        }
        Ok(())
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_string(name) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e: T::Err| RelayError::InvalidConfigValueError {
                field: name.to_string(),
                value: raw.clone(),
                reason: e.to_string(),
            }),
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let server = ServerSettings::default();
        assert_eq!(server.bind_address(), "0.0.0.0:3001");
        assert!(server.allows_any_origin());
        assert!(server.validate().is_ok());

        let agent = AgentSettings::default();
        assert_eq!(agent.command, "agentcore");
        assert_eq!(agent.args, vec!["invoke"]);
        assert_eq!(agent.timeout(), Duration::from_secs(300));
    }

    #[test]
    fn test_split_list_drops_blanks() {
        assert_eq!(
            split_list("https://a.example, ,https://b.example"),
            vec!["https://a.example", "https://b.example"]
        );
    }

    #[test]
    fn test_explicit_origins_must_be_urls() {
        let server = ServerSettings {
            cors_origins: vec!["localhost:5173".to_string()],
            ..Default::default()
        };
        assert!(server.validate().is_err());

        let server = ServerSettings {
            cors_origins: vec!["http://localhost:5173".to_string()],
            ..Default::default()
        };
        assert!(server.validate().is_ok());
    }

    #[test]
    fn test_missing_agent_dir_is_rejected() {
        let agent = AgentSettings {
            working_dir: Some(PathBuf::from("/definitely/not/here")),
            ..Default::default()
        };
        let err = agent.validate().unwrap_err();
        assert!(matches!(err, RelayError::InvalidConfigValueError { .. }));
    }
}
