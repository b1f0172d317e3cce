use crate::config::{ClientSettings, RelayConfig};
use crate::utils::error::Result;
use crate::utils::validation::Validate;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "agent-relay")]
#[command(about = "Ask the banking agent through the relay backend")]
pub struct CliConfig {
    /// TOML file with a [client] section
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(long, env = "BACKEND_URL", global = true)]
    pub backend_url: Option<String>,

    #[arg(long, env = "GATEWAY_URL", global = true)]
    pub gateway_url: Option<String>,

    /// Bearer token sent with job requests
    #[arg(long, env = "AGENT_RELAY_TOKEN", global = true, hide_env_values = true)]
    pub token: Option<String>,

    #[arg(long, global = true)]
    pub poll_attempts: Option<u32>,

    #[arg(long, global = true)]
    pub poll_interval_ms: Option<u64>,

    #[arg(long, global = true)]
    pub stream_timeout_secs: Option<u64>,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[arg(long, short, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Ask a banking question
    Ask {
        question: String,
        #[arg(long)]
        bank: Option<String>,
        /// Stream the answer instead of polling a job
        #[arg(long)]
        stream: bool,
    },
    /// Stream the raw agent answer for a prompt
    Stream { prompt: String },
    /// Run a prompt through the synchronous invoke endpoint
    Invoke { prompt: String },
    /// Compare a bank against its peers on one metric
    Peers(PeerArgs),
    /// List 10-K and 10-Q filings for a bank
    Filings {
        #[arg(long)]
        bank: String,
    },
    /// Generate a full financial report
    Report {
        #[arg(long)]
        bank: String,
    },
    /// Run the compliance risk assessment
    Compliance {
        #[arg(long)]
        bank: String,
    },
    /// Ask through the cloud gateway
    Gateway { prompt: String },
    /// Check that the backend is up
    Health,
}

#[derive(Debug, Clone, Args)]
pub struct PeerArgs {
    #[arg(long)]
    pub base: String,
    #[arg(long = "peer", required = true)]
    pub peers: Vec<String>,
    #[arg(long, default_value = "ROA")]
    pub metric: String,
    #[arg(long)]
    pub stream: bool,
}

impl CliConfig {
    /// Client settings from the optional file, then environment, then flags.
    pub fn client_settings(&self) -> Result<ClientSettings> {
        let mut settings = match &self.config {
            Some(path) => RelayConfig::from_file(path)?.client,
            None => ClientSettings::default(),
        };

        if let Some(url) = &self.backend_url {
            settings.base_url = url.clone();
        }
        if let Some(url) = &self.gateway_url {
            settings.gateway_url = Some(url.clone());
        }
        if let Some(token) = &self.token {
            settings.auth_token = Some(token.clone());
        }
        if let Some(attempts) = self.poll_attempts {
            settings.poll_max_attempts = attempts;
        }
        if let Some(interval) = self.poll_interval_ms {
            settings.poll_interval_ms = interval;
        }
        if let Some(secs) = self.stream_timeout_secs {
            settings.stream_timeout_secs = secs;
        }

        settings.validate()?;
        Ok(settings)
    }
}

#[derive(Debug, Clone, Parser)]
#[command(name = "relay-server")]
#[command(about = "HTTP relay between web clients and the agent CLI")]
pub struct ServerArgs {
    #[arg(long)]
    pub config: Option<PathBuf>,

    #[arg(long)]
    pub host: Option<String>,

    #[arg(long)]
    pub port: Option<u16>,

    /// Directory the agent CLI runs in
    #[arg(long)]
    pub agent_dir: Option<PathBuf>,

    #[arg(long, help = "Emit JSON logs")]
    pub json_logs: bool,
}

impl ServerArgs {
    /// File settings, overlaid by environment, overlaid by flags.
    pub fn relay_config(&self) -> Result<RelayConfig> {
        let mut config = match &self.config {
            Some(path) => RelayConfig::from_file(path)?,
            None => RelayConfig::default(),
        };
        config.apply_env()?;

        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(dir) = &self.agent_dir {
            config.agent.working_dir = Some(dir.clone());
        }
        if self.json_logs {
            config.server.json_logs = true;
        }

        config.server.validate()?;
        config.agent.validate()?;
        Ok(config)
    }
}
