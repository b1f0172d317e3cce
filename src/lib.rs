pub mod adapters;
pub mod client;
pub mod config;
pub mod core;
pub mod domain;
pub mod server;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::cli::{CliConfig, ServerArgs};

pub use adapters::CliInvoker;
pub use client::{AgentClient, GatewayClient};
pub use config::{AgentSettings, ClientSettings, RelayConfig, ServerSettings};
pub use core::jobs::JobStore;
pub use domain::model::{Job, JobStatus, StreamEvent};
pub use domain::ports::{AgentInvoker, AgentOutput};
pub use server::{build_app_router, AppState};
pub use utils::error::{RelayError, Result};
