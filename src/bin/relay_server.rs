use agent_relay::config::cli::ServerArgs;
use agent_relay::server::{self, AppState};
use agent_relay::utils::logger;
use agent_relay::CliInvoker;
use anyhow::Context;
use clap::Parser;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let args = ServerArgs::parse();

    let config = args
        .relay_config()
        .context("Failed to load server configuration")?;

    logger::init_server_logger(config.server.json_logs);
    tracing::info!(
        host = %config.server.host,
        port = config.server.port,
        agent = %config.agent.command,
        agent_dir = ?config.agent.working_dir,
        "Loaded server configuration"
    );

    let invoker = Arc::new(CliInvoker::new(config.agent));
    let state = AppState::new(invoker, config.server);

    server::serve(state).await.context("Relay server failed")?;
    Ok(())
}
