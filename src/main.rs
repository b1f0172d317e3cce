use agent_relay::client::{AgentClient, GatewayClient};
use agent_relay::config::cli::{CliConfig, Command};
use agent_relay::utils::logger;
use agent_relay::RelayError;
use clap::Parser;
use serde::Serialize;
use std::io::Write;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cli = CliConfig::parse();

    logger::init_cli_logger(cli.verbose);
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    if let Err(e) = run(&cli).await {
        tracing::error!(
            "❌ {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 {}", e.recovery_suggestion());
        if e.is_retryable() {
            eprintln!("🔁 This looks temporary; running the same command again may succeed");
        }

        let code = e.exit_code();
        if code > 0 {
            std::process::exit(code);
        }
    }
}

async fn run(cli: &CliConfig) -> Result<(), RelayError> {
    let settings = cli.client_settings()?;
    let client = AgentClient::from_settings(&settings);

    match &cli.command {
        Command::Ask {
            question,
            bank,
            stream,
        } => {
            let bank = bank.as_deref();
            if *stream {
                let answer = client
                    .chat_streaming(question, bank, None, print_chunk)
                    .await?;
                println!();
                if cli.json {
                    print_json(&answer)?;
                }
            } else {
                let answer = client.chat(question, bank, None, false).await?;
                if cli.json {
                    print_json(&answer)?;
                } else {
                    println!("{}", answer.response);
                }
            }
        }
        Command::Stream { prompt } => {
            let timeout = settings.stream_timeout();
            client.stream_to_string(prompt, print_chunk, timeout).await?;
            println!();
        }
        Command::Invoke { prompt } => {
            println!("{}", client.invoke_agent(prompt).await?);
        }
        Command::Peers(args) => {
            let analysis = if args.stream {
                let analysis = client
                    .stream_peer_analysis(&args.base, &args.peers, &args.metric, print_chunk)
                    .await?;
                println!();
                analysis
            } else {
                client
                    .analyze_peers(&args.base, &args.peers, &args.metric)
                    .await?
            };
            if cli.json {
                print_json(&analysis)?;
            } else {
                println!("📊 {} data points", analysis.data.len());
                println!("{}", analysis.analysis);
            }
        }
        Command::Filings { bank } => {
            let filings = client.sec_filings(bank).await?;
            if cli.json {
                print_json(&filings)?;
            } else if filings.is_empty() {
                println!("No filings found for {}", bank);
            } else {
                for line in filings.descriptions() {
                    println!("📄 {}", line);
                }
            }
        }
        Command::Report { bank } => {
            println!("{}", client.full_report(bank).await?);
        }
        Command::Compliance { bank } => {
            let assessment = client.compliance_assessment(bank).await?;
            print_json(&assessment)?;
        }
        Command::Gateway { prompt } => {
            let gateway = GatewayClient::from_settings(&settings)?;
            println!("{}", gateway.ask(prompt).await?);
        }
        Command::Health => {
            let health = client.health().await?;
            if cli.json {
                print_json(&health)?;
            } else {
                println!("✅ {} is up", client.base_url());
            }
        }
    }

    Ok(())
}

fn print_chunk(chunk: &str) {
    print!("{}", chunk);
    let _ = std::io::stdout().flush();
}

fn print_json<T: Serialize>(value: &T) -> Result<(), RelayError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
