use std::sync::Arc;

use chatflow_bot::BotBuilder;
use chatflow_core::config::FlowConfig;
use chatflow_core::Update;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

mod demo;
mod sink;

use sink::ConsoleSink;

/// Talk to a chatflow bot from the terminal. Each stdin line is one message.
#[derive(Parser, Debug)]
#[command(name = "chatflow", version, about)]
struct Cli {
    /// Config file (default: $CHATFLOW_CONFIG, then ~/.chatflow/chatflow.toml).
    #[arg(long, value_name = "PATH")]
    config: Option<String>,

    #[arg(long, default_value_t = 1)]
    user_id: i64,

    #[arg(long, default_value_t = 1)]
    chat_id: i64,

    /// Username shown to handlers.
    #[arg(long)]
    username: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chatflow=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.clone().or_else(|| std::env::var("CHATFLOW_CONFIG").ok());
    let config = FlowConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        warn!("Config load failed ({}), using defaults", e);
        FlowConfig::default()
    });

    let mut builder = BotBuilder::new(config, Arc::new(ConsoleSink::new()))
        .routes(demo::routes()?)
        .scenario(demo::survey()?);
    for scenario in demo::tips()? {
        builder = builder.advanced_scenario(scenario);
    }
    let bot = builder.build()?;

    info!(user_id = cli.user_id, chat_id = cli.chat_id, "reading messages from stdin");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut update_id = 0;
    while let Some(line) = lines.next_line().await? {
        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        update_id += 1;
        let mut update = Update::message(update_id, cli.chat_id, cli.user_id, text);
        if let Some(name) = &cli.username {
            update = update.with_username(name.clone());
        }
        let outcome = bot.dispatch(update).await.await?;
        if outcome.had_error {
            warn!(request_id = %outcome.request_id, "update finished with errors");
        }
    }

    info!("stdin closed, bye");
    Ok(())
}
