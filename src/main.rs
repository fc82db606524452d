use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::{info, warn, Instrument};

use obfusbot::bot::Bot;
use obfusbot::config::ObfusbotConfig;
use obfusbot::engine::CommandEngine;
use obfusbot::pending::PendingStore;
use obfusbot::telegram::TelegramClient;
use obfusbot::telemetry::{create_update_span, generate_correlation_id, init_telemetry};

#[derive(Parser)]
#[command(name = "obfusbot")]
#[command(about = "Telegram bot that obfuscates uploaded JavaScript files behind a one-time security code")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start polling Telegram for updates (default)
    Run,
    /// Print the resolved configuration with the token redacted
    CheckConfig,
    /// Write a starter obfusbot.toml with the default settings
    Init,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        None | Some(Commands::Run) => {
            tokio::runtime::Runtime::new()?.block_on(async { run_bot().await })
        }
        Some(Commands::CheckConfig) => {
            let config = ObfusbotConfig::load()?;
            println!("{}", toml::to_string_pretty(&config.redacted())?);
            Ok(())
        }
        Some(Commands::Init) => {
            let path = std::path::Path::new("obfusbot.toml");
            if path.exists() {
                return Err(anyhow!("obfusbot.toml already exists, not overwriting"));
            }
            ObfusbotConfig::default().save_to_file(path)?;
            println!("wrote obfusbot.toml");
            Ok(())
        }
    }
}

async fn run_bot() -> Result<()> {
    init_telemetry()?;

    let config = Arc::new(ObfusbotConfig::load()?);
    let token = config
        .telegram
        .bot_token
        .clone()
        .ok_or_else(|| anyhow!("no bot token configured - set BOT_TOKEN or telegram.bot_token"))?;

    let client = Arc::new(TelegramClient::new(token)?);
    let engine = Arc::new(CommandEngine::new(
        config.engine.program.clone(),
        config.engine.args.clone(),
    ));
    let store = Arc::new(PendingStore::new());
    let bot = Arc::new(Bot::new(client.clone(), engine, store, config.clone()));

    info!(bot = %config.display.bot_name, "starting update polling");

    let mut offset = 0i64;
    loop {
        match client
            .next_updates(offset, config.telegram.poll_timeout_secs)
            .await
        {
            Ok(updates) => {
                for update in updates {
                    offset = offset.max(update.update_id + 1);
                    let bot = bot.clone();
                    let correlation_id = generate_correlation_id();
                    let span = create_update_span(update.update_id, &correlation_id);
                    // One task per update so a slow transformation never
                    // blocks other requesters
                    tokio::spawn(
                        async move {
                            bot.handle_update(update).await;
                        }
                        .instrument(span),
                    );
                }
            }
            Err(e) => {
                warn!(error = %e, "polling failed, backing off");
                tokio::time::sleep(std::time::Duration::from_secs(5)).await;
            }
        }
    }
}
