//! chatsync CLI: send, refresh, analyze, list and watch conversations. Config from env and optional CLI args.

use anyhow::{Context, Result};
use clap::Parser;
use sync_cli::{app, AppConfig, Cli};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let config = AppConfig::load(cli.api_url, cli.database_url)
        .context("Load config from .env (CHAT_API_URL, DATABASE_URL, ...)")?;
    config.validate()?;
    chat_core::init_tracing(Some(&config.log_file))?;

    app::run(config, cli.command).await
}
