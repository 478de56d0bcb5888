//! Wiring and command handlers: builds the cache, remote client and engine from [`AppConfig`].

use std::sync::Arc;

use anyhow::{Context, Result};
use remote_client::HttpRemoteChatService;
use storage::{InMemoryMessageCache, MessageCache, SqliteMessageCache};
use sync_engine::{EngineConfig, SyncEngine};
use tokio_stream::StreamExt;
use tracing::info;

use crate::cli::Commands;
use crate::config::{AppConfig, CacheBackend};
use crate::render::{format_record, format_snapshot};

/// Opens the configured cache backend.
pub async fn build_cache(config: &AppConfig) -> Result<Arc<dyn MessageCache>> {
    let cache: Arc<dyn MessageCache> = match config.cache_backend {
        CacheBackend::Memory => Arc::new(InMemoryMessageCache::new()),
        CacheBackend::Sqlite => Arc::new(
            SqliteMessageCache::new(&config.database_url)
                .await
                .with_context(|| format!("Open message cache at {}", config.database_url))?,
        ),
    };
    info!(backend = %config.cache_backend, "Message cache ready");
    Ok(cache)
}

pub async fn build_engine(config: &AppConfig) -> Result<SyncEngine> {
    let cache = build_cache(config).await?;
    let remote = Arc::new(
        HttpRemoteChatService::new(&config.remote).context("Create remote chat client")?,
    );
    let engine_config = EngineConfig::default().with_refresh_policy(config.refresh_policy);
    Ok(SyncEngine::with_config(cache, remote, engine_config))
}

/// Runs one command to completion.
pub async fn run(config: AppConfig, command: Commands) -> Result<()> {
    let engine = build_engine(&config).await?;

    match command {
        Commands::Send { conversation, text } => {
            let record = engine
                .send(&conversation, &text, &config.author)
                .await
                .context("Send failed; the message is kept locally as failed")?;
            println!("{}", format_record(&record));
        }
        Commands::Refresh { conversation } => {
            let fetched = engine.refresh(&conversation).await.context("Refresh failed")?;
            println!("Fetched {} messages", fetched);
        }
        Commands::Analyze { conversation } => {
            match engine.analyze(&conversation).await.context("Analysis failed")? {
                Some(record) => println!("{}", format_record(&record)),
                None => println!("Analysis already running for {}", conversation),
            }
        }
        Commands::List {
            conversation,
            refresh,
        } => {
            if refresh {
                engine.refresh(&conversation).await.context("Refresh failed")?;
            }
            let mut stream = engine.observe(&conversation).await?;
            if let Some(snapshot) = stream.next().await {
                println!("{}", format_snapshot(&snapshot));
            }
        }
        Commands::Watch {
            conversation,
            refresh,
        } => watch(&engine, &conversation, refresh).await?,
    }
    Ok(())
}

async fn watch(engine: &SyncEngine, conversation: &str, refresh: bool) -> Result<()> {
    let mut stream = engine.observe(conversation).await?;
    if refresh {
        engine.refresh(conversation).await.context("Refresh failed")?;
    }
    info!(conversation_id = %conversation, "Watching conversation, Ctrl-C to stop");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Stopped watching");
                break;
            }
            next = stream.next() => match next {
                Some(snapshot) => {
                    println!("--- {} ({} messages)", conversation, snapshot.len());
                    println!("{}", format_snapshot(&snapshot));
                }
                None => break,
            },
        }
    }
    Ok(())
}
