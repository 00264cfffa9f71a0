mod admin;
mod broadcast;
mod config;
mod conversation;
mod directory;
mod dispatch;
mod error;
mod gateway;
mod keyed;
mod platform;
mod scheduler;
mod server;
mod texts;
mod types;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use teloxide::Bot;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::admin::AdminSet;
use crate::broadcast::BroadcastController;
use crate::config::Config;
use crate::conversation::ConversationEngine;
use crate::directory::{SqliteDirectory, UserDirectory};
use crate::dispatch::UpdateRouter;
use crate::gateway::telegram::TelegramGateway;
use crate::gateway::MessageGateway;
use crate::platform::telegram;
use crate::scheduler::{tasks, Scheduler};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,funnelbot=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    info!("Loading configuration from: {}", config_path.display());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    let webhook_url = config.webhook_url();
    info!("Configuration loaded successfully");
    info!("  Admins: {:?}", config.telegram.admin_chat_ids);
    info!("  Mode: {}", if webhook_url.is_some() { "webhook" } else { "polling" });
    info!("  Keep-alive: {}", config.keep_alive.enabled);

    let directory: Arc<dyn UserDirectory> = match &config.storage.database_path {
        Some(path) => Arc::new(SqliteDirectory::open(path)?),
        None => {
            warn!("No database configured; the user directory lives in memory only");
            Arc::new(SqliteDirectory::open_in_memory()?)
        }
    };

    let admins = Arc::new(AdminSet::default());
    for id in config.admin_ids() {
        admins.grant(id).await;
    }

    let bot = Bot::new(config.telegram.bot_token.clone());
    let gateway: Arc<dyn MessageGateway> = Arc::new(TelegramGateway::new(bot.clone()));

    let engine = ConversationEngine::new(config.funnel.clone(), admins.clone());
    let broadcast = BroadcastController::new(
        admins.clone(),
        directory.clone(),
        gateway.clone(),
        Duration::from_millis(config.broadcast.send_delay_ms),
    );
    let router = Arc::new(UpdateRouter::new(
        directory.clone(),
        gateway,
        admins,
        engine,
        broadcast,
    ));

    // Background tasks
    let mut scheduler = Scheduler::new().await?;
    tasks::register_builtin_tasks(&scheduler, directory, &config.keep_alive).await?;
    scheduler.start().await?;

    // HTTP server: liveness always, updates only in webhook mode
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .with_context(|| {
            format!(
                "Invalid listen address {}:{}",
                config.server.host, config.server.port
            )
        })?;
    let app = server::app(
        router.clone(),
        webhook_url
            .as_ref()
            .map(|_| config.server.webhook_path.as_str()),
        config.telegram.webhook_secret.clone(),
    );
    let mut http = tokio::spawn(server::serve(addr, app));

    info!("Bot is starting...");
    match webhook_url {
        Some(url) => {
            telegram::register_webhook(&bot, &url, config.telegram.webhook_secret.as_deref())
                .await?;
            tokio::select! {
                result = &mut http => {
                    result.context("HTTP server task panicked")??;
                }
                _ = tokio::signal::ctrl_c() => info!("Shutting down..."),
            }
        }
        None => {
            tokio::spawn(async move {
                match http.await {
                    Ok(Err(e)) => error!("HTTP server stopped: {:#}", e),
                    Err(e) => error!("HTTP server task panicked: {}", e),
                    Ok(Ok(())) => {}
                }
            });
            telegram::run_polling(bot, router).await?;
        }
    }

    scheduler.shutdown().await?;
    Ok(())
}
