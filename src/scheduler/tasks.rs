use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::config::KeepAliveConfig;
use crate::directory::UserDirectory;
use crate::scheduler::Scheduler;

const PING_TIMEOUT: Duration = Duration::from_secs(10);

/// Register the heartbeat and, when configured, the keep-alive pinger.
pub async fn register_builtin_tasks(
    scheduler: &Scheduler,
    directory: Arc<dyn UserDirectory>,
    keep_alive: &KeepAliveConfig,
) -> Result<()> {
    // Heartbeat: log that the bot is alive every hour
    scheduler
        .add_cron_job("0 0 * * * *", "heartbeat", move || {
            let directory = directory.clone();
            Box::pin(async move {
                heartbeat(directory.as_ref()).await;
            })
        })
        .await?;

    if let Some(url) = keep_alive_target(keep_alive) {
        let client = reqwest::Client::builder()
            .timeout(PING_TIMEOUT)
            .build()
            .context("Failed to build keep-alive HTTP client")?;
        let url = url.to_string();
        scheduler
            .add_repeated_job(
                Duration::from_secs(keep_alive.interval_secs),
                "keep-alive",
                move || {
                    let client = client.clone();
                    let url = url.clone();
                    Box::pin(async move {
                        ping(&client, &url).await;
                    })
                },
            )
            .await?;
    }

    Ok(())
}

/// URL to ping, if the pinger should run at all.
fn keep_alive_target(config: &KeepAliveConfig) -> Option<&str> {
    if !config.enabled {
        return None;
    }
    match config.url.as_deref().map(str::trim) {
        Some(url) if !url.is_empty() => Some(url),
        _ => {
            warn!("Keep-alive is enabled but no URL is set; pinger disabled");
            None
        }
    }
}

/// GET `url` once. Returns whether the request reached the server.
async fn ping(client: &reqwest::Client, url: &str) -> bool {
    match client.get(url).send().await {
        Ok(response) => {
            info!("Keep-alive ping {} -> {}", url, response.status());
            true
        }
        Err(e) => {
            warn!("Keep-alive ping to {} failed: {}", url, e);
            false
        }
    }
}

async fn heartbeat(directory: &dyn UserDirectory) -> u64 {
    let count = match directory.count().await {
        Ok(count) => count,
        Err(e) => {
            warn!("Heartbeat could not count users: {:#}", e);
            0
        }
    };
    info!("Heartbeat: bot is alive, {} users stored", count);
    count
}
