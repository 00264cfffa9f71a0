use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::Router;
use teloxide::types::Update;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::dispatch::UpdateRouter;
use crate::platform::telegram;

const SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";

#[derive(Clone)]
struct AppState {
    router: Arc<UpdateRouter>,
    secret: Option<Arc<str>>,
}

/// Liveness probes plus, when `webhook_path` is given, the update endpoint.
pub fn app(router: Arc<UpdateRouter>, webhook_path: Option<&str>, secret: Option<String>) -> Router {
    let state = AppState {
        router,
        secret: secret.map(Arc::from),
    };

    let mut app = Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler));
    if let Some(path) = webhook_path {
        app = app.route(path, post(webhook_handler));
    }
    app.with_state(state)
}

pub async fn serve(addr: SocketAddr, app: Router) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind HTTP server to {addr}"))?;
    info!("HTTP server listening on http://{}", addr);
    axum::serve(listener, app).await.context("HTTP server failed")?;
    Ok(())
}

async fn root_handler() -> &'static str {
    "Bot is running!"
}

async fn health_handler() -> &'static str {
    "ok"
}

/// Always acknowledges with 200 so Telegram never retries a delivery.
async fn webhook_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> (StatusCode, &'static str) {
    if let Some(expected) = &state.secret {
        let given = headers.get(SECRET_HEADER).and_then(|v| v.to_str().ok());
        if given != Some(expected.as_ref()) {
            warn!("Webhook call with missing or wrong secret token ignored");
            return (StatusCode::OK, "OK");
        }
    }

    match serde_json::from_str::<Update>(&body) {
        Ok(update) => match telegram::decode(&update) {
            Some(inbound) => {
                state.router.dispatch(inbound).await;
            }
            None => debug!("Ignoring update {:?}", update.id),
        },
        Err(e) => error!("Failed to decode webhook update: {}", e),
    }

    (StatusCode::OK, "OK")
}
