use std::sync::Arc;

use anyhow::{Context, Result};
use teloxide::prelude::*;
use teloxide::types::UpdateKind;
use tracing::{debug, info};

use super::{Event, Inbound, Sender};
use crate::dispatch::UpdateRouter;
use crate::types::{CallbackAction, ChatIdentity, Command, MediaKind, MediaRef};

/// Turn a raw Telegram update into an `Inbound`. Updates the bot has no use
/// for (edits, channel posts, ...) yield `None`.
pub fn decode(update: &Update) -> Option<Inbound> {
    match &update.kind {
        UpdateKind::Message(msg) => Some(decode_message(msg)),
        UpdateKind::CallbackQuery(query) => Some(decode_callback(query)),
        _ => None,
    }
}

fn decode_message(msg: &Message) -> Inbound {
    let caption = msg.caption().map(str::to_string);

    let event = if let Some(text) = msg.text() {
        match Command::parse(text) {
            Some(command) => Event::Command(command),
            None => Event::Text(text.to_string()),
        }
    } else if let Some(photo) = msg.photo().and_then(|sizes| sizes.last()) {
        // Sizes are ascending; the last one is the original resolution.
        Event::Media {
            kind: MediaKind::Photo,
            media: MediaRef::new(photo.file.id.0.clone()),
            caption,
        }
    } else if let Some(video) = msg.video() {
        Event::Media {
            kind: MediaKind::Video,
            media: MediaRef::new(video.file.id.0.clone()),
            caption,
        }
    } else if let Some(document) = msg.document() {
        Event::Media {
            kind: MediaKind::Document,
            media: MediaRef::new(document.file.id.0.clone()),
            caption,
        }
    } else {
        Event::Other
    };

    Inbound {
        sender: Sender {
            username: msg.from.as_ref().and_then(|user| user.username.clone()),
        },
        message_id: Some(msg.id.0),
        ..Inbound::new(ChatIdentity(msg.chat.id.0), event)
    }
}

fn decode_callback(query: &CallbackQuery) -> Inbound {
    let message = query.message.as_ref();
    // Buttons live in private chats, so the clicker's id doubles as the chat
    // when the original message is no longer available.
    let chat = message
        .map(|m| m.chat().id.0)
        .unwrap_or(query.from.id.0 as i64);

    let event = Event::Callback {
        action: CallbackAction::parse(query.data.as_deref().unwrap_or_default()),
        callback_id: query.id.to_string(),
        message_id: message.map(|m| m.id().0),
    };

    Inbound {
        sender: Sender {
            username: query.from.username.clone(),
        },
        ..Inbound::new(ChatIdentity(chat), event)
    }
}

/// Receive updates by long polling and hand each one to the router.
pub async fn run_polling(bot: Bot, router: Arc<UpdateRouter>) -> Result<()> {
    info!("Starting Telegram long polling...");
    bot.delete_webhook()
        .await
        .context("Failed to remove webhook before polling")?;

    let handler = dptree::entry().endpoint(handle_update);

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![router])
        .enable_ctrlc_handler()
        .error_handler(LoggingErrorHandler::with_custom_text("telegram"))
        .build()
        .dispatch()
        .await;

    Ok(())
}

async fn handle_update(update: Update, router: Arc<UpdateRouter>) -> ResponseResult<()> {
    match decode(&update) {
        Some(inbound) => {
            router.dispatch(inbound).await;
        }
        None => debug!("Ignoring update {:?}", update.id),
    }
    Ok(())
}

/// Point Telegram at our webhook endpoint.
pub async fn register_webhook(bot: &Bot, url: &str, secret: Option<&str>) -> Result<()> {
    let parsed = reqwest::Url::parse(url).with_context(|| format!("Invalid webhook URL: {url}"))?;

    let mut request = bot.set_webhook(parsed);
    if let Some(secret) = secret {
        request = request.secret_token(secret.to_string());
    }
    request.await.context("Failed to register webhook")?;

    info!("Webhook registered at {}", url);
    Ok(())
}
