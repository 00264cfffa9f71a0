//! Recording gateway used by the unit tests.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use teloxide::{ApiError, RequestError};
use tokio::sync::Mutex;

use super::{MessageGateway, OutboundMessage};
use crate::error::SendError;
use crate::types::ChatIdentity;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recorded {
    Sent {
        to: ChatIdentity,
        message: OutboundMessage,
    },
    Edited {
        chat: ChatIdentity,
        message_id: i32,
        text: String,
    },
    ClearedMarkup {
        chat: ChatIdentity,
        message_id: i32,
    },
    Callback {
        callback_id: String,
        text: Option<String>,
    },
}

#[derive(Default)]
pub struct RecordingGateway {
    log: Mutex<Vec<Recorded>>,
    failing: Mutex<HashSet<ChatIdentity>>,
    photos_fail: AtomicBool,
}

fn blocked() -> SendError {
    SendError::Transport(RequestError::Api(ApiError::BotBlocked))
}

impl RecordingGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every send to `chat` fails from now on.
    pub async fn fail_for(&self, chat: ChatIdentity) {
        self.failing.lock().await.insert(chat);
    }

    /// Photo sends fail for everyone; other kinds still go through.
    pub fn fail_photos(&self) {
        self.photos_fail.store(true, Ordering::SeqCst);
    }

    pub async fn sent(&self) -> Vec<Recorded> {
        self.log.lock().await.clone()
    }

    /// Outbound messages (not edits or callback answers) addressed to `chat`.
    pub async fn messages_to(&self, chat: ChatIdentity) -> Vec<OutboundMessage> {
        self.log
            .lock()
            .await
            .iter()
            .filter_map(|r| match r {
                Recorded::Sent { to, message } if *to == chat => Some(message.clone()),
                _ => None,
            })
            .collect()
    }

    /// Bodies and captions of everything sent to `chat`.
    pub async fn texts_to(&self, chat: ChatIdentity) -> Vec<String> {
        self.messages_to(chat)
            .await
            .iter()
            .filter_map(|m| m.body().map(str::to_string))
            .collect()
    }

    pub async fn send_count(&self) -> usize {
        self.log
            .lock()
            .await
            .iter()
            .filter(|r| matches!(r, Recorded::Sent { .. }))
            .count()
    }
}

#[async_trait]
impl MessageGateway for RecordingGateway {
    async fn send(&self, to: ChatIdentity, message: &OutboundMessage) -> Result<(), SendError> {
        if self.failing.lock().await.contains(&to) {
            return Err(blocked());
        }
        if matches!(message, OutboundMessage::Photo { .. }) && self.photos_fail.load(Ordering::SeqCst)
        {
            return Err(blocked());
        }
        self.log.lock().await.push(Recorded::Sent {
            to,
            message: message.clone(),
        });
        Ok(())
    }

    async fn edit_text(
        &self,
        chat: ChatIdentity,
        message_id: i32,
        text: &str,
    ) -> Result<(), SendError> {
        self.log.lock().await.push(Recorded::Edited {
            chat,
            message_id,
            text: text.to_string(),
        });
        Ok(())
    }

    async fn clear_markup(&self, chat: ChatIdentity, message_id: i32) -> Result<(), SendError> {
        self.log
            .lock()
            .await
            .push(Recorded::ClearedMarkup { chat, message_id });
        Ok(())
    }

    async fn answer_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
    ) -> Result<(), SendError> {
        self.log.lock().await.push(Recorded::Callback {
            callback_id: callback_id.to_string(),
            text: text.map(str::to_string),
        });
        Ok(())
    }
}
