pub mod draft;
pub mod fanout;

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{info, warn};

pub use self::draft::{BroadcastDraft, BroadcastPayload, DraftMode};
pub use self::fanout::Tally;
use crate::admin::AdminSet;
use crate::directory::UserDirectory;
use crate::error::FlowError;
use crate::gateway::{Action, Button, Delivery, Markup, MessageGateway, OutboundMessage};
use crate::keyed::KeyedStore;
use crate::platform::Event;
use crate::texts;
use crate::types::{CallbackAction, ChatIdentity};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Confirm,
    Cancel,
}

/// Answer to a confirm/cancel click.
pub struct Resolution {
    pub actions: Vec<Action>,
    /// Set when a fan-out was started.
    pub fanout: Option<JoinHandle<Tally>>,
}

/// Admin panel and broadcast authoring, one draft per admin.
pub struct BroadcastController {
    admins: Arc<AdminSet>,
    directory: Arc<dyn UserDirectory>,
    gateway: Arc<dyn MessageGateway>,
    drafts: KeyedStore<ChatIdentity, BroadcastDraft>,
    send_delay: Duration,
}

impl BroadcastController {
    pub fn new(
        admins: Arc<AdminSet>,
        directory: Arc<dyn UserDirectory>,
        gateway: Arc<dyn MessageGateway>,
        send_delay: Duration,
    ) -> Self {
        Self {
            admins,
            directory,
            gateway,
            drafts: KeyedStore::new(),
            send_delay,
        }
    }

    pub async fn is_authoring(&self, admin: ChatIdentity) -> bool {
        self.drafts.get(&admin).await.mode == DraftMode::AwaitingContent
    }

    async fn recipient_count(&self) -> u64 {
        match self.directory.count().await {
            Ok(count) => count,
            Err(e) => {
                warn!("Failed to count users: {:#}", e);
                0
            }
        }
    }

    pub async fn open_panel(&self, admin: ChatIdentity) -> Result<Vec<Action>, FlowError> {
        self.admins.check(admin).await?;
        let keyboard = Markup::Reply(vec![
            vec![texts::PANEL_BROADCAST.to_string(), texts::PANEL_STATS.to_string()],
            vec![texts::PANEL_EXIT.to_string()],
        ]);
        Ok(vec![send(
            admin,
            OutboundMessage::text(texts::PANEL_TITLE).with_markup(keyboard),
        )])
    }

    pub async fn stats(&self, admin: ChatIdentity) -> Result<Vec<Action>, FlowError> {
        self.admins.check(admin).await?;
        let count = self.recipient_count().await;
        Ok(vec![send(admin, OutboundMessage::text(texts::stats(count)))])
    }

    pub async fn exit_panel(&self, admin: ChatIdentity) -> Result<Vec<Action>, FlowError> {
        self.admins.check(admin).await?;
        self.drafts.take(&admin).await;
        Ok(vec![send(
            admin,
            OutboundMessage::text(texts::PANEL_CLOSED).with_markup(Markup::RemoveReply),
        )])
    }

    /// Begin (or restart) a draft waiting for content.
    pub async fn start_authoring(&self, admin: ChatIdentity) -> Result<Vec<Action>, FlowError> {
        self.admins.check(admin).await?;
        self.drafts
            .update(&admin, |draft| *draft = BroadcastDraft::awaiting_content())
            .await;
        info!("Admin {} started a broadcast draft", admin);
        Ok(vec![send(admin, OutboundMessage::html(texts::BROADCAST_ASK_CONTENT))])
    }

    /// Store `event` as the payload and ask for confirmation. Capturing again
    /// replaces the payload and prompts again.
    pub async fn capture_content(
        &self,
        admin: ChatIdentity,
        event: &Event,
    ) -> Result<Vec<Action>, FlowError> {
        self.admins.check(admin).await?;
        let payload = BroadcastPayload::from_event(event).ok_or(
            FlowError::InvalidContentForState {
                expected: "text, photo or video",
                got: event.kind(),
            },
        )?;
        let preview = payload.preview();

        let stored = self
            .drafts
            .update(&admin, |draft| {
                if draft.mode != DraftMode::AwaitingContent {
                    return false;
                }
                draft.payload = Some(payload);
                true
            })
            .await;
        if !stored {
            return Err(FlowError::StaleOrMissingDraft);
        }

        let count = self.recipient_count().await;
        let keyboard = Markup::Inline(vec![vec![
            Button::new(texts::BROADCAST_CONFIRM_BUTTON, CallbackAction::BroadcastConfirm),
            Button::new(texts::BROADCAST_CANCEL_BUTTON, CallbackAction::BroadcastCancel),
        ]]);
        Ok(vec![send(
            admin,
            OutboundMessage::html(texts::broadcast_confirm(count, &preview)).with_markup(keyboard),
        )])
    }

    /// Resolve the confirmation prompt. Confirm takes the draft before the
    /// fan-out starts so a second click finds nothing to send.
    pub async fn resolve_confirmation(
        &self,
        admin: ChatIdentity,
        decision: Decision,
        callback_id: &str,
        message_id: Option<i32>,
    ) -> Result<Resolution, FlowError> {
        self.admins.check(admin).await?;
        let draft = self.drafts.take(&admin).await;

        let (toast, prompt) = match decision {
            Decision::Cancel => {
                info!("Admin {} cancelled the broadcast", admin);
                (texts::BROADCAST_CANCELLED_TOAST, texts::BROADCAST_CANCELLED)
            }
            Decision::Confirm if draft.payload.is_none() => {
                return Err(FlowError::StaleOrMissingDraft);
            }
            Decision::Confirm => (texts::BROADCAST_SENDING_TOAST, texts::BROADCAST_SENDING),
        };

        let mut actions = vec![Action::AnswerCallback {
            callback_id: callback_id.to_string(),
            text: Some(toast.to_string()),
        }];
        if let Some(message_id) = message_id {
            actions.push(Action::EditText {
                chat: admin,
                message_id,
                text: prompt.to_string(),
            });
        }

        let fanout = draft.payload.filter(|_| decision == Decision::Confirm).map(|payload| {
            tokio::spawn(fanout::run(
                Arc::clone(&self.gateway),
                Arc::clone(&self.directory),
                admin,
                payload,
                self.send_delay,
            ))
        });

        Ok(Resolution { actions, fanout })
    }

    /// Drop any draft, at any stage.
    pub async fn cancel_authoring(&self, admin: ChatIdentity) -> Result<Vec<Action>, FlowError> {
        self.admins.check(admin).await?;
        self.drafts.take(&admin).await;
        Ok(vec![send(admin, OutboundMessage::text(texts::CANCELLED))])
    }
}

fn send(chat: ChatIdentity, message: OutboundMessage) -> Action {
    Action::Send(Delivery::new(chat, message))
}
