use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::admin::AdminSet;
use crate::broadcast::{BroadcastController, Decision, Tally};
use crate::conversation::ConversationEngine;
use crate::directory::UserDirectory;
use crate::error::FlowError;
use crate::gateway::{self, Action, Delivery, MessageGateway, OutboundMessage};
use crate::platform::{Event, Inbound};
use crate::texts;
use crate::types::{CallbackAction, Command, MediaKind};

/// Routes every decoded update to the admin panel, the broadcast flow or
/// the conversation engine, then carries out the resulting actions.
pub struct UpdateRouter {
    directory: Arc<dyn UserDirectory>,
    gateway: Arc<dyn MessageGateway>,
    admins: Arc<AdminSet>,
    engine: ConversationEngine,
    broadcast: BroadcastController,
}

impl UpdateRouter {
    pub fn new(
        directory: Arc<dyn UserDirectory>,
        gateway: Arc<dyn MessageGateway>,
        admins: Arc<AdminSet>,
        engine: ConversationEngine,
        broadcast: BroadcastController,
    ) -> Self {
        Self {
            directory,
            gateway,
            admins,
            engine,
            broadcast,
        }
    }

    /// Handle one inbound event. Returns the fan-out task when the event
    /// confirmed a broadcast; it runs on its own and may be ignored.
    pub async fn dispatch(&self, inbound: Inbound) -> Option<JoinHandle<Tally>> {
        info!("{} event from {}", inbound.event.kind(), inbound.chat);
        self.touch(&inbound).await;

        let (actions, fanout) = self.route(&inbound).await;
        gateway::execute(self.gateway.as_ref(), &actions).await;
        fanout
    }

    async fn touch(&self, inbound: &Inbound) {
        match self.directory.upsert(inbound.chat).await {
            Ok(record) if record.is_new() => info!("New user {}", record.chat_id),
            Ok(_) => {}
            Err(e) => warn!("Failed to record user {}: {:#}", inbound.chat, e),
        }
    }

    async fn route(&self, inbound: &Inbound) -> (Vec<Action>, Option<JoinHandle<Tally>>) {
        let chat = inbound.chat;

        let admin_result = match &inbound.event {
            Event::Command(Command::Admin) => Some(self.broadcast.open_panel(chat).await),
            Event::Command(Command::Cancel) => {
                let result = self.broadcast.cancel_authoring(chat).await;
                if result.is_ok() {
                    self.engine.reset(chat).await;
                }
                Some(result)
            }
            Event::Callback {
                action: action @ (CallbackAction::BroadcastConfirm | CallbackAction::BroadcastCancel),
                callback_id,
                message_id,
            } => {
                let decision = if *action == CallbackAction::BroadcastConfirm {
                    Decision::Confirm
                } else {
                    Decision::Cancel
                };
                return match self
                    .broadcast
                    .resolve_confirmation(chat, decision, callback_id, *message_id)
                    .await
                {
                    Ok(resolution) => (resolution.actions, resolution.fanout),
                    Err(e) => (reject(inbound, e), None),
                };
            }
            Event::Text(body) if self.admins.contains(chat).await => match body.trim() {
                texts::PANEL_BROADCAST => Some(self.broadcast.start_authoring(chat).await),
                texts::PANEL_STATS => Some(self.broadcast.stats(chat).await),
                texts::PANEL_EXIT => Some(self.broadcast.exit_panel(chat).await),
                _ => None,
            },
            _ => None,
        };
        if let Some(result) = admin_result {
            return (settle(inbound, result), None);
        }

        if self.is_broadcast_content(inbound).await {
            let result = self.broadcast.capture_content(chat, &inbound.event).await;
            return (settle(inbound, result), None);
        }

        let outcome = self.engine.handle(inbound).await;
        debug!("Chat {} is now {}", chat, outcome.state.name());
        (outcome.actions, None)
    }

    /// Text, photo or video from an admin whose draft awaits content.
    async fn is_broadcast_content(&self, inbound: &Inbound) -> bool {
        let candidate = matches!(
            inbound.event,
            Event::Text(_)
                | Event::Media {
                    kind: MediaKind::Photo | MediaKind::Video,
                    ..
                }
        );
        candidate
            && self.admins.contains(inbound.chat).await
            && self.broadcast.is_authoring(inbound.chat).await
    }
}

fn settle(inbound: &Inbound, result: Result<Vec<Action>, FlowError>) -> Vec<Action> {
    result.unwrap_or_else(|e| reject(inbound, e))
}

/// User-visible response for a rejected admin or broadcast operation.
fn reject(inbound: &Inbound, err: FlowError) -> Vec<Action> {
    let chat = inbound.chat;
    debug!("Rejected {} from {}: {}", inbound.event.kind(), chat, err);

    match (&inbound.event, err) {
        (Event::Callback { callback_id, .. }, FlowError::PermissionDenied(_)) => {
            vec![Action::AnswerCallback {
                callback_id: callback_id.clone(),
                text: Some(texts::PERMISSION_DENIED_SHORT.to_string()),
            }]
        }
        (
            Event::Callback {
                callback_id,
                message_id,
                ..
            },
            _,
        ) => {
            let mut actions = vec![Action::AnswerCallback {
                callback_id: callback_id.clone(),
                text: Some(texts::BROADCAST_EMPTY_TOAST.to_string()),
            }];
            if let Some(message_id) = message_id {
                actions.push(Action::EditText {
                    chat,
                    message_id: *message_id,
                    text: texts::BROADCAST_EMPTY.to_string(),
                });
            }
            actions
        }
        (_, FlowError::PermissionDenied(_)) => vec![Action::Send(Delivery::new(
            chat,
            OutboundMessage::text(texts::PERMISSION_DENIED),
        ))],
        (_, FlowError::InvalidContentForState { .. }) => vec![Action::Send(Delivery::new(
            chat,
            OutboundMessage::html(texts::BROADCAST_ASK_CONTENT),
        ))],
        (_, FlowError::StaleOrMissingDraft) => Vec::new(),
    }
}
