pub mod telegram;

#[cfg(test)]
pub mod testing;

use async_trait::async_trait;
use tracing::warn;

use crate::error::SendError;
use crate::types::{CallbackAction, ChatIdentity, MediaRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextFormat {
    Plain,
    Html,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub action: CallbackAction,
}

impl Button {
    pub fn new(label: impl Into<String>, action: CallbackAction) -> Self {
        Self {
            label: label.into(),
            action,
        }
    }
}

/// Keyboard attached to an outbound message.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Markup {
    #[default]
    None,
    Inline(Vec<Vec<Button>>),
    /// Persistent reply keyboard made of plain-text labels.
    Reply(Vec<Vec<String>>),
    RemoveReply,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundMessage {
    Text {
        body: String,
        format: TextFormat,
        markup: Markup,
        reply_to: Option<i32>,
        link_preview: bool,
    },
    Photo {
        media: MediaRef,
        caption: Option<String>,
        format: TextFormat,
        markup: Markup,
    },
    Video {
        media: MediaRef,
        caption: Option<String>,
        format: TextFormat,
        markup: Markup,
    },
    Forward {
        from: ChatIdentity,
        message_id: i32,
    },
}

impl OutboundMessage {
    pub fn text(body: impl Into<String>) -> Self {
        OutboundMessage::Text {
            body: body.into(),
            format: TextFormat::Plain,
            markup: Markup::None,
            reply_to: None,
            link_preview: true,
        }
    }

    pub fn html(body: impl Into<String>) -> Self {
        OutboundMessage::text(body).with_format(TextFormat::Html)
    }

    pub fn photo(media: MediaRef, caption: Option<String>) -> Self {
        OutboundMessage::Photo {
            media,
            caption,
            format: TextFormat::Plain,
            markup: Markup::None,
        }
    }

    pub fn video(media: MediaRef, caption: Option<String>) -> Self {
        OutboundMessage::Video {
            media,
            caption,
            format: TextFormat::Plain,
            markup: Markup::None,
        }
    }

    pub fn with_format(mut self, new_format: TextFormat) -> Self {
        match &mut self {
            OutboundMessage::Text { format, .. }
            | OutboundMessage::Photo { format, .. }
            | OutboundMessage::Video { format, .. } => *format = new_format,
            OutboundMessage::Forward { .. } => {}
        }
        self
    }

    pub fn with_markup(mut self, new_markup: Markup) -> Self {
        match &mut self {
            OutboundMessage::Text { markup, .. }
            | OutboundMessage::Photo { markup, .. }
            | OutboundMessage::Video { markup, .. } => *markup = new_markup,
            OutboundMessage::Forward { .. } => {}
        }
        self
    }

    pub fn replying_to(mut self, message_id: Option<i32>) -> Self {
        if let OutboundMessage::Text { reply_to, .. } = &mut self {
            *reply_to = message_id;
        }
        self
    }

    pub fn without_link_preview(mut self) -> Self {
        if let OutboundMessage::Text { link_preview, .. } = &mut self {
            *link_preview = false;
        }
        self
    }

    /// Text body or caption, whichever the message carries.
    #[cfg(test)]
    pub fn body(&self) -> Option<&str> {
        match self {
            OutboundMessage::Text { body, .. } => Some(body),
            OutboundMessage::Photo { caption, .. } | OutboundMessage::Video { caption, .. } => {
                caption.as_deref()
            }
            OutboundMessage::Forward { .. } => None,
        }
    }
}

/// Send/receive primitives of the messaging platform.
#[async_trait]
pub trait MessageGateway: Send + Sync {
    async fn send(&self, to: ChatIdentity, message: &OutboundMessage) -> Result<(), SendError>;

    async fn edit_text(
        &self,
        chat: ChatIdentity,
        message_id: i32,
        text: &str,
    ) -> Result<(), SendError>;

    /// Strip the inline keyboard from a message that was already sent.
    async fn clear_markup(&self, chat: ChatIdentity, message_id: i32) -> Result<(), SendError>;

    async fn answer_callback(&self, callback_id: &str, text: Option<&str>)
        -> Result<(), SendError>;
}

/// One outbound message plus the simpler form to fall back to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub to: ChatIdentity,
    pub message: OutboundMessage,
    pub degraded: Option<OutboundMessage>,
}

impl Delivery {
    pub fn new(to: ChatIdentity, message: OutboundMessage) -> Self {
        Self {
            to,
            message,
            degraded: None,
        }
    }

    pub fn or_else(mut self, degraded: OutboundMessage) -> Self {
        self.degraded = Some(degraded);
        self
    }
}

/// Side effects decided by the conversation and broadcast flows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Send(Delivery),
    /// Deliver in order, stopping at the first failure and then sending
    /// `on_failure` if present.
    Chain {
        steps: Vec<Delivery>,
        on_failure: Option<Delivery>,
    },
    EditText {
        chat: ChatIdentity,
        message_id: i32,
        text: String,
    },
    ClearMarkup {
        chat: ChatIdentity,
        message_id: i32,
    },
    AnswerCallback {
        callback_id: String,
        text: Option<String>,
    },
}

/// Send a delivery, retrying once in its degraded form when it has one.
pub async fn deliver(gateway: &dyn MessageGateway, delivery: &Delivery) -> Result<(), SendError> {
    match gateway.send(delivery.to, &delivery.message).await {
        Ok(()) => Ok(()),
        Err(e) => match &delivery.degraded {
            Some(degraded) => {
                warn!(
                    "Send to {} failed ({}), falling back to simpler message",
                    delivery.to, e
                );
                gateway.send(delivery.to, degraded).await
            }
            None => Err(e),
        },
    }
}

/// Carry out actions in order. Failures are logged and never stop the
/// remaining actions.
pub async fn execute(gateway: &dyn MessageGateway, actions: &[Action]) {
    for action in actions {
        match action {
            Action::Send(delivery) => {
                if let Err(e) = deliver(gateway, delivery).await {
                    warn!("Dropping message to {}: {}", delivery.to, e);
                }
            }
            Action::Chain { steps, on_failure } => {
                for step in steps {
                    if let Err(e) = deliver(gateway, step).await {
                        warn!("Send to {} failed, aborting chain: {}", step.to, e);
                        if let Some(fallback) = on_failure {
                            if let Err(e) = deliver(gateway, fallback).await {
                                warn!("Failure notice to {} also failed: {}", fallback.to, e);
                            }
                        }
                        break;
                    }
                }
            }
            Action::EditText {
                chat,
                message_id,
                text,
            } => {
                if let Err(e) = gateway.edit_text(*chat, *message_id, text).await {
                    warn!("Failed to edit message {} in {}: {}", message_id, chat, e);
                }
            }
            Action::ClearMarkup { chat, message_id } => {
                if let Err(e) = gateway.clear_markup(*chat, *message_id).await {
                    warn!("Failed to clear keyboard of {} in {}: {}", message_id, chat, e);
                }
            }
            Action::AnswerCallback { callback_id, text } => {
                if let Err(e) = gateway.answer_callback(callback_id, text.as_deref()).await {
                    warn!("Failed to answer callback {}: {}", callback_id, e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{Recorded, RecordingGateway};
    use super::*;

    const USER: ChatIdentity = ChatIdentity(10);
    const ADMIN: ChatIdentity = ChatIdentity(1);

    #[tokio::test]
    async fn test_deliver_uses_degraded_form_on_failure() {
        let gateway = RecordingGateway::new();
        gateway.fail_photos();

        let delivery = Delivery::new(
            USER,
            OutboundMessage::photo(MediaRef::new("img"), Some("hi".to_string())),
        )
        .or_else(OutboundMessage::text("hi"));

        assert!(deliver(&gateway, &delivery).await.is_ok());
        assert_eq!(gateway.texts_to(USER).await, vec!["hi".to_string()]);
    }

    #[tokio::test]
    async fn test_deliver_without_fallback_reports_error() {
        let gateway = RecordingGateway::new();
        gateway.fail_for(USER).await;

        let delivery = Delivery::new(USER, OutboundMessage::text("hi"));
        assert!(deliver(&gateway, &delivery).await.is_err());
        assert!(gateway.sent().await.is_empty());
    }

    #[tokio::test]
    async fn test_chain_stops_and_notifies_on_failure() {
        let gateway = RecordingGateway::new();
        gateway.fail_for(ADMIN).await;

        let actions = vec![Action::Chain {
            steps: vec![
                Delivery::new(ADMIN, OutboundMessage::text("to admin")),
                Delivery::new(USER, OutboundMessage::text("confirmed")),
            ],
            on_failure: Some(Delivery::new(USER, OutboundMessage::text("sorry"))),
        }];
        execute(&gateway, &actions).await;

        assert_eq!(gateway.texts_to(USER).await, vec!["sorry".to_string()]);
    }

    #[tokio::test]
    async fn test_execute_continues_after_failed_action() {
        let gateway = RecordingGateway::new();
        gateway.fail_for(ADMIN).await;

        let actions = vec![
            Action::Send(Delivery::new(ADMIN, OutboundMessage::text("lost"))),
            Action::AnswerCallback {
                callback_id: "cb-1".to_string(),
                text: None,
            },
            Action::Send(Delivery::new(USER, OutboundMessage::text("kept"))),
        ];
        execute(&gateway, &actions).await;

        let sent = gateway.sent().await;
        assert_eq!(sent.len(), 2);
        assert!(matches!(&sent[0], Recorded::Callback { callback_id, .. } if callback_id == "cb-1"));
        assert_eq!(gateway.texts_to(USER).await, vec!["kept".to_string()]);
    }
}
