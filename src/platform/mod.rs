pub mod telegram;

use crate::types::{CallbackAction, ChatIdentity, Command, MediaKind, MediaRef};

/// A decoded inbound event, independent of the transport it arrived on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Command(Command),
    Text(String),
    Media {
        kind: MediaKind,
        media: MediaRef,
        caption: Option<String>,
    },
    Callback {
        action: CallbackAction,
        callback_id: String,
        /// Message the clicked keyboard belongs to.
        message_id: Option<i32>,
    },
    /// Content the bot has no use for (stickers, locations, ...).
    Other,
}

impl Event {
    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Event::Command(_) => "command",
            Event::Text(_) => "text",
            Event::Media { .. } => "media",
            Event::Callback { .. } => "callback",
            Event::Other => "other",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sender {
    pub username: Option<String>,
}

impl Sender {
    pub fn handle(&self) -> String {
        match &self.username {
            Some(name) => format!("@{name}"),
            None => "none".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inbound {
    pub chat: ChatIdentity,
    pub sender: Sender,
    /// Id of the inbound message itself (absent for callbacks).
    pub message_id: Option<i32>,
    pub event: Event,
}

impl Inbound {
    pub fn new(chat: ChatIdentity, event: Event) -> Self {
        Self {
            chat,
            sender: Sender::default(),
            message_id: None,
            event,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sender_handle() {
        let named = Sender {
            username: Some("alice".to_string()),
        };
        assert_eq!(named.handle(), "@alice");
        assert_eq!(Sender::default().handle(), "none");
    }

    #[test]
    fn test_event_kind() {
        assert_eq!(Event::Text("hi".to_string()).kind(), "text");
        assert_eq!(Event::Command(Command::Start).kind(), "command");
        assert_eq!(Event::Other.kind(), "other");
    }
}
