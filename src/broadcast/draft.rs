use crate::gateway::OutboundMessage;
use crate::platform::Event;
use crate::texts;
use crate::types::{MediaKind, MediaRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DraftMode {
    #[default]
    Idle,
    AwaitingContent,
}

/// Content an admin is about to broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BroadcastPayload {
    Text {
        body: String,
    },
    Photo {
        media: MediaRef,
        caption: Option<String>,
    },
    Video {
        media: MediaRef,
        caption: Option<String>,
    },
}

/// Per-admin authoring state. The default value means "no draft".
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BroadcastDraft {
    pub mode: DraftMode,
    pub payload: Option<BroadcastPayload>,
}

impl BroadcastDraft {
    pub fn awaiting_content() -> Self {
        Self {
            mode: DraftMode::AwaitingContent,
            payload: None,
        }
    }
}

fn clean_caption(caption: &Option<String>) -> Option<String> {
    caption
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
}

impl BroadcastPayload {
    /// Text, photo or video content; `None` for anything else, including
    /// whitespace-only text.
    pub fn from_event(event: &Event) -> Option<Self> {
        match event {
            Event::Text(body) => {
                let body = body.trim();
                (!body.is_empty()).then(|| BroadcastPayload::Text {
                    body: body.to_string(),
                })
            }
            Event::Media {
                kind: MediaKind::Photo,
                media,
                caption,
            } => Some(BroadcastPayload::Photo {
                media: media.clone(),
                caption: clean_caption(caption),
            }),
            Event::Media {
                kind: MediaKind::Video,
                media,
                caption,
            } => Some(BroadcastPayload::Video {
                media: media.clone(),
                caption: clean_caption(caption),
            }),
            _ => None,
        }
    }

    /// What each recipient receives.
    pub fn message(&self) -> OutboundMessage {
        match self {
            BroadcastPayload::Text { body } => OutboundMessage::text(body).without_link_preview(),
            BroadcastPayload::Photo { media, caption } => {
                OutboundMessage::photo(media.clone(), caption.clone())
            }
            BroadcastPayload::Video { media, caption } => {
                OutboundMessage::video(media.clone(), caption.clone())
            }
        }
    }

    /// HTML preview shown in the confirmation prompt.
    pub fn preview(&self) -> String {
        match self {
            BroadcastPayload::Text { body } => texts::preview_text(body),
            BroadcastPayload::Photo { caption, .. } => {
                texts::preview_media("🖼️ <b>Photo</b>", caption.as_deref())
            }
            BroadcastPayload::Video { caption, .. } => {
                texts::preview_media("🎬 <b>Video</b>", caption.as_deref())
            }
        }
    }
}
