use crate::types::MediaRef;

/// Where a chat is in the registration funnel. Absent entries are `Idle`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConversationState {
    #[default]
    Idle,
    AwaitingUsername,
    AwaitingReceipt {
        account_name: String,
    },
    AwaitingGameChoice {
        receipt: MediaRef,
        account_name: String,
    },
}

impl ConversationState {
    pub fn name(&self) -> &'static str {
        match self {
            ConversationState::Idle => "idle",
            ConversationState::AwaitingUsername => "awaiting_username",
            ConversationState::AwaitingReceipt { .. } => "awaiting_receipt",
            ConversationState::AwaitingGameChoice { .. } => "awaiting_game_choice",
        }
    }
}

/// Everything tracked for one chat. Kept under a single per-chat lock so the
/// media reference mode and the funnel state always change together.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChatSession {
    pub state: ConversationState,
    /// `/getid` is active: media is echoed back instead of advancing.
    pub capturing: bool,
}
