use thiserror::Error;

use crate::types::ChatIdentity;

/// Rejections the conversation and broadcast flows hand back to the router,
/// which turns them into the user-visible response.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FlowError {
    #[error("chat {0} is not allowed to use admin operations")]
    PermissionDenied(ChatIdentity),

    #[error("expected {expected}, got {got}")]
    InvalidContentForState {
        expected: &'static str,
        got: &'static str,
    },

    #[error("no broadcast draft with content to resolve")]
    StaleOrMissingDraft,
}

/// A single outbound request that did not go through.
#[derive(Debug, Error)]
pub enum SendError {
    #[error("telegram request failed: {0}")]
    Transport(#[from] teloxide::RequestError),
}
