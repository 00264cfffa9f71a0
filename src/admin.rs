use std::collections::BTreeSet;

use tokio::sync::RwLock;
use tracing::info;

use crate::error::FlowError;
use crate::types::ChatIdentity;

/// Chat identities allowed to use admin-only operations.
#[derive(Default)]
pub struct AdminSet {
    ids: RwLock<BTreeSet<ChatIdentity>>,
}

impl AdminSet {
    pub async fn contains(&self, chat: ChatIdentity) -> bool {
        self.ids.read().await.contains(&chat)
    }

    /// `Ok` for admins, `PermissionDenied` for everyone else.
    pub async fn check(&self, chat: ChatIdentity) -> Result<(), FlowError> {
        if self.contains(chat).await {
            Ok(())
        } else {
            Err(FlowError::PermissionDenied(chat))
        }
    }

    pub async fn members(&self) -> Vec<ChatIdentity> {
        self.ids.read().await.iter().copied().collect()
    }

    pub async fn grant(&self, chat: ChatIdentity) {
        if self.ids.write().await.insert(chat) {
            info!("Granted admin rights to {}", chat);
        }
    }
}
