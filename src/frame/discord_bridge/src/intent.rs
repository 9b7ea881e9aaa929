use crate::ids::{ContentUri, UserId};
use anyhow::Result as AnyResult;
use async_trait::async_trait;
use std::sync::Arc;

/// Homeserver client acting as one ghost user.
#[async_trait]
pub trait Intent: Send + Sync {
    fn user_id(&self) -> &UserId;

    /// Registers the ghost if needed. Already registered is success.
    async fn ensure_registered(&self) -> AnyResult<()>;
    async fn set_display_name(&self, name: &str) -> AnyResult<()>;
    /// An empty uri clears the avatar.
    async fn set_avatar_url(&self, uri: &ContentUri) -> AnyResult<()>;
    async fn upload_media(&self, data: Vec<u8>, mime: &str) -> AnyResult<ContentUri>;
}

pub trait Appservice: Send + Sync {
    fn intent(&self, user_id: &UserId) -> Arc<dyn Intent>;

    /// Intent acting as a real local account that enabled double puppeting.
    fn double_puppet_intent(&self, user_id: &UserId) -> Option<Arc<dyn Intent>> {
        let _ = user_id;
        None
    }
}
