use crate::ids::ContentUri;
use anyhow::Result as AnyResult;
use async_trait::async_trait;
use log::*;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Profile change of a ghost, pushed into the DM rooms it is the other side of.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PuppetMetaUpdate {
    Name(String),
    Avatar {
        avatar_id: String,
        avatar_url: ContentUri,
    },
}

/// The part of a direct-message portal a puppet is allowed to touch.
#[async_trait]
pub trait DirectPortal: Send + Sync {
    fn key(&self) -> String;

    /// Held by the portal for the whole room creation sequence.
    fn room_create_lock(&self) -> &Mutex<()>;

    /// Applies the change to in-memory portal state, returns whether
    /// anything visible changed.
    fn apply_puppet_meta(&self, update: &PuppetMetaUpdate) -> bool;

    async fn update(&self) -> AnyResult<()>;
    async fn update_bridge_info(&self) -> AnyResult<()>;
}

pub trait PortalDirectory: Send + Sync {
    fn dm_portals_with(&self, remote_id: &str) -> Vec<Arc<dyn DirectPortal>>;
}

/// Pushes a ghost profile change into every DM portal with `remote_id`.
/// Returns how many portals reported a change.
pub async fn update_portal_meta(
    portals: Arc<dyn PortalDirectory>,
    remote_id: String,
    update: PuppetMetaUpdate,
) -> usize {
    let mut changed_count = 0;
    for portal in portals.dm_portals_with(&remote_id) {
        let changed = {
            let _creating = portal.room_create_lock().lock().await;
            portal.apply_puppet_meta(&update)
        };
        if !changed {
            continue;
        }

        changed_count += 1;
        if let Err(err) = portal.update().await {
            warn!("failed to save portal {} after puppet {} update: {}", portal.key(), remote_id, err);
        }
        if let Err(err) = portal.update_bridge_info().await {
            warn!("failed to update bridge info of portal {}: {}", portal.key(), err);
        }
    }
    changed_count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{MockPortal, MockPortalDirectory};
    use std::time::Duration;

    #[tokio::test]
    async fn only_changed_portals_are_saved() {
        let directory = Arc::new(MockPortalDirectory::new());
        let stale = directory.add_dm("123", "dm-a");
        let current = directory.add_dm("123", "dm-b");
        current.set_name("Alice");
        directory.add_dm("456", "dm-c");

        let changed = update_portal_meta(
            directory.clone(),
            "123".to_string(),
            PuppetMetaUpdate::Name("Alice".to_string()),
        )
        .await;

        assert_eq!(changed, 1);
        assert_eq!(stale.name(), "Alice");
        assert_eq!(stale.update_calls(), 1);
        assert_eq!(stale.bridge_info_calls(), 1);
        assert_eq!(current.update_calls(), 0);
        assert_eq!(current.bridge_info_calls(), 0);
    }

    #[tokio::test]
    async fn waits_for_room_creation() {
        let directory = Arc::new(MockPortalDirectory::new());
        let portal: Arc<MockPortal> = directory.add_dm("123", "dm-a");

        let creating = portal.room_create_lock().lock().await;
        let task = tokio::spawn(update_portal_meta(
            directory.clone(),
            "123".to_string(),
            PuppetMetaUpdate::Name("Bob".to_string()),
        ));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(portal.name(), "");
        drop(creating);

        assert_eq!(task.await.unwrap(), 1);
        assert_eq!(portal.name(), "Bob");
    }

    #[tokio::test]
    async fn failed_save_still_refreshes_bridge_info() {
        let directory = Arc::new(MockPortalDirectory::new());
        let portal = directory.add_dm("123", "dm-a");
        portal.set_fail_update(true);

        update_portal_meta(
            directory.clone(),
            "123".to_string(),
            PuppetMetaUpdate::Name("Carol".to_string()),
        )
        .await;
        assert_eq!(portal.update_calls(), 1);
        assert_eq!(portal.bridge_info_calls(), 1);
    }
}
