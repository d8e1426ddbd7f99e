//! Notification emission.
//!
//! Lifecycle transitions call [`NotificationEmitter::emit`], which
//! persists the record and then attempts real-time and push delivery
//! through injected capabilities. Both deliveries are best-effort:
//! failures are logged and swallowed, and the triggering mutation never
//! observes them.

use crate::error::{MarketError, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};
use taskbay_storage::StorageEngine;
use taskbay_types::{Notification, NotificationId, UserId};

/// Immediate delivery to a connected client. Implementations look the
/// recipient up in a presence map and silently no-op when there is no
/// live connection.
#[async_trait]
pub trait RealtimeDelivery: Send + Sync {
    /// Returns whether the notification reached a live connection.
    async fn deliver(&self, recipient: &UserId, notification: &Notification) -> bool;
}

/// Push delivery to the recipient's registered devices.
#[async_trait]
pub trait PushDelivery: Send + Sync {
    async fn dispatch(&self, recipient: &UserId, notification: &Notification)
        -> anyhow::Result<()>;
}

/// Delivery capability that drops everything. Used when the node runs
/// without a real-time or push integration, and in tests.
pub struct NoDelivery;

#[async_trait]
impl RealtimeDelivery for NoDelivery {
    async fn deliver(&self, _recipient: &UserId, _notification: &Notification) -> bool {
        false
    }
}

#[async_trait]
impl PushDelivery for NoDelivery {
    async fn dispatch(
        &self,
        _recipient: &UserId,
        _notification: &Notification,
    ) -> anyhow::Result<()> {
        Ok(())
    }
}

pub struct NotificationEmitter {
    storage: Arc<StorageEngine>,
    realtime: Arc<dyn RealtimeDelivery>,
    push: Arc<dyn PushDelivery>,
}

impl NotificationEmitter {
    pub fn new(
        storage: Arc<StorageEngine>,
        realtime: Arc<dyn RealtimeDelivery>,
        push: Arc<dyn PushDelivery>,
    ) -> Self {
        Self {
            storage,
            realtime,
            push,
        }
    }

    /// Persist and deliver. Infallible by contract: every failure path
    /// is logged and swallowed so the triggering command never fails on
    /// notification plumbing.
    pub async fn emit(&self, notification: Notification) {
        if let Err(e) = self.storage.put_notification(&notification).await {
            warn!(
                recipient = %notification.recipient,
                kind = ?notification.kind,
                error = %e,
                "Failed to persist notification"
            );
        }

        let delivered = self
            .realtime
            .deliver(&notification.recipient, &notification)
            .await;
        debug!(
            recipient = %notification.recipient,
            kind = ?notification.kind,
            delivered,
            "Real-time delivery attempted"
        );

        if let Err(e) = self
            .push
            .dispatch(&notification.recipient, &notification)
            .await
        {
            warn!(
                recipient = %notification.recipient,
                kind = ?notification.kind,
                error = %e,
                "Push delivery failed"
            );
        }
    }

    /// All notifications for a recipient, newest first.
    pub async fn for_user(&self, user: &UserId) -> Result<Vec<Notification>> {
        let mut notifications = self.storage.notifications_for(user).await?;
        notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(notifications)
    }

    /// Flip the read flag. Only the recipient may do this.
    pub async fn mark_read(&self, user: &UserId, id: &NotificationId) -> Result<Notification> {
        let mut notification = self
            .storage
            .get_notification(id)
            .await?
            .ok_or_else(|| MarketError::NotFound(format!("notification {}", id)))?;

        if &notification.recipient != user {
            return Err(MarketError::Forbidden(
                "notification belongs to another user".into(),
            ));
        }

        notification.mark_read();
        self.storage.put_notification(&notification).await?;
        Ok(notification)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskbay_storage::{BackendType, StorageConfig};
    use taskbay_types::NotificationKind;

    struct FailingPush;

    #[async_trait]
    impl PushDelivery for FailingPush {
        async fn dispatch(
            &self,
            _recipient: &UserId,
            _notification: &Notification,
        ) -> anyhow::Result<()> {
            anyhow::bail!("gateway unreachable")
        }
    }

    fn engine() -> Arc<StorageEngine> {
        Arc::new(
            StorageEngine::new(StorageConfig {
                backend_type: BackendType::Memory,
            })
            .unwrap(),
        )
    }

    fn sample(recipient: UserId) -> Notification {
        Notification::new(
            recipient,
            None,
            NotificationKind::BidPlaced,
            "New bid",
            "Someone bid on your task",
            None,
            None,
            serde_json::json!({}),
        )
    }

    #[tokio::test]
    async fn emit_survives_push_failure() {
        let storage = engine();
        let emitter = NotificationEmitter::new(
            storage.clone(),
            Arc::new(NoDelivery),
            Arc::new(FailingPush),
        );
        let recipient = UserId::from_bytes([4u8; 32]);

        // Must not panic or surface the push failure
        emitter.emit(sample(recipient)).await;

        let stored = emitter.for_user(&recipient).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert!(!stored[0].is_read);
    }

    #[tokio::test]
    async fn mark_read_is_recipient_only() {
        let emitter =
            NotificationEmitter::new(engine(), Arc::new(NoDelivery), Arc::new(NoDelivery));
        let recipient = UserId::from_bytes([4u8; 32]);
        let stranger = UserId::from_bytes([5u8; 32]);

        emitter.emit(sample(recipient)).await;
        let id = emitter.for_user(&recipient).await.unwrap()[0].id;

        let err = emitter.mark_read(&stranger, &id).await.unwrap_err();
        assert!(matches!(err, MarketError::Forbidden(_)));

        let updated = emitter.mark_read(&recipient, &id).await.unwrap();
        assert!(updated.is_read);
    }
}
