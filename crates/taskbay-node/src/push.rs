//! Push delivery collaborator: a device-token registry and a gateway
//! seam. Gateway failures prune the offending token and are otherwise
//! swallowed; the market core treats the whole call as best-effort.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use taskbay_market::PushDelivery;
use taskbay_types::{Notification, UserId};

/// Transport seam for the actual push provider (FCM/APNs/…).
#[async_trait]
pub trait PushGateway: Send + Sync {
    async fn send(&self, token: &str, notification: &Notification) -> anyhow::Result<()>;
}

/// Gateway that only logs. Default wiring when no provider is
/// configured.
pub struct LogPushGateway;

#[async_trait]
impl PushGateway for LogPushGateway {
    async fn send(&self, token: &str, notification: &Notification) -> anyhow::Result<()> {
        debug!(
            token = token,
            title = %notification.title,
            "Push (log-only gateway)"
        );
        Ok(())
    }
}

/// Registered device tokens per user.
#[derive(Clone, Default)]
pub struct DeviceRegistry {
    tokens: Arc<RwLock<HashMap<UserId, Vec<String>>>>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, user: UserId, token: impl Into<String>) {
        let token = token.into();
        let mut tokens = self.tokens.write().await;
        let entry = tokens.entry(user).or_default();
        if !entry.contains(&token) {
            entry.push(token);
        }
    }

    pub async fn unregister(&self, user: &UserId, token: &str) {
        let mut tokens = self.tokens.write().await;
        if let Some(entry) = tokens.get_mut(user) {
            entry.retain(|t| t != token);
        }
    }

    pub async fn tokens_for(&self, user: &UserId) -> Vec<String> {
        self.tokens
            .read()
            .await
            .get(user)
            .cloned()
            .unwrap_or_default()
    }
}

/// [`PushDelivery`] implementation over the registry and gateway.
pub struct PushDispatcher {
    registry: DeviceRegistry,
    gateway: Arc<dyn PushGateway>,
}

impl PushDispatcher {
    pub fn new(registry: DeviceRegistry, gateway: Arc<dyn PushGateway>) -> Self {
        Self { registry, gateway }
    }
}

#[async_trait]
impl PushDelivery for PushDispatcher {
    async fn dispatch(
        &self,
        recipient: &UserId,
        notification: &Notification,
    ) -> anyhow::Result<()> {
        for token in self.registry.tokens_for(recipient).await {
            if let Err(e) = self.gateway.send(&token, notification).await {
                warn!(
                    recipient = %recipient,
                    token = %token,
                    error = %e,
                    "Push send failed, pruning token"
                );
                self.registry.unregister(recipient, &token).await;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskbay_types::NotificationKind;

    struct RejectingGateway;

    #[async_trait]
    impl PushGateway for RejectingGateway {
        async fn send(&self, token: &str, _notification: &Notification) -> anyhow::Result<()> {
            if token.starts_with("bad") {
                anyhow::bail!("invalid token")
            }
            Ok(())
        }
    }

    fn sample(recipient: UserId) -> Notification {
        Notification::new(
            recipient,
            None,
            NotificationKind::BidPlaced,
            "t",
            "m",
            None,
            None,
            serde_json::json!({}),
        )
    }

    #[tokio::test]
    async fn failed_tokens_are_pruned() {
        let registry = DeviceRegistry::new();
        let user = UserId::from_bytes([6u8; 32]);
        registry.register(user, "good-1").await;
        registry.register(user, "bad-1").await;

        let dispatcher = PushDispatcher::new(registry.clone(), Arc::new(RejectingGateway));
        dispatcher.dispatch(&user, &sample(user)).await.unwrap();

        let remaining = registry.tokens_for(&user).await;
        assert_eq!(remaining, vec!["good-1".to_string()]);
    }

    #[tokio::test]
    async fn register_is_idempotent() {
        let registry = DeviceRegistry::new();
        let user = UserId::from_bytes([6u8; 32]);
        registry.register(user, "tok").await;
        registry.register(user, "tok").await;
        assert_eq!(registry.tokens_for(&user).await.len(), 1);
    }
}
