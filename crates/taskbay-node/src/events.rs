//! Event bus and presence tracking for real-time delivery.
//!
//! Front ends (WebSocket/SSE bridges) subscribe to the broadcast bus and
//! register their users in the presence map. The market core only sees
//! the [`RealtimeDelivery`] capability: deliver if the recipient has a
//! live connection, silently no-op otherwise, never retry.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::debug;
use taskbay_market::RealtimeDelivery;
use taskbay_types::{Notification, UserId};

/// Buffered events per subscriber before old events are dropped.
const EVENT_BUFFER: usize = 256;

/// Events published to connected clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum MarketEvent {
    NotificationCreated {
        recipient: String,
        kind: taskbay_types::NotificationKind,
        title: String,
        message: String,
        task: Option<String>,
        bid: Option<String>,
        #[serde(with = "chrono::serde::ts_seconds")]
        timestamp: DateTime<Utc>,
    },
}

/// Broadcast bus for market events.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<MarketEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_BUFFER);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MarketEvent> {
        self.tx.subscribe()
    }

    pub fn publish(&self, event: MarketEvent) {
        // A send error only means nobody is subscribed right now.
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Connection-id map for currently connected users.
#[derive(Clone, Default)]
pub struct PresenceRegistry {
    connections: Arc<RwLock<HashMap<UserId, String>>>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn connect(&self, user: UserId, connection_id: impl Into<String>) {
        self.connections.write().await.insert(user, connection_id.into());
    }

    pub async fn disconnect(&self, user: &UserId) {
        self.connections.write().await.remove(user);
    }

    pub async fn lookup(&self, user: &UserId) -> Option<String> {
        self.connections.read().await.get(user).cloned()
    }
}

/// [`RealtimeDelivery`] over the event bus, gated by presence.
pub struct BusRealtime {
    bus: EventBus,
    presence: PresenceRegistry,
}

impl BusRealtime {
    pub fn new(bus: EventBus, presence: PresenceRegistry) -> Self {
        Self { bus, presence }
    }
}

#[async_trait]
impl RealtimeDelivery for BusRealtime {
    async fn deliver(&self, recipient: &UserId, notification: &Notification) -> bool {
        if self.presence.lookup(recipient).await.is_none() {
            debug!(recipient = %recipient, "No live connection, skipping real-time delivery");
            return false;
        }

        self.bus.publish(MarketEvent::NotificationCreated {
            recipient: recipient.to_hex(),
            kind: notification.kind,
            title: notification.title.clone(),
            message: notification.message.clone(),
            task: notification.task.map(|t| t.to_hex()),
            bid: notification.bid.map(|b| b.to_hex()),
            timestamp: notification.created_at,
        });
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskbay_types::NotificationKind;

    fn sample(recipient: UserId) -> Notification {
        Notification::new(
            recipient,
            None,
            NotificationKind::TaskAssigned,
            "t",
            "m",
            None,
            None,
            serde_json::json!({}),
        )
    }

    #[tokio::test]
    async fn delivery_requires_presence() {
        let bus = EventBus::new();
        let presence = PresenceRegistry::new();
        let realtime = BusRealtime::new(bus.clone(), presence.clone());
        let user = UserId::from_bytes([5u8; 32]);

        let mut rx = bus.subscribe();

        assert!(!realtime.deliver(&user, &sample(user)).await);

        presence.connect(user, "conn-1").await;
        assert!(realtime.deliver(&user, &sample(user)).await);

        let event = rx.recv().await.unwrap();
        let MarketEvent::NotificationCreated { recipient, .. } = event;
        assert_eq!(recipient, user.to_hex());

        presence.disconnect(&user).await;
        assert!(!realtime.deliver(&user, &sample(user)).await);
    }
}
