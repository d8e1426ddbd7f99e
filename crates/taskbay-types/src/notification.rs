use crate::id::{BidId, NotificationId, TaskId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Closed set of notification kinds emitted by lifecycle transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    BidPlaced,
    BidAccepted,
    BidRejected,
    TaskAssigned,
    TaskStarted,
    CompletionRequested,
    CompletionConfirmed,
    CompletionRejected,
    TaskCancelled,
    ReviewReceived,
}

/// A persisted notification record. Created as a side effect of a
/// lifecycle transition; only `is_read` ever changes afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub recipient: UserId,
    pub sender: Option<UserId>,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub task: Option<TaskId>,
    pub bid: Option<BidId>,
    /// Free-form structured payload for front ends.
    pub data: serde_json::Value,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        recipient: UserId,
        sender: Option<UserId>,
        kind: NotificationKind,
        title: impl Into<String>,
        message: impl Into<String>,
        task: Option<TaskId>,
        bid: Option<BidId>,
        data: serde_json::Value,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: NotificationId::generate(&recipient, now.timestamp_millis()),
            recipient,
            sender,
            kind,
            title: title.into(),
            message: message.into(),
            task,
            bid,
            data,
            is_read: false,
            created_at: now,
        }
    }

    pub fn mark_read(&mut self) {
        self.is_read = true;
    }
}
