use crate::id::{BidId, TaskId, UserId};
use crate::money::Amount;
use crate::Lifecycle;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Bid status. A bid is mutable only while `Pending`; every other state
/// is terminal. Execution progress lives on the parent task, not here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BidStatus {
    Pending,
    Accepted,
    Rejected,
    Cancelled,
}

impl Lifecycle for BidStatus {
    fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    fn can_transition_to(&self, next: &Self) -> bool {
        matches!(self, Self::Pending) && !matches!(next, Self::Pending)
    }
}

impl fmt::Display for BidStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BidStatus::Pending => "pending",
            BidStatus::Accepted => "accepted",
            BidStatus::Rejected => "rejected",
            BidStatus::Cancelled => "cancelled",
        };
        write!(f, "{}", s)
    }
}

/// A tasker's offer to perform an open task.
///
/// The tasker's name and email are denormalized onto the bid at placement
/// time so bid listings can show a contact summary without a user lookup;
/// the email is redacted for viewers other than the task owner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bid {
    pub id: BidId,
    pub task: TaskId,
    pub tasker: UserId,
    pub tasker_name: String,
    pub tasker_email: String,
    pub amount: Amount,
    pub message: String,
    pub estimated_hours: Option<u32>,
    pub status: BidStatus,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Bid {
    pub fn new(
        task: TaskId,
        tasker: &crate::Actor,
        amount: Amount,
        message: impl Into<String>,
        estimated_hours: Option<u32>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: BidId::generate(&task, &tasker.id, now.timestamp_millis()),
            task,
            tasker: tasker.id,
            tasker_name: tasker.name.clone(),
            tasker_email: tasker.email.clone(),
            amount,
            message: message.into(),
            estimated_hours,
            status: BidStatus::Pending,
            rejection_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == BidStatus::Pending
    }
}
