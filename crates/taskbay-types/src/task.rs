use crate::id::{TaskId, UserId};
use crate::money::Amount;
use crate::policy::FeeBreakdown;
use crate::Lifecycle;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Task lifecycle status.
///
/// Legal transitions:
/// `Open -> Assigned -> InProgress -> CompletionRequested -> Completed`,
/// with `CompletionRequested -> InProgress` on a rejected completion
/// request and `Cancelled` reachable from `Open`, `Assigned`, and
/// `InProgress`. Anything else is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TaskStatus {
    Open,
    Assigned,
    InProgress,
    CompletionRequested,
    Completed,
    Cancelled,
}

impl Lifecycle for TaskStatus {
    fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    fn can_transition_to(&self, next: &Self) -> bool {
        use TaskStatus::*;
        match (self, next) {
            (Open, Assigned) => true,
            (Open, Cancelled) => true,

            (Assigned, InProgress) => true,
            (Assigned, Cancelled) => true,

            (InProgress, CompletionRequested) => true,
            (InProgress, Cancelled) => true,

            // Customer confirms or sends the tasker back to work
            (CompletionRequested, Completed) => true,
            (CompletionRequested, InProgress) => true,

            // Terminal states never move again
            (Completed, _) | (Cancelled, _) => false,

            _ => false,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Open => "open",
            TaskStatus::Assigned => "assigned",
            TaskStatus::InProgress => "inProgress",
            TaskStatus::CompletionRequested => "completionRequested",
            TaskStatus::Completed => "completed",
            TaskStatus::Cancelled => "cancelled",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(TaskStatus::Open),
            "assigned" => Ok(TaskStatus::Assigned),
            "inProgress" => Ok(TaskStatus::InProgress),
            "completionRequested" => Ok(TaskStatus::CompletionRequested),
            "completed" => Ok(TaskStatus::Completed),
            "cancelled" => Ok(TaskStatus::Cancelled),
            other => Err(format!("unknown task status: {}", other)),
        }
    }
}

/// A unit of work posted by a customer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    /// Owning customer. Immutable after creation.
    pub customer: UserId,
    /// Set on assignment; present iff status is Assigned, InProgress,
    /// CompletionRequested, or Completed.
    pub assigned_to: Option<UserId>,

    pub title: String,
    pub description: String,
    pub category: String,
    pub subcategory: Option<String>,
    pub address: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub required_at: DateTime<Utc>,
    pub duration_hours: u32,
    pub is_urgent: bool,
    /// Opaque attachment references from the upload collaborator.
    pub images: Vec<String>,

    pub budget: Amount,
    pub fees: FeeBreakdown,

    pub status: TaskStatus,

    // Completion workflow
    pub completion_requested_at: Option<DateTime<Utc>>,
    pub completion_requested_by: Option<UserId>,
    pub completion_note: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub customer_feedback: Option<String>,
    pub tasker_feedback: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// True while the customer may still edit or delete the task.
    pub fn is_editable(&self) -> bool {
        self.status == TaskStatus::Open
    }

    pub fn is_assigned_to(&self, user: &UserId) -> bool {
        self.assigned_to.as_ref() == Some(user)
    }

    pub fn is_owned_by(&self, user: &UserId) -> bool {
        &self.customer == user
    }

    /// The assigned-iff-active invariant from the data model.
    pub fn assignment_invariant_holds(&self) -> bool {
        use TaskStatus::*;
        let requires_assignee = matches!(
            self.status,
            Assigned | InProgress | CompletionRequested | Completed
        );
        requires_assignee == self.assigned_to.is_some()
    }

    /// Clear the completion-request bookkeeping after the customer
    /// rejects a completion request.
    pub fn clear_completion_request(&mut self) {
        self.completion_requested_at = None;
        self.completion_requested_by = None;
        self.completion_note = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_do_not_move() {
        assert!(!TaskStatus::Completed.can_transition_to(&TaskStatus::Cancelled));
        assert!(!TaskStatus::Cancelled.can_transition_to(&TaskStatus::Open));
    }

    #[test]
    fn completion_request_can_be_rejected() {
        assert!(TaskStatus::CompletionRequested.can_transition_to(&TaskStatus::InProgress));
        assert!(TaskStatus::CompletionRequested.can_transition_to(&TaskStatus::Completed));
    }

    #[test]
    fn cancel_is_not_reachable_from_completion_request() {
        assert!(!TaskStatus::CompletionRequested.can_transition_to(&TaskStatus::Cancelled));
    }

    #[test]
    fn no_skipping_states() {
        assert!(!TaskStatus::Open.can_transition_to(&TaskStatus::InProgress));
        assert!(!TaskStatus::Assigned.can_transition_to(&TaskStatus::Completed));
    }

    #[test]
    fn status_string_round_trip() {
        for status in [
            TaskStatus::Open,
            TaskStatus::Assigned,
            TaskStatus::InProgress,
            TaskStatus::CompletionRequested,
            TaskStatus::Completed,
            TaskStatus::Cancelled,
        ] {
            assert_eq!(TaskStatus::from_str(&status.to_string()).unwrap(), status);
        }
    }
}
