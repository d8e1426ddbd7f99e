use crate::id::{ReviewId, TaskId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A customer's post-completion rating of a tasker. Immutable once
/// created; unique per (task, reviewer) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    pub id: ReviewId,
    pub reviewer: UserId,
    pub tasker: UserId,
    pub task: TaskId,
    /// Integer rating in [1, 5].
    pub rating: u8,
    pub comment: Option<String>,
    /// Denormalized from the task at review time.
    pub task_title: String,
    pub created_at: DateTime<Utc>,
}

impl Review {
    pub fn new(
        reviewer: UserId,
        tasker: UserId,
        task: TaskId,
        rating: u8,
        comment: Option<String>,
        task_title: impl Into<String>,
    ) -> Self {
        Self {
            id: ReviewId::generate(&task, &reviewer),
            reviewer,
            tasker,
            task,
            rating,
            comment,
            task_title: task_title.into(),
            created_at: Utc::now(),
        }
    }
}
