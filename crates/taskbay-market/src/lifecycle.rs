//! Task lifecycle state machine.
//!
//! Owns every status transition a task can make, from creation through
//! assignment, execution, the completion-request workflow, and
//! cancellation. Transition legality lives in
//! [`TaskStatus::can_transition_to`]; actor capability lives in
//! [`crate::authz::can_act`]; this manager sequences the two, persists
//! the result, and notifies the counterpart.

use crate::authz::{can_act, TaskAction};
use crate::directory::CategoryDirectory;
use crate::error::{MarketError, Result};
use crate::fees::{compute_fees, FeePolicyManager};
use crate::notify::NotificationEmitter;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::info;
use taskbay_storage::StorageEngine;
use taskbay_types::{
    Actor, Amount, BidStatus, Lifecycle, Notification, NotificationKind, Role, Task, TaskId,
    TaskStatus, UserId,
};

/// Input for creating a task.
#[derive(Debug, Clone)]
pub struct TaskDraft {
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
    pub images: Vec<String>,
    pub budget: Amount,
}

/// Partial update applied to an open task.
#[derive(Debug, Clone, Default)]
pub struct TaskChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub subcategory: Option<Option<String>>,
    pub address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub required_at: Option<DateTime<Utc>>,
    pub duration_hours: Option<u32>,
    pub is_urgent: Option<bool>,
    pub images: Option<Vec<String>>,
    pub budget: Option<Amount>,
}

pub struct TaskLifecycle {
    storage: Arc<StorageEngine>,
    fees: Arc<FeePolicyManager>,
    emitter: Arc<NotificationEmitter>,
    categories: Arc<dyn CategoryDirectory>,
}

impl TaskLifecycle {
    pub fn new(
        storage: Arc<StorageEngine>,
        fees: Arc<FeePolicyManager>,
        emitter: Arc<NotificationEmitter>,
        categories: Arc<dyn CategoryDirectory>,
    ) -> Self {
        Self {
            storage,
            fees,
            emitter,
            categories,
        }
    }

    /// Create an open task owned by the acting customer, with its fee
    /// snapshot computed from the current policy.
    pub async fn create_task(&self, actor: &Actor, draft: TaskDraft) -> Result<Task> {
        if actor.role != Role::Customer {
            return Err(MarketError::Forbidden("only customers may post tasks".into()));
        }
        if draft.title.trim().is_empty() {
            return Err(MarketError::Validation("title must not be empty".into()));
        }
        if draft.budget.is_zero() {
            return Err(MarketError::Validation("budget must be positive".into()));
        }
        self.check_categories(&draft.category, draft.subcategory.as_deref())
            .await?;

        let policy = self.fees.current().await?;
        let fees = compute_fees(draft.budget, &policy);

        let now = Utc::now();
        let task = Task {
            id: TaskId::generate(&actor.id, &draft.title, now.timestamp_millis()),
            customer: actor.id,
            assigned_to: None,
            title: draft.title,
            description: draft.description,
            category: draft.category,
            subcategory: draft.subcategory,
            address: draft.address,
            latitude: draft.latitude,
            longitude: draft.longitude,
            required_at: draft.required_at,
            duration_hours: draft.duration_hours,
            is_urgent: draft.is_urgent,
            images: draft.images,
            budget: draft.budget,
            fees,
            status: TaskStatus::Open,
            completion_requested_at: None,
            completion_requested_by: None,
            completion_note: None,
            started_at: None,
            completed_at: None,
            customer_feedback: None,
            tasker_feedback: None,
            created_at: now,
            updated_at: now,
        };
        self.storage.put_task(&task).await?;

        info!(
            task = %task.id,
            customer = %actor.id,
            budget = %task.budget,
            urgent = task.is_urgent,
            "📋 Task created"
        );
        Ok(task)
    }

    /// Edit an open task. Admins may edit regardless of status. A budget
    /// change recomputes the fee snapshot from the current policy.
    pub async fn update_task(
        &self,
        actor: &Actor,
        task_id: &TaskId,
        changes: TaskChanges,
    ) -> Result<Task> {
        let mut task = self.storage.require_task(task_id).await?;
        if !can_act(actor, &task, TaskAction::Update) {
            return Err(MarketError::Forbidden("not your task".into()));
        }
        if !task.is_editable() && !actor.is_admin() {
            return Err(MarketError::invalid_state("updateTask", task.status));
        }

        if changes.category.is_some() || changes.subcategory.is_some() {
            let category = changes.category.clone().unwrap_or_else(|| task.category.clone());
            let subcategory = match &changes.subcategory {
                Some(sub) => sub.clone(),
                None => task.subcategory.clone(),
            };
            self.check_categories(&category, subcategory.as_deref())
                .await?;
            task.category = category;
            task.subcategory = subcategory;
        }

        if let Some(title) = changes.title {
            if title.trim().is_empty() {
                return Err(MarketError::Validation("title must not be empty".into()));
            }
            task.title = title;
        }
        if let Some(description) = changes.description {
            task.description = description;
        }
        if let Some(address) = changes.address {
            task.address = address;
        }
        if let Some(latitude) = changes.latitude {
            task.latitude = Some(latitude);
        }
        if let Some(longitude) = changes.longitude {
            task.longitude = Some(longitude);
        }
        if let Some(required_at) = changes.required_at {
            task.required_at = required_at;
        }
        if let Some(duration_hours) = changes.duration_hours {
            task.duration_hours = duration_hours;
        }
        if let Some(is_urgent) = changes.is_urgent {
            task.is_urgent = is_urgent;
        }
        if let Some(images) = changes.images {
            task.images = images;
        }
        if let Some(budget) = changes.budget {
            if budget.is_zero() {
                return Err(MarketError::Validation("budget must be positive".into()));
            }
            task.budget = budget;
            let policy = self.fees.current().await?;
            task.fees = compute_fees(budget, &policy);
        }

        task.updated_at = Utc::now();
        self.storage.put_task(&task).await?;
        Ok(task)
    }

    /// Delete an open task and its bids. Admins may delete regardless of
    /// status.
    pub async fn delete_task(&self, actor: &Actor, task_id: &TaskId) -> Result<()> {
        let task = self.storage.require_task(task_id).await?;
        if !can_act(actor, &task, TaskAction::Delete) {
            return Err(MarketError::Forbidden("not your task".into()));
        }
        if !task.is_editable() && !actor.is_admin() {
            return Err(MarketError::invalid_state("deleteTask", task.status));
        }

        for bid in self.storage.bids_for_task(task_id).await? {
            self.storage.delete_bid(&bid.id).await?;
        }
        self.storage.delete_task(task_id).await?;
        info!(task = %task_id, "Task deleted");
        Ok(())
    }

    /// Assign an open task directly to a tasker, bypassing the bid
    /// ledger's accept flow. Pending bids are rejected in the same unit
    /// of work, and the open-status guard is re-checked under the gate.
    pub async fn assign_task(&self, actor: &Actor, task_id: &TaskId, tasker: UserId) -> Result<Task> {
        let task = self.storage.require_task(task_id).await?;
        if !can_act(actor, &task, TaskAction::Assign) {
            return Err(MarketError::Forbidden("not your task".into()));
        }

        self.storage.begin_unit().await?;
        let outcome = self.assign_task_locked(task_id, tasker).await;
        let task = match outcome {
            Ok(task) => {
                self.storage.commit_unit().await?;
                task
            }
            Err(e) => {
                let _ = self.storage.rollback_unit().await;
                return Err(e);
            }
        };

        info!(task = %task.id, tasker = %tasker, "🤝 Task assigned");
        self.emitter
            .emit(Notification::new(
                tasker,
                Some(actor.id),
                NotificationKind::TaskAssigned,
                "You were assigned a task",
                format!("You were assigned \"{}\"", task.title),
                Some(task.id),
                None,
                serde_json::json!({ "taskId": task.id.to_hex() }),
            ))
            .await;
        Ok(task)
    }

    async fn assign_task_locked(&self, task_id: &TaskId, tasker: UserId) -> Result<Task> {
        let mut task = self.storage.require_task(task_id).await?;
        Self::ensure_transition(&task, TaskStatus::Assigned, "assignTask")?;

        let now = Utc::now();
        for mut bid in self.storage.bids_for_task(task_id).await? {
            if bid.status == BidStatus::Pending {
                bid.status = BidStatus::Rejected;
                bid.rejection_reason = Some("task was assigned directly".into());
                bid.updated_at = now;
                self.storage.put_bid(&bid).await?;
            }
        }

        task.status = TaskStatus::Assigned;
        task.assigned_to = Some(tasker);
        task.updated_at = now;
        self.storage.put_task(&task).await?;
        Ok(task)
    }

    /// The assigned tasker starts work.
    pub async fn start_task(&self, actor: &Actor, task_id: &TaskId) -> Result<Task> {
        let mut task = self.storage.require_task(task_id).await?;
        if !can_act(actor, &task, TaskAction::Start) {
            return Err(MarketError::Forbidden("task is not assigned to you".into()));
        }
        Self::ensure_transition(&task, TaskStatus::InProgress, "startTask")?;

        let now = Utc::now();
        task.status = TaskStatus::InProgress;
        task.started_at = Some(now);
        task.updated_at = now;
        self.storage.put_task(&task).await?;

        info!(task = %task.id, tasker = %actor.id, "▶️ Task started");
        self.emitter
            .emit(Notification::new(
                task.customer,
                Some(actor.id),
                NotificationKind::TaskStarted,
                "Work has started",
                format!("{} started working on \"{}\"", actor.name, task.title),
                Some(task.id),
                None,
                serde_json::json!({ "taskId": task.id.to_hex() }),
            ))
            .await;
        Ok(task)
    }

    /// The assigned tasker signals the work is done and waits for the
    /// customer's confirmation.
    pub async fn request_completion(
        &self,
        actor: &Actor,
        task_id: &TaskId,
        note: Option<String>,
        feedback: Option<String>,
    ) -> Result<Task> {
        let mut task = self.storage.require_task(task_id).await?;
        if !can_act(actor, &task, TaskAction::RequestCompletion) {
            return Err(MarketError::Forbidden("task is not assigned to you".into()));
        }
        Self::ensure_transition(&task, TaskStatus::CompletionRequested, "requestCompletion")?;

        let now = Utc::now();
        task.status = TaskStatus::CompletionRequested;
        task.completion_requested_at = Some(now);
        task.completion_requested_by = Some(actor.id);
        task.completion_note = note;
        if feedback.is_some() {
            task.tasker_feedback = feedback;
        }
        task.updated_at = now;
        self.storage.put_task(&task).await?;

        info!(task = %task.id, tasker = %actor.id, "Completion requested");
        self.emitter
            .emit(Notification::new(
                task.customer,
                Some(actor.id),
                NotificationKind::CompletionRequested,
                "Completion requested",
                format!("{} marked \"{}\" as done", actor.name, task.title),
                Some(task.id),
                None,
                serde_json::json!({
                    "taskId": task.id.to_hex(),
                    "note": task.completion_note,
                }),
            ))
            .await;
        Ok(task)
    }

    /// The customer confirms completion: the task reaches its terminal
    /// `Completed` state, the tasker's completed-task counter is bumped,
    /// and review submission unlocks.
    pub async fn confirm_completion(
        &self,
        actor: &Actor,
        task_id: &TaskId,
        feedback: Option<String>,
    ) -> Result<Task> {
        let mut task = self.storage.require_task(task_id).await?;
        if !can_act(actor, &task, TaskAction::ConfirmCompletion) {
            return Err(MarketError::Forbidden("not your task".into()));
        }
        Self::ensure_transition(&task, TaskStatus::Completed, "confirmCompletion")?;

        let now = Utc::now();
        task.status = TaskStatus::Completed;
        task.completed_at = Some(now);
        if feedback.is_some() {
            task.customer_feedback = feedback;
        }
        task.updated_at = now;
        self.storage.put_task(&task).await?;

        if let Some(tasker) = task.assigned_to {
            let mut profile = self.storage.profile_or_default(&tasker).await?;
            profile.completed_tasks += 1;
            self.storage.put_profile(&profile).await?;

            info!(
                task = %task.id,
                tasker = %tasker,
                completed_tasks = profile.completed_tasks,
                "✅ Task completed"
            );
            self.emitter
                .emit(Notification::new(
                    tasker,
                    Some(actor.id),
                    NotificationKind::CompletionConfirmed,
                    "Task completed",
                    format!("\"{}\" was confirmed as completed", task.title),
                    Some(task.id),
                    None,
                    serde_json::json!({
                        "taskId": task.id.to_hex(),
                        "payout": task.fees.final_tasker_payout,
                    }),
                ))
                .await;
        }
        Ok(task)
    }

    /// The customer rejects the completion request; the task returns to
    /// `InProgress` and the request bookkeeping is cleared.
    pub async fn reject_completion(
        &self,
        actor: &Actor,
        task_id: &TaskId,
        reason: Option<String>,
    ) -> Result<Task> {
        let mut task = self.storage.require_task(task_id).await?;
        if !can_act(actor, &task, TaskAction::RejectCompletion) {
            return Err(MarketError::Forbidden("not your task".into()));
        }
        Self::ensure_transition(&task, TaskStatus::InProgress, "rejectCompletion")?;

        task.status = TaskStatus::InProgress;
        task.clear_completion_request();
        task.updated_at = Utc::now();
        self.storage.put_task(&task).await?;

        info!(task = %task.id, "Completion request rejected");
        if let Some(tasker) = task.assigned_to {
            self.emitter
                .emit(Notification::new(
                    tasker,
                    Some(actor.id),
                    NotificationKind::CompletionRejected,
                    "Completion request rejected",
                    reason
                        .clone()
                        .unwrap_or_else(|| format!("\"{}\" needs more work", task.title)),
                    Some(task.id),
                    None,
                    serde_json::json!({
                        "taskId": task.id.to_hex(),
                        "reason": reason,
                    }),
                ))
                .await;
        }
        Ok(task)
    }

    /// Cancel a task that has not completed. Runs under the unit gate
    /// because it races `acceptBid` on open tasks; pending bids are
    /// rejected in the same unit.
    pub async fn cancel_task(&self, actor: &Actor, task_id: &TaskId) -> Result<Task> {
        let task = self.storage.require_task(task_id).await?;
        if !can_act(actor, &task, TaskAction::Cancel) {
            return Err(MarketError::Forbidden("not your task".into()));
        }

        self.storage.begin_unit().await?;
        let outcome = self.cancel_task_locked(task_id).await;
        let (task, prev_assignee) = match outcome {
            Ok(ok) => {
                self.storage.commit_unit().await?;
                ok
            }
            Err(e) => {
                let _ = self.storage.rollback_unit().await;
                return Err(e);
            }
        };

        info!(task = %task.id, "🚫 Task cancelled");
        if let Some(tasker) = prev_assignee {
            self.emitter
                .emit(Notification::new(
                    tasker,
                    Some(actor.id),
                    NotificationKind::TaskCancelled,
                    "Task cancelled",
                    format!("\"{}\" was cancelled", task.title),
                    Some(task.id),
                    None,
                    serde_json::json!({ "taskId": task.id.to_hex() }),
                ))
                .await;
        }
        Ok(task)
    }

    async fn cancel_task_locked(&self, task_id: &TaskId) -> Result<(Task, Option<UserId>)> {
        let mut task = self.storage.require_task(task_id).await?;
        Self::ensure_transition(&task, TaskStatus::Cancelled, "cancelTask")?;

        let now = Utc::now();
        for mut bid in self.storage.bids_for_task(task_id).await? {
            if bid.status == BidStatus::Pending {
                bid.status = BidStatus::Rejected;
                bid.rejection_reason = Some("task was cancelled".into());
                bid.updated_at = now;
                self.storage.put_bid(&bid).await?;
            }
        }

        // A cancelled task is no longer anyone's assignment
        let prev_assignee = task.assigned_to.take();
        task.status = TaskStatus::Cancelled;
        task.updated_at = now;
        self.storage.put_task(&task).await?;
        Ok((task, prev_assignee))
    }

    pub async fn get_task(&self, task_id: &TaskId) -> Result<Task> {
        Ok(self.storage.require_task(task_id).await?)
    }

    fn ensure_transition(task: &Task, next: TaskStatus, attempted: &str) -> Result<()> {
        if !task.status.can_transition_to(&next) {
            return Err(MarketError::invalid_state(attempted, task.status));
        }
        Ok(())
    }

    async fn check_categories(&self, category: &str, subcategory: Option<&str>) -> Result<()> {
        if !self.categories.category_exists(category).await {
            return Err(MarketError::Validation(format!(
                "unknown category: {}",
                category
            )));
        }
        if let Some(sub) = subcategory {
            if !self.categories.is_child_of(sub, category).await {
                return Err(MarketError::Validation(format!(
                    "{} is not a subcategory of {}",
                    sub, category
                )));
            }
        }
        Ok(())
    }
}
