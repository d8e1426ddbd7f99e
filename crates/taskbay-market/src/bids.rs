//! Bid ledger: per-task bid collection and the accept/reject workflow.
//!
//! One live bid per (task, tasker); bids are mutable only while pending;
//! accepting a bid assigns the task and rejects every sibling inside one
//! storage unit of work so concurrent accepts cannot corrupt the ledger.

use crate::authz::{can_act, TaskAction};
use crate::error::{MarketError, Result};
use crate::notify::NotificationEmitter;
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;
use taskbay_storage::StorageEngine;
use taskbay_types::{
    Actor, Amount, Bid, BidId, BidStatus, Lifecycle, Notification, NotificationKind, Role, Task,
    TaskId, TaskStatus,
};

/// Input for placing a new bid.
#[derive(Debug, Clone)]
pub struct BidDraft {
    pub task: TaskId,
    pub amount: Amount,
    pub message: String,
    pub estimated_hours: Option<u32>,
}

/// Changes a tasker may make to a pending bid.
#[derive(Debug, Clone, Default)]
pub struct BidChanges {
    pub amount: Option<Amount>,
    pub message: Option<String>,
    pub estimated_hours: Option<Option<u32>>,
}

/// A bid as shown to a viewer. The tasker's email is present only when
/// the viewer owns the parent task (or is an admin).
#[derive(Debug, Clone, Serialize)]
pub struct BidView {
    pub id: BidId,
    pub task: TaskId,
    pub tasker: taskbay_types::UserId,
    pub tasker_name: String,
    pub tasker_email: Option<String>,
    pub amount: Amount,
    pub message: String,
    pub estimated_hours: Option<u32>,
    pub status: BidStatus,
    pub rejection_reason: Option<String>,
    pub created_at: chrono::DateTime<Utc>,
    pub updated_at: chrono::DateTime<Utc>,
}

impl BidView {
    fn from_bid(bid: Bid, include_contact: bool) -> Self {
        Self {
            id: bid.id,
            task: bid.task,
            tasker: bid.tasker,
            tasker_name: bid.tasker_name,
            tasker_email: include_contact.then_some(bid.tasker_email),
            amount: bid.amount,
            message: bid.message,
            estimated_hours: bid.estimated_hours,
            status: bid.status,
            rejection_reason: bid.rejection_reason,
            created_at: bid.created_at,
            updated_at: bid.updated_at,
        }
    }
}

/// A tasker's own bid joined with a summary of its parent task.
#[derive(Debug, Clone, Serialize)]
pub struct TaskerBid {
    pub bid: Bid,
    pub task_title: String,
    pub task_status: TaskStatus,
}

/// Parent-task status filter for [`BidLedger::bids_for_tasker`];
/// `negate` inverts the match ("every bid whose task is NOT open").
#[derive(Debug, Clone, Copy)]
pub struct TaskStatusFilter {
    pub status: TaskStatus,
    pub negate: bool,
}

pub struct BidLedger {
    storage: Arc<StorageEngine>,
    emitter: Arc<NotificationEmitter>,
}

impl BidLedger {
    pub fn new(storage: Arc<StorageEngine>, emitter: Arc<NotificationEmitter>) -> Self {
        Self { storage, emitter }
    }

    /// Place a bid on an open task.
    pub async fn place_bid(&self, actor: &Actor, draft: BidDraft) -> Result<Bid> {
        if !matches!(actor.role, Role::Tasker | Role::Admin) {
            return Err(MarketError::Forbidden("only taskers may bid".into()));
        }

        let task = self.storage.require_task(&draft.task).await?;
        if task.status != TaskStatus::Open {
            return Err(MarketError::invalid_state("placeBid", task.status));
        }

        let existing = self.storage.bids_for_task(&draft.task).await?;
        if existing.iter().any(|b| b.tasker == actor.id) {
            return Err(MarketError::Conflict(
                "you already have a bid on this task".into(),
            ));
        }

        let bid = Bid::new(
            draft.task,
            actor,
            draft.amount,
            draft.message,
            draft.estimated_hours,
        );
        self.storage.put_bid(&bid).await?;

        info!(
            bid = %bid.id,
            task = %task.id,
            tasker = %actor.id,
            amount = %bid.amount,
            "🔨 Bid placed"
        );

        self.emitter
            .emit(Notification::new(
                task.customer,
                Some(actor.id),
                NotificationKind::BidPlaced,
                "New bid on your task",
                format!("{} bid {} on \"{}\"", actor.name, bid.amount, task.title),
                Some(task.id),
                Some(bid.id),
                serde_json::json!({ "amount": bid.amount, "taskId": task.id.to_hex() }),
            ))
            .await;

        Ok(bid)
    }

    /// Edit a pending bid. Only the bid's tasker (or an admin) may edit.
    pub async fn update_bid(
        &self,
        actor: &Actor,
        bid_id: &BidId,
        changes: BidChanges,
    ) -> Result<Bid> {
        let mut bid = self.owned_pending_bid(actor, bid_id, "updateBid").await?;

        if let Some(amount) = changes.amount {
            bid.amount = amount;
        }
        if let Some(message) = changes.message {
            bid.message = message;
        }
        if let Some(estimated_hours) = changes.estimated_hours {
            bid.estimated_hours = estimated_hours;
        }
        bid.updated_at = Utc::now();

        self.storage.put_bid(&bid).await?;
        Ok(bid)
    }

    /// Remove a pending bid entirely.
    pub async fn delete_bid(&self, actor: &Actor, bid_id: &BidId) -> Result<()> {
        let bid = self.owned_pending_bid(actor, bid_id, "deleteBid").await?;
        self.storage.delete_bid(&bid.id).await?;
        info!(bid = %bid.id, task = %bid.task, "Bid deleted");
        Ok(())
    }

    /// Withdraw a pending bid, keeping the record.
    pub async fn cancel_bid(&self, actor: &Actor, bid_id: &BidId) -> Result<Bid> {
        let mut bid = self.owned_pending_bid(actor, bid_id, "cancelBid").await?;
        bid.status = BidStatus::Cancelled;
        bid.updated_at = Utc::now();
        self.storage.put_bid(&bid).await?;
        info!(bid = %bid.id, task = %bid.task, "Bid cancelled");
        Ok(bid)
    }

    /// Accept a bid: the winner becomes `Accepted`, every other live bid
    /// on the task becomes `Rejected`, and the task moves to `Assigned`
    /// — all inside one unit of work. The task's `Open` status is
    /// re-checked against a fresh read after the unit gate is held, so a
    /// racing accept or cancel loses cleanly with `InvalidState`.
    pub async fn accept_bid(&self, actor: &Actor, bid_id: &BidId) -> Result<(Bid, Task)> {
        let bid = self.storage.require_bid(bid_id).await?;
        let task = self.storage.require_task(&bid.task).await?;
        if !can_act(actor, &task, TaskAction::Assign) {
            return Err(MarketError::Forbidden(
                "only the task's customer may accept a bid".into(),
            ));
        }

        self.storage.begin_unit().await?;
        let outcome = self.accept_bid_locked(bid_id).await;
        match outcome {
            Ok((winner, task)) => {
                self.storage.commit_unit().await?;

                info!(
                    bid = %winner.id,
                    task = %task.id,
                    tasker = %winner.tasker,
                    amount = %winner.amount,
                    "🤝 Bid accepted, task assigned"
                );

                self.emitter
                    .emit(Notification::new(
                        winner.tasker,
                        Some(actor.id),
                        NotificationKind::BidAccepted,
                        "Your bid was accepted",
                        format!("You were assigned \"{}\"", task.title),
                        Some(task.id),
                        Some(winner.id),
                        serde_json::json!({ "taskId": task.id.to_hex() }),
                    ))
                    .await;

                Ok((winner, task))
            }
            Err(e) => {
                let _ = self.storage.rollback_unit().await;
                Err(e)
            }
        }
    }

    /// The guarded body of [`accept_bid`]; runs with the unit gate held.
    async fn accept_bid_locked(&self, bid_id: &BidId) -> Result<(Bid, Task)> {
        let mut winner = self.storage.require_bid(bid_id).await?;
        let mut task = self.storage.require_task(&winner.task).await?;

        if task.status != TaskStatus::Open {
            return Err(MarketError::invalid_state("acceptBid", task.status));
        }
        if !winner.is_pending() {
            return Err(MarketError::invalid_state("acceptBid", winner.status));
        }

        let now = Utc::now();
        winner.status = BidStatus::Accepted;
        winner.updated_at = now;
        self.storage.put_bid(&winner).await?;

        for mut sibling in self.storage.bids_for_task(&task.id).await? {
            if sibling.id == winner.id || sibling.status.is_terminal() {
                continue;
            }
            sibling.status = BidStatus::Rejected;
            sibling.rejection_reason = Some("another bid was accepted".into());
            sibling.updated_at = now;
            self.storage.put_bid(&sibling).await?;
        }

        task.status = TaskStatus::Assigned;
        task.assigned_to = Some(winner.tasker);
        task.updated_at = now;
        self.storage.put_task(&task).await?;

        Ok((winner, task))
    }

    /// Reject a pending bid, optionally recording why.
    pub async fn reject_bid(
        &self,
        actor: &Actor,
        bid_id: &BidId,
        reason: Option<String>,
    ) -> Result<Bid> {
        let mut bid = self.storage.require_bid(bid_id).await?;
        let task = self.storage.require_task(&bid.task).await?;
        if !can_act(actor, &task, TaskAction::Assign) {
            return Err(MarketError::Forbidden(
                "only the task's customer may reject a bid".into(),
            ));
        }
        if !bid.is_pending() {
            return Err(MarketError::invalid_state("rejectBid", bid.status));
        }

        bid.status = BidStatus::Rejected;
        bid.rejection_reason = reason.clone();
        bid.updated_at = Utc::now();
        self.storage.put_bid(&bid).await?;

        self.emitter
            .emit(Notification::new(
                bid.tasker,
                Some(actor.id),
                NotificationKind::BidRejected,
                "Your bid was rejected",
                reason.unwrap_or_else(|| format!("Your bid on \"{}\" was rejected", task.title)),
                Some(task.id),
                Some(bid.id),
                serde_json::json!({ "taskId": task.id.to_hex() }),
            ))
            .await;

        Ok(bid)
    }

    /// All bids on a task, cheapest first. Contact details are redacted
    /// unless the viewer owns the task or is an admin.
    pub async fn bids_for_task(&self, actor: &Actor, task_id: &TaskId) -> Result<Vec<BidView>> {
        let task = self.storage.require_task(task_id).await?;
        let include_contact = can_act(actor, &task, TaskAction::ViewBidContacts);

        let mut bids = self.storage.bids_for_task(task_id).await?;
        bids.sort_by_key(|b| b.amount);
        Ok(bids
            .into_iter()
            .map(|b| BidView::from_bid(b, include_contact))
            .collect())
    }

    /// The actor's own bids, newest first, with optional bid-status and
    /// parent-task-status filters.
    pub async fn bids_for_tasker(
        &self,
        actor: &Actor,
        statuses: Option<&[BidStatus]>,
        task_status: Option<TaskStatusFilter>,
    ) -> Result<Vec<TaskerBid>> {
        let mut bids = self.storage.bids_for_tasker(&actor.id).await?;
        if let Some(statuses) = statuses {
            bids.retain(|b| statuses.contains(&b.status));
        }
        bids.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let mut out = Vec::with_capacity(bids.len());
        for bid in bids {
            let Some(task) = self.storage.get_task(&bid.task).await? else {
                continue;
            };
            if let Some(filter) = task_status {
                let matches = task.status == filter.status;
                if matches == filter.negate {
                    continue;
                }
            }
            out.push(TaskerBid {
                bid,
                task_title: task.title,
                task_status: task.status,
            });
        }
        Ok(out)
    }

    /// Shared guard for the tasker-owned, pending-only mutations.
    async fn owned_pending_bid(
        &self,
        actor: &Actor,
        bid_id: &BidId,
        attempted: &str,
    ) -> Result<Bid> {
        let bid = self.storage.require_bid(bid_id).await?;
        if bid.tasker != actor.id && !actor.is_admin() {
            return Err(MarketError::Forbidden(
                "bid belongs to another tasker".into(),
            ));
        }
        if !bid.is_pending() {
            return Err(MarketError::invalid_state(attempted, bid.status));
        }
        Ok(bid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::NoDelivery;
    use taskbay_storage::{BackendType, StorageConfig};
    use taskbay_types::{FeeBreakdown, UserId};

    fn engine() -> Arc<StorageEngine> {
        Arc::new(
            StorageEngine::new(StorageConfig {
                backend_type: BackendType::Memory,
            })
            .unwrap(),
        )
    }

    fn ledger(storage: Arc<StorageEngine>) -> BidLedger {
        let emitter = Arc::new(NotificationEmitter::new(
            storage.clone(),
            Arc::new(NoDelivery),
            Arc::new(NoDelivery),
        ));
        BidLedger::new(storage, emitter)
    }

    fn customer() -> Actor {
        Actor::new(UserId::from_bytes([1u8; 32]), Role::Customer, "Cass", "cass@x")
    }

    fn tasker(seed: u8) -> Actor {
        Actor::new(
            UserId::from_bytes([seed; 32]),
            Role::Tasker,
            format!("Tasker {}", seed),
            format!("tasker{}@x", seed),
        )
    }

    async fn open_task(storage: &StorageEngine, owner: &Actor) -> Task {
        let now = Utc::now();
        let task = Task {
            id: TaskId::generate(&owner.id, "walk the dog", now.timestamp_millis()),
            customer: owner.id,
            assigned_to: None,
            title: "walk the dog".into(),
            description: "one hour, morning".into(),
            category: "pets".into(),
            subcategory: None,
            address: "5 Oak Ave".into(),
            latitude: None,
            longitude: None,
            required_at: now,
            duration_hours: 1,
            is_urgent: false,
            images: vec![],
            budget: Amount::from_major(50),
            fees: FeeBreakdown::default(),
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
        storage.put_task(&task).await.unwrap();
        task
    }

    fn draft(task: &Task, major: u64) -> BidDraft {
        BidDraft {
            task: task.id,
            amount: Amount::from_major(major),
            message: "I can do this".into(),
            estimated_hours: Some(2),
        }
    }

    #[tokio::test]
    async fn customers_may_not_bid() {
        let storage = engine();
        let ledger = ledger(storage.clone());
        let owner = customer();
        let task = open_task(&storage, &owner).await;

        let err = ledger.place_bid(&owner, draft(&task, 40)).await.unwrap_err();
        assert!(matches!(err, MarketError::Forbidden(_)));
    }

    #[tokio::test]
    async fn second_bid_by_same_tasker_conflicts() {
        let storage = engine();
        let ledger = ledger(storage.clone());
        let task = open_task(&storage, &customer()).await;
        let bidder = tasker(2);

        ledger.place_bid(&bidder, draft(&task, 40)).await.unwrap();
        let err = ledger.place_bid(&bidder, draft(&task, 35)).await.unwrap_err();
        assert!(matches!(err, MarketError::Conflict(_)));
    }

    #[tokio::test]
    async fn pending_is_the_only_mutable_state() {
        let storage = engine();
        let ledger = ledger(storage.clone());
        let owner = customer();
        let task = open_task(&storage, &owner).await;
        let bidder = tasker(2);

        let bid = ledger.place_bid(&bidder, draft(&task, 40)).await.unwrap();
        ledger.accept_bid(&owner, &bid.id).await.unwrap();

        let changes = BidChanges {
            amount: Some(Amount::from_major(10)),
            ..Default::default()
        };
        assert!(matches!(
            ledger.update_bid(&bidder, &bid.id, changes).await.unwrap_err(),
            MarketError::InvalidState { .. }
        ));
        assert!(matches!(
            ledger.cancel_bid(&bidder, &bid.id).await.unwrap_err(),
            MarketError::InvalidState { .. }
        ));
        assert!(matches!(
            ledger.delete_bid(&bidder, &bid.id).await.unwrap_err(),
            MarketError::InvalidState { .. }
        ));
    }

    #[tokio::test]
    async fn only_the_bids_tasker_may_touch_it() {
        let storage = engine();
        let ledger = ledger(storage.clone());
        let task = open_task(&storage, &customer()).await;

        let bid = ledger.place_bid(&tasker(2), draft(&task, 40)).await.unwrap();
        let err = ledger.cancel_bid(&tasker(3), &bid.id).await.unwrap_err();
        assert!(matches!(err, MarketError::Forbidden(_)));
    }

    #[tokio::test]
    async fn accept_rejects_all_siblings() {
        let storage = engine();
        let ledger = ledger(storage.clone());
        let owner = customer();
        let task = open_task(&storage, &owner).await;

        let a = ledger.place_bid(&tasker(2), draft(&task, 500)).await.unwrap();
        let b = ledger.place_bid(&tasker(3), draft(&task, 400)).await.unwrap();

        let (winner, task) = ledger.accept_bid(&owner, &b.id).await.unwrap();
        assert_eq!(winner.status, BidStatus::Accepted);
        assert_eq!(task.status, TaskStatus::Assigned);
        assert_eq!(task.assigned_to, Some(b.tasker));

        let loser = storage.require_bid(&a.id).await.unwrap();
        assert_eq!(loser.status, BidStatus::Rejected);

        let accepted: Vec<_> = storage
            .bids_for_task(&task.id)
            .await
            .unwrap()
            .into_iter()
            .filter(|b| b.status == BidStatus::Accepted)
            .collect();
        assert_eq!(accepted.len(), 1);
    }

    #[tokio::test]
    async fn accept_requires_open_task() {
        let storage = engine();
        let ledger = ledger(storage.clone());
        let owner = customer();
        let task = open_task(&storage, &owner).await;

        let a = ledger.place_bid(&tasker(2), draft(&task, 40)).await.unwrap();
        let b = ledger.place_bid(&tasker(3), draft(&task, 45)).await.unwrap();

        ledger.accept_bid(&owner, &a.id).await.unwrap();
        let err = ledger.accept_bid(&owner, &b.id).await.unwrap_err();
        assert!(matches!(err, MarketError::InvalidState { .. }));
    }

    #[tokio::test]
    async fn concurrent_accepts_have_exactly_one_winner() {
        let storage = engine();
        let ledger = Arc::new(ledger(storage.clone()));
        let owner = customer();
        let task = open_task(&storage, &owner).await;

        let a = ledger.place_bid(&tasker(2), draft(&task, 40)).await.unwrap();
        let b = ledger.place_bid(&tasker(3), draft(&task, 45)).await.unwrap();

        let (l1, l2) = (ledger.clone(), ledger.clone());
        let (o1, o2) = (owner.clone(), owner.clone());
        let first = tokio::spawn(async move { l1.accept_bid(&o1, &a.id).await });
        let second = tokio::spawn(async move { l2.accept_bid(&o2, &b.id).await });

        let results = [first.await.unwrap(), second.await.unwrap()];
        let wins = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(wins, 1);
        assert!(results.iter().any(|r| matches!(
            r,
            Err(MarketError::InvalidState { .. })
        )));

        let bids = storage.bids_for_task(&task.id).await.unwrap();
        assert_eq!(
            bids.iter().filter(|b| b.status == BidStatus::Accepted).count(),
            1
        );
        assert_eq!(
            bids.iter().filter(|b| b.status == BidStatus::Rejected).count(),
            1
        );
    }

    #[tokio::test]
    async fn bid_listing_sorts_and_redacts() {
        let storage = engine();
        let ledger = ledger(storage.clone());
        let owner = customer();
        let task = open_task(&storage, &owner).await;

        ledger.place_bid(&tasker(2), draft(&task, 90)).await.unwrap();
        ledger.place_bid(&tasker(3), draft(&task, 30)).await.unwrap();

        // Owner sees contact details, cheapest first
        let views = ledger.bids_for_task(&owner, &task.id).await.unwrap();
        assert_eq!(views[0].amount, Amount::from_major(30));
        assert!(views[0].tasker_email.is_some());

        // Another tasker sees redacted contact details
        let views = ledger.bids_for_task(&tasker(4), &task.id).await.unwrap();
        assert!(views.iter().all(|v| v.tasker_email.is_none()));
    }

    #[tokio::test]
    async fn tasker_bid_listing_filters_by_task_status() {
        let storage = engine();
        let ledger = ledger(storage.clone());
        let owner = customer();
        let bidder = tasker(2);

        let open = open_task(&storage, &owner).await;
        let assigned = open_task(&storage, &owner).await;

        ledger.place_bid(&bidder, draft(&open, 40)).await.unwrap();
        let winning = ledger.place_bid(&bidder, draft(&assigned, 45)).await.unwrap();
        ledger.accept_bid(&owner, &winning.id).await.unwrap();

        let still_open = ledger
            .bids_for_tasker(
                &bidder,
                None,
                Some(TaskStatusFilter {
                    status: TaskStatus::Open,
                    negate: false,
                }),
            )
            .await
            .unwrap();
        assert_eq!(still_open.len(), 1);
        assert_eq!(still_open[0].task_status, TaskStatus::Open);

        let not_open = ledger
            .bids_for_tasker(
                &bidder,
                None,
                Some(TaskStatusFilter {
                    status: TaskStatus::Open,
                    negate: true,
                }),
            )
            .await
            .unwrap();
        assert_eq!(not_open.len(), 1);
        assert_eq!(not_open[0].task_status, TaskStatus::Assigned);

        let accepted_only = ledger
            .bids_for_tasker(&bidder, Some(&[BidStatus::Accepted]), None)
            .await
            .unwrap();
        assert_eq!(accepted_only.len(), 1);
        assert_eq!(accepted_only[0].bid.status, BidStatus::Accepted);
    }
}
