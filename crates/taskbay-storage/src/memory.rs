use crate::backend::{Result, StorageBackend, StorageError, StorageStats};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use taskbay_types::{
    Bid, BidId, FeePolicyRecord, Notification, NotificationId, Review, ReviewId, Task, TaskId,
    TaskerProfile, UserId,
};

/// In-memory storage backend for testing and development.
///
/// Writes apply immediately; `begin_unit` takes an exclusive gate so that
/// competing units of work are serialized, and `rollback_unit` only
/// releases the gate.
pub struct MemoryBackend {
    tasks: Arc<RwLock<HashMap<TaskId, Task>>>,
    bids: Arc<RwLock<HashMap<BidId, Bid>>>,
    task_bids: Arc<RwLock<HashMap<TaskId, Vec<BidId>>>>,
    tasker_bids: Arc<RwLock<HashMap<UserId, Vec<BidId>>>>,
    reviews: Arc<RwLock<HashMap<ReviewId, Review>>>,
    tasker_reviews: Arc<RwLock<HashMap<UserId, Vec<ReviewId>>>>,
    notifications: Arc<RwLock<HashMap<NotificationId, Notification>>>,
    user_notifications: Arc<RwLock<HashMap<UserId, Vec<NotificationId>>>>,
    profiles: Arc<RwLock<HashMap<UserId, TaskerProfile>>>,
    fee_policies: Arc<RwLock<Vec<FeePolicyRecord>>>,
    unit_gate: Arc<Mutex<()>>,
    unit_guard: std::sync::Mutex<Option<OwnedMutexGuard<()>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            tasks: Arc::new(RwLock::new(HashMap::new())),
            bids: Arc::new(RwLock::new(HashMap::new())),
            task_bids: Arc::new(RwLock::new(HashMap::new())),
            tasker_bids: Arc::new(RwLock::new(HashMap::new())),
            reviews: Arc::new(RwLock::new(HashMap::new())),
            tasker_reviews: Arc::new(RwLock::new(HashMap::new())),
            notifications: Arc::new(RwLock::new(HashMap::new())),
            user_notifications: Arc::new(RwLock::new(HashMap::new())),
            profiles: Arc::new(RwLock::new(HashMap::new())),
            fee_policies: Arc::new(RwLock::new(Vec::new())),
            unit_gate: Arc::new(Mutex::new(())),
            unit_guard: std::sync::Mutex::new(None),
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn put_task(&self, task: &Task) -> Result<()> {
        let mut tasks = self.tasks.write().await;
        tasks.insert(task.id, task.clone());
        Ok(())
    }

    async fn get_task(&self, id: &TaskId) -> Result<Option<Task>> {
        Ok(self.tasks.read().await.get(id).cloned())
    }

    async fn delete_task(&self, id: &TaskId) -> Result<()> {
        let mut tasks = self.tasks.write().await;
        if tasks.remove(id).is_none() {
            return Err(StorageError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn list_tasks(&self) -> Result<Vec<Task>> {
        Ok(self.tasks.read().await.values().cloned().collect())
    }

    async fn put_bid(&self, bid: &Bid) -> Result<()> {
        let mut bids = self.bids.write().await;
        let is_new = !bids.contains_key(&bid.id);
        bids.insert(bid.id, bid.clone());

        if is_new {
            let mut task_bids = self.task_bids.write().await;
            task_bids.entry(bid.task).or_default().push(bid.id);

            let mut tasker_bids = self.tasker_bids.write().await;
            tasker_bids.entry(bid.tasker).or_default().push(bid.id);
        }
        Ok(())
    }

    async fn get_bid(&self, id: &BidId) -> Result<Option<Bid>> {
        Ok(self.bids.read().await.get(id).cloned())
    }

    async fn delete_bid(&self, id: &BidId) -> Result<()> {
        let mut bids = self.bids.write().await;
        let bid = bids
            .remove(id)
            .ok_or_else(|| StorageError::NotFound(id.to_string()))?;

        let mut task_bids = self.task_bids.write().await;
        if let Some(ids) = task_bids.get_mut(&bid.task) {
            ids.retain(|b| b != id);
        }
        let mut tasker_bids = self.tasker_bids.write().await;
        if let Some(ids) = tasker_bids.get_mut(&bid.tasker) {
            ids.retain(|b| b != id);
        }
        Ok(())
    }

    async fn bids_for_task(&self, task: &TaskId) -> Result<Vec<Bid>> {
        let bids = self.bids.read().await;
        let task_bids = self.task_bids.read().await;
        Ok(task_bids
            .get(task)
            .map(|ids| ids.iter().filter_map(|id| bids.get(id).cloned()).collect())
            .unwrap_or_default())
    }

    async fn bids_for_tasker(&self, tasker: &UserId) -> Result<Vec<Bid>> {
        let bids = self.bids.read().await;
        let tasker_bids = self.tasker_bids.read().await;
        Ok(tasker_bids
            .get(tasker)
            .map(|ids| ids.iter().filter_map(|id| bids.get(id).cloned()).collect())
            .unwrap_or_default())
    }

    async fn put_review(&self, review: &Review) -> Result<()> {
        let mut reviews = self.reviews.write().await;
        let is_new = !reviews.contains_key(&review.id);
        reviews.insert(review.id, review.clone());

        if is_new {
            let mut tasker_reviews = self.tasker_reviews.write().await;
            tasker_reviews.entry(review.tasker).or_default().push(review.id);
        }
        Ok(())
    }

    async fn get_review(&self, id: &ReviewId) -> Result<Option<Review>> {
        Ok(self.reviews.read().await.get(id).cloned())
    }

    async fn reviews_for_tasker(&self, tasker: &UserId) -> Result<Vec<Review>> {
        let reviews = self.reviews.read().await;
        let tasker_reviews = self.tasker_reviews.read().await;
        Ok(tasker_reviews
            .get(tasker)
            .map(|ids| ids.iter().filter_map(|id| reviews.get(id).cloned()).collect())
            .unwrap_or_default())
    }

    async fn review_for_task_by(
        &self,
        task: &TaskId,
        reviewer: &UserId,
    ) -> Result<Option<Review>> {
        let reviews = self.reviews.read().await;
        Ok(reviews
            .values()
            .find(|r| &r.task == task && &r.reviewer == reviewer)
            .cloned())
    }

    async fn put_notification(&self, notification: &Notification) -> Result<()> {
        let mut notifications = self.notifications.write().await;
        let is_new = !notifications.contains_key(&notification.id);
        notifications.insert(notification.id, notification.clone());

        if is_new {
            let mut user_notifications = self.user_notifications.write().await;
            user_notifications
                .entry(notification.recipient)
                .or_default()
                .push(notification.id);
        }
        Ok(())
    }

    async fn get_notification(&self, id: &NotificationId) -> Result<Option<Notification>> {
        Ok(self.notifications.read().await.get(id).cloned())
    }

    async fn notifications_for(&self, recipient: &UserId) -> Result<Vec<Notification>> {
        let notifications = self.notifications.read().await;
        let user_notifications = self.user_notifications.read().await;
        Ok(user_notifications
            .get(recipient)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| notifications.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn put_profile(&self, profile: &TaskerProfile) -> Result<()> {
        let mut profiles = self.profiles.write().await;
        profiles.insert(profile.tasker, profile.clone());
        Ok(())
    }

    async fn get_profile(&self, tasker: &UserId) -> Result<Option<TaskerProfile>> {
        Ok(self.profiles.read().await.get(tasker).cloned())
    }

    async fn append_fee_policy(&self, record: &FeePolicyRecord) -> Result<()> {
        let mut policies = self.fee_policies.write().await;
        policies.push(record.clone());
        Ok(())
    }

    async fn latest_fee_policy(&self) -> Result<Option<FeePolicyRecord>> {
        Ok(self.fee_policies.read().await.last().cloned())
    }

    async fn fee_policy_history(&self) -> Result<Vec<FeePolicyRecord>> {
        Ok(self.fee_policies.read().await.clone())
    }

    async fn begin_unit(&self) -> Result<()> {
        let guard = self.unit_gate.clone().lock_owned().await;
        let mut slot = self
            .unit_guard
            .lock()
            .map_err(|e| StorageError::Backend(format!("unit guard poisoned: {}", e)))?;
        *slot = Some(guard);
        Ok(())
    }

    async fn commit_unit(&self) -> Result<()> {
        let mut slot = self
            .unit_guard
            .lock()
            .map_err(|e| StorageError::Backend(format!("unit guard poisoned: {}", e)))?;
        if slot.take().is_none() {
            return Err(StorageError::Backend("no unit of work in progress".into()));
        }
        Ok(())
    }

    async fn rollback_unit(&self) -> Result<()> {
        let mut slot = self
            .unit_guard
            .lock()
            .map_err(|e| StorageError::Backend(format!("unit guard poisoned: {}", e)))?;
        slot.take();
        Ok(())
    }

    async fn flush(&self) -> Result<()> {
        Ok(())
    }

    async fn stats(&self) -> Result<StorageStats> {
        Ok(StorageStats {
            task_count: self.tasks.read().await.len(),
            bid_count: self.bids.read().await.len(),
            review_count: self.reviews.read().await.len(),
            notification_count: self.notifications.read().await.len(),
        })
    }
}
