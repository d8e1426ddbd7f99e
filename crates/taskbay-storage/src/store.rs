use crate::backend::{Result, StorageBackend, StorageError, StorageStats};
use std::sync::Arc;
use tracing::info;
use taskbay_types::{
    Bid, BidId, FeePolicyRecord, Notification, NotificationId, Review, ReviewId, Task, TaskId,
    TaskerProfile, UserId,
};

/// Configuration for the storage engine.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub backend_type: BackendType,
}

impl Default for StorageConfig {
    fn default() -> Self {
        #[cfg(feature = "rocksdb")]
        let backend_type = BackendType::RocksDb {
            path: std::env::var("TASKBAY_DATA_DIR").unwrap_or_else(|_| "./data/storage".to_string()),
        };

        #[cfg(not(feature = "rocksdb"))]
        let backend_type = BackendType::Memory;

        Self { backend_type }
    }
}

#[derive(Debug, Clone)]
pub enum BackendType {
    Memory,
    #[cfg(feature = "rocksdb")]
    RocksDb {
        path: String,
    },
}

/// High-level storage engine wrapping a backend implementation.
pub struct StorageEngine {
    backend: Arc<dyn StorageBackend>,
}

impl StorageEngine {
    pub fn new(config: StorageConfig) -> Result<Self> {
        let backend: Arc<dyn StorageBackend> = match &config.backend_type {
            BackendType::Memory => {
                info!("🗄️ Storage engine using in-memory backend");
                Arc::new(crate::memory::MemoryBackend::new())
            }
            #[cfg(feature = "rocksdb")]
            BackendType::RocksDb { path } => {
                info!(path = %path, "🗄️ Storage engine using RocksDB backend");
                Arc::new(crate::rocks::RocksBackend::new(path)?)
            }
        };

        Ok(Self { backend })
    }

    pub fn with_backend(backend: Arc<dyn StorageBackend>) -> Self {
        Self { backend }
    }

    // --- Tasks ---

    pub async fn put_task(&self, task: &Task) -> Result<()> {
        self.backend.put_task(task).await
    }

    pub async fn get_task(&self, id: &TaskId) -> Result<Option<Task>> {
        self.backend.get_task(id).await
    }

    /// Fetch a task that must exist.
    pub async fn require_task(&self, id: &TaskId) -> Result<Task> {
        self.backend
            .get_task(id)
            .await?
            .ok_or_else(|| StorageError::NotFound(format!("task {}", id)))
    }

    pub async fn delete_task(&self, id: &TaskId) -> Result<()> {
        self.backend.delete_task(id).await
    }

    pub async fn list_tasks(&self) -> Result<Vec<Task>> {
        self.backend.list_tasks().await
    }

    // --- Bids ---

    pub async fn put_bid(&self, bid: &Bid) -> Result<()> {
        self.backend.put_bid(bid).await
    }

    pub async fn get_bid(&self, id: &BidId) -> Result<Option<Bid>> {
        self.backend.get_bid(id).await
    }

    pub async fn require_bid(&self, id: &BidId) -> Result<Bid> {
        self.backend
            .get_bid(id)
            .await?
            .ok_or_else(|| StorageError::NotFound(format!("bid {}", id)))
    }

    pub async fn delete_bid(&self, id: &BidId) -> Result<()> {
        self.backend.delete_bid(id).await
    }

    pub async fn bids_for_task(&self, task: &TaskId) -> Result<Vec<Bid>> {
        self.backend.bids_for_task(task).await
    }

    pub async fn bids_for_tasker(&self, tasker: &UserId) -> Result<Vec<Bid>> {
        self.backend.bids_for_tasker(tasker).await
    }

    // --- Reviews ---

    pub async fn put_review(&self, review: &Review) -> Result<()> {
        self.backend.put_review(review).await
    }

    pub async fn get_review(&self, id: &ReviewId) -> Result<Option<Review>> {
        self.backend.get_review(id).await
    }

    pub async fn reviews_for_tasker(&self, tasker: &UserId) -> Result<Vec<Review>> {
        self.backend.reviews_for_tasker(tasker).await
    }

    pub async fn review_for_task_by(
        &self,
        task: &TaskId,
        reviewer: &UserId,
    ) -> Result<Option<Review>> {
        self.backend.review_for_task_by(task, reviewer).await
    }

    // --- Notifications ---

    pub async fn put_notification(&self, notification: &Notification) -> Result<()> {
        self.backend.put_notification(notification).await
    }

    pub async fn get_notification(&self, id: &NotificationId) -> Result<Option<Notification>> {
        self.backend.get_notification(id).await
    }

    pub async fn notifications_for(&self, recipient: &UserId) -> Result<Vec<Notification>> {
        self.backend.notifications_for(recipient).await
    }

    // --- Profiles ---

    pub async fn put_profile(&self, profile: &TaskerProfile) -> Result<()> {
        self.backend.put_profile(profile).await
    }

    pub async fn get_profile(&self, tasker: &UserId) -> Result<Option<TaskerProfile>> {
        self.backend.get_profile(tasker).await
    }

    /// Load the tasker's profile, creating a blank one if none exists.
    pub async fn profile_or_default(&self, tasker: &UserId) -> Result<TaskerProfile> {
        Ok(self
            .backend
            .get_profile(tasker)
            .await?
            .unwrap_or_else(|| TaskerProfile::new(*tasker)))
    }

    // --- Fee policy ---

    pub async fn append_fee_policy(&self, record: &FeePolicyRecord) -> Result<()> {
        self.backend.append_fee_policy(record).await
    }

    pub async fn latest_fee_policy(&self) -> Result<Option<FeePolicyRecord>> {
        self.backend.latest_fee_policy().await
    }

    pub async fn fee_policy_history(&self) -> Result<Vec<FeePolicyRecord>> {
        self.backend.fee_policy_history().await
    }

    // --- Unit of work ---

    pub async fn begin_unit(&self) -> Result<()> {
        self.backend.begin_unit().await
    }

    pub async fn commit_unit(&self) -> Result<()> {
        self.backend.commit_unit().await
    }

    pub async fn rollback_unit(&self) -> Result<()> {
        self.backend.rollback_unit().await
    }

    pub async fn flush(&self) -> Result<()> {
        self.backend.flush().await
    }

    pub async fn stats(&self) -> Result<StorageStats> {
        self.backend.stats().await
    }
}
