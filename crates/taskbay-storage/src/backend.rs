use async_trait::async_trait;
use taskbay_types::{
    Bid, BidId, FeePolicyRecord, Notification, NotificationId, Review, ReviewId, Task, TaskId,
    TaskerProfile, UserId,
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// Trait for document-store backend implementations.
///
/// Writes are upserts keyed by entity id. Backends also maintain the
/// secondary indexes the market needs (bids by task, bids by tasker,
/// reviews by tasker, notifications by recipient).
#[async_trait]
pub trait StorageBackend: Send + Sync {
    // Tasks
    async fn put_task(&self, task: &Task) -> Result<()>;
    async fn get_task(&self, id: &TaskId) -> Result<Option<Task>>;
    async fn delete_task(&self, id: &TaskId) -> Result<()>;
    async fn list_tasks(&self) -> Result<Vec<Task>>;

    // Bids
    async fn put_bid(&self, bid: &Bid) -> Result<()>;
    async fn get_bid(&self, id: &BidId) -> Result<Option<Bid>>;
    async fn delete_bid(&self, id: &BidId) -> Result<()>;
    async fn bids_for_task(&self, task: &TaskId) -> Result<Vec<Bid>>;
    async fn bids_for_tasker(&self, tasker: &UserId) -> Result<Vec<Bid>>;

    // Reviews
    async fn put_review(&self, review: &Review) -> Result<()>;
    async fn get_review(&self, id: &ReviewId) -> Result<Option<Review>>;
    async fn reviews_for_tasker(&self, tasker: &UserId) -> Result<Vec<Review>>;
    async fn review_for_task_by(
        &self,
        task: &TaskId,
        reviewer: &UserId,
    ) -> Result<Option<Review>>;

    // Notifications
    async fn put_notification(&self, notification: &Notification) -> Result<()>;
    async fn get_notification(&self, id: &NotificationId) -> Result<Option<Notification>>;
    async fn notifications_for(&self, recipient: &UserId) -> Result<Vec<Notification>>;

    // Tasker profiles (rating cache + completed-task counter)
    async fn put_profile(&self, profile: &TaskerProfile) -> Result<()>;
    async fn get_profile(&self, tasker: &UserId) -> Result<Option<TaskerProfile>>;

    // Fee policy history (append-only; latest record wins)
    async fn append_fee_policy(&self, record: &FeePolicyRecord) -> Result<()>;
    async fn latest_fee_policy(&self) -> Result<Option<FeePolicyRecord>>;
    async fn fee_policy_history(&self) -> Result<Vec<FeePolicyRecord>>;

    /// Begin a unit of work. Units are mutually exclusive: a second
    /// `begin_unit` waits until the first commits or rolls back, which is
    /// what lets callers re-check guards against fresh reads before
    /// committing multi-entity updates.
    async fn begin_unit(&self) -> Result<()>;

    /// Commit the current unit of work.
    async fn commit_unit(&self) -> Result<()>;

    /// Abandon the current unit of work.
    async fn rollback_unit(&self) -> Result<()>;

    /// Flush any pending writes.
    async fn flush(&self) -> Result<()>;

    /// Entity counts for status reporting.
    async fn stats(&self) -> Result<StorageStats>;
}

#[derive(Debug, Clone, Default)]
pub struct StorageStats {
    pub task_count: usize,
    pub bid_count: usize,
    pub review_count: usize,
    pub notification_count: usize,
}
