use crate::backend::{Result, StorageBackend, StorageError, StorageStats};
use async_trait::async_trait;
use rocksdb::{Direction, IteratorMode, Options, WriteBatch, DB};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use taskbay_types::{
    Bid, BidId, FeePolicyRecord, Notification, NotificationId, Review, ReviewId, Task, TaskId,
    TaskerProfile, UserId,
};

const FEE_SEQ_KEY: &[u8] = b"feeseq";

/// RocksDB-backed document store.
///
/// Records are serde_json values under prefixed keys; secondary indexes
/// are empty-valued keys whose prefix embeds the owning entity. During a
/// unit of work, writes accumulate in a `WriteBatch` and land atomically
/// on commit.
pub struct RocksBackend {
    db: Arc<DB>,
    unit_gate: Arc<Mutex<()>>,
    unit: std::sync::Mutex<UnitState>,
}

#[derive(Default)]
struct UnitState {
    guard: Option<OwnedMutexGuard<()>>,
    batch: Option<WriteBatch>,
}

impl RocksBackend {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);

        let db = DB::open(&opts, path)
            .map_err(|e| StorageError::Backend(format!("failed to open RocksDB: {}", e)))?;

        Ok(Self {
            db: Arc::new(db),
            unit_gate: Arc::new(Mutex::new(())),
            unit: std::sync::Mutex::new(UnitState::default()),
        })
    }

    fn task_key(id: &TaskId) -> Vec<u8> {
        format!("task:{}", id).into_bytes()
    }

    fn bid_key(id: &BidId) -> Vec<u8> {
        format!("bid:{}", id).into_bytes()
    }

    fn task_bid_key(task: &TaskId, bid: &BidId) -> Vec<u8> {
        format!("tb:{}:{}", task, bid).into_bytes()
    }

    fn tasker_bid_key(tasker: &UserId, bid: &BidId) -> Vec<u8> {
        format!("ub:{}:{}", tasker, bid).into_bytes()
    }

    fn review_key(id: &ReviewId) -> Vec<u8> {
        format!("rev:{}", id).into_bytes()
    }

    fn tasker_review_key(tasker: &UserId, review: &ReviewId) -> Vec<u8> {
        format!("ur:{}:{}", tasker, review).into_bytes()
    }

    fn task_reviewer_key(task: &TaskId, reviewer: &UserId) -> Vec<u8> {
        format!("tr:{}:{}", task, reviewer).into_bytes()
    }

    fn notification_key(id: &NotificationId) -> Vec<u8> {
        format!("ntf:{}", id).into_bytes()
    }

    fn user_notification_key(user: &UserId, id: &NotificationId) -> Vec<u8> {
        format!("un:{}:{}", user, id).into_bytes()
    }

    fn profile_key(tasker: &UserId) -> Vec<u8> {
        format!("prof:{}", tasker).into_bytes()
    }

    fn fee_key(seq: u64) -> Vec<u8> {
        format!("fee:{:020}", seq).into_bytes()
    }

    fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        serde_json::to_vec(value).map_err(|e| StorageError::Serialization(e.to_string()))
    }

    fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        serde_json::from_slice(bytes).map_err(|e| StorageError::Serialization(e.to_string()))
    }

    /// Write through the pending batch when a unit of work is open,
    /// directly otherwise.
    fn write(&self, key: Vec<u8>, value: Vec<u8>) -> Result<()> {
        let mut unit = self.lock_unit()?;
        if let Some(batch) = unit.batch.as_mut() {
            batch.put(key, value);
            return Ok(());
        }
        drop(unit);
        self.db
            .put(key, value)
            .map_err(|e| StorageError::Backend(e.to_string()))
    }

    fn remove(&self, key: Vec<u8>) -> Result<()> {
        let mut unit = self.lock_unit()?;
        if let Some(batch) = unit.batch.as_mut() {
            batch.delete(key);
            return Ok(());
        }
        drop(unit);
        self.db
            .delete(key)
            .map_err(|e| StorageError::Backend(e.to_string()))
    }

    fn read(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.db
            .get(key)
            .map_err(|e| StorageError::Backend(e.to_string()))
    }

    fn lock_unit(&self) -> Result<std::sync::MutexGuard<'_, UnitState>> {
        self.unit
            .lock()
            .map_err(|e| StorageError::Backend(format!("unit state poisoned: {}", e)))
    }

    /// Collect all values whose key starts with `prefix`.
    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<Vec<u8>>> {
        let mut out = Vec::new();
        let iter = self
            .db
            .iterator(IteratorMode::From(prefix, Direction::Forward));
        for item in iter {
            let (key, value) = item.map_err(|e| StorageError::Backend(e.to_string()))?;
            if !key.starts_with(prefix) {
                break;
            }
            out.push(value.to_vec());
        }
        Ok(out)
    }

    /// Collect the trailing id segment of every key under `prefix`.
    fn scan_prefix_ids(&self, prefix: &[u8]) -> Result<Vec<String>> {
        let mut out = Vec::new();
        let iter = self
            .db
            .iterator(IteratorMode::From(prefix, Direction::Forward));
        for item in iter {
            let (key, _) = item.map_err(|e| StorageError::Backend(e.to_string()))?;
            if !key.starts_with(prefix) {
                break;
            }
            let suffix = String::from_utf8_lossy(&key[prefix.len()..]).into_owned();
            out.push(suffix);
        }
        Ok(out)
    }

    fn count_prefix(&self, prefix: &[u8]) -> Result<usize> {
        Ok(self.scan_prefix_ids(prefix)?.len())
    }
}

#[async_trait]
impl StorageBackend for RocksBackend {
    async fn put_task(&self, task: &Task) -> Result<()> {
        self.write(Self::task_key(&task.id), Self::encode(task)?)
    }

    async fn get_task(&self, id: &TaskId) -> Result<Option<Task>> {
        match self.read(&Self::task_key(id))? {
            Some(bytes) => Ok(Some(Self::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn delete_task(&self, id: &TaskId) -> Result<()> {
        if self.read(&Self::task_key(id))?.is_none() {
            return Err(StorageError::NotFound(id.to_string()));
        }
        self.remove(Self::task_key(id))
    }

    async fn list_tasks(&self) -> Result<Vec<Task>> {
        self.scan_prefix(b"task:")?
            .iter()
            .map(|bytes| Self::decode(bytes))
            .collect()
    }

    async fn put_bid(&self, bid: &Bid) -> Result<()> {
        self.write(Self::bid_key(&bid.id), Self::encode(bid)?)?;
        self.write(Self::task_bid_key(&bid.task, &bid.id), Vec::new())?;
        self.write(Self::tasker_bid_key(&bid.tasker, &bid.id), Vec::new())
    }

    async fn get_bid(&self, id: &BidId) -> Result<Option<Bid>> {
        match self.read(&Self::bid_key(id))? {
            Some(bytes) => Ok(Some(Self::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn delete_bid(&self, id: &BidId) -> Result<()> {
        let bid: Bid = match self.read(&Self::bid_key(id))? {
            Some(bytes) => Self::decode(&bytes)?,
            None => return Err(StorageError::NotFound(id.to_string())),
        };
        self.remove(Self::bid_key(id))?;
        self.remove(Self::task_bid_key(&bid.task, &bid.id))?;
        self.remove(Self::tasker_bid_key(&bid.tasker, &bid.id))
    }

    async fn bids_for_task(&self, task: &TaskId) -> Result<Vec<Bid>> {
        let prefix = format!("tb:{}:", task).into_bytes();
        let mut bids = Vec::new();
        for id in self.scan_prefix_ids(&prefix)? {
            let bid_id = BidId::from_hex(&id)
                .map_err(|e| StorageError::Serialization(e.to_string()))?;
            if let Some(bid) = self.get_bid(&bid_id).await? {
                bids.push(bid);
            }
        }
        Ok(bids)
    }

    async fn bids_for_tasker(&self, tasker: &UserId) -> Result<Vec<Bid>> {
        let prefix = format!("ub:{}:", tasker).into_bytes();
        let mut bids = Vec::new();
        for id in self.scan_prefix_ids(&prefix)? {
            let bid_id = BidId::from_hex(&id)
                .map_err(|e| StorageError::Serialization(e.to_string()))?;
            if let Some(bid) = self.get_bid(&bid_id).await? {
                bids.push(bid);
            }
        }
        Ok(bids)
    }

    async fn put_review(&self, review: &Review) -> Result<()> {
        self.write(Self::review_key(&review.id), Self::encode(review)?)?;
        self.write(
            Self::tasker_review_key(&review.tasker, &review.id),
            Vec::new(),
        )?;
        self.write(
            Self::task_reviewer_key(&review.task, &review.reviewer),
            review.id.to_hex().into_bytes(),
        )
    }

    async fn get_review(&self, id: &ReviewId) -> Result<Option<Review>> {
        match self.read(&Self::review_key(id))? {
            Some(bytes) => Ok(Some(Self::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn reviews_for_tasker(&self, tasker: &UserId) -> Result<Vec<Review>> {
        let prefix = format!("ur:{}:", tasker).into_bytes();
        let mut reviews = Vec::new();
        for id in self.scan_prefix_ids(&prefix)? {
            let review_id = ReviewId::from_hex(&id)
                .map_err(|e| StorageError::Serialization(e.to_string()))?;
            if let Some(review) = self.get_review(&review_id).await? {
                reviews.push(review);
            }
        }
        Ok(reviews)
    }

    async fn review_for_task_by(
        &self,
        task: &TaskId,
        reviewer: &UserId,
    ) -> Result<Option<Review>> {
        match self.read(&Self::task_reviewer_key(task, reviewer))? {
            Some(bytes) => {
                let id_hex = String::from_utf8_lossy(&bytes).into_owned();
                let review_id = ReviewId::from_hex(&id_hex)
                    .map_err(|e| StorageError::Serialization(e.to_string()))?;
                self.get_review(&review_id).await
            }
            None => Ok(None),
        }
    }

    async fn put_notification(&self, notification: &Notification) -> Result<()> {
        self.write(
            Self::notification_key(&notification.id),
            Self::encode(notification)?,
        )?;
        self.write(
            Self::user_notification_key(&notification.recipient, &notification.id),
            Vec::new(),
        )
    }

    async fn get_notification(&self, id: &NotificationId) -> Result<Option<Notification>> {
        match self.read(&Self::notification_key(id))? {
            Some(bytes) => Ok(Some(Self::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn notifications_for(&self, recipient: &UserId) -> Result<Vec<Notification>> {
        let prefix = format!("un:{}:", recipient).into_bytes();
        let mut notifications = Vec::new();
        for id in self.scan_prefix_ids(&prefix)? {
            let ntf_id = NotificationId::from_hex(&id)
                .map_err(|e| StorageError::Serialization(e.to_string()))?;
            if let Some(n) = self.get_notification(&ntf_id).await? {
                notifications.push(n);
            }
        }
        Ok(notifications)
    }

    async fn put_profile(&self, profile: &TaskerProfile) -> Result<()> {
        self.write(Self::profile_key(&profile.tasker), Self::encode(profile)?)
    }

    async fn get_profile(&self, tasker: &UserId) -> Result<Option<TaskerProfile>> {
        match self.read(&Self::profile_key(tasker))? {
            Some(bytes) => Ok(Some(Self::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn append_fee_policy(&self, record: &FeePolicyRecord) -> Result<()> {
        let seq = match self.read(FEE_SEQ_KEY)? {
            Some(bytes) => {
                let mut arr = [0u8; 8];
                if bytes.len() == 8 {
                    arr.copy_from_slice(&bytes);
                }
                u64::from_be_bytes(arr)
            }
            None => 0,
        };
        self.write(Self::fee_key(seq), Self::encode(record)?)?;
        self.write(FEE_SEQ_KEY.to_vec(), (seq + 1).to_be_bytes().to_vec())
    }

    async fn latest_fee_policy(&self) -> Result<Option<FeePolicyRecord>> {
        Ok(self.fee_policy_history().await?.pop())
    }

    async fn fee_policy_history(&self) -> Result<Vec<FeePolicyRecord>> {
        self.scan_prefix(b"fee:")?
            .iter()
            .map(|bytes| Self::decode(bytes))
            .collect()
    }

    async fn begin_unit(&self) -> Result<()> {
        let guard = self.unit_gate.clone().lock_owned().await;
        let mut unit = self.lock_unit()?;
        unit.guard = Some(guard);
        unit.batch = Some(WriteBatch::default());
        Ok(())
    }

    async fn commit_unit(&self) -> Result<()> {
        // The gate stays held until the batch has landed.
        let (batch, _guard) = {
            let mut unit = self.lock_unit()?;
            let batch = unit
                .batch
                .take()
                .ok_or_else(|| StorageError::Backend("no unit of work in progress".into()))?;
            (batch, unit.guard.take())
        };
        self.db
            .write(batch)
            .map_err(|e| StorageError::Backend(e.to_string()))
    }

    async fn rollback_unit(&self) -> Result<()> {
        let mut unit = self.lock_unit()?;
        unit.batch.take();
        unit.guard.take();
        Ok(())
    }

    async fn flush(&self) -> Result<()> {
        self.db
            .flush()
            .map_err(|e| StorageError::Backend(e.to_string()))
    }

    async fn stats(&self) -> Result<StorageStats> {
        Ok(StorageStats {
            task_count: self.count_prefix(b"task:")?,
            bid_count: self.count_prefix(b"bid:")?,
            review_count: self.count_prefix(b"rev:")?,
            notification_count: self.count_prefix(b"ntf:")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskbay_types::{Actor, Amount, Role};

    fn tasker_actor(id: UserId) -> Actor {
        Actor::new(id, Role::Tasker, "Pat", "pat@example.com")
    }

    #[tokio::test]
    async fn bid_round_trip_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let backend = RocksBackend::new(dir.path()).unwrap();

        let task = TaskId::from_bytes([1u8; 32]);
        let tasker = UserId::from_bytes([2u8; 32]);
        let bid = Bid::new(task, &tasker_actor(tasker), Amount::from_major(40), "hello", None);

        backend.put_bid(&bid).await.unwrap();
        let loaded = backend.get_bid(&bid.id).await.unwrap().unwrap();
        assert_eq!(loaded.amount, Amount::from_major(40));
        assert_eq!(backend.bids_for_task(&task).await.unwrap().len(), 1);
        assert_eq!(backend.bids_for_tasker(&tasker).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unit_of_work_lands_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let backend = RocksBackend::new(dir.path()).unwrap();

        let task = TaskId::from_bytes([1u8; 32]);
        let tasker = UserId::from_bytes([2u8; 32]);
        let bid = Bid::new(task, &tasker_actor(tasker), Amount::from_major(40), "hello", None);

        backend.begin_unit().await.unwrap();
        backend.put_bid(&bid).await.unwrap();
        // Nothing visible until commit
        assert!(backend.get_bid(&bid.id).await.unwrap().is_none());
        backend.commit_unit().await.unwrap();
        assert!(backend.get_bid(&bid.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn rollback_discards_pending_writes() {
        let dir = tempfile::tempdir().unwrap();
        let backend = RocksBackend::new(dir.path()).unwrap();

        let task = TaskId::from_bytes([1u8; 32]);
        let bid = Bid::new(
            task,
            &tasker_actor(UserId::from_bytes([2u8; 32])),
            Amount::from_major(40),
            "hello",
            None,
        );

        backend.begin_unit().await.unwrap();
        backend.put_bid(&bid).await.unwrap();
        backend.rollback_unit().await.unwrap();
        assert!(backend.get_bid(&bid.id).await.unwrap().is_none());
    }
}
