//! Market coordinator: wires the managers over one storage engine and
//! one notification emitter, and is the single entry point the node
//! embeds.

use crate::bids::BidLedger;
use crate::directory::CategoryDirectory;
use crate::fees::FeePolicyManager;
use crate::lifecycle::TaskLifecycle;
use crate::notify::{NotificationEmitter, PushDelivery, RealtimeDelivery};
use crate::query::{QueryConfig, TaskSearch};
use crate::reviews::ReviewManager;
use std::sync::Arc;
use taskbay_storage::{StorageEngine, StorageStats};

/// Configuration for the market core.
#[derive(Debug, Clone, Default)]
pub struct MarketConfig {
    pub query: QueryConfig,
}

pub struct MarketCoordinator {
    pub fees: Arc<FeePolicyManager>,
    pub bids: Arc<BidLedger>,
    pub lifecycle: Arc<TaskLifecycle>,
    pub reviews: Arc<ReviewManager>,
    pub notifications: Arc<NotificationEmitter>,
    pub search: Arc<TaskSearch>,
    storage: Arc<StorageEngine>,
}

impl MarketCoordinator {
    pub fn new(
        config: MarketConfig,
        storage: Arc<StorageEngine>,
        categories: Arc<dyn CategoryDirectory>,
        realtime: Arc<dyn RealtimeDelivery>,
        push: Arc<dyn PushDelivery>,
    ) -> Self {
        let emitter = Arc::new(NotificationEmitter::new(storage.clone(), realtime, push));
        let fees = Arc::new(FeePolicyManager::new(storage.clone()));
        let bids = Arc::new(BidLedger::new(storage.clone(), emitter.clone()));
        let lifecycle = Arc::new(TaskLifecycle::new(
            storage.clone(),
            fees.clone(),
            emitter.clone(),
            categories,
        ));
        let reviews = Arc::new(ReviewManager::new(storage.clone(), emitter.clone()));
        let search = Arc::new(TaskSearch::new(storage.clone(), config.query));

        Self {
            fees,
            bids,
            lifecycle,
            reviews,
            notifications: emitter,
            search,
            storage,
        }
    }

    pub async fn storage_stats(&self) -> crate::error::Result<StorageStats> {
        Ok(self.storage.stats().await?)
    }
}
