//! # Taskbay Market
//!
//! The task-marketplace core: lifecycle, bidding, fees, reviews, and
//! notification side effects.
//!
//! ## Architecture
//!
//! - **Fee Policy** (`fees`): append-only policy history and the pure
//!   fee computation applied to task budgets.
//! - **Bid Ledger** (`bids`): one live bid per (task, tasker), pending-only
//!   mutation, and the atomic accept-one/reject-rest unit of work.
//! - **Task Lifecycle** (`lifecycle`): the status state machine from
//!   `open` through `completed`, including the completion-request
//!   confirm/reject sub-flow.
//! - **Task Search** (`query`): filtered, geo-aware, paginated listings.
//! - **Notification Emitter** (`notify`): persists notification records
//!   and fans out to best-effort real-time and push capabilities.
//! - **Reviews** (`reviews`): post-completion ratings and the tasker
//!   rating cache.
//!
//! Authorization is a single capability predicate (`authz::can_act`);
//! categories are an injected collaborator (`directory`); everything
//! persists through `taskbay_storage::StorageEngine`.

pub mod authz;
pub mod bids;
pub mod coordinator;
pub mod directory;
pub mod error;
pub mod fees;
pub mod lifecycle;
pub mod notify;
pub mod query;
pub mod reviews;

pub use authz::{can_act, TaskAction};
pub use bids::{BidChanges, BidDraft, BidLedger, BidView, TaskStatusFilter, TaskerBid};
pub use coordinator::{MarketConfig, MarketCoordinator};
pub use directory::{CategoryDirectory, StaticCategoryDirectory};
pub use error::{MarketError, Result};
pub use fees::{compute_fees, FeePolicyManager, FeePolicyUpdate};
pub use lifecycle::{TaskChanges, TaskDraft, TaskLifecycle};
pub use notify::{NoDelivery, NotificationEmitter, PushDelivery, RealtimeDelivery};
pub use query::{GeoCircle, QueryConfig, TaskListing, TaskPage, TaskQuery, TaskSearch};
pub use reviews::ReviewManager;
