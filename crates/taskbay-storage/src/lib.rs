//! Document storage for the taskbay marketplace.
//!
//! A [`StorageBackend`] stores tasks, bids, reviews, notifications,
//! tasker profiles, and the fee policy history, and maintains the
//! secondary indexes the market layer queries. Two implementations ship:
//! an in-memory backend and a RocksDB backend behind the `rocksdb`
//! feature. [`StorageEngine`] selects and wraps a backend.

pub mod backend;
pub mod memory;
#[cfg(feature = "rocksdb")]
pub mod rocks;
pub mod store;

pub use backend::{Result, StorageBackend, StorageError, StorageStats};
pub use memory::MemoryBackend;
#[cfg(feature = "rocksdb")]
pub use rocks::RocksBackend;
pub use store::{BackendType, StorageConfig, StorageEngine};
