//! A disk-backed buffer pool: a fixed-size cache of page-sized frames
//! sitting in front of a much larger page-addressable file, with LRU-K
//! governing which pages stay resident.

pub mod buffer;
pub mod common;
pub mod recovery;
pub mod storage;

pub use buffer::buffer_pool_manager::BufferPoolManager;
pub use buffer::lru_k_replacer::LRUKReplacer;
pub use common::access_type::AccessType;
pub use common::config::{
    FrameId, Lsn, PageId, BUSTUB_PAGE_SIZE, INVALID_LSN, INVALID_PAGE_ID, LRUK_REPLACER_K,
};
pub use recovery::log_manager::{LogManager, NoOpLogManager};
pub use storage::disk::{DiskManager, DiskRequest, DiskScheduler};
pub use storage::page::{BasicPageGuard, Page, ReadPageGuard, WritePageGuard};

/// Installs a `tracing` subscriber for tests that want to see the pool's
/// `trace!`/`debug!` events under `cargo test -- --nocapture`. Safe to call
/// from multiple tests; only the first call wins.
#[cfg(test)]
pub(crate) fn init_test_tracing() {
    let _ = tracing_subscriber::fmt::try_init();
}
