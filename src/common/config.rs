//! Fundamental types and constants shared by the buffer pool, the
//! replacer, and the disk layer.

/// Size in bytes of a single page / frame.
pub const BUSTUB_PAGE_SIZE: usize = 4096;

/// Sentinel page-id meaning "no page".
pub const INVALID_PAGE_ID: PageId = std::u32::MAX;

/// Default history depth for the LRU-K replacer when a caller doesn't
/// otherwise specify one.
pub const LRUK_REPLACER_K: usize = 2;

pub type FrameId = usize;
pub type PageId = u32;

/// Log-sequence-number type, used by the page header and the log manager
/// hook. Kept distinct from `PageId` even though both are `u32`-width, to
/// avoid accidental mixing at call sites.
pub type Lsn = u32;

/// Sentinel LSN meaning "no log record associated yet".
pub const INVALID_LSN: Lsn = 0;
