pub mod access_type;
pub mod config;

pub use access_type::AccessType;
pub use config::{FrameId, Lsn, PageId, BUSTUB_PAGE_SIZE, INVALID_LSN, INVALID_PAGE_ID, LRUK_REPLACER_K};
