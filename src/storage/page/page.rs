use std::sync::Arc;

use parking_lot::RwLock;

use crate::common::config::{FrameId, Lsn, PageId, BUSTUB_PAGE_SIZE};

const OFFSET_LSN: usize = 4;

/// The page header carries its LSN at a fixed offset; the buffer pool reads
/// it directly (without going through a `Page` handle) when deciding
/// whether to ask a log manager to flush before a dirty eviction.
pub(crate) fn read_lsn(data: &[u8; BUSTUB_PAGE_SIZE]) -> Lsn {
    Lsn::from_ne_bytes(
        data[OFFSET_LSN..OFFSET_LSN + std::mem::size_of::<Lsn>()]
            .try_into()
            .unwrap(),
    )
}

fn write_lsn(data: &mut [u8; BUSTUB_PAGE_SIZE], lsn: Lsn) {
    data[OFFSET_LSN..OFFSET_LSN + std::mem::size_of::<Lsn>()].copy_from_slice(&lsn.to_ne_bytes());
}

/// A cheap, cloneable handle to one resident page's byte buffer.
///
/// `Page` does not carry pin-count or dirty-bit bookkeeping — that
/// metadata is owned exclusively by the `BufferPoolManager` so that it can
/// be mutated and inspected atomically alongside the page table and free
/// list. `Page` only owns a reference to the frame's content latch, which
/// is orthogonal to that metadata: the content latch guards the bytes, not
/// the pin/dirty state.
#[derive(Debug, Clone)]
pub struct Page {
    page_id: PageId,
    frame_id: FrameId,
    content: Arc<RwLock<[u8; BUSTUB_PAGE_SIZE]>>,
}

impl Page {
    pub(crate) fn new(page_id: PageId, frame_id: FrameId, content: Arc<RwLock<[u8; BUSTUB_PAGE_SIZE]>>) -> Self {
        Self {
            page_id,
            frame_id,
            content,
        }
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    pub(crate) fn frame_id(&self) -> FrameId {
        self.frame_id
    }

    pub(crate) fn content_arc(&self) -> Arc<RwLock<[u8; BUSTUB_PAGE_SIZE]>> {
        self.content.clone()
    }

    /// Reads the page's raw bytes, latching for the duration of the
    /// returned guard. Callers that need release-ordering guarantees with
    /// respect to pinning should prefer `BufferPoolManager::fetch_page_read`.
    pub fn get_data(&self) -> parking_lot::RwLockReadGuard<'_, [u8; BUSTUB_PAGE_SIZE]> {
        self.content.read()
    }

    /// Mutably accesses the page's raw bytes. See `get_data` for the
    /// latching caveat.
    pub fn get_data_mut(&self) -> parking_lot::RwLockWriteGuard<'_, [u8; BUSTUB_PAGE_SIZE]> {
        self.content.write()
    }

    pub fn get_lsn(&self) -> Lsn {
        read_lsn(&self.content.read())
    }

    pub fn set_lsn(&self, lsn: Lsn) {
        write_lsn(&mut self.content.write(), lsn);
    }
}
