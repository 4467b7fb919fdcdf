use std::sync::Arc;

use parking_lot::{ArcRwLockReadGuard, ArcRwLockWriteGuard, RawRwLock};

use crate::buffer::buffer_pool_manager::BufferPoolManager;
use crate::common::access_type::AccessType;
use crate::common::config::{PageId, BUSTUB_PAGE_SIZE};
use crate::storage::page::page::Page;

/// Scoped handle coupling a pinned page to a caller scope. Dropping (or
/// explicitly calling `release`) unpins the page exactly once, regardless
/// of how many times the guard was moved beforehand.
///
/// `Read`/`Write` guards wrap a `BasicPageGuard` and additionally hold the
/// page's content latch.
pub struct BasicPageGuard {
    bpm: Option<Arc<BufferPoolManager>>,
    page: Page,
    is_dirty: bool,
}

impl BasicPageGuard {
    pub(crate) fn new(bpm: Arc<BufferPoolManager>, page: Page) -> BasicPageGuard {
        Self {
            bpm: Some(bpm),
            page,
            is_dirty: false,
        }
    }

    /// Marks whether the page should be written back as dirty when this
    /// guard is released. Defaults to `false` — callers that only read
    /// through a `BasicPageGuard` should never generate a spurious write.
    pub fn set_dirty(&mut self, is_dirty: bool) {
        self.is_dirty = is_dirty;
    }

    /// Unpins the page and marks this guard released. Calling `release`
    /// more than once (or letting a released guard drop) is a no-op.
    pub fn release(&mut self) {
        if let Some(bpm) = self.bpm.take() {
            bpm.unpin_page(self.page.page_id(), self.is_dirty, AccessType::Unknown);
        }
    }

    /// Consumes this guard and returns one holding the page's read latch.
    /// The page remains pinned across the upgrade.
    pub fn upgrade_read(mut self) -> ReadPageGuard {
        let latch = self.page.content_arc().read_arc();
        let bpm = self.bpm.take().expect("guard already released");
        let basic = BasicPageGuard {
            bpm: Some(bpm),
            page: self.page.clone(),
            is_dirty: false,
        };
        ReadPageGuard {
            latch: Some(latch),
            guard: basic,
        }
    }

    /// Consumes this guard and returns one holding the page's write latch.
    /// The page remains pinned across the upgrade.
    pub fn upgrade_write(mut self) -> WritePageGuard {
        let latch = self.page.content_arc().write_arc();
        let bpm = self.bpm.take().expect("guard already released");
        let basic = BasicPageGuard {
            bpm: Some(bpm),
            page: self.page.clone(),
            is_dirty: false,
        };
        WritePageGuard {
            latch: Some(latch),
            guard: basic,
        }
    }

    pub fn page_id(&self) -> PageId {
        self.page.page_id()
    }

    pub fn get_data(&self) -> parking_lot::RwLockReadGuard<'_, [u8; BUSTUB_PAGE_SIZE]> {
        self.page.get_data()
    }

    pub fn get_data_mut(&mut self) -> parking_lot::RwLockWriteGuard<'_, [u8; BUSTUB_PAGE_SIZE]> {
        self.is_dirty = true;
        self.page.get_data_mut()
    }
}

impl Drop for BasicPageGuard {
    fn drop(&mut self) {
        self.release();
    }
}

/// A `BasicPageGuard` that additionally holds the page's read latch.
/// Multiple `ReadPageGuard`s over the same page may coexist.
pub struct ReadPageGuard {
    latch: Option<ArcRwLockReadGuard<RawRwLock, [u8; BUSTUB_PAGE_SIZE]>>,
    guard: BasicPageGuard,
}

impl ReadPageGuard {
    pub(crate) fn new(bpm: Arc<BufferPoolManager>, page: Page) -> Self {
        let latch = page.content_arc().read_arc();
        Self {
            latch: Some(latch),
            guard: BasicPageGuard::new(bpm, page),
        }
    }

    /// Releases the read latch, then unpins the underlying page. No-op if
    /// already released.
    pub fn release(&mut self) {
        self.latch.take();
        self.guard.release();
    }

    pub fn page_id(&self) -> PageId {
        self.guard.page_id()
    }

    pub fn get_data(&self) -> &[u8; BUSTUB_PAGE_SIZE] {
        self.latch.as_deref().expect("guard already released")
    }
}

impl Drop for ReadPageGuard {
    fn drop(&mut self) {
        self.release();
    }
}

/// A `BasicPageGuard` that additionally holds the page's exclusive write
/// latch. At most one `WritePageGuard` exists per page at a time, and no
/// concurrent `ReadPageGuard`s.
pub struct WritePageGuard {
    latch: Option<ArcRwLockWriteGuard<RawRwLock, [u8; BUSTUB_PAGE_SIZE]>>,
    guard: BasicPageGuard,
}

impl WritePageGuard {
    pub(crate) fn new(bpm: Arc<BufferPoolManager>, page: Page) -> Self {
        let latch = page.content_arc().write_arc();
        Self {
            latch: Some(latch),
            guard: BasicPageGuard::new(bpm, page),
        }
    }

    /// Releases the write latch, then unpins the underlying page, marking
    /// it dirty. No-op if already released.
    pub fn release(&mut self) {
        if self.latch.take().is_some() {
            self.guard.set_dirty(true);
        }
        self.guard.release();
    }

    pub fn page_id(&self) -> PageId {
        self.guard.page_id()
    }

    pub fn get_data(&self) -> &[u8; BUSTUB_PAGE_SIZE] {
        self.latch.as_deref().expect("guard already released")
    }

    pub fn get_data_mut(&mut self) -> &mut [u8; BUSTUB_PAGE_SIZE] {
        self.latch.as_deref_mut().expect("guard already released")
    }
}

impl Drop for WritePageGuard {
    fn drop(&mut self) {
        self.release();
    }
}
