use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::sync::oneshot;

use super::lru_k_replacer::LRUKReplacer;
use crate::common::access_type::AccessType;
use crate::common::config::{FrameId, PageId, BUSTUB_PAGE_SIZE, INVALID_PAGE_ID, LRUK_REPLACER_K};
use crate::recovery::log_manager::LogManager;
use crate::storage::disk::{DiskManager, DiskRequest, DiskScheduler};
use crate::storage::page::page::read_lsn;
use crate::storage::page::{BasicPageGuard, Page, ReadPageGuard, WritePageGuard};

type Content = Arc<RwLock<[u8; BUSTUB_PAGE_SIZE]>>;

/// Metadata the pool keeps per frame, separate from the frame's content
/// latch so it can be inspected and mutated atomically alongside the page
/// table and free list under a single lock.
#[derive(Debug, Clone, Copy)]
struct FrameMeta {
    page_id: PageId,
    pin_count: i32,
    is_dirty: bool,
}

impl Default for FrameMeta {
    fn default() -> Self {
        Self {
            page_id: INVALID_PAGE_ID,
            pin_count: 0,
            is_dirty: false,
        }
    }
}

/// Everything the pool mutates under its single mutex: per-frame
/// bookkeeping, the page table, the free list, and the replacer. Frame
/// content lives outside this struct so that readers/writers of page bytes
/// never contend with callers only touching metadata.
struct Inner {
    frames: Vec<FrameMeta>,
    page_table: HashMap<PageId, FrameId>,
    free_list: VecDeque<FrameId>,
    next_page_id: PageId,
    replacer: LRUKReplacer,
}

/// Coordinates a fixed-size pool of in-memory frames backing a much larger
/// disk-resident page space, deciding which pages are memory-resident at
/// any moment and brokering all reads and writes of page content through
/// pinning.
///
/// A single mutex (`inner`) guards page-table, free-list, and replacer
/// state for the duration of every operation, including any disk I/O that
/// operation triggers. This is the coarser of the two strategies such an
/// implementation can pick, but it is race-free by construction: no other
/// caller can observe a frame as "reusable" while its eviction write-back
/// is still in flight. Frame content itself is guarded independently by a
/// per-frame `RwLock`, acquired only after the mutex has established that
/// the frame is pinned, so concurrent readers/writers of already-resident
/// pages never wait on pool-wide bookkeeping.
pub struct BufferPoolManager {
    pool_size: usize,
    contents: Vec<Content>,
    inner: Mutex<Inner>,
    disk_scheduler: DiskScheduler,
    log_manager: Option<Arc<dyn LogManager>>,
}

impl BufferPoolManager {
    /// Creates a pool of `pool_size` frames backed by `disk_manager`, with
    /// `replacer_k` historical accesses tracked per frame by the LRU-K
    /// replacer.
    pub fn new(pool_size: usize, disk_manager: DiskManager, replacer_k: usize) -> Self {
        Self::with_log_manager(pool_size, disk_manager, replacer_k, None)
    }

    /// Like `new`, but with the replacer's `k` defaulted to
    /// `LRUK_REPLACER_K`.
    pub fn with_default_k(pool_size: usize, disk_manager: DiskManager) -> Self {
        Self::new(pool_size, disk_manager, LRUK_REPLACER_K)
    }

    /// Like `new`, but with a log manager consulted before a dirty frame is
    /// evicted, so the write-ahead log can be flushed up to the evicted
    /// page's LSN first. Pass `None` to disable this (the default via
    /// `new`).
    pub fn with_log_manager(
        pool_size: usize,
        disk_manager: DiskManager,
        replacer_k: usize,
        log_manager: Option<Arc<dyn LogManager>>,
    ) -> Self {
        let free_list = (0..pool_size).collect();
        let frames = vec![FrameMeta::default(); pool_size];
        let contents = (0..pool_size)
            .map(|_| Arc::new(RwLock::new([0u8; BUSTUB_PAGE_SIZE])))
            .collect();

        Self {
            pool_size,
            contents,
            inner: Mutex::new(Inner {
                frames,
                page_table: HashMap::new(),
                free_list,
                next_page_id: 0,
                replacer: LRUKReplacer::new(pool_size, replacer_k),
            }),
            disk_scheduler: DiskScheduler::new(disk_manager),
            log_manager,
        }
    }

    /// Number of frames in the pool.
    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    fn write_through(&self, page_id: PageId, content: Content) {
        let (tx, rx) = oneshot::channel();
        self.disk_scheduler.schedule(DiskRequest::Write {
            page_id,
            content,
            callback: tx,
        });
        rx.blocking_recv()
            .expect("disk scheduler dropped write callback");
    }

    fn read_through(&self, page_id: PageId, content: Content) {
        let (tx, rx) = oneshot::channel();
        self.disk_scheduler.schedule(DiskRequest::Read {
            page_id,
            content,
            callback: tx,
        });
        rx.blocking_recv()
            .expect("disk scheduler dropped read callback");
    }

    /// Obtains a frame to admit a page into, preferring the free list over
    /// eviction. Flushes the victim frame first if it's dirty. Returns
    /// `None` if the pool is exhausted (no free frame, nothing evictable).
    fn acquire_victim_frame(&self, inner: &mut Inner) -> Option<FrameId> {
        if let Some(frame_id) = inner.free_list.pop_front() {
            return Some(frame_id);
        }

        let frame_id = inner.replacer.evict()?;
        let victim_page_id = inner.frames[frame_id].page_id;

        if inner.frames[frame_id].is_dirty {
            if let Some(log_manager) = &self.log_manager {
                let lsn = read_lsn(&self.contents[frame_id].read());
                log_manager.flush_up_to(lsn);
            }
            self.write_through(victim_page_id, self.contents[frame_id].clone());
            inner.frames[frame_id].is_dirty = false;
        }

        inner.page_table.remove(&victim_page_id);
        tracing::debug!(frame_id, victim_page_id, "evicted frame for reuse");
        Some(frame_id)
    }

    fn allocate_page(&self, inner: &mut Inner) -> PageId {
        let page_id = inner.next_page_id;
        inner.next_page_id += 1;
        page_id
    }

    /// Imitates freeing a page's backing storage on disk. A no-op until
    /// the disk manager tracks free space, but called in the right place
    /// so deletion's contract doesn't change once it does.
    fn deallocate_page(&self, page_id: PageId) {
        let _ = page_id;
    }

    /// Allocates a brand-new page, admitting it into a frame. Returns
    /// `None` if every frame is pinned.
    pub fn new_page(&self) -> Option<Page> {
        let mut inner = self.inner.lock();
        let frame_id = self.acquire_victim_frame(&mut inner)?;
        let page_id = self.allocate_page(&mut inner);

        self.contents[frame_id].write().fill(0);

        let meta = &mut inner.frames[frame_id];
        meta.page_id = page_id;
        meta.pin_count = 1;
        meta.is_dirty = false;

        inner.page_table.insert(page_id, frame_id);
        inner.replacer.record_access(frame_id, AccessType::Unknown);
        inner.replacer.set_evictable(frame_id, false);

        tracing::debug!(page_id, frame_id, "new_page");
        Some(Page::new(page_id, frame_id, self.contents[frame_id].clone()))
    }

    /// `new_page`, wrapped in a `BasicPageGuard`. The freshly zeroed page
    /// has no counterpart on stable storage yet, so the guard starts out
    /// marked dirty.
    pub fn new_page_guarded(self: &Arc<Self>) -> Option<BasicPageGuard> {
        let page = self.new_page()?;
        let mut guard = BasicPageGuard::new(self.clone(), page);
        guard.set_dirty(true);
        Some(guard)
    }

    /// Fetches `page_id`, reading it from disk into a frame if it isn't
    /// already resident. Returns `None` if the page isn't resident and the
    /// pool has no frame free to admit it into.
    pub fn fetch_page(&self, page_id: PageId, access_type: AccessType) -> Option<Page> {
        let mut inner = self.inner.lock();

        if let Some(&frame_id) = inner.page_table.get(&page_id) {
            inner.frames[frame_id].pin_count += 1;
            inner.replacer.record_access(frame_id, access_type);
            inner.replacer.set_evictable(frame_id, false);
            tracing::trace!(page_id, frame_id, "fetch_page hit");
            return Some(Page::new(page_id, frame_id, self.contents[frame_id].clone()));
        }

        let frame_id = self.acquire_victim_frame(&mut inner)?;
        self.read_through(page_id, self.contents[frame_id].clone());

        let meta = &mut inner.frames[frame_id];
        meta.page_id = page_id;
        meta.pin_count = 1;
        meta.is_dirty = false;

        inner.page_table.insert(page_id, frame_id);
        inner.replacer.record_access(frame_id, access_type);
        inner.replacer.set_evictable(frame_id, false);

        tracing::debug!(page_id, frame_id, "fetch_page miss");
        Some(Page::new(page_id, frame_id, self.contents[frame_id].clone()))
    }

    /// `fetch_page`, wrapped in a `BasicPageGuard`.
    pub fn fetch_page_basic(self: &Arc<Self>, page_id: PageId) -> Option<BasicPageGuard> {
        let page = self.fetch_page(page_id, AccessType::Unknown)?;
        Some(BasicPageGuard::new(self.clone(), page))
    }

    /// `fetch_page`, returning a guard already holding the page's read
    /// latch.
    pub fn fetch_page_read(self: &Arc<Self>, page_id: PageId) -> Option<ReadPageGuard> {
        let page = self.fetch_page(page_id, AccessType::Unknown)?;
        Some(ReadPageGuard::new(self.clone(), page))
    }

    /// `fetch_page`, returning a guard already holding the page's write
    /// latch.
    pub fn fetch_page_write(self: &Arc<Self>, page_id: PageId) -> Option<WritePageGuard> {
        let page = self.fetch_page(page_id, AccessType::Unknown)?;
        Some(WritePageGuard::new(self.clone(), page))
    }

    /// Decrements `page_id`'s pin count, marking its frame evictable once
    /// the count reaches zero. `is_dirty` is OR'd into the frame's dirty
    /// bit rather than overwriting it, so one caller's clean unpin can't
    /// erase another's prior dirty write.
    ///
    /// Returns `false` if the page isn't resident or its pin count is
    /// already zero.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool, access_type: AccessType) -> bool {
        let _ = access_type;
        let mut inner = self.inner.lock();
        let Some(&frame_id) = inner.page_table.get(&page_id) else {
            return false;
        };

        let meta = &mut inner.frames[frame_id];
        if meta.pin_count <= 0 {
            return false;
        }
        meta.pin_count -= 1;
        meta.is_dirty = meta.is_dirty || is_dirty;
        if meta.pin_count == 0 {
            inner.replacer.set_evictable(frame_id, true);
        }
        true
    }

    /// Writes `page_id` to disk regardless of its dirty bit, then clears
    /// it. Returns `false` if the page isn't resident.
    pub fn flush_page(&self, page_id: PageId) -> bool {
        if page_id == INVALID_PAGE_ID {
            return false;
        }
        let mut inner = self.inner.lock();
        let Some(&frame_id) = inner.page_table.get(&page_id) else {
            return false;
        };
        self.write_through(page_id, self.contents[frame_id].clone());
        inner.frames[frame_id].is_dirty = false;
        true
    }

    /// Flushes every resident page to disk.
    pub fn flush_all_pages(&self) {
        let page_ids: Vec<PageId> = {
            let inner = self.inner.lock();
            inner.page_table.keys().copied().collect()
        };
        for page_id in page_ids {
            self.flush_page(page_id);
        }
    }

    /// Removes `page_id` from the pool, returning its frame to the free
    /// list. Returns `true` if the page wasn't resident (nothing to do) or
    /// deletion succeeded, `false` if the page is pinned and cannot be
    /// deleted.
    pub fn delete_page(&self, page_id: PageId) -> bool {
        let mut inner = self.inner.lock();
        let Some(&frame_id) = inner.page_table.get(&page_id) else {
            return true;
        };
        if inner.frames[frame_id].pin_count > 0 {
            return false;
        }

        inner.replacer.remove(frame_id);
        inner.page_table.remove(&page_id);
        inner.frames[frame_id] = FrameMeta::default();
        self.contents[frame_id].write().fill(0);
        inner.free_list.push_back(frame_id);

        self.deallocate_page(page_id);
        tracing::debug!(page_id, frame_id, "delete_page");
        true
    }

    /// Current pin count of `page_id`, or `None` if it isn't resident.
    /// Diagnostic accessor, not part of the core protocol.
    pub fn pin_count_of(&self, page_id: PageId) -> Option<i32> {
        let inner = self.inner.lock();
        inner
            .page_table
            .get(&page_id)
            .map(|&frame_id| inner.frames[frame_id].pin_count)
    }

    /// Current dirty bit of `page_id`, or `None` if it isn't resident.
    pub fn is_dirty_of(&self, page_id: PageId) -> Option<bool> {
        let inner = self.inner.lock();
        inner
            .page_table
            .get(&page_id)
            .map(|&frame_id| inner.frames[frame_id].is_dirty)
    }

    /// Number of frames currently on the free list.
    pub fn free_frame_count(&self) -> usize {
        self.inner.lock().free_list.len()
    }
}

#[cfg(test)]
mod tests {
    use rand::distributions::{Distribution, Uniform};
    use tempdir::TempDir;

    use super::*;
    use crate::storage::disk::DiskManager;

    fn new_bpm(pool_size: usize, k: usize) -> (BufferPoolManager, TempDir) {
        let dir = TempDir::new("bpm_test").unwrap();
        let db_name = dir.path().join("test.db");
        let disk_manager = DiskManager::new(db_name.to_str().unwrap());
        (BufferPoolManager::new(pool_size, disk_manager, k), dir)
    }

    #[test]
    fn test_buffer_pool_manager_binary_data() {
        crate::init_test_tracing();
        let (bpm, _dir) = new_bpm(10, 5);
        let buffer_pool_size = 10;

        let page0 = bpm.new_page();
        assert!(page0.is_some());

        let mut rng = rand::thread_rng();
        let uniform_dist = Uniform::from(std::u8::MIN..=std::u8::MAX);
        let mut random_binary_data: Vec<u8> = (0..BUSTUB_PAGE_SIZE)
            .map(|_| uniform_dist.sample(&mut rng))
            .collect();
        random_binary_data[BUSTUB_PAGE_SIZE / 2] = 0;
        random_binary_data[BUSTUB_PAGE_SIZE - 1] = 0;

        let page0 = page0.unwrap();
        page0.get_data_mut()[..random_binary_data.len()].copy_from_slice(&random_binary_data);
        assert_eq!(
            random_binary_data,
            page0.get_data()[..random_binary_data.len()]
        );

        for _ in 1..buffer_pool_size {
            assert!(bpm.new_page().is_some());
        }
        for _ in buffer_pool_size..buffer_pool_size * 2 {
            assert!(bpm.new_page().is_none());
        }

        for i in 0..5 {
            assert!(bpm.unpin_page(i, true, AccessType::Unknown));
            bpm.flush_page(i);
        }
        for _ in 0..5 {
            let page = bpm.new_page();
            assert!(page.is_some());
            bpm.unpin_page(page.unwrap().page_id(), false, AccessType::Unknown);
        }

        let page0 = bpm.fetch_page(0, AccessType::Unknown);
        assert!(page0.is_some());
        let page0 = page0.unwrap();
        assert_eq!(*page0.get_data(), random_binary_data.as_slice());
        assert!(bpm.unpin_page(0, true, AccessType::Unknown));
    }

    #[test]
    fn test_buffer_pool_manager_sample() {
        let (bpm, _dir) = new_bpm(10, 5);
        let buffer_pool_size = 10;

        let page0 = bpm.new_page();
        assert!(page0.is_some());
        assert_eq!(0, page0.as_ref().unwrap().page_id());

        let page0 = page0.unwrap();
        let data = "Hello".as_bytes();
        page0.get_data_mut()[..data.len()].copy_from_slice(data);
        assert_eq!(data, &(page0.get_data())[..data.len()]);

        for _ in 1..buffer_pool_size {
            assert!(bpm.new_page().is_some());
        }
        for _ in buffer_pool_size..buffer_pool_size * 2 {
            assert!(bpm.new_page().is_none());
        }

        for i in 0..5 {
            assert!(bpm.unpin_page(i as PageId, true, AccessType::Unknown));
        }
        for _ in 0..4 {
            assert!(bpm.new_page().is_some());
        }

        let page0 = bpm.fetch_page(0, AccessType::Unknown);
        assert!(page0.is_some());
        let page0 = page0.unwrap();
        assert_eq!(data, &(page0.get_data())[..data.len()]);

        assert!(bpm.unpin_page(0, true, AccessType::Unknown));
        assert!(bpm.new_page().is_some());
        assert!(bpm.fetch_page(0, AccessType::Unknown).is_none());
    }

    #[test]
    fn unpin_preserves_page_table_entry() {
        // Regression test for a bug in the original reference
        // implementation, where unpinning erased the page table entry,
        // making the page unreachable by fetch_page until re-read from
        // disk under a stale pin count.
        let (bpm, _dir) = new_bpm(3, 2);
        let page_id = bpm.new_page().unwrap().page_id();
        assert!(bpm.unpin_page(page_id, false, AccessType::Unknown));
        assert_eq!(Some(0), bpm.pin_count_of(page_id));

        let refetched = bpm.fetch_page(page_id, AccessType::Unknown);
        assert!(refetched.is_some());
        assert_eq!(Some(1), bpm.pin_count_of(page_id));
    }

    #[test]
    fn dirty_flag_is_sticky_across_unpin_calls() {
        let (bpm, _dir) = new_bpm(3, 2);
        let page_id = bpm.new_page().unwrap().page_id();
        bpm.unpin_page(page_id, false, AccessType::Unknown);

        bpm.fetch_page(page_id, AccessType::Unknown);
        assert!(bpm.unpin_page(page_id, true, AccessType::Unknown));
        assert_eq!(Some(true), bpm.is_dirty_of(page_id));

        bpm.fetch_page(page_id, AccessType::Unknown);
        // A second, clean unpin must not clear a dirty bit set earlier.
        assert!(bpm.unpin_page(page_id, false, AccessType::Unknown));
        assert_eq!(Some(true), bpm.is_dirty_of(page_id));
    }

    #[test]
    fn lru_k_prefers_frequently_accessed_page_over_recency_alone() {
        let (bpm, _dir) = new_bpm(2, 2);

        let hot = bpm.new_page().unwrap().page_id();
        bpm.unpin_page(hot, false, AccessType::Unknown);
        let cold = bpm.new_page().unwrap().page_id();
        bpm.unpin_page(cold, false, AccessType::Unknown);

        // Access `hot` twice more so its backward k-distance (k=2) is
        // small, while `cold` still has only its original access.
        bpm.fetch_page(hot, AccessType::Unknown);
        bpm.unpin_page(hot, false, AccessType::Unknown);
        bpm.fetch_page(hot, AccessType::Unknown);
        bpm.unpin_page(hot, false, AccessType::Unknown);

        // Admitting a third page must evict `cold`, not `hot`, even
        // though `cold` was touched more recently in wall-clock terms
        // than `hot`'s *first* access.
        let third = bpm.new_page().unwrap().page_id();
        bpm.unpin_page(third, false, AccessType::Unknown);

        assert!(bpm.fetch_page(hot, AccessType::Unknown).is_some());
        bpm.unpin_page(hot, false, AccessType::Unknown);
    }

    #[test]
    fn delete_refuses_pinned_page() {
        let (bpm, _dir) = new_bpm(3, 2);
        let page_id = bpm.new_page().unwrap().page_id();
        assert!(!bpm.delete_page(page_id));

        bpm.unpin_page(page_id, false, AccessType::Unknown);
        assert!(bpm.delete_page(page_id));
        assert_eq!(None, bpm.pin_count_of(page_id));
    }

    #[test]
    fn delete_of_nonresident_page_is_a_no_op_success() {
        let (bpm, _dir) = new_bpm(3, 2);
        assert!(bpm.delete_page(123));
    }

    #[test]
    fn pool_exhaustion_returns_none_until_a_page_is_unpinned() {
        let (bpm, _dir) = new_bpm(2, 2);
        let a = bpm.new_page().unwrap().page_id();
        let _b = bpm.new_page().unwrap().page_id();
        assert!(bpm.new_page().is_none());

        bpm.unpin_page(a, false, AccessType::Unknown);
        assert!(bpm.new_page().is_some());
    }

    #[test]
    fn concurrent_fetch_of_same_nonresident_page_is_a_single_miss_with_pin_count_two() {
        let (bpm, _dir) = new_bpm(2, 2);

        // Force p0 out of residency: admit p0 and p1 into the pool's two
        // frames, unpin both, then admit a third page so the replacer
        // evicts p0 (both are under-observed; p0's earlier access loses the
        // tie-break). p1 is left evictable so the concurrent fetches below
        // have a frame to admit p0 back into.
        let p0 = bpm.new_page().unwrap().page_id();
        bpm.unpin_page(p0, false, AccessType::Unknown);
        let p1 = bpm.new_page().unwrap().page_id();
        bpm.unpin_page(p1, false, AccessType::Unknown);
        bpm.new_page().unwrap();
        assert_eq!(None, bpm.pin_count_of(p0));

        let bpm = Arc::new(bpm);
        let (t1, t2) = {
            let bpm_a = bpm.clone();
            let bpm_b = bpm.clone();
            (
                std::thread::spawn(move || bpm_a.fetch_page(p0, AccessType::Unknown)),
                std::thread::spawn(move || bpm_b.fetch_page(p0, AccessType::Unknown)),
            )
        };

        let page_a = t1.join().unwrap().expect("fetch_page should admit p0");
        let page_b = t2.join().unwrap().expect("fetch_page should admit p0");

        assert_eq!(page_a.page_id(), p0);
        assert_eq!(page_b.page_id(), p0);
        assert_eq!(page_a.frame_id(), page_b.frame_id());
        assert_eq!(Some(2), bpm.pin_count_of(p0));
    }

    struct RecordingLogManager {
        flushed_up_to: std::sync::Mutex<Vec<crate::common::config::Lsn>>,
    }

    impl RecordingLogManager {
        fn new() -> Self {
            Self {
                flushed_up_to: std::sync::Mutex::new(Vec::new()),
            }
        }
    }

    impl crate::recovery::log_manager::LogManager for RecordingLogManager {
        fn flush_up_to(&self, lsn: crate::common::config::Lsn) {
            self.flushed_up_to.lock().unwrap().push(lsn);
        }
    }

    #[test]
    fn dirty_eviction_flushes_log_up_to_the_victims_lsn_first() {
        let dir = TempDir::new("bpm_log_test").unwrap();
        let db_name = dir.path().join("test.db");
        let disk_manager = DiskManager::new(db_name.to_str().unwrap());
        let log_manager = Arc::new(RecordingLogManager::new());
        let bpm = BufferPoolManager::with_log_manager(1, disk_manager, 2, Some(log_manager.clone()));

        let page = bpm.new_page().unwrap();
        let page_id = page.page_id();
        page.set_lsn(42);
        bpm.unpin_page(page_id, true, AccessType::Unknown);

        assert!(log_manager.flushed_up_to.lock().unwrap().is_empty());

        // Only frame in the pool; admitting another page forces eviction of
        // the dirty one, which must flush the log up to its LSN first.
        assert!(bpm.new_page().is_some());
        assert_eq!(vec![42], *log_manager.flushed_up_to.lock().unwrap());
    }
}
