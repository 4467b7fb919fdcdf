use std::sync::Arc;
use std::thread;

use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::RwLock;
use tokio::sync::oneshot;

use crate::common::config::{PageId, BUSTUB_PAGE_SIZE};
use crate::storage::disk::DiskManager;

type Content = Arc<RwLock<[u8; BUSTUB_PAGE_SIZE]>>;

/// A Read or Write request for the DiskManager to execute.
pub enum DiskRequest {
    Read {
        page_id: PageId,
        content: Content,
        callback: oneshot::Sender<()>,
    },
    Write {
        page_id: PageId,
        content: Content,
        callback: oneshot::Sender<()>,
    },
}

/// Schedules disk read and write operations onto a single background
/// worker thread, so that callers parked on the returned oneshot can
/// release the buffer pool's mutex strategy of their choosing around the
/// I/O (see the buffer pool manager for which strategy this crate uses).
pub struct DiskScheduler {
    request_queue: Sender<Option<DiskRequest>>,
    background_thread: Option<thread::JoinHandle<()>>,
}

impl DiskScheduler {
    pub fn new(disk_manager: DiskManager) -> Self {
        let (tx, rx) = channel::unbounded();
        Self {
            request_queue: tx,
            background_thread: Some(thread::spawn(move || {
                Self::start_worker_thread(rx, disk_manager)
            })),
        }
    }

    /// Schedules `r` for execution on the background worker thread.
    pub fn schedule(&self, r: DiskRequest) {
        self.request_queue
            .send(Some(r))
            .expect("disk scheduler worker thread terminated unexpectedly");
    }

    fn start_worker_thread(rx: Receiver<Option<DiskRequest>>, mut disk_manager: DiskManager) {
        while let Ok(r) = rx.recv() {
            match r {
                Some(DiskRequest::Read {
                    page_id,
                    content,
                    callback,
                }) => {
                    disk_manager.read_page(page_id, &mut *content.write());
                    let _ = callback.send(());
                }
                Some(DiskRequest::Write {
                    page_id,
                    content,
                    callback,
                }) => {
                    disk_manager.write_page(page_id, &*content.read());
                    let _ = callback.send(());
                }
                None => break,
            }
        }
    }
}

impl Drop for DiskScheduler {
    fn drop(&mut self) {
        // Put `None` in the queue to signal the worker thread to stop, then
        // wait for it to drain any in-flight request.
        let _ = self.request_queue.send(None);
        if let Some(handle) = self.background_thread.take() {
            let _ = handle.join();
        }
    }
}
