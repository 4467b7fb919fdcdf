use std::{
    fs::{File, OpenOptions},
    io::{Read, Seek, SeekFrom, Write},
    sync::Mutex,
};

use log::debug;

use crate::common::config::{PageId, BUSTUB_PAGE_SIZE};

/// DiskManager takes care of reading and writing pages to and from disk,
/// providing a logical block-device abstraction over a single on-disk
/// file. Page-id allocation and write-ahead logging live above this layer;
/// DiskManager only knows how to move fixed-size pages in and out of the
/// file at `page_id * BUSTUB_PAGE_SIZE`.
pub struct DiskManager {
    db_io: Mutex<File>,
    file_name: String,
    num_flushes: u64,
    num_writes: u64,
}

impl DiskManager {
    /// Creates a new disk manager backed by `db_file`, creating it if it
    /// does not already exist.
    pub fn new(db_file: &str) -> Self {
        let db_io = OpenOptions::new()
            .read(true)
            .write(true)
            .open(db_file)
            .or_else(|_| {
                OpenOptions::new()
                    .create(true)
                    .read(true)
                    .write(true)
                    .open(db_file)
            })
            .unwrap_or_else(|e| panic!("failed to open database file {}: {}", db_file, e));

        Self {
            db_io: Mutex::new(db_io),
            file_name: db_file.to_string(),
            num_flushes: 0,
            num_writes: 0,
        }
    }

    /// Writes a page-sized buffer to the database file.
    ///
    /// # Panics
    ///
    /// Panics on any I/O failure — per the buffer pool's error model, disk
    /// I/O failures are fatal and not retried.
    pub fn write_page(&mut self, page_id: PageId, page_data: &[u8]) {
        assert_eq!(page_data.len(), BUSTUB_PAGE_SIZE);

        let offset = page_id as u64 * BUSTUB_PAGE_SIZE as u64;
        self.num_writes += 1;

        let mut db_io = self.db_io.lock().unwrap();
        db_io.seek(SeekFrom::Start(offset)).unwrap();
        if let Err(e) = db_io.write_all(page_data) {
            panic!("I/O error while writing page {}: {:?}", page_id, e);
        }
        db_io.flush().unwrap();
        self.num_flushes += 1;
    }

    /// Reads a page-sized buffer from the database file, zero-filling any
    /// portion that lies beyond the file's current length (a page that was
    /// allocated but never written).
    ///
    /// # Panics
    ///
    /// Panics on any I/O failure.
    pub fn read_page(&mut self, page_id: PageId, page_data: &mut [u8]) {
        assert_eq!(page_data.len(), BUSTUB_PAGE_SIZE);
        let offset = page_id as u64 * BUSTUB_PAGE_SIZE as u64;

        let mut db_io = self.db_io.lock().unwrap();
        let file_len = db_io.metadata().unwrap().len();
        if offset >= file_len {
            debug!("read past end of file for page {}, returning zeroes", page_id);
            page_data.fill(0);
            return;
        }
        db_io.seek(SeekFrom::Start(offset)).unwrap();
        match db_io.read(page_data) {
            Ok(read_count) if read_count < BUSTUB_PAGE_SIZE => {
                debug!("read less than a page for page {}", page_id);
                page_data[read_count..].fill(0);
            }
            Ok(_) => {}
            Err(e) => panic!("I/O error while reading page {}: {:?}", page_id, e),
        }
    }

    /// Informs the disk layer that `page_id` is no longer live. This is a
    /// no-op without a free-space map to reclaim the backing block; the
    /// buffer pool still calls it so the hook is in place once one exists.
    pub fn deallocate_page(&self, _page_id: PageId) {}

    pub fn get_num_flushes(&self) -> u64 {
        self.num_flushes
    }

    pub fn get_num_writes(&self) -> u64 {
        self.num_writes
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }
}
