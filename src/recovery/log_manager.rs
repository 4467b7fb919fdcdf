use crate::common::config::Lsn;

/// The write-ahead-log flushing boundary the buffer pool consults before
/// writing a dirty page back to stable storage. Log manager internals
/// (record formats, checkpointing, recovery) are out of scope for this
/// crate; only this seam is modeled so the buffer pool can honor the
/// write-ahead-logging rule when a log manager is plugged in.
pub trait LogManager: Send + Sync {
    /// Guarantees that all log records up to and including `lsn` are
    /// durable before returning.
    fn flush_up_to(&self, lsn: Lsn);
}

/// Default collaborator used when no write-ahead log is configured. Buffer
/// pool eviction proceeds without a durability barrier.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpLogManager;

impl LogManager for NoOpLogManager {
    fn flush_up_to(&self, _lsn: Lsn) {}
}
