/// Hint describing why a page is being accessed. Currently ignored by the
/// replacement policy; reserved for scan-aware extensions (sequential-scan
/// detection, index-aware admission, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccessType {
    #[default]
    Unknown,
    Lookup,
    Scan,
    Index,
}
