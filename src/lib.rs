pub mod file;
pub mod record;

pub use file::{
    BufferPool, DEFAULT_POOL_CAPACITY, FileError, FileHandle, FileResult, PAGE_SIZE, PageId,
    PageIo, PagedFile, PagedFileManager, PoolStats, ReplacementPolicy,
};
pub use record::{
    MAX_RECORD_SIZE, PageHeader, Record, RecordError, RecordId, RecordResult, Scan, SlotId,
    SlottedFile, SlottedPage, Utilization,
};
