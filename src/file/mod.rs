mod buffer_pool;
mod error;
mod file_manager;
mod page_io;
mod page_table;
mod stats;

pub use buffer_pool::{BufferPool, ReplacementPolicy};
pub use error::{FileError, FileResult};
pub use file_manager::{FileHandle, PagedFileManager};
pub use page_io::{PageIo, PagedFile};
pub use stats::PoolStats;

#[cfg(test)]
pub(crate) use buffer_pool::tests::MemoryFile;

/// Page size in bytes (4KB)
pub const PAGE_SIZE: usize = 4096;

/// Default number of pages in the buffer pool
pub const DEFAULT_POOL_CAPACITY: usize = 20;

/// Default cap on simultaneously open files
pub const DEFAULT_MAX_OPEN_FILES: usize = 128;

/// Page ID type
pub type PageId = usize;
