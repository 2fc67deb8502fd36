use std::io;
use thiserror::Error;

use super::PageId;

#[derive(Debug, Error)]
pub enum FileError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("File already exists: {0}")]
    FileAlreadyExists(String),

    #[error("Invalid file handle: {0}")]
    InvalidHandle(usize),

    #[error("Invalid page number: file={file}, page_id={page_id}")]
    InvalidPage { file: usize, page_id: PageId },

    #[error("Invalid page size: expected {expected}, got {actual}")]
    InvalidPageSize { expected: usize, actual: usize },

    #[error("Incomplete read of page {0} from file")]
    IncompleteRead(PageId),

    #[error("Incomplete write of page {0} to file")]
    IncompleteWrite(PageId),

    #[error("File handle limit reached")]
    TooManyOpenFiles,

    #[error("Out of memory while growing the buffer pool")]
    OutOfMemory,

    #[error("No buffer space: all {0} buffer pages are fixed")]
    NoBufferSpace(usize),

    #[error("Page already fixed in buffer: file={file}, page_id={page_id}")]
    AlreadyFixed { file: usize, page_id: PageId },

    #[error("Page not in buffer: file={file}, page_id={page_id}")]
    NotInBuffer { file: usize, page_id: PageId },

    #[error("Page already unfixed: file={file}, page_id={page_id}")]
    AlreadyUnfixed { file: usize, page_id: PageId },

    #[error("New page already in buffer: file={file}, page_id={page_id}")]
    AlreadyInBuffer { file: usize, page_id: PageId },

    #[error("Page table entry already exists: file={file}, page_id={page_id}")]
    PageTableEntryExists { file: usize, page_id: PageId },

    #[error("Page table entry not found: file={file}, page_id={page_id}")]
    PageTableEntryNotFound { file: usize, page_id: PageId },

    #[error("Invalid buffer pool capacity {requested} (resident frames: {allocated})")]
    InvalidCapacity { requested: usize, allocated: usize },

    #[error("Statistics output error: {0}")]
    Stats(#[from] csv::Error),
}

pub type FileResult<T> = Result<T, FileError>;
