use ahash::AHashMap;

use super::error::{FileError, FileResult};
use super::file_manager::FileHandle;
use super::PageId;

/// A key identifying a page in the buffer pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct PageKey {
    pub file: FileHandle,
    pub page_id: PageId,
}

impl PageKey {
    pub fn new(file: FileHandle, page_id: PageId) -> Self {
        Self { file, page_id }
    }
}

/// Maps (file, page) to the arena slot of the frame caching it.
///
/// Point operations only; the table knows nothing about pinning or policy.
#[derive(Debug)]
pub(crate) struct PageTable<H> {
    entries: AHashMap<PageKey, H>,
}

impl<H: Copy> PageTable<H> {
    pub fn new() -> Self {
        Self {
            entries: AHashMap::new(),
        }
    }

    pub fn insert(&mut self, key: PageKey, handle: H) -> FileResult<()> {
        if self.entries.contains_key(&key) {
            return Err(FileError::PageTableEntryExists {
                file: key.file.as_usize(),
                page_id: key.page_id,
            });
        }
        self.entries.insert(key, handle);
        Ok(())
    }

    pub fn find(&self, key: PageKey) -> Option<H> {
        self.entries.get(&key).copied()
    }

    pub fn delete(&mut self, key: PageKey) -> FileResult<H> {
        self.entries
            .remove(&key)
            .ok_or(FileError::PageTableEntryNotFound {
                file: key.file.as_usize(),
                page_id: key.page_id,
            })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
