use std::path::Path;

use tracing::debug;

use super::error::{RecordError, RecordResult};
use super::page::{MAX_RECORD_SIZE, SLOT_SIZE, SlottedPage};
use super::record::{Record, RecordId};
use super::scan::Scan;
use crate::file::{BufferPool, FileHandle, PAGE_SIZE, PageId, PagedFile, PagedFileManager};

/// Page count and live record bytes across a file's slotted pages
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Utilization {
    pub pages: usize,
    pub bytes_used: usize,
}

impl Utilization {
    /// Fraction of the slotted pages' bytes holding live records
    pub fn ratio(&self) -> f64 {
        if self.pages == 0 {
            return 0.0;
        }
        self.bytes_used as f64 / (self.pages * PAGE_SIZE) as f64
    }
}

/// A file of variable-length records stored in slotted pages.
///
/// Holds only the file handle; every operation borrows the buffer pool that
/// caches the file's pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlottedFile {
    handle: FileHandle,
}

impl SlottedFile {
    /// Create a new empty file at `path` and open it
    pub fn create<P: AsRef<Path>>(
        pool: &mut BufferPool<PagedFileManager>,
        path: P,
    ) -> RecordResult<Self> {
        pool.io_mut().create_file(&path)?;
        Self::open(pool, path)
    }

    pub fn open<P: AsRef<Path>>(
        pool: &mut BufferPool<PagedFileManager>,
        path: P,
    ) -> RecordResult<Self> {
        let handle = pool.io_mut().open_file(path)?;
        Ok(Self { handle })
    }

    /// Write back and drop the file's cached pages, then close it.
    ///
    /// Fails without closing if any page of the file is still fixed.
    pub fn close(self, pool: &mut BufferPool<PagedFileManager>) -> RecordResult<()> {
        pool.release_file(self.handle)?;
        pool.forget_file(self.handle);
        pool.io_mut().close_file(self.handle)?;
        Ok(())
    }

    /// Treat an already open file as a slotted file
    pub fn from_handle(handle: FileHandle) -> Self {
        Self { handle }
    }

    pub fn handle(&self) -> FileHandle {
        self.handle
    }

    /// Store a record in the first page with room for it, allocating a page if none has
    pub fn insert<S: PagedFile>(
        &self,
        pool: &mut BufferPool<S>,
        record: &Record<'_>,
    ) -> RecordResult<RecordId> {
        let len = record.serialized_len();
        if len > MAX_RECORD_SIZE {
            return Err(RecordError::TooLarge {
                len,
                max: MAX_RECORD_SIZE,
            });
        }

        let (page_id, fresh) = match self.find_page(pool, len)? {
            Some(page_id) => (page_id, false),
            None => {
                let (page_id, data) = pool.alloc_page(self.handle)?;
                SlottedPage::init(page_id, data);
                (page_id, true)
            }
        };

        let data = pool.page_mut(self.handle, page_id)?;
        let result = match SlottedPage::from_buffer(page_id, data) {
            Ok(Some(mut page)) => page.insert(record),
            Ok(None) => Err(RecordError::InvalidPage {
                page_id,
                slot_id: 0,
            }),
            Err(e) => Err(e),
        };
        pool.release(self.handle, page_id, fresh || result.is_ok())?;

        let rid = RecordId::new(page_id, result?);
        debug!("inserted {} byte record at {:?}", len, rid);
        Ok(rid)
    }

    /// Find a slotted page with room for `len` more bytes plus a slot entry.
    ///
    /// The page is returned still fixed. Never-used (all zero) pages are
    /// formatted and claimed; pages owned by anything else are skipped. A
    /// corrupt slotted page is released and its error returned.
    fn find_page<S: PagedFile>(
        &self,
        pool: &mut BufferPool<S>,
        len: usize,
    ) -> RecordResult<Option<PageId>> {
        let mut current = pool.first_page(self.handle)?;
        while let Some((page_id, data)) = current {
            if SlottedPage::is_unformatted(data) {
                SlottedPage::init(page_id, data);
                pool.mark_used(self.handle, page_id)?;
                return Ok(Some(page_id));
            }

            let fits = SlottedPage::from_buffer(page_id, data)
                .map(|page| page.is_some_and(|page| page.free_bytes() >= len + SLOT_SIZE));
            if let Ok(true) = fits {
                return Ok(Some(page_id));
            }

            pool.release(self.handle, page_id, false)?;
            fits?;
            current = pool.next_page(self.handle, page_id)?;
        }
        Ok(None)
    }

    /// Decode the record at `rid`, copying its text fields into `buf`
    pub fn get<'b, S: PagedFile>(
        &self,
        pool: &mut BufferPool<S>,
        rid: RecordId,
        buf: &'b mut [u8],
    ) -> RecordResult<Record<'b>> {
        self.check_page(pool, rid)?;

        let data = pool.acquire(self.handle, rid.page_id)?;
        let result = match SlottedPage::from_buffer(rid.page_id, data) {
            Ok(Some(page)) => page.record(rid.slot_id, buf),
            Ok(None) => Err(invalid(rid)),
            Err(e) => Err(e),
        };
        pool.release(self.handle, rid.page_id, false)?;
        result
    }

    /// Free the record's slot and compact its page
    pub fn delete<S: PagedFile>(&self, pool: &mut BufferPool<S>, rid: RecordId) -> RecordResult<()> {
        self.check_page(pool, rid)?;

        let data = pool.acquire(self.handle, rid.page_id)?;
        let result = match SlottedPage::from_buffer(rid.page_id, data) {
            Ok(Some(mut page)) => page.delete(rid.slot_id),
            Ok(None) => Err(invalid(rid)),
            Err(e) => Err(e),
        };
        pool.release(self.handle, rid.page_id, result.is_ok())?;
        result?;

        debug!("deleted record {:?}", rid);
        Ok(())
    }

    fn check_page<S: PagedFile>(&self, pool: &mut BufferPool<S>, rid: RecordId) -> RecordResult<()> {
        if rid.page_id >= pool.io_mut().page_count(self.handle)? {
            return Err(invalid(rid));
        }
        Ok(())
    }

    /// Cursor over every live record, in page then slot order
    pub fn scan(&self) -> Scan {
        Scan::new(self.handle)
    }

    /// Count slotted pages and the bytes their live records occupy
    pub fn utilization<S: PagedFile>(&self, pool: &mut BufferPool<S>) -> RecordResult<Utilization> {
        let mut usage = Utilization::default();

        let mut current = pool.first_page(self.handle)?;
        while let Some((page_id, data)) = current {
            let used = SlottedPage::from_buffer(page_id, data)
                .map(|page| page.map(|page| page.used_bytes()));
            pool.release(self.handle, page_id, false)?;
            if let Some(bytes) = used? {
                usage.pages += 1;
                usage.bytes_used += bytes;
            }
            current = pool.next_page(self.handle, page_id)?;
        }

        Ok(usage)
    }
}

fn invalid(rid: RecordId) -> RecordError {
    RecordError::InvalidPage {
        page_id: rid.page_id,
        slot_id: rid.slot_id,
    }
}
