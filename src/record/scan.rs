use tracing::trace;

use super::error::{RecordError, RecordResult};
use super::page::SlottedPage;
use super::record::{Record, RecordId, SlotId};
use crate::file::{BufferPool, FileHandle, PageId, PagedFile};

/// Forward-only cursor over the live records of a slotted file.
///
/// The cursor holds a position, not a pinned page: no page stays fixed
/// between calls to `next`.
#[derive(Debug, Clone)]
pub struct Scan {
    file: FileHandle,
    page: PageId, // Page holding the next candidate slot
    slot: SlotId, // First slot on `page` not yet returned
}

impl Scan {
    pub fn new(file: FileHandle) -> Self {
        Self {
            file,
            page: 0,
            slot: 0,
        }
    }

    /// Start over from the first page
    pub fn reset(&mut self) {
        self.page = 0;
        self.slot = 0;
    }

    /// Decode the next live record into `buf`, or `None` once every page is read.
    ///
    /// A `BufferTooSmall` error leaves the cursor on the same record, so the
    /// call can be retried with a larger buffer. A corrupt slotted page stops
    /// the scan with `Deserialization` every time it is reached.
    pub fn next<'b, S: PagedFile>(
        &mut self,
        pool: &mut BufferPool<S>,
        buf: &'b mut [u8],
    ) -> RecordResult<Option<(RecordId, Record<'b>)>> {
        let (page_id, slot_id) = loop {
            if self.page >= pool.io_mut().page_count(self.file)? {
                return Ok(None);
            }

            let data = pool.acquire(self.file, self.page)?;
            let found = SlottedPage::from_buffer(self.page, data)
                .map(|page| page.and_then(|page| page.next_occupied(self.slot)));
            match found {
                Ok(Some(slot_id)) => break (self.page, slot_id),
                Err(e) => {
                    pool.release(self.file, self.page, false)?;
                    return Err(e);
                }
                Ok(None) => {
                    pool.release(self.file, self.page, false)?;
                    trace!("scan of file {} leaving page {}", self.file.as_usize(), self.page);
                    self.page += 1;
                    self.slot = 0;
                }
            }
        };

        let rid = RecordId::new(page_id, slot_id);
        let data = pool.page_mut(self.file, page_id)?;
        let result = match SlottedPage::from_buffer(page_id, data) {
            Ok(Some(page)) => page.record(slot_id, buf),
            Ok(None) => Err(RecordError::InvalidPage { page_id, slot_id }),
            Err(e) => Err(e),
        };
        pool.release(self.file, page_id, false)?;

        let record = result?;
        self.slot = slot_id + 1;
        Ok(Some((rid, record)))
    }
}
