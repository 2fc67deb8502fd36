use super::error::FileResult;
use super::file_manager::FileHandle;
use super::PageId;

/// Page I/O capability the buffer pool faults pages in and writes them back through.
pub trait PageIo {
    /// Fill `buffer` (exactly `PAGE_SIZE` bytes) with the contents of a page
    fn read_page(
        &mut self,
        file: FileHandle,
        page_id: PageId,
        buffer: &mut [u8],
    ) -> FileResult<()>;

    /// Persist `buffer` (exactly `PAGE_SIZE` bytes) as the contents of a page
    fn write_page(&mut self, file: FileHandle, page_id: PageId, buffer: &[u8]) -> FileResult<()>;
}

/// A page I/O layer that also knows how many pages each file holds and can
/// hand out new page numbers.
pub trait PagedFile: PageIo {
    /// Number of pages in the file; valid page numbers are `0..page_count`
    fn page_count(&mut self, file: FileHandle) -> FileResult<usize>;

    /// Reserve the next page number at the end of the file
    fn allocate_page(&mut self, file: FileHandle) -> FileResult<PageId>;
}
