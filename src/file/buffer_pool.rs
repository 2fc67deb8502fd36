use std::path::Path;

use ahash::AHashMap;
use tracing::{debug, trace, warn};

use super::error::{FileError, FileResult};
use super::file_manager::{FileHandle, PagedFileManager};
use super::page_io::{PageIo, PagedFile};
use super::page_table::{PageKey, PageTable};
use super::stats::PoolStats;
use super::{DEFAULT_POOL_CAPACITY, PAGE_SIZE, PageId};

/// Where touched pages are placed in the pool's ordered list.
///
/// Victims are always searched for from the tail, so `Lru` evicts the least
/// recently touched unpinned page and `Mru` the most recently touched one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReplacementPolicy {
    #[default]
    Lru,
    Mru,
}

/// Arena index of a frame
type FrameId = usize;

/// One cached page
struct Frame {
    key: PageKey,
    data: Box<[u8]>,
    /// Pinned by its single holder; not a counter
    fixed: bool,
    dirty: bool,
    prev: Option<FrameId>,
    next: Option<FrameId>,
}

/// Fixed-capacity page cache with fix/unfix pinning and LRU/MRU replacement.
///
/// Frames live in an arena and are threaded onto one of two index-linked
/// lists: the ordered used list (head..tail) or the free list. A frame found
/// in the page table is always on the used list.
pub struct BufferPool<S: PageIo = PagedFileManager> {
    /// Injected page-file layer
    io: S,
    frames: Vec<Frame>,
    page_table: PageTable<FrameId>,
    head: Option<FrameId>,
    tail: Option<FrameId>,
    /// Singly linked through `next`
    free_head: Option<FrameId>,
    /// Upper bound on `frames.len()`
    capacity: usize,
    policies: AHashMap<FileHandle, ReplacementPolicy>,
    stats: PoolStats,
}

impl<S: PageIo> BufferPool<S> {
    /// Create a buffer pool with the default capacity
    pub fn new(io: S) -> Self {
        Self::with_capacity(io, DEFAULT_POOL_CAPACITY)
    }

    /// Create a buffer pool holding at most `capacity` pages (at least one)
    pub fn with_capacity(io: S, capacity: usize) -> Self {
        Self {
            io,
            frames: Vec::new(),
            page_table: PageTable::new(),
            head: None,
            tail: None,
            free_head: None,
            capacity: capacity.max(1),
            policies: AHashMap::new(),
            stats: PoolStats::default(),
        }
    }

    /// Get a reference to the page-file layer
    pub fn io(&self) -> &S {
        &self.io
    }

    /// Get a mutable reference to the page-file layer
    pub fn io_mut(&mut self) -> &mut S {
        &mut self.io
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Change the maximum number of cached pages.
    ///
    /// Shrinking below the number of frames already allocated is rejected.
    pub fn set_capacity(&mut self, capacity: usize) -> FileResult<()> {
        if capacity == 0 || capacity < self.frames.len() {
            return Err(FileError::InvalidCapacity {
                requested: capacity,
                allocated: self.frames.len(),
            });
        }
        self.capacity = capacity;
        Ok(())
    }

    pub fn set_policy(&mut self, file: FileHandle, policy: ReplacementPolicy) {
        self.policies.insert(file, policy);
    }

    pub fn policy(&self, file: FileHandle) -> ReplacementPolicy {
        self.policies.get(&file).copied().unwrap_or_default()
    }

    /// Drop per-file settings once a file is closed
    pub fn forget_file(&mut self, file: FileHandle) {
        self.policies.remove(&file);
    }

    pub fn stats(&self) -> PoolStats {
        self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = PoolStats::default();
    }

    /// Persist the current counters as CSV
    pub fn write_stats<P: AsRef<Path>>(&self, path: P) -> FileResult<()> {
        self.stats.write_csv(path)
    }

    /// Fix a page in the buffer, reading it through the page-file layer on a miss.
    ///
    /// Fails with `AlreadyFixed` if the page is already pinned; pins do not nest.
    pub fn acquire(&mut self, file: FileHandle, page_id: PageId) -> FileResult<&mut [u8]> {
        let key = PageKey::new(file, page_id);
        let policy = self.policy(file);

        let id = match self.page_table.find(key) {
            Some(id) => {
                if self.frames[id].fixed {
                    return Err(FileError::AlreadyFixed {
                        file: file.as_usize(),
                        page_id,
                    });
                }
                self.stats.buffer_hits += 1;
                self.frames[id].fixed = true;
                self.reposition(id, policy);
                trace!("acquire(file={}, page={}) = hit", file.as_usize(), page_id);
                id
            }
            None => {
                let id = self.take_frame()?;

                let frame = &mut self.frames[id];
                if let Err(e) = self.io.read_page(file, page_id, &mut frame.data) {
                    self.push_free(id);
                    return Err(e);
                }
                self.stats.physical_reads += 1;

                if let Err(e) = self.page_table.insert(key, id) {
                    self.push_free(id);
                    return Err(e);
                }
                self.install(id, key, policy);
                self.stats.buffer_misses += 1;
                debug!("acquire(file={}, page={}) = miss", file.as_usize(), page_id);
                id
            }
        };

        self.stats.logical_reads += 1;
        Ok(&mut self.frames[id].data[..])
    }

    /// Unfix a page, optionally marking it dirty
    pub fn release(&mut self, file: FileHandle, page_id: PageId, dirty: bool) -> FileResult<()> {
        let id = self.fixed_frame(file, page_id)?;

        let frame = &mut self.frames[id];
        frame.fixed = false;
        if dirty {
            frame.dirty = true;
            self.stats.logical_writes += 1;
        }

        let policy = self.policy(file);
        self.reposition(id, policy);
        Ok(())
    }

    /// Fix a buffer for a page that is new to the file; nothing is read.
    ///
    /// The buffer is zeroed. Fails with `AlreadyInBuffer` if the page is cached.
    pub fn allocate(&mut self, file: FileHandle, page_id: PageId) -> FileResult<&mut [u8]> {
        let key = PageKey::new(file, page_id);
        if self.page_table.find(key).is_some() {
            return Err(FileError::AlreadyInBuffer {
                file: file.as_usize(),
                page_id,
            });
        }

        let id = self.take_frame()?;
        if let Err(e) = self.page_table.insert(key, id) {
            self.push_free(id);
            return Err(e);
        }

        let policy = self.policy(file);
        self.install(id, key, policy);
        debug!("allocate(file={}, page={})", file.as_usize(), page_id);

        let data = &mut self.frames[id].data[..];
        data.fill(0);
        Ok(data)
    }

    /// Mark a fixed page dirty and touch it without unfixing it
    pub fn mark_used(&mut self, file: FileHandle, page_id: PageId) -> FileResult<()> {
        let id = self.fixed_frame(file, page_id)?;

        self.frames[id].dirty = true;
        self.stats.logical_writes += 1;

        let policy = self.policy(file);
        self.reposition(id, policy);
        Ok(())
    }

    /// Borrow the bytes of a fixed page
    pub fn page(&self, file: FileHandle, page_id: PageId) -> FileResult<&[u8]> {
        let id = self.fixed_frame(file, page_id)?;
        Ok(&self.frames[id].data[..])
    }

    /// Mutably borrow the bytes of a fixed page
    pub fn page_mut(&mut self, file: FileHandle, page_id: PageId) -> FileResult<&mut [u8]> {
        let id = self.fixed_frame(file, page_id)?;
        Ok(&mut self.frames[id].data[..])
    }

    /// Write back and drop every cached page of `file`.
    ///
    /// Fails with `AlreadyFixed` before touching anything if any page of the
    /// file is still fixed.
    pub fn release_file(&mut self, file: FileHandle) -> FileResult<()> {
        let mut owned = Vec::new();
        let mut cursor = self.head;
        while let Some(id) = cursor {
            let frame = &self.frames[id];
            if frame.key.file == file {
                if frame.fixed {
                    return Err(FileError::AlreadyFixed {
                        file: file.as_usize(),
                        page_id: frame.key.page_id,
                    });
                }
                owned.push(id);
            }
            cursor = frame.next;
        }

        for id in owned {
            let frame = &mut self.frames[id];
            let key = frame.key;
            if frame.dirty {
                self.io.write_page(key.file, key.page_id, &frame.data)?;
                self.stats.physical_writes += 1;
                frame.dirty = false;
            }

            if let Err(e) = self.page_table.delete(key) {
                panic!("buffer pool page table lost a resident page: {e}");
            }
            self.unlink(id);
            self.push_free(id);
        }

        debug!("release_file(file={})", file.as_usize());
        Ok(())
    }

    /// Write back one dirty page without evicting it
    pub fn flush_page(&mut self, file: FileHandle, page_id: PageId) -> FileResult<()> {
        let id = self
            .page_table
            .find(PageKey::new(file, page_id))
            .ok_or(FileError::NotInBuffer {
                file: file.as_usize(),
                page_id,
            })?;

        let frame = &mut self.frames[id];
        if frame.dirty {
            self.io.write_page(file, page_id, &frame.data)?;
            self.stats.physical_writes += 1;
            frame.dirty = false;
        }
        Ok(())
    }

    /// Write back every dirty page, fixed or not
    pub fn flush_all(&mut self) -> FileResult<()> {
        for frame in self.frames.iter_mut().filter(|f| f.dirty) {
            self.io
                .write_page(frame.key.file, frame.key.page_id, &frame.data)?;
            self.stats.physical_writes += 1;
            frame.dirty = false;
        }
        Ok(())
    }

    /// Number of pages currently cached
    pub fn resident_count(&self) -> usize {
        self.page_table.len()
    }

    /// Check if a page is in the buffer pool
    pub fn is_page_cached(&self, file: FileHandle, page_id: PageId) -> bool {
        self.page_table.find(PageKey::new(file, page_id)).is_some()
    }

    pub fn is_page_fixed(&self, file: FileHandle, page_id: PageId) -> bool {
        self.page_table
            .find(PageKey::new(file, page_id))
            .is_some_and(|id| self.frames[id].fixed)
    }

    /// Get the number of dirty pages in the buffer pool
    pub fn dirty_page_count(&self) -> usize {
        self.frames.iter().filter(|f| f.dirty).count()
    }

    /// Cached pages in list order, head first
    pub fn resident_pages(&self) -> Vec<(FileHandle, PageId)> {
        let mut pages = Vec::with_capacity(self.page_table.len());
        let mut cursor = self.head;
        while let Some(id) = cursor {
            let frame = &self.frames[id];
            pages.push((frame.key.file, frame.key.page_id));
            cursor = frame.next;
        }
        pages
    }

    fn fixed_frame(&self, file: FileHandle, page_id: PageId) -> FileResult<FrameId> {
        let id = self
            .page_table
            .find(PageKey::new(file, page_id))
            .ok_or(FileError::NotInBuffer {
                file: file.as_usize(),
                page_id,
            })?;
        if !self.frames[id].fixed {
            return Err(FileError::AlreadyUnfixed {
                file: file.as_usize(),
                page_id,
            });
        }
        Ok(id)
    }

    /// Get an unlinked frame: from the free list, by growing the arena, or by
    /// evicting the first unfixed page found walking from the tail.
    fn take_frame(&mut self) -> FileResult<FrameId> {
        if let Some(id) = self.pop_free() {
            return Ok(id);
        }

        if self.frames.len() < self.capacity {
            return self.grow();
        }

        let mut cursor = self.tail;
        while let Some(id) = cursor {
            if !self.frames[id].fixed {
                break;
            }
            cursor = self.frames[id].prev;
        }
        let id = cursor.ok_or(FileError::NoBufferSpace(self.frames.len()))?;

        // A failed write leaves the victim cached and dirty
        let frame = &mut self.frames[id];
        let key = frame.key;
        if frame.dirty {
            self.io.write_page(key.file, key.page_id, &frame.data)?;
            self.stats.physical_writes += 1;
            frame.dirty = false;
            debug!(
                "evict(file={}, page={}) wrote back dirty page",
                key.file.as_usize(),
                key.page_id
            );
        } else {
            debug!("evict(file={}, page={})", key.file.as_usize(), key.page_id);
        }

        self.page_table.delete(key)?;
        self.unlink(id);
        Ok(id)
    }

    fn grow(&mut self) -> FileResult<FrameId> {
        self.frames
            .try_reserve(1)
            .map_err(|_| FileError::OutOfMemory)?;

        let mut data = Vec::new();
        data.try_reserve_exact(PAGE_SIZE)
            .map_err(|_| FileError::OutOfMemory)?;
        data.resize(PAGE_SIZE, 0);

        let id = self.frames.len();
        self.frames.push(Frame {
            key: PageKey::new(FileHandle::new(usize::MAX), 0),
            data: data.into_boxed_slice(),
            fixed: false,
            dirty: false,
            prev: None,
            next: None,
        });
        Ok(id)
    }

    /// Bind a frame taken by `take_frame` to `key`, fixed and clean
    fn install(&mut self, id: FrameId, key: PageKey, policy: ReplacementPolicy) {
        let frame = &mut self.frames[id];
        frame.key = key;
        frame.fixed = true;
        frame.dirty = false;
        self.link(id, policy);
    }

    fn reposition(&mut self, id: FrameId, policy: ReplacementPolicy) {
        self.unlink(id);
        self.link(id, policy);
        trace!("reposition frame {} ({:?})", id, policy);
    }

    fn link(&mut self, id: FrameId, policy: ReplacementPolicy) {
        match policy {
            ReplacementPolicy::Lru => self.link_head(id),
            ReplacementPolicy::Mru => self.link_tail(id),
        }
    }

    fn link_head(&mut self, id: FrameId) {
        self.frames[id].prev = None;
        self.frames[id].next = self.head;
        match self.head {
            Some(old) => self.frames[old].prev = Some(id),
            None => self.tail = Some(id),
        }
        self.head = Some(id);
    }

    fn link_tail(&mut self, id: FrameId) {
        self.frames[id].next = None;
        self.frames[id].prev = self.tail;
        match self.tail {
            Some(old) => self.frames[old].next = Some(id),
            None => self.head = Some(id),
        }
        self.tail = Some(id);
    }

    fn unlink(&mut self, id: FrameId) {
        let (prev, next) = (self.frames[id].prev, self.frames[id].next);
        match prev {
            Some(p) => self.frames[p].next = next,
            None => {
                if self.head == Some(id) {
                    self.head = next;
                }
            }
        }
        match next {
            Some(n) => self.frames[n].prev = prev,
            None => {
                if self.tail == Some(id) {
                    self.tail = prev;
                }
            }
        }
        self.frames[id].prev = None;
        self.frames[id].next = None;
    }

    /// Return an unlinked frame to the free list; its content is invalid
    fn push_free(&mut self, id: FrameId) {
        let frame = &mut self.frames[id];
        frame.fixed = false;
        frame.dirty = false;
        frame.prev = None;
        frame.next = self.free_head;
        self.free_head = Some(id);
    }

    fn pop_free(&mut self) -> Option<FrameId> {
        let id = self.free_head?;
        self.free_head = self.frames[id].next.take();
        Some(id)
    }
}

impl<S: PagedFile> BufferPool<S> {
    /// Add a page at the end of the file and fix a zeroed buffer for it
    pub fn alloc_page(&mut self, file: FileHandle) -> FileResult<(PageId, &mut [u8])> {
        let page_id = self.io.allocate_page(file)?;
        let data = self.allocate(file, page_id)?;
        Ok((page_id, data))
    }

    /// Fix the first page of the file, or `None` if the file has no pages
    pub fn first_page(&mut self, file: FileHandle) -> FileResult<Option<(PageId, &mut [u8])>> {
        self.page_from(file, 0)
    }

    /// Fix the page following `after` in file order, or `None` at end of file.
    ///
    /// `after` itself is left as the caller had it.
    pub fn next_page(
        &mut self,
        file: FileHandle,
        after: PageId,
    ) -> FileResult<Option<(PageId, &mut [u8])>> {
        match after.checked_add(1) {
            Some(page_id) => self.page_from(file, page_id),
            None => Ok(None),
        }
    }

    fn page_from(
        &mut self,
        file: FileHandle,
        page_id: PageId,
    ) -> FileResult<Option<(PageId, &mut [u8])>> {
        if page_id >= self.io.page_count(file)? {
            return Ok(None);
        }
        let data = self.acquire(file, page_id)?;
        Ok(Some((page_id, data)))
    }
}

impl<S: PageIo> Drop for BufferPool<S> {
    fn drop(&mut self) {
        if let Err(e) = self.flush_all() {
            warn!("failed to flush buffer pool on drop: {e}");
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;

    /// In-memory page store that counts I/O and can be told to fail
    #[derive(Default)]
    pub(crate) struct MemoryFile {
        pages: HashMap<(FileHandle, PageId), Vec<u8>>,
        page_counts: HashMap<FileHandle, usize>,
        pub reads: usize,
        pub writes: usize,
        pub fail_reads: bool,
        pub fail_writes: bool,
    }

    impl MemoryFile {
        pub fn with_pages(file: FileHandle, count: usize) -> Self {
            let mut mem = Self::default();
            mem.page_counts.insert(file, count);
            mem
        }

        pub fn stored(&self, file: FileHandle, page_id: PageId) -> Option<&[u8]> {
            self.pages.get(&(file, page_id)).map(|p| p.as_slice())
        }
    }

    impl PageIo for MemoryFile {
        fn read_page(
            &mut self,
            file: FileHandle,
            page_id: PageId,
            buffer: &mut [u8],
        ) -> FileResult<()> {
            if self.fail_reads {
                return Err(FileError::IncompleteRead(page_id));
            }
            if page_id >= self.page_counts.get(&file).copied().unwrap_or(0) {
                return Err(FileError::InvalidPage {
                    file: file.as_usize(),
                    page_id,
                });
            }
            match self.pages.get(&(file, page_id)) {
                Some(stored) => buffer.copy_from_slice(stored),
                None => buffer.fill(0),
            }
            self.reads += 1;
            Ok(())
        }

        fn write_page(
            &mut self,
            file: FileHandle,
            page_id: PageId,
            buffer: &[u8],
        ) -> FileResult<()> {
            if self.fail_writes {
                return Err(FileError::IncompleteWrite(page_id));
            }
            self.pages.insert((file, page_id), buffer.to_vec());
            self.writes += 1;
            Ok(())
        }
    }

    impl PagedFile for MemoryFile {
        fn page_count(&mut self, file: FileHandle) -> FileResult<usize> {
            Ok(self.page_counts.get(&file).copied().unwrap_or(0))
        }

        fn allocate_page(&mut self, file: FileHandle) -> FileResult<PageId> {
            let count = self.page_counts.entry(file).or_insert(0);
            *count += 1;
            Ok(*count - 1)
        }
    }

    const FILE: FileHandle = FileHandle::new(0);

    fn pool(pages: usize, capacity: usize) -> BufferPool<MemoryFile> {
        BufferPool::with_capacity(MemoryFile::with_pages(FILE, pages), capacity)
    }

    fn touch(bp: &mut BufferPool<MemoryFile>, page_id: PageId) {
        bp.acquire(FILE, page_id).unwrap();
        bp.release(FILE, page_id, false).unwrap();
    }

    #[test]
    fn test_double_fix_and_double_unfix() {
        let mut bp = pool(4, 4);

        bp.acquire(FILE, 1).unwrap();
        assert!(matches!(
            bp.acquire(FILE, 1),
            Err(FileError::AlreadyFixed { page_id: 1, .. })
        ));

        bp.release(FILE, 1, false).unwrap();
        assert!(matches!(
            bp.release(FILE, 1, false),
            Err(FileError::AlreadyUnfixed { page_id: 1, .. })
        ));
        assert!(matches!(
            bp.release(FILE, 2, false),
            Err(FileError::NotInBuffer { page_id: 2, .. })
        ));
    }

    #[test]
    fn test_lru_evicts_least_recently_used() {
        let mut bp = pool(3, 2);

        touch(&mut bp, 0);
        touch(&mut bp, 1);
        bp.acquire(FILE, 2).unwrap();

        assert!(!bp.is_page_cached(FILE, 0));
        assert!(bp.is_page_cached(FILE, 1));
        assert!(bp.is_page_cached(FILE, 2));
    }

    #[test]
    fn test_mru_evicts_most_recently_used() {
        let mut bp = pool(3, 2);
        bp.set_policy(FILE, ReplacementPolicy::Mru);

        touch(&mut bp, 0);
        touch(&mut bp, 1);
        assert_eq!(bp.resident_pages(), vec![(FILE, 0), (FILE, 1)]);
        bp.acquire(FILE, 2).unwrap();

        assert!(bp.is_page_cached(FILE, 0));
        assert!(!bp.is_page_cached(FILE, 1));
        assert!(bp.is_page_cached(FILE, 2));
    }

    #[test]
    fn test_lru_hit_moves_page_to_head() {
        let mut bp = pool(4, 3);

        touch(&mut bp, 0);
        touch(&mut bp, 1);
        touch(&mut bp, 2);
        touch(&mut bp, 0);
        assert_eq!(bp.resident_pages(), vec![(FILE, 0), (FILE, 2), (FILE, 1)]);

        bp.acquire(FILE, 3).unwrap();
        assert!(!bp.is_page_cached(FILE, 1));
        assert!(bp.is_page_cached(FILE, 0));
    }

    #[test]
    fn test_policy_change_applies_on_next_reposition() {
        let mut bp = pool(4, 4);

        touch(&mut bp, 0);
        touch(&mut bp, 1);
        assert_eq!(bp.resident_pages(), vec![(FILE, 1), (FILE, 0)]);

        bp.set_policy(FILE, ReplacementPolicy::Mru);
        assert_eq!(bp.resident_pages(), vec![(FILE, 1), (FILE, 0)]);

        touch(&mut bp, 1);
        assert_eq!(bp.resident_pages(), vec![(FILE, 0), (FILE, 1)]);
        assert_eq!(bp.policy(FILE), ReplacementPolicy::Mru);

        bp.forget_file(FILE);
        assert_eq!(bp.policy(FILE), ReplacementPolicy::Lru);
    }

    #[test]
    fn test_victim_skips_fixed_pages() {
        let mut bp = pool(4, 2);

        touch(&mut bp, 0);
        bp.acquire(FILE, 1).unwrap();
        // Page 1 is at the head, page 0 at the tail; pin 0 as well
        bp.acquire(FILE, 0).unwrap();
        assert!(matches!(
            bp.acquire(FILE, 2),
            Err(FileError::NoBufferSpace(2))
        ));

        bp.release(FILE, 1, false).unwrap();
        bp.acquire(FILE, 2).unwrap();
        assert!(!bp.is_page_cached(FILE, 1));
        assert!(bp.is_page_fixed(FILE, 0));
    }

    #[test]
    fn test_dirty_victim_written_back() {
        let mut bp = pool(3, 1);

        let page = bp.acquire(FILE, 0).unwrap();
        page[0] = 77;
        bp.release(FILE, 0, true).unwrap();

        bp.acquire(FILE, 1).unwrap();
        assert_eq!(bp.io().writes, 1);
        assert_eq!(bp.io().stored(FILE, 0).unwrap()[0], 77);
        bp.release(FILE, 1, false).unwrap();

        let page = bp.acquire(FILE, 0).unwrap();
        assert_eq!(page[0], 77);
        // Page 1 was clean
        assert_eq!(bp.io().writes, 1);
    }

    #[test]
    fn test_failed_write_keeps_victim() {
        let mut bp = pool(3, 1);

        let page = bp.acquire(FILE, 0).unwrap();
        page[0] = 5;
        bp.release(FILE, 0, true).unwrap();

        bp.io_mut().fail_writes = true;
        assert!(matches!(
            bp.acquire(FILE, 1),
            Err(FileError::IncompleteWrite(0))
        ));
        assert!(bp.is_page_cached(FILE, 0));
        assert_eq!(bp.dirty_page_count(), 1);

        bp.io_mut().fail_writes = false;
        bp.acquire(FILE, 1).unwrap();
        assert!(!bp.is_page_cached(FILE, 0));
        assert_eq!(bp.io().stored(FILE, 0).unwrap()[0], 5);
    }

    #[test]
    fn test_failed_read_returns_frame() {
        let mut bp = pool(3, 1);

        bp.io_mut().fail_reads = true;
        assert!(bp.acquire(FILE, 0).is_err());
        assert_eq!(bp.resident_count(), 0);
        assert!(bp.resident_pages().is_empty());

        bp.io_mut().fail_reads = false;
        bp.acquire(FILE, 0).unwrap();
        assert_eq!(bp.resident_count(), 1);
    }

    #[test]
    fn test_out_of_range_page_is_pass_through() {
        let mut bp = pool(2, 2);
        assert!(matches!(
            bp.acquire(FILE, 9),
            Err(FileError::InvalidPage { page_id: 9, .. })
        ));
        assert_eq!(bp.resident_count(), 0);
    }

    #[test]
    fn test_allocate() {
        let mut bp = pool(0, 2);

        let (page_id, data) = bp.alloc_page(FILE).unwrap();
        assert_eq!(page_id, 0);
        assert!(data.iter().all(|&b| b == 0));
        data[0] = 1;
        assert_eq!(bp.io().reads, 0);
        assert!(bp.is_page_fixed(FILE, 0));

        assert!(matches!(
            bp.allocate(FILE, 0),
            Err(FileError::AlreadyInBuffer { page_id: 0, .. })
        ));
        bp.release(FILE, 0, true).unwrap();
        assert!(matches!(
            bp.allocate(FILE, 0),
            Err(FileError::AlreadyInBuffer { .. })
        ));
    }

    #[test]
    fn test_mark_used() {
        let mut bp = pool(3, 3);

        assert!(matches!(
            bp.mark_used(FILE, 0),
            Err(FileError::NotInBuffer { .. })
        ));

        touch(&mut bp, 0);
        assert!(matches!(
            bp.mark_used(FILE, 0),
            Err(FileError::AlreadyUnfixed { .. })
        ));

        bp.acquire(FILE, 0).unwrap();
        bp.mark_used(FILE, 0).unwrap();
        assert!(bp.is_page_fixed(FILE, 0));
        assert_eq!(bp.dirty_page_count(), 1);

        // Clean release does not clear the dirty flag
        bp.release(FILE, 0, false).unwrap();
        assert_eq!(bp.dirty_page_count(), 1);
    }

    #[test]
    fn test_release_file_with_fixed_page_changes_nothing() {
        let other = FileHandle::new(1);
        let mut mem = MemoryFile::with_pages(FILE, 4);
        mem.page_counts.insert(other, 4);
        let mut bp = BufferPool::with_capacity(mem, 8);

        bp.acquire(FILE, 0).unwrap();
        bp.release(FILE, 0, true).unwrap();
        bp.acquire(FILE, 1).unwrap();
        bp.acquire(other, 0).unwrap();
        bp.release(other, 0, true).unwrap();
        let before = bp.resident_pages();

        assert!(matches!(
            bp.release_file(FILE),
            Err(FileError::AlreadyFixed { page_id: 1, .. })
        ));
        assert_eq!(bp.resident_pages(), before);
        assert_eq!(bp.dirty_page_count(), 2);
        assert_eq!(bp.io().writes, 0);

        bp.release(FILE, 1, false).unwrap();
        bp.release_file(FILE).unwrap();
        assert_eq!(bp.resident_pages(), vec![(other, 0)]);
        assert_eq!(bp.io().writes, 1);
        assert!(bp.io().stored(FILE, 0).is_some());
    }

    #[test]
    fn test_released_frames_are_reused() {
        let mut bp = pool(4, 2);

        touch(&mut bp, 0);
        touch(&mut bp, 1);
        bp.release_file(FILE).unwrap();
        assert_eq!(bp.resident_count(), 0);

        touch(&mut bp, 2);
        touch(&mut bp, 3);
        assert_eq!(bp.resident_count(), 2);
        assert_eq!(bp.stats().buffer_misses, 4);
    }

    #[test]
    fn test_stats_counting() {
        let mut bp = pool(3, 3);

        touch(&mut bp, 0);
        touch(&mut bp, 0);
        bp.acquire(FILE, 1).unwrap();
        bp.release(FILE, 1, true).unwrap();
        touch(&mut bp, 2);
        touch(&mut bp, 0);

        let stats = bp.stats();
        assert_eq!(stats.logical_reads, 5);
        assert_eq!(stats.logical_writes, 1);
        assert_eq!(stats.buffer_hits, 2);
        assert_eq!(stats.buffer_misses, 3);
        assert_eq!(stats.physical_reads, 3);
        assert_eq!(stats.physical_writes, 0);

        bp.reset_stats();
        assert_eq!(bp.stats(), PoolStats::default());
    }

    #[test]
    fn test_set_capacity() {
        let mut bp = pool(4, 3);
        touch(&mut bp, 0);
        touch(&mut bp, 1);

        assert!(matches!(
            bp.set_capacity(1),
            Err(FileError::InvalidCapacity { requested: 1, allocated: 2 })
        ));
        assert!(bp.set_capacity(0).is_err());

        bp.set_capacity(2).unwrap();
        touch(&mut bp, 2);
        assert_eq!(bp.resident_count(), 2);
        assert!(!bp.is_page_cached(FILE, 0));
    }

    #[test]
    fn test_page_enumeration() {
        let mut bp = pool(3, 2);

        let mut seen = Vec::new();
        let mut current = bp.first_page(FILE).unwrap().map(|(p, _)| p);
        while let Some(page_id) = current {
            seen.push(page_id);
            bp.release(FILE, page_id, false).unwrap();
            current = bp.next_page(FILE, page_id).unwrap().map(|(p, _)| p);
        }
        assert_eq!(seen, vec![0, 1, 2]);

        let mut empty = pool(0, 2);
        assert!(empty.first_page(FILE).unwrap().is_none());
    }

    #[test]
    fn test_next_page_after_last_possible_page() {
        let mut bp = pool(3, 2);
        assert!(bp.next_page(FILE, usize::MAX).unwrap().is_none());
        assert!(bp.next_page(FILE, 2).unwrap().is_none());
        assert_eq!(bp.resident_count(), 0);
    }

    #[test]
    fn test_flush_all() {
        let mut bp = pool(3, 3);
        for page_id in 0..3 {
            let page = bp.acquire(FILE, page_id).unwrap();
            page[0] = page_id as u8 + 1;
            bp.release(FILE, page_id, true).unwrap();
        }

        bp.flush_all().unwrap();
        assert_eq!(bp.dirty_page_count(), 0);
        for page_id in 0..3 {
            assert_eq!(bp.io().stored(FILE, page_id).unwrap()[0], page_id as u8 + 1);
        }
        assert_eq!(bp.stats().physical_writes, 3);
    }
}
