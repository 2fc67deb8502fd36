use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use super::error::{FileError, FileResult};
use super::page_io::{PageIo, PagedFile};
use super::{DEFAULT_MAX_OPEN_FILES, PAGE_SIZE, PageId};

/// Handle to an open paged file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileHandle(usize);

impl FileHandle {
    pub const fn new(raw: usize) -> Self {
        Self(raw)
    }

    pub fn as_usize(&self) -> usize {
        self.0
    }
}

/// Manages paged file operations
pub struct PagedFileManager {
    /// Map from file handles to open files
    open_files: HashMap<FileHandle, FileEntry>,
    /// Map from file paths to handles (for checking if already open)
    path_to_handle: HashMap<PathBuf, FileHandle>,
    /// Next available file handle
    next_handle: usize,
    /// Maximum number of open files
    max_open_files: usize,
}

struct FileEntry {
    file: File,
    path: PathBuf,
    /// Pages known to the file, including allocated pages not yet written
    page_count: usize,
}

impl PagedFileManager {
    /// Create a new paged file manager
    pub fn new() -> Self {
        Self::with_max_files(DEFAULT_MAX_OPEN_FILES)
    }

    /// Create a new paged file manager with specified max open files
    pub fn with_max_files(max_open_files: usize) -> Self {
        Self {
            open_files: HashMap::new(),
            path_to_handle: HashMap::new(),
            next_handle: 0,
            max_open_files,
        }
    }

    /// Create a new, empty file
    pub fn create_file<P: AsRef<Path>>(&mut self, path: P) -> FileResult<()> {
        let path = path.as_ref();

        if path.exists() {
            return Err(FileError::FileAlreadyExists(path.display().to_string()));
        }

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        File::create(path)?;
        Ok(())
    }

    /// Open an existing file
    pub fn open_file<P: AsRef<Path>>(&mut self, path: P) -> FileResult<FileHandle> {
        let path_ref = path.as_ref();
        let path = path_ref
            .canonicalize()
            .map_err(|_| FileError::FileNotFound(path_ref.display().to_string()))?;

        if let Some(&handle) = self.path_to_handle.get(&path) {
            return Ok(handle);
        }

        if self.open_files.len() >= self.max_open_files {
            return Err(FileError::TooManyOpenFiles);
        }

        let file = OpenOptions::new().read(true).write(true).open(&path)?;
        let page_count = file.metadata()?.len().div_ceil(PAGE_SIZE as u64) as usize;

        let handle = FileHandle(self.next_handle);
        self.next_handle += 1;

        self.open_files.insert(
            handle,
            FileEntry {
                file,
                path: path.clone(),
                page_count,
            },
        );
        self.path_to_handle.insert(path, handle);

        Ok(handle)
    }

    /// Close a file. Cached pages must have been released from the buffer pool first.
    pub fn close_file(&mut self, handle: FileHandle) -> FileResult<()> {
        let entry = self
            .open_files
            .remove(&handle)
            .ok_or(FileError::InvalidHandle(handle.0))?;

        self.path_to_handle.remove(&entry.path);
        Ok(())
    }

    /// Remove (delete) a file
    pub fn remove_file<P: AsRef<Path>>(&mut self, path: P) -> FileResult<()> {
        let path = path.as_ref();

        if let Ok(canonical_path) = path.canonicalize()
            && let Some(&handle) = self.path_to_handle.get(&canonical_path)
        {
            self.close_file(handle)?;
        }

        std::fs::remove_file(path)?;
        Ok(())
    }

    fn entry_mut(&mut self, handle: FileHandle) -> FileResult<&mut FileEntry> {
        self.open_files
            .get_mut(&handle)
            .ok_or(FileError::InvalidHandle(handle.0))
    }

    /// Sync a file to disk (flush all OS buffers)
    pub fn sync_file(&mut self, handle: FileHandle) -> FileResult<()> {
        self.entry_mut(handle)?.file.sync_data()?;
        Ok(())
    }

    /// Sync all open files to disk
    pub fn sync_all(&mut self) -> FileResult<()> {
        for entry in self.open_files.values_mut() {
            entry.file.sync_data()?;
        }
        Ok(())
    }

    /// Check if a file is open
    pub fn is_file_open(&self, handle: FileHandle) -> bool {
        self.open_files.contains_key(&handle)
    }

    /// Get the number of currently open files
    pub fn open_file_count(&self) -> usize {
        self.open_files.len()
    }
}

fn check_page_size(len: usize) -> FileResult<()> {
    if len != PAGE_SIZE {
        return Err(FileError::InvalidPageSize {
            expected: PAGE_SIZE,
            actual: len,
        });
    }
    Ok(())
}

impl PageIo for PagedFileManager {
    fn read_page(
        &mut self,
        handle: FileHandle,
        page_id: PageId,
        buffer: &mut [u8],
    ) -> FileResult<()> {
        check_page_size(buffer.len())?;

        let entry = self.entry_mut(handle)?;
        if page_id >= entry.page_count {
            return Err(FileError::InvalidPage {
                file: handle.0,
                page_id,
            });
        }

        let offset = (page_id * PAGE_SIZE) as u64;
        let file_size = entry.file.metadata()?.len();

        // Allocated but never written back
        if offset >= file_size {
            buffer.fill(0);
            return Ok(());
        }
        if offset + PAGE_SIZE as u64 > file_size {
            return Err(FileError::IncompleteRead(page_id));
        }

        entry.file.seek(SeekFrom::Start(offset))?;
        entry.file.read_exact(buffer).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => FileError::IncompleteRead(page_id),
            _ => FileError::Io(e),
        })?;

        Ok(())
    }

    fn write_page(&mut self, handle: FileHandle, page_id: PageId, buffer: &[u8]) -> FileResult<()> {
        check_page_size(buffer.len())?;

        let entry = self.entry_mut(handle)?;
        if page_id >= entry.page_count {
            return Err(FileError::InvalidPage {
                file: handle.0,
                page_id,
            });
        }

        let offset = (page_id * PAGE_SIZE) as u64;
        let required_size = offset + PAGE_SIZE as u64;

        let current_size = entry.file.metadata()?.len();
        if current_size < required_size {
            entry.file.set_len(required_size)?;
        }

        entry.file.seek(SeekFrom::Start(offset))?;
        entry.file.write_all(buffer).map_err(|e| match e.kind() {
            io::ErrorKind::WriteZero => FileError::IncompleteWrite(page_id),
            _ => FileError::Io(e),
        })?;
        // No sync per write; callers sync explicitly

        Ok(())
    }
}

impl PagedFile for PagedFileManager {
    fn page_count(&mut self, handle: FileHandle) -> FileResult<usize> {
        Ok(self.entry_mut(handle)?.page_count)
    }

    fn allocate_page(&mut self, handle: FileHandle) -> FileResult<PageId> {
        let entry = self.entry_mut(handle)?;
        let page_id = entry.page_count;
        entry.page_count += 1;
        Ok(page_id)
    }
}

impl Default for PagedFileManager {
    fn default() -> Self {
        Self::new()
    }
}
