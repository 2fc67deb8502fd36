use tracing::debug;

use super::error::{RecordError, RecordResult};
use super::record::{Record, RecordId, SlotId};
use crate::file::{PAGE_SIZE, PageId};

/// Tag identifying a page owned by the slotted record manager ("SPF1")
pub const SLOTTED_MAGIC: u32 = 0x5350_4631;

/// Size of one slot directory entry: offset u16 + length u16
pub const SLOT_SIZE: usize = 4;

/// Largest encoded record a page can ever hold
pub const MAX_RECORD_SIZE: usize = PAGE_SIZE - PageHeader::SIZE - SLOT_SIZE;

/// Page header stored at the beginning of each slotted page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageHeader {
    pub magic: u32,      // 4 bytes - SLOTTED_MAGIC
    pub free_off: u16,   // 2 bytes - First byte after the record area
    pub free_bytes: u16, // 2 bytes - Bytes between record area and slot directory
    pub nslots: u16,     // 2 bytes - Slot directory entries, live or not
    _padding: [u8; 6],   // 6 bytes - Padding to 16 bytes
}

impl PageHeader {
    pub const SIZE: usize = 16;

    fn empty(page_size: usize) -> Self {
        Self {
            magic: SLOTTED_MAGIC,
            free_off: Self::SIZE as u16,
            free_bytes: (page_size - Self::SIZE) as u16,
            nslots: 0,
            _padding: [0; 6],
        }
    }

    pub fn serialize(&self) -> [u8; Self::SIZE] {
        let mut result = [0u8; Self::SIZE];
        result[0..4].copy_from_slice(&self.magic.to_le_bytes());
        result[4..6].copy_from_slice(&self.free_off.to_le_bytes());
        result[6..8].copy_from_slice(&self.free_bytes.to_le_bytes());
        result[8..10].copy_from_slice(&self.nslots.to_le_bytes());
        result
    }

    pub fn deserialize(data: &[u8]) -> Option<Self> {
        if data.len() < Self::SIZE {
            return None;
        }

        Some(Self {
            magic: u32::from_le_bytes([data[0], data[1], data[2], data[3]]),
            free_off: u16::from_le_bytes([data[4], data[5]]),
            free_bytes: u16::from_le_bytes([data[6], data[7]]),
            nslots: u16::from_le_bytes([data[8], data[9]]),
            _padding: [0; 6],
        })
    }
}

/// Zero-copy view of a buffer-pool page as a slotted page.
///
/// Records grow forward from the header; the slot directory grows backward
/// from the page end, entry `i` living at `page_end - (i + 1) * SLOT_SIZE`
/// however many entries exist. A zero-length entry is a free slot.
pub struct SlottedPage<'a> {
    page_id: PageId,
    buffer: &'a mut [u8],
    header: PageHeader, // Cached header, written back on every change
}

impl<'a> SlottedPage<'a> {
    /// Format `buffer` as an empty slotted page
    pub fn init(page_id: PageId, buffer: &'a mut [u8]) -> Self {
        buffer.fill(0);
        let header = PageHeader::empty(buffer.len());
        buffer[..PageHeader::SIZE].copy_from_slice(&header.serialize());
        debug!("formatted slotted page {}", page_id);

        Self {
            page_id,
            buffer,
            header,
        }
    }

    /// Wrap a formatted page, or `None` if the page is not a slotted page.
    ///
    /// A page carrying the slotted magic whose header or slot directory is
    /// inconsistent fails with `Deserialization`.
    pub fn from_buffer(page_id: PageId, buffer: &'a mut [u8]) -> RecordResult<Option<Self>> {
        let Some(header) = PageHeader::deserialize(buffer) else {
            return Ok(None);
        };
        if header.magic != SLOTTED_MAGIC {
            return Ok(None);
        }

        let page = Self {
            page_id,
            buffer,
            header,
        };
        page.validate()?;
        Ok(Some(page))
    }

    /// Check that every header field and live slot stays inside the page
    fn validate(&self) -> RecordResult<()> {
        let corrupt = |what: String| {
            RecordError::Deserialization(format!("corrupt slotted page {}: {}", self.page_id, what))
        };

        let page_len = self.buffer.len();
        let nslots = self.slot_count();
        if nslots * SLOT_SIZE > page_len - PageHeader::SIZE {
            return Err(corrupt(format!("{} slots cannot fit", nslots)));
        }

        let free_off = self.header.free_off as usize;
        let dir_start = self.directory_start();
        if free_off < PageHeader::SIZE || free_off > dir_start {
            return Err(corrupt(format!(
                "free offset {} outside {}..={}",
                free_off,
                PageHeader::SIZE,
                dir_start
            )));
        }
        if self.free_bytes() != dir_start - free_off {
            return Err(corrupt(format!(
                "free byte count {} does not match free area {}",
                self.free_bytes(),
                dir_start - free_off
            )));
        }

        let mut live_bytes = 0;
        for slot_id in 0..nslots {
            let (off, len) = self.slot(slot_id);
            if len == 0 {
                continue;
            }
            if off < PageHeader::SIZE || off + len > free_off {
                return Err(corrupt(format!(
                    "slot {} spans {}..{} outside the record area",
                    slot_id,
                    off,
                    off + len
                )));
            }
            live_bytes += len;
        }
        if live_bytes > free_off - PageHeader::SIZE {
            return Err(corrupt(format!(
                "live records hold {} bytes in a {} byte record area",
                live_bytes,
                free_off - PageHeader::SIZE
            )));
        }

        Ok(())
    }

    /// A never-used page: every byte is zero
    pub fn is_unformatted(buffer: &[u8]) -> bool {
        buffer.iter().all(|&b| b == 0)
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    pub fn header(&self) -> PageHeader {
        self.header
    }

    pub fn free_bytes(&self) -> usize {
        self.header.free_bytes as usize
    }

    pub fn slot_count(&self) -> usize {
        self.header.nslots as usize
    }

    /// Sum of the lengths of all live records
    pub fn used_bytes(&self) -> usize {
        (0..self.slot_count()).map(|i| self.slot(i).1).sum()
    }

    /// Number of live records
    pub fn record_count(&self) -> usize {
        (0..self.slot_count()).filter(|&i| self.slot(i).1 != 0).count()
    }

    fn slot_addr(&self, slot_id: SlotId) -> usize {
        self.buffer.len() - (slot_id + 1) * SLOT_SIZE
    }

    /// (offset, length) of a directory entry
    fn slot(&self, slot_id: SlotId) -> (usize, usize) {
        let addr = self.slot_addr(slot_id);
        let off = u16::from_le_bytes([self.buffer[addr], self.buffer[addr + 1]]);
        let len = u16::from_le_bytes([self.buffer[addr + 2], self.buffer[addr + 3]]);
        (off as usize, len as usize)
    }

    fn set_slot(&mut self, slot_id: SlotId, off: usize, len: usize) {
        let addr = self.slot_addr(slot_id);
        self.buffer[addr..addr + 2].copy_from_slice(&(off as u16).to_le_bytes());
        self.buffer[addr + 2..addr + 4].copy_from_slice(&(len as u16).to_le_bytes());
    }

    fn write_header(&mut self) {
        self.buffer[..PageHeader::SIZE].copy_from_slice(&self.header.serialize());
    }

    /// First byte of the slot directory
    fn directory_start(&self) -> usize {
        self.buffer.len() - self.slot_count() * SLOT_SIZE
    }

    /// Free bytes directly after the record area
    fn contiguous_free(&self) -> usize {
        self.directory_start()
            .saturating_sub(self.header.free_off as usize)
    }

    fn find_free_slot(&self) -> Option<SlotId> {
        (0..self.slot_count()).find(|&i| self.slot(i).1 == 0)
    }

    /// First live slot at or after `from`
    pub fn next_occupied(&self, from: SlotId) -> Option<SlotId> {
        (from..self.slot_count()).find(|&i| self.slot(i).1 != 0)
    }

    fn live_slot(&self, slot_id: SlotId) -> RecordResult<(usize, usize)> {
        if slot_id >= self.slot_count() {
            return Err(RecordError::InvalidPage {
                page_id: self.page_id,
                slot_id,
            });
        }
        let (off, len) = self.slot(slot_id);
        if len == 0 {
            return Err(RecordError::AlreadyDeleted(RecordId::new(
                self.page_id,
                slot_id,
            )));
        }
        Ok((off, len))
    }

    /// Store a record, reusing the first free directory entry if there is one
    pub fn insert(&mut self, record: &Record<'_>) -> RecordResult<SlotId> {
        let len = record.serialized_len();
        if len > MAX_RECORD_SIZE {
            return Err(RecordError::TooLarge {
                len,
                max: MAX_RECORD_SIZE,
            });
        }

        let reuse = self.find_free_slot();
        let needed = len + if reuse.is_some() { 0 } else { SLOT_SIZE };
        if self.free_bytes() < needed {
            return Err(RecordError::NoSpace(self.page_id));
        }

        let slot_id = match reuse {
            Some(slot_id) => slot_id,
            None => {
                let slot_id = self.slot_count();
                self.header.nslots += 1;
                self.header.free_bytes -= SLOT_SIZE as u16;
                self.set_slot(slot_id, 0, 0);
                slot_id
            }
        };

        if self.contiguous_free() < len {
            self.compact();
            if self.contiguous_free() < len {
                self.write_header();
                return Err(RecordError::NoSpace(self.page_id));
            }
        }

        let off = self.header.free_off as usize;
        record.serialize_into(&mut self.buffer[off..off + len])?;
        self.set_slot(slot_id, off, len);
        self.header.free_off += len as u16;
        self.header.free_bytes -= len as u16;
        self.write_header();

        Ok(slot_id)
    }

    /// Raw encoded bytes of a live record
    pub fn get(&self, slot_id: SlotId) -> RecordResult<&[u8]> {
        let (off, len) = self.live_slot(slot_id)?;
        Ok(&self.buffer[off..off + len])
    }

    /// Decode a live record into the caller's scratch buffer
    pub fn record<'b>(&self, slot_id: SlotId, buf: &'b mut [u8]) -> RecordResult<Record<'b>> {
        Record::deserialize(self.get(slot_id)?, buf)
    }

    /// Free a slot and compact the page; the slot index stays reusable
    pub fn delete(&mut self, slot_id: SlotId) -> RecordResult<()> {
        self.live_slot(slot_id)?;
        self.set_slot(slot_id, 0, 0);
        self.compact();
        Ok(())
    }

    /// Slide live records together behind the header.
    ///
    /// Records move in ascending offset order, so a move never overwrites a
    /// record not yet moved. Only stored offsets change; slot indices do not.
    pub fn compact(&mut self) {
        let mut live: Vec<(usize, usize, SlotId)> = (0..self.slot_count())
            .filter_map(|i| {
                let (off, len) = self.slot(i);
                (len != 0).then_some((off, len, i))
            })
            .collect();
        live.sort_unstable();

        let before = self.header.free_off;
        let mut write = PageHeader::SIZE;
        for (off, len, slot_id) in live {
            if off != write {
                self.buffer.copy_within(off..off + len, write);
                self.set_slot(slot_id, write, len);
            }
            write += len;
        }

        self.header.free_off = write as u16;
        self.header.free_bytes = (self.directory_start() - write) as u16;
        self.write_header();
        debug!(
            "compacted page {}: free_off {} -> {}",
            self.page_id, before, write
        );
    }
}
