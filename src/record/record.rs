use super::error::{RecordError, RecordResult};
use crate::file::PageId;

/// Slot identifier within a page
pub type SlotId = usize;

/// Physical identifier for a record (page + slot)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId {
    pub page_id: PageId,
    pub slot_id: SlotId,
}

impl RecordId {
    pub fn new(page_id: PageId, slot_id: SlotId) -> Self {
        Self { page_id, slot_id }
    }
}

/// Width of the numeric identifier on disk
const ID_SIZE: usize = 4;
/// Width of each text field's length prefix
const LEN_PREFIX_SIZE: usize = 2;

/// A student record: a numeric id and three byte strings.
///
/// Text fields are borrowed, either from the caller (on insert) or from the
/// caller's scratch buffer (on get and scan). No encoding is assumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Record<'a> {
    pub roll_no: i32,
    pub name: &'a [u8],
    pub dept: &'a [u8],
    pub level: &'a [u8],
}

impl<'a> Record<'a> {
    /// Smallest possible encoding: id plus three empty fields
    pub const MIN_SERIALIZED_SIZE: usize = ID_SIZE + 3 * LEN_PREFIX_SIZE;

    pub fn new(roll_no: i32, name: &'a [u8], dept: &'a [u8], level: &'a [u8]) -> Self {
        Self {
            roll_no,
            name,
            dept,
            level,
        }
    }

    fn fields(&self) -> [&'a [u8]; 3] {
        [self.name, self.dept, self.level]
    }

    /// Exact number of bytes `serialize_into` writes
    pub fn serialized_len(&self) -> usize {
        ID_SIZE
            + self
                .fields()
                .iter()
                .map(|f| LEN_PREFIX_SIZE + f.len())
                .sum::<usize>()
    }

    /// Scratch bytes `deserialize` needs for this record's fields (each zero-terminated)
    pub fn scratch_len(&self) -> usize {
        self.fields().iter().map(|f| f.len() + 1).sum()
    }

    /// Encode as `roll_no` (i32 LE) then each field as a u16 LE length and its bytes.
    ///
    /// Returns the number of bytes written.
    pub fn serialize_into(&self, dst: &mut [u8]) -> RecordResult<usize> {
        let len = self.serialized_len();
        if let Some(field) = self.fields().iter().find(|f| f.len() > u16::MAX as usize) {
            return Err(RecordError::TooLarge {
                len: field.len(),
                max: u16::MAX as usize,
            });
        }
        if dst.len() < len {
            return Err(RecordError::BufferTooSmall {
                needed: len,
                capacity: dst.len(),
            });
        }

        dst[..ID_SIZE].copy_from_slice(&self.roll_no.to_le_bytes());
        let mut offset = ID_SIZE;
        for field in self.fields() {
            dst[offset..offset + LEN_PREFIX_SIZE].copy_from_slice(&(field.len() as u16).to_le_bytes());
            offset += LEN_PREFIX_SIZE;
            dst[offset..offset + field.len()].copy_from_slice(field);
            offset += field.len();
        }

        Ok(offset)
    }

    /// Encode into a freshly allocated vector
    pub fn serialize(&self) -> RecordResult<Vec<u8>> {
        let mut bytes = vec![0u8; self.serialized_len()];
        self.serialize_into(&mut bytes)?;
        Ok(bytes)
    }

    /// Decode `src`, copying the text fields into `buf`.
    ///
    /// Each field is followed by a zero byte in `buf`, so `buf` must hold the
    /// three fields plus three terminators.
    pub fn deserialize(src: &[u8], buf: &'a mut [u8]) -> RecordResult<Record<'a>> {
        if src.len() < Self::MIN_SERIALIZED_SIZE {
            return Err(RecordError::Deserialization(format!(
                "record of {} bytes is shorter than the minimum {}",
                src.len(),
                Self::MIN_SERIALIZED_SIZE
            )));
        }

        let roll_no = i32::from_le_bytes([src[0], src[1], src[2], src[3]]);
        let mut offset = ID_SIZE;
        let name = read_field(src, &mut offset)?;
        let dept = read_field(src, &mut offset)?;
        let level = read_field(src, &mut offset)?;

        let needed = name.len() + dept.len() + level.len() + 3;
        if needed > buf.len() {
            return Err(RecordError::BufferTooSmall {
                needed,
                capacity: buf.len(),
            });
        }

        let (name_buf, rest) = buf.split_at_mut(name.len() + 1);
        let (dept_buf, rest) = rest.split_at_mut(dept.len() + 1);
        let (level_buf, _) = rest.split_at_mut(level.len() + 1);

        Ok(Record {
            roll_no,
            name: copy_terminated(name_buf, name),
            dept: copy_terminated(dept_buf, dept),
            level: copy_terminated(level_buf, level),
        })
    }
}

fn read_field<'s>(src: &'s [u8], offset: &mut usize) -> RecordResult<&'s [u8]> {
    let start = *offset;
    if start + LEN_PREFIX_SIZE > src.len() {
        return Err(RecordError::Deserialization(format!(
            "length prefix at byte {} runs past record end {}",
            start,
            src.len()
        )));
    }
    let len = u16::from_le_bytes([src[start], src[start + 1]]) as usize;
    let data_start = start + LEN_PREFIX_SIZE;
    if data_start + len > src.len() {
        return Err(RecordError::Deserialization(format!(
            "field of {} bytes at byte {} runs past record end {}",
            len,
            data_start,
            src.len()
        )));
    }
    *offset = data_start + len;
    Ok(&src[data_start..data_start + len])
}

/// Copy `field` to the front of `dst` (exactly one byte longer) and terminate it
fn copy_terminated<'a>(dst: &'a mut [u8], field: &[u8]) -> &'a [u8] {
    let len = field.len();
    dst[..len].copy_from_slice(field);
    dst[len] = 0;
    let dst: &'a [u8] = dst;
    &dst[..len]
}
