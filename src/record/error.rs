use crate::file::{FileError, PageId};
use thiserror::Error;

use super::record::{RecordId, SlotId};

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("File error: {0}")]
    File(#[from] FileError),

    #[error("Record of {len} bytes can never fit a page (max {max})")]
    TooLarge { len: usize, max: usize },

    #[error("No space on page {0} for record")]
    NoSpace(PageId),

    #[error("Invalid record id: page_id={page_id}, slot_id={slot_id}")]
    InvalidPage { page_id: PageId, slot_id: SlotId },

    #[error("Record already deleted: {0:?}")]
    AlreadyDeleted(RecordId),

    #[error("Scratch buffer too small: need {needed} bytes, have {capacity}")]
    BufferTooSmall { needed: usize, capacity: usize },

    #[error("Deserialization error: {0}")]
    Deserialization(String),
}

pub type RecordResult<T> = Result<T, RecordError>;
