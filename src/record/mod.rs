mod error;
mod page;
mod record;
mod scan;
mod slotted_file;

pub use error::{RecordError, RecordResult};
pub use page::{MAX_RECORD_SIZE, PageHeader, SLOT_SIZE, SLOTTED_MAGIC, SlottedPage};
pub use record::{Record, RecordId, SlotId};
pub use scan::Scan;
pub use slotted_file::{SlottedFile, Utilization};
