use std::fmt;

use crate::common::config::PageId;
use crate::storage::page::page_types::hash_table_page_defs::FixedWidth;

/// Record identifier: the page holding a record plus its slot within that
/// page. Used as the value family of on-disk indexes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Rid {
    page_id: PageId,
    slot_num: u32,
}

impl Rid {
    pub fn new(page_id: PageId, slot_num: u32) -> Self {
        Self { page_id, slot_num }
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    pub fn slot_num(&self) -> u32 {
        self.slot_num
    }
}

impl fmt::Display for Rid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.page_id, self.slot_num)
    }
}

impl FixedWidth for Rid {
    const WIDTH: usize = 8;

    fn encode(&self, buf: &mut [u8]) {
        buf[..4].copy_from_slice(&self.page_id.to_le_bytes());
        buf[4..8].copy_from_slice(&self.slot_num.to_le_bytes());
    }

    fn decode(buf: &[u8]) -> Self {
        let mut page_id = [0u8; 4];
        let mut slot_num = [0u8; 4];
        page_id.copy_from_slice(&buf[..4]);
        slot_num.copy_from_slice(&buf[4..8]);
        Self {
            page_id: PageId::from_le_bytes(page_id),
            slot_num: u32::from_le_bytes(slot_num),
        }
    }
}
