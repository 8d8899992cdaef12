use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::RwLock;

use crate::common::config::{PageId, DB_PAGE_SIZE};
use crate::common::exception::DiskError;
use crate::storage::disk::disk_manager::DiskManager;
use crate::storage::page::page::PageImage;

/// MemoryDiskManager replicates the utility of the disk manager in memory.
/// It is primarily used for tests and data-structure performance work; pages
/// that were never written read back as zeroes.
pub struct MemoryDiskManager {
    pages: RwLock<HashMap<PageId, Box<PageImage>>>,
    next_page_id: AtomicU32,
}

impl Default for MemoryDiskManager {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDiskManager {
    pub fn new() -> Self {
        Self {
            pages: RwLock::new(HashMap::new()),
            next_page_id: AtomicU32::new(0),
        }
    }
}

impl DiskManager for MemoryDiskManager {
    fn read_page(&self, page_id: PageId, page_data: &mut PageImage) -> Result<(), DiskError> {
        match self.pages.read().get(&page_id) {
            Some(image) => page_data.copy_from_slice(&image[..]),
            None => page_data.fill(0),
        }
        Ok(())
    }

    fn write_page(&self, page_id: PageId, page_data: &PageImage) -> Result<(), DiskError> {
        self.pages.write().insert(page_id, Box::new(*page_data));
        Ok(())
    }

    fn allocate_page(&self) -> PageId {
        self.next_page_id.fetch_add(1, Ordering::SeqCst)
    }

    fn deallocate_page(&self, page_id: PageId) {
        self.pages.write().remove(&page_id);
    }
}
