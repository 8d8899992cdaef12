use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::common::config::DB_PAGE_SIZE;

/// A raw page image, exactly one disk page's worth of bytes.
pub type PageImage = [u8; DB_PAGE_SIZE];

/// Page is the basic unit of storage within the system: one frame's image
/// plus the reader/writer latch guarding its bytes. Residency metadata (page
/// id, pin count, dirty flag) belongs to the buffer pool and is tracked
/// under the pool mutex, not here.
///
/// Callers may read the image only while holding the read latch and write it
/// only while holding the write latch; a write must be reported through
/// `BufferPoolManager::unpin_page(.., true)` once the latch is released.
pub struct Page {
    data: RwLock<Box<PageImage>>,
}

impl Page {
    pub(crate) fn new() -> Self {
        Self {
            data: RwLock::new(Box::new([0; DB_PAGE_SIZE])),
        }
    }

    /// Acquires the page's read latch, blocking until no writer holds it.
    pub fn rlatch(&self) -> RwLockReadGuard<'_, Box<PageImage>> {
        self.data.read()
    }

    /// Acquires the page's write latch, blocking until the page is unlatched.
    pub fn wlatch(&self) -> RwLockWriteGuard<'_, Box<PageImage>> {
        self.data.write()
    }
}
