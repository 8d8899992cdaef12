use std::cell::Cell;
use std::sync::Arc;

use crate::buffer::buffer_pool_manager::BufferPoolManager;
use crate::common::config::PageId;
use crate::storage::page::page::Page;

/// Owning pin guard: holds one pin on a fetched or newly created page and
/// releases it on drop, reporting whether the holder wrote the image. Using
/// the guard instead of raw `fetch_page`/`unpin_page` pairs makes pin leaks
/// unrepresentable on early-return paths.
///
/// The guard must be dropped after any latch taken on its page, which the
/// usual declaration order (guard first, latch second) already guarantees.
pub struct PageGuard<'a> {
    bpm: &'a BufferPoolManager,
    page: Arc<Page>,
    page_id: PageId,
    dirty: Cell<bool>,
}

impl<'a> PageGuard<'a> {
    pub(crate) fn new(bpm: &'a BufferPoolManager, page_id: PageId, page: Arc<Page>) -> Self {
        Self {
            bpm,
            page,
            page_id,
            dirty: Cell::new(false),
        }
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    /// Records that the holder wrote the page image; the eventual unpin will
    /// carry the dirty bit.
    pub fn mark_dirty(&self) {
        self.dirty.set(true);
    }
}

impl Drop for PageGuard<'_> {
    fn drop(&mut self) {
        self.bpm.unpin_page(self.page_id, self.dirty.get());
    }
}
