use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use log::{debug, error, trace, warn};
use parking_lot::Mutex;

use crate::buffer::clock_replacer::ClockReplacer;
use crate::common::config::{FrameId, PageId, INVALID_PAGE_ID};
use crate::storage::disk::disk_manager::DiskManager;
use crate::storage::page::page::Page;
use crate::storage::page::page_guard::PageGuard;

/// Residency metadata for one frame. Guarded by the pool mutex; the page
/// image itself is guarded by the page's own latch.
struct FrameMeta {
    page_id: PageId,
    pin_count: u32,
    is_dirty: bool,
}

impl FrameMeta {
    fn reset(&mut self) {
        self.page_id = INVALID_PAGE_ID;
        self.pin_count = 0;
        self.is_dirty = false;
    }
}

struct PoolState {
    metas: Vec<FrameMeta>,
    /// Resident page id -> frame holding it. Injective.
    page_table: HashMap<PageId, FrameId>,
    /// Frames that have never held a page or were returned by `delete_page`.
    /// Disjoint from the frames reachable through the page table.
    free_list: VecDeque<FrameId>,
}

/// BufferPoolManager caches disk pages in a fixed array of frames, pinning
/// resident pages against eviction and writing dirty victims back before
/// their frame is reassigned. Replacement candidates come from the free list
/// first and from the clock replacer after that.
///
/// Every operation is atomic under one pool-wide mutex, held across the disk
/// I/O it performs. Page content latches are separate: callers acquire them
/// through `Page::rlatch`/`Page::wlatch` after fetching, and must not hold a
/// page's write latch while calling `flush_page` on that same page.
pub struct BufferPoolManager {
    pool_size: usize,
    frames: Vec<Arc<Page>>,
    state: Mutex<PoolState>,
    replacer: ClockReplacer,
    disk_manager: Arc<dyn DiskManager>,
}

impl BufferPoolManager {
    pub fn new(pool_size: usize, disk_manager: Arc<dyn DiskManager>) -> Self {
        let metas = (0..pool_size)
            .map(|_| FrameMeta {
                page_id: INVALID_PAGE_ID,
                pin_count: 0,
                is_dirty: false,
            })
            .collect();
        Self {
            pool_size,
            frames: (0..pool_size).map(|_| Arc::new(Page::new())).collect(),
            state: Mutex::new(PoolState {
                metas,
                page_table: HashMap::new(),
                free_list: (0..pool_size).collect(),
            }),
            replacer: ClockReplacer::new(pool_size),
            disk_manager,
        }
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Fetches the page with the given id, pinning its frame. Cache misses
    /// read the image from disk into a frame taken from the free list or, if
    /// none is free, evicted through the replacer (writing a dirty victim
    /// back first). Returns `None` when every frame is pinned or the disk
    /// read fails.
    pub fn fetch_page(&self, page_id: PageId) -> Option<Arc<Page>> {
        if page_id == INVALID_PAGE_ID {
            return None;
        }
        let mut state = self.state.lock();
        if let Some(&frame_id) = state.page_table.get(&page_id) {
            state.metas[frame_id].pin_count += 1;
            self.replacer.pin(frame_id);
            trace!("fetch page {page_id}: hit in frame {frame_id}");
            return Some(Arc::clone(&self.frames[frame_id]));
        }

        let frame_id = self.acquire_frame(&mut state)?;
        {
            let mut data = self.frames[frame_id].wlatch();
            if let Err(e) = self.disk_manager.read_page(page_id, &mut data) {
                error!("fetch page {page_id}: {e}");
                data.fill(0);
                drop(data);
                state.free_list.push_back(frame_id);
                return None;
            }
        }
        let meta = &mut state.metas[frame_id];
        meta.page_id = page_id;
        meta.pin_count = 1;
        meta.is_dirty = false;
        // The replacer is frame-indexed; pinning by page id here would leave
        // the frame victimizable.
        self.replacer.pin(frame_id);
        state.page_table.insert(page_id, frame_id);
        trace!("fetch page {page_id}: read into frame {frame_id}");
        Some(Arc::clone(&self.frames[frame_id]))
    }

    /// Drops one pin from the page, folding `is_dirty` into the frame's
    /// dirty flag. When the pin count reaches zero the frame becomes a
    /// replacement candidate. Returns false if the page is not resident.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> bool {
        let mut state = self.state.lock();
        let Some(&frame_id) = state.page_table.get(&page_id) else {
            return false;
        };
        let meta = &mut state.metas[frame_id];
        meta.is_dirty |= is_dirty;
        if meta.pin_count > 0 {
            meta.pin_count -= 1;
            if meta.pin_count == 0 {
                self.replacer.unpin(frame_id);
            }
        } else {
            warn!("unpin page {page_id}: pin count already zero");
        }
        true
    }

    /// Writes the page's image to disk if dirty, regardless of pin state.
    /// Returns false if the page is not resident or the write fails.
    pub fn flush_page(&self, page_id: PageId) -> bool {
        let mut state = self.state.lock();
        let Some(&frame_id) = state.page_table.get(&page_id) else {
            return false;
        };
        if state.metas[frame_id].is_dirty {
            let data = self.frames[frame_id].rlatch();
            if let Err(e) = self.disk_manager.write_page(page_id, &data) {
                error!("flush page {page_id}: {e}");
                return false;
            }
            drop(data);
            state.metas[frame_id].is_dirty = false;
        }
        true
    }

    /// Allocates a fresh page on disk and installs it, zero-filled and
    /// pinned, in a frame. Returns `None` when every frame is pinned.
    pub fn new_page(&self) -> Option<(PageId, Arc<Page>)> {
        let mut state = self.state.lock();
        let frame_id = self.acquire_frame(&mut state)?;
        let page_id = self.disk_manager.allocate_page();
        self.frames[frame_id].wlatch().fill(0);
        let meta = &mut state.metas[frame_id];
        meta.page_id = page_id;
        meta.pin_count = 1;
        meta.is_dirty = false;
        state.page_table.insert(page_id, frame_id);
        self.replacer.pin(frame_id);
        debug!("new page {page_id} in frame {frame_id}");
        Some((page_id, Arc::clone(&self.frames[frame_id])))
    }

    /// Removes the page from the pool and deallocates it on disk. Returns
    /// false if the page is resident and pinned; a page that is not resident
    /// is only deallocated.
    pub fn delete_page(&self, page_id: PageId) -> bool {
        let mut state = self.state.lock();
        let Some(&frame_id) = state.page_table.get(&page_id) else {
            self.disk_manager.deallocate_page(page_id);
            return true;
        };
        if state.metas[frame_id].pin_count > 0 {
            return false;
        }
        state.page_table.remove(&page_id);
        self.disk_manager.deallocate_page(page_id);
        state.metas[frame_id].reset();
        self.frames[frame_id].wlatch().fill(0);
        // The frame leaves the victim pool and rejoins the free list.
        self.replacer.pin(frame_id);
        state.free_list.push_back(frame_id);
        debug!("deleted page {page_id}, frame {frame_id} freed");
        true
    }

    /// Writes every dirty resident page back to disk.
    pub fn flush_all_pages(&self) {
        let mut state = self.state.lock();
        for frame_id in 0..self.pool_size {
            let meta = &state.metas[frame_id];
            if meta.page_id == INVALID_PAGE_ID || !meta.is_dirty {
                continue;
            }
            let page_id = meta.page_id;
            let data = self.frames[frame_id].rlatch();
            if let Err(e) = self.disk_manager.write_page(page_id, &data) {
                error!("flush page {page_id}: {e}");
                continue;
            }
            drop(data);
            state.metas[frame_id].is_dirty = false;
        }
    }

    /// Like `fetch_page`, but returns an owning guard that releases the pin
    /// on drop.
    pub fn fetch_page_guarded(&self, page_id: PageId) -> Option<PageGuard<'_>> {
        let page = self.fetch_page(page_id)?;
        Some(PageGuard::new(self, page_id, page))
    }

    /// Like `new_page`, but returns an owning guard that releases the pin on
    /// drop.
    pub fn new_page_guarded(&self) -> Option<PageGuard<'_>> {
        let (page_id, page) = self.new_page()?;
        Some(PageGuard::new(self, page_id, page))
    }

    /// Picks a frame for reuse: free list first, replacer victim otherwise.
    /// A dirty victim is written back before its frame is handed out; the
    /// returned frame has no page-table entry, zeroed metadata and a zeroed
    /// image (victim path), and is pinned in the replacer.
    fn acquire_frame(&self, state: &mut PoolState) -> Option<FrameId> {
        if let Some(frame_id) = state.free_list.pop_front() {
            return Some(frame_id);
        }
        let frame_id = self.replacer.victim()?;
        let meta = &mut state.metas[frame_id];
        if meta.is_dirty {
            let data = self.frames[frame_id].rlatch();
            if let Err(e) = self.disk_manager.write_page(meta.page_id, &data) {
                error!("eviction write-back of page {} failed: {e}", meta.page_id);
                drop(data);
                self.replacer.unpin(frame_id);
                return None;
            }
            trace!("evicted dirty page {} from frame {frame_id}", meta.page_id);
        }
        if meta.page_id != INVALID_PAGE_ID {
            state.page_table.remove(&meta.page_id);
        }
        state.metas[frame_id].reset();
        self.frames[frame_id].wlatch().fill(0);
        Some(frame_id)
    }
}
