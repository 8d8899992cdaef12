use std::cmp::Ordering;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU32, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::thread;

use log::{debug, warn};
use parking_lot::RwLock;

use crate::buffer::buffer_pool_manager::BufferPoolManager;
use crate::common::config::{PageId, PAGE_ALLOC_RETRIES};
use crate::concurrency::transaction::Transaction;
use crate::container::hash_function::KeyHasher;
use crate::storage::index::KeyComparator;
use crate::storage::page::page_guard::PageGuard;
use crate::storage::page::page_types::hash_table_block_page::{
    HashTableBlockPage, HashTableBlockPageMut,
};
use crate::storage::page::page_types::hash_table_header_page::{
    HashTableHeaderPage, HashTableHeaderPageMut,
};
use crate::storage::page::page_types::hash_table_page_defs::{block_array_size, FixedWidth};

/// Result of one probe pass of the internal insert.
enum InsertOutcome {
    Inserted,
    Duplicate,
    Full,
}

/// Walks the table's logical slot space `[0, num_blocks * block_slots)`
/// linearly with wraparound, for exactly one full cycle. Callers group the
/// walk by block so each block page is latched once per visit.
struct Probe {
    pos: usize,
    visited: usize,
    total: usize,
    block_slots: usize,
}

impl Probe {
    fn new(start: usize, num_blocks: usize, block_slots: usize) -> Self {
        Self {
            pos: start,
            visited: 0,
            total: num_blocks * block_slots,
            block_slots,
        }
    }

    fn block(&self) -> usize {
        self.pos / self.block_slots
    }

    fn offset(&self) -> usize {
        self.pos % self.block_slots
    }

    /// Steps to the next slot. Returns false once the cycle is complete.
    fn advance(&mut self) -> bool {
        self.visited += 1;
        if self.visited >= self.total {
            return false;
        }
        self.pos = (self.pos + 1) % self.total;
        true
    }
}

/// A linear-probing hash table whose header and block pages live in the
/// buffer pool. Supports non-unique keys; identical (key, value) pairs are
/// rejected. Removal tombstones the slot so probe chains stay intact, and a
/// full probe cycle during insert triggers an in-place doubling resize.
///
/// Latch protocol: the table latch is taken shared by `get_value`, `insert`
/// and `remove` and exclusively by `resize`; the header page is read-latched
/// below it, and block pages are latched below the header (shared for
/// lookups, exclusive for mutation). Latches are released in reverse order,
/// and never two block latches at once: a probe crossing a block boundary
/// releases the current block before touching the next.
pub struct LinearProbeHashTable<K, V, C, H> {
    name: String,
    buffer_pool_manager: Arc<BufferPoolManager>,
    comparator: C,
    hash_fn: H,
    table_latch: RwLock<()>,
    header_page_id: AtomicU32,
    _marker: PhantomData<(K, V)>,
}

impl<K, V, C, H> LinearProbeHashTable<K, V, C, H>
where
    K: FixedWidth,
    V: FixedWidth + PartialEq,
    C: KeyComparator<K>,
    H: KeyHasher<K>,
{
    /// Creates a hash table spanning `num_buckets` block pages (at least
    /// one), allocating the header and every block through the buffer pool.
    ///
    /// # Panics
    ///
    /// Panics if the pool cannot yield a frame after `PAGE_ALLOC_RETRIES`
    /// attempts; a pool too small to host the table's own metadata is a
    /// configuration error.
    pub fn new(
        name: &str,
        buffer_pool_manager: Arc<BufferPoolManager>,
        comparator: C,
        num_buckets: usize,
        hash_fn: H,
    ) -> Self {
        let num_buckets = num_buckets.max(1);
        let header_page_id;
        {
            let header = Self::new_page_with_retry(&buffer_pool_manager);
            header_page_id = header.page_id();
            let mut data = header.page().wlatch();
            let mut view = HashTableHeaderPageMut::new(&mut data[..]);
            view.set_page_id(header_page_id);
            view.set_size(num_buckets);
            while view.num_blocks() < num_buckets {
                let block = Self::new_page_with_retry(&buffer_pool_manager);
                view.add_block_page_id(block.page_id());
                // A new block is all zeroes: every slot unoccupied. It can be
                // unpinned clean, since unwritten pages read back as zeroes.
            }
            header.mark_dirty();
        }
        debug!(
            "hash table {name}: header page {header_page_id}, {num_buckets} block pages of {} slots",
            block_array_size::<K, V>()
        );
        Self {
            name: name.to_string(),
            buffer_pool_manager,
            comparator,
            hash_fn,
            table_latch: RwLock::new(()),
            header_page_id: AtomicU32::new(header_page_id),
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn header_page_id(&self) -> PageId {
        self.header_page_id.load(AtomicOrdering::SeqCst)
    }

    /// Collects every value stored under `key` into `result`. Returns true
    /// iff the result vector is non-empty afterwards.
    pub fn get_value(&self, _transaction: &Transaction, key: &K, result: &mut Vec<V>) -> bool {
        let _table = self.table_latch.read();
        let header_guard = self.fetch_page_with_retry(self.header_page_id());
        let header_data = header_guard.page().rlatch();
        let header = HashTableHeaderPage::new(&header_data[..]);

        let block_slots = block_array_size::<K, V>();
        let num_blocks = header.num_blocks();
        debug_assert!(num_blocks > 0);
        let start = self.hash_fn.get_hash(key) as usize % (num_blocks * block_slots);
        let mut probe = Probe::new(start, num_blocks, block_slots);

        'probe: loop {
            let block_ind = probe.block();
            let block_guard = self.fetch_page_with_retry(header.block_page_id(block_ind));
            let block_data = block_guard.page().rlatch();
            let block = HashTableBlockPage::<K, V>::new(&block_data[..]);
            loop {
                let offset = probe.offset();
                if !block.is_occupied(offset) {
                    // A never-written slot ends the chain; tombstones do not.
                    break 'probe;
                }
                if block.is_readable(offset)
                    && self.comparator.compare(&block.key_at(offset), key) == Ordering::Equal
                {
                    result.push(block.value_at(offset));
                }
                if !probe.advance() {
                    break 'probe;
                }
                if probe.block() != block_ind {
                    break;
                }
            }
            // Block latch and pin release here, before the next block is
            // touched.
        }
        !result.is_empty()
    }

    /// Inserts the pair, growing the table when a full probe cycle finds no
    /// claimable slot. Returns false iff the identical (key, value) pair is
    /// already present.
    pub fn insert(&self, _transaction: &Transaction, key: &K, value: &V) -> bool {
        loop {
            {
                let _table = self.table_latch.read();
                match self.insert_internal(key, value) {
                    InsertOutcome::Inserted => return true,
                    InsertOutcome::Duplicate => return false,
                    InsertOutcome::Full => {}
                }
            }
            // The table was full for this key's probe cycle: double it
            // outside the shared latch, then retry.
            let size = self.get_size();
            self.resize(size);
        }
    }

    /// Removes the exact (key, value) pair by tombstoning its slot. Returns
    /// false if the pair is absent or already tombstoned.
    pub fn remove(&self, _transaction: &Transaction, key: &K, value: &V) -> bool {
        let _table = self.table_latch.read();
        let header_guard = self.fetch_page_with_retry(self.header_page_id());
        let header_data = header_guard.page().rlatch();
        let header = HashTableHeaderPage::new(&header_data[..]);

        let block_slots = block_array_size::<K, V>();
        let num_blocks = header.num_blocks();
        debug_assert!(num_blocks > 0);
        let start = self.hash_fn.get_hash(key) as usize % (num_blocks * block_slots);
        let mut probe = Probe::new(start, num_blocks, block_slots);

        loop {
            let block_ind = probe.block();
            let block_guard = self.fetch_page_with_retry(header.block_page_id(block_ind));
            let mut block_data = block_guard.page().wlatch();
            let mut block = HashTableBlockPageMut::<K, V>::new(&mut block_data[..]);
            loop {
                let offset = probe.offset();
                let matched = {
                    let view = block.as_ref();
                    if !view.is_occupied(offset) {
                        return false;
                    }
                    self.comparator.compare(&view.key_at(offset), key) == Ordering::Equal
                        && view.value_at(offset) == *value
                };
                if matched {
                    if !block.as_ref().is_readable(offset) {
                        // Already tombstoned.
                        return false;
                    }
                    block.remove(offset);
                    block_guard.mark_dirty();
                    return true;
                }
                if !probe.advance() {
                    return false;
                }
                if probe.block() != block_ind {
                    break;
                }
            }
        }
    }

    /// Rebuilds the table over `⌈2 * initial_size / BLOCK_ARRAY_SIZE⌉` block
    /// pages, re-inserting every live pair and deleting the old pages.
    /// Readers and writers are excluded for the duration.
    pub fn resize(&self, initial_size: usize) {
        let _table = self.table_latch.write();
        let block_slots = block_array_size::<K, V>();
        let new_num_blocks = (2 * initial_size).div_ceil(block_slots).max(1);
        let old_header_page_id = self.header_page_id();

        let new_header = Self::new_page_with_retry(&self.buffer_pool_manager);
        let new_header_page_id = new_header.page_id();
        self.header_page_id
            .store(new_header_page_id, AtomicOrdering::SeqCst);
        {
            let mut data = new_header.page().wlatch();
            let mut view = HashTableHeaderPageMut::new(&mut data[..]);
            view.set_page_id(new_header_page_id);
            view.set_size(new_num_blocks);
            while view.num_blocks() < new_num_blocks {
                let block = Self::new_page_with_retry(&self.buffer_pool_manager);
                view.add_block_page_id(block.page_id());
            }
            new_header.mark_dirty();
        }
        debug!(
            "hash table {}: resize to {new_num_blocks} blocks, header page {old_header_page_id} -> {new_header_page_id}",
            self.name
        );

        // Move every live pair into the new table, then tear the old one
        // down block by block.
        {
            let old_header_guard = self.fetch_page_with_retry(old_header_page_id);
            let old_header_data = old_header_guard.page().rlatch();
            let old_header = HashTableHeaderPage::new(&old_header_data[..]);
            for block_ind in 0..old_header.num_blocks() {
                let old_block_page_id = old_header.block_page_id(block_ind);
                {
                    let block_guard = self.fetch_page_with_retry(old_block_page_id);
                    let block_data = block_guard.page().rlatch();
                    let block = HashTableBlockPage::<K, V>::new(&block_data[..]);
                    for offset in 0..block_slots {
                        if !block.is_readable(offset) {
                            continue;
                        }
                        let key = block.key_at(offset);
                        let value = block.value_at(offset);
                        if let InsertOutcome::Full = self.insert_internal(&key, &value) {
                            unreachable!("resized table cannot fill during rehash");
                        }
                    }
                }
                if !self.buffer_pool_manager.delete_page(old_block_page_id) {
                    warn!("block page {old_block_page_id} still pinned after rehash");
                }
            }
        }
        if !self.buffer_pool_manager.delete_page(old_header_page_id) {
            warn!("header page {old_header_page_id} still pinned after rehash");
        }
    }

    /// Number of addressable slots (the probe-space cardinality), not the
    /// live entry count.
    pub fn get_size(&self) -> usize {
        let _table = self.table_latch.read();
        let header_guard = self.fetch_page_with_retry(self.header_page_id());
        let header_data = header_guard.page().rlatch();
        let header = HashTableHeaderPage::new(&header_data[..]);
        header.num_blocks() * block_array_size::<K, V>()
    }

    /// One pass over the key's probe cycle, claiming the first slot without
    /// a live entry. Callers hold the table latch (shared for inserts,
    /// exclusive during resize).
    fn insert_internal(&self, key: &K, value: &V) -> InsertOutcome {
        let header_guard = self.fetch_page_with_retry(self.header_page_id());
        let header_data = header_guard.page().rlatch();
        let header = HashTableHeaderPage::new(&header_data[..]);

        let block_slots = block_array_size::<K, V>();
        let num_blocks = header.num_blocks();
        debug_assert!(num_blocks > 0);
        let start = self.hash_fn.get_hash(key) as usize % (num_blocks * block_slots);
        let mut probe = Probe::new(start, num_blocks, block_slots);

        loop {
            let block_ind = probe.block();
            let block_guard = self.fetch_page_with_retry(header.block_page_id(block_ind));
            let mut block_data = block_guard.page().wlatch();
            let mut block = HashTableBlockPageMut::<K, V>::new(&mut block_data[..]);
            loop {
                let offset = probe.offset();
                if block.insert(offset, key, value) {
                    block_guard.mark_dirty();
                    return InsertOutcome::Inserted;
                }
                // The slot holds a live entry; an identical pair is a
                // duplicate, anything else lengthens the probe.
                {
                    let view = block.as_ref();
                    if self.comparator.compare(&view.key_at(offset), key) == Ordering::Equal
                        && view.value_at(offset) == *value
                    {
                        return InsertOutcome::Duplicate;
                    }
                }
                if !probe.advance() {
                    return InsertOutcome::Full;
                }
                if probe.block() != block_ind {
                    break;
                }
            }
        }
    }

    /// Allocates a page, retrying while the pool is transiently exhausted.
    fn new_page_with_retry(bpm: &BufferPoolManager) -> PageGuard<'_> {
        for attempt in 0..PAGE_ALLOC_RETRIES {
            if let Some(guard) = bpm.new_page_guarded() {
                return guard;
            }
            if attempt == 0 {
                warn!("buffer pool exhausted while allocating an index page; retrying");
            }
            thread::yield_now();
        }
        panic!("buffer pool cannot host hash table metadata: no frame became available after {PAGE_ALLOC_RETRIES} attempts");
    }

    /// Fetches a page the table owns, retrying while the pool is transiently
    /// exhausted.
    fn fetch_page_with_retry(&self, page_id: PageId) -> PageGuard<'_> {
        for attempt in 0..PAGE_ALLOC_RETRIES {
            if let Some(guard) = self.buffer_pool_manager.fetch_page_guarded(page_id) {
                return guard;
            }
            if attempt == 0 {
                warn!("buffer pool exhausted while fetching page {page_id}; retrying");
            }
            thread::yield_now();
        }
        panic!("buffer pool cannot serve hash table page {page_id}: no frame became available after {PAGE_ALLOC_RETRIES} attempts");
    }
}
