//! Block page for the linear probing hash table.
//!
//! A block page stores a flat array of fixed-width (key, value) slots with
//! two bitmaps tracking slot state:
//!
//! | Occupied | Readable | Meaning                                 |
//! |----------|----------|-----------------------------------------|
//! |    0     |    0     | Empty (never used), probes stop here    |
//! |    1     |    1     | Valid entry                             |
//! |    1     |    0     | Tombstone, probes continue past it      |
//!
//! Block format, for `N = block_array_size::<K, V>()` (sizes in bytes):
//!
//! ```text
//! ----------------------------------------------------------------------
//! | Occupied (⌈N/8⌉) | Readable (⌈N/8⌉) | Keys (N × K::WIDTH) | Values (N × V::WIDTH)
//! ----------------------------------------------------------------------
//! ```
//!
//! The caller holds the page latch for the lifetime of a view; slot state is
//! plain bytes, not atomics, because the latch is the synchronization.

use std::marker::PhantomData;

use crate::common::config::DB_PAGE_SIZE;
use crate::storage::page::page_types::hash_table_page_defs::{block_array_size, FixedWidth};

/// Read-only view of a block page image.
pub struct HashTableBlockPage<'a, K, V> {
    data: &'a [u8],
    _marker: PhantomData<(K, V)>,
}

impl<'a, K, V> HashTableBlockPage<'a, K, V>
where
    K: FixedWidth,
    V: FixedWidth,
{
    pub fn new(data: &'a [u8]) -> Self {
        debug_assert_eq!(data.len(), DB_PAGE_SIZE);
        debug_assert!(
            2 * bitmap_bytes::<K, V>() + block_array_size::<K, V>() * (K::WIDTH + V::WIDTH)
                <= DB_PAGE_SIZE
        );
        Self {
            data,
            _marker: PhantomData,
        }
    }

    /// True if the slot has ever held an entry (live or tombstoned).
    pub fn is_occupied(&self, block_ind: usize) -> bool {
        self.data[block_ind / 8] & (1 << (block_ind % 8)) != 0
    }

    /// True if the slot currently holds a live entry.
    pub fn is_readable(&self, block_ind: usize) -> bool {
        self.data[bitmap_bytes::<K, V>() + block_ind / 8] & (1 << (block_ind % 8)) != 0
    }

    pub fn key_at(&self, block_ind: usize) -> K {
        let offset = key_offset::<K, V>(block_ind);
        K::decode(&self.data[offset..offset + K::WIDTH])
    }

    pub fn value_at(&self, block_ind: usize) -> V {
        let offset = value_offset::<K, V>(block_ind);
        V::decode(&self.data[offset..offset + V::WIDTH])
    }
}

/// Mutable view of a block page image, held under the page's write latch.
pub struct HashTableBlockPageMut<'a, K, V> {
    data: &'a mut [u8],
    _marker: PhantomData<(K, V)>,
}

impl<'a, K, V> HashTableBlockPageMut<'a, K, V>
where
    K: FixedWidth,
    V: FixedWidth,
{
    pub fn new(data: &'a mut [u8]) -> Self {
        debug_assert_eq!(data.len(), DB_PAGE_SIZE);
        Self {
            data,
            _marker: PhantomData,
        }
    }

    pub fn as_ref(&self) -> HashTableBlockPage<'_, K, V> {
        HashTableBlockPage {
            data: &*self.data,
            _marker: PhantomData,
        }
    }

    /// Claims the slot for `(key, value)` iff it does not hold a live entry.
    /// Tombstoned slots are reclaimed; the occupied bit stays set for the
    /// rest of the block's lifetime so probe chains keep their continuity.
    pub fn insert(&mut self, block_ind: usize, key: &K, value: &V) -> bool {
        if self.as_ref().is_readable(block_ind) {
            return false;
        }
        let ko = key_offset::<K, V>(block_ind);
        key.encode(&mut self.data[ko..ko + K::WIDTH]);
        let vo = value_offset::<K, V>(block_ind);
        value.encode(&mut self.data[vo..vo + V::WIDTH]);
        self.data[block_ind / 8] |= 1 << (block_ind % 8);
        self.data[bitmap_bytes::<K, V>() + block_ind / 8] |= 1 << (block_ind % 8);
        true
    }

    /// Tombstones the slot: clears readable, leaves occupied set.
    pub fn remove(&mut self, block_ind: usize) {
        self.data[bitmap_bytes::<K, V>() + block_ind / 8] &= !(1 << (block_ind % 8));
    }
}

fn bitmap_bytes<K: FixedWidth, V: FixedWidth>() -> usize {
    block_array_size::<K, V>().div_ceil(8)
}

fn key_offset<K: FixedWidth, V: FixedWidth>(block_ind: usize) -> usize {
    debug_assert!(block_ind < block_array_size::<K, V>());
    2 * bitmap_bytes::<K, V>() + block_ind * K::WIDTH
}

fn value_offset<K: FixedWidth, V: FixedWidth>(block_ind: usize) -> usize {
    debug_assert!(block_ind < block_array_size::<K, V>());
    2 * bitmap_bytes::<K, V>() + block_array_size::<K, V>() * K::WIDTH + block_ind * V::WIDTH
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_claims_a_slot_once() {
        let mut image = [0u8; DB_PAGE_SIZE];
        let mut block = HashTableBlockPageMut::<i32, i32>::new(&mut image);
        assert!(block.insert(5, &3, &30));
        assert!(!block.insert(5, &4, &40));

        let view = HashTableBlockPage::<i32, i32>::new(&image);
        assert!(view.is_occupied(5));
        assert!(view.is_readable(5));
        assert_eq!(view.key_at(5), 3);
        assert_eq!(view.value_at(5), 30);
        assert!(!view.is_occupied(4));
    }

    #[test]
    fn remove_leaves_a_tombstone_and_insert_reclaims_it() {
        let mut image = [0u8; DB_PAGE_SIZE];
        let mut block = HashTableBlockPageMut::<i32, i32>::new(&mut image);
        assert!(block.insert(0, &1, &10));
        block.remove(0);
        {
            let view = block.as_ref();
            assert!(view.is_occupied(0));
            assert!(!view.is_readable(0));
        }
        assert!(block.insert(0, &2, &20));
        let view = HashTableBlockPage::<i32, i32>::new(&image);
        assert!(view.is_readable(0));
        assert_eq!(view.key_at(0), 2);
        assert_eq!(view.value_at(0), 20);
    }

    #[test]
    fn slots_in_the_last_bitmap_byte_are_addressable() {
        let last = block_array_size::<i64, i64>() - 1;
        let mut image = [0u8; DB_PAGE_SIZE];
        let mut block = HashTableBlockPageMut::<i64, i64>::new(&mut image);
        assert!(block.insert(last, &-1, &i64::MAX));
        let view = HashTableBlockPage::<i64, i64>::new(&image);
        assert_eq!(view.key_at(last), -1);
        assert_eq!(view.value_at(last), i64::MAX);
    }
}
