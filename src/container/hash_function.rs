use std::marker::PhantomData;

use xxhash_rust::xxh3;

use crate::storage::page::page_types::hash_table_page_defs::FixedWidth;

/// Widest key encoding any hash function instantiation has to handle.
pub const MAX_KEY_WIDTH: usize = 64;

/// Hash oracle for index keys. Production code uses [`HashFunction`]; tests
/// substitute deterministic hashers to pin down probe placement.
pub trait KeyHasher<K>: Send + Sync {
    /// Returns the hash value of the given key.
    fn get_hash(&self, key: &K) -> u64;
}

/// xxh3 over the key's fixed-width encoding, so the hash always agrees with
/// the bytes the key occupies on a block page.
pub struct HashFunction<K> {
    _marker: PhantomData<K>,
}

impl<K> Default for HashFunction<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> HashFunction<K> {
    /// Creates a new `HashFunction`.
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<K> KeyHasher<K> for HashFunction<K>
where
    K: FixedWidth + Send + Sync,
{
    fn get_hash(&self, key: &K) -> u64 {
        assert!(K::WIDTH <= MAX_KEY_WIDTH);
        let mut buf = [0u8; MAX_KEY_WIDTH];
        key.encode(&mut buf[..K::WIDTH]);
        xxh3::xxh3_64(&buf[..K::WIDTH])
    }
}
