use std::cmp::Ordering;

pub mod generic_key;
pub mod int_comparator;

/// Ordering oracle for index keys. Index structures compare keys only
/// through this trait, so key families with non-derivable orderings (packed
/// column prefixes, collations) plug in without touching the structures.
pub trait KeyComparator<K>: Send + Sync {
    fn compare(&self, lhs: &K, rhs: &K) -> Ordering;
}
