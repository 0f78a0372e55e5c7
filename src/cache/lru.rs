//! LRU Policy Module
//!
//! Chooses eviction victims from the live entry set by last access time.

use std::cmp::Ordering;

use crate::store::StorageEntry;

/// Share of entries removed per eviction round.
pub const EVICTION_FRACTION: usize = 10;

// == Eviction Count ==
/// Number of entries one eviction round removes from `len` entries:
/// 10% rounded up, at least one.
pub fn eviction_count(len: usize) -> usize {
    len.div_ceil(EVICTION_FRACTION).max(1)
}

// == LRU Order ==
/// Orders entries from first to last evicted: oldest `last_access_at`, then
/// fewest accesses, then earliest creation, then key.
pub fn lru_order<T>(a: (&str, &StorageEntry<T>), b: (&str, &StorageEntry<T>)) -> Ordering {
    let (a_key, a) = a;
    let (b_key, b) = b;
    a.last_access_at
        .cmp(&b.last_access_at)
        .then(a.access_count.cmp(&b.access_count))
        .then(a.created_at.cmp(&b.created_at))
        .then_with(|| a_key.cmp(b_key))
}

// == Select Victims ==
/// Keys of the `count` least recently used entries, in eviction order.
pub fn select_victims<T>(entries: &[(String, StorageEntry<T>)], count: usize) -> Vec<String> {
    let mut ranked: Vec<&(String, StorageEntry<T>)> = entries.iter().collect();
    ranked.sort_by(|(a_key, a), (b_key, b)| lru_order((a_key.as_str(), a), (b_key.as_str(), b)));
    ranked
        .into_iter()
        .take(count)
        .map(|(key, _)| key.clone())
        .collect()
}
