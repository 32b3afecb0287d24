//! Chained hash map keyed by owned uppercase strings, queryable by borrowed
//! slices.
//!
//! Every lookup on the redirect fast path goes through this container, so
//! the contract is strict: `get` never allocates, the hash is deterministic
//! across runs, and owned and borrowed keys hash identically because the
//! hash is defined once over the borrowed form.

/// Minimum bucket count; requested capacities are rounded up to a power of
/// two so the bucket index is `hash & mask`.
const MIN_BUCKETS: usize = 8;

/// FNV-1a mix folding the key in 4-byte blocks, trailing bytes one at a
/// time. Non-randomized: equal keys hash equally in every process.
#[inline]
pub fn span_hash(key: &str) -> u32 {
    const OFFSET_BASIS: u32 = 0x811c_9dc5;
    const PRIME: u32 = 0x0100_0193;

    let bytes = key.as_bytes();
    let mut hash = OFFSET_BASIS;
    let mut blocks = bytes.chunks_exact(4);
    for block in &mut blocks {
        let word = u32::from_le_bytes([block[0], block[1], block[2], block[3]]);
        hash = (hash ^ word).wrapping_mul(PRIME);
    }
    for &b in blocks.remainder() {
        hash = (hash ^ u32::from(b)).wrapping_mul(PRIME);
    }
    hash
}

#[derive(Debug, Clone)]
struct Entry<V> {
    /// 1-based index of the next entry in the same bucket chain, 0 = end.
    next_item: u32,
    hash_code: u32,
    key: Box<str>,
    value: V,
}

/// Insertion-ordered, append-only hash map. No removal: callers that need
/// to drop entries rebuild the whole structure instead.
#[derive(Debug, Clone)]
pub struct SpanDict<V> {
    /// 1-based indices into `entries`, 0 = empty bucket. Entries never
    /// move, so buckets stay valid when `entries` grows.
    buckets: Box<[u32]>,
    entries: Vec<Entry<V>>,
    mask: u32,
}

impl<V> SpanDict<V> {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let bucket_count = capacity.max(MIN_BUCKETS).next_power_of_two();
        Self {
            buckets: vec![0u32; bucket_count].into_boxed_slice(),
            entries: Vec::with_capacity(capacity),
            mask: (bucket_count - 1) as u32,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert or overwrite. Amortized O(1); the entry array doubles via
    /// `Vec` growth and buckets are never rehashed.
    pub fn insert(&mut self, key: impl Into<Box<str>>, value: V) {
        let key = key.into();
        let hash = span_hash(&key);
        let bucket = (hash & self.mask) as usize;

        let mut idx = self.buckets[bucket];
        while idx != 0 {
            let entry = &mut self.entries[(idx - 1) as usize];
            if entry.hash_code == hash && entry.key == key {
                entry.value = value;
                return;
            }
            idx = entry.next_item;
        }

        self.entries.push(Entry {
            next_item: self.buckets[bucket],
            hash_code: hash,
            key,
            value,
        });
        self.buckets[bucket] = self.entries.len() as u32;
    }

    /// Borrowed-slice lookup. Never allocates; symmetric with `insert`
    /// because both sides hash the same slice form.
    pub fn get(&self, key: &str) -> Option<&V> {
        if self.entries.is_empty() {
            return None;
        }
        let hash = span_hash(key);
        let mut idx = self.buckets[(hash & self.mask) as usize];
        while idx != 0 {
            let entry = &self.entries[(idx - 1) as usize];
            if entry.hash_code == hash && &*entry.key == key {
                return Some(&entry.value);
            }
            idx = entry.next_item;
        }
        None
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut V> {
        if self.entries.is_empty() {
            return None;
        }
        let hash = span_hash(key);
        let mut idx = self.buckets[(hash & self.mask) as usize];
        while idx != 0 {
            let pos = (idx - 1) as usize;
            if self.entries[pos].hash_code == hash && &*self.entries[pos].key == key {
                return Some(&mut self.entries[pos].value);
            }
            idx = self.entries[pos].next_item;
        }
        None
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Mutable reference to the value for `key`, inserting `default()`
    /// first when absent.
    pub fn get_or_insert_with(&mut self, key: &str, default: impl FnOnce() -> V) -> &mut V {
        let hash = span_hash(key);
        let bucket = (hash & self.mask) as usize;

        let mut idx = self.buckets[bucket];
        let mut found = None;
        while idx != 0 {
            let pos = (idx - 1) as usize;
            if self.entries[pos].hash_code == hash && &*self.entries[pos].key == key {
                found = Some(pos);
                break;
            }
            idx = self.entries[pos].next_item;
        }

        let pos = match found {
            Some(pos) => pos,
            None => {
                self.entries.push(Entry {
                    next_item: self.buckets[bucket],
                    hash_code: hash,
                    key: Box::from(key),
                    value: default(),
                });
                self.buckets[bucket] = self.entries.len() as u32;
                self.entries.len() - 1
            }
        };
        &mut self.entries[pos].value
    }

    /// An arbitrary entry. Callers use this during prefix discovery after
    /// asserting `len() == 1`.
    pub fn get_first(&self) -> Option<(&str, &V)> {
        self.entries.first().map(|e| (&*e.key, &e.value))
    }

    /// Reset logical size, keep capacity.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.buckets.fill(0);
    }

    /// Live entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.entries.iter().map(|e| (&*e.key, &e.value))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| &*e.key)
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.entries.iter().map(|e| &e.value)
    }
}

impl<V> Default for SpanDict<V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_get() {
        let mut dict = SpanDict::new();
        dict.insert("A.BIN", 1u32);
        dict.insert("B.BIN", 2u32);

        assert_eq!(dict.get("A.BIN"), Some(&1));
        assert_eq!(dict.get("B.BIN"), Some(&2));
        assert_eq!(dict.get("C.BIN"), None);
    }

    #[test]
    fn test_insert_overwrites() {
        let mut dict = SpanDict::new();
        dict.insert("KEY", 1u32);
        dict.insert("KEY", 2u32);

        assert_eq!(dict.len(), 1);
        assert_eq!(dict.get("KEY"), Some(&2));
    }

    #[test]
    fn test_owned_and_borrowed_keys_agree() {
        let mut dict = SpanDict::new();
        let owned = String::from("DATA\\TEXTURES");
        dict.insert(owned.as_str(), 7u32);

        let full = "C:\\GAME\\DATA\\TEXTURES";
        let slice = &full[8..];
        assert_eq!(slice, "DATA\\TEXTURES");
        assert_eq!(dict.get(slice), Some(&7));
    }

    #[test]
    fn test_empty_key_is_valid() {
        let mut dict = SpanDict::new();
        assert_eq!(dict.get(""), None);

        dict.insert("", 42u32);
        assert_eq!(dict.get(""), Some(&42));
    }

    #[test]
    fn test_hash_is_deterministic() {
        assert_eq!(span_hash("C:\\GAME"), span_hash("C:\\GAME"));
        assert_ne!(span_hash("C:\\GAME"), span_hash("C:\\GAMF"));
    }

    #[test]
    fn test_hash_block_boundaries() {
        // 4-byte blocks plus a remainder must all contribute.
        assert_ne!(span_hash("ABCD"), span_hash("ABCE"));
        assert_ne!(span_hash("ABCDE"), span_hash("ABCDF"));
        assert_ne!(span_hash("ABC"), span_hash("ABCD"));
    }

    #[test]
    fn test_insertion_order_iteration() {
        let mut dict = SpanDict::new();
        for (i, key) in ["Z", "A", "M", "B"].iter().enumerate() {
            dict.insert(*key, i);
        }
        let keys: Vec<&str> = dict.keys().collect();
        assert_eq!(keys, vec!["Z", "A", "M", "B"]);
    }

    #[test]
    fn test_growth_past_bucket_count() {
        let mut dict = SpanDict::with_capacity(4);
        for i in 0..1000u32 {
            dict.insert(format!("FILE_{i:04}.BIN"), i);
        }
        assert_eq!(dict.len(), 1000);
        for i in 0..1000u32 {
            assert_eq!(dict.get(&format!("FILE_{i:04}.BIN")), Some(&i));
        }
    }

    #[test]
    fn test_clear_keeps_capacity() {
        let mut dict = SpanDict::with_capacity(16);
        dict.insert("A", 1u32);
        dict.insert("B", 2u32);
        dict.clear();

        assert!(dict.is_empty());
        assert_eq!(dict.get("A"), None);

        dict.insert("A", 3u32);
        assert_eq!(dict.get("A"), Some(&3));
    }

    #[test]
    fn test_get_first_single_entry() {
        let mut dict = SpanDict::new();
        dict.insert("ONLY", 9u32);
        assert_eq!(dict.get_first(), Some(("ONLY", &9)));
    }

    #[test]
    fn test_clone_is_independent() {
        let mut dict = SpanDict::new();
        dict.insert("A", 1u32);
        let mut copy = dict.clone();
        copy.insert("B", 2u32);

        assert_eq!(dict.len(), 1);
        assert_eq!(copy.len(), 2);
    }
}
