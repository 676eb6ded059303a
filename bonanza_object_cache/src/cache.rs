use std::collections::HashMap;
use std::collections::VecDeque;

use bonanza_reference::DecodingParameters;
use bonanza_reference::Reference;

/// A typed view the cache can weigh and evict by size (spec §4.4:
/// "bounded-size eviction policy (LRU over decoded size)").
pub trait CachedView: Clone + Send + Sync + 'static {
    fn size_bytes(&self) -> usize;
}

type CacheKey = (Reference, DecodingParameters);

/// Caches parsed typed views keyed by `(reference, decoding_params)`
/// under a total-decoded-size budget, evicting least-recently-used
/// entries first (spec §4.4). Entries are weak in the sense the spec
/// requires: callers must tolerate a miss and re-parse on demand, this
/// cache only ever trades correctness for speed.
pub struct ParsedObjectCache<T: CachedView> {
    max_size_bytes: usize,
    total_size_bytes: usize,
    entries: HashMap<CacheKey, T>,
    // Most-recently-used key at the back. Touching a key re-scans this
    // deque to move it to the back; O(n) per touch, which is fine at
    // this cache's expected working-set size and keeps the structure
    // simple -- callers are already required to tolerate re-parsing on
    // a miss, so an approximate recency order would be just as valid.
    recency: VecDeque<CacheKey>,
}

impl<T: CachedView> ParsedObjectCache<T> {
    pub fn new(max_size_bytes: usize) -> Self {
        ParsedObjectCache {
            max_size_bytes,
            total_size_bytes: 0,
            entries: HashMap::new(),
            recency: VecDeque::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_size_bytes(&self) -> usize {
        self.total_size_bytes
    }

    pub fn get(&mut self, reference: &Reference, decoding_params: &DecodingParameters) -> Option<T> {
        let key = (reference.clone(), decoding_params.clone());
        let value = self.entries.get(&key)?.clone();
        self.touch(&key);
        Some(value)
    }

    pub fn insert(&mut self, reference: Reference, decoding_params: DecodingParameters, value: T) {
        let key = (reference, decoding_params);
        if let Some(old) = self.entries.remove(&key) {
            self.total_size_bytes -= old.size_bytes();
            self.recency.retain(|k| k != &key);
        }
        self.total_size_bytes += value.size_bytes();
        self.entries.insert(key.clone(), value);
        self.recency.push_back(key);
        self.evict_to_budget();
    }

    fn touch(&mut self, key: &CacheKey) {
        if let Some(pos) = self.recency.iter().position(|k| k == key) {
            self.recency.remove(pos);
        }
        self.recency.push_back(key.clone());
    }

    fn evict_to_budget(&mut self) {
        while self.total_size_bytes > self.max_size_bytes {
            let Some(key) = self.recency.pop_front() else { break };
            if let Some(value) = self.entries.remove(&key) {
                self.total_size_bytes -= value.size_bytes();
            }
        }
    }
}
