//! Bounded classification cache with O(1) oldest-first eviction: push new,
//! pop front once at capacity.

use std::collections::{HashMap, VecDeque};

use base64::Engine;
use sha2::{Digest, Sha256};

use crate::ClassificationEntry;

/// Cache key: `(functionName, description, inputSchemaHash)`.
pub fn cache_key(name: &str, description: Option<&str>, input_schema: Option<&serde_json::Value>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(name.as_bytes());
    hasher.update([0]);
    hasher.update(description.unwrap_or("").as_bytes());
    hasher.update([0]);
    if let Some(schema) = input_schema {
        hasher.update(schema.to_string().as_bytes());
    }
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(hasher.finalize())
}

pub struct ClassificationCache {
    capacity: usize,
    order: VecDeque<String>,
    entries: HashMap<String, ClassificationEntry>,
}

impl ClassificationCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            order: VecDeque::new(),
            entries: HashMap::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<ClassificationEntry> {
        self.entries.get(key).cloned()
    }

    pub fn insert(&mut self, key: String, entry: ClassificationEntry) {
        if self.entries.contains_key(&key) {
            self.entries.insert(key, entry);
            return;
        }
        if self.entries.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
        self.order.push_back(key.clone());
        self.entries.insert(key, entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FunctionTier;

    fn entry(provider: &str) -> ClassificationEntry {
        ClassificationEntry {
            kind: FunctionTier::Code,
            confidence: 0.9,
            reasoning: "test".into(),
            provider: provider.into(),
            latency_ms: 1,
        }
    }

    #[test]
    fn evicts_oldest_first_at_capacity() {
        let mut cache = ClassificationCache::new(2);
        cache.insert("a".into(), entry("p1"));
        cache.insert("b".into(), entry("p1"));
        cache.insert("c".into(), entry("p1"));
        assert_eq!(cache.len(), 2);
        assert!(cache.get("a").is_none());
        assert!(cache.get("b").is_some());
        assert!(cache.get("c").is_some());
    }

    #[test]
    fn identical_keys_yield_identical_entries() {
        let key1 = cache_key("fn", Some("desc"), None);
        let key2 = cache_key("fn", Some("desc"), None);
        assert_eq!(key1, key2);
    }

    #[test]
    fn differing_input_schema_yields_distinct_keys() {
        let key1 = cache_key("fn", Some("desc"), Some(&serde_json::json!({"a": 1})));
        let key2 = cache_key("fn", Some("desc"), Some(&serde_json::json!({"a": 2})));
        assert_ne!(key1, key2);
    }

    #[test]
    fn reinsertion_of_existing_key_does_not_evict() {
        let mut cache = ClassificationCache::new(2);
        cache.insert("a".into(), entry("p1"));
        cache.insert("b".into(), entry("p1"));
        cache.insert("a".into(), entry("p2"));
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("a").unwrap().provider, "p2");
        assert!(cache.get("b").is_some());
    }
}
