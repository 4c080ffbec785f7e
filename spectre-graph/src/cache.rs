//! Bounded, TTL'd query cache (spec.md §4.2 "Query cache"). Grounded on
//! `spectre_core::jsonutils::sha256_hex` for key construction; the bytes-bounded
//! LRU itself has no teacher analogue (SimKube has no query cache), so the
//! eviction strategy follows the spec's prose directly: a simple recency queue
//! plus a running byte total, evicted from the front until the new entry fits.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use metrics::counter;
use tokio::sync::Mutex;

fn estimate_size(v: &serde_json::Value) -> usize {
    serde_json::to_vec(v).map(|b| b.len()).unwrap_or(0)
}

/// Case-insensitive write-statement detector (spec.md §4.2): queries
/// containing CREATE/MERGE/DELETE/DETACH DELETE/SET/REMOVE bypass the cache.
pub fn is_write_query(query_text: &str) -> bool {
    let upper = query_text.to_uppercase();
    ["CREATE", "MERGE", "DELETE", "DETACH DELETE", "SET", "REMOVE"].iter().any(|kw| upper.contains(kw))
}

/// `SHA256(query_text + sorted_params_JSON)`. `serde_json`'s default map
/// serializes object keys in sorted order, so `to_string` already yields the
/// "sorted params JSON" the spec calls for.
pub fn cache_key(query_text: &str, params: &serde_json::Value) -> String {
    let params_json = serde_json::to_string(params).unwrap_or_default();
    spectre_core::jsonutils::sha256_hex(format!("{query_text}{params_json}").as_bytes())
}

struct Entry {
    value: serde_json::Value,
    size_bytes: usize,
    inserted_at: Instant,
    last_used: Instant,
}

#[derive(Clone, Debug, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub expired: u64,
    pub evictions: u64,
    pub items: usize,
    pub used_memory: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

struct Inner {
    entries: HashMap<String, Entry>,
    /// Recency order, oldest-used first. A key may appear once; `get` moves
    /// it to the back.
    order: Vec<String>,
    used_bytes: usize,
    stats: CacheStats,
}

pub struct QueryCache {
    max_memory_bytes: usize,
    ttl: Duration,
    inner: Mutex<Inner>,
}

impl QueryCache {
    pub fn new(max_memory_bytes: usize, ttl: Duration) -> Self {
        QueryCache {
            max_memory_bytes,
            ttl,
            inner: Mutex::new(Inner { entries: HashMap::new(), order: Vec::new(), used_bytes: 0, stats: CacheStats::default() }),
        }
    }

    pub async fn get(&self, key: &str) -> Option<serde_json::Value> {
        let mut inner = self.inner.lock().await;
        let Some(entry) = inner.entries.get(key) else {
            inner.stats.misses += 1;
            counter!("spectre_graph_cache_misses_total").increment(1);
            return None;
        };
        if entry.inserted_at.elapsed() > self.ttl {
            inner.stats.expired += 1;
            inner.stats.misses += 1;
            counter!("spectre_graph_cache_misses_total").increment(1);
            let entry = inner.entries.remove(key).expect("just looked up");
            inner.used_bytes -= entry.size_bytes;
            inner.order.retain(|k| k != key);
            return None;
        }
        inner.stats.hits += 1;
        counter!("spectre_graph_cache_hits_total").increment(1);
        let value = entry.value.clone();
        if let Some(e) = inner.entries.get_mut(key) {
            e.last_used = Instant::now();
        }
        inner.order.retain(|k| k != key);
        inner.order.push(key.to_string());
        Some(value)
    }

    pub async fn insert(&self, key: String, value: serde_json::Value) {
        let size = estimate_size(&value);
        let mut inner = self.inner.lock().await;

        if let Some(old) = inner.entries.remove(&key) {
            inner.used_bytes -= old.size_bytes;
            inner.order.retain(|k| k != &key);
        }

        while inner.used_bytes + size > self.max_memory_bytes && !inner.order.is_empty() {
            let evict_key = inner.order.remove(0);
            if let Some(evicted) = inner.entries.remove(&evict_key) {
                inner.used_bytes -= evicted.size_bytes;
                inner.stats.evictions += 1;
                counter!("spectre_graph_cache_evictions_total").increment(1);
            }
        }

        if size > self.max_memory_bytes {
            // A single entry larger than the whole cache is never stored.
            return;
        }

        let now = Instant::now();
        inner.entries.insert(key.clone(), Entry { value, size_bytes: size, inserted_at: now, last_used: now });
        inner.order.push(key);
        inner.used_bytes += size;
    }

    pub async fn stats(&self) -> CacheStats {
        let inner = self.inner.lock().await;
        CacheStats { items: inner.entries.len(), used_memory: inner.used_bytes, ..inner.stats.clone() }
    }
}

#[cfg(test)]
mod tests {
    use rstest::*;
    use serde_json::json;

    use super::*;

    #[rstest]
    fn test_is_write_query() {
        assert!(is_write_query("MATCH (r) CREATE (e)"));
        assert!(is_write_query("match (r) set r.x = 1"));
        assert!(!is_write_query("MATCH (r:ResourceIdentity) RETURN r"));
    }

    #[rstest]
    fn test_cache_key_stable_across_param_order() {
        let a = json!({"a": 1, "b": 2});
        let b = json!({"b": 2, "a": 1});
        assert_eq!(cache_key("MATCH (r) RETURN r", &a), cache_key("MATCH (r) RETURN r", &b));
    }

    #[rstest(tokio::test)]
    async fn test_get_miss_then_hit() {
        let cache = QueryCache::new(1_000_000, Duration::from_secs(60));
        assert!(cache.get("k").await.is_none());
        cache.insert("k".into(), json!({"x": 1})).await;
        assert_eq!(cache.get("k").await, Some(json!({"x": 1})));
        let stats = cache.stats().await;
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[rstest(tokio::test)]
    async fn test_eviction_when_over_budget() {
        let entry_size = estimate_size(&json!({"x": "aaaaaaaaaa"}));
        let cache = QueryCache::new(entry_size + 5, Duration::from_secs(60));
        cache.insert("a".into(), json!({"x": "aaaaaaaaaa"})).await;
        cache.insert("b".into(), json!({"x": "bbbbbbbbbb"})).await;
        assert!(cache.get("a").await.is_none(), "oldest entry should have been evicted");
        assert!(cache.get("b").await.is_some());
        assert_eq!(cache.stats().await.evictions, 1);
    }
}
