use std::time::Duration;

use serde::{Deserialize, Serialize};

fn default_cache_max_memory_bytes() -> usize {
    64 * 1024 * 1024
}

fn default_cache_ttl_secs() -> u64 {
    300
}

fn default_query_timeout_ms() -> u64 {
    5_000
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct GraphConfig {
    #[serde(default = "default_cache_max_memory_bytes")]
    pub cache_max_memory_bytes: usize,

    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    #[serde(default = "default_query_timeout_ms")]
    pub query_timeout_ms: u64,
}

impl GraphConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }
}

impl Default for GraphConfig {
    fn default() -> Self {
        GraphConfig {
            cache_max_memory_bytes: default_cache_max_memory_bytes(),
            cache_ttl_secs: default_cache_ttl_secs(),
            query_timeout_ms: default_query_timeout_ms(),
        }
    }
}
