//! The async façade over [`GraphData`], grounded on `sk-store::manager`'s
//! "plain struct behind `Arc<Mutex<_>>`, async methods on top" shape. Writes
//! take the store's write lock directly; reads that are worth memoizing go
//! through [`QueryCache`] via [`GraphClient::execute_query`], the embedded
//! stand-in for spec.md §4.2's `ExecuteQuery(ctx, {query, parameters,
//! timeoutMs})` — there being no Cypher driver crate anywhere in the
//! retrieved pack, `query_text` here is a descriptive label used only to
//! build the cache key and for tracing, not a statement that gets parsed.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use metrics::histogram;
use serde::de::DeserializeOwned;
use spectre_types::{ChangeEventNode, Edge, EdgeKind, K8sEventNode, ResourceIdentityNode};
use tokio::sync::RwLock;

use crate::cache::{cache_key, is_write_query, CacheStats, QueryCache};
use crate::config::GraphConfig;
use crate::errors::{GraphError, GraphResult};
use crate::store::GraphData;

pub struct GraphClient {
    data: RwLock<GraphData>,
    cache: QueryCache,
    config: GraphConfig,
}

impl GraphClient {
    pub fn new(config: GraphConfig) -> Self {
        crate::schema::initialize();
        GraphClient { data: RwLock::new(GraphData::new()), cache: QueryCache::new(config.cache_max_memory_bytes, config.cache_ttl()), config }
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.stats().await
    }

    // ---- upsert contracts (always bypass the cache, like any write query) ----

    pub async fn upsert_resource_identity(&self, r: ResourceIdentityNode) {
        self.data.write().await.upsert_resource_identity(r);
    }

    pub async fn create_change_event(&self, resource_uid: &str, e: ChangeEventNode) -> bool {
        self.data.write().await.create_change_event(resource_uid, e)
    }

    pub async fn create_changed_edge(&self, resource_uid: &str, event_id: &str, sequence: u64) -> bool {
        self.data.write().await.create_changed_edge(resource_uid, event_id, sequence)
    }

    pub async fn create_owns_edge(&self, owner_uid: &str, owned_uid: &str, controller: bool, block_owner_deletion: bool, observed_at: i64) -> bool {
        self.data.write().await.create_owns_edge(owner_uid, owned_uid, controller, block_owner_deletion, observed_at)
    }

    pub async fn record_k8s_event(&self, resource_uid: &str, e: K8sEventNode) {
        self.data.write().await.record_k8s_event(resource_uid, e);
    }

    pub async fn upsert_edge(&self, edge: Edge) -> bool {
        self.data.write().await.upsert_edge(edge)
    }

    /// Runs `compute` under a read lock, with `timeoutMs` enforced and the
    /// result memoized unless `query_text` looks like a write statement.
    pub async fn execute_query<T, F>(&self, query_text: &str, params: &serde_json::Value, compute: F) -> GraphResult<T>
    where
        F: FnOnce(&GraphData) -> serde_json::Value + Send,
        T: DeserializeOwned,
    {
        let cacheable = !is_write_query(query_text);
        let key = cache_key(query_text, params);

        if cacheable {
            if let Some(cached) = self.cache.get(&key).await {
                return Ok(serde_json::from_value(cached)?);
            }
        }

        let started = std::time::Instant::now();
        let value = tokio::time::timeout(self.config.query_timeout(), async move {
            let guard = self.data.read().await;
            compute(&guard)
        })
            .await
            .map_err(|_| GraphError::Timeout(self.config.query_timeout()))?;
        histogram!("spectre_graph_query_duration_ms").record(started.elapsed().as_secs_f64() * 1000.0);

        if cacheable {
            self.cache.insert(key, value.clone()).await;
        }
        Ok(serde_json::from_value(value)?)
    }

    // ---- read-only traversal, used directly by the query engine and
    // extractor pipeline without going through execute_query's JSON round
    // trip (these are hot, structural, and not worth serializing). ----

    pub async fn resource(&self, uid: &str) -> Option<ResourceIdentityNode> {
        self.data.read().await.resource(uid).cloned()
    }

    pub async fn change_event(&self, id: &str) -> Option<ChangeEventNode> {
        self.data.read().await.change_event(id).cloned()
    }

    pub async fn resource_for_event(&self, event_id: &str) -> Option<String> {
        self.data.read().await.resource_for_event(event_id).map(str::to_string)
    }

    pub async fn resources_matching(&self, namespace: Option<&str>, kind: Option<&str>, api_group: Option<&str>) -> Vec<ResourceIdentityNode> {
        self.data.read().await.resources_matching(namespace, kind, api_group).into_iter().cloned().collect()
    }

    pub async fn events_in_range(&self, uid: &str, start: i64, end: i64) -> Vec<ChangeEventNode> {
        self.data.read().await.events_in_range(uid, start, end).into_iter().cloned().collect()
    }

    pub async fn event_before(&self, uid: &str, ts: i64) -> Option<ChangeEventNode> {
        self.data.read().await.event_before(uid, ts).cloned()
    }

    pub async fn k8s_events_for(&self, uid: &str) -> Vec<K8sEventNode> {
        self.data.read().await.k8s_events_for(uid).into_iter().cloned().collect()
    }

    pub async fn outgoing(&self, uid: &str, kind: Option<EdgeKind>) -> Vec<Edge> {
        self.data.read().await.outgoing(uid, kind).cloned().collect()
    }

    pub async fn incoming(&self, uid: &str, kind: Option<EdgeKind>) -> Vec<Edge> {
        self.data.read().await.incoming(uid, kind).cloned().collect()
    }

    pub async fn has_incoming_kind(&self, uid: &str, kind: EdgeKind) -> bool {
        self.data.read().await.has_incoming_kind(uid, kind)
    }

    pub async fn walk_owns_up(&self, uid: &str, max_hops: u32) -> Vec<String> {
        self.data.read().await.walk_owns_up(uid, max_hops)
    }

    pub async fn walk_forward(&self, uid: &str, kinds: &[EdgeKind], max_hops: u32) -> Vec<(String, EdgeKind, u32)> {
        self.data.read().await.walk_forward(uid, kinds, max_hops)
    }
}

/// The narrow read surface the extractor pipeline needs while scoring
/// candidate relationships for one event (spec.md §4.3: `ExtractRelationships(ctx,
/// event, lookup)`). Kept as a trait, not a direct `&GraphClient` parameter,
/// so extractor tests can supply an in-memory fake without a full client.
#[async_trait]
pub trait GraphLookup: Send + Sync {
    async fn find_by_coordinates(&self, namespace: Option<&str>, kind: &str, name: &str) -> Option<ResourceIdentityNode>;
    async fn resources_by_namespace_kind(&self, namespace: &str, kind: &str) -> Vec<ResourceIdentityNode>;
    async fn resources_by_namespace(&self, namespace: &str) -> Vec<ResourceIdentityNode>;
    async fn has_incoming_owns(&self, uid: &str) -> bool;
    async fn reconcile_event_near(&self, controller_uid: &str, around_ts: i64, window_ms: i64) -> Option<ChangeEventNode>;
}

#[async_trait]
impl GraphLookup for GraphClient {
    async fn find_by_coordinates(&self, namespace: Option<&str>, kind: &str, name: &str) -> Option<ResourceIdentityNode> {
        self.data.read().await.find_by_coordinates(namespace, kind, name).cloned()
    }

    async fn resources_by_namespace_kind(&self, namespace: &str, kind: &str) -> Vec<ResourceIdentityNode> {
        self.data.read().await.resources_by_namespace_kind(namespace, kind).into_iter().cloned().collect()
    }

    async fn resources_by_namespace(&self, namespace: &str) -> Vec<ResourceIdentityNode> {
        self.data.read().await.resources_matching(Some(namespace), None, None).into_iter().cloned().collect()
    }

    async fn has_incoming_owns(&self, uid: &str) -> bool {
        self.data.read().await.has_incoming_kind(uid, EdgeKind::Owns)
    }

    async fn reconcile_event_near(&self, controller_uid: &str, around_ts: i64, window_ms: i64) -> Option<ChangeEventNode> {
        let window_ns = window_ms * spectre_core::time::NANOS_PER_SEC / 1000;
        self.data
            .read()
            .await
            .events_in_range(controller_uid, around_ts - window_ns, around_ts + window_ns)
            .into_iter()
            .min_by_key(|e| (e.timestamp - around_ts).abs())
            .cloned()
    }
}

pub type SharedGraphClient = Arc<GraphClient>;

pub fn shared(config: GraphConfig) -> SharedGraphClient {
    Arc::new(GraphClient::new(config))
}
