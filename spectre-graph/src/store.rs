//! The property graph itself: nodes, edges, and the indices the query engine
//! walks. Grounded on spec.md §4.2's upsert contracts and §3's node/edge
//! tables; there is no single teacher analogue (SimKube has no graph of its
//! own), so the storage shape follows the same "plain struct behind a lock"
//! pattern `sk-store::store::TraceStore` uses, generalized from a flat event
//! log to nodes + adjacency lists.

use std::collections::{BTreeSet, HashMap, HashSet};

use spectre_types::{ChangeEventNode, Edge, EdgeKind, InferredEdgeKind, K8sEventNode, ResourceIdentityNode, ValidationState};

/// Compares the merge-key portion of two edges: same kind, same endpoints,
/// and (for edge kinds that can legitimately have more than one instance
/// between the same two nodes) the same discriminant.
fn same_identity(a: &Edge, b: &Edge) -> bool {
    if a.kind() != b.kind() || a.source_uid() != b.source_uid() || a.target_uid() != b.target_uid() {
        return false;
    }
    match (a, b) {
        (Edge::Changed { sequence: sa, .. }, Edge::Changed { sequence: sb, .. }) => sa == sb,
        (Edge::ReferencesSpec { field_path: fa, .. }, Edge::ReferencesSpec { field_path: fb, .. }) => fa == fb,
        (
            Edge::Inferred { kind: InferredEdgeKind::Annotates { annotation_key: ka }, .. },
            Edge::Inferred { kind: InferredEdgeKind::Annotates { annotation_key: kb }, .. },
        ) => ka == kb,
        _ => true,
    }
}

#[derive(Default)]
pub struct GraphData {
    resources: HashMap<String, ResourceIdentityNode>,
    by_namespace_kind: HashMap<(String, String), HashSet<String>>,
    change_events: HashMap<String, ChangeEventNode>,
    /// `(timestamp, event_id)` per resource, ordered so "most recent before
    /// X" and "all events in [start, end]" are simple range scans.
    resource_events: HashMap<String, BTreeSet<(i64, String)>>,
    /// Reverse of `resource_events`, so a `ChangeEvent` reached via a
    /// `TRIGGERED_BY` walk can be traced back to the resource it belongs to.
    event_resource: HashMap<String, String>,
    k8s_events: HashMap<String, K8sEventNode>,
    resource_k8s_events: HashMap<String, Vec<String>>,
    edges: Vec<Edge>,
    outgoing: HashMap<String, Vec<usize>>,
    incoming: HashMap<String, Vec<usize>>,
}

impl GraphData {
    pub fn new() -> Self {
        Self::default()
    }

    // ---- upsert contracts (spec.md §4.2) ----

    /// Merge on `uid`. Deletion is monotonic: once `deleted=true` it never
    /// reverts, and a `deleted=false` upsert only refreshes `labels`/`last_seen`
    /// while the node is still live.
    pub fn upsert_resource_identity(&mut self, r: ResourceIdentityNode) {
        match self.resources.get_mut(&r.uid) {
            None => {
                self.by_namespace_kind.entry((r.namespace.clone(), r.kind.clone())).or_default().insert(r.uid.clone());
                self.resources.insert(r.uid.clone(), r);
            },
            Some(existing) => {
                if r.deleted {
                    existing.deleted = true;
                    existing.deleted_at = r.deleted_at;
                } else if !existing.deleted {
                    existing.labels = r.labels;
                    existing.last_seen = r.last_seen;
                }
            },
        }
    }

    /// Creates a minimal placeholder identity if `uid` isn't known yet, so
    /// `CreateOwnsEdge` can link an owner/owned pair regardless of ingestion
    /// order. Returns `true` if a shell was created.
    pub fn ensure_shell(&mut self, uid: &str, observed_at: i64) -> bool {
        if self.resources.contains_key(uid) {
            return false;
        }
        self.upsert_resource_identity(ResourceIdentityNode {
            uid: uid.to_string(),
            kind: String::new(),
            api_group: String::new(),
            version: String::new(),
            namespace: String::new(),
            name: String::new(),
            labels: HashMap::new(),
            first_seen: observed_at,
            last_seen: observed_at,
            deleted: false,
            deleted_at: None,
        });
        true
    }

    /// Merge on `id`; events are immutable so a second write for the same id
    /// is a no-op. Returns `true` if this call actually created the event.
    pub fn create_change_event(&mut self, resource_uid: &str, e: ChangeEventNode) -> bool {
        if self.change_events.contains_key(&e.id) {
            return false;
        }
        self.resource_events.entry(resource_uid.to_string()).or_default().insert((e.timestamp, e.id.clone()));
        self.event_resource.insert(e.id.clone(), resource_uid.to_string());
        self.change_events.insert(e.id.clone(), e);
        true
    }

    pub fn create_changed_edge(&mut self, resource_uid: &str, event_id: &str, sequence: u64) -> bool {
        self.upsert_edge(Edge::Changed { source: resource_uid.to_string(), target: event_id.to_string(), sequence })
    }

    pub fn create_owns_edge(&mut self, owner_uid: &str, owned_uid: &str, controller: bool, block_owner_deletion: bool, observed_at: i64) -> bool {
        self.ensure_shell(owner_uid, observed_at);
        self.ensure_shell(owned_uid, observed_at);
        self.upsert_edge(Edge::Owns { source: owner_uid.to_string(), target: owned_uid.to_string(), controller, block_owner_deletion })
    }

    pub fn record_k8s_event(&mut self, resource_uid: &str, e: K8sEventNode) {
        self.resource_k8s_events.entry(resource_uid.to_string()).or_default().push(e.id.clone());
        self.k8s_events.insert(e.id.clone(), e);
    }

    /// Generic edge upsert used both by the typed contracts above and by the
    /// extractor pipeline's reconciliation rule: explicit edges overwrite
    /// unconditionally, inferred edges only when the new confidence is `>=`
    /// the stored one or the stored edge is `Stale`. Returns `true` if the
    /// edge was created or updated.
    pub fn upsert_edge(&mut self, new: Edge) -> bool {
        let source = new.source_uid().to_string();
        if let Some(indices) = self.outgoing.get(&source) {
            if let Some(&idx) = indices.iter().find(|&&i| same_identity(&self.edges[i], &new)) {
                let existing = &self.edges[idx];
                if new.is_inferred() {
                    let stale = matches!(existing, Edge::Inferred { validation_state: ValidationState::Stale, .. });
                    if new.confidence() < existing.confidence() && !stale {
                        return false;
                    }
                }
                self.edges[idx] = new;
                return true;
            }
        }
        let idx = self.edges.len();
        let target = new.target_uid().to_string();
        self.edges.push(new);
        self.outgoing.entry(source).or_default().push(idx);
        self.incoming.entry(target).or_default().push(idx);
        true
    }

    // ---- reads ----

    pub fn resource(&self, uid: &str) -> Option<&ResourceIdentityNode> {
        self.resources.get(uid)
    }

    pub fn change_event(&self, id: &str) -> Option<&ChangeEventNode> {
        self.change_events.get(id)
    }

    /// The resource a `ChangeEvent` was recorded against, used by the
    /// root-cause walk to attribute a `TRIGGERED_BY` cause event to a
    /// resource.
    pub fn resource_for_event(&self, event_id: &str) -> Option<&str> {
        self.event_resource.get(event_id).map(String::as_str)
    }

    pub fn has_incoming_kind(&self, uid: &str, kind: EdgeKind) -> bool {
        self.incoming(uid, Some(kind)).next().is_some()
    }

    pub fn outgoing(&self, uid: &str, kind: Option<EdgeKind>) -> impl Iterator<Item = &Edge> {
        self.outgoing.get(uid).into_iter().flatten().map(move |&i| &self.edges[i]).filter(move |e| kind.is_none_or(|k| e.kind() == k))
    }

    pub fn incoming(&self, uid: &str, kind: Option<EdgeKind>) -> impl Iterator<Item = &Edge> {
        self.incoming.get(uid).into_iter().flatten().map(move |&i| &self.edges[i]).filter(move |e| kind.is_none_or(|k| e.kind() == k))
    }

    /// The most recent `ChangeEvent` strictly before `ts` (the timeline
    /// query's "pre-existing anchor").
    pub fn event_before(&self, uid: &str, ts: i64) -> Option<&ChangeEventNode> {
        let events = self.resource_events.get(uid)?;
        events.range(..(ts, String::new())).next_back().and_then(|(_, id)| self.change_events.get(id))
    }

    pub fn events_in_range(&self, uid: &str, start: i64, end: i64) -> Vec<&ChangeEventNode> {
        let Some(events) = self.resource_events.get(uid) else { return Vec::new() };
        events
            .range((start, String::new())..=(end, String::from('\u{10FFFF}')))
            .filter_map(|(_, id)| self.change_events.get(id))
            .collect()
    }

    pub fn k8s_events_for(&self, uid: &str) -> Vec<&K8sEventNode> {
        self.resource_k8s_events.get(uid).into_iter().flatten().filter_map(|id| self.k8s_events.get(id)).collect()
    }

    pub fn resources_by_namespace_kind(&self, namespace: &str, kind: &str) -> Vec<&ResourceIdentityNode> {
        self.by_namespace_kind
            .get(&(namespace.to_string(), kind.to_string()))
            .into_iter()
            .flatten()
            .filter_map(|uid| self.resources.get(uid))
            .collect()
    }

    /// Exact namespace+kind+name lookup (RBAC role/ServiceAccount targets).
    /// `namespace = None` searches cluster-scoped resources (empty namespace).
    pub fn find_by_coordinates(&self, namespace: Option<&str>, kind: &str, name: &str) -> Option<&ResourceIdentityNode> {
        self.resources_by_namespace_kind(namespace.unwrap_or(""), kind).into_iter().find(|r| r.name == name)
    }

    pub fn resources_matching(&self, namespace: Option<&str>, kind: Option<&str>, api_group: Option<&str>) -> Vec<&ResourceIdentityNode> {
        self.resources
            .values()
            .filter(|r| namespace.is_none_or(|n| r.namespace == n))
            .filter(|r| kind.is_none_or(|k| r.kind == k))
            .filter(|r| api_group.is_none_or(|g| r.api_group == g))
            .collect()
    }

    /// `OWNS*1..max_hops` walked backward (from owned toward owner), nearest
    /// ancestor first, deduplicated.
    pub fn walk_owns_up(&self, uid: &str, max_hops: u32) -> Vec<String> {
        let mut result = Vec::new();
        let mut seen: HashSet<String> = HashSet::from([uid.to_string()]);
        let mut frontier = vec![uid.to_string()];
        for _ in 0..max_hops {
            let mut next = Vec::new();
            for u in &frontier {
                for e in self.incoming(u, Some(EdgeKind::Owns)) {
                    let owner = e.source_uid().to_string();
                    if seen.insert(owner.clone()) {
                        result.push(owner.clone());
                        next.push(owner);
                    }
                }
            }
            if next.is_empty() {
                break;
            }
            frontier = next;
        }
        result
    }

    /// BFS forward over any of `kinds`, up to `max_hops`, returning
    /// `(uid, kind_of_last_hop, distance)` for every node reached.
    pub fn walk_forward(&self, uid: &str, kinds: &[EdgeKind], max_hops: u32) -> Vec<(String, EdgeKind, u32)> {
        let mut result = Vec::new();
        let mut seen: HashSet<String> = HashSet::from([uid.to_string()]);
        let mut frontier = vec![uid.to_string()];
        let mut hop = 0u32;
        while hop < max_hops && !frontier.is_empty() {
            hop += 1;
            let mut next = Vec::new();
            for u in &frontier {
                for e in self.outgoing(u, None) {
                    if !kinds.contains(&e.kind()) {
                        continue;
                    }
                    let target = e.target_uid().to_string();
                    if seen.insert(target.clone()) {
                        result.push((target.clone(), e.kind(), hop));
                        next.push(target);
                    }
                }
            }
            frontier = next;
        }
        result
    }
}
