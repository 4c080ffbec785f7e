//! Bridges `Storage`'s write callback to the graph projection (spec.md §4.1
//! upsert contracts, §4.3 extractor dispatch). `Storage::register_callback`
//! requires a synchronous, non-blocking closure, so the callback here only
//! clones handles and `tokio::spawn`s the actual async upsert work, logging
//! rather than propagating any failure from inside the spawned task (spec.md
//! §6: "callbacks MUST be non-blocking in the common case").

use std::collections::HashMap;
use std::sync::Arc;

use spectre_core::errors::EmptyResult;
use spectre_extractors::Pipeline;
use spectre_graph::GraphClient;
use spectre_types::{ChangeEventNode, Edge, Event, EventType, K8sEventNode, ResourceIdentityNode};
use tokio::sync::Mutex;
use tracing::warn;

/// Per-resource, process-lifetime-only sequence numbers for `CHANGED` edges.
/// spec.md §5: `sequenceNumber` is "assigned by the writer and is monotonic
/// per resource within the lifetime of the process" — not globally unique,
/// not persisted across restarts.
#[derive(Default)]
pub struct SequenceCounters {
    next: Mutex<HashMap<String, u64>>,
}

impl SequenceCounters {
    pub fn new() -> Self {
        SequenceCounters::default()
    }

    pub async fn next(&self, resource_uid: &str) -> u64 {
        let mut next = self.next.lock().await;
        let seq = next.entry(resource_uid.to_string()).or_insert(0);
        let value = *seq;
        *seq += 1;
        value
    }
}

/// Registers the callback that projects every written `Event` into the
/// graph. Returns immediately; the projection itself runs on a spawned task.
pub async fn wire(storage: &spectre_store::Storage, graph: Arc<GraphClient>, pipeline: Arc<Pipeline>, sequences: Arc<SequenceCounters>) {
    storage
        .register_callback(Box::new(move |event: &Event| -> EmptyResult {
            let graph = graph.clone();
            let pipeline = pipeline.clone();
            let sequences = sequences.clone();
            let event = event.clone();
            tokio::spawn(async move {
                if let Err(e) = ingest_event(&graph, &pipeline, &sequences, &event).await {
                    warn!("graph projection failed for event {}: {e}", event.id);
                }
            });
            Ok(())
        }))
        .await;
}

pub(crate) async fn ingest_event(graph: &GraphClient, pipeline: &Pipeline, sequences: &SequenceCounters, event: &Event) -> EmptyResult {
    if event.resource.is_k8s_event() {
        let Some(uid) = event.resource.involved_object_uid.clone() else { return Ok(()) };
        graph.record_k8s_event(&uid, to_k8s_event_node(event)).await;
        return Ok(());
    }

    graph.upsert_resource_identity(to_identity_node(event)).await;

    let previous = graph.event_before(&event.resource.uid, event.timestamp).await;
    let change = to_change_event_node(event, previous.as_ref());
    let event_id = change.id.clone();
    if graph.create_change_event(&event.resource.uid, change).await {
        let seq = sequences.next(&event.resource.uid).await;
        graph.create_changed_edge(&event.resource.uid, &event_id, seq).await;
    }

    // Lookup miss during extraction leaves a target UID empty; those
    // candidates are dropped rather than linked to nothing (spec.md §7).
    for edge in pipeline.dispatch(event, graph).await {
        if edge.target_uid().is_empty() {
            continue;
        }
        match edge {
            Edge::Owns { source, target, controller, block_owner_deletion } => {
                graph.create_owns_edge(&source, &target, controller, block_owner_deletion, event.timestamp).await;
            },
            other => {
                graph.upsert_edge(other).await;
            },
        }
    }
    Ok(())
}

fn to_identity_node(event: &Event) -> ResourceIdentityNode {
    ResourceIdentityNode {
        uid: event.resource.uid.clone(),
        kind: event.resource.kind.clone(),
        api_group: event.resource.api_group.clone(),
        version: event.resource.version.clone(),
        namespace: event.resource.namespace.clone(),
        name: event.resource.name.clone(),
        labels: event.resource.labels.clone(),
        first_seen: event.timestamp,
        last_seen: event.timestamp,
        deleted: event.event_type == EventType::Delete,
        deleted_at: (event.event_type == EventType::Delete).then_some(event.timestamp),
    }
}

/// Derives the fields spec.md §3's `ChangeEvent` table names but doesn't give
/// a formula for, by diffing against the resource's previous `ChangeEvent`:
/// `statusChanged`/`configChanged`/`replicasChanged` compare the newly
/// inferred status, `metadata.generation`, and replica count against that
/// prior event; with no prior event (first observation) all three are
/// `false`, since there's nothing yet to have changed from.
fn to_change_event_node(event: &Event, previous: Option<&ChangeEventNode>) -> ChangeEventNode {
    let (status, message) = spectre_query::infer_status(&event.data);
    let status_changed = previous.is_some_and(|p| p.status != status);
    let config_changed = previous.is_some_and(|p| generation(&p.data) != generation(&event.data));
    let replicas_changed = previous.is_some_and(|p| replica_count(&p.data) != replica_count(&event.data));
    let error_message = matches!(status, spectre_types::ResourceStatus::Warning | spectre_types::ResourceStatus::Error).then_some(message);

    ChangeEventNode {
        id: event.id.clone(),
        timestamp: event.timestamp,
        event_type: event.event_type,
        status,
        error_message,
        container_issues: container_issues(&event.data),
        config_changed,
        status_changed,
        replicas_changed,
        impact_score: impact_score(status, status_changed, replicas_changed),
        data: event.data.clone(),
    }
}

fn generation(data: &serde_json::Value) -> Option<i64> {
    data.get("metadata").and_then(|m| m.get("generation")).and_then(|g| g.as_i64())
}

fn replica_count(data: &serde_json::Value) -> Option<i64> {
    data.get("status")
        .and_then(|s| s.get("replicas"))
        .and_then(|r| r.as_i64())
        .or_else(|| data.get("spec").and_then(|s| s.get("replicas")).and_then(|r| r.as_i64()))
}

fn container_issues(data: &serde_json::Value) -> Vec<String> {
    data.get("status")
        .and_then(|s| s.get("containerStatuses"))
        .and_then(|c| c.as_array())
        .map(|statuses| {
            statuses
                .iter()
                .filter_map(|cs| cs.get("state").and_then(|s| s.get("waiting")).and_then(|w| w.get("reason")).and_then(|r| r.as_str()))
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

/// Fixed weights, not spec-derived: errors dominate, a status flip or a
/// replica-count change each add a bounded bump, capped at 1.0.
fn impact_score(status: spectre_types::ResourceStatus, status_changed: bool, replicas_changed: bool) -> f64 {
    use spectre_types::ResourceStatus::*;
    let base = match status {
        Error => 1.0,
        Warning => 0.6,
        Terminating => 0.5,
        Unknown => 0.2,
        Ready => 0.0,
    };
    let bump = if status_changed { 0.2 } else { 0.0 } + if replicas_changed { 0.1 } else { 0.0 };
    (base + bump).min(1.0)
}

fn to_k8s_event_node(event: &Event) -> K8sEventNode {
    let data = &event.data;
    K8sEventNode {
        id: event.id.clone(),
        timestamp: event.timestamp,
        reason: data.get("reason").and_then(|r| r.as_str()).unwrap_or("Unknown").to_string(),
        message: data.get("message").and_then(|m| m.as_str()).unwrap_or_default().to_string(),
        event_type: data.get("type").and_then(|t| t.as_str()).unwrap_or("Normal").to_string(),
        count: data.get("count").and_then(|c| c.as_i64()).unwrap_or(1) as i32,
        source: data
            .get("source")
            .and_then(|s| s.get("component").and_then(|c| c.as_str()).or_else(|| s.as_str()))
            .unwrap_or_default()
            .to_string(),
    }
}

#[cfg(test)]
mod tests {
    use rstest::*;
    use spectre_extractors::default_extractors;
    use spectre_graph::GraphConfig;
    use spectre_types::ResourceMetadata;

    use super::*;

    fn pod_event(id: &str, uid: &str, ts: i64, event_type: EventType, data: serde_json::Value) -> Event {
        Event {
            id: id.into(),
            timestamp: ts,
            event_type,
            resource: ResourceMetadata { uid: uid.into(), kind: "Pod".into(), api_group: String::new(), version: "v1".into(), namespace: "default".into(), name: uid.into(), ..Default::default() },
            data,
        }
    }

    #[rstest(tokio::test)]
    async fn test_ingest_creates_identity_and_change_event() {
        let graph = GraphClient::new(GraphConfig::default());
        let pipeline = Pipeline::new(default_extractors());
        let sequences = SequenceCounters::new();

        let event = pod_event("e1", "pod-1", 100, EventType::Create, serde_json::json!({"status": {"phase": "Running"}}));
        ingest_event(&graph, &pipeline, &sequences, &event).await.unwrap();

        assert!(graph.resource("pod-1").await.is_some());
        let change = graph.change_event("e1").await.unwrap();
        assert!(!change.status_changed, "first observation has nothing to diff against");
    }

    #[rstest(tokio::test)]
    async fn test_ingest_marks_status_changed_from_prior_event() {
        let graph = GraphClient::new(GraphConfig::default());
        let pipeline = Pipeline::new(default_extractors());
        let sequences = SequenceCounters::new();

        let first = pod_event("e1", "pod-1", 100, EventType::Create, serde_json::json!({"status": {"phase": "Pending"}}));
        ingest_event(&graph, &pipeline, &sequences, &first).await.unwrap();

        let second = pod_event("e2", "pod-1", 200, EventType::Update, serde_json::json!({"status": {"phase": "Running"}}));
        ingest_event(&graph, &pipeline, &sequences, &second).await.unwrap();

        let change = graph.change_event("e2").await.unwrap();
        assert!(change.status_changed);
        assert_eq!(change.impact_score, 0.2, "Ready base 0.0 plus the status-changed bump");
    }

    #[rstest(tokio::test)]
    async fn test_ingest_assigns_monotonic_sequence_per_resource() {
        let graph = GraphClient::new(GraphConfig::default());
        let pipeline = Pipeline::new(default_extractors());
        let sequences = SequenceCounters::new();

        for i in 0..3 {
            let event = pod_event(&format!("e{i}"), "pod-1", i as i64 * 10, EventType::Update, serde_json::json!({}));
            ingest_event(&graph, &pipeline, &sequences, &event).await.unwrap();
        }

        let edges = graph.outgoing("pod-1", Some(spectre_types::EdgeKind::Changed)).await;
        let mut sequences_seen: Vec<u64> = edges
            .iter()
            .filter_map(|e| match e {
                Edge::Changed { sequence, .. } => Some(*sequence),
                _ => None,
            })
            .collect();
        sequences_seen.sort_unstable();
        assert_eq!(sequences_seen, vec![0, 1, 2]);
    }
}
