//! Root-cause query (spec.md §4.4). Combines a causality walk over
//! `TRIGGERED_BY` edges with a managerial walk over `OWNS`/`MANAGES`, ranking
//! every surviving candidate by impact then recency.

use spectre_core::time::NANOS_PER_SEC;
use spectre_graph::GraphClient;
use spectre_types::{ChangeEventNode, EdgeKind, RootCauseCandidate, RootCauseQuery};

const FAILURE_TOLERANCE_NS: i64 = 5 * 60 * NANOS_PER_SEC;
const MANAGER_LOOKBACK_NS: i64 = 10 * 60 * NANOS_PER_SEC;

pub async fn root_cause_query(graph: &GraphClient, query: &RootCauseQuery) -> Vec<RootCauseCandidate> {
    let mut candidates = Vec::new();

    let failure_event = find_failure_event(graph, &query.resource_uid, query.failure_timestamp_ns).await;

    if let Some(ref failure_event) = failure_event {
        candidates.push(RootCauseCandidate {
            event_id: failure_event.id.clone(),
            resource_uid: query.resource_uid.clone(),
            parent_resource_uid: None,
            impact_score: failure_event.impact_score,
            timestamp: failure_event.timestamp,
            triggered_by_chain: vec![],
            manages_edge_confidence: None,
        });

        for (cause_event, chain) in causality_walk(graph, &failure_event.id, query.max_depth, query.min_confidence).await {
            let resource_uid = graph.resource_for_event(&cause_event.id).await.unwrap_or_default();
            candidates.push(RootCauseCandidate {
                event_id: cause_event.id.clone(),
                resource_uid,
                parent_resource_uid: None,
                impact_score: cause_event.impact_score,
                timestamp: cause_event.timestamp,
                triggered_by_chain: chain,
                manages_edge_confidence: None,
            });
        }
    }

    for (manager_event, owner_uid, confidence) in managerial_walk(graph, &query.resource_uid, query.failure_timestamp_ns, query.min_confidence).await {
        let manager_uid = graph.resource_for_event(&manager_event.id).await.unwrap_or_default();
        candidates.push(RootCauseCandidate {
            event_id: manager_event.id.clone(),
            resource_uid: manager_uid,
            parent_resource_uid: Some(owner_uid),
            impact_score: manager_event.impact_score,
            timestamp: manager_event.timestamp,
            triggered_by_chain: vec![],
            manages_edge_confidence: Some(confidence),
        });
    }

    candidates.sort_by(|a, b| b.impact_score.partial_cmp(&a.impact_score).unwrap_or(std::cmp::Ordering::Equal).then(b.timestamp.cmp(&a.timestamp)));
    candidates.truncate(10);
    tracing::debug!(resource_uid = %query.resource_uid, candidates = candidates.len(), "root cause query completed");
    candidates
}

async fn find_failure_event(graph: &GraphClient, resource_uid: &str, failure_timestamp_ns: i64) -> Option<ChangeEventNode> {
    graph
        .events_in_range(resource_uid, failure_timestamp_ns - FAILURE_TOLERANCE_NS, failure_timestamp_ns + FAILURE_TOLERANCE_NS)
        .await
        .into_iter()
        .min_by_key(|e| (e.timestamp - failure_timestamp_ns).abs())
}

/// Follows `TRIGGERED_BY` edges backward (source = effect, target = cause) up
/// to `max_depth` hops, pruning any hop below `min_confidence`.
async fn causality_walk(graph: &GraphClient, start_event_id: &str, max_depth: u32, min_confidence: f64) -> Vec<(ChangeEventNode, Vec<String>)> {
    let mut results = Vec::new();
    let mut frontier = vec![(start_event_id.to_string(), Vec::<String>::new())];
    for _ in 0..max_depth {
        let mut next = Vec::new();
        for (event_id, chain) in &frontier {
            for edge in graph.outgoing(event_id, Some(EdgeKind::TriggeredBy)).await {
                if edge.confidence() < min_confidence {
                    continue;
                }
                let cause_id = edge.target_uid().to_string();
                let Some(cause_event) = graph.change_event(&cause_id).await else { continue };
                let mut new_chain = chain.clone();
                new_chain.push(cause_id.clone());
                results.push((cause_event, new_chain.clone()));
                next.push((cause_id, new_chain));
            }
        }
        if next.is_empty() {
            break;
        }
        frontier = next;
    }
    results
}

/// Walks `OWNS*1..3` up from `resource_uid`; for each owner with an inbound
/// `MANAGES` edge at or above `min_confidence`, returns the manager's most
/// recent `ChangeEvent` within the last 10 minutes of `failure_timestamp_ns`.
async fn managerial_walk(graph: &GraphClient, resource_uid: &str, failure_timestamp_ns: i64, min_confidence: f64) -> Vec<(ChangeEventNode, String, f64)> {
    let mut results = Vec::new();
    for owner_uid in graph.walk_owns_up(resource_uid, 3).await {
        for edge in graph.incoming(&owner_uid, Some(EdgeKind::Manages)).await {
            if edge.confidence() < min_confidence {
                continue;
            }
            let manager_uid = edge.source_uid().to_string();
            let recent = graph
                .events_in_range(&manager_uid, failure_timestamp_ns - MANAGER_LOOKBACK_NS, failure_timestamp_ns)
                .await
                .into_iter()
                .max_by_key(|e| e.timestamp);
            if let Some(event) = recent {
                results.push((event, owner_uid.clone(), edge.confidence()));
            }
        }
    }
    results
}

#[cfg(test)]
mod tests {
    use rstest::*;
    use spectre_graph::GraphConfig;
    use spectre_types::{Edge, EventType, InferredEdgeKind, ResourceIdentityNode, ResourceStatus, ValidationState};

    use super::*;

    fn identity(uid: &str) -> ResourceIdentityNode {
        ResourceIdentityNode {
            uid: uid.into(),
            kind: "Pod".into(),
            api_group: String::new(),
            version: "v1".into(),
            namespace: "default".into(),
            name: uid.into(),
            labels: Default::default(),
            first_seen: 0,
            last_seen: 0,
            deleted: false,
            deleted_at: None,
        }
    }

    fn change(id: &str, ts: i64, impact: f64) -> ChangeEventNode {
        ChangeEventNode {
            id: id.into(),
            timestamp: ts,
            event_type: EventType::Update,
            status: ResourceStatus::Error,
            error_message: None,
            container_issues: vec![],
            config_changed: false,
            status_changed: false,
            replicas_changed: false,
            impact_score: impact,
            data: serde_json::json!({}),
        }
    }

    #[rstest(tokio::test)]
    async fn test_causality_chain_surfaces_as_candidate() {
        let graph = GraphClient::new(GraphConfig::default());
        graph.upsert_resource_identity(identity("pod")).await;
        graph.upsert_resource_identity(identity("node")).await;
        graph.create_change_event("pod", change("pod-fail", 1_000_000_000, 0.9)).await;
        graph.create_change_event("node", change("node-pressure", 999_000_000, 0.7)).await;
        graph
            .upsert_edge(Edge::TriggeredBy { source: "pod-fail".into(), target: "node-pressure".into(), confidence: 0.8, lag_ms: 1, reason: "memory pressure".into() })
            .await;

        let query = RootCauseQuery { resource_uid: "pod".into(), failure_timestamp_ns: 1_000_000_000, max_depth: 2, min_confidence: 0.5 };
        let candidates = root_cause_query(&graph, &query).await;

        assert!(candidates.iter().any(|c| c.event_id == "node-pressure" && c.resource_uid == "node"));
    }

    #[rstest(tokio::test)]
    async fn test_managerial_candidate_requires_confidence_gate() {
        let graph = GraphClient::new(GraphConfig::default());
        graph.create_owns_edge("deploy", "pod", true, true, 0).await;
        graph.upsert_resource_identity(identity("pod")).await;
        graph
            .upsert_edge(Edge::Inferred {
                source: "controller".into(),
                target: "deploy".into(),
                kind: InferredEdgeKind::Manages,
                confidence: 0.4,
                evidence: vec![],
                first_observed: 0,
                last_validated: 0,
                validation_state: ValidationState::Valid,
            })
            .await;
        graph.create_change_event("controller", change("reconcile", 900_000_000, 0.5)).await;

        let query = RootCauseQuery { resource_uid: "pod".into(), failure_timestamp_ns: 1_000_000_000, max_depth: 1, min_confidence: 0.6 };
        let candidates = root_cause_query(&graph, &query).await;
        assert!(!candidates.iter().any(|c| c.event_id == "reconcile"), "confidence 0.4 is below the 0.6 gate");
    }
}
