//! Blast-radius query (spec.md §4.4): forward impact from a change, bounded
//! by hop count and a time window.

use spectre_graph::GraphClient;
use spectre_types::{BlastRadiusQuery, BlastRadiusResult, ImpactedResource, ResourceStatus};

const MAX_HOPS: u32 = 3;

pub async fn blast_radius_query(graph: &GraphClient, query: &BlastRadiusQuery) -> BlastRadiusResult {
    let reached = graph.walk_forward(&query.resource_uid, &query.relationship_types, MAX_HOPS).await;
    let window_end_ns = query.change_timestamp_ns + query.time_window_ms * 1_000_000;

    let mut impacted = Vec::new();
    for (uid, relationship_type, distance) in reached {
        let events = graph.events_in_range(&uid, query.change_timestamp_ns, window_end_ns).await;
        for event in events {
            if event.timestamp <= query.change_timestamp_ns || event.timestamp > window_end_ns {
                continue;
            }
            if !matches!(event.status, ResourceStatus::Warning | ResourceStatus::Error) {
                continue;
            }
            impacted.push(ImpactedResource { impacted_uid: uid.clone(), impact_event_id: event.id, impact_event_timestamp: event.timestamp, relationship_type, distance });
        }
    }

    impacted.sort_by_key(|i| i.impact_event_timestamp);
    BlastRadiusResult { impacted }
}

#[cfg(test)]
mod tests {
    use rstest::*;
    use spectre_graph::GraphConfig;
    use spectre_types::{ChangeEventNode, EdgeKind, EventType, ResourceIdentityNode};

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

    fn change(id: &str, ts: i64, status: ResourceStatus) -> ChangeEventNode {
        ChangeEventNode {
            id: id.into(),
            timestamp: ts,
            event_type: EventType::Update,
            status,
            error_message: None,
            container_issues: vec![],
            config_changed: false,
            status_changed: false,
            replicas_changed: false,
            impact_score: 0.0,
            data: serde_json::json!({}),
        }
    }

    #[rstest(tokio::test)]
    async fn test_blast_radius_finds_downstream_errors_in_window() {
        let graph = GraphClient::new(GraphConfig::default());
        graph.create_owns_edge("deploy", "pod", true, true, 0).await;
        graph.upsert_resource_identity(identity("pod")).await;
        graph.create_change_event("pod", change("pod-ok", 50_000_000, ResourceStatus::Ready)).await;
        graph.create_change_event("pod", change("pod-err", 150_000_000, ResourceStatus::Error)).await;

        let query = BlastRadiusQuery { resource_uid: "deploy".into(), change_timestamp_ns: 100_000_000, time_window_ms: 100, relationship_types: vec![EdgeKind::Owns] };
        let result = blast_radius_query(&graph, &query).await;

        assert_eq!(result.impacted.len(), 1);
        assert_eq!(result.impacted[0].impact_event_id, "pod-err");
        assert_eq!(result.impacted[0].distance, 1);
    }

    #[rstest(tokio::test)]
    async fn test_blast_radius_excludes_ready_events() {
        let graph = GraphClient::new(GraphConfig::default());
        graph.create_owns_edge("deploy", "pod", true, true, 0).await;
        graph.upsert_resource_identity(identity("pod")).await;
        graph.create_change_event("pod", change("pod-ok", 150_000_000, ResourceStatus::Ready)).await;

        let query = BlastRadiusQuery { resource_uid: "deploy".into(), change_timestamp_ns: 100_000_000, time_window_ms: 100, relationship_types: vec![EdgeKind::Owns] };
        let result = blast_radius_query(&graph, &query).await;
        assert!(result.impacted.is_empty());
    }
}
