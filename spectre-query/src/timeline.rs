//! Timeline query (spec.md §4.4). Grounded on `sk-store::index`'s "filter then
//! collect per-bucket ranges" shape, replayed here against
//! [`spectre_graph::GraphClient`] instead of a block index.

use spectre_core::time::sec_to_ns;
use spectre_graph::GraphClient;
use spectre_types::{ChangeEventNode, QueryEventsResult, ResourceIdentityNode, TimelineEvent, TimelineQuery};

pub async fn timeline_query(graph: &GraphClient, query: &TimelineQuery) -> QueryEventsResult {
    let started = std::time::Instant::now();
    let start_ns = sec_to_ns(query.start_sec);
    let end_ns = sec_to_ns(query.end_sec);

    let candidates = graph.resources_matching(query.filters.namespace.as_deref(), query.filters.kind.as_deref(), query.filters.api_group.as_deref()).await;

    let mut events = Vec::new();
    for resource in candidates {
        let live_in_window = !resource.deleted || resource.deleted_at.is_some_and(|d| d >= start_ns && d <= end_ns);
        if !live_in_window {
            continue;
        }

        let in_range = graph.events_in_range(&resource.uid, start_ns, end_ns).await;
        let anchor = graph.event_before(&resource.uid, start_ns).await;
        let anchor_qualifies = anchor.is_some() && (!resource.deleted || resource.deleted_at.is_some_and(|d| d > start_ns));

        if in_range.is_empty() {
            if !anchor_qualifies {
                continue;
            }
            events.push(to_timeline_event(&resource, anchor.as_ref().expect("anchor_qualifies checked above"), true));
            continue;
        }

        for (i, change_event) in in_range.iter().enumerate() {
            events.push(to_timeline_event(&resource, change_event, i == 0 && anchor.is_some()));
        }
    }

    events.sort_by_key(|e| e.timestamp);
    let count = events.len();
    let execution_time_ms = started.elapsed().as_secs_f64() * 1000.0;
    tracing::debug!(count, execution_time_ms, start_ns, end_ns, "timeline query completed");
    QueryEventsResult { events, count, execution_time_ms, query_start_ns: start_ns, query_end_ns: end_ns }
}

fn to_timeline_event(resource: &ResourceIdentityNode, change_event: &ChangeEventNode, pre_existing: bool) -> TimelineEvent {
    TimelineEvent {
        id: change_event.id.clone(),
        timestamp: change_event.timestamp,
        event_type: change_event.event_type,
        resource: spectre_types::ResourceMetadata {
            uid: resource.uid.clone(),
            kind: resource.kind.clone(),
            api_group: resource.api_group.clone(),
            version: resource.version.clone(),
            namespace: resource.namespace.clone(),
            name: resource.name.clone(),
            labels: resource.labels.clone(),
            involved_object_uid: None,
        },
        status: change_event.status,
        data: change_event.data.clone(),
        pre_existing,
    }
}

#[cfg(test)]
mod tests {
    use rstest::*;
    use spectre_graph::GraphConfig;
    use spectre_types::{EventType, ResourceStatus, TimelineFilters};

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

    fn change(id: &str, ts: i64) -> ChangeEventNode {
        ChangeEventNode {
            id: id.into(),
            timestamp: ts,
            event_type: EventType::Update,
            status: ResourceStatus::Ready,
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
    async fn test_timeline_includes_pre_existing_anchor() {
        let graph = GraphClient::new(GraphConfig::default());
        graph.upsert_resource_identity(identity("p1")).await;
        graph.create_change_event("p1", change("before", 5)).await;
        graph.create_change_event("p1", change("inside", 20)).await;

        let query = TimelineQuery { start_sec: 1, end_sec: 3, filters: TimelineFilters::default() };
        let result = timeline_query(&graph, &query).await;

        assert_eq!(result.events.len(), 2);
        assert!(result.events[0].pre_existing);
        assert_eq!(result.events[0].id, "before");
        assert!(!result.events[1].pre_existing);
    }

    #[rstest(tokio::test)]
    async fn test_timeline_skips_resource_with_no_qualifying_events() {
        let graph = GraphClient::new(GraphConfig::default());
        graph.upsert_resource_identity(identity("p1")).await;

        let query = TimelineQuery { start_sec: 100, end_sec: 200, filters: TimelineFilters::default() };
        let result = timeline_query(&graph, &query).await;
        assert!(result.events.is_empty());
    }

    #[rstest(tokio::test)]
    async fn test_timeline_drops_anchor_after_deletion_before_window() {
        let graph = GraphClient::new(GraphConfig::default());
        graph.upsert_resource_identity(ResourceIdentityNode { deleted: true, deleted_at: Some(1), ..identity("p1") }).await;
        graph.create_change_event("p1", change("before", 0)).await;

        let query = TimelineQuery { start_sec: 2, end_sec: 3, filters: TimelineFilters::default() };
        let result = timeline_query(&graph, &query).await;
        assert!(result.events.is_empty(), "deleted before the window with no in-range events must not surface");
    }
}
