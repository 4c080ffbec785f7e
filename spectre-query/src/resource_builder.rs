//! UI resource aggregation (spec.md §4.5). Pure functions over the ingest-path
//! `Event`/`K8sEvent` wire types; no graph or storage dependency. Grounded on
//! `sk-store::index`'s single-pass "bucket then derive" shape applied here to
//! per-resource status segmentation instead of block indices.

use std::collections::HashMap;

use chrono::DateTime;
use spectre_core::time::NANOS_PER_HOUR;
use spectre_types::{Event, EventType, K8sEvent as K8sEventDto, Resource, ResourceStatus, StatusSegment};

/// `BuildResourcesFromEvents`: discards `Event`-kind ingest events, buckets
/// the rest by `resource.uid` in one pass, and derives contiguous status
/// segments per bucket.
pub fn build_resources_from_events(events: &[Event]) -> Vec<Resource> {
    let mut buckets: HashMap<&str, Vec<&Event>> = HashMap::new();
    for event in events {
        if event.resource.is_k8s_event() {
            continue;
        }
        buckets.entry(event.resource.uid.as_str()).or_default().push(event);
    }

    let mut resources: Vec<Resource> = buckets.into_values().map(build_one_resource).collect();
    resources.sort_by(|a, b| a.id.cmp(&b.id));
    resources
}

fn build_one_resource(mut bucket: Vec<&Event>) -> Resource {
    bucket.sort_by_key(|e| e.timestamp);
    let first = bucket[0];
    let pre_existing = first.is_pre_existing_snapshot();

    let mut status_cache: HashMap<&str, (ResourceStatus, String)> = HashMap::new();
    let mut segments = Vec::with_capacity(bucket.len());
    for (i, event) in bucket.iter().enumerate() {
        let (status, message) = status_cache.entry(event.id.as_str()).or_insert_with(|| infer_status(&event.data)).clone();
        let end_time = bucket.get(i + 1).map(|next| next.timestamp).unwrap_or(event.timestamp + NANOS_PER_HOUR);
        segments.push(StatusSegment { start_time: event.timestamp, end_time, status, message, resource_data: event.data.clone() });
    }

    Resource {
        id: first.resource.uid.clone(),
        group: first.resource.api_group.clone(),
        version: first.resource.version.clone(),
        kind: first.resource.kind.clone(),
        namespace: first.resource.namespace.clone(),
        name: first.resource.name.clone(),
        status_segments: segments,
        events: Vec::new(),
        pre_existing,
    }
}

/// Reads `.status.phase`/conditions/container statuses out of the raw event
/// payload. Best-effort: malformed or absent status data yields `Unknown`.
/// Exposed so the ingest path can derive a `ChangeEvent`'s status with the
/// same rule the UI resource builder uses.
pub fn infer_status(data: &serde_json::Value) -> (ResourceStatus, String) {
    if data.get("metadata").and_then(|m| m.get("deletionTimestamp")).is_some() {
        return (ResourceStatus::Terminating, "deletion in progress".to_string());
    }

    let status = data.get("status");

    if let Some(conditions) = status.and_then(|s| s.get("conditions")).and_then(|c| c.as_array()) {
        if let Some(ready) = conditions.iter().find(|c| c.get("type").and_then(|t| t.as_str()) == Some("Ready")) {
            if ready.get("status").and_then(|s| s.as_str()) == Some("False") {
                let message = ready.get("message").and_then(|m| m.as_str()).unwrap_or("Ready=False").to_string();
                return (ResourceStatus::Warning, message);
            }
        }
    }

    if let Some(container_statuses) = status.and_then(|s| s.get("containerStatuses")).and_then(|c| c.as_array()) {
        for cs in container_statuses {
            if let Some(reason) = cs.get("state").and_then(|s| s.get("waiting")).and_then(|w| w.get("reason")).and_then(|r| r.as_str()) {
                return (ResourceStatus::Error, reason.to_string());
            }
        }
    }

    match status.and_then(|s| s.get("phase")).and_then(|p| p.as_str()) {
        Some("Failed") => (ResourceStatus::Error, "phase=Failed".to_string()),
        Some("Pending") => (ResourceStatus::Warning, "phase=Pending".to_string()),
        Some("Running") | Some("Succeeded") | Some("Bound") | Some("Active") => (ResourceStatus::Ready, String::new()),
        Some(other) => (ResourceStatus::Unknown, format!("phase={other}")),
        None if status.is_some() => (ResourceStatus::Ready, String::new()),
        None => (ResourceStatus::Unknown, String::new()),
    }
}

/// `AttachK8sEvents`: resolves each Kubernetes `Event` object's
/// `involvedObjectUID` to a resource bucket and appends a normalized
/// `K8sEvent`, sorted per resource by timestamp.
pub fn attach_k8s_events(resources: &mut [Resource], events: &[Event]) {
    let mut by_uid: HashMap<&str, usize> = HashMap::new();
    for (i, r) in resources.iter().enumerate() {
        by_uid.insert(r.id.as_str(), i);
    }

    for event in events {
        if !event.resource.is_k8s_event() {
            continue;
        }
        let Some(involved_uid) = event.resource.involved_object_uid.as_deref() else { continue };
        let Some(&idx) = by_uid.get(involved_uid) else { continue };

        resources[idx].events.push(to_k8s_event(event));
    }

    for r in resources.iter_mut() {
        r.events.sort_by_key(|e| e.timestamp);
    }
}

fn to_k8s_event(event: &Event) -> K8sEventDto {
    let data = &event.data;
    let reason = data.get("reason").and_then(|r| r.as_str()).unwrap_or("Unknown").to_string();
    let event_type = data.get("type").and_then(|t| t.as_str()).unwrap_or("Normal").to_string();
    let message = data.get("message").and_then(|m| m.as_str()).unwrap_or_default().to_string();
    let count = data.get("count").and_then(|c| c.as_i64()).unwrap_or(1) as i32;
    let source = data
        .get("source")
        .and_then(|s| s.get("component").and_then(|c| c.as_str()).or_else(|| s.as_str()))
        .unwrap_or_default()
        .to_string();

    let timestamp = parse_rfc3339_field(data, "lastTimestamp")
        .or_else(|| parse_rfc3339_field(data, "firstTimestamp"))
        .or_else(|| parse_rfc3339_field(data, "eventTime"))
        .unwrap_or(event.timestamp / spectre_core::time::NANOS_PER_SEC);

    K8sEventDto { timestamp, reason, message, event_type, count, source }
}

fn parse_rfc3339_field(data: &serde_json::Value, key: &str) -> Option<i64> {
    let text = data.get(key)?.as_str()?;
    DateTime::parse_from_rfc3339(text).ok().map(|dt| dt.timestamp())
}

#[cfg(test)]
mod tests {
    use rstest::*;
    use spectre_types::ResourceMetadata;

    use super::*;

    fn pod_event(id: &str, uid: &str, ts: i64, data: serde_json::Value) -> Event {
        Event {
            id: id.into(),
            timestamp: ts,
            event_type: EventType::Update,
            resource: ResourceMetadata { uid: uid.into(), kind: "Pod".into(), api_group: String::new(), version: "v1".into(), namespace: "default".into(), name: uid.into(), ..Default::default() },
            data,
        }
    }

    #[rstest]
    fn test_discards_k8s_event_kind_from_segments() {
        let events = vec![
            pod_event("p1", "u1", 0, serde_json::json!({"status": {"phase": "Running"}})),
            Event {
                id: "ev1".into(),
                timestamp: 1,
                event_type: EventType::Create,
                resource: ResourceMetadata { uid: "ev-uid".into(), kind: "Event".into(), involved_object_uid: Some("u1".into()), ..Default::default() },
                data: serde_json::json!({"reason": "Scheduled"}),
            },
        ];
        let resources = build_resources_from_events(&events);
        assert_eq!(resources.len(), 1);
        assert_eq!(resources[0].id, "u1");
    }

    #[rstest]
    fn test_contiguous_segments_with_final_sentinel() {
        let events = vec![
            pod_event("p1", "u1", 0, serde_json::json!({"status": {"phase": "Pending"}})),
            pod_event("p2", "u1", 100, serde_json::json!({"status": {"phase": "Running"}})),
        ];
        let resources = build_resources_from_events(&events);
        let segments = &resources[0].status_segments;
        assert_eq!(segments[0].end_time, 100);
        assert_eq!(segments[1].end_time, 100 + NANOS_PER_HOUR);
        assert_eq!(segments[0].status, ResourceStatus::Warning);
        assert_eq!(segments[1].status, ResourceStatus::Ready);
    }

    #[rstest]
    fn test_pre_existing_from_state_prefix() {
        let events = vec![pod_event(&Event::state_event_id("u1"), "u1", 0, serde_json::json!({}))];
        let resources = build_resources_from_events(&events);
        assert!(resources[0].pre_existing);
    }

    #[rstest]
    fn test_attach_k8s_events_normalizes_and_sorts() {
        let mut resources = build_resources_from_events(&[pod_event("p1", "u1", 0, serde_json::json!({"status": {"phase": "Running"}}))]);
        let k8s_events = vec![
            Event {
                id: "ev2".into(),
                timestamp: 200_000_000_000,
                event_type: EventType::Create,
                resource: ResourceMetadata { uid: "ev2-uid".into(), kind: "Event".into(), involved_object_uid: Some("u1".into()), ..Default::default() },
                data: serde_json::json!({}),
            },
            Event {
                id: "ev1".into(),
                timestamp: 100_000_000_000,
                event_type: EventType::Create,
                resource: ResourceMetadata { uid: "ev1-uid".into(), kind: "Event".into(), involved_object_uid: Some("u1".into()), ..Default::default() },
                data: serde_json::json!({"reason": "Scheduled", "type": "Normal", "lastTimestamp": "1970-01-01T00:00:50Z"}),
            },
        ];
        attach_k8s_events(&mut resources, &k8s_events);

        assert_eq!(resources[0].events.len(), 2);
        assert_eq!(resources[0].events[0].reason, "Scheduled");
        assert_eq!(resources[0].events[0].timestamp, 50);
        assert_eq!(resources[0].events[1].reason, "Unknown");
        assert_eq!(resources[0].events[1].event_type, "Normal");
    }
}
