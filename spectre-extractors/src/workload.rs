//! The base observed-edge extractors that run for ordinary workload objects,
//! independent of any GitOps controller: ownership, service account usage,
//! and node scheduling. Grounded directly on spec.md §3's edge table and
//! §4.3's "Observed" edge list (`OWNS`, `USES_SERVICE_ACCOUNT`,
//! `SCHEDULED_ON`) — no concrete extractor contract in the spec's table names
//! these, but something has to produce them, and they're exactly the
//! observed (confidence-1.0) relationships the rest of §4.3 assumes exist.

use async_trait::async_trait;
use spectre_core::jsonutils::navigate_str;
use spectre_graph::GraphLookup;
use spectre_types::{Edge, Event, EventType};

use crate::extractor::Extractor;

/// Reads `metadata.ownerReferences[*]` and emits one `OWNS` edge per entry.
/// Kubernetes already carries the owner's `uid` in each reference, so no
/// lookup is needed.
pub struct OwnerReferenceExtractor;

#[async_trait]
impl Extractor for OwnerReferenceExtractor {
    fn name(&self) -> &'static str {
        "owner-reference"
    }

    fn priority(&self) -> i32 {
        0
    }

    fn matches(&self, event: &Event) -> bool {
        !matches!(event.event_type, EventType::Delete)
    }

    async fn extract_relationships(&self, event: &Event, _lookup: &dyn GraphLookup) -> Vec<Edge> {
        let Some(refs) = event.data.get("metadata").and_then(|m| m.get("ownerReferences")).and_then(|v| v.as_array()) else {
            return Vec::new();
        };
        refs.iter()
            .filter_map(|r| {
                let owner_uid = r.get("uid")?.as_str()?.to_string();
                let controller = r.get("controller").and_then(|v| v.as_bool()).unwrap_or(false);
                let block_owner_deletion = r.get("blockOwnerDeletion").and_then(|v| v.as_bool()).unwrap_or(false);
                Some(Edge::Owns { source: owner_uid, target: event.resource.uid.clone(), controller, block_owner_deletion })
            })
            .collect()
    }
}

/// `spec.serviceAccountName` on a Pod, resolved against the graph's
/// `ServiceAccount` nodes in the same namespace. Missing targets are skipped,
/// not errored, matching the RBAC extractor's contract.
pub struct ServiceAccountExtractor;

#[async_trait]
impl Extractor for ServiceAccountExtractor {
    fn name(&self) -> &'static str {
        "service-account"
    }

    fn priority(&self) -> i32 {
        10
    }

    fn matches(&self, event: &Event) -> bool {
        event.resource.kind == "Pod" && event.resource.api_group.is_empty()
    }

    async fn extract_relationships(&self, event: &Event, lookup: &dyn GraphLookup) -> Vec<Edge> {
        let names = navigate_str(&event.data, "spec.serviceAccountName");
        let Some(name) = names.first() else { return Vec::new() };
        let Some(sa) = lookup.find_by_coordinates(Some(&event.resource.namespace), "ServiceAccount", name).await else {
            return Vec::new();
        };
        vec![Edge::UsesServiceAccount { source: event.resource.uid.clone(), target: sa.uid }]
    }
}

/// `spec.nodeName` on a Pod, resolved against cluster-scoped `Node` nodes.
pub struct NodeSchedulingExtractor;

#[async_trait]
impl Extractor for NodeSchedulingExtractor {
    fn name(&self) -> &'static str {
        "node-scheduling"
    }

    fn priority(&self) -> i32 {
        10
    }

    fn matches(&self, event: &Event) -> bool {
        event.resource.kind == "Pod" && event.resource.api_group.is_empty()
    }

    async fn extract_relationships(&self, event: &Event, lookup: &dyn GraphLookup) -> Vec<Edge> {
        let names = navigate_str(&event.data, "spec.nodeName");
        let Some(name) = names.first() else { return Vec::new() };
        let Some(node) = lookup.find_by_coordinates(None, "Node", name).await else { return Vec::new() };
        let terminated_at = matches!(event.event_type, EventType::Delete).then_some(event.timestamp);
        vec![Edge::ScheduledOn { source: event.resource.uid.clone(), target: node.uid, scheduled_at: event.timestamp, terminated_at }]
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use rstest::*;
    use serde_json::json;
    use spectre_types::{ChangeEventNode, ResourceIdentityNode, ResourceMetadata};

    use super::*;

    struct FakeLookup {
        service_account: Option<ResourceIdentityNode>,
    }

    #[async_trait]
    impl GraphLookup for FakeLookup {
        async fn find_by_coordinates(&self, _namespace: Option<&str>, _kind: &str, _name: &str) -> Option<ResourceIdentityNode> {
            self.service_account.clone()
        }
        async fn resources_by_namespace_kind(&self, _namespace: &str, _kind: &str) -> Vec<ResourceIdentityNode> {
            vec![]
        }
        async fn resources_by_namespace(&self, _namespace: &str) -> Vec<ResourceIdentityNode> {
            vec![]
        }
        async fn has_incoming_owns(&self, _uid: &str) -> bool {
            false
        }
        async fn reconcile_event_near(&self, _controller_uid: &str, _around_ts: i64, _window_ms: i64) -> Option<ChangeEventNode> {
            None
        }
    }

    fn pod_event(owner_refs: serde_json::Value) -> Event {
        Event {
            id: "e1".into(),
            timestamp: 0,
            event_type: EventType::Create,
            resource: ResourceMetadata { uid: "pod1".into(), kind: "Pod".into(), namespace: "default".into(), ..Default::default() },
            data: json!({"metadata": {"ownerReferences": owner_refs}, "spec": {"serviceAccountName": "sa1", "nodeName": "node1"}}),
        }
    }

    #[rstest(tokio::test)]
    async fn test_owner_reference_extractor() {
        let ext = OwnerReferenceExtractor;
        let event = pod_event(json!([{"uid": "rs1", "controller": true, "blockOwnerDeletion": true}]));
        let lookup = FakeLookup { service_account: None };
        let edges = ext.extract_relationships(&event, &lookup).await;
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].source_uid(), "rs1");
        assert_eq!(edges[0].target_uid(), "pod1");
    }

    #[rstest(tokio::test)]
    async fn test_service_account_extractor_skips_missing_target() {
        let ext = ServiceAccountExtractor;
        let event = pod_event(json!([]));
        let lookup = FakeLookup { service_account: None };
        assert!(ext.extract_relationships(&event, &lookup).await.is_empty());
    }
}
