//! RBAC extractor (spec.md §4.3 concrete extractors table).

use async_trait::async_trait;
use spectre_core::jsonutils::navigate_str;
use spectre_graph::GraphLookup;
use spectre_types::{Edge, Event};

use crate::extractor::Extractor;

pub struct RbacExtractor;

#[async_trait]
impl Extractor for RbacExtractor {
    fn name(&self) -> &'static str {
        "rbac"
    }

    fn priority(&self) -> i32 {
        20
    }

    fn matches(&self, event: &Event) -> bool {
        event.resource.api_group == "rbac.authorization.k8s.io" && matches!(event.resource.kind.as_str(), "RoleBinding" | "ClusterRoleBinding")
    }

    async fn extract_relationships(&self, event: &Event, lookup: &dyn GraphLookup) -> Vec<Edge> {
        let mut edges = Vec::new();
        let binding_uid = &event.resource.uid;

        if let Some(role) = resolve_role_ref(event, lookup).await {
            edges.push(Edge::BindsRole { source: binding_uid.clone(), target: role.uid });
        }

        if let Some(subjects) = event.data.get("subjects").and_then(|v| v.as_array()) {
            for subject in subjects {
                let kind = subject.get("kind").and_then(|v| v.as_str()).unwrap_or_default();
                if kind != "ServiceAccount" {
                    continue;
                }
                let Some(name) = subject.get("name").and_then(|v| v.as_str()) else { continue };
                let namespace = subject.get("namespace").and_then(|v| v.as_str()).unwrap_or(&event.resource.namespace);
                if let Some(sa) = lookup.find_by_coordinates(Some(namespace), "ServiceAccount", name).await {
                    edges.push(Edge::GrantsTo { source: binding_uid.clone(), target: sa.uid, subject_kind: "ServiceAccount".into() });
                }
            }
        }

        edges
    }
}

async fn resolve_role_ref(event: &Event, lookup: &dyn GraphLookup) -> Option<spectre_types::ResourceIdentityNode> {
    let role_kind = navigate_str(&event.data, "roleRef.kind").first().copied()?.to_string();
    let role_name = navigate_str(&event.data, "roleRef.name").first().copied()?.to_string();
    let namespace = if role_kind == "ClusterRole" { None } else { Some(event.resource.namespace.as_str()) };
    lookup.find_by_coordinates(namespace, &role_kind, &role_name).await
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use rstest::*;
    use serde_json::json;
    use spectre_types::{ChangeEventNode, EventType, ResourceIdentityNode, ResourceMetadata};

    use super::*;

    struct FakeLookup {
        role: Option<ResourceIdentityNode>,
        sa: Option<ResourceIdentityNode>,
    }

    #[async_trait]
    impl GraphLookup for FakeLookup {
        async fn find_by_coordinates(&self, _namespace: Option<&str>, kind: &str, _name: &str) -> Option<ResourceIdentityNode> {
            if kind == "ServiceAccount" {
                self.sa.clone()
            } else {
                self.role.clone()
            }
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

    fn identity(uid: &str) -> ResourceIdentityNode {
        ResourceIdentityNode {
            uid: uid.into(),
            kind: "Role".into(),
            api_group: "rbac.authorization.k8s.io".into(),
            version: "v1".into(),
            namespace: "default".into(),
            name: "role1".into(),
            labels: Default::default(),
            first_seen: 0,
            last_seen: 0,
            deleted: false,
            deleted_at: None,
        }
    }

    fn binding_event() -> Event {
        Event {
            id: "e1".into(),
            timestamp: 0,
            event_type: EventType::Create,
            resource: ResourceMetadata {
                uid: "binding1".into(),
                kind: "RoleBinding".into(),
                api_group: "rbac.authorization.k8s.io".into(),
                namespace: "default".into(),
                ..Default::default()
            },
            data: json!({
                "roleRef": {"kind": "Role", "name": "role1"},
                "subjects": [
                    {"kind": "ServiceAccount", "name": "sa1", "namespace": "default"},
                    {"kind": "User", "name": "alice"},
                ],
            }),
        }
    }

    #[rstest(tokio::test)]
    async fn test_rbac_extractor_produces_binds_role_and_grants_to() {
        let ext = RbacExtractor;
        let lookup = FakeLookup { role: Some(identity("role1")), sa: Some(identity("sa1")) };
        let edges = ext.extract_relationships(&binding_event(), &lookup).await;
        assert_eq!(edges.len(), 2);
        assert!(edges.iter().any(|e| matches!(e, Edge::BindsRole { .. })));
        assert!(edges.iter().any(|e| matches!(e, Edge::GrantsTo { .. })));
    }

    #[rstest(tokio::test)]
    async fn test_rbac_extractor_skips_missing_role_and_user_subjects() {
        let ext = RbacExtractor;
        let lookup = FakeLookup { role: None, sa: None };
        let edges = ext.extract_relationships(&binding_event(), &lookup).await;
        assert!(edges.is_empty());
    }
}
