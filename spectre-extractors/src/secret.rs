//! Secret relationship extractor (spec.md §4.3 `SecretRelationshipScorer`
//! — "used by cert-manager/external-secrets-like flows"). cert-manager stamps
//! every Secret it issues with a `cert-manager.io/certificate-name` annotation
//! naming the Certificate that owns it; since that Certificate never sets an
//! `OWNS` owner reference on the Secret (cert-manager manages it out of band),
//! the relationship would otherwise be invisible to the graph.

use async_trait::async_trait;
use spectre_graph::GraphLookup;
use spectre_types::{Edge, Event, EventType, InferredEdgeKind, ResourceStatus, ValidationState};

use crate::extractor::Extractor;
use crate::scorer::{SecretRelationshipScorer, SecretRelationshipWeights, SecretSignals};

const CERT_MANAGER_NAME_ANNOTATION: &str = "cert-manager.io/certificate-name";
const CREATES_OBSERVED_THRESHOLD: f64 = 0.5;

fn secret_scorer() -> SecretRelationshipScorer {
    SecretRelationshipScorer { weights: SecretRelationshipWeights::default(), window_ms: 5 * 60_000, require_ready: true }
}

fn certificate_name(event: &Event) -> Option<&str> {
    event.data.get("metadata")?.get("annotations")?.get(CERT_MANAGER_NAME_ANNOTATION)?.as_str()
}

pub struct SecretRelationshipExtractor;

#[async_trait]
impl Extractor for SecretRelationshipExtractor {
    fn name(&self) -> &'static str {
        "secret-relationship"
    }

    fn priority(&self) -> i32 {
        35
    }

    fn matches(&self, event: &Event) -> bool {
        !matches!(event.event_type, EventType::Delete) && event.resource.kind == "Secret" && certificate_name(event).is_some()
    }

    async fn extract_relationships(&self, event: &Event, lookup: &dyn GraphLookup) -> Vec<Edge> {
        let Some(cert_name) = certificate_name(event) else { return Vec::new() };
        let Some(certificate) = lookup.find_by_coordinates(Some(&event.resource.namespace), "Certificate", cert_name).await else { return Vec::new() };

        let scorer = secret_scorer();
        let reconcile = lookup.reconcile_event_near(&certificate.uid, event.timestamp, scorer.window_ms).await;
        let signals = SecretSignals {
            exact_name_match: event.resource.name == cert_name,
            name_pattern_match: event.resource.name == format!("{cert_name}-tls"),
            annotation_match: true,
            label_match: false,
            same_namespace: event.resource.namespace == certificate.namespace,
            temporal_lag_ms: reconcile.as_ref().map(|r| (event.timestamp - r.timestamp) / 1_000_000),
            source_ready: reconcile.as_ref().map(|r| r.status == ResourceStatus::Ready),
            observed_at: event.timestamp,
        };
        let (confidence, evidence) = scorer.score(&signals);
        if confidence < CREATES_OBSERVED_THRESHOLD {
            return Vec::new();
        }

        vec![Edge::Inferred {
            source: certificate.uid,
            target: event.resource.uid.clone(),
            kind: InferredEdgeKind::CreatesObserved,
            confidence,
            evidence,
            first_observed: event.timestamp,
            last_validated: event.timestamp,
            validation_state: ValidationState::Valid,
        }]
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use async_trait::async_trait;
    use rstest::*;
    use serde_json::json;
    use spectre_types::{ChangeEventNode, ResourceIdentityNode, ResourceMetadata};

    use super::*;

    struct FakeLookup {
        certificate: Option<ResourceIdentityNode>,
    }

    #[async_trait]
    impl GraphLookup for FakeLookup {
        async fn find_by_coordinates(&self, _namespace: Option<&str>, kind: &str, _name: &str) -> Option<ResourceIdentityNode> {
            if kind == "Certificate" {
                self.certificate.clone()
            } else {
                None
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

    fn certificate(uid: &str) -> ResourceIdentityNode {
        ResourceIdentityNode {
            uid: uid.into(),
            kind: "Certificate".into(),
            api_group: "cert-manager.io".into(),
            version: "v1".into(),
            namespace: "default".into(),
            name: "my-cert".into(),
            labels: HashMap::new(),
            first_seen: 0,
            last_seen: 0,
            deleted: false,
            deleted_at: None,
        }
    }

    fn secret_event() -> Event {
        Event {
            id: "e1".into(),
            timestamp: 1000,
            event_type: EventType::Create,
            resource: ResourceMetadata { uid: "secret1".into(), kind: "Secret".into(), namespace: "default".into(), name: "my-cert-tls".into(), ..Default::default() },
            data: json!({"metadata": {"annotations": {CERT_MANAGER_NAME_ANNOTATION: "my-cert"}}}),
        }
    }

    #[rstest(tokio::test)]
    async fn test_matches_only_secrets_with_cert_manager_annotation() {
        let ext = SecretRelationshipExtractor;
        assert!(ext.matches(&secret_event()));
        let mut no_annotation = secret_event();
        no_annotation.data = json!({});
        assert!(!ext.matches(&no_annotation));
    }

    #[rstest(tokio::test)]
    async fn test_creates_observed_edge_from_certificate_to_secret() {
        let ext = SecretRelationshipExtractor;
        let lookup = FakeLookup { certificate: Some(certificate("cert1")) };
        let edges = ext.extract_relationships(&secret_event(), &lookup).await;
        assert_eq!(edges.len(), 1);
        match &edges[0] {
            Edge::Inferred { source, target, kind: InferredEdgeKind::CreatesObserved, confidence, .. } => {
                assert_eq!(source, "cert1");
                assert_eq!(target, "secret1");
                assert!(*confidence >= CREATES_OBSERVED_THRESHOLD);
            },
            other => panic!("expected CreatesObserved edge, got {other:?}"),
        }
    }

    #[rstest(tokio::test)]
    async fn test_no_edge_when_certificate_not_found() {
        let ext = SecretRelationshipExtractor;
        let lookup = FakeLookup { certificate: None };
        let edges = ext.extract_relationships(&secret_event(), &lookup).await;
        assert!(edges.is_empty());
    }
}
