//! Flux CD extractors (spec.md §4.3 concrete extractors table). All four
//! share the cross-cutting invariant that a `MANAGES` edge must never point
//! at a resource that already has an incoming `OWNS` edge (it would bypass
//! the real Deployment→ReplicaSet→Pod ownership chain).

use async_trait::async_trait;
use spectre_core::jsonutils::navigate_str;
use spectre_graph::GraphLookup;
use spectre_types::{Edge, Event, EventType, InferredEdgeKind, ValidationState};

use crate::extractor::Extractor;
use crate::scorer::{ManagementScorer, ManagementWeights};

/// Kinds searched as `MANAGES` candidates in a controller's target namespace.
/// Flux-managed trees are usually rooted in one of these.
const CANDIDATE_KINDS: &[&str] = &["Deployment", "StatefulSet", "DaemonSet", "Service", "ConfigMap", "Secret", "Ingress", "Job", "CronJob"];

fn management_scorer() -> ManagementScorer {
    ManagementScorer { weights: ManagementWeights::default(), window_ms: 5 * 60_000 }
}

const MANAGES_THRESHOLD: f64 = 0.5;

async fn manages_candidates(event: &Event, target_namespace: &str, lookup: &dyn GraphLookup) -> Vec<Edge> {
    let scorer = management_scorer();
    let mut edges = Vec::new();
    for kind in CANDIDATE_KINDS {
        for candidate in lookup.resources_by_namespace_kind(target_namespace, kind).await {
            if lookup.has_incoming_owns(&candidate.uid).await {
                continue;
            }
            let reconcile = lookup.reconcile_event_near(&event.resource.uid, event.timestamp, scorer.window_ms).await;
            let (confidence, evidence) = scorer.score(&event.resource.name, &event.resource.namespace, &candidate, reconcile.as_ref());
            if confidence < MANAGES_THRESHOLD {
                continue;
            }
            edges.push(Edge::Inferred {
                source: event.resource.uid.clone(),
                target: candidate.uid,
                kind: InferredEdgeKind::Manages,
                confidence,
                evidence,
                first_observed: event.timestamp,
                last_validated: event.timestamp,
                validation_state: ValidationState::Valid,
            });
        }
    }
    edges
}

/// `MANAGES` edges for resources that carry Flux's own bookkeeping labels
/// (`kustomize.toolkit.fluxcd.io/name` + `/namespace`) pointing back at this
/// Kustomization, scoped to its `targetNamespace`. Unlike `manages_candidates`
/// (a name-prefix + temporal heuristic used where Flux leaves no such marker,
/// e.g. HelmRelease), this is exact label matching per spec.md's Kustomization
/// row, so no confidence scoring is needed — a label match is definitive.
async fn label_matched_candidates(event: &Event, target_namespace: &str, lookup: &dyn GraphLookup) -> Vec<Edge> {
    let mut edges = Vec::new();
    for candidate in lookup.resources_by_namespace(target_namespace).await {
        if candidate.labels.get("kustomize.toolkit.fluxcd.io/name").map(String::as_str) != Some(event.resource.name.as_str()) {
            continue;
        }
        if candidate.labels.get("kustomize.toolkit.fluxcd.io/namespace").map(String::as_str) != Some(event.resource.namespace.as_str()) {
            continue;
        }
        if lookup.has_incoming_owns(&candidate.uid).await {
            continue;
        }
        edges.push(Edge::Inferred {
            source: event.resource.uid.clone(),
            target: candidate.uid,
            kind: InferredEdgeKind::Manages,
            confidence: 1.0,
            evidence: "kustomize.toolkit.fluxcd.io/name+namespace label match".to_string(),
            first_observed: event.timestamp,
            last_validated: event.timestamp,
            validation_state: ValidationState::Valid,
        });
    }
    edges
}

async fn references_spec_for_names(source_uid: &str, namespace: &str, kind: &str, names: &[&str], field_path: &str, lookup: &dyn GraphLookup) -> Vec<Edge> {
    let mut edges = Vec::new();
    for name in names {
        if let Some(target) = lookup.find_by_coordinates(Some(namespace), kind, name).await {
            edges.push(Edge::ReferencesSpec { source: source_uid.to_string(), target: target.uid, field_path: field_path.to_string() });
        }
    }
    edges
}

pub struct HelmReleaseExtractor;

#[async_trait]
impl Extractor for HelmReleaseExtractor {
    fn name(&self) -> &'static str {
        "flux-helmrelease"
    }

    fn priority(&self) -> i32 {
        30
    }

    fn matches(&self, event: &Event) -> bool {
        event.resource.api_group == "helm.toolkit.fluxcd.io" && event.resource.kind == "HelmRelease"
    }

    async fn extract_relationships(&self, event: &Event, lookup: &dyn GraphLookup) -> Vec<Edge> {
        let namespace = &event.resource.namespace;
        let mut edges = Vec::new();

        let secret_names = navigate_str(&event.data, "spec.valuesFrom[*].secretKeyRef.name");
        edges.extend(references_spec_for_names(&event.resource.uid, namespace, "Secret", &secret_names, "spec.valuesFrom", lookup).await);
        let cm_names = navigate_str(&event.data, "spec.valuesFrom[*].configMapKeyRef.name");
        edges.extend(references_spec_for_names(&event.resource.uid, namespace, "ConfigMap", &cm_names, "spec.valuesFrom", lookup).await);

        let kubeconfig_secret = navigate_str(&event.data, "spec.kubeConfig.secretRef.name");
        edges.extend(references_spec_for_names(&event.resource.uid, namespace, "Secret", &kubeconfig_secret, "spec.kubeConfig.secretRef", lookup).await);

        let source_names = navigate_str(&event.data, "spec.chart.spec.sourceRef.name");
        let source_kind = navigate_str(&event.data, "spec.chart.spec.sourceRef.kind").first().copied().unwrap_or("HelmRepository");
        edges.extend(references_spec_for_names(&event.resource.uid, namespace, source_kind, &source_names, "spec.chart.spec.sourceRef", lookup).await);

        let target_namespace = navigate_str(&event.data, "spec.targetNamespace").first().copied().unwrap_or(namespace.as_str());
        edges.extend(manages_candidates(event, target_namespace, lookup).await);

        edges
    }
}

pub struct KustomizationExtractor;

#[async_trait]
impl Extractor for KustomizationExtractor {
    fn name(&self) -> &'static str {
        "flux-kustomization"
    }

    fn priority(&self) -> i32 {
        30
    }

    fn matches(&self, event: &Event) -> bool {
        event.resource.api_group == "kustomize.toolkit.fluxcd.io" && event.resource.kind == "Kustomization"
    }

    async fn extract_relationships(&self, event: &Event, lookup: &dyn GraphLookup) -> Vec<Edge> {
        let namespace = &event.resource.namespace;
        let mut edges = Vec::new();

        let source_names = navigate_str(&event.data, "spec.sourceRef.name");
        let source_kind = navigate_str(&event.data, "spec.sourceRef.kind").first().copied().unwrap_or("GitRepository");
        edges.extend(references_spec_for_names(&event.resource.uid, namespace, source_kind, &source_names, "spec.sourceRef", lookup).await);

        let decryption_secret = navigate_str(&event.data, "spec.decryption.secretRef.name");
        edges.extend(references_spec_for_names(&event.resource.uid, namespace, "Secret", &decryption_secret, "spec.decryption.secretRef", lookup).await);

        let target_namespace = navigate_str(&event.data, "spec.targetNamespace").first().copied().unwrap_or(namespace.as_str());
        edges.extend(label_matched_candidates(event, target_namespace, lookup).await);

        edges
    }
}

pub struct GitRepositoryExtractor;

#[async_trait]
impl Extractor for GitRepositoryExtractor {
    fn name(&self) -> &'static str {
        "flux-gitrepository"
    }

    fn priority(&self) -> i32 {
        30
    }

    fn matches(&self, event: &Event) -> bool {
        event.resource.api_group == "source.toolkit.fluxcd.io" && event.resource.kind == "GitRepository"
    }

    async fn extract_relationships(&self, event: &Event, lookup: &dyn GraphLookup) -> Vec<Edge> {
        let namespace = &event.resource.namespace;
        let mut edges = Vec::new();

        let secret_ref = navigate_str(&event.data, "spec.secretRef.name");
        edges.extend(references_spec_for_names(&event.resource.uid, namespace, "Secret", &secret_ref, "spec.secretRef", lookup).await);

        let verify_secret_ref = navigate_str(&event.data, "spec.verify.secretRef.name");
        edges.extend(references_spec_for_names(&event.resource.uid, namespace, "Secret", &verify_secret_ref, "spec.verify.secretRef", lookup).await);

        edges
    }
}

/// Runs on every other CREATE event. If the object's labels carry a Flux
/// `kustomize.toolkit.fluxcd.io/name` + `/namespace` pair (or the Helm
/// equivalent), and that controller was synced first, creates the `MANAGES`
/// edge in the reverse direction (controller → resource).
pub struct FluxManagedReverseExtractor;

const FLUX_LABEL_PAIRS: &[(&str, &str, &str)] = &[
    ("kustomize.toolkit.fluxcd.io/name", "kustomize.toolkit.fluxcd.io/namespace", "Kustomization"),
    ("helm.toolkit.fluxcd.io/name", "helm.toolkit.fluxcd.io/namespace", "HelmRelease"),
];

#[async_trait]
impl Extractor for FluxManagedReverseExtractor {
    fn name(&self) -> &'static str {
        "flux-managed-reverse"
    }

    fn priority(&self) -> i32 {
        40
    }

    fn matches(&self, event: &Event) -> bool {
        matches!(event.event_type, EventType::Create)
            && !matches!(event.resource.kind.as_str(), "HelmRelease" | "Kustomization")
            && FLUX_LABEL_PAIRS.iter().any(|(name_key, ns_key, _)| event.resource.labels.contains_key(*name_key) && event.resource.labels.contains_key(*ns_key))
    }

    async fn extract_relationships(&self, event: &Event, lookup: &dyn GraphLookup) -> Vec<Edge> {
        if lookup.has_incoming_owns(&event.resource.uid).await {
            return Vec::new();
        }

        for (name_key, ns_key, controller_kind) in FLUX_LABEL_PAIRS {
            let (Some(name), Some(namespace)) = (event.resource.labels.get(*name_key), event.resource.labels.get(*ns_key)) else { continue };
            let Some(controller) = lookup.find_by_coordinates(Some(namespace), controller_kind, name).await else { continue };
            if controller.last_seen > event.timestamp {
                // Controller wasn't synced first; defer to a future event.
                continue;
            }
            let scorer = management_scorer();
            let reconcile = lookup.reconcile_event_near(&controller.uid, event.timestamp, scorer.window_ms).await;
            let resource_identity = spectre_types::ResourceIdentityNode {
                uid: event.resource.uid.clone(),
                kind: event.resource.kind.clone(),
                api_group: event.resource.api_group.clone(),
                version: event.resource.version.clone(),
                namespace: event.resource.namespace.clone(),
                name: event.resource.name.clone(),
                labels: event.resource.labels.clone(),
                first_seen: event.timestamp,
                last_seen: event.timestamp,
                deleted: false,
                deleted_at: None,
            };
            let (confidence, evidence) = scorer.score(&controller.name, &controller.namespace, &resource_identity, reconcile.as_ref());
            if confidence < MANAGES_THRESHOLD {
                continue;
            }
            return vec![Edge::Inferred {
                source: controller.uid,
                target: event.resource.uid.clone(),
                kind: InferredEdgeKind::Manages,
                confidence,
                evidence,
                first_observed: event.timestamp,
                last_validated: event.timestamp,
                validation_state: ValidationState::Valid,
            }];
        }
        Vec::new()
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
        candidates: Vec<ResourceIdentityNode>,
        owned_uids: Vec<String>,
        by_name: HashMap<(String, String), ResourceIdentityNode>,
    }

    #[async_trait]
    impl GraphLookup for FakeLookup {
        async fn find_by_coordinates(&self, _namespace: Option<&str>, kind: &str, name: &str) -> Option<ResourceIdentityNode> {
            self.by_name.get(&(kind.to_string(), name.to_string())).cloned()
        }
        async fn resources_by_namespace_kind(&self, _namespace: &str, kind: &str) -> Vec<ResourceIdentityNode> {
            self.candidates.iter().filter(|c| c.kind == kind).cloned().collect()
        }
        async fn resources_by_namespace(&self, _namespace: &str) -> Vec<ResourceIdentityNode> {
            self.candidates.clone()
        }
        async fn has_incoming_owns(&self, uid: &str) -> bool {
            self.owned_uids.contains(&uid.to_string())
        }
        async fn reconcile_event_near(&self, _controller_uid: &str, _around_ts: i64, _window_ms: i64) -> Option<ChangeEventNode> {
            None
        }
    }

    fn candidate(name: &str, kind: &str, ns: &str) -> ResourceIdentityNode {
        ResourceIdentityNode {
            uid: format!("uid-{name}"),
            kind: kind.into(),
            api_group: String::new(),
            version: "v1".into(),
            namespace: ns.into(),
            name: name.into(),
            labels: Default::default(),
            first_seen: 0,
            last_seen: 1000,
            deleted: false,
            deleted_at: None,
        }
    }

    fn helmrelease_event() -> Event {
        Event {
            id: "e1".into(),
            timestamp: 1000,
            event_type: EventType::Create,
            resource: ResourceMetadata { uid: "hr1".into(), kind: "HelmRelease".into(), api_group: "helm.toolkit.fluxcd.io".into(), namespace: "default".into(), name: "myrelease".into(), ..Default::default() },
            data: json!({}),
        }
    }

    #[rstest(tokio::test)]
    async fn test_helmrelease_manages_candidate_by_name_prefix() {
        let ext = HelmReleaseExtractor;
        let lookup = FakeLookup { candidates: vec![candidate("myrelease-app", "Deployment", "default")], owned_uids: vec![], by_name: HashMap::new() };
        let edges = ext.extract_relationships(&helmrelease_event(), &lookup).await;
        assert!(edges.iter().any(|e| matches!(e, Edge::Inferred { kind: InferredEdgeKind::Manages, .. }) && e.target_uid() == "uid-myrelease-app"));
    }

    #[rstest(tokio::test)]
    async fn test_helmrelease_never_manages_an_owned_resource() {
        let ext = HelmReleaseExtractor;
        let lookup = FakeLookup { candidates: vec![candidate("myrelease-app", "Deployment", "default")], owned_uids: vec!["uid-myrelease-app".into()], by_name: HashMap::new() };
        let edges = ext.extract_relationships(&helmrelease_event(), &lookup).await;
        assert!(edges.is_empty());
    }

    fn kustomization_event() -> Event {
        Event {
            id: "e3".into(),
            timestamp: 1000,
            event_type: EventType::Create,
            resource: ResourceMetadata {
                uid: "ks1".into(),
                kind: "Kustomization".into(),
                api_group: "kustomize.toolkit.fluxcd.io".into(),
                namespace: "flux-system".into(),
                name: "myapp".into(),
                ..Default::default()
            },
            data: json!({}),
        }
    }

    #[rstest(tokio::test)]
    async fn test_kustomization_manages_label_matched_owner_less_resource() {
        let ext = KustomizationExtractor;
        let mut managed = candidate("myapp-worker", "Deployment", "default");
        managed.labels = HashMap::from([
            ("kustomize.toolkit.fluxcd.io/name".to_string(), "myapp".to_string()),
            ("kustomize.toolkit.fluxcd.io/namespace".to_string(), "flux-system".to_string()),
        ]);
        let lookup = FakeLookup { candidates: vec![managed], owned_uids: vec![], by_name: HashMap::new() };
        let edges = ext.extract_relationships(&kustomization_event(), &lookup).await;
        assert!(edges.iter().any(|e| matches!(e, Edge::Inferred { kind: InferredEdgeKind::Manages, .. }) && e.target_uid() == "uid-myapp-worker"));
    }

    #[rstest(tokio::test)]
    async fn test_kustomization_skips_unlabeled_and_owned_resources() {
        let ext = KustomizationExtractor;
        let mut unlabeled = candidate("unrelated", "Deployment", "default");
        unlabeled.labels = HashMap::new();
        let mut owned = candidate("myapp-pod", "Deployment", "default");
        owned.labels = HashMap::from([
            ("kustomize.toolkit.fluxcd.io/name".to_string(), "myapp".to_string()),
            ("kustomize.toolkit.fluxcd.io/namespace".to_string(), "flux-system".to_string()),
        ]);
        let lookup = FakeLookup { candidates: vec![unlabeled, owned], owned_uids: vec!["uid-myapp-pod".to_string()], by_name: HashMap::new() };
        let edges = ext.extract_relationships(&kustomization_event(), &lookup).await;
        assert!(edges.iter().all(|e| !matches!(e, Edge::Inferred { kind: InferredEdgeKind::Manages, .. })));
    }

    #[rstest(tokio::test)]
    async fn test_reverse_extractor_creates_manages_when_controller_synced_first() {
        let ext = FluxManagedReverseExtractor;
        let mut by_name = HashMap::new();
        by_name.insert(("Kustomization".to_string(), "myapp".to_string()), ResourceIdentityNode { last_seen: 500, ..candidate("myapp", "Kustomization", "default") });

        let lookup = FakeLookup { candidates: vec![], owned_uids: vec![], by_name };
        let event = Event {
            id: "e2".into(),
            timestamp: 1000,
            event_type: EventType::Create,
            resource: ResourceMetadata {
                uid: "cm1".into(),
                kind: "ConfigMap".into(),
                namespace: "default".into(),
                name: "myapp-config".into(),
                labels: HashMap::from([
                    ("kustomize.toolkit.fluxcd.io/name".to_string(), "myapp".to_string()),
                    ("kustomize.toolkit.fluxcd.io/namespace".to_string(), "default".to_string()),
                ]),
                ..Default::default()
            },
            data: json!({}),
        };
        let edges = ext.extract_relationships(&event, &lookup).await;
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].source_uid(), "uid-myapp");
        assert_eq!(edges[0].target_uid(), "cm1");
    }
}
