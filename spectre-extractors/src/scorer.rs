//! Reusable confidence scorers (spec.md §4.3 "Scorers"). Pure functions over
//! already-extracted signals; the extractors that use them are responsible
//! for reading those signals out of the raw event JSON.

use spectre_types::{ChangeEventNode, EvidenceItem, EvidenceKind, ResourceIdentityNode};

const NANOS_PER_MS: i64 = 1_000_000;

#[derive(Clone, Copy, Debug)]
pub struct ManagementWeights {
    pub name_prefix: f64,
    pub namespace: f64,
    pub temporal: f64,
    pub reconcile: f64,
}

impl Default for ManagementWeights {
    fn default() -> Self {
        ManagementWeights { name_prefix: 0.4, namespace: 0.2, temporal: 0.2, reconcile: 0.2 }
    }
}

/// Used by the Flux HelmRelease/Kustomization extractors and the generic
/// managed-resource reverse extractor to score "does the controller manage
/// this candidate resource".
pub struct ManagementScorer {
    pub weights: ManagementWeights,
    pub window_ms: i64,
}

impl ManagementScorer {
    pub fn score(
        &self,
        controller_name: &str,
        controller_namespace: &str,
        candidate: &ResourceIdentityNode,
        reconcile_event: Option<&ChangeEventNode>,
    ) -> (f64, Vec<EvidenceItem>) {
        let mut score = 0.0;
        let mut evidence = Vec::new();

        if candidate.name.starts_with(controller_name) {
            score += self.weights.name_prefix;
            evidence.push(EvidenceItem {
                kind: EvidenceKind::NamePattern,
                value: format!("{} starts with {controller_name}", candidate.name),
                weight: self.weights.name_prefix,
                observed_at: candidate.last_seen,
            });
        }

        if candidate.namespace == controller_namespace {
            score += self.weights.namespace;
            evidence.push(EvidenceItem {
                kind: EvidenceKind::Namespace,
                value: candidate.namespace.clone(),
                weight: self.weights.namespace,
                observed_at: candidate.last_seen,
            });
        }

        if let Some(reconcile) = reconcile_event {
            let window_ns = self.window_ms * NANOS_PER_MS;
            let lag = (candidate.last_seen - reconcile.timestamp).abs();
            if lag <= window_ns && window_ns > 0 {
                let temporal = (1.0 - lag as f64 / window_ns as f64).max(0.0);
                score += self.weights.temporal * temporal;
                evidence.push(EvidenceItem {
                    kind: EvidenceKind::Temporal,
                    value: format!("lag_ms={}", lag / NANOS_PER_MS),
                    weight: self.weights.temporal * temporal,
                    observed_at: candidate.last_seen,
                });
                score += self.weights.reconcile;
                evidence.push(EvidenceItem {
                    kind: EvidenceKind::Reconcile,
                    value: reconcile.id.clone(),
                    weight: self.weights.reconcile,
                    observed_at: reconcile.timestamp,
                });
            }
        }

        (score.clamp(0.0, 1.0), evidence)
    }
}

#[derive(Clone, Copy, Debug)]
pub struct SecretRelationshipWeights {
    pub exact_name: f64,
    pub name_pattern: f64,
    pub annotation: f64,
    pub label: f64,
    pub temporal: f64,
    pub namespace: f64,
}

impl Default for SecretRelationshipWeights {
    fn default() -> Self {
        SecretRelationshipWeights { exact_name: 0.3, name_pattern: 0.2, annotation: 0.25, label: 0.1, temporal: 0.1, namespace: 0.05 }
    }
}

/// Signals an extractor has already pulled out of the source object and the
/// candidate secret. Kept as plain booleans/options rather than raw JSON so
/// the scorer itself stays total and side-effect free.
#[derive(Clone, Debug, Default)]
pub struct SecretSignals {
    pub exact_name_match: bool,
    pub name_pattern_match: bool,
    pub annotation_match: bool,
    pub label_match: bool,
    pub same_namespace: bool,
    pub temporal_lag_ms: Option<i64>,
    /// `Some(true)` if the source object has a `Ready=True` status condition.
    pub source_ready: Option<bool>,
    pub observed_at: i64,
}

/// Used by cert-manager/external-secrets-like flows to score a candidate
/// Secret against the object referencing it.
pub struct SecretRelationshipScorer {
    pub weights: SecretRelationshipWeights,
    pub window_ms: i64,
    /// When set, temporal evidence only counts if `source_ready == Some(true)`.
    pub require_ready: bool,
}

impl SecretRelationshipScorer {
    pub fn score(&self, s: &SecretSignals) -> (f64, Vec<EvidenceItem>) {
        let w = &self.weights;
        let mut score = 0.0;
        let mut evidence = Vec::new();

        if s.exact_name_match {
            score += w.exact_name;
            evidence.push(EvidenceItem { kind: EvidenceKind::NamePattern, value: "exact name match".into(), weight: w.exact_name, observed_at: s.observed_at });
        }
        if s.name_pattern_match {
            score += w.name_pattern;
            evidence.push(EvidenceItem { kind: EvidenceKind::NamePattern, value: "name pattern match".into(), weight: w.name_pattern, observed_at: s.observed_at });
        }
        if s.annotation_match {
            score += w.annotation;
            evidence.push(EvidenceItem { kind: EvidenceKind::Annotation, value: "annotation match".into(), weight: w.annotation, observed_at: s.observed_at });
        }
        if s.label_match {
            score += w.label;
            evidence.push(EvidenceItem { kind: EvidenceKind::Label, value: "label match".into(), weight: w.label, observed_at: s.observed_at });
        }
        if s.same_namespace {
            score += w.namespace;
            evidence.push(EvidenceItem { kind: EvidenceKind::Namespace, value: "same namespace".into(), weight: w.namespace, observed_at: s.observed_at });
        }
        if let Some(lag_ms) = s.temporal_lag_ms {
            let ready_ok = !self.require_ready || s.source_ready == Some(true);
            if ready_ok && self.window_ms > 0 {
                let t = (1.0 - lag_ms.abs() as f64 / self.window_ms as f64).max(0.0);
                score += w.temporal * t;
                evidence.push(EvidenceItem { kind: EvidenceKind::Temporal, value: format!("lag_ms={lag_ms}"), weight: w.temporal * t, observed_at: s.observed_at });
            } else if !ready_ok {
                evidence.push(EvidenceItem { kind: EvidenceKind::ReadyCondition, value: "source not Ready, temporal evidence withheld".into(), weight: 0.0, observed_at: s.observed_at });
            }
        }

        (score.clamp(0.0, 1.0), evidence)
    }
}

#[cfg(test)]
mod tests {
    use rstest::*;

    use super::*;

    fn candidate(name: &str, ns: &str, last_seen: i64) -> ResourceIdentityNode {
        ResourceIdentityNode {
            uid: format!("uid-{name}"),
            kind: "Deployment".into(),
            api_group: "apps".into(),
            version: "v1".into(),
            namespace: ns.into(),
            name: name.into(),
            labels: Default::default(),
            first_seen: last_seen,
            last_seen,
            deleted: false,
            deleted_at: None,
        }
    }

    #[rstest]
    fn test_management_scorer_combines_signals() {
        let scorer = ManagementScorer { weights: ManagementWeights::default(), window_ms: 60_000 };
        let (score, evidence) = scorer.score("release", "default", &candidate("release-app", "default", 1000), None);
        assert!(score > 0.0);
        assert_eq!(evidence.len(), 2);
    }

    #[rstest]
    fn test_management_scorer_clamped() {
        let weights = ManagementWeights { name_prefix: 1.0, namespace: 1.0, temporal: 1.0, reconcile: 1.0 };
        let scorer = ManagementScorer { weights, window_ms: 60_000 };
        let (score, _) = scorer.score("release", "default", &candidate("release-app", "default", 1000), None);
        assert_eq!(score, 1.0);
    }

    #[rstest]
    fn test_secret_scorer_ready_gate_withholds_temporal() {
        let scorer = SecretRelationshipScorer {
            weights: SecretRelationshipWeights { temporal: 0.5, ..Default::default() },
            window_ms: 1000,
            require_ready: true,
        };
        let signals = SecretSignals { temporal_lag_ms: Some(10), source_ready: Some(false), ..Default::default() };
        let (score, evidence) = scorer.score(&signals);
        assert_eq!(score, 0.0);
        assert!(evidence.iter().any(|e| e.kind == EvidenceKind::ReadyCondition));
    }
}
