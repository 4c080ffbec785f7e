use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// `ResourceIdentity` node (spec.md §3 graph nodes table).
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct ResourceIdentityNode {
    pub uid: String,
    pub kind: String,
    pub api_group: String,
    pub version: String,
    pub namespace: String,
    pub name: String,
    pub labels: HashMap<String, String>,
    pub first_seen: i64,
    pub last_seen: i64,
    pub deleted: bool,
    pub deleted_at: Option<i64>,
}

/// Immutable `ChangeEvent` node.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct ChangeEventNode {
    pub id: String,
    pub timestamp: i64,
    pub event_type: crate::event::EventType,
    pub status: crate::resource::ResourceStatus,
    pub error_message: Option<String>,
    pub container_issues: Vec<String>,
    pub config_changed: bool,
    pub status_changed: bool,
    pub replicas_changed: bool,
    pub impact_score: f64,
    pub data: serde_json::Value,
}

/// `K8sEvent` node.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct K8sEventNode {
    pub id: String,
    pub timestamp: i64,
    pub reason: String,
    pub message: String,
    pub event_type: String,
    pub count: i32,
    pub source: String,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub enum ValidationState {
    Valid,
    Stale,
    Invalid,
    Pending,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub enum EvidenceKind {
    Label,
    Namespace,
    Temporal,
    Reconcile,
    NamePattern,
    Annotation,
    ReadyCondition,
}

/// One signal contributing to an inferred edge's confidence score.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct EvidenceItem {
    pub kind: EvidenceKind,
    pub value: String,
    pub weight: f64,
    pub observed_at: i64,
}

/// The three inferred-relationship variants (spec.md §9 design note: "Inferred
/// edges as sum types" — each carries only the fields its kind needs).
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub enum InferredEdgeKind {
    Manages,
    Annotates { annotation_key: String },
    CreatesObserved,
}

/// A non-parameterized name for an edge, used as the merge key's discriminant
/// (spec.md invariant: "All upserts use merge semantics on node/edge key").
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Deserialize, Serialize)]
pub enum EdgeKind {
    Owns,
    Changed,
    PrecededBy,
    TriggeredBy,
    Selects,
    ScheduledOn,
    UsesServiceAccount,
    BindsRole,
    GrantsTo,
    ReferencesSpec,
    Manages,
    Annotates,
    CreatesObserved,
}

/// Every edge kind the graph projection produces (spec.md §3 "Graph edges").
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub enum Edge {
    Owns { source: String, target: String, controller: bool, block_owner_deletion: bool },
    Changed { source: String, target: String, sequence: u64 },
    PrecededBy { source: String, target: String, duration_ms: i64 },
    TriggeredBy { source: String, target: String, confidence: f64, lag_ms: i64, reason: String },
    Selects { source: String, target: String, selector_labels: HashMap<String, String> },
    ScheduledOn { source: String, target: String, scheduled_at: i64, terminated_at: Option<i64> },
    UsesServiceAccount { source: String, target: String },
    BindsRole { source: String, target: String },
    GrantsTo { source: String, target: String, subject_kind: String },
    ReferencesSpec { source: String, target: String, field_path: String },
    Inferred {
        source: String,
        target: String,
        kind: InferredEdgeKind,
        confidence: f64,
        evidence: Vec<EvidenceItem>,
        first_observed: i64,
        last_validated: i64,
        validation_state: ValidationState,
    },
}

impl Edge {
    pub fn source_uid(&self) -> &str {
        match self {
            Edge::Owns { source, .. }
            | Edge::Changed { source, .. }
            | Edge::PrecededBy { source, .. }
            | Edge::TriggeredBy { source, .. }
            | Edge::Selects { source, .. }
            | Edge::ScheduledOn { source, .. }
            | Edge::UsesServiceAccount { source, .. }
            | Edge::BindsRole { source, .. }
            | Edge::GrantsTo { source, .. }
            | Edge::ReferencesSpec { source, .. }
            | Edge::Inferred { source, .. } => source,
        }
    }

    pub fn target_uid(&self) -> &str {
        match self {
            Edge::Owns { target, .. }
            | Edge::Changed { target, .. }
            | Edge::PrecededBy { target, .. }
            | Edge::TriggeredBy { target, .. }
            | Edge::Selects { target, .. }
            | Edge::ScheduledOn { target, .. }
            | Edge::UsesServiceAccount { target, .. }
            | Edge::BindsRole { target, .. }
            | Edge::GrantsTo { target, .. }
            | Edge::ReferencesSpec { target, .. }
            | Edge::Inferred { target, .. } => target,
        }
    }

    pub fn kind(&self) -> EdgeKind {
        match self {
            Edge::Owns { .. } => EdgeKind::Owns,
            Edge::Changed { .. } => EdgeKind::Changed,
            Edge::PrecededBy { .. } => EdgeKind::PrecededBy,
            Edge::TriggeredBy { .. } => EdgeKind::TriggeredBy,
            Edge::Selects { .. } => EdgeKind::Selects,
            Edge::ScheduledOn { .. } => EdgeKind::ScheduledOn,
            Edge::UsesServiceAccount { .. } => EdgeKind::UsesServiceAccount,
            Edge::BindsRole { .. } => EdgeKind::BindsRole,
            Edge::GrantsTo { .. } => EdgeKind::GrantsTo,
            Edge::ReferencesSpec { .. } => EdgeKind::ReferencesSpec,
            Edge::Inferred { kind: InferredEdgeKind::Manages, .. } => EdgeKind::Manages,
            Edge::Inferred { kind: InferredEdgeKind::Annotates { .. }, .. } => EdgeKind::Annotates,
            Edge::Inferred { kind: InferredEdgeKind::CreatesObserved, .. } => EdgeKind::CreatesObserved,
        }
    }

    pub fn confidence(&self) -> f64 {
        match self {
            Edge::TriggeredBy { confidence, .. } | Edge::Inferred { confidence, .. } => *confidence,
            _ => 1.0,
        }
    }

    /// True for `MANAGES`/`ANNOTATES`/`CREATES_OBSERVED` — the edges that carry
    /// provenance and are reconciled by confidence rather than overwritten.
    pub fn is_inferred(&self) -> bool {
        matches!(self, Edge::Inferred { .. })
    }
}
