use serde::{Deserialize, Serialize};

use crate::event::{EventType, ResourceMetadata};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub enum ResourceStatus {
    Ready,
    Warning,
    Error,
    Terminating,
    Unknown,
}

/// Derived from contiguous events for a single resource (spec.md §3).
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct StatusSegment {
    pub start_time: i64,
    pub end_time: i64,
    pub status: ResourceStatus,
    pub message: String,
    pub resource_data: serde_json::Value,
}

/// A Kubernetes `Event` object attached to the resource it is about.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct K8sEvent {
    pub timestamp: i64,
    pub reason: String,
    pub message: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub count: i32,
    pub source: String,
}

/// The UI-facing aggregate: one resource's full observed history.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Resource {
    pub id: String,
    pub group: String,
    pub version: String,
    pub kind: String,
    pub namespace: String,
    pub name: String,
    pub status_segments: Vec<StatusSegment>,
    pub events: Vec<K8sEvent>,
    pub pre_existing: bool,
}

/// Carryover record: the last non-deleted event seen for a resource in a
/// closing hour-file (spec.md §3 "ResourceLastState (carryover)").
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct ResourceLastState {
    pub event_type: EventType,
    pub timestamp: i64,
    pub data: serde_json::Value,
    /// Carried alongside `data` so a `state-<uid>` snapshot synthesized at
    /// the next hour's start can still be matched by `kind`/`namespace`/
    /// `apiGroup` filters without re-parsing `data`.
    pub resource: ResourceMetadata,
}
