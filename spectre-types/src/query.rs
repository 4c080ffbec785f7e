use serde::{Deserialize, Serialize};

use crate::event::{EventType, ResourceMetadata};
use crate::graph::EdgeKind;
use crate::resource::ResourceStatus;

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct TimelineFilters {
    pub kind: Option<String>,
    pub namespace: Option<String>,
    pub api_group: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct TimelineQuery {
    pub start_sec: i64,
    pub end_sec: i64,
    pub filters: TimelineFilters,
}

/// One row of a timeline query result: a `ChangeEvent` materialized with its
/// owning resource's identity (spec.md §4.4 "Result parsing and
/// marshalling" — "maps row tuples to Event with materialized Resource
/// metadata, preExisting, and the data JSON of the underlying change
/// event"). Deliberately not the ingest-path `Event` type: that one is the
/// storage wire format and has no `preExisting`/`status` concept.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct TimelineEvent {
    pub id: String,
    pub timestamp: i64,
    pub event_type: EventType,
    pub resource: ResourceMetadata,
    pub status: ResourceStatus,
    pub data: serde_json::Value,
    /// True for the first event returned for a resource when a pre-existing
    /// `ChangeEvent` anchor (timestamp before the query window) exists.
    pub pre_existing: bool,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct QueryEventsResult {
    pub events: Vec<TimelineEvent>,
    pub count: usize,
    pub execution_time_ms: f64,
    pub query_start_ns: i64,
    pub query_end_ns: i64,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct RootCauseQuery {
    pub resource_uid: String,
    pub failure_timestamp_ns: i64,
    pub max_depth: u32,
    pub min_confidence: f64,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct RootCauseCandidate {
    pub event_id: String,
    pub resource_uid: String,
    pub parent_resource_uid: Option<String>,
    pub impact_score: f64,
    pub timestamp: i64,
    /// Ordered `TRIGGERED_BY` edges walked to reach this candidate.
    pub triggered_by_chain: Vec<String>,
    pub manages_edge_confidence: Option<f64>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct BlastRadiusQuery {
    pub resource_uid: String,
    pub change_timestamp_ns: i64,
    pub time_window_ms: i64,
    pub relationship_types: Vec<EdgeKind>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ImpactedResource {
    pub impacted_uid: String,
    pub impact_event_id: String,
    pub impact_event_timestamp: i64,
    pub relationship_type: EdgeKind,
    pub distance: u32,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct BlastRadiusResult {
    pub impacted: Vec<ImpactedResource>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct TopologyEdge {
    pub kind: EdgeKind,
    pub other_uid: String,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct TopologyResult {
    pub resource_uid: String,
    pub outgoing: Vec<TopologyEdge>,
    pub incoming: Vec<TopologyEdge>,
}
