//! The data model shared by the store, graph, extractor, and query crates.
//! Mirrors the role `sk-api` plays for SimKube: pure data, no behavior beyond
//! small, total helper methods.

mod event;
mod graph;
mod query;
mod resource;

pub use event::{Event, EventType, ResourceMetadata};
pub use graph::{
    ChangeEventNode, Edge, EdgeKind, EvidenceItem, EvidenceKind, InferredEdgeKind, K8sEventNode, ResourceIdentityNode,
    ValidationState,
};
pub use query::{
    BlastRadiusQuery, BlastRadiusResult, ImpactedResource, QueryEventsResult, RootCauseCandidate, RootCauseQuery,
    TimelineEvent, TimelineFilters, TimelineQuery, TopologyEdge, TopologyResult,
};
pub use resource::{K8sEvent, Resource, ResourceLastState, ResourceStatus, StatusSegment};
