use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Prefix marking a synthetic carryover snapshot event (spec.md §4.1: "Consumers
/// see them as synthetic `state-<uid>` events").
pub const STATE_EVENT_ID_PREFIX: &str = "state-";

#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventType {
    Create,
    Update,
    Delete,
}

/// Identity + coordinates of the Kubernetes object a change relates to.
#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceMetadata {
    pub uid: String,
    pub kind: String,
    pub api_group: String,
    pub version: String,
    pub namespace: String,
    pub name: String,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    /// Only set for Kubernetes `Event` objects: the UID of the object the event
    /// is about.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub involved_object_uid: Option<String>,
}

impl ResourceMetadata {
    pub fn namespaced_name(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }

    pub fn is_k8s_event(&self) -> bool {
        self.kind == "Event"
    }

    /// `(apiGroup, version, kind)` triple used as the dimension keys for the
    /// inverted index and graph identity lookups.
    pub fn gvk(&self) -> (&str, &str, &str) {
        (&self.api_group, &self.version, &self.kind)
    }
}

/// A single immutable ingress event (spec.md §3 "Event (immutable, append-only)").
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Event {
    pub id: String,
    pub timestamp: i64,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub resource: ResourceMetadata,
    /// Canonical JSON of the observed object.
    pub data: serde_json::Value,
}

impl Event {
    pub fn is_pre_existing_snapshot(&self) -> bool {
        self.id.starts_with(STATE_EVENT_ID_PREFIX)
    }

    pub fn state_event_id(uid: &str) -> String {
        format!("{STATE_EVENT_ID_PREFIX}{uid}")
    }
}

#[cfg(test)]
mod tests {
    use rstest::*;

    use super::*;

    #[rstest]
    fn test_pre_existing_prefix() {
        let ev = Event {
            id: Event::state_event_id("p1"),
            timestamp: 0,
            event_type: EventType::Create,
            resource: ResourceMetadata::default(),
            data: serde_json::Value::Null,
        };
        assert!(ev.is_pre_existing_snapshot());
    }
}
