//! Dispatches one event to every matching extractor, in priority order
//! (spec.md §4.3 "Pipeline dispatch"). Reconciliation of the resulting edges
//! against what's already stored (explicit overwrites, inferred edges
//! confidence-gated) lives in `spectre_graph::GraphData::upsert_edge` — the
//! pipeline only produces candidates.

use spectre_graph::GraphLookup;
use spectre_types::{Edge, Event};

use crate::extractor::Extractor;

pub struct Pipeline {
    extractors: Vec<Box<dyn Extractor>>,
}

impl Pipeline {
    pub fn new(mut extractors: Vec<Box<dyn Extractor>>) -> Self {
        extractors.sort_by_key(|e| e.priority());
        Pipeline { extractors }
    }

    pub async fn dispatch(&self, event: &Event, lookup: &dyn GraphLookup) -> Vec<Edge> {
        let mut edges = Vec::new();
        for extractor in &self.extractors {
            if !extractor.matches(event) {
                continue;
            }
            let produced = extractor.extract_relationships(event, lookup).await;
            tracing::debug!(extractor = extractor.name(), count = produced.len(), event_id = %event.id, "extractor produced edges");
            edges.extend(produced);
        }
        edges
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use rstest::*;
    use spectre_types::{ChangeEventNode, EventType, ResourceIdentityNode, ResourceMetadata};

    use super::*;

    struct FakeLookup;

    #[async_trait]
    impl GraphLookup for FakeLookup {
        async fn find_by_coordinates(&self, _namespace: Option<&str>, _kind: &str, _name: &str) -> Option<ResourceIdentityNode> {
            None
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

    struct Low;
    struct High;

    #[async_trait]
    impl Extractor for Low {
        fn name(&self) -> &'static str {
            "low"
        }
        fn priority(&self) -> i32 {
            0
        }
        fn matches(&self, _event: &Event) -> bool {
            true
        }
        async fn extract_relationships(&self, event: &Event, _lookup: &dyn GraphLookup) -> Vec<Edge> {
            vec![Edge::Owns { source: "low".into(), target: event.resource.uid.clone(), controller: true, block_owner_deletion: true }]
        }
    }

    #[async_trait]
    impl Extractor for High {
        fn name(&self) -> &'static str {
            "high"
        }
        fn priority(&self) -> i32 {
            100
        }
        fn matches(&self, _event: &Event) -> bool {
            true
        }
        async fn extract_relationships(&self, event: &Event, _lookup: &dyn GraphLookup) -> Vec<Edge> {
            vec![Edge::Owns { source: "high".into(), target: event.resource.uid.clone(), controller: true, block_owner_deletion: true }]
        }
    }

    fn event() -> Event {
        Event {
            id: "e1".into(),
            timestamp: 0,
            event_type: EventType::Create,
            resource: ResourceMetadata { uid: "r1".into(), ..Default::default() },
            data: serde_json::json!({}),
        }
    }

    #[rstest(tokio::test)]
    async fn test_dispatch_runs_in_priority_order() {
        let pipeline = Pipeline::new(vec![Box::new(High), Box::new(Low)]);
        let edges = pipeline.dispatch(&event(), &FakeLookup).await;
        assert_eq!(edges[0].source_uid(), "low");
        assert_eq!(edges[1].source_uid(), "high");
    }
}
