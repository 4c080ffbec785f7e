//! The extractor contract itself (spec.md §4.3).

use async_trait::async_trait;
use spectre_graph::GraphLookup;
use spectre_types::{Edge, Event};

#[async_trait]
pub trait Extractor: Send + Sync {
    fn name(&self) -> &'static str;

    /// Lower runs first.
    fn priority(&self) -> i32;

    /// Cheap filter, typically `apiGroup` + `kind`.
    fn matches(&self, event: &Event) -> bool;

    async fn extract_relationships(&self, event: &Event, lookup: &dyn GraphLookup) -> Vec<Edge>;
}
