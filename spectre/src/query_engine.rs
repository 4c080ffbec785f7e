//! Wraps `spectre-query`'s functions with spec.md §5's `timeoutMs`
//! enforcement, deferred here per that crate's own design note rather than
//! duplicated per query function. Also the "query engine" component the
//! lifecycle manager owns as a first-class Start/Stop value (spec.md §9
//! "Global mutable state -> lifecycle-owned components").

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use spectre_graph::GraphClient;
use spectre_types::{BlastRadiusQuery, BlastRadiusResult, QueryEventsResult, RootCauseCandidate, RootCauseQuery, TimelineQuery, TopologyResult};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueryEngineError {
    #[error("query exceeded the {0:?} timeout")]
    Timeout(Duration),
}

pub struct QueryEngine {
    graph: Arc<GraphClient>,
    timeout: Duration,
}

impl QueryEngine {
    pub fn new(graph: Arc<GraphClient>, timeout: Duration) -> Self {
        QueryEngine { graph, timeout }
    }

    pub async fn timeline(&self, query: &TimelineQuery) -> Result<QueryEventsResult, QueryEngineError> {
        self.bounded(spectre_query::timeline_query(&self.graph, query)).await
    }

    pub async fn topology(&self, resource_uid: &str) -> Result<TopologyResult, QueryEngineError> {
        self.bounded(spectre_query::topology_query(&self.graph, resource_uid)).await
    }

    pub async fn root_cause(&self, query: &RootCauseQuery) -> Result<Vec<RootCauseCandidate>, QueryEngineError> {
        self.bounded(spectre_query::root_cause_query(&self.graph, query)).await
    }

    pub async fn blast_radius(&self, query: &BlastRadiusQuery) -> Result<BlastRadiusResult, QueryEngineError> {
        self.bounded(spectre_query::blast_radius_query(&self.graph, query)).await
    }

    async fn bounded<T>(&self, fut: impl Future<Output = T>) -> Result<T, QueryEngineError> {
        tokio::time::timeout(self.timeout, fut).await.map_err(|_| QueryEngineError::Timeout(self.timeout))
    }
}
