//! `FindResourceTopology` (spec.md §6): the one-hop neighborhood of a
//! resource, for UI topology display.

use spectre_graph::GraphClient;
use spectre_types::{TopologyEdge, TopologyResult};

pub async fn topology_query(graph: &GraphClient, resource_uid: &str) -> TopologyResult {
    let outgoing = graph.outgoing(resource_uid, None).await.into_iter().map(|e| TopologyEdge { kind: e.kind(), other_uid: e.target_uid().to_string() }).collect();
    let incoming = graph.incoming(resource_uid, None).await.into_iter().map(|e| TopologyEdge { kind: e.kind(), other_uid: e.source_uid().to_string() }).collect();
    TopologyResult { resource_uid: resource_uid.to_string(), outgoing, incoming }
}

#[cfg(test)]
mod tests {
    use rstest::*;
    use spectre_graph::GraphConfig;
    use spectre_types::EdgeKind;

    use super::*;

    #[rstest(tokio::test)]
    async fn test_topology_lists_both_directions() {
        let graph = GraphClient::new(GraphConfig::default());
        graph.create_owns_edge("deploy", "pod", true, true, 0).await;

        let deploy_topology = topology_query(&graph, "deploy").await;
        assert_eq!(deploy_topology.outgoing.len(), 1);
        assert_eq!(deploy_topology.outgoing[0].kind, EdgeKind::Owns);
        assert_eq!(deploy_topology.outgoing[0].other_uid, "pod");

        let pod_topology = topology_query(&graph, "pod").await;
        assert_eq!(pod_topology.incoming.len(), 1);
        assert_eq!(pod_topology.incoming[0].other_uid, "deploy");
    }
}
