//! Startup schema initialization (spec.md §4.2): a fixed list of index
//! statements for the graph's primary keys, applied once at client
//! construction. The embedded graph backs these indices with plain hash maps
//! rather than a driver round-trip, so `initialize` can't fail on an
//! already-existing index the way a real graph database's driver would —
//! that "ignore already-exists" behavior is preserved here only as a no-op,
//! for parity with the statements a networked backend would be given.

pub const INDEX_STATEMENTS: &[&str] = &[
    "CREATE INDEX resource_uid IF NOT EXISTS FOR (r:ResourceIdentity) ON (r.uid)",
    "CREATE INDEX resource_namespace_kind IF NOT EXISTS FOR (r:ResourceIdentity) ON (r.namespace, r.kind)",
    "CREATE INDEX change_event_id IF NOT EXISTS FOR (e:ChangeEvent) ON (e.id)",
    "CREATE INDEX change_event_timestamp IF NOT EXISTS FOR (e:ChangeEvent) ON (e.timestamp)",
    "CREATE INDEX k8s_event_id IF NOT EXISTS FOR (e:K8sEvent) ON (e.id)",
];

pub fn initialize() {
    for stmt in INDEX_STATEMENTS {
        tracing::debug!(statement = *stmt, "applying schema statement");
    }
}
