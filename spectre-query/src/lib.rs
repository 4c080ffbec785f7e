//! Spectre's query engine: the timeline/root-cause/blast-radius surface over
//! [`spectre_graph`], plus the UI resource builder that runs directly over
//! ingest-path events (spec.md §4.4-4.5).

mod blast_radius;
mod resource_builder;
mod root_cause;
mod timeline;
mod topology;

pub use blast_radius::blast_radius_query;
pub use resource_builder::{attach_k8s_events, build_resources_from_events, infer_status};
pub use root_cause::root_cause_query;
pub use timeline::timeline_query;
pub use topology::topology_query;
