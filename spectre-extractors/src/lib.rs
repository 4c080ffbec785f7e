mod extractor;
mod flux;
mod pipeline;
mod rbac;
mod scorer;
mod secret;
mod workload;

pub use extractor::Extractor;
pub use flux::{FluxManagedReverseExtractor, GitRepositoryExtractor, HelmReleaseExtractor, KustomizationExtractor};
pub use pipeline::Pipeline;
pub use rbac::RbacExtractor;
pub use scorer::{ManagementScorer, ManagementWeights, SecretRelationshipScorer, SecretRelationshipWeights, SecretSignals};
pub use secret::SecretRelationshipExtractor;
pub use workload::{NodeSchedulingExtractor, OwnerReferenceExtractor, ServiceAccountExtractor};

/// The default extractor set a Spectre instance wires up at startup, in no
/// particular order (the pipeline itself sorts by priority).
pub fn default_extractors() -> Vec<Box<dyn Extractor>> {
    vec![
        Box::new(OwnerReferenceExtractor),
        Box::new(ServiceAccountExtractor),
        Box::new(NodeSchedulingExtractor),
        Box::new(RbacExtractor),
        Box::new(HelmReleaseExtractor),
        Box::new(KustomizationExtractor),
        Box::new(GitRepositoryExtractor),
        Box::new(FluxManagedReverseExtractor),
        Box::new(SecretRelationshipExtractor),
    ]
}
