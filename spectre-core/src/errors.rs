pub use anyhow::{anyhow, bail, ensure};
pub use thiserror::Error;

/// Shorthand used across the workspace for fallible operations with no payload,
/// mirroring how write-path operations in the spec surface validation/IO errors.
pub type EmptyResult = anyhow::Result<()>;
