mod cache;
mod client;
mod config;
mod errors;
mod schema;
mod store;

pub use cache::CacheStats;
pub use client::{shared, GraphClient, GraphLookup, SharedGraphClient};
pub use config::GraphConfig;
pub use errors::{GraphError, GraphResult};
pub use store::GraphData;
