//! One-shot YAML config load, mirroring the teacher's `TracerConfig::load`
//! pattern (`sk-store::config`).

use std::fs::File;

use serde::{Deserialize, Serialize};
use spectre_graph::GraphConfig;
use spectre_store::StoreConfig;

fn default_server_port() -> u16 {
    8080
}

fn default_query_timeout_ms() -> u64 {
    5_000
}

fn default_file_retention_check_secs() -> u64 {
    3_600
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpectreConfig {
    pub store: StoreConfig,

    #[serde(default)]
    pub graph: GraphConfig,

    #[serde(default = "default_server_port")]
    pub server_port: u16,

    #[serde(default = "default_query_timeout_ms")]
    pub query_timeout_ms: u64,

    /// How often the retention jobs (`delete_old_files`,
    /// `cleanup_old_state_snapshots`) run, independent of the hour-file
    /// closer's own interval.
    #[serde(default = "default_file_retention_check_secs")]
    pub retention_check_secs: u64,
}

impl SpectreConfig {
    pub fn load(filename: &str) -> anyhow::Result<SpectreConfig> {
        Ok(serde_yaml::from_reader(File::open(filename)?)?)
    }

    pub fn query_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.query_timeout_ms)
    }

    pub fn retention_check_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.retention_check_secs)
    }
}
