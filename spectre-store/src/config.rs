use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

fn default_close_after_idle_secs() -> u64 {
    2 * 3600
}

fn default_closer_interval_secs() -> u64 {
    5 * 60
}

fn default_max_file_age_hours() -> i64 {
    24 * 30
}

fn default_max_state_snapshot_age_days() -> i64 {
    30
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct StoreConfig {
    pub data_dir: PathBuf,

    #[serde(default = "default_close_after_idle_secs")]
    pub close_after_idle_secs: u64,

    #[serde(default = "default_closer_interval_secs")]
    pub closer_interval_secs: u64,

    #[serde(default = "default_max_file_age_hours")]
    pub max_file_age_hours: i64,

    #[serde(default = "default_max_state_snapshot_age_days")]
    pub max_state_snapshot_age_days: i64,
}

impl StoreConfig {
    pub fn close_after_idle(&self) -> Duration {
        Duration::from_secs(self.close_after_idle_secs)
    }

    pub fn closer_interval(&self) -> Duration {
        Duration::from_secs(self.closer_interval_secs)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            data_dir: PathBuf::from("./data"),
            close_after_idle_secs: default_close_after_idle_secs(),
            closer_interval_secs: default_closer_interval_secs(),
            max_file_age_hours: default_max_file_age_hours(),
            max_state_snapshot_age_days: default_max_state_snapshot_age_days(),
        }
    }
}
