use std::time::Duration;
use serde::{Deserialize, Serialize};

use crate::device::constants::SCAN_DURATION_SECS;

fn default_scan_duration_secs() -> u64 {
    SCAN_DURATION_SECS
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default = "default_scan_duration_secs")]
    pub scan_duration_secs: u64,

    // substring of the adapter info, e.g. "hci1"; the first adapter is used if unset
    #[serde(default)]
    pub adapter: Option<String>,
}

impl Config {
    pub fn scan_duration(&self) -> Duration {
        // a zero length scan would end before the first advertisement could arrive
        Duration::from_secs(self.scan_duration_secs.max(1))
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            scan_duration_secs: SCAN_DURATION_SECS,
            adapter: None,
        }
    }
}
