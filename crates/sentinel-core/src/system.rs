use std::path::Path;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::model::CheckStatus;

/// Raw host metrics. Implemented for the real host in `sentinel-host`.
pub trait SystemStats: Send + Sync {
    /// Percentage of the filesystem containing `path` that is in use.
    fn disk_used_percent(&self, path: &Path) -> Result<f64>;

    fn memory_used_percent(&self) -> Result<f64>;

    /// Name of a running process matching `wanted` (see [`process_matches`]).
    fn find_process(&self, wanted: &str) -> Result<Option<String>>;
}

/// Case-insensitive prefix match, so `python` finds `python3`.
pub fn process_matches(name: &str, wanted: &str) -> bool {
    !name.is_empty() && name.to_lowercase().starts_with(&wanted.to_lowercase())
}

/// Percent levels at which a gauge turns WARN / CRIT (inclusive).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Threshold {
    pub warn: f64,
    pub crit: f64,
}

impl Threshold {
    pub const DISK: Threshold = Threshold { warn: 75.0, crit: 85.0 };
    pub const MEMORY: Threshold = Threshold { warn: 70.0, crit: 85.0 };

    pub fn classify(&self, percent: f64) -> CheckStatus {
        if percent >= self.crit {
            CheckStatus::Crit
        } else if percent >= self.warn {
            CheckStatus::Warn
        } else {
            CheckStatus::Ok
        }
    }
}

/// Canned metrics for tests. A `None` gauge reports a read error.
#[derive(Clone, Debug, Default)]
pub struct FixedStats {
    pub disk: Option<f64>,
    pub memory: Option<f64>,
    pub processes: Vec<String>,
}

impl FixedStats {
    pub fn healthy(process: &str) -> Self {
        Self { disk: Some(40.0), memory: Some(35.0), processes: vec![process.to_string()] }
    }
}

impl SystemStats for FixedStats {
    fn disk_used_percent(&self, path: &Path) -> Result<f64> {
        self.disk.ok_or_else(|| anyhow!("no disk stats for {}", path.display()))
    }

    fn memory_used_percent(&self) -> Result<f64> {
        self.memory.ok_or_else(|| anyhow!("no memory stats"))
    }

    fn find_process(&self, wanted: &str) -> Result<Option<String>> {
        Ok(self.processes.iter().find(|p| process_matches(p, wanted)).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thresholds_are_inclusive() {
        let t = Threshold::DISK;
        assert_eq!(t.classify(74.9), CheckStatus::Ok);
        assert_eq!(t.classify(75.0), CheckStatus::Warn);
        assert_eq!(t.classify(84.99), CheckStatus::Warn);
        assert_eq!(t.classify(85.0), CheckStatus::Crit);
        assert_eq!(Threshold::MEMORY.classify(70.0), CheckStatus::Warn);
    }

    #[test]
    fn process_prefix_match() {
        assert!(process_matches("python3.12", "Python"));
        assert!(process_matches("nginx", "nginx"));
        assert!(!process_matches("nginx", "nginx-worker"));
        assert!(!process_matches("", ""));
    }
}
