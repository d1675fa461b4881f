//! Per-mount usage limits and the reporting hysteresis.
//!
//! Only mounts with a configured limit are reported. While a mount is over its
//! limit it is reported on every probe, since listeners have no way to query
//! and may have missed the first report. A return below the limit is reported
//! once, and also once for the first evaluation after start-up.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::ProbeResult;

/// Maximum tolerated usage for one mount point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageLimit {
    pub mount_point: String,
    pub max_usage_percent: u8,
}

impl UsageLimit {
    pub fn new(mount_point: impl Into<String>, max_usage_percent: u8) -> Self {
        Self {
            mount_point: mount_point.into(),
            max_usage_percent,
        }
    }
}

/// Limits applied when none are configured.
pub fn default_usage_limits() -> Vec<UsageLimit> {
    vec![
        UsageLimit::new("/", 90),
        UsageLimit::new("/tmp", 70),
        UsageLimit::new("/run", 70),
        UsageLimit::new("/home", 90),
    ]
}

/// Last state reported for a mount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DiskSpaceState {
    /// Nothing reported yet.
    #[default]
    Undefined,
    Normal,
    Warning,
}

/// Raw size information for a mounted filesystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountUsage {
    pub mount_point: String,
    pub total_bytes: u64,
    pub available_bytes: u64,
}

impl MountUsage {
    /// Percentage of capacity in use, rounded to the nearest integer.
    ///
    /// Returns `None` for filesystems that report no capacity.
    pub fn used_percent(&self) -> Option<u8> {
        if self.total_bytes == 0 {
            return None;
        }
        let used = self.total_bytes.saturating_sub(self.available_bytes);
        let percent = used as f64 * 100.0 / self.total_bytes as f64;
        Some((percent + 0.5).min(100.0) as u8)
    }
}

#[derive(Debug)]
struct LimitTracker {
    limit: UsageLimit,
    state: DiskSpaceState,
}

impl LimitTracker {
    fn evaluate(&mut self, used_percent: u8) -> Option<ProbeResult> {
        let mount = &self.limit.mount_point;
        let max = self.limit.max_usage_percent;

        if used_percent >= max {
            warn!(
                "Disk space usage ({}%) for ({}) exceeds the limit ({}%)",
                used_percent, mount, max
            );
            self.state = DiskSpaceState::Warning;
        } else if self.state != DiskSpaceState::Normal {
            if self.state == DiskSpaceState::Warning {
                warn!(
                    "Disk space usage ({}%) for ({}) within the limit ({}%)",
                    used_percent, mount, max
                );
            }
            self.state = DiskSpaceState::Normal;
        } else {
            return None;
        }

        Some(ProbeResult::new(mount.clone(), used_percent))
    }
}

/// Evaluates mount usage against the configured limits across probes.
#[derive(Debug)]
pub struct UsageEvaluator {
    trackers: Vec<LimitTracker>,
}

impl UsageEvaluator {
    pub fn new(limits: Vec<UsageLimit>) -> Self {
        Self {
            trackers: limits
                .into_iter()
                .map(|limit| LimitTracker {
                    limit,
                    state: DiskSpaceState::Undefined,
                })
                .collect(),
        }
    }

    /// Last reported state for a mount, `None` if it has no limit.
    pub fn state_of(&self, mount_point: &str) -> Option<DiskSpaceState> {
        self.trackers
            .iter()
            .find(|t| t.limit.mount_point == mount_point)
            .map(|t| t.state)
    }

    /// Evaluate one probe's worth of mounts and return the results to report.
    ///
    /// Mounts without a limit, mounts without capacity, and repeated entries
    /// for an already evaluated mount point are ignored.
    pub fn evaluate(&mut self, mounts: impl IntoIterator<Item = MountUsage>) -> Vec<ProbeResult> {
        let mut seen = HashSet::new();
        let mut results = Vec::new();

        for mount in mounts {
            let Some(tracker) = self
                .trackers
                .iter_mut()
                .find(|t| t.limit.mount_point == mount.mount_point)
            else {
                continue;
            };

            if !seen.insert(mount.mount_point.clone()) {
                continue;
            }

            let Some(used_percent) = mount.used_percent() else {
                continue;
            };

            debug!(mount = %mount.mount_point, used_percent, "Checked mount point");

            if let Some(result) = tracker.evaluate(used_percent) {
                results.push(result);
            }
        }

        results
    }
}

impl Default for UsageEvaluator {
    fn default() -> Self {
        Self::new(default_usage_limits())
    }
}
