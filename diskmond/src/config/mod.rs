//! Daemon configuration.
//!
//! Defaults reproduce the fixed check policy. Every value can be overridden
//! through environment variables (a `.env` file is honoured by `main`).

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::probe::{UsageLimit, default_usage_limits};
use crate::scheduler::{ACTIVE_CHECK_INTERVAL, CheckPolicy, IDLE_CHECK_INTERVAL, STALE_THRESHOLD};
use crate::{Error, Result};

pub const ENV_ACTIVE_INTERVAL: &str = "DISKMON_ACTIVE_INTERVAL_SECS";
pub const ENV_IDLE_INTERVAL: &str = "DISKMON_IDLE_INTERVAL_SECS";
pub const ENV_STALE_THRESHOLD: &str = "DISKMON_STALE_THRESHOLD_SECS";
pub const ENV_USAGE_LIMITS: &str = "DISKMON_USAGE_LIMITS";
pub const ENV_LOG_DIR: &str = "DISKMON_LOG_DIR";

/// Configuration for the disk monitor daemon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiskMonitorConfig {
    pub active_interval_secs: u64,
    pub idle_interval_secs: u64,
    pub stale_threshold_secs: u64,
    pub usage_limits: Vec<UsageLimit>,
    /// Directory for rolling log files; console only when unset.
    pub log_dir: Option<String>,
}

impl Default for DiskMonitorConfig {
    fn default() -> Self {
        Self {
            active_interval_secs: ACTIVE_CHECK_INTERVAL.as_secs(),
            idle_interval_secs: IDLE_CHECK_INTERVAL.as_secs(),
            stale_threshold_secs: STALE_THRESHOLD.as_secs(),
            usage_limits: default_usage_limits(),
            log_dir: None,
        }
    }
}

impl DiskMonitorConfig {
    /// Load config from environment variables, falling back to defaults.
    ///
    /// Supported env vars:
    /// - `DISKMON_ACTIVE_INTERVAL_SECS` (e.g. "300")
    /// - `DISKMON_IDLE_INTERVAL_SECS` (e.g. "1800")
    /// - `DISKMON_STALE_THRESHOLD_SECS` (e.g. "900")
    /// - `DISKMON_USAGE_LIMITS` (e.g. "/:90,/tmp:70")
    /// - `DISKMON_LOG_DIR` (e.g. "/var/log/diskmond")
    pub fn from_env_or_default() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup.
    ///
    /// Values that fail to parse keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        let secs = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());

        if let Some(v) = secs(ENV_ACTIVE_INTERVAL) {
            config.active_interval_secs = v;
        }
        if let Some(v) = secs(ENV_IDLE_INTERVAL) {
            config.idle_interval_secs = v;
        }
        if let Some(v) = secs(ENV_STALE_THRESHOLD) {
            config.stale_threshold_secs = v;
        }

        if let Some(raw) = lookup(ENV_USAGE_LIMITS)
            && let Ok(limits) = parse_usage_limits(&raw)
        {
            config.usage_limits = limits;
        }

        if let Some(dir) = lookup(ENV_LOG_DIR)
            && !dir.trim().is_empty()
        {
            config.log_dir = Some(dir);
        }

        config
    }

    /// Reject values the scheduler cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.active_interval_secs == 0 || self.idle_interval_secs == 0 {
            return Err(Error::config("check intervals must be greater than zero"));
        }
        if self.stale_threshold_secs == 0 {
            return Err(Error::config("stale threshold must be greater than zero"));
        }

        for limit in &self.usage_limits {
            if limit.mount_point.is_empty() {
                return Err(Error::config("usage limit without a mount point"));
            }
            if !(1..=100).contains(&limit.max_usage_percent) {
                return Err(Error::config(format!(
                    "usage limit for {} must be within 1..=100, got {}",
                    limit.mount_point, limit.max_usage_percent
                )));
            }
        }

        Ok(())
    }

    /// The check policy described by this config.
    pub fn policy(&self) -> CheckPolicy {
        CheckPolicy {
            active_interval: Duration::from_secs(self.active_interval_secs),
            idle_interval: Duration::from_secs(self.idle_interval_secs),
            stale_threshold: Duration::from_secs(self.stale_threshold_secs),
        }
    }
}

/// Parse `"/:90,/tmp:70"` into usage limits.
pub fn parse_usage_limits(raw: &str) -> Result<Vec<UsageLimit>> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (mount, percent) = entry
                .rsplit_once(':')
                .ok_or_else(|| Error::config(format!("expected <mount>:<percent>, got {}", entry)))?;
            let percent = percent
                .trim()
                .parse::<u8>()
                .map_err(|e| Error::config(format!("invalid percent in {}: {}", entry, e)))?;
            Ok(UsageLimit::new(mount.trim(), percent))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_match_policy_constants() {
        let config = DiskMonitorConfig::default();
        assert_eq!(config.policy(), CheckPolicy::default());
        assert_eq!(config.usage_limits.len(), 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_lookup_overrides() {
        let config = DiskMonitorConfig::from_lookup(lookup(&[
            (ENV_ACTIVE_INTERVAL, "60"),
            (ENV_IDLE_INTERVAL, " 600 "),
            (ENV_USAGE_LIMITS, "/:95, /data:80"),
            (ENV_LOG_DIR, "/var/log/diskmond"),
        ]));

        assert_eq!(config.active_interval_secs, 60);
        assert_eq!(config.idle_interval_secs, 600);
        assert_eq!(config.stale_threshold_secs, 900);
        assert_eq!(
            config.usage_limits,
            vec![UsageLimit::new("/", 95), UsageLimit::new("/data", 80)]
        );
        assert_eq!(config.log_dir.as_deref(), Some("/var/log/diskmond"));
    }

    #[test]
    fn test_unparsable_values_keep_defaults() {
        let config = DiskMonitorConfig::from_lookup(lookup(&[
            (ENV_ACTIVE_INTERVAL, "soon"),
            (ENV_USAGE_LIMITS, "/:lots"),
            (ENV_LOG_DIR, "  "),
        ]));

        assert_eq!(config, DiskMonitorConfig::default());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let zero = DiskMonitorConfig {
            active_interval_secs: 0,
            ..Default::default()
        };
        assert!(matches!(zero.validate(), Err(Error::Configuration(_))));

        let over = DiskMonitorConfig {
            usage_limits: vec![UsageLimit::new("/", 101)],
            ..Default::default()
        };
        assert!(over.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_stale_threshold() {
        let config = DiskMonitorConfig::from_lookup(lookup(&[(ENV_STALE_THRESHOLD, "0")]));
        assert_eq!(config.stale_threshold_secs, 0);
        assert!(matches!(config.validate(), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_wakeup_window_is_not_configurable() {
        let config = DiskMonitorConfig::from_lookup(lookup(&[
            ("DISKMON_WAKEUP_SLACK_SECS", "0"),
            (ENV_IDLE_INTERVAL, "600"),
        ]));
        assert!(config.validate().is_ok());

        let policy = config.policy();
        for active in [false, true] {
            let request = policy.schedule_request(active);
            assert_eq!(request.max_secs(), request.min_secs() + 120);
        }
        assert_eq!(policy.schedule_request(false).min_secs(), 600);
    }

    #[test]
    fn test_deserialize_partial_json() {
        let config: DiskMonitorConfig =
            serde_json::from_str(r#"{"idle_interval_secs": 3600}"#).unwrap();
        assert_eq!(config.idle_interval_secs, 3600);
        assert_eq!(config.active_interval_secs, 300);
    }

    #[test]
    fn test_parse_usage_limits_errors() {
        assert!(parse_usage_limits("/tmp").is_err());
        assert!(parse_usage_limits("/tmp:300").is_err());
        assert!(parse_usage_limits("").unwrap().is_empty());
    }
}
