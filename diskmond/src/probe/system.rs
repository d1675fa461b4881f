//! Prober backed by the mounted filesystem list from `sysinfo`.

use async_trait::async_trait;
use parking_lot::Mutex;
use sysinfo::Disks;
use tracing::debug;

use super::usage::{MountUsage, UsageEvaluator, UsageLimit};
use super::{DiskProber, ProbeError, ProbeSink};

/// Probes every mounted filesystem that has a usage limit configured.
#[derive(Debug)]
pub struct SysinfoProber {
    evaluator: Mutex<UsageEvaluator>,
}

impl SysinfoProber {
    pub fn new(limits: Vec<UsageLimit>) -> Self {
        Self {
            evaluator: Mutex::new(UsageEvaluator::new(limits)),
        }
    }

    /// List the currently mounted filesystems.
    pub fn mounts() -> Vec<MountUsage> {
        let disks = Disks::new_with_refreshed_list();
        disks
            .list()
            .iter()
            .map(|d| MountUsage {
                mount_point: d.mount_point().to_string_lossy().to_string(),
                total_bytes: d.total_space(),
                available_bytes: d.available_space(),
            })
            .collect()
    }
}

impl Default for SysinfoProber {
    fn default() -> Self {
        Self {
            evaluator: Mutex::new(UsageEvaluator::default()),
        }
    }
}

#[async_trait]
impl DiskProber for SysinfoProber {
    async fn probe(&self, sink: &ProbeSink) -> Result<(), ProbeError> {
        debug!("Checking disk space usage");

        // Enumerating mounts hits the filesystem; keep it off the runtime threads.
        let mounts = tokio::task::spawn_blocking(Self::mounts)
            .await
            .map_err(|e| ProbeError::new(format!("Mount enumeration failed: {}", e)))?;

        let results = self.evaluator.lock().evaluate(mounts);
        for result in results {
            sink.emit(result);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::probe_channel;

    #[tokio::test]
    async fn test_probe_reports_only_limited_mounts() {
        let prober = SysinfoProber::new(vec![UsageLimit::new("/", 100)]);
        let (sink, mut rx) = probe_channel();

        prober.probe(&sink).await.unwrap();
        drop(sink);

        while let Some(result) = rx.recv().await {
            assert_eq!(result.mount_path, "/");
            assert!(result.percent_used <= 100);
        }
    }

    #[tokio::test]
    async fn test_probe_without_limits_is_silent() {
        let prober = SysinfoProber::new(Vec::new());
        let (sink, mut rx) = probe_channel();

        prober.probe(&sink).await.unwrap();
        drop(sink);

        assert!(rx.recv().await.is_none());
    }
}
