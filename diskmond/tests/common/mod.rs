//! Shared helpers for the service integration tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use diskmond::bus::BroadcastBus;
use diskmond::clock::Clock;
use diskmond::config::DiskMonitorConfig;
use diskmond::probe::{DiskProber, ProbeError, ProbeResult, ProbeSink};
use diskmond::service::DiskMonitorService;
use tokio::sync::Semaphore;
use tokio::time::Instant;

/// Wall clock that follows tokio's (possibly paused) timer.
pub struct TokioClock {
    origin: DateTime<Utc>,
    started: Instant,
}

impl TokioClock {
    pub fn new() -> Self {
        Self {
            origin: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            started: Instant::now(),
        }
    }
}

impl Clock for TokioClock {
    fn now(&self) -> DateTime<Utc> {
        self.origin + chrono::Duration::from_std(self.started.elapsed()).unwrap()
    }
}

/// Prober emitting a fixed set of results on every probe.
pub struct ScriptedProber {
    results: Vec<ProbeResult>,
    calls: AtomicUsize,
}

impl ScriptedProber {
    pub fn new(results: Vec<ProbeResult>) -> Self {
        Self {
            results,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DiskProber for ScriptedProber {
    async fn probe(&self, sink: &ProbeSink) -> Result<(), ProbeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        for result in &self.results {
            sink.emit(result.clone());
        }
        Ok(())
    }
}

/// Prober that blocks every scan until [`GatedProber::open`] is called.
pub struct GatedProber {
    gate: Semaphore,
    calls: AtomicUsize,
}

impl GatedProber {
    pub fn new() -> Self {
        Self {
            gate: Semaphore::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Let the blocked scan and every later one finish.
    pub fn open(&self) {
        self.gate.add_permits(1);
    }
}

#[async_trait]
impl DiskProber for GatedProber {
    async fn probe(&self, _sink: &ProbeSink) -> Result<(), ProbeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let _permit = self
            .gate
            .acquire()
            .await
            .map_err(|e| ProbeError::new(e.to_string()))?;
        Ok(())
    }
}

pub struct Harness<P = ScriptedProber> {
    pub service: DiskMonitorService,
    pub prober: Arc<P>,
    pub bus: BroadcastBus,
}

/// Start a service with default policy, reporting two mounts per probe.
pub fn start() -> Harness {
    start_with(Arc::new(ScriptedProber::new(vec![
        ProbeResult::new("/", 91),
        ProbeResult::new("/tmp", 75),
    ])))
}

/// Start a service with default policy around the given prober.
pub fn start_with<P: DiskProber>(prober: Arc<P>) -> Harness<P> {
    let bus = BroadcastBus::new();
    let service = DiskMonitorService::start(
        &DiskMonitorConfig::default(),
        prober.clone(),
        bus.clone(),
        TokioClock::new(),
    )
    .expect("service should start");

    Harness {
        service,
        prober,
        bus,
    }
}
